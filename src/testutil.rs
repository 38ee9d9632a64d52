//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::chat::{Keyboard, MessageRef, Transport};
use crate::config::{ProfileSet, TunnelProfile};
use crate::error::TransportError;

pub fn profile(label: &str, args: &str) -> TunnelProfile {
    TunnelProfile {
        label: label.to_string(),
        args: args.split_whitespace().map(String::from).collect(),
    }
}

pub fn profiles(pairs: &[(&str, &str)]) -> ProfileSet {
    let raw: IndexMap<String, String> = pairs
        .iter()
        .map(|(label, args)| ((*label).to_string(), (*args).to_string()))
        .collect();
    ProfileSet::try_from(raw).expect("valid test profiles")
}

/// `true` while `pid` exists, zombies included. A reaped child reports `false`.
pub fn pid_alive(pid: u32) -> bool {
    let pid = nix::unistd::Pid::from_raw(i32::try_from(pid).expect("pid fits i32"));
    nix::sys::signal::kill(pid, None).is_ok()
}

/// A URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);
    format!("http://{addr}/api/tunnels")
}

/// Canned answer of the fake status endpoint.
#[derive(Clone)]
pub enum StatusReply {
    Ok(String),
    Status(u16),
}

/// Serve `reply` on `GET /api/tunnels` and return the full URL.
pub async fn serve_status(reply: StatusReply) -> String {
    let app = axum::Router::new().route(
        "/api/tunnels",
        get(move || {
            let reply = reply.clone();
            async move {
                match reply {
                    StatusReply::Ok(body) => {
                        ([("content-type", "application/json")], body).into_response()
                    }
                    StatusReply::Status(code) => {
                        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                            .into_response()
                    }
                }
            }
        }),
    );
    let addr = spawn_server(app).await;
    format!("http://{addr}/api/tunnels")
}

async fn spawn_server(app: axum::Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("test server addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Minimal Bot API stand-in: answers `POST /tg/<method>` with a canned
/// reply (default `{"ok": true, "result": true}`) and records request bodies.
pub struct FakeTelegram {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

pub struct FakeTelegramBuilder {
    replies: HashMap<String, Value>,
}

#[derive(Clone)]
struct FakeState {
    replies: Arc<HashMap<String, Value>>,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeTelegram {
    pub fn start() -> FakeTelegramBuilder {
        FakeTelegramBuilder {
            replies: HashMap::new(),
        }
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

impl FakeTelegramBuilder {
    pub fn reply(mut self, method: &str, body: Value) -> Self {
        self.replies.insert(method.to_string(), body);
        self
    }

    pub async fn serve(self) -> FakeTelegram {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            replies: Arc::new(self.replies),
            requests: Arc::clone(&requests),
        };
        let app = axum::Router::new()
            .route("/tg/{method}", post(fake_method))
            .with_state(state);
        let addr = spawn_server(app).await;
        FakeTelegram {
            base_url: format!("http://{addr}/tg"),
            requests,
        }
    }
}

async fn fake_method(
    State(state): State<FakeState>,
    Path(method): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push((method.clone(), body));
    let reply = state
        .replies
        .get(&method)
        .cloned()
        .unwrap_or_else(|| json!({ "ok": true, "result": true }));
    Json(reply).into_response()
}

/// One recorded [`Transport`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Message {
        chat_id: String,
        text: String,
        keyboard: Keyboard,
    },
    Typing {
        chat_id: String,
    },
    Answer {
        callback_id: String,
        toast: Option<String>,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
}

/// Transport that records every call. Clones share the log.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every subsequent call fail with an API error.
    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                description: "Bad Request: chat not found".into(),
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), TransportError> {
        self.record(Call::Message {
            chat_id: chat_id.into(),
            text: text.into(),
            keyboard: keyboard.clone(),
        })
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), TransportError> {
        self.record(Call::Typing {
            chat_id: chat_id.into(),
        })
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        toast: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(Call::Answer {
            callback_id: callback_id.into(),
            toast: toast.map(String::from),
        })
    }

    async fn edit_message_text(
        &self,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), TransportError> {
        self.record(Call::Edit {
            message: message.clone(),
            text: text.into(),
        })
    }
}
