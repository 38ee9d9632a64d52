//! Telegram Bot API client.
//!
//! [`TelegramClient`] wraps `reqwest::Client` and posts JSON to
//! `https://api.telegram.org/bot<token>/<method>`. Every reply has the shape
//! `{ "ok": bool, "result": ..., "description": "..." }`; `ok: false` becomes
//! [`TransportError::Api`] carrying the description.
//!
//! The token is part of the URL, so request errors are stripped of their URL
//! before they are returned or logged.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Button, InboundEvent, Keyboard, MessageRef, Sender, Transport};
use crate::error::TransportError;

const API_BASE: &str = "https://api.telegram.org";

/// Text of the two buttons on the persistent keyboard.
pub const MAIN_KEYBOARD: [&str; 2] = ["/launch", "/shutdown"];

/// HTTP client for one bot.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

/// Envelope around every Bot API reply.
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// The bot's own account, as returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// One entry of a `getUpdates` reply. Kinds other than messages and
/// callback queries are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

impl From<User> for Sender {
    fn from(user: User) -> Self {
        Sender {
            username: user.username,
            first_name: user.first_name,
        }
    }
}

impl Update {
    /// Convert into the transport-neutral event, if this kind is handled.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(message) = self.message {
            let sender = message.from.map(Sender::from).unwrap_or(Sender {
                username: None,
                first_name: String::new(),
            });
            return Some(InboundEvent::Text {
                chat_id: message.chat.id.to_string(),
                sender,
                // Stickers, photos etc. arrive without text
                text: message.text.unwrap_or_default(),
            });
        }
        if let Some(query) = self.callback_query {
            return Some(InboundEvent::Callback {
                callback_id: query.id,
                token: query.data.unwrap_or_default(),
                message: query.message.map(|m| MessageRef {
                    chat_id: m.chat.id.to_string(),
                    message_id: m.message_id,
                }),
                sender: query.from.into(),
            });
        }
        None
    }
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TransportError> {
        Self::with_base_url(&format!("{API_BASE}/bot{token}"))
    }

    /// Point the client at an arbitrary API root (everything before `/<method>`).
    pub fn with_base_url(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::Request(e.without_url()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `getMe` — the bot's own registration.
    pub async fn get_me(&self) -> Result<BotUser, TransportError> {
        self.call("getMe", &json!({}), None).await
    }

    /// `deleteWebhook` — polling is refused while a webhook is set.
    pub async fn delete_webhook(&self) -> Result<(), TransportError> {
        self.call::<Value>("deleteWebhook", &json!({}), None)
            .await
            .map(drop)
    }

    /// `getUpdates` — long poll for updates with `update_id >= offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        let params = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        // The server may hold the request for `timeout`; leave headroom.
        self.call("getUpdates", &params, Some(timeout + Duration::from_secs(10)))
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError> {
        let mut request = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(params);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;

        let envelope: ApiResponse<T> = serde_json::from_str(&body)
            .map_err(|e| TransportError::Protocol(format!("{method}: {e}")))?;
        if !envelope.ok {
            return Err(TransportError::Api {
                description: envelope
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            });
        }
        envelope
            .result
            .ok_or_else(|| TransportError::Protocol(format!("{method}: missing result")))
    }
}

fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Main => json!({
            "keyboard": [MAIN_KEYBOARD.iter().map(|t| json!({ "text": t })).collect::<Vec<_>>()],
            "resize_keyboard": true,
        }),
        Keyboard::Choices(buttons) => json!({
            "inline_keyboard": buttons
                .iter()
                .map(|Button { text, token }| vec![json!({ "text": text, "callback_data": token })])
                .collect::<Vec<_>>(),
        }),
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), TransportError> {
        let params = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": reply_markup(keyboard),
        });
        self.call::<Value>("sendMessage", &params, None)
            .await
            .map(drop)
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), TransportError> {
        let params = json!({ "chat_id": chat_id, "action": "typing" });
        self.call::<Value>("sendChatAction", &params, None)
            .await
            .map(drop)
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        toast: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut params = json!({ "callback_query_id": callback_id });
        if let Some(text) = toast {
            params["text"] = json!(text);
        }
        self.call::<Value>("answerCallbackQuery", &params, None)
            .await
            .map(drop)
    }

    async fn edit_message_text(
        &self,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), TransportError> {
        let params = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": text,
        });
        self.call::<Value>("editMessageText", &params, None)
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeTelegram;

    #[test]
    fn test_update_with_text_message() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 7,
                "chat": {"id": 42, "type": "private"},
                "from": {"id": 1, "is_bot": false, "first_name": "Alice", "username": "alice"},
                "date": 0,
                "text": "/launch"
            }
        }))
        .unwrap();

        assert_eq!(
            update.into_event(),
            Some(InboundEvent::Text {
                chat_id: "42".into(),
                sender: Sender {
                    username: Some("alice".into()),
                    first_name: "Alice".into()
                },
                text: "/launch".into(),
            })
        );
    }

    #[test]
    fn test_update_without_username_or_text() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 11,
            "message": {
                "message_id": 8,
                "chat": {"id": 42},
                "from": {"id": 2, "first_name": "Bob"},
                "sticker": {}
            }
        }))
        .unwrap();

        let Some(InboundEvent::Text { sender, text, .. }) = update.into_event() else {
            panic!("expected text event");
        };
        assert_eq!(sender.username, None);
        assert_eq!(sender.first_name, "Bob");
        assert_eq!(text, "");
    }

    #[test]
    fn test_update_with_callback_query() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 12,
            "callback_query": {
                "id": "cbq-1",
                "from": {"id": 1, "first_name": "Alice", "username": "alice"},
                "message": {"message_id": 99, "chat": {"id": 42}, "text": "Choose to launch"},
                "chat_instance": "x",
                "data": "web"
            }
        }))
        .unwrap();

        let Some(InboundEvent::Callback {
            callback_id,
            token,
            message,
            ..
        }) = update.into_event()
        else {
            panic!("expected callback event");
        };
        assert_eq!(callback_id, "cbq-1");
        assert_eq!(token, "web");
        assert_eq!(
            message,
            Some(MessageRef {
                chat_id: "42".into(),
                message_id: 99
            })
        );
    }

    #[test]
    fn test_unhandled_update_kind() {
        let update: Update =
            serde_json::from_value(json!({"update_id": 13, "edited_message": {}})).unwrap();
        assert!(update.into_event().is_none());
    }

    #[test]
    fn test_reply_markup_main() {
        let markup = reply_markup(&Keyboard::Main);
        assert_eq!(markup["keyboard"][0][0]["text"], "/launch");
        assert_eq!(markup["keyboard"][0][1]["text"], "/shutdown");
        assert_eq!(markup["resize_keyboard"], true);
    }

    #[test]
    fn test_reply_markup_choices_one_per_row() {
        let markup = reply_markup(&Keyboard::Choices(vec![
            Button {
                text: "web".into(),
                token: "web".into(),
            },
            Button {
                text: "Cancel".into(),
                token: "/cancel".into(),
            },
        ]));
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0]["callback_data"], "/cancel");
    }

    #[tokio::test]
    async fn test_get_me() {
        let fake = FakeTelegram::start()
            .reply(
                "getMe",
                json!({"ok": true, "result": {"id": 5, "is_bot": true, "first_name": "Tunnels", "username": "tunnel_bot"}}),
            )
            .serve()
            .await;
        let client = TelegramClient::with_base_url(&fake.base_url).unwrap();

        let me = client.get_me().await.unwrap();
        assert_eq!(me.username.as_deref(), Some("tunnel_bot"));
        assert_eq!(me.first_name, "Tunnels");
    }

    #[tokio::test]
    async fn test_api_error_description() {
        let fake = FakeTelegram::start()
            .reply(
                "getMe",
                json!({"ok": false, "error_code": 401, "description": "Unauthorized"}),
            )
            .serve()
            .await;
        let client = TelegramClient::with_base_url(&fake.base_url).unwrap();

        let err = client.get_me().await.unwrap_err();
        assert!(matches!(err, TransportError::Api { ref description } if description == "Unauthorized"));
    }

    #[tokio::test]
    async fn test_send_message_payload() {
        let fake = FakeTelegram::start().serve().await;
        let client = TelegramClient::with_base_url(&fake.base_url).unwrap();

        client
            .send_message("42", "Welcome", &Keyboard::Main)
            .await
            .unwrap();
        client.answer_callback("cbq-1", Some("Launch failed")).await.unwrap();

        let requests = fake.requests();
        assert_eq!(requests[0].0, "sendMessage");
        assert_eq!(requests[0].1["chat_id"], "42");
        assert_eq!(requests[0].1["text"], "Welcome");
        assert_eq!(requests[1].0, "answerCallbackQuery");
        assert_eq!(requests[1].1["text"], "Launch failed");
    }

    #[tokio::test]
    async fn test_answer_callback_without_toast() {
        let fake = FakeTelegram::start().serve().await;
        let client = TelegramClient::with_base_url(&fake.base_url).unwrap();

        client.answer_callback("cbq-2", None).await.unwrap();
        let requests = fake.requests();
        assert!(requests[0].1.get("text").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_api() {
        let client =
            TelegramClient::with_base_url(&crate::testutil::unreachable_url()).unwrap();
        assert!(matches!(
            client.send_typing("42").await,
            Err(TransportError::Request(_))
        ));
    }
}
