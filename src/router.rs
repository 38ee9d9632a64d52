//! Conversation router.
//!
//! Maps inbound chat events to bot behavior:
//!
//! | Event                         | Action                                         |
//! |-------------------------------|------------------------------------------------|
//! | `/start`                      | greeting + persistent keyboard                 |
//! | `/launch`                     | profile picker (one button per label + Cancel) |
//! | `/shutdown`                   | stop the agent, reply with the outcome         |
//! | other text                    | echo + "Unknown command"                       |
//! | callback `/cancel`            | "Canceled", no process action                  |
//! | callback `<profile label>`    | launch; toast + endpoint report in place       |
//! | callback anything else        | dropped (stale or forged button)               |
//!
//! Senders missing from the allow-list are dropped before any of this, and
//! never answered.

use tracing::{debug, info, warn};

use crate::agent::ProcessController;
use crate::auth::AllowList;
use crate::chat::{Button, InboundEvent, Keyboard, MessageRef, Sender, Transport};
use crate::config::{ProfileSet, CANCEL_TOKEN};
use crate::error::TransportError;

pub const MSG_WELCOME: &str = "Welcome";
pub const MSG_UNKNOWN_COMMAND: &str = "Unknown command";
pub const MSG_NO_PROFILES: &str = "No tunnels configured";
pub const MSG_CHOOSE: &str = "Choose to launch";
pub const MSG_CANCEL: &str = "Cancel";
pub const MSG_CANCELED: &str = "Canceled";
pub const MSG_LAUNCH_FAILED: &str = "Launch failed";

/// Text commands understood by the bot. Matched by prefix so that
/// `/launch@my_bot` works in group chats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Launch,
    Shutdown,
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        if text.starts_with("/start") {
            Self::Start
        } else if text.starts_with("/launch") {
            Self::Launch
        } else if text.starts_with("/shutdown") {
            Self::Shutdown
        } else {
            Self::Unknown(text.to_string())
        }
    }
}

/// An outbound message and the keyboard that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    fn main(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Main,
        }
    }
}

/// What happened to an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Answered,
    /// Sender not on the allow-list. Nothing was sent.
    Unauthorized,
    /// Callback token not in the offered set. Nothing was sent.
    Ignored,
}

/// Reply for the commands that need no process action.
///
/// Returns `None` for [`Command::Shutdown`], which the router resolves
/// through the controller.
pub fn static_reply(command: &Command, profiles: &ProfileSet) -> Option<Reply> {
    match command {
        Command::Start => Some(Reply::main(MSG_WELCOME)),
        Command::Launch if profiles.is_empty() => Some(Reply::main(MSG_NO_PROFILES)),
        Command::Launch => Some(Reply {
            text: MSG_CHOOSE.to_string(),
            keyboard: profile_picker(profiles),
        }),
        Command::Shutdown => None,
        Command::Unknown(text) if text.is_empty() => Some(Reply::main(MSG_UNKNOWN_COMMAND)),
        Command::Unknown(text) => Some(Reply::main(format!("{text}: {MSG_UNKNOWN_COMMAND}"))),
    }
}

/// One button per profile label, in config order, then Cancel.
pub fn profile_picker(profiles: &ProfileSet) -> Keyboard {
    let mut buttons: Vec<Button> = profiles
        .iter()
        .map(|p| Button {
            text: p.label.clone(),
            token: p.label.clone(),
        })
        .collect();
    buttons.push(Button {
        text: MSG_CANCEL.to_string(),
        token: CANCEL_TOKEN.to_string(),
    });
    Keyboard::Choices(buttons)
}

/// Dispatches events to the controller and answers through `T`.
pub struct Router<T> {
    transport: T,
    allow: AllowList,
    profiles: ProfileSet,
    controller: ProcessController,
}

impl<T: Transport> Router<T> {
    pub fn new(
        transport: T,
        allow: AllowList,
        profiles: ProfileSet,
        controller: ProcessController,
    ) -> Self {
        Self {
            transport,
            allow,
            profiles,
            controller,
        }
    }

    /// Handle one event. A transport error abandons the interaction; the
    /// caller only logs it.
    pub async fn handle(&self, event: InboundEvent) -> Result<Disposition, TransportError> {
        if !self.authorized(event.sender()) {
            return Ok(Disposition::Unauthorized);
        }
        match event {
            InboundEvent::Text { chat_id, text, .. } => self.handle_text(&chat_id, &text).await,
            InboundEvent::Callback {
                callback_id,
                token,
                message,
                ..
            } => {
                self.handle_callback(&callback_id, &token, message.as_ref())
                    .await
            }
        }
    }

    fn authorized(&self, sender: &Sender) -> bool {
        match sender.username.as_deref() {
            None => {
                warn!("Not allowed (no user name): {}", sender.first_name);
                false
            }
            Some(id) if !self.allow.authorize(Some(id)) => {
                warn!("Id not allowed: {id}");
                false
            }
            Some(_) => true,
        }
    }

    async fn handle_text(&self, chat_id: &str, text: &str) -> Result<Disposition, TransportError> {
        self.typing(chat_id).await;

        let command = Command::parse(text);
        debug!("Command from chat {chat_id}: {command:?}");
        let reply = match static_reply(&command, &self.profiles) {
            Some(reply) => reply,
            None => Reply::main(match self.controller.shutdown().await {
                Ok(message) => message,
                Err(e) => e.to_string(),
            }),
        };

        self.transport
            .send_message(chat_id, &reply.text, &reply.keyboard)
            .await?;
        Ok(Disposition::Answered)
    }

    async fn handle_callback(
        &self,
        callback_id: &str,
        token: &str,
        message: Option<&MessageRef>,
    ) -> Result<Disposition, TransportError> {
        if token == CANCEL_TOKEN {
            self.transport.answer_callback(callback_id, None).await?;
            if let Some(message) = message {
                self.transport
                    .edit_message_text(message, MSG_CANCELED)
                    .await?;
            }
            return Ok(Disposition::Answered);
        }

        let Some(profile) = self.profiles.get(token) else {
            warn!("Unprocessable callback query: {token}");
            return Ok(Disposition::Ignored);
        };

        if let Some(message) = message {
            self.typing(&message.chat_id).await;
        }
        info!("Launching profile '{}'", profile.label);
        let (toast, text) = match self.controller.launch(profile).await {
            Ok(report) => (format!("Launched successfully: {}", profile.label), report),
            Err(e) => {
                warn!("Launch of '{}' failed: {e}", profile.label);
                (MSG_LAUNCH_FAILED.to_string(), e.to_string())
            }
        };

        self.transport
            .answer_callback(callback_id, Some(&toast))
            .await?;
        if let Some(message) = message {
            self.transport.edit_message_text(message, &text).await?;
        }
        Ok(Disposition::Answered)
    }

    /// Fire-and-forget "typing..." indicator.
    async fn typing(&self, chat_id: &str) {
        if let Err(e) = self.transport.send_typing(chat_id).await {
            debug!("Failed to send typing indicator: {e}");
        }
    }
}
