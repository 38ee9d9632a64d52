//! Chat transport boundary.
//!
//! The router only talks to the outside world through the [`Transport`]
//! trait and the event/keyboard types below. [`telegram`] implements it over
//! the Telegram Bot API and [`poll`] turns `getUpdates` into a stream of
//! [`InboundEvent`]s.

pub mod poll;
pub mod telegram;

use async_trait::async_trait;

use crate::error::TransportError;

/// Who sent an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Operator identity checked against the allow-list. Not every account
    /// has one.
    pub username: Option<String>,
    /// Display name, only used for logging rejected senders.
    pub first_name: String,
}

/// A message that can be edited later (the one carrying an inline keyboard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: String,
    pub message_id: i64,
}

/// One event from the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Plain text (commands included).
    Text {
        chat_id: String,
        sender: Sender,
        text: String,
    },
    /// A button press on an inline keyboard.
    Callback {
        callback_id: String,
        token: String,
        message: Option<MessageRef>,
        sender: Sender,
    },
}

impl InboundEvent {
    pub fn sender(&self) -> &Sender {
        match self {
            Self::Text { sender, .. } | Self::Callback { sender, .. } => sender,
        }
    }
}

/// A selectable inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub token: String,
}

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// The persistent two-button reply keyboard (launch / shutdown).
    Main,
    /// One inline button per row.
    Choices(Vec<Button>),
}

/// Outbound capabilities the bot needs from a chat service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), TransportError>;

    /// "typing..." indicator. Best effort.
    async fn send_typing(&self, chat_id: &str) -> Result<(), TransportError>;

    /// Acknowledge a button press, optionally with a short toast.
    async fn answer_callback(
        &self,
        callback_id: &str,
        toast: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Replace a message's text. Any inline keyboard on it is removed.
    async fn edit_message_text(
        &self,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), TransportError>;
}
