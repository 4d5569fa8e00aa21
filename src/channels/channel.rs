//! Channel trait and the message types that flow through it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Unique ID for this message.
    pub id: Uuid,
    /// Name of the channel it arrived on.
    pub channel: String,
    /// Chat identity the conversation is keyed by.
    pub user_id: String,
    /// Display name, when the transport provides one.
    pub user_name: Option<String>,
    /// Raw message text.
    pub content: String,
    /// Channel-specific routing data (e.g. Telegram `chat_id`).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            user_id: user_id.into(),
            user_name: None,
            content: content.into(),
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

/// A reply to send back on the originating channel.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Transient progress indicators.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// The bot is working on a reply (Telegram shows "typing…").
    Thinking(String),
}

/// Stream of inbound messages produced by `Channel::start`.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A messaging transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used to route replies.
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a reply to the chat the message came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Show a status indicator. Channels that have none ignore it.
    async fn send_status(
        &self,
        _status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Verify the transport is reachable.
    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
