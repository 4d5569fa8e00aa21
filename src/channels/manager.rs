//! Channel manager: merges inbound streams and routes replies.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Owns every active channel, keyed by name.
pub struct ChannelManager {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel. A channel with the same name is replaced.
    pub fn add(&mut self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        tracing::debug!(channel = %name, "Channel registered");
        self.channels.insert(name, Arc::from(channel));
    }

    /// Names of registered channels, sorted.
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Start every channel and merge their message streams.
    ///
    /// A channel that fails to start is logged and skipped; it is an error
    /// only when none start.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());

        for (name, channel) in &self.channels {
            match channel.start().await {
                Ok(s) => {
                    tracing::info!(channel = %name, "Channel started");
                    streams.push(s);
                }
                Err(e) => tracing::error!(channel = %name, "Channel failed to start: {e}"),
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".into(),
                reason: "no channel could be started".into(),
            });
        }

        Ok(Box::pin(stream::select_all(streams)))
    }

    fn get(&self, name: &str) -> Result<&Arc<dyn Channel>, ChannelError> {
        self.channels
            .get(name)
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    /// Reply on the channel the message arrived on.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.respond(msg, response).await
    }

    pub async fn send_status(
        &self,
        channel_name: &str,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        self.get(channel_name)?
            .send_status(status, metadata)
            .await
    }

    pub async fn shutdown_all(&self) {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = %name, "Channel shutdown failed: {e}");
            }
        }
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
