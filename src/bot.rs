//! Bot main loop: pulls messages off the channels and answers them.

use std::sync::Arc;

use futures::StreamExt;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse, StatusUpdate};
use crate::conversation::ConversationController;
use crate::error::Error;

/// Wires channels to the conversation controller.
pub struct Bot {
    channels: ChannelManager,
    controller: Arc<ConversationController>,
}

impl Bot {
    pub fn new(channels: ChannelManager, controller: Arc<ConversationController>) -> Self {
        Self {
            channels,
            controller,
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    ///
    /// Messages are handled one at a time, each to completion.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;

        tracing::info!("HealthMate ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.handle_message(&message).await;
        }

        self.channels.shutdown_all().await;
        Ok(())
    }

    async fn handle_message(&self, message: &IncomingMessage) {
        tracing::debug!(
            channel = %message.channel,
            chat_id = %message.user_id,
            "Message received"
        );

        if let Err(e) = self
            .channels
            .send_status(
                &message.channel,
                StatusUpdate::Thinking("Thinking...".into()),
                &message.metadata,
            )
            .await
        {
            tracing::debug!("Status update failed: {e}");
        }

        let reply = self
            .controller
            .handle(&message.user_id, &message.content)
            .await;

        if let Err(e) = self
            .channels
            .respond(message, OutgoingResponse::text(reply))
            .await
        {
            tracing::error!(channel = %message.channel, "Failed to send reply: {e}");
        }
    }
}
