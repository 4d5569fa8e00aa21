//! CLI channel: stdin/stdout REPL for local testing.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Chat identity used for the local terminal user.
pub const CLI_USER_ID: &str = "cli-local";

/// Reads messages from stdin and writes replies to stdout.
pub struct CliChannel {
    user_id: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            user_id: CLI_USER_ID.to_string(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_id = self.user_id.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", user_id.as_str(), line)
                            .with_user_name("you");
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {e}");
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", response.content);
        eprint!("> ");
        Ok(())
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        _metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        let StatusUpdate::Thinking(msg) = status;
        eprintln!("⏳ {msg}");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
