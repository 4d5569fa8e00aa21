//! Telegram channel: long-polls the Bot API for updates.
//!
//! Each Telegram chat is one HealthMate identity: the chat id is used as the
//! `user_id` of every `IncomingMessage`, and replies go back to that chat.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

// ── Bot API wire types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            base_url: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different Bot API server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.base_url, &self.bot_token, method)
    }

    /// Send a text message, splitting it to fit Telegram's 4096 UTF-16 unit limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }

    /// Send one chunk, Markdown first with a plain text retry.
    ///
    /// Model output often contains unbalanced `*` or `_`, which Telegram
    /// rejects under Markdown parsing.
    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let mut last_error = String::new();

        for parse_mode in [Some("Markdown"), None] {
            let mut body = serde_json::json!({ "chat_id": chat_id, "text": text });
            if let Some(mode) = parse_mode {
                body["parse_mode"] = serde_json::Value::from(mode);
            }

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;

            if resp.status().is_success() {
                return Ok(());
            }

            let status = resp.status();
            last_error = format!("{status}: {}", resp.text().await.unwrap_or_default());
            if parse_mode.is_some() {
                tracing::warn!(%status, "sendMessage with Markdown failed; retrying as plain text");
            }
        }

        Err(ChannelError::SendFailed {
            name: "telegram".into(),
            reason: format!("sendMessage failed: {last_error}"),
        })
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: ApiResponse<Vec<Update>> = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                if !data.ok {
                    tracing::warn!(
                        "Telegram getUpdates rejected: {}",
                        data.description.as_deref().unwrap_or("no description")
                    );
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }

                for update in data.result.unwrap_or_default() {
                    offset = offset.max(update.update_id + 1);

                    let Some(incoming) = to_incoming(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&msg.user_id);

        self.send_message(chat_id, &response.content).await
    }

    async fn send_status(
        &self,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        let Some(chat_id) = metadata.get("chat_id").and_then(|v| v.as_str()) else {
            return Ok(());
        };

        match status {
            StatusUpdate::Thinking(_) => {
                // Best effort; a missing typing indicator is harmless.
                let _ = self
                    .client
                    .post(self.api_url("sendChatAction"))
                    .json(&serde_json::json!({
                        "chat_id": chat_id,
                        "action": "typing"
                    }))
                    .send()
                    .await;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(base_url: &str, token: &SecretString, method: &str) -> String {
    format!("{base_url}/bot{}/{method}", token.expose_secret())
}

/// Convert an update into an `IncomingMessage`, dropping non-text updates
/// and senders outside the allowlist.
fn to_incoming(update: Update, allowed_users: &[String]) -> Option<IncomingMessage> {
    let message = update.message?;
    let text = message.text?;

    let username = message
        .from
        .as_ref()
        .and_then(|f| f.username.as_deref())
        .unwrap_or("unknown");
    let user_id = message.from.as_ref().map(|f| f.id.to_string());

    let mut identities = vec![username];
    if let Some(ref id) = user_id {
        identities.push(id.as_str());
    }
    if !check_user_allowed(allowed_users, identities) {
        tracing::warn!(
            "Telegram: ignoring message from unauthorized user: username={username}, user_id={}",
            user_id.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    let chat_id = message.chat.id.to_string();
    let mut incoming = IncomingMessage::new("telegram", chat_id.clone(), text)
        .with_metadata(serde_json::json!({
            "chat_id": chat_id,
            "username": username,
        }));
    if let Some(name) = message.from.and_then(|f| f.first_name) {
        incoming = incoming.with_user_name(name);
    }
    Some(incoming)
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks of at most `max_len` UTF-16 code units,
/// the unit Telegram measures message length in.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while utf16_len(remaining) > max_len {
        // Byte offset of the first char that would overflow the limit.
        let mut units = 0;
        let limit = remaining
            .char_indices()
            .find(|(_, c)| {
                units += c.len_utf16();
                units > max_len
            })
            .map_or(remaining.len(), |(i, _)| i);
        let window = &remaining[..limit];
        let split_at = match window.rfind('\n').or_else(|| window.rfind(' ')) {
            Some(0) | None => limit,
            Some(i) => i,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

// ── Tests ───────────────────────────────────────────────────────────
