//! `ProfileStore` trait: the async interface to the hosted profile table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::profile::{ProfileUpdate, UserProfile};

/// Who sent a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl std::str::FromStr for Sender {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            other => Err(DatabaseError::Serialization(format!(
                "unknown sender '{other}'"
            ))),
        }
    }
}

/// A row of the conversation log.
#[derive(Debug, Clone)]
pub struct LoggedMessage {
    pub chat_id: String,
    pub sender: Sender,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic profile persistence.
///
/// Every call is a single round trip; nothing is cached and no call is
/// retried.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Load the profile for a chat, if one exists.
    async fn get_profile(&self, chat_id: &str) -> Result<Option<UserProfile>, DatabaseError>;

    /// Insert the profile row if missing, then write the given fields.
    async fn upsert_profile(
        &self,
        chat_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), DatabaseError>;

    /// Null every collected field and the last plan, and restart onboarding.
    /// Creates the row if it does not exist.
    async fn clear_profile(&self, chat_id: &str) -> Result<(), DatabaseError>;

    /// Store the first plan and mark onboarding complete.
    async fn complete_onboarding(&self, chat_id: &str, plan: &str) -> Result<(), DatabaseError>;

    /// Replace the last plan of a completed profile.
    async fn save_plan(&self, chat_id: &str, plan: &str) -> Result<(), DatabaseError>;

    // ── Conversation log ────────────────────────────────────────────

    /// Append a message to the conversation log.
    async fn log_message(
        &self,
        chat_id: &str,
        sender: Sender,
        message: &str,
    ) -> Result<(), DatabaseError>;

    /// Most recent logged messages for a chat, newest first.
    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<LoggedMessage>, DatabaseError>;
}
