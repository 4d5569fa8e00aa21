//! libSQL backend: async `ProfileStore` implementation.
//!
//! Connects to a hosted libSQL/Turso database over the network, or to a local
//! file / in-memory database for development and tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::profile::{FieldValue, ProfileField, ProfileUpdate, UserProfile};
use crate::store::migrations;
use crate::store::traits::{LoggedMessage, ProfileStore, Sender};

/// Columns selected for a profile row, in `row_to_profile` order.
const PROFILE_COLUMNS: &str = "chat_id, name, age, gender, height_cm, weight_kg, \
     activity_level, recurring_issues, last_plan, next_field, created_at, updated_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Connect to a hosted database (`libsql://…` or `https://…`).
    pub async fn new_remote(url: &str, auth_token: &SecretString) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.expose_secret().to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open remote database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(url, "Remote database connected");
        Ok(backend)
    }

    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Column name backing each profile field.
fn column(field: ProfileField) -> &'static str {
    match field {
        ProfileField::Name => "name",
        ProfileField::Age => "age",
        ProfileField::Gender => "gender",
        ProfileField::Height => "height_cm",
        ProfileField::Weight => "weight_kg",
        ProfileField::ActivityLevel => "activity_level",
        ProfileField::RecurringIssues => "recurring_issues",
    }
}

/// Convert a field value to the SQL type of its column.
fn to_sql_value(field: ProfileField, value: &FieldValue) -> libsql::Value {
    let converted = match field {
        ProfileField::Age => value.as_i64().map(libsql::Value::Integer),
        ProfileField::Height | ProfileField::Weight => value.as_f64().map(libsql::Value::Real),
        _ => Some(libsql::Value::Text(value.to_string())),
    };
    converted.unwrap_or(libsql::Value::Null)
}

fn opt_next_field(next: Option<ProfileField>) -> libsql::Value {
    match next {
        Some(field) => libsql::Value::Text(field.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a UserProfile.
///
/// Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<UserProfile, DatabaseError> {
    let chat_id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("read chat_id: {e}")))?;
    let next_field = match row.get::<String>(9).ok() {
        Some(s) => Some(s.parse::<ProfileField>().map_err(DatabaseError::Serialization)?),
        None => None,
    };
    let created_str: String = row.get(10).unwrap_or_default();
    let updated_str: String = row.get(11).unwrap_or_default();

    Ok(UserProfile {
        chat_id,
        name: row.get::<String>(1).ok(),
        age: row.get::<i64>(2).ok(),
        gender: row.get::<String>(3).ok(),
        height_cm: row.get::<f64>(4).ok(),
        weight_kg: row.get::<f64>(5).ok(),
        activity_level: row.get::<String>(6).ok(),
        recurring_issues: row.get::<String>(7).ok(),
        last_plan: row.get::<String>(8).ok(),
        next_field,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── ProfileStore implementation ─────────────────────────────────────

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn get_profile(&self, chat_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM users WHERE chat_id = ?1"),
                params![chat_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn upsert_profile(
        &self,
        chat_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();

        // ?1 chat_id, ?2 next_field, ?3 timestamp, ?4.. field values
        let mut columns = vec!["chat_id", "next_field", "created_at", "updated_at"];
        let mut placeholders = vec!["?1".to_string(), "?2".into(), "?3".into(), "?3".into()];
        let mut assignments = vec![
            "next_field = excluded.next_field".to_string(),
            "updated_at = excluded.updated_at".to_string(),
        ];
        let mut values = vec![
            libsql::Value::Text(chat_id.to_string()),
            opt_next_field(update.next_field),
            libsql::Value::Text(now),
        ];

        for (field, value) in &update.values {
            let col = column(*field);
            values.push(to_sql_value(*field, value));
            columns.push(col);
            placeholders.push(format!("?{}", values.len()));
            assignments.push(format!("{col} = excluded.{col}"));
        }

        let sql = format!(
            "INSERT INTO users ({}) VALUES ({}) ON CONFLICT (chat_id) DO UPDATE SET {}",
            columns.join(", "),
            placeholders.join(", "),
            assignments.join(", ")
        );

        self.conn()
            .execute(&sql, libsql::params_from_iter(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_profile: {e}")))?;

        debug!(chat_id, next_field = ?update.next_field, "Profile upserted");
        Ok(())
    }

    async fn clear_profile(&self, chat_id: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (chat_id, next_field, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (chat_id) DO UPDATE SET
                    name = NULL, age = NULL, gender = NULL, height_cm = NULL,
                    weight_kg = NULL, activity_level = NULL, recurring_issues = NULL,
                    last_plan = NULL, next_field = excluded.next_field,
                    updated_at = excluded.updated_at",
                params![chat_id, ProfileField::FIRST.to_string(), now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("clear_profile: {e}")))?;

        info!(chat_id, "Profile cleared");
        Ok(())
    }

    async fn complete_onboarding(&self, chat_id: &str, plan: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE users SET last_plan = ?2, next_field = NULL, updated_at = ?3
                 WHERE chat_id = ?1",
                params![chat_id, plan, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_onboarding: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "profile".into(),
                id: chat_id.to_string(),
            });
        }
        info!(chat_id, "Onboarding complete, first plan saved");
        Ok(())
    }

    async fn save_plan(&self, chat_id: &str, plan: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE users SET last_plan = ?2, updated_at = ?3 WHERE chat_id = ?1",
                params![chat_id, plan, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_plan: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "profile".into(),
                id: chat_id.to_string(),
            });
        }
        info!(chat_id, "Plan saved");
        Ok(())
    }

    async fn log_message(
        &self,
        chat_id: &str,
        sender: Sender,
        message: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO conversation_log (id, chat_id, sender, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    chat_id,
                    sender.as_str(),
                    message,
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("log_message: {e}")))?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<LoggedMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT chat_id, sender, message, created_at FROM conversation_log
                 WHERE chat_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                params![chat_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_messages: {e}")))?
        {
            let sender_str: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("read sender: {e}")))?;
            let created_str: String = row.get(3).unwrap_or_default();
            messages.push(LoggedMessage {
                chat_id: row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("read chat_id: {e}")))?,
                sender: sender_str.parse()?,
                message: row
                    .get(2)
                    .map_err(|e| DatabaseError::Query(format!("read message: {e}")))?,
                created_at: parse_datetime(&created_str),
            });
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[tokio::test]
    async fn get_missing_profile_is_none() {
        let db = test_db().await;
        assert!(db.get_profile("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let db = test_db().await;

        db.upsert_profile("u1", &ProfileUpdate::new(Some(ProfileField::Name)))
            .await
            .unwrap();
        let created = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(created.next_field, Some(ProfileField::Name));
        assert!(created.name.is_none());

        db.upsert_profile(
            "u1",
            &ProfileUpdate::new(Some(ProfileField::Age)).with_value(ProfileField::Name, text("Alex")),
        )
        .await
        .unwrap();
        db.upsert_profile(
            "u1",
            &ProfileUpdate::new(Some(ProfileField::Gender))
                .with_value(ProfileField::Age, FieldValue::Integer(30)),
        )
        .await
        .unwrap();

        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p.name.as_deref(), Some("Alex"));
        assert_eq!(p.age, Some(30));
        assert_eq!(p.next_field, Some(ProfileField::Gender));
        assert_eq!(p.created_at, created.created_at);
    }

    #[tokio::test]
    async fn numeric_columns_round_trip() {
        let db = test_db().await;
        db.upsert_profile(
            "u1",
            &ProfileUpdate::new(Some(ProfileField::ActivityLevel))
                .with_value(ProfileField::Height, FieldValue::Decimal(172.5))
                .with_value(ProfileField::Weight, FieldValue::Decimal(70.0)),
        )
        .await
        .unwrap();

        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p.height_cm, Some(172.5));
        assert_eq!(p.weight_kg, Some(70.0));
    }

    #[tokio::test]
    async fn complete_onboarding_sets_plan_and_clears_next_field() {
        let db = test_db().await;
        db.upsert_profile(
            "u1",
            &ProfileUpdate::new(Some(ProfileField::RecurringIssues))
                .with_value(ProfileField::RecurringIssues, text("none")),
        )
        .await
        .unwrap();

        db.complete_onboarding("u1", "1. Walk daily").await.unwrap();

        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert!(p.onboarding_complete());
        assert_eq!(p.last_plan.as_deref(), Some("1. Walk daily"));
        assert_eq!(p.recurring_issues.as_deref(), Some("none"));
    }

    #[tokio::test]
    async fn complete_onboarding_missing_profile_is_not_found() {
        let db = test_db().await;
        let err = db.complete_onboarding("ghost", "plan").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        assert!(matches!(
            db.save_plan("ghost", "plan").await.unwrap_err(),
            DatabaseError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn save_plan_replaces_last_plan_only() {
        let db = test_db().await;
        db.upsert_profile("u1", &ProfileUpdate::new(None).with_value(ProfileField::Name, text("Sam")))
            .await
            .unwrap();
        db.save_plan("u1", "old").await.unwrap();
        db.save_plan("u1", "new").await.unwrap();

        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p.last_plan.as_deref(), Some("new"));
        assert_eq!(p.name.as_deref(), Some("Sam"));
        assert!(p.onboarding_complete());
    }

    #[tokio::test]
    async fn clear_nulls_fields_and_restarts_onboarding() {
        let db = test_db().await;
        db.upsert_profile(
            "u1",
            &ProfileUpdate::new(None)
                .with_value(ProfileField::Name, text("Alex"))
                .with_value(ProfileField::Age, FieldValue::Integer(30)),
        )
        .await
        .unwrap();
        db.save_plan("u1", "1. Sleep").await.unwrap();

        db.clear_profile("u1").await.unwrap();

        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert!(p.name.is_none());
        assert!(p.age.is_none());
        assert!(p.last_plan.is_none());
        assert_eq!(p.next_field, Some(ProfileField::Name));
    }

    #[tokio::test]
    async fn clear_creates_missing_row() {
        let db = test_db().await;
        db.clear_profile("fresh").await.unwrap();
        let p = db.get_profile("fresh").await.unwrap().unwrap();
        assert_eq!(p.next_field, Some(ProfileField::Name));
    }

    #[tokio::test]
    async fn profiles_are_isolated_by_chat() {
        let db = test_db().await;
        db.upsert_profile("a", &ProfileUpdate::new(None).with_value(ProfileField::Name, text("A")))
            .await
            .unwrap();
        db.upsert_profile("b", &ProfileUpdate::new(None).with_value(ProfileField::Name, text("B")))
            .await
            .unwrap();
        db.clear_profile("a").await.unwrap();

        assert!(db.get_profile("a").await.unwrap().unwrap().name.is_none());
        assert_eq!(
            db.get_profile("b").await.unwrap().unwrap().name.as_deref(),
            Some("B")
        );
    }

    #[tokio::test]
    async fn conversation_log_newest_first_with_limit() {
        let db = test_db().await;
        db.log_message("u1", Sender::User, "hi").await.unwrap();
        db.log_message("u1", Sender::Bot, "What's your name?").await.unwrap();
        db.log_message("u1", Sender::User, "Alex").await.unwrap();
        db.log_message("u2", Sender::User, "other chat").await.unwrap();

        let recent = db.recent_messages("u1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "Alex");
        assert_eq!(recent[0].sender, Sender::User);
        assert_eq!(recent[1].sender, Sender::Bot);
        assert!(recent.iter().all(|m| m.chat_id == "u1"));
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("healthmate.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.upsert_profile("u1", &ProfileUpdate::new(Some(ProfileField::Age)))
                .await
                .unwrap();
        }

        let reopened = LibSqlBackend::new_local(&path).await.unwrap();
        let p = reopened.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p.next_field, Some(ProfileField::Age));
    }

    #[test]
    fn parse_datetime_formats() {
        let rfc = parse_datetime("2026-01-02T03:04:05+00:00");
        assert_eq!(rfc.to_rfc3339(), "2026-01-02T03:04:05+00:00");
        let sqlite = parse_datetime("2026-01-02 03:04:05");
        assert_eq!(sqlite, rfc);
        assert_eq!(parse_datetime("garbage"), DateTime::<Utc>::MIN_UTC);
    }
}
