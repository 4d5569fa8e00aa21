//! User profile data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::ProfileField;

/// A validated answer to one onboarding field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Chat identity assigned by the messaging transport. Primary key.
    pub chat_id: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    pub recurring_issues: Option<String>,
    /// Most recently generated wellness plan.
    pub last_plan: Option<String>,
    /// Field awaiting input; `None` once onboarding is complete.
    pub next_field: Option<ProfileField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Whether every onboarding field has been collected.
    pub fn onboarding_complete(&self) -> bool {
        self.next_field.is_none()
    }

    /// Get the stored value for a field.
    pub fn get(&self, field: ProfileField) -> Option<FieldValue> {
        match field {
            ProfileField::Name => self.name.clone().map(FieldValue::Text),
            ProfileField::Age => self.age.map(FieldValue::Integer),
            ProfileField::Gender => self.gender.clone().map(FieldValue::Text),
            ProfileField::Height => self.height_cm.map(FieldValue::Decimal),
            ProfileField::Weight => self.weight_kg.map(FieldValue::Decimal),
            ProfileField::ActivityLevel => self.activity_level.clone().map(FieldValue::Text),
            ProfileField::RecurringIssues => self.recurring_issues.clone().map(FieldValue::Text),
        }
    }

    /// Render the profile as a block for prompt injection.
    pub fn to_prompt_section(&self) -> String {
        let mut parts = vec!["USER PROFILE:".to_string()];
        for field in ProfileField::ALL {
            let value = self
                .get(field)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "not provided".to_string());
            parts.push(format!("- {}: {}", field.label(), value));
        }
        parts.join("\n")
    }

    /// Render the profile for display to the user (`/profile`).
    pub fn summary(&self) -> String {
        let mut parts = vec!["Your profile:".to_string()];
        for field in ProfileField::ALL {
            if let Some(value) = self.get(field) {
                parts.push(format!("• {}: {}", field.label(), value));
            }
        }
        parts.join("\n")
    }

    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("friend")
    }
}

impl FieldValue {
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Decimal(v) => Some(v.round() as i64),
            Self::Text(v) => v.trim().parse().ok(),
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Decimal(v) => Some(*v),
            Self::Text(v) => v.trim().parse().ok(),
        }
    }
}

/// Fields to write in a single `upsert`.
///
/// `next_field` is always written: `Some` while onboarding, `None` once the
/// profile is complete.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub values: Vec<(ProfileField, FieldValue)>,
    pub next_field: Option<ProfileField>,
}

impl ProfileUpdate {
    pub fn new(next_field: Option<ProfileField>) -> Self {
        Self {
            values: Vec::new(),
            next_field,
        }
    }

    pub fn with_value(mut self, field: ProfileField, value: FieldValue) -> Self {
        self.values.push((field, value));
        self
    }
}

#[cfg(test)]
impl UserProfile {
    pub(crate) fn new(chat_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            chat_id: chat_id.into(),
            name: None,
            age: None,
            gender: None,
            height_cm: None,
            weight_kg: None,
            activity_level: None,
            recurring_issues: None,
            last_plan: None,
            next_field: Some(ProfileField::FIRST),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn set(&mut self, field: ProfileField, value: FieldValue) {
        match field {
            ProfileField::Name => self.name = Some(value.to_string()),
            ProfileField::Age => self.age = value.as_i64(),
            ProfileField::Gender => self.gender = Some(value.to_string()),
            ProfileField::Height => self.height_cm = value.as_f64(),
            ProfileField::Weight => self.weight_kg = value.as_f64(),
            ProfileField::ActivityLevel => self.activity_level = Some(value.to_string()),
            ProfileField::RecurringIssues => self.recurring_issues = Some(value.to_string()),
        }
    }
}
