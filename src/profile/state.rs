//! Onboarding state machine: which profile field the bot is waiting for.

use serde::{Deserialize, Serialize};

/// The profile fields collected during onboarding, in the order they are asked.
///
/// Progresses linearly: Name → Age → Gender → Height → Weight →
/// ActivityLevel → RecurringIssues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Age,
    Gender,
    Height,
    Weight,
    ActivityLevel,
    RecurringIssues,
}

impl ProfileField {
    /// All fields in onboarding order.
    pub const ALL: [ProfileField; 7] = [
        Self::Name,
        Self::Age,
        Self::Gender,
        Self::Height,
        Self::Weight,
        Self::ActivityLevel,
        Self::RecurringIssues,
    ];

    /// The first field asked of a new user.
    pub const FIRST: ProfileField = Self::Name;

    /// Get the next field in the linear progression, if any.
    pub fn next(&self) -> Option<ProfileField> {
        use ProfileField::*;
        match self {
            Name => Some(Age),
            Age => Some(Gender),
            Gender => Some(Height),
            Height => Some(Weight),
            Weight => Some(ActivityLevel),
            ActivityLevel => Some(RecurringIssues),
            RecurringIssues => None,
        }
    }

    /// The question sent to the user when this field is awaited.
    pub fn question(&self) -> &'static str {
        match self {
            Self::Name => "What's your name?",
            Self::Age => "How old are you (in years)?",
            Self::Gender => "What's your gender?",
            Self::Height => "What's your height in cm?",
            Self::Weight => "What's your weight in kg?",
            Self::ActivityLevel => {
                "How active are you? (Sedentary / Light / Moderate / Active)"
            }
            Self::RecurringIssues => {
                "Any recurring health issues I should know about? (Reply \"none\" if not.)"
            }
        }
    }

    /// Human-readable label used in profile summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Age => "Age",
            Self::Gender => "Gender",
            Self::Height => "Height (cm)",
            Self::Weight => "Weight (kg)",
            Self::ActivityLevel => "Activity level",
            Self::RecurringIssues => "Recurring health issues",
        }
    }
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Height => "height",
            Self::Weight => "weight",
            Self::ActivityLevel => "activity_level",
            Self::RecurringIssues => "recurring_issues",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProfileField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.to_string() == s)
            .ok_or_else(|| format!("unknown profile field: {s}"))
    }
}

/// Per-chat conversation state held by the controller.
///
/// A chat with no entry (and no stored profile) is a new user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// Waiting for the user to answer this field.
    Onboarding(ProfileField),
    /// Profile complete; messages are free-form questions.
    Ready,
}

impl ConversationState {
    /// State at the start of onboarding (new user or after `/reset`).
    pub fn start() -> Self {
        Self::Onboarding(ProfileField::FIRST)
    }

    /// Derive the state from a stored `next_field` column.
    pub fn from_next_field(next_field: Option<ProfileField>) -> Self {
        match next_field {
            Some(field) => Self::Onboarding(field),
            None => Self::Ready,
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onboarding(field) => write!(f, "onboarding({field})"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_all_fields() {
        let mut current = ProfileField::FIRST;
        let mut seen = vec![current];
        while let Some(next) = current.next() {
            seen.push(next);
            current = next;
        }
        assert_eq!(seen, ProfileField::ALL.to_vec());
        assert_eq!(current, ProfileField::RecurringIssues);
    }

    #[test]
    fn display_matches_serde_and_parses_back() {
        for field in ProfileField::ALL {
            let display = field.to_string();
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(format!("\"{display}\""), json);
            assert_eq!(display.parse::<ProfileField>().unwrap(), field);
        }
        assert!("shoe_size".parse::<ProfileField>().is_err());
    }

    #[test]
    fn state_from_next_field() {
        assert_eq!(
            ConversationState::from_next_field(Some(ProfileField::Weight)),
            ConversationState::Onboarding(ProfileField::Weight)
        );
        assert_eq!(
            ConversationState::from_next_field(None),
            ConversationState::Ready
        );
        assert_eq!(
            ConversationState::start(),
            ConversationState::Onboarding(ProfileField::Name)
        );
    }
}
