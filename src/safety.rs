//! Safety layer: the fixed role preamble and emergency red-flag detection.
//!
//! The bot never diagnoses or prescribes. Messages that mention an emergency
//! symptom get an extra instruction appended to the prompt telling the model
//! to send the user to real medical care first.

use std::sync::LazyLock;

use regex::Regex;

/// Role and safety preamble prepended to every prompt.
pub const SAFETY_PREAMBLE: &str = "\
You are HealthMate, a friendly assistant for general health and wellness.
You are NOT a doctor. You MUST NOT diagnose conditions or prescribe medication, \
dosages, or treatments. You give simple, practical advice about daily health, \
diet, sleep, hydration, mild cold/fever care, exercise, and lifestyle.
If the user describes chest pain, difficulty breathing, heavy bleeding, a high \
fever lasting several days, confusion, fainting, or anything else that sounds \
severe, say clearly that you cannot help with that and urge them to contact a \
doctor or emergency services immediately.
Keep answers short, warm, and easy to follow.";

/// Phrases that indicate a possible medical emergency.
const RED_FLAGS: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "can't breathe",
    "cannot breathe",
    "shortness of breath",
    "heavy bleeding",
    "bleeding heavily",
    "unconscious",
    "fainted",
    "fainting",
    "seizure",
    "confusion",
    "stroke",
    "suicidal",
    "overdose",
];

/// Red flags as whole words or phrases, so "heatstroke" does not match "stroke".
static RED_FLAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = RED_FLAGS.iter().map(|flag| regex::escape(flag)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
        .expect("red flag pattern is valid")
});

/// Appended to a prompt when the user's message contains a red flag.
pub const URGENT_CARE_NOTE: &str = "\
IMPORTANT: The user's message mentions possible emergency symptoms. Start your \
reply by telling them to contact a doctor or emergency services right away. \
Do not attempt to diagnose or treat.";

/// Detects emergency red flags in user text.
pub struct SafetyLayer {
    red_flags: &'static Regex,
}

impl SafetyLayer {
    /// Create a safety layer with the built-in red-flag list.
    pub fn new() -> Self {
        Self {
            red_flags: &RED_FLAG_PATTERN,
        }
    }

    /// Whether `input` mentions any emergency symptom (case-insensitive).
    pub fn is_urgent(&self, input: &str) -> bool {
        self.red_flags.is_match(input)
    }
}

impl Default for SafetyLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_red_flags_case_insensitively() {
        let safety = SafetyLayer::new();
        assert!(safety.is_urgent("I have CHEST PAIN and shortness of breath"));
        assert!(safety.is_urgent("My dad fainted this morning"));
        assert!(safety.is_urgent("I can't breathe properly"));
        assert!(safety.is_urgent("Could this be a stroke?"));
    }

    #[test]
    fn ordinary_questions_are_not_urgent() {
        let safety = SafetyLayer::new();
        assert!(!safety.is_urgent("What should I eat when I have a cold?"));
        assert!(!safety.is_urgent("How much water per day?"));
    }

    #[test]
    fn red_flags_match_whole_words_only() {
        let safety = SafetyLayer::new();
        assert!(!safety.is_urgent("How do I avoid heatstroke while hiking?"));
        assert!(!safety.is_urgent("Is a fast swimming backstroke good cardio?"));
    }

    #[test]
    fn preamble_refuses_diagnosis() {
        assert!(SAFETY_PREAMBLE.contains("MUST NOT diagnose"));
        assert!(SAFETY_PREAMBLE.contains("emergency services"));
    }
}
