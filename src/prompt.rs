//! Prompt builder: renders the wellness-plan and question templates.

use std::sync::LazyLock;

use regex::Regex;

use crate::profile::UserProfile;
use crate::safety::{SAFETY_PREAMBLE, SafetyLayer, URGENT_CARE_NOTE};

/// Marker the model is asked to end a plan with. Stripped before display.
pub const END_OF_PLAN: &str = "[END_OF_PLAN]";

/// Marker some models echo before a JSON profile dump. Stripped with the JSON.
static USER_DATA_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[USER_DATA_JSON\]\s*").expect("static regex is valid"));

/// Fallback for dumps that are not valid JSON: cut at the first closing brace.
static LOOSE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\{.*?\}").expect("static regex is valid"));

/// Which template to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind<'a> {
    /// Generate a fresh 10-point wellness plan.
    Plan,
    /// Answer a free-form question.
    Question(&'a str),
}

/// Build the full prompt text for `profile` and `kind`.
pub fn build_prompt(profile: &UserProfile, kind: PromptKind<'_>, safety: &SafetyLayer) -> String {
    let task = match kind {
        PromptKind::Plan => format!(
            "TASK: Create a personalised wellness plan for this user.\n\
             - Write EXACTLY 10 numbered points (1 to 10) covering diet, hydration, sleep, \
             activity, and lifestyle, tailored to the profile above.\n\
             - Take their recurring health issues into account without diagnosing them.\n\
             - After the 10 points add a one-line disclaimer that this is general advice, \
             not medical treatment.\n\
             - End the message with {END_OF_PLAN}"
        ),
        PromptKind::Question(question) => {
            let mut task = format!(
                "TASK: Answer the user's question below using their profile for context. \
                 Do not produce a full plan unless they ask for one.\n\n\
                 USER QUESTION:\n{}",
                question.trim()
            );
            if safety.is_urgent(question) {
                task.push_str("\n\n");
                task.push_str(URGENT_CARE_NOTE);
            }
            task
        }
    };

    format!(
        "{SAFETY_PREAMBLE}\n\n{}\n\n{task}",
        profile.to_prompt_section()
    )
}

/// Clean a generated plan for storage and display.
///
/// Removes the `[END_OF_PLAN]` marker and every `[USER_DATA_JSON] {...}`
/// block, including pretty-printed dumps spanning several lines.
pub fn parse_plan_response(response: &str) -> String {
    let mut plan = response.replace(END_OF_PLAN, "");
    while let Some(marker) = USER_DATA_JSON.find(&plan) {
        let end = marker.end() + json_object_len(&plan[marker.end()..]);
        let block = marker.start()..end;
        plan.replace_range(block, "");
    }
    plan.trim().to_string()
}

/// Byte length of the JSON object at the start of `text`, or 0 if none.
fn json_object_len(text: &str) -> usize {
    if !text.starts_with('{') {
        return 0;
    }
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>();
    match stream.next() {
        Some(Ok(_)) => stream.byte_offset(),
        _ => LOOSE_OBJECT.find(text).map_or(0, |m| m.end()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{FieldValue, ProfileField};

    fn profile() -> UserProfile {
        let mut p = UserProfile::new("7");
        p.set(ProfileField::Name, FieldValue::Text("Alex".into()));
        p.set(ProfileField::Age, FieldValue::Integer(30));
        p.set(ProfileField::RecurringIssues, FieldValue::Text("migraines".into()));
        p.next_field = None;
        p
    }

    #[test]
    fn plan_prompt_has_preamble_profile_and_task() {
        let prompt = build_prompt(&profile(), PromptKind::Plan, &SafetyLayer::new());
        assert!(prompt.starts_with(SAFETY_PREAMBLE));
        assert!(prompt.contains("Name: Alex"));
        assert!(prompt.contains("migraines"));
        assert!(prompt.contains("EXACTLY 10 numbered points"));
        assert!(prompt.contains(END_OF_PLAN));
        assert!(!prompt.contains("USER QUESTION"));
    }

    #[test]
    fn question_prompt_includes_question() {
        let prompt = build_prompt(
            &profile(),
            PromptKind::Question("  how to sleep better? "),
            &SafetyLayer::new(),
        );
        assert!(prompt.contains("USER QUESTION:\nhow to sleep better?"));
        assert!(prompt.contains("Age: 30"));
        assert!(!prompt.contains("EXACTLY 10"));
        assert!(!prompt.contains(URGENT_CARE_NOTE));
    }

    #[test]
    fn question_prompt_flags_emergencies() {
        let prompt = build_prompt(
            &profile(),
            PromptKind::Question("I have chest pain when climbing stairs"),
            &SafetyLayer::new(),
        );
        assert!(prompt.ends_with(URGENT_CARE_NOTE));
    }

    #[test]
    fn parse_plan_strips_markers() {
        let raw = "[USER_DATA_JSON] {\"name\": \"Alex\"}\n1. Drink water\n2. Sleep 8h\n[END_OF_PLAN]";
        assert_eq!(parse_plan_response(raw), "1. Drink water\n2. Sleep 8h");
    }

    #[test]
    fn parse_plan_without_markers_is_unchanged() {
        assert_eq!(parse_plan_response("  1. Walk daily  "), "1. Walk daily");
    }

    #[test]
    fn parse_plan_inline_marker() {
        assert_eq!(
            parse_plan_response("10. Rest well. [END_OF_PLAN]"),
            "10. Rest well."
        );
    }

    #[test]
    fn parse_plan_strips_pretty_printed_json() {
        let raw = "[USER_DATA_JSON] {\n  \"name\": \"Alex\",\n  \"age\": 30\n}\n1. Drink water\n[END_OF_PLAN]";
        assert_eq!(parse_plan_response(raw), "1. Drink water");
    }

    #[test]
    fn parse_plan_strips_nested_json_mid_text() {
        let raw = "1. Walk daily\n[USER_DATA_JSON]\n{\"profile\": {\"age\": 30}, \"tags\": [\"a}\"]}\n2. Sleep 8h";
        assert_eq!(parse_plan_response(raw), "1. Walk daily\n\n2. Sleep 8h");
    }

    #[test]
    fn parse_plan_strips_malformed_json_to_first_brace() {
        let raw = "[USER_DATA_JSON] {name: Alex}\n1. Stretch";
        assert_eq!(parse_plan_response(raw), "1. Stretch");
    }
}
