//! ConversationController: per-chat state machine.
//!
//! Every inbound message is dispatched on the chat's state:
//!
//! - no state and no stored profile: create the profile, ask for the name
//! - `Onboarding(field)`: validate the answer, store it, ask the next question;
//!   after the last field generate and store the first plan
//! - `Ready`: answer a free-form question with the profile as context
//!
//! `/reset` works in every state. A failure in the store or the generation
//! API is scoped to the one message: the user gets a retry notice and the
//! chat's state is left as it was.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::conversation::command::{Command, HELP_TEXT};
use crate::error::{DatabaseError, Error};
use crate::llm::{CompletionRequest, LlmProvider};
use crate::profile::{
    ConversationState, FieldValue, ProfileField, ProfileUpdate, UserProfile, parse_field,
};
use crate::prompt::{PromptKind, build_prompt, parse_plan_response};
use crate::safety::SafetyLayer;
use crate::store::{ProfileStore, Sender};

/// Reply sent when the store or the generation API fails.
pub const GENERIC_FAILURE: &str = "Sorry, I had a problem. Please try again in a moment.";

const WELCOME: &str = "Hi! I'm HealthMate, your personal wellness assistant. \
I'll ask a few quick questions to set up your profile.";

const PLAN_MAX_TOKENS: u32 = 2048;
const ANSWER_MAX_TOKENS: u32 = 1024;

/// Routes chat messages through onboarding, plan generation, and Q&A.
pub struct ConversationController {
    store: Arc<dyn ProfileStore>,
    llm: Arc<dyn LlmProvider>,
    safety: SafetyLayer,
    states: RwLock<HashMap<String, ConversationState>>,
}

impl ConversationController {
    pub fn new(store: Arc<dyn ProfileStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            store,
            llm,
            safety: SafetyLayer::new(),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Cached state for a chat, if it has been seen since startup.
    pub async fn state(&self, chat_id: &str) -> Option<ConversationState> {
        self.states.read().await.get(chat_id).copied()
    }

    /// Handle one inbound message and return the reply text.
    ///
    /// Never fails: errors become [`GENERIC_FAILURE`].
    pub async fn handle(&self, chat_id: &str, text: &str) -> String {
        self.log(chat_id, Sender::User, text).await;

        let reply = match self.dispatch(chat_id, Command::parse(text)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "Message handling failed");
                GENERIC_FAILURE.to_string()
            }
        };

        self.log(chat_id, Sender::Bot, &reply).await;
        reply
    }

    async fn dispatch(&self, chat_id: &str, command: Command) -> Result<String, Error> {
        let state = match self.load_state(chat_id).await? {
            Some(state) => state,
            None => return self.start_new(chat_id).await,
        };
        tracing::debug!(chat_id, %state, ?command, "Dispatching message");

        match (command, state) {
            (Command::Reset, _) => self.reset(chat_id).await,
            (Command::Help, _) => Ok(HELP_TEXT.to_string()),
            (Command::Start, ConversationState::Ready) => self.welcome_back(chat_id).await,
            (Command::Start, ConversationState::Onboarding(field)) => Ok(format!(
                "Let's pick up where we left off.\n\n{}",
                field.question()
            )),
            (Command::Plan, ConversationState::Ready) => self.regenerate_plan(chat_id).await,
            (Command::Profile, ConversationState::Ready) => {
                Ok(self.require_profile(chat_id).await?.summary())
            }
            (Command::Plan | Command::Profile, ConversationState::Onboarding(field)) => {
                Ok(format!(
                    "Let's finish setting up your profile first.\n\n{}",
                    field.question()
                ))
            }
            (Command::Text(text), ConversationState::Onboarding(field)) => {
                self.collect(chat_id, field, &text).await
            }
            (Command::Text(text), ConversationState::Ready) => self.answer(chat_id, &text).await,
        }
    }

    /// Resolve the chat's state, hydrating from the store on a cache miss.
    ///
    /// `None` means a new user with no stored profile.
    async fn load_state(&self, chat_id: &str) -> Result<Option<ConversationState>, Error> {
        if let Some(state) = self.state(chat_id).await {
            return Ok(Some(state));
        }

        let Some(profile) = self.store.get_profile(chat_id).await? else {
            return Ok(None);
        };
        let state = ConversationState::from_next_field(profile.next_field);
        tracing::debug!(chat_id, %state, "Hydrated conversation state from store");
        self.set_state(chat_id, state).await;
        Ok(Some(state))
    }

    async fn set_state(&self, chat_id: &str, state: ConversationState) {
        self.states.write().await.insert(chat_id.to_string(), state);
    }

    async fn require_profile(&self, chat_id: &str) -> Result<UserProfile, Error> {
        self.store.get_profile(chat_id).await?.ok_or_else(|| {
            Error::Database(DatabaseError::NotFound {
                entity: "profile".into(),
                id: chat_id.to_string(),
            })
        })
    }

    // ── Handlers ────────────────────────────────────────────────────

    async fn start_new(&self, chat_id: &str) -> Result<String, Error> {
        self.store
            .upsert_profile(chat_id, &ProfileUpdate::new(Some(ProfileField::FIRST)))
            .await?;
        self.set_state(chat_id, ConversationState::start()).await;
        tracing::info!(chat_id, "New user, onboarding started");

        Ok(format!("{WELCOME}\n\n{}", ProfileField::FIRST.question()))
    }

    async fn reset(&self, chat_id: &str) -> Result<String, Error> {
        self.store.clear_profile(chat_id).await?;
        self.set_state(chat_id, ConversationState::start()).await;

        Ok(format!(
            "Your profile has been reset. Let's start again.\n\n{}",
            ProfileField::FIRST.question()
        ))
    }

    async fn collect(&self, chat_id: &str, field: ProfileField, raw: &str) -> Result<String, Error> {
        let value = match parse_field(field, raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(chat_id, %field, "Rejected onboarding answer: {e}");
                return Ok(format!("{e}\n\n{}", field.question()));
            }
        };

        let Some(next) = field.next() else {
            return self.finish_onboarding(chat_id, field, value).await;
        };

        let ack = match field {
            ProfileField::Name => format!("Nice to meet you, {value}! "),
            _ => "Got it. ".to_string(),
        };

        self.store
            .upsert_profile(chat_id, &ProfileUpdate::new(Some(next)).with_value(field, value))
            .await?;
        self.set_state(chat_id, ConversationState::Onboarding(next)).await;

        Ok(format!("{ack}{}", next.question()))
    }

    /// Store the last answer, generate the first plan, and mark the profile
    /// complete. `next_field` stays on the last field until the plan is
    /// stored, so a failed generation can be retried by answering again.
    async fn finish_onboarding(
        &self,
        chat_id: &str,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<String, Error> {
        self.store
            .upsert_profile(chat_id, &ProfileUpdate::new(Some(field)).with_value(field, value))
            .await?;

        let profile = self.require_profile(chat_id).await?;
        let plan = self.generate_plan(&profile).await?;

        self.store.complete_onboarding(chat_id, &plan).await?;
        self.set_state(chat_id, ConversationState::Ready).await;
        tracing::info!(chat_id, "Onboarding complete");

        Ok(format!(
            "Thanks, {}! Your profile is complete. Here is your personalised wellness plan:\n\n{plan}",
            profile.display_name()
        ))
    }

    async fn regenerate_plan(&self, chat_id: &str) -> Result<String, Error> {
        let profile = self.require_profile(chat_id).await?;
        let plan = self.generate_plan(&profile).await?;
        self.store.save_plan(chat_id, &plan).await?;
        Ok(plan)
    }

    async fn welcome_back(&self, chat_id: &str) -> Result<String, Error> {
        let profile = self.require_profile(chat_id).await?;
        let mut reply = format!("Welcome back, {}!", profile.display_name());
        match profile.last_plan.as_deref() {
            Some(plan) => {
                reply.push_str(" Here is your latest wellness plan:\n\n");
                reply.push_str(plan);
                reply.push_str("\n\nAsk me anything, or send /plan for a fresh one.");
            }
            None => reply.push_str(" Send /plan to get a wellness plan, or ask me anything."),
        }
        Ok(reply)
    }

    async fn answer(&self, chat_id: &str, question: &str) -> Result<String, Error> {
        if question.is_empty() {
            return Ok("Ask me anything about your wellness, or send /help.".to_string());
        }
        let profile = self.require_profile(chat_id).await?;
        if self.safety.is_urgent(question) {
            tracing::info!(chat_id, "Question contains emergency red flags");
        }

        let prompt = build_prompt(&profile, PromptKind::Question(question), &self.safety);
        let answer = self
            .llm
            .generate(CompletionRequest::new(prompt).with_max_tokens(ANSWER_MAX_TOKENS))
            .await?;
        Ok(answer.trim().to_string())
    }

    async fn generate_plan(&self, profile: &UserProfile) -> Result<String, Error> {
        let prompt = build_prompt(profile, PromptKind::Plan, &self.safety);
        let raw = self
            .llm
            .generate(CompletionRequest::new(prompt).with_max_tokens(PLAN_MAX_TOKENS))
            .await?;
        Ok(parse_plan_response(&raw))
    }

    async fn log(&self, chat_id: &str, sender: Sender, message: &str) {
        if let Err(e) = self.store.log_message(chat_id, sender, message).await {
            tracing::warn!(chat_id, sender = sender.as_str(), "Failed to log message: {e}");
        }
    }
}
