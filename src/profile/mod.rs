//! User profile and onboarding.
//!
//! A new chat is walked through a fixed list of questions, one field at a
//! time. Each validated answer is written to the profile store immediately,
//! together with the next field to ask, so onboarding resumes after a restart.

pub mod model;
pub mod state;
pub mod validate;

pub use model::{FieldValue, ProfileUpdate, UserProfile};
pub use state::{ConversationState, ProfileField};
pub use validate::parse_field;
