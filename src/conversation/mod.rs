//! Conversation handling: command parsing and the per-chat state machine.

pub mod command;
pub mod controller;

pub use command::Command;
pub use controller::{ConversationController, GENERIC_FAILURE};
