//! HealthMate: a Telegram wellness assistant.
//!
//! Onboards each chat through a fixed set of profile questions, stores the
//! profile in libSQL, and answers with LLM-generated wellness plans and
//! replies.

pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod profile;
pub mod prompt;
pub mod routes;
pub mod safety;
pub mod store;
