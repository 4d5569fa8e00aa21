//! Persistence layer: libSQL-backed profile store and conversation log.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{LoggedMessage, ProfileStore, Sender};
