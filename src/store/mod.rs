//! Persistence — unified `Database` trait with libSQL and in-memory
//! backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryBackend;
pub use traits::{Database, OauthStatus, UserRecord};
