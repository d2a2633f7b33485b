//! Archive index implementations.
//!
//! - `local`: in-memory map for unit testing and local development
//! - `sqlite`: durable single-file database, the production backend
pub mod local;
#[cfg(feature = "sqlite-repo")]
pub mod sqlite;

pub use local::LocalRepository;
#[cfg(feature = "sqlite-repo")]
pub use sqlite::SqliteRepository;
