//! Storage for the chore record.
//!
//! [`ChoreStore`] owns the read/validate/stamp/backup rules for one named
//! record. The bytes go through a [`KvBackend`](chorebot_core::KvBackend):
//! SQLite in production, an in-process map for tests.

pub mod chore_store;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chore_store::ChoreStore;
pub use in_memory::InMemoryBackend;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
