//! The Weft fact store engine.
//!
//! One `FactStore` runs per collaboration space on the server (backed by
//! SQLite) and per open replica on the client (backed by the in-memory
//! storage). Both run the identical write and scan algorithms over the same
//! five secondary indexes; only the `Storage` backend differs.

pub mod engine;
pub mod error;
pub mod key;
pub mod migration;
pub mod sqlite;
pub mod storage;

pub use engine::FactStore;
pub use error::{Error, Result};
pub use sqlite::SqliteStorage;
pub use storage::{MemoryStorage, Storage};

#[cfg(test)]
mod tests;
