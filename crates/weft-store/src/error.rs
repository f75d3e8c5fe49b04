//! Error types for `weft-store`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] tokio_rusqlite::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage mutex poisoned")]
  Poisoned,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
