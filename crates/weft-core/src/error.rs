//! Error types for `weft-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The wire name does not match any registered mutation. The push handler
  /// skips these and still advances the client's watermark, so a stale
  /// client can never wedge its own queue.
  #[error("unknown mutation: {0:?}")]
  UnknownMutation(String),

  #[error("malformed args for mutation {name:?}: {source}")]
  MalformedArgs {
    name:   String,
    source: serde_json::Error,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
