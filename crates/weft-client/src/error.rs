//! Error types for `weft-client`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] weft_core::Error),

  #[error(transparent)]
  Store(#[from] weft_store::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
