//! The Weft client replica.
//!
//! A replica executes mutations optimistically against a mirrored in-memory
//! index, queues them for push, and reconciles against the server's pulled
//! state by rebasing the unacknowledged queue onto the fresh mirror. UI
//! concerns (rendering, subscriptions, input handling) live elsewhere; this
//! crate is the data layer only.

pub mod error;
pub mod replica;
pub mod undo;

pub use error::{Error, Result};
pub use replica::Replica;
pub use undo::{ActionGroup, Op, UndoManager};
