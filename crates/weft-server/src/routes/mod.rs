//! Route handlers for the sync protocol.
//!
//! The protocol logic lives in backend-generic `apply_*` functions so tests
//! can drive it against in-memory stores; the axum handlers are thin
//! wrappers that resolve the space and serialize JSON.

pub mod claim;
pub mod poke;
pub mod pull;
pub mod push;
