//! Core types and trait definitions for the Weft fact store.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! mutation registry in particular must link unchanged into both the client
//! replica and the server, because optimistic local execution and
//! authoritative server replay have to run the exact same logic.

pub mod context;
pub mod error;
pub mod fact;
pub mod fractional;
pub mod links;
pub mod message;
pub mod mutations;
pub mod schema;
pub mod sync;

pub use error::{Error, Result};
