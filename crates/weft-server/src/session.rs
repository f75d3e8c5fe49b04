//! Session verification.
//!
//! The identity provider is a black box: the store consumes only
//! `verify(token) -> Option<Session>` and never inspects credentials.
//! Membership in a space is a separate concern, expressed as a
//! `space/member` fact keyed by the session's studio.

use std::collections::HashMap;

use serde::Deserialize;
use sha2::{Digest, Sha256};

/// An authenticated session: who is acting, and from which studio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub username: String,
  pub studio:   String,
}

pub trait SessionVerifier: Send + Sync {
  fn verify(&self, token: &str) -> Option<Session>;
}

// ─── Static token table ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SessionEntry {
  pub username: String,
  pub studio:   String,
}

/// Token table loaded from configuration, keyed by SHA-256 digest so the
/// config file never holds a raw secret.
#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
  tokens: HashMap<String, SessionEntry>,
}

impl StaticSessions {
  pub fn new(tokens: HashMap<String, SessionEntry>) -> Self {
    Self { tokens }
  }

  /// The digest under which a raw token is looked up; exposed so operators
  /// can derive config entries.
  pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
  }
}

impl SessionVerifier for StaticSessions {
  fn verify(&self, token: &str) -> Option<Session> {
    self.tokens.get(&Self::digest(token)).map(|entry| Session {
      username: entry.username.clone(),
      studio:   entry.studio.clone(),
    })
  }
}
