//! Structured composite index keys.
//!
//! Keys are tuples of segments, not delimiter-joined strings, so an entity
//! or attribute containing a delimiter character can never bleed into a
//! neighbouring scan. Ordering is element-wise, which means every prefix
//! owns one contiguous key range and a prefix scan is a range scan.

use std::fmt;

/// The index a key lives in. One keyspace per secondary index, plus the
/// primary fact-by-id records, the message log, and store metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Keyspace {
  /// Fact records by id.
  Fact,
  /// (entity, attribute, fact id).
  Ea,
  /// (attribute, entity, fact id).
  Ae,
  /// (attribute, value) for unique attributes; at most one live entry.
  Av,
  /// (reference target, attribute, fact id); the reverse lookup.
  Va,
  /// (last-updated stamp, fact id); the time-ordered scan.
  Ti,
  /// (topic, stamp, message id).
  Message,
  /// Store metadata: watermarks, migration tag, claim guard.
  Meta,
}

impl Keyspace {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Fact => "fact",
      Self::Ea => "ea",
      Self::Ae => "ae",
      Self::Av => "av",
      Self::Va => "va",
      Self::Ti => "ti",
      Self::Message => "message",
      Self::Meta => "meta",
    }
  }
}

// ─── Key ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
  pub space: Keyspace,
  pub parts: Vec<String>,
}

impl Key {
  pub fn new(space: Keyspace, parts: Vec<String>) -> Self {
    debug_assert!(parts.len() <= 3);
    Self { space, parts }
  }

  pub fn fact(id: &str) -> Self {
    Self::new(Keyspace::Fact, vec![id.to_string()])
  }

  pub fn ea(entity: &str, attribute: &str, fact_id: &str) -> Self {
    Self::new(Keyspace::Ea, vec![
      entity.to_string(),
      attribute.to_string(),
      fact_id.to_string(),
    ])
  }

  pub fn ae(attribute: &str, entity: &str, fact_id: &str) -> Self {
    Self::new(Keyspace::Ae, vec![
      attribute.to_string(),
      entity.to_string(),
      fact_id.to_string(),
    ])
  }

  pub fn av(attribute: &str, value: &str) -> Self {
    Self::new(Keyspace::Av, vec![attribute.to_string(), value.to_string()])
  }

  pub fn va(target: &str, attribute: &str, fact_id: &str) -> Self {
    Self::new(Keyspace::Va, vec![
      target.to_string(),
      attribute.to_string(),
      fact_id.to_string(),
    ])
  }

  pub fn ti(stamp: &str, fact_id: &str) -> Self {
    Self::new(Keyspace::Ti, vec![stamp.to_string(), fact_id.to_string()])
  }

  pub fn message(topic: &str, ts: &str, id: &str) -> Self {
    Self::new(Keyspace::Message, vec![
      topic.to_string(),
      ts.to_string(),
      id.to_string(),
    ])
  }

  pub fn meta(name: &str) -> Self {
    Self::new(Keyspace::Meta, vec![name.to_string()])
  }

  /// A metadata key qualified by a second segment, e.g. a per-client
  /// watermark.
  pub fn meta_scoped(name: &str, scope: &str) -> Self {
    Self::new(Keyspace::Meta, vec![name.to_string(), scope.to_string()])
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.space.as_str(), self.parts.join("/"))
  }
}

// ─── Prefix ──────────────────────────────────────────────────────────────────

/// A scan prefix: a keyspace plus zero or more leading segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
  pub space: Keyspace,
  pub parts: Vec<String>,
}

impl Prefix {
  pub fn new(space: Keyspace, parts: Vec<String>) -> Self {
    Self { space, parts }
  }

  pub fn matches(&self, key: &Key) -> bool {
    key.space == self.space
      && key.parts.len() >= self.parts.len()
      && key.parts[..self.parts.len()] == self.parts[..]
  }
}
