//! Fact types, the atomic unit of truth.
//!
//! A fact is a triple (entity, attribute, value) plus bookkeeping metadata.
//! Facts are never physically deleted; retraction rewrites the record in
//! place with `retracted: true`, and every scan filters retracted copies
//! out. The attribute's schema is frozen into the fact at write time.

use std::{cmp::Ordering, collections::BTreeMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::Schema;

/// Mint a fresh fact or entity id: time-sortable, globally unique, and
/// mintable on either side of the sync boundary.
pub fn new_id() -> String {
  Uuid::now_v7().to_string()
}

/// The current wall clock as a zero-padded decimal-millisecond string, so
/// lexicographic order equals numeric order. Used for `lastUpdated` stamps,
/// the time-ordered index, and pull cookies.
pub fn timestamp_now() -> String {
  format!("{:016}", Utc::now().timestamp_millis())
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// The payload of a fact. Scalars are bare JSON on the wire; structured
/// payloads carry a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Boolean(bool),
  Number(f64),
  String(String),
  Composite(CompositeValue),
}

/// Tagged value payloads: references to other entities, ordered parent
/// links, flag markers, opaque file handles, and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompositeValue {
  Reference {
    value: String,
  },
  /// A parent link with a fractional sort key; the position orders this
  /// entity among its siblings under the same parent.
  Parent {
    value:    String,
    position: String,
  },
  Flag,
  /// Blob storage is out of scope: file values hold only an opaque id.
  File {
    id: String,
  },
  IsoString {
    value: String,
  },
  #[serde(rename = "yyyy-mm-dd")]
  CalendarDate {
    value: String,
  },
}

impl Value {
  pub fn reference(entity: impl Into<String>) -> Self {
    Self::Composite(CompositeValue::Reference { value: entity.into() })
  }

  pub fn parent(entity: impl Into<String>, position: impl Into<String>) -> Self {
    Self::Composite(CompositeValue::Parent {
      value:    entity.into(),
      position: position.into(),
    })
  }

  pub fn flag() -> Self {
    Self::Composite(CompositeValue::Flag)
  }

  /// The entity a reference- or parent-typed value points at. These are the
  /// values that populate the reverse (`vae`) index.
  pub fn reference_target(&self) -> Option<&str> {
    match self {
      Self::Composite(CompositeValue::Reference { value }) => Some(value),
      Self::Composite(CompositeValue::Parent { value, .. }) => Some(value),
      _ => None,
    }
  }

  /// The fractional sort key of a parent-typed value.
  pub fn parent_position(&self) -> Option<&str> {
    match self {
      Self::Composite(CompositeValue::Parent { position, .. }) => Some(position),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }

  /// The string form indexed by the unique-value (`av`) index.
  pub fn lexical(&self) -> String {
    match self {
      Self::String(s) => s.clone(),
      Self::Number(n) => n.to_string(),
      Self::Boolean(b) => b.to_string(),
      Self::Composite(c) => {
        serde_json::to_string(c).unwrap_or_default()
      }
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Self::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Self::String(s)
  }
}

impl From<f64> for Value {
  fn from(n: f64) -> Self {
    Self::Number(n)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Self::Boolean(b)
  }
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// A stored fact. The wire shape matches the serde names exactly; the
/// store-side index keys are not part of this struct (they are attached at
/// serialization time, see [`crate::sync::FactWithIndexes`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
  pub id:           String,
  pub entity:       String,
  pub attribute:    String,
  pub value:        Value,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub retracted:    bool,
  pub last_updated: String,
  pub schema:       Schema,
  /// Per-index fractional sort keys, used to keep ordered lists of facts
  /// sharing an (entity, attribute) stable under insertion.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub positions:    Option<BTreeMap<String, String>>,
}

/// Input to `assert_fact`. The store resolves the schema, assigns the id
/// (unless the caller pins one) and the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactInput {
  pub entity:    String,
  pub attribute: String,
  pub value:     Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fact_id:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub positions: Option<BTreeMap<String, String>>,
}

impl FactInput {
  pub fn new(
    entity: impl Into<String>,
    attribute: impl Into<String>,
    value: Value,
  ) -> Self {
    Self {
      entity: entity.into(),
      attribute: attribute.into(),
      value,
      fact_id: None,
      positions: None,
    }
  }
}

/// Partial data merged onto an existing fact by `update_fact`. `positions`
/// entries are merged key-by-key; other fields replace wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub attribute: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value:     Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub positions: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retracted: Option<bool>,
}

// ─── Ordering helpers ────────────────────────────────────────────────────────

/// Order parent-link facts by fractional position, fact id as tiebreak.
pub fn sort_by_position(a: &Fact, b: &Fact) -> Ordering {
  let ap = a.value.parent_position().unwrap_or("");
  let bp = b.value.parent_position().unwrap_or("");
  ap.cmp(bp).then_with(|| a.id.cmp(&b.id))
}

/// The fact's fractional sort key under a named index, from its `positions`
/// map.
pub fn position_in<'f>(fact: &'f Fact, index: &str) -> Option<&'f str> {
  fact
    .positions
    .as_ref()
    .and_then(|p| p.get(index))
    .map(String::as_str)
}
