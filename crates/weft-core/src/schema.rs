//! The attribute schema registry.
//!
//! A pure, static mapping from attribute name to value shape, cardinality,
//! and uniqueness. Every write consults it; the resolved schema is then
//! frozen into the fact itself so index maintenance never needs a second
//! lookup. The registry ships identically in every binary that links this
//! crate, which is what makes client-side speculation and server-side replay
//! agree.

use serde::{Deserialize, Serialize};

/// Fingerprint of the attribute table, carried in every push request. A
/// mismatch between client and server is logged, never fatal; recovering
/// from a genuine registry divergence is a migration concern.
pub const SCHEMA_VERSION: &str = "2026-07-14.1";

// ─── Schema ──────────────────────────────────────────────────────────────────

/// How many live facts one (entity, attribute) slot may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
  One,
  Many,
}

/// The shape of an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
  String,
  Number,
  Boolean,
  Reference,
  Parent,
  Flag,
  Timestamp,
  File,
  Union,
}

/// The resolved schema for one attribute. Copied into every fact at write
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
  #[serde(rename = "type")]
  pub value_type:  ValueType,
  pub cardinality: Cardinality,
  pub unique:      bool,
}

impl Schema {
  pub const fn new(
    value_type: ValueType,
    cardinality: Cardinality,
    unique: bool,
  ) -> Self {
    Self { value_type, cardinality, unique }
  }

  /// Reference- and parent-typed values appear in the reverse (`vae`) index.
  pub fn is_referential(&self) -> bool {
    matches!(self.value_type, ValueType::Reference | ValueType::Parent)
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Resolve an attribute name to its schema. Unknown attribute: `None`, and
/// any assert against it is refused.
pub fn resolve(attribute: &str) -> Option<Schema> {
  use Cardinality::{Many, One};
  use ValueType as T;

  let schema = match attribute {
    // Self-describing base attributes.
    "name" => Schema::new(T::String, One, true),
    "unique" => Schema::new(T::Boolean, One, false),
    "type" => Schema::new(T::Union, One, false),
    "union/value" => Schema::new(T::String, Many, false),
    "cardinality" => Schema::new(T::Union, One, false),

    // Outliner blocks.
    "block/parent" => Schema::new(T::Parent, One, false),
    "block/content" => Schema::new(T::String, One, false),

    // Cards.
    "card/title" => Schema::new(T::String, One, true),
    "card/inline-links-to" => Schema::new(T::Reference, Many, false),
    "card/created-by" => Schema::new(T::Reference, One, false),
    "card/unread-by" => Schema::new(T::Reference, Many, false),
    "card/image" => Schema::new(T::File, One, false),
    "card/date" => Schema::new(T::Timestamp, One, false),

    // Collections.
    "deck/contains" => Schema::new(T::Reference, Many, false),
    "desktop/contains" => Schema::new(T::Reference, Many, false),
    "home" => Schema::new(T::Flag, One, false),

    // Space metadata and membership.
    "space/member" => Schema::new(T::String, One, true),
    "space/name" => Schema::new(T::String, One, true),
    "member/name" => Schema::new(T::String, One, true),
    "this/name" => Schema::new(T::String, One, true),
    "this/description" => Schema::new(T::String, One, false),
    "room/name" => Schema::new(T::String, One, false),
    "canvas/height" => Schema::new(T::Number, One, false),

    _ => return None,
  };
  Some(schema)
}

/// The closed set of values a union-typed attribute accepts.
pub fn union_members(attribute: &str) -> Option<&'static [&'static str]> {
  match attribute {
    "type" => Some(&[
      "string",
      "number",
      "boolean",
      "reference",
      "parent",
      "flag",
      "timestamp",
      "file",
      "union",
    ]),
    "cardinality" => Some(&["one", "many"]),
    _ => None,
  }
}
