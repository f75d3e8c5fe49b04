//! The capability interface mutations run against.
//!
//! Mutations never touch an index directly; every read and write funnels
//! through this trait, which is the single choke point for schema and
//! uniqueness checks. The store engine implements it on the server and the
//! client replica implements it over its mirrored index, so the same
//! mutation body produces convergent results on both sides.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  fact::{Fact, FactInput, FactUpdate},
  message::NewMessage,
};

// ─── Assert outcome ──────────────────────────────────────────────────────────

/// Why an assert was refused. Refusal is a value, not an error: the store is
/// left untouched and the caller decides whether it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
  UnknownAttribute,
  UniqueConflict,
  NotInUnion,
}

/// Result of an assert: either the id of the written fact (which may be a
/// reused cardinality-one slot id rather than the caller's), or a refusal.
#[derive(Debug, Clone, PartialEq)]
pub enum AssertOutcome {
  Asserted { fact_id: String },
  Rejected(RejectReason),
}

impl AssertOutcome {
  pub fn fact_id(&self) -> Option<&str> {
    match self {
      Self::Asserted { fact_id } => Some(fact_id),
      Self::Rejected(_) => None,
    }
  }

  pub fn is_asserted(&self) -> bool {
    matches!(self, Self::Asserted { .. })
  }
}

// ─── Scan result ─────────────────────────────────────────────────────────────

/// Result shape of the `eav` scan. A lookup scoped to a cardinality-one
/// attribute collapses to a single fact-or-none; everything else is a list.
/// Callers rely on this polymorphism instead of indexing `[0]` themselves.
#[derive(Debug, Clone)]
pub enum EavResult {
  One(Option<Fact>),
  Many(Vec<Fact>),
}

impl EavResult {
  pub fn one(self) -> Option<Fact> {
    match self {
      Self::One(fact) => fact,
      Self::Many(mut facts) => {
        if facts.is_empty() {
          None
        } else {
          Some(facts.remove(0))
        }
      }
    }
  }

  pub fn many(self) -> Vec<Fact> {
    match self {
      Self::Many(facts) => facts,
      Self::One(fact) => fact.into_iter().collect(),
    }
  }
}

// ─── Server effects ──────────────────────────────────────────────────────────

/// A post-commit, server-only side effect queued by a mutation. Effects are
/// side channels (cross-space notifications and the like) and are never
/// required for the correctness of the mutation's own store writes. Client
/// replicas drop them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEffect {
  /// Ask another space to refresh its copy of this space's metadata.
  NotifySpace { space: String },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Capability interface for mutation bodies: asserts, retractions, partial
/// updates, the four index scans, the message log, and the server-effect
/// escape hatch. Nothing else.
pub trait MutationContext {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Write a fact. Cardinality-one slots reuse the existing live fact's id;
  /// unique attributes refuse values already held by another entity.
  fn assert_fact(
    &self,
    input: FactInput,
  ) -> impl Future<Output = Result<AssertOutcome, Self::Error>> + Send;

  /// Mark a fact retracted. Missing ids are a benign no-op.
  fn retract_fact(
    &self,
    id: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Merge partial data onto an existing fact. `false` when the fact does
  /// not exist or the resulting attribute has no schema.
  fn update_fact(
    &self,
    id: &str,
    data: FactUpdate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  /// Append to the discussion log.
  fn post_message(
    &self,
    message: NewMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// All live facts for an entity, optionally scoped to one attribute.
  fn eav(
    &self,
    entity: &str,
    attribute: Option<&str>,
  ) -> impl Future<Output = Result<EavResult, Self::Error>> + Send;

  /// All live facts for an attribute, optionally scoped to one entity.
  fn aev(
    &self,
    attribute: &str,
    entity: Option<&str>,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send;

  /// Point lookup: the live fact holding `value` under a unique attribute.
  fn ave(
    &self,
    attribute: &str,
    value: &str,
  ) -> impl Future<Output = Result<Option<Fact>, Self::Error>> + Send;

  /// Reverse lookup: all live facts whose reference- or parent-typed value
  /// points at `entity`, optionally filtered by attribute.
  fn vae(
    &self,
    entity: &str,
    attribute: Option<&str>,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send;

  /// Queue a post-commit, server-only side effect. No-op on client replicas.
  fn run_on_server(&self, effect: ServerEffect);
}
