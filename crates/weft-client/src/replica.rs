//! The optimistic local replica.
//!
//! A replica keeps two stores over the in-memory backend: the base mirror,
//! which holds exactly what the server has confirmed through pulls, and the
//! speculative store, which is the base plus the pending mutation queue
//! replayed on top. Queries read the speculative store; pulls patch the
//! base and rebase the queue, so abandoned or reordered speculation never
//! survives reconciliation.

use chrono::Utc;
use serde_json::Value as JsonValue;
use weft_core::{
  mutations::Mutation,
  schema,
  sync::{
    MutationEnvelope, PUSH_VERSION, PatchOp, PatchValue, PullResponse,
    PushRequest,
  },
};
use weft_store::{FactStore, MemoryStorage};

use crate::Result;

/// A locally-executed mutation awaiting server acknowledgement. The wire
/// args are captured at queue time so the push payload matches what was
/// executed, byte for byte.
pub struct PendingMutation {
  pub id:        u64,
  pub mutation:  Mutation,
  pub args:      JsonValue,
  pub timestamp: i64,
}

pub struct Replica {
  client_id:   String,
  /// What the server has confirmed; patched only by [`Replica::apply_pull`].
  base:        FactStore<MemoryStorage>,
  /// Base plus the pending queue; the store queries read.
  speculative: FactStore<MemoryStorage>,
  pending:     Vec<PendingMutation>,
  /// Strictly increasing across the replica's lifetime, never reused even
  /// after acknowledged mutations are dropped.
  next_id:     u64,
  cookie:      Option<String>,
}

impl Replica {
  pub fn new(client_id: impl Into<String>) -> Result<Self> {
    let base = FactStore::new(MemoryStorage::new());
    let speculative = FactStore::new(base.storage().snapshot()?);
    Ok(Self {
      client_id: client_id.into(),
      base,
      speculative,
      pending: Vec::new(),
      next_id: 1,
      cookie: None,
    })
  }

  pub fn client_id(&self) -> &str {
    &self.client_id
  }

  pub fn cookie(&self) -> Option<&str> {
    self.cookie.as_deref()
  }

  /// The store queries run against: confirmed state plus local speculation.
  pub fn store(&self) -> &FactStore<MemoryStorage> {
    &self.speculative
  }

  pub(crate) fn mirror(&self) -> &FactStore<MemoryStorage> {
    &self.base
  }

  pub fn pending_count(&self) -> usize {
    self.pending.len()
  }

  // ── Mutation entry points ─────────────────────────────────────────────────

  /// Resolve a wire (name, args) pair and run it. An unregistered name or
  /// malformed args is a caller bug on this side of the protocol and
  /// surfaces as an error instead of being skipped.
  pub async fn mutate(&mut self, name: &str, args: JsonValue) -> Result<()> {
    let mutation = Mutation::from_wire(name, args)?;
    self.run(mutation).await
  }

  /// Execute a mutation against the speculative store and queue it for the
  /// next push.
  pub async fn run(&mut self, mutation: Mutation) -> Result<()> {
    mutation.apply(&self.speculative).await?;
    let args = mutation.wire_args()?;
    self.pending.push(PendingMutation {
      id: self.next_id,
      mutation,
      args,
      timestamp: Utc::now().timestamp_millis(),
    });
    self.next_id += 1;
    Ok(())
  }

  // ── Sync ──────────────────────────────────────────────────────────────────

  /// The push payload for the current queue; `None` when there is nothing
  /// to send. Pushing is idempotent server-side, so the same payload may be
  /// retried until a pull confirms it.
  pub fn push_request(&self, token: &str) -> Option<PushRequest> {
    if self.pending.is_empty() {
      return None;
    }
    Some(PushRequest {
      token:          token.to_string(),
      client_id:      self.client_id.clone(),
      mutations:      self
        .pending
        .iter()
        .map(|p| MutationEnvelope {
          id:        p.id,
          name:      p.mutation.name().to_string(),
          args:      p.args.clone(),
          timestamp: p.timestamp,
        })
        .collect(),
      push_version:   PUSH_VERSION,
      schema_version: schema::SCHEMA_VERSION.to_string(),
    })
  }

  /// Patch the base mirror with a pull response, drop every pending
  /// mutation the server has already applied, and rebase the remainder
  /// onto the fresh base.
  pub async fn apply_pull(&mut self, response: &PullResponse) -> Result<()> {
    for op in &response.patch {
      match op {
        PatchOp::Put { value: PatchValue::Fact(fact), .. } => {
          self.base.apply_remote_fact(fact.fact.clone()).await?;
        }
        PatchOp::Put { value: PatchValue::Message(message), .. } => {
          self.base.apply_remote_message(message.message.clone()).await?;
        }
        PatchOp::Del { key } => {
          self.base.remove_fact(key).await?;
        }
      }
    }
    self.cookie = Some(response.cookie.clone());

    let before = self.pending.len();
    self.pending.retain(|p| p.id > response.last_mutation_id);
    if self.pending.len() < before {
      tracing::debug!(
        acknowledged = before - self.pending.len(),
        remaining = self.pending.len(),
        "dropped acknowledged mutations"
      );
    }

    self.rebase().await
  }

  /// Rebuild the speculative store: snapshot the base and replay the
  /// unacknowledged queue in order. A mutation that fails during replay is
  /// logged and kept in the queue; the server's replay of it is what
  /// decides its real outcome.
  async fn rebase(&mut self) -> Result<()> {
    let speculative = FactStore::new(self.base.storage().snapshot()?);
    for pending in &self.pending {
      if let Err(error) = pending.mutation.apply(&speculative).await {
        tracing::warn!(
          id = pending.id,
          mutation = pending.mutation.name(),
          %error,
          "mutation failed during rebase"
        );
      }
    }
    self.speculative = speculative;
    Ok(())
  }
}
