//! The fact store engine: schema-checked writes with five-index
//! maintenance.
//!
//! Every write funnels through [`FactStore::write_fact`], which removes the
//! old copy's index entries before inserting the new ones. A stale index
//! entry is a correctness bug, not just leaked space: scans would resurrect
//! values that no longer exist. Index writes are not atomic across a crash
//! (this is a best-effort store, not a WAL-backed transactional database)
//! but every write path is idempotent under retry.

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use weft_core::{
  context::{
    AssertOutcome, EavResult, MutationContext, RejectReason, ServerEffect,
  },
  fact::{self, Fact, FactInput, FactUpdate},
  message::{Message, NewMessage},
  schema::{self, Cardinality, ValueType},
  sync::{FactWithIndexes, MessageWithIndexes, PatchOp, PatchValue},
};

use crate::{
  Error, Result,
  key::{Key, Keyspace, Prefix},
  storage::Storage,
};

enum WriteOutcome {
  Written,
  UniqueConflict,
}

/// One fact store: authoritative per space on the server, mirrored per
/// replica on the client. The same write and scan algorithms run on both;
/// only the storage backend differs.
///
/// The write lock serializes the read-check-write sequences inside asserts,
/// retractions, and updates. It is owned by this store instance, never
/// shared process-wide, so independent spaces proceed in parallel.
pub struct FactStore<S: Storage> {
  storage:    S,
  write_lock: Mutex<()>,
  effects:    std::sync::Mutex<Vec<ServerEffect>>,
}

impl<S: Storage> FactStore<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage,
      write_lock: Mutex::new(()),
      effects: std::sync::Mutex::new(Vec::new()),
    }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  // ── Fact records ──────────────────────────────────────────────────────────

  /// Fetch a fact by id, retracted or not.
  pub async fn get_fact(&self, id: &str) -> Result<Option<Fact>> {
    match self.storage.get(&Key::fact(id)).await? {
      Some(value) => Ok(Some(serde_json::from_value(value)?)),
      None => Ok(None),
    }
  }

  /// Remove every index entry pointing at `old`.
  async fn delete_index_entries(&self, old: &Fact) -> Result<()> {
    self
      .storage
      .delete(&Key::ea(&old.entity, &old.attribute, &old.id))
      .await?;
    self
      .storage
      .delete(&Key::ae(&old.attribute, &old.entity, &old.id))
      .await?;
    self.storage.delete(&Key::ti(&old.last_updated, &old.id)).await?;
    if old.schema.unique {
      self
        .storage
        .delete(&Key::av(&old.attribute, &old.value.lexical()))
        .await?;
    }
    if let Some(target) = old.value.reference_target() {
      self
        .storage
        .delete(&Key::va(target, &old.attribute, &old.id))
        .await?;
    }
    Ok(())
  }

  /// Write `fact` and every index entry derived from it, removing the old
  /// copy's entries first. Callers hold the write lock.
  async fn write_fact(&self, fact: &Fact) -> Result<()> {
    if let Some(old) = self.get_fact(&fact.id).await? {
      self.delete_index_entries(&old).await?;
    }

    let json = serde_json::to_value(fact)?;
    self.storage.put(Key::fact(&fact.id), json.clone()).await?;
    self
      .storage
      .put(Key::ea(&fact.entity, &fact.attribute, &fact.id), json.clone())
      .await?;
    self
      .storage
      .put(Key::ae(&fact.attribute, &fact.entity, &fact.id), json.clone())
      .await?;
    self
      .storage
      .put(Key::ti(&fact.last_updated, &fact.id), json.clone())
      .await?;
    if fact.schema.unique {
      self
        .storage
        .put(Key::av(&fact.attribute, &fact.value.lexical()), json.clone())
        .await?;
    }
    if let Some(target) = fact.value.reference_target() {
      self
        .storage
        .put(Key::va(target, &fact.attribute, &fact.id), json)
        .await?;
    }
    Ok(())
  }

  /// [`write_fact`] behind the uniqueness probe: refuse a value already
  /// held live by a different fact under the same unique attribute.
  async fn write_fact_checked(&self, fact: &Fact) -> Result<WriteOutcome> {
    if fact.schema.unique {
      if let Some(existing) =
        self.ave(&fact.attribute, &fact.value.lexical()).await?
      {
        if existing.id != fact.id {
          return Ok(WriteOutcome::UniqueConflict);
        }
      }
    }
    self.write_fact(fact).await?;
    Ok(WriteOutcome::Written)
  }

  // ── Public writes ─────────────────────────────────────────────────────────

  /// Assert a fact. Fails as a value (never an error) on unknown
  /// attributes, union violations, and uniqueness collisions.
  ///
  /// For a cardinality-one attribute the existing live fact's id is reused
  /// and overwritten in place, ignoring any caller-supplied id. Racing
  /// asserts to the same slot therefore converge on a single live fact no
  /// matter the arrival order.
  pub async fn assert_fact(&self, input: FactInput) -> Result<AssertOutcome> {
    let _guard = self.write_lock.lock().await;

    let Some(resolved) = schema::resolve(&input.attribute) else {
      return Ok(AssertOutcome::Rejected(RejectReason::UnknownAttribute));
    };
    if resolved.value_type == ValueType::Union {
      let members = schema::union_members(&input.attribute).unwrap_or(&[]);
      let in_union = input
        .value
        .as_str()
        .is_some_and(|v| members.contains(&v));
      if !in_union {
        return Ok(AssertOutcome::Rejected(RejectReason::NotInUnion));
      }
    }

    let mut fact_id = input.fact_id.unwrap_or_else(fact::new_id);
    let mut positions = input.positions;
    if resolved.cardinality == Cardinality::One {
      let slot = self.eav_scan(&input.entity, Some(&input.attribute)).await?;
      if let Some(existing) = slot.into_iter().next() {
        fact_id = existing.id;
        if positions.is_none() {
          positions = existing.positions;
        }
      }
    }

    let fact = Fact {
      id: fact_id.clone(),
      entity: input.entity,
      attribute: input.attribute,
      value: input.value,
      retracted: false,
      last_updated: fact::timestamp_now(),
      schema: resolved,
      positions,
    };

    match self.write_fact_checked(&fact).await? {
      WriteOutcome::Written => Ok(AssertOutcome::Asserted { fact_id }),
      WriteOutcome::UniqueConflict => {
        Ok(AssertOutcome::Rejected(RejectReason::UniqueConflict))
      }
    }
  }

  /// Rewrite a fact in place as retracted, through the same
  /// index-maintenance path as assert. The record stays addressable by id;
  /// scans stop returning it. Missing ids are a benign no-op (double
  /// retraction from a race is expected).
  pub async fn retract_fact(&self, id: &str) -> Result<()> {
    let _guard = self.write_lock.lock().await;
    let Some(mut fact) = self.get_fact(id).await? else {
      return Ok(());
    };
    fact.retracted = true;
    fact.last_updated = fact::timestamp_now();
    self.write_fact(&fact).await?;
    Ok(())
  }

  /// Merge partial data onto an existing fact, refresh its timestamp, and
  /// rewrite it through the assert path. `positions` entries merge
  /// key-by-key; everything else replaces wholesale.
  ///
  /// An update that changes the attribute resolves the new schema and
  /// re-validates uniqueness under it; a collision refuses the update
  /// (`false`) rather than clobbering another entity's unique value.
  pub async fn update_fact(&self, id: &str, data: FactUpdate) -> Result<bool> {
    let _guard = self.write_lock.lock().await;
    let Some(existing) = self.get_fact(id).await? else {
      return Ok(false);
    };

    let attribute = data.attribute.unwrap_or_else(|| existing.attribute.clone());
    let Some(resolved) = schema::resolve(&attribute) else {
      return Ok(false);
    };

    let mut positions = existing.positions.clone().unwrap_or_default();
    if let Some(incoming) = data.positions {
      positions.extend(incoming);
    }

    let fact = Fact {
      id: existing.id.clone(),
      entity: existing.entity.clone(),
      attribute,
      value: data.value.unwrap_or_else(|| existing.value.clone()),
      retracted: data.retracted.unwrap_or(existing.retracted),
      last_updated: fact::timestamp_now(),
      schema: resolved,
      positions: if positions.is_empty() {
        None
      } else {
        Some(positions)
      },
    };

    match self.write_fact_checked(&fact).await? {
      WriteOutcome::Written => Ok(true),
      WriteOutcome::UniqueConflict => Ok(false),
    }
  }

  // ── Scans ─────────────────────────────────────────────────────────────────

  async fn live_facts(&self, prefix: Prefix) -> Result<Vec<Fact>> {
    let mut facts = Vec::new();
    for (_, value) in self.storage.list_prefix(&prefix).await? {
      let fact: Fact = serde_json::from_value(value)?;
      if !fact.retracted {
        facts.push(fact);
      }
    }
    Ok(facts)
  }

  async fn eav_scan(
    &self,
    entity: &str,
    attribute: Option<&str>,
  ) -> Result<Vec<Fact>> {
    let mut parts = vec![entity.to_string()];
    if let Some(attribute) = attribute {
      parts.push(attribute.to_string());
    }
    self.live_facts(Prefix::new(Keyspace::Ea, parts)).await
  }

  /// All live facts for an entity, optionally scoped to one attribute. A
  /// lookup scoped to a cardinality-one attribute collapses to
  /// [`EavResult::One`]; this polymorphic shape is part of the contract.
  pub async fn eav(
    &self,
    entity: &str,
    attribute: Option<&str>,
  ) -> Result<EavResult> {
    let mut facts = self.eav_scan(entity, attribute).await?;
    match attribute.and_then(schema::resolve) {
      Some(resolved) if resolved.cardinality == Cardinality::One => {
        Ok(EavResult::One(if facts.is_empty() {
          None
        } else {
          Some(facts.remove(0))
        }))
      }
      _ => Ok(EavResult::Many(facts)),
    }
  }

  /// All live facts for an attribute, optionally scoped to one entity.
  pub async fn aev(
    &self,
    attribute: &str,
    entity: Option<&str>,
  ) -> Result<Vec<Fact>> {
    let mut parts = vec![attribute.to_string()];
    if let Some(entity) = entity {
      parts.push(entity.to_string());
    }
    self.live_facts(Prefix::new(Keyspace::Ae, parts)).await
  }

  /// Point lookup: the live fact holding `value` under a unique attribute.
  pub async fn ave(&self, attribute: &str, value: &str) -> Result<Option<Fact>> {
    match self.storage.get(&Key::av(attribute, value)).await? {
      Some(raw) => {
        let fact: Fact = serde_json::from_value(raw)?;
        Ok((!fact.retracted).then_some(fact))
      }
      None => Ok(None),
    }
  }

  /// Reverse lookup: all live facts whose reference- or parent-typed value
  /// points at `entity`, optionally filtered by attribute.
  pub async fn vae(
    &self,
    entity: &str,
    attribute: Option<&str>,
  ) -> Result<Vec<Fact>> {
    let mut parts = vec![entity.to_string()];
    if let Some(attribute) = attribute {
      parts.push(attribute.to_string());
    }
    self.live_facts(Prefix::new(Keyspace::Va, parts)).await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  /// Append to the discussion log with the next monotonic sequence index.
  pub async fn post_message(&self, input: NewMessage) -> Result<()> {
    let _guard = self.write_lock.lock().await;
    let index = match self.meta(META_LATEST_MESSAGE).await? {
      Some(raw) => serde_json::from_value::<u64>(raw)? + 1,
      None => 0,
    };
    let message = Message {
      id:      input.id,
      topic:   input.topic,
      ts:      input.ts,
      sender:  input.sender,
      content: input.content,
      index,
    };
    self
      .storage
      .put(
        Key::message(&message.topic, &message.ts, &message.id),
        serde_json::to_value(&message)?,
      )
      .await?;
    self
      .put_meta(META_LATEST_MESSAGE, serde_json::json!(index))
      .await?;
    Ok(())
  }

  /// All messages in a topic, in timestamp order.
  pub async fn messages(&self, topic: &str) -> Result<Vec<Message>> {
    let mut out = Vec::new();
    let prefix = Prefix::new(Keyspace::Message, vec![topic.to_string()]);
    for (_, value) in self.storage.list_prefix(&prefix).await? {
      out.push(serde_json::from_value(value)?);
    }
    Ok(out)
  }

  // ── Metadata ──────────────────────────────────────────────────────────────

  pub async fn meta(&self, name: &str) -> Result<Option<JsonValue>> {
    self.storage.get(&Key::meta(name)).await
  }

  pub async fn put_meta(&self, name: &str, value: JsonValue) -> Result<()> {
    self.storage.put(Key::meta(name), value).await
  }

  pub async fn meta_string(&self, name: &str) -> Result<Option<String>> {
    self
      .meta(name)
      .await?
      .map(|v| serde_json::from_value(v).map_err(Error::from))
      .transpose()
  }

  pub async fn put_meta_string(&self, name: &str, value: &str) -> Result<()> {
    self.put_meta(name, JsonValue::String(value.to_string())).await
  }

  /// The highest mutation id applied for `client_id`; zero before the
  /// client's first push.
  pub async fn last_mutation_id(&self, client_id: &str) -> Result<u64> {
    match self
      .storage
      .get(&Key::meta_scoped(META_LAST_MUTATION_ID, client_id))
      .await?
    {
      Some(raw) => Ok(serde_json::from_value(raw)?),
      None => Ok(0),
    }
  }

  pub async fn set_last_mutation_id(
    &self,
    client_id: &str,
    id: u64,
  ) -> Result<()> {
    self
      .storage
      .put(
        Key::meta_scoped(META_LAST_MUTATION_ID, client_id),
        serde_json::json!(id),
      )
      .await
  }

  // ── Pull diffs ────────────────────────────────────────────────────────────

  /// Every fact and message stamped strictly after `cookie`, as patch ops,
  /// plus the new cookie (the largest stamp seen). Retracted facts become
  /// `del` ops so mirrors drop them; the records themselves stay in this
  /// store.
  pub async fn changes_since(
    &self,
    cookie: Option<&str>,
  ) -> Result<(Vec<PatchOp>, String)> {
    let floor = cookie.unwrap_or("");
    let mut new_cookie = floor.to_string();
    let mut patch = Vec::new();

    for (key, value) in self
      .storage
      .list_prefix(&Prefix::new(Keyspace::Ti, vec![]))
      .await?
    {
      let stamp = key.parts.first().map(String::as_str).unwrap_or("");
      if stamp <= floor {
        continue;
      }
      if stamp > new_cookie.as_str() {
        new_cookie = stamp.to_string();
      }
      let fact: Fact = serde_json::from_value(value)?;
      if fact.retracted {
        patch.push(PatchOp::Del { key: fact.id });
      } else {
        patch.push(PatchOp::Put {
          key:   fact.id.clone(),
          value: PatchValue::Fact(FactWithIndexes::new(fact)),
        });
      }
    }

    for (_, value) in self
      .storage
      .list_prefix(&Prefix::new(Keyspace::Message, vec![]))
      .await?
    {
      let message: Message = serde_json::from_value(value)?;
      if message.ts.as_str() <= floor {
        continue;
      }
      if message.ts.as_str() > new_cookie.as_str() {
        new_cookie = message.ts.clone();
      }
      patch.push(PatchOp::Put {
        key:   message.id.clone(),
        value: PatchValue::Message(MessageWithIndexes::new(message)),
      });
    }

    Ok((patch, new_cookie))
  }

  // ── Mirror maintenance (client replicas) ──────────────────────────────────

  /// Write an authoritative fact copy into a mirror without re-running
  /// invariant checks; the server already enforced them.
  pub async fn apply_remote_fact(&self, fact: Fact) -> Result<()> {
    let _guard = self.write_lock.lock().await;
    self.write_fact(&fact).await
  }

  /// Mirror a message pulled from the server, keeping the local sequence
  /// watermark in step.
  pub async fn apply_remote_message(&self, message: Message) -> Result<()> {
    let _guard = self.write_lock.lock().await;
    let latest = match self.meta(META_LATEST_MESSAGE).await? {
      Some(raw) => Some(serde_json::from_value::<u64>(raw)?),
      None => None,
    };
    if latest.is_none_or(|l| message.index > l) {
      self
        .put_meta(META_LATEST_MESSAGE, serde_json::json!(message.index))
        .await?;
    }
    self
      .storage
      .put(
        Key::message(&message.topic, &message.ts, &message.id),
        serde_json::to_value(&message)?,
      )
      .await
  }

  /// Drop a fact and its index entries from a mirror entirely. Used for
  /// `del` patch ops; the authoritative store never hard-deletes.
  pub async fn remove_fact(&self, id: &str) -> Result<()> {
    let _guard = self.write_lock.lock().await;
    let Some(old) = self.get_fact(id).await? else {
      return Ok(());
    };
    self.delete_index_entries(&old).await?;
    self.storage.delete(&Key::fact(id)).await?;
    Ok(())
  }

  /// Rewrite a fact's record and index entries verbatim (no timestamp
  /// refresh). Migrations use this to refreeze stale schema copies without
  /// generating spurious pull diffs.
  pub(crate) async fn rewrite_fact(&self, fact: &Fact) -> Result<()> {
    let _guard = self.write_lock.lock().await;
    self.write_fact(fact).await
  }

  // ── Server effects ────────────────────────────────────────────────────────

  /// Take the effects queued by mutations since the last drain.
  pub fn drain_effects(&self) -> Vec<ServerEffect> {
    match self.effects.lock() {
      Ok(mut effects) => std::mem::take(&mut *effects),
      Err(_) => Vec::new(),
    }
  }
}

const META_LATEST_MESSAGE: &str = "latest-message";
const META_LAST_MUTATION_ID: &str = "lastMutationID";

// ─── MutationContext ─────────────────────────────────────────────────────────

impl<S: Storage> MutationContext for FactStore<S> {
  type Error = Error;

  async fn assert_fact(&self, input: FactInput) -> Result<AssertOutcome> {
    FactStore::assert_fact(self, input).await
  }

  async fn retract_fact(&self, id: &str) -> Result<()> {
    FactStore::retract_fact(self, id).await
  }

  async fn update_fact(&self, id: &str, data: FactUpdate) -> Result<bool> {
    FactStore::update_fact(self, id, data).await
  }

  async fn post_message(&self, message: NewMessage) -> Result<()> {
    FactStore::post_message(self, message).await
  }

  async fn eav(&self, entity: &str, attribute: Option<&str>) -> Result<EavResult> {
    FactStore::eav(self, entity, attribute).await
  }

  async fn aev(&self, attribute: &str, entity: Option<&str>) -> Result<Vec<Fact>> {
    FactStore::aev(self, attribute, entity).await
  }

  async fn ave(&self, attribute: &str, value: &str) -> Result<Option<Fact>> {
    FactStore::ave(self, attribute, value).await
  }

  async fn vae(&self, entity: &str, attribute: Option<&str>) -> Result<Vec<Fact>> {
    FactStore::vae(self, entity, attribute).await
  }

  fn run_on_server(&self, effect: ServerEffect) {
    if let Ok(mut effects) = self.effects.lock() {
      effects.push(effect);
    }
  }
}
