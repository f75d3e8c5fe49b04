//! Ordered, one-time store migrations.
//!
//! A store records the tag of the last migration it has applied; on first
//! access the runner applies every strictly-greater tag in ascending order.
//! The applied tag is persisted after each step, so an interrupted run
//! resumes where it stopped instead of repeating work. Steps must be
//! idempotent regardless: a crash between a step and its tag write replays
//! that one step.

use weft_core::{fact::Fact, schema};

use crate::{
  Result,
  engine::FactStore,
  key::{Keyspace, Prefix},
  storage::Storage,
};

const META_LAST_APPLIED: &str = "lastAppliedMigration";

/// The closed set of migration steps, enumerated so the runner replays them
/// deterministically on any backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
  /// Marker for stores created before the runner existed.
  Baseline,
  /// Rewrite each fact's frozen schema copy from the current registry.
  /// Needed whenever an attribute's cardinality or uniqueness changes:
  /// facts written under the old registry would otherwise index themselves
  /// with stale rules forever.
  RefreezeSchemas,
}

pub struct Migration {
  pub tag:  &'static str,
  pub step: MigrationStep,
}

/// Ascending by tag.
pub const MIGRATIONS: &[Migration] = &[
  Migration {
    tag:  "2026-05-01-baseline",
    step: MigrationStep::Baseline,
  },
  Migration {
    tag:  "2026-07-14-refreeze-schemas",
    step: MigrationStep::RefreezeSchemas,
  },
];

/// Apply every migration newer than the store's persisted tag.
pub async fn ensure_migrated<S: Storage>(store: &FactStore<S>) -> Result<()> {
  let applied = store.meta_string(META_LAST_APPLIED).await?;
  for migration in MIGRATIONS {
    if applied.as_deref().is_some_and(|tag| migration.tag <= tag) {
      continue;
    }
    tracing::info!(tag = migration.tag, "applying migration");
    run_step(store, migration.step).await?;
    store.put_meta_string(META_LAST_APPLIED, migration.tag).await?;
  }
  Ok(())
}

async fn run_step<S: Storage>(
  store: &FactStore<S>,
  step: MigrationStep,
) -> Result<()> {
  match step {
    MigrationStep::Baseline => Ok(()),
    MigrationStep::RefreezeSchemas => refreeze_schemas(store).await,
  }
}

async fn refreeze_schemas<S: Storage>(store: &FactStore<S>) -> Result<()> {
  let records = store
    .storage()
    .list_prefix(&Prefix::new(Keyspace::Fact, vec![]))
    .await?;
  for (_, value) in records {
    let mut fact: Fact = serde_json::from_value(value)?;
    // Attributes dropped from the registry keep their frozen schema; their
    // facts stay readable and a later migration can retract them.
    let Some(current) = schema::resolve(&fact.attribute) else {
      continue;
    };
    if fact.schema != current {
      fact.schema = current;
      store.rewrite_fact(&fact).await?;
    }
  }
  Ok(())
}
