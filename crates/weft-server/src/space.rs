//! The per-space store registry.
//!
//! One authoritative store per collaboration space, opened on first access
//! with pending migrations applied before any request touches it. Spaces
//! are fully independent and serve requests in parallel; within a space,
//! overlapping push batches serialize on the push lock.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use weft_store::{FactStore, SqliteStorage, migration};

use crate::poke::PokeHandle;

const POKE_WINDOW: Duration = Duration::from_millis(100);

/// One collaboration space: its store, the push serialization lock, and
/// the poke channel.
pub struct Space {
  pub store:     FactStore<SqliteStorage>,
  pub push_lock: Mutex<()>,
  pub poke:      Arc<PokeHandle>,
}

pub struct Spaces {
  data_dir: PathBuf,
  open:     Mutex<HashMap<String, Arc<Space>>>,
}

impl Spaces {
  pub fn new(data_dir: PathBuf) -> Self {
    Self {
      data_dir,
      open: Mutex::new(HashMap::new()),
    }
  }

  /// Open (or create) a space store, applying pending migrations on first
  /// access.
  pub async fn open(&self, space_id: &str) -> weft_store::Result<Arc<Space>> {
    let mut open = self.open.lock().await;
    if let Some(space) = open.get(space_id) {
      return Ok(Arc::clone(space));
    }

    let path = self.data_dir.join(format!("{}.db", sanitize(space_id)));
    let storage = SqliteStorage::open(&path).await?;
    let store = FactStore::new(storage);
    migration::ensure_migrated(&store).await?;

    tracing::info!(space = space_id, "opened space store");
    let space = Arc::new(Space {
      store,
      push_lock: Mutex::new(()),
      poke: Arc::new(PokeHandle::new(POKE_WINDOW)),
    });
    open.insert(space_id.to_string(), Arc::clone(&space));
    Ok(space)
  }
}

/// Space ids arrive in URLs; keep the derived filename boring.
fn sanitize(space_id: &str) -> String {
  space_id
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
        c
      } else {
        '_'
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_keeps_safe_characters() {
    assert_eq!(sanitize("space-01_a"), "space-01_a");
    assert_eq!(sanitize("../etc/passwd"), "___etc_passwd");
  }
}
