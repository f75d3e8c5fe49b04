//! Push: client to server mutation replay.
//!
//! A batch carries strictly increasing mutation ids. Everything at or below
//! the stored per-client watermark is skipped (replaying an old batch is a
//! no-op); everything above it is applied in order. The watermark advances
//! past unknown names, malformed args, and failed mutations alike, so a bad
//! mutation can never wedge a client's queue. Non-members drain their queue
//! without executing anything.

use axum::{
  Json,
  extract::{Path, State},
};
use tokio::sync::Mutex;
use weft_core::{
  mutations::Mutation,
  schema,
  sync::{PushRequest, PushResponse},
};
use weft_store::{FactStore, Storage};

use crate::{AppState, error::ApiError, session::SessionVerifier};

/// Replay a push batch against one space's store.
pub async fn apply_push<S: Storage>(
  store: &FactStore<S>,
  push_lock: &Mutex<()>,
  sessions: &dyn SessionVerifier,
  request: &PushRequest,
) -> PushResponse {
  let Some(session) = sessions.verify(&request.token) else {
    return failure("invalid session token");
  };
  if request.schema_version != schema::SCHEMA_VERSION {
    tracing::warn!(
      client = %request.client_id,
      theirs = %request.schema_version,
      ours = %schema::SCHEMA_VERSION,
      "schema version mismatch"
    );
  }

  // Serialize overlapping batches; within the lock the batch owns the
  // store's watermark and index writes.
  let _guard = push_lock.lock().await;

  let mut last = match store.last_mutation_id(&request.client_id).await {
    Ok(id) => id,
    Err(e) => return failure(&e.to_string()),
  };

  let member = match store.ave("space/member", &session.studio).await {
    Ok(member) => member,
    Err(e) => return failure(&e.to_string()),
  };
  if member.is_none() {
    // Drain the queue without executing so the client stops retrying.
    if let Some(final_id) = request.mutations.last().map(|m| m.id) {
      if final_id > last {
        if let Err(e) =
          store.set_last_mutation_id(&request.client_id, final_id).await
        {
          return failure(&e.to_string());
        }
      }
    }
    return failure("not a member of this space");
  }

  for envelope in &request.mutations {
    if envelope.id <= last {
      continue;
    }
    last = envelope.id;

    let mutation = match Mutation::from_wire(&envelope.name, envelope.args.clone())
    {
      Ok(mutation) => mutation,
      Err(error) => {
        tracing::warn!(
          mutation = %envelope.name,
          %error,
          "skipping unresolvable mutation"
        );
        continue;
      }
    };
    if let Err(error) = mutation.apply(store).await {
      tracing::warn!(
        mutation = %envelope.name,
        %error,
        "mutation failed during replay"
      );
    }
  }

  if let Err(e) = store.set_last_mutation_id(&request.client_id, last).await {
    return failure(&e.to_string());
  }

  for effect in store.drain_effects() {
    tracing::debug!(?effect, "queued server effect");
  }

  PushResponse {
    success: true,
    errors:  Vec::new(),
  }
}

fn failure(message: &str) -> PushResponse {
  PushResponse {
    success: false,
    errors:  vec![message.to_string()],
  }
}

/// `POST /v0/space/{space}/push`
pub async fn handler(
  State(state): State<AppState>,
  Path(space_id): Path<String>,
  Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>, ApiError> {
  let space = state.spaces.open(&space_id).await?;
  let response = apply_push(
    &space.store,
    &space.push_lock,
    state.sessions.as_ref(),
    &request,
  )
  .await;
  if response.success {
    space.poke.poke();
  }
  Ok(Json(response))
}
