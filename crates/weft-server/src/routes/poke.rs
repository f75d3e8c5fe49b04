//! Poke: the held-open liveness hint.
//!
//! Clients park a long-poll request here; it completes with 204 when a push
//! commits (coalesced) or when the hold window expires. Either way the
//! client re-pulls and re-parks. Losing a poke is harmless.

use std::time::Duration;

use axum::{
  extract::{Path, State},
  http::StatusCode,
};

use crate::{AppState, error::ApiError};

const HOLD: Duration = Duration::from_secs(25);

/// `GET /v0/space/{space}/poke`
pub async fn handler(
  State(state): State<AppState>,
  Path(space_id): Path<String>,
) -> Result<StatusCode, ApiError> {
  let space = state.spaces.open(&space_id).await?;
  let mut rx = space.poke.subscribe();
  let _ = tokio::time::timeout(HOLD, rx.recv()).await;
  Ok(StatusCode::NO_CONTENT)
}
