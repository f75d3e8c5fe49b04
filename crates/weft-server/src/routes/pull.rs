//! Pull: fact/message diff since a cookie.
//!
//! The response carries the caller's authoritative watermark so the client
//! can drop locally-queued mutations the pulled state already reflects.

use axum::{
  Json,
  extract::{Path, State},
};
use weft_core::sync::{PullRequest, PullResponse};
use weft_store::{FactStore, Storage};

use crate::{AppState, error::ApiError};

pub async fn apply_pull<S: Storage>(
  store: &FactStore<S>,
  request: &PullRequest,
) -> weft_store::Result<PullResponse> {
  let (patch, cookie) = store.changes_since(request.cookie.as_deref()).await?;
  let last_mutation_id = store.last_mutation_id(&request.client_id).await?;
  Ok(PullResponse {
    cookie,
    last_mutation_id,
    patch,
  })
}

/// `POST /v0/space/{space}/pull`
pub async fn handler(
  State(state): State<AppState>,
  Path(space_id): Path<String>,
  Json(request): Json<PullRequest>,
) -> Result<Json<PullResponse>, ApiError> {
  let space = state.spaces.open(&space_id).await?;
  let response = apply_pull(&space.store, &request).await?;
  Ok(Json(response))
}
