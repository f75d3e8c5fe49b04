//! Claim: one-time space initialisation.
//!
//! The first verified caller becomes the creator and seeds the space's
//! baseline facts: the home flag, their membership, their display name, and
//! the space's own name. Subsequent claims are refused via the `creator`
//! metadata guard.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use weft_core::fact::{self, FactInput, Value};
use weft_store::{FactStore, Storage};

use crate::{AppState, error::ApiError, session::SessionVerifier};

const META_CREATOR: &str = "creator";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
  pub token:      String,
  /// Display name for the space itself.
  pub name:       String,
  /// Display name for the claiming member.
  pub owner_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimResponse {
  pub success: bool,
}

pub async fn apply_claim<S: Storage>(
  store: &FactStore<S>,
  sessions: &dyn SessionVerifier,
  request: &ClaimRequest,
) -> weft_store::Result<ClaimResponse> {
  let Some(session) = sessions.verify(&request.token) else {
    return Ok(ClaimResponse { success: false });
  };
  if store.meta(META_CREATOR).await?.is_some() {
    return Ok(ClaimResponse { success: false });
  }

  let home = fact::new_id();
  let member = fact::new_id();
  let this_space = fact::new_id();

  store
    .assert_fact(FactInput::new(&home, "home", Value::flag()))
    .await?;
  store
    .assert_fact(FactInput::new(
      &member,
      "space/member",
      Value::from(session.studio.as_str()),
    ))
    .await?;
  store
    .assert_fact(FactInput::new(
      &member,
      "member/name",
      Value::from(request.owner_name.as_str()),
    ))
    .await?;
  store
    .assert_fact(FactInput::new(
      &this_space,
      "this/name",
      Value::from(request.name.as_str()),
    ))
    .await?;
  store
    .put_meta(META_CREATOR, serde_json::json!(session.studio))
    .await?;

  Ok(ClaimResponse { success: true })
}

/// `POST /v0/space/{space}/claim`
pub async fn handler(
  State(state): State<AppState>,
  Path(space_id): Path<String>,
  Json(request): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
  let space = state.spaces.open(&space_id).await?;
  let response =
    apply_claim(&space.store, state.sessions.as_ref(), &request).await?;
  Ok(Json(response))
}
