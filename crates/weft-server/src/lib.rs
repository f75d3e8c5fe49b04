//! HTTP sync server for Weft spaces.
//!
//! Exposes an axum [`Router`] with one authoritative fact store per
//! collaboration space. Correctness is carried entirely by the push/pull
//! routes; the poke route is a best-effort liveness hint.

pub mod error;
pub mod poke;
pub mod routes;
pub mod session;
pub mod space;

pub use error::ApiError;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use session::{SessionEntry, SessionVerifier, StaticSessions};
use space::Spaces;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:     String,
  pub port:     u16,
  /// Directory holding one SQLite file per space.
  pub data_dir: PathBuf,
  /// SHA-256 token digest (hex) to session mapping.
  #[serde(default)]
  pub sessions: HashMap<String, SessionEntry>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState {
  pub spaces:   Arc<Spaces>,
  pub sessions: Arc<dyn SessionVerifier>,
}

impl AppState {
  pub fn new(config: &ServerConfig) -> Self {
    Self {
      spaces:   Arc::new(Spaces::new(config.data_dir.clone())),
      sessions: Arc::new(StaticSessions::new(config.sessions.clone())),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the sync server.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/v0/space/{space}/push", post(routes::push::handler))
    .route("/v0/space/{space}/pull", post(routes::pull::handler))
    .route("/v0/space/{space}/claim", post(routes::claim::handler))
    .route("/v0/space/{space}/poke", get(routes::poke::handler))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
