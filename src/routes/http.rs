//! HTTP endpoint handlers. These are thin wrappers that forward to the core
//! drivers in `logic.rs`. Each handler is instrumented and logs parameters
//! and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

/// Create a session and immediately start it: the reply carries the first
/// round (or the generation-failure message).
#[instrument(level = "info", skip(state))]
pub async fn http_new_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let handle = state.create_session().await;
  let reply = logic::start_session(&state, &handle).await;
  info!(target: "wikirace_backend", session_id = %handle.id, "HTTP session started");
  Json(NewSessionOut { session_id: handle.id.clone(), reply })
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Response {
  match state.session(&id).await {
    Some(handle) => Json(logic::snapshot(&handle).await).into_response(),
    None => unknown_session(&id),
  }
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  let removed = state.remove_session(&id).await;
  Json(AckOut { ok: removed })
}

#[instrument(level = "info", skip(state, body), fields(%id, article = %body.article))]
pub async fn http_navigate(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<NavigateIn>,
) -> Response {
  match state.session(&id).await {
    Some(handle) => Json(logic::navigate(&state, &handle, &body.article).await).into_response(),
    None => unknown_session(&id),
  }
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_hint(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match state.session(&id).await {
    Some(handle) => Json(logic::hint(&state, &handle).await).into_response(),
    None => unknown_session(&id),
  }
}

#[instrument(level = "info", skip(state, body), fields(%id, confirmed = body.confirmed))]
pub async fn http_skip(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<SkipIn>,
) -> Response {
  match state.session(&id).await {
    Some(handle) => Json(logic::skip(&state, &handle, body.confirmed).await).into_response(),
    None => unknown_session(&id),
  }
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_restart(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match state.session(&id).await {
    Some(handle) => Json(logic::start_session(&state, &handle).await).into_response(),
    None => unknown_session(&id),
  }
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_links(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match state.session(&id).await {
    Some(handle) => Json(logic::current_links(&state, &handle).await).into_response(),
    None => unknown_session(&id),
  }
}

fn unknown_session(id: &str) -> Response {
  (
    StatusCode::NOT_FOUND,
    Json(ServerMessage::Error { message: format!("Unknown session: {}", id) }),
  )
    .into_response()
}
