//! System endpoints.
//!
//! POST /broadview/system/get-switch-properties

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};

use bst_common::protocol::{Method, Response};

use super::error::ApiError;
use super::parse_envelope;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{method}", post(dispatch))
}

async fn dispatch(
    State(state): State<AppState>,
    Path(method): Path<String>,
    body: Bytes,
) -> Result<Json<Response>, ApiError> {
    let (method, req) = parse_envelope(&method, &body, &[Method::GetSwitchProperties])?;
    tracing::debug!(%method, id = req.id, "system request");
    state
        .app()
        .handle(method, &req)
        .map(Json)
        .map_err(|e| ApiError::from_bst(req.id, e))
}
