use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use relay_core::CompletionRequest;
use relay_core::wire::{COMPLETION_STREAM_PATH, DOWNSTREAM_CONTENT_TYPE, HEALTH_PATH};
use tracing::{info, warn};

use crate::errors::RelayError;
use crate::relay::spawn_session;
use crate::state::AppState;

/// Builds the relay router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(COMPLETION_STREAM_PATH, post(stream_completion))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Authorizes and validates one request, opens the upstream, and answers with
/// the flat delta stream. Every failure here happens before the body starts.
async fn stream_completion(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    if !state.authorizer.authorize(&headers) {
        warn!("rejected unauthorized completion request");
        return Err(RelayError::Unauthorized);
    }

    let Json(request) =
        payload.map_err(|rejection| RelayError::InvalidRequest(rejection.body_text()))?;
    request.validate()?;

    let upstream = state.upstream.open(&request).await.map_err(|err| {
        warn!(error = %err, model = %request.model, "failed to open upstream stream");
        RelayError::from(err)
    })?;

    let (body, _session) = spawn_session(upstream, &state.session);
    info!(model = %request.model, messages = request.messages.len(), "streaming completion");

    Ok((
        [
            (CONTENT_TYPE, DOWNSTREAM_CONTENT_TYPE),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
