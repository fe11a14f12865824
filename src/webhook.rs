//! HTTP endpoint receiving updates pushed by Telegram.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use teloxide::types::Update;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info_span, warn};

use crate::dispatch::DispatchHandle;

/// Shared state of the webhook routes
#[derive(Clone)]
pub struct WebhookState {
    token: Arc<str>,
    dispatch: DispatchHandle,
}

impl WebhookState {
    /// `token` is the single path segment updates are accepted on
    pub fn new(token: impl Into<Arc<str>>, dispatch: DispatchHandle) -> Self {
        Self {
            token: token.into(),
            dispatch,
        }
    }
}

/// Build the router serving `POST /<token>`
pub fn create_router(state: WebhookState) -> Router {
    Router::new()
        .route("/{token}", post(receive_update))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        // The request path carries the bot token and stays out of spans
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| info_span!("webhook", method = %request.method())),
        )
}

async fn receive_update(
    State(state): State<WebhookState>,
    Path(token): Path<String>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if token != *state.token {
        // Indistinguishable from an unrouted path
        return (StatusCode::NOT_FOUND, "Not Found");
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            error!(error = %e, bytes = body.len(), "Failed to decode update");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error");
        }
    };

    let update_id = update.id.0;
    match state.dispatch.submit(update) {
        Ok(()) => {
            debug!(update_id, "Update accepted");
            (StatusCode::OK, "OK")
        }
        Err(e) => {
            warn!(update_id, error = %e, "Update not accepted");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}
