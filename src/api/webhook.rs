//! Telegram webhook receiver
//!
//! Acknowledges every well-formed update immediately and processes it on a
//! background task. Telegram requires fast webhook responses to avoid
//! redelivery.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use crate::telegram::types::Update;

/// Webhook acknowledgment body
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// Build the webhook router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_update))
        .with_state(state)
}

/// Handle an incoming bot update
///
/// Malformed payloads are logged and answered with a failure status so the
/// platform can apply its own retry policy; nothing is dispatched for them.
#[allow(clippy::unused_async)]
async fn handle_update(
    State(state): State<Arc<ApiState>>,
    body: String,
) -> (StatusCode, Json<WebhookResponse>) {
    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::error!(error = %e, "malformed webhook payload");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse { ok: false }),
            );
        }
    };

    tracing::debug!(update_id = update.update_id, "received update");

    let processor = state.processor.clone();
    tokio::spawn(async move {
        processor.process(update).await;
    });

    (StatusCode::OK, Json(WebhookResponse { ok: true }))
}
