//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries, validates signatures and canonicalizes
//! the payload before returning 202 Accepted. Plugin dispatch happens on a
//! spawned task so GitHub never waits on API calls the plugins make.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{Instrument, debug, info_span, warn};

use super::AppState;
use crate::webhooks::{ParseError, SIGNATURE_HEADER, verify_signature};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";

/// Errors that can occur when accepting a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 202 Accepted: delivery verified; dispatched, or ignored if its kind or
///   action is not one plugins see
/// - 400 Bad Request: missing header or malformed payload
/// - 401 Unauthorized: invalid signature
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let signature_header = get_header(&headers, SIGNATURE_HEADER)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY).unwrap_or_default();

    debug!(delivery_id = %delivery_id, event_type = %event_type, "Received webhook");

    // Verify before parsing anything.
    if !verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(delivery_id = %delivery_id, "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let Some(event) = app_state.router().route(&event_type, &body)? else {
        debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring webhook");
        return Ok((StatusCode::ACCEPTED, "Accepted (ignored)"));
    };

    let dispatcher = app_state.dispatcher();
    let span = info_span!("delivery", id = %delivery_id, kind = %event_type);
    tokio::spawn(
        async move {
            match dispatcher.handle(&event).await {
                Ok(report) if !report.failed.is_empty() => {
                    warn!(attempted = report.attempted, failed = ?report.failed, "Some plugins failed");
                }
                Ok(report) => debug!(attempted = report.attempted, "Dispatched"),
                Err(e) => warn!(repo = %event.repo(), error = %e, "Could not load repository configuration"),
            }
        }
        .instrument(span),
    );

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
