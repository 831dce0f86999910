//! Identity provider webhook intake.

use actix_web::{HttpRequest, HttpResponse, post, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::config::{WEBHOOK_ID_HEADER, WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER};
use crate::error::{AppError, AppResult};
use crate::models::{SyncEvent, WebhookEnvelope};
use crate::services::{SyncOutcome, SyncService, WebhookVerifier};

/// What happened to an accepted delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    /// The event changed local rows
    Applied,
    /// The event was understood but there was nothing to change
    Skipped,
    /// The event type is not consumed by this service
    Ignored,
}

impl From<SyncOutcome> for WebhookOutcome {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Applied => Self::Applied,
            SyncOutcome::Skipped => Self::Skipped,
        }
    }
}

/// Acknowledgement returned for every accepted delivery.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub event_type: String,
    pub outcome: WebhookOutcome,
}

fn required_header<'a>(req: &'a HttpRequest, name: &str) -> AppResult<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("Missing {} header", name)))
}

/// Receive a signed identity provider event.
///
/// POST /api/webhooks
///
/// The raw body is verified before it is parsed. Persistence failures return
/// 500 so the provider redelivers.
#[utoipa::path(
    post,
    path = "/api/webhooks",
    tag = "Webhooks",
    request_body(content = String, description = "Raw signed event envelope", content_type = "application/json"),
    params(
        ("svix-id" = String, Header, description = "Delivery message id"),
        ("svix-timestamp" = String, Header, description = "Unix timestamp of the delivery"),
        ("svix-signature" = String, Header, description = "Space-separated v1 signatures")
    ),
    responses(
        (status = 200, description = "Delivery accepted", body = WebhookAck),
        (status = 400, description = "Missing headers, bad signature or malformed payload", body = crate::error::ErrorResponse),
        (status = 500, description = "Persistence failed; the provider should retry", body = crate::error::ErrorResponse)
    )
)]
#[post("/webhooks")]
pub async fn receive_webhook(
    req: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<WebhookVerifier>,
    sync: web::Data<SyncService>,
) -> AppResult<HttpResponse> {
    let msg_id = required_header(&req, WEBHOOK_ID_HEADER)?;
    let timestamp = required_header(&req, WEBHOOK_TIMESTAMP_HEADER)?;
    let signature = required_header(&req, WEBHOOK_SIGNATURE_HEADER)?;

    verifier
        .verify(msg_id, timestamp, signature, &body, Utc::now())
        .map_err(|e| AppError::InvalidSignature(format!("{} (delivery {})", e, msg_id)))?;

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)?;
    let event_type = envelope.event_type.clone();
    debug!(msg_id = %msg_id, event_type = %event_type, "Verified webhook delivery");

    let Some(event) = SyncEvent::from_envelope(envelope)? else {
        info!(msg_id = %msg_id, event_type = %event_type, "Ignoring unhandled event type");
        return Ok(HttpResponse::Ok().json(WebhookAck {
            received: true,
            event_type,
            outcome: WebhookOutcome::Ignored,
        }));
    };

    let outcome = sync.apply(event).await?;
    info!(msg_id = %msg_id, event_type = %event_type, ?outcome, "Processed webhook delivery");

    Ok(HttpResponse::Ok().json(WebhookAck {
        received: true,
        event_type,
        outcome: outcome.into(),
    }))
}

/// Configure webhook routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(receive_webhook);
}
