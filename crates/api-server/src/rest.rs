//! REST handlers for the inbound webhook surfaces and operational probes.
//!
//! Both upstream callers retry aggressively on error responses, so every
//! understood request is acknowledged with 200 — including malformed
//! bodies, policy skips, and downstream delivery failures. The one
//! exception is a failed shared-secret check, which is a configuration
//! problem or an attack, never a benign skip.

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use relay_core::types::{BookingWebhook, InboundEvent, IntentRequest};
use relay_delivery::HttpTransport;
use relay_pipeline::{ConversionPipeline, RelayOutcome, RequestMeta};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::auth;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ConversionPipeline<HttpTransport>>,
    pub shared_secret: Option<String>,
    pub start_time: Instant,
}

/// Acknowledgment returned for every accepted webhook call.
#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub received: bool,
    pub forwarded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl RelayResponse {
    fn forwarded(event_id: String) -> Self {
        Self {
            received: true,
            forwarded: true,
            reason: None,
            event_id: Some(event_id),
        }
    }

    fn skipped(reason: &str) -> Self {
        Self {
            received: true,
            forwarded: false,
            reason: Some(reason.to_string()),
            event_id: None,
        }
    }

    fn with_event_id(mut self, event_id: String) -> Self {
        self.event_id = Some(event_id);
        self
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// POST /webhooks/intent — checkout-intent signal from the website.
///
/// The attribution record is stored before the call is acknowledged;
/// delivery of the intent event is detached so the caller's response
/// budget is not spent on the downstream endpoint.
pub async fn handle_intent(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Json<RelayResponse> {
    let request: IntentRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "unparseable intent payload acknowledged");
            metrics::counter!("api.invalid_payloads", "kind" => "intent").increment(1);
            return Json(RelayResponse::skipped("invalid_payload"));
        }
    };

    let meta = RequestMeta {
        client_ip: Some(addr.ip().to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    let prepared = state.pipeline.record_intent(&request, &meta);
    let event_id = prepared.event.event_id.clone();

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        // Outcome is logged and counted inside the pipeline.
        let _ = pipeline.deliver_intent(prepared).await;
    });

    Json(RelayResponse::skipped("delivery_queued").with_event_id(event_id))
}

/// POST /webhooks/booking — booking/sale event from the scheduling
/// platform. Requires the shared secret when one is configured.
pub async fn handle_booking(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<RelayResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !auth::verify_shared_secret(state.shared_secret.as_deref(), &headers, &params) {
        metrics::counter!("api.auth_failures").increment(1);
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
                message: "missing or invalid webhook secret".to_string(),
            }),
        ));
    }

    let webhook: BookingWebhook = match serde_json::from_str(&body) {
        Ok(webhook) => webhook,
        Err(err) => {
            warn!(error = %err, "unparseable booking payload acknowledged");
            metrics::counter!("api.invalid_payloads", "kind" => "booking").increment(1);
            return Ok(Json(RelayResponse::skipped("invalid_payload")));
        }
    };

    let outcome = state
        .pipeline
        .handle(InboundEvent::Booking(webhook), RequestMeta::default())
        .await;

    Ok(Json(match outcome {
        RelayOutcome::Forwarded { event_id, .. } => RelayResponse::forwarded(event_id),
        RelayOutcome::Skipped(reason) => RelayResponse::skipped(reason.as_str()),
        RelayOutcome::DeliveryFailed { event_id, .. } => {
            RelayResponse::skipped("delivery_failed").with_event_id(event_id)
        }
    }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// GET /health — health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — readiness probe.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live — liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
