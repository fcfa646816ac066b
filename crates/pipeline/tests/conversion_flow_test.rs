//! End-to-end pipeline scenarios driven through a scripted transport:
//! intent recording, booking attribution and merge, dedup, and the
//! policy skips.

use relay_core::config::AppConfig;
use relay_core::event::{EVENT_INTENT, EVENT_PURCHASE};
use relay_core::identity::sha256_hex;
use relay_core::types::{BookingWebhook, InboundEvent, IntentRequest};
use relay_delivery::testing::MockTransport;
use relay_pipeline::{ConversionPipeline, RelayOutcome, RequestMeta, SkipReason};
use std::sync::Arc;

fn pipeline_with(
    config: AppConfig,
) -> (ConversionPipeline<Arc<MockTransport>>, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    (
        ConversionPipeline::new(config, transport.clone()),
        transport,
    )
}

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.delivery.base_delay_ms = 0;
    config
}

fn pipeline() -> (ConversionPipeline<Arc<MockTransport>>, Arc<MockTransport>) {
    pipeline_with(fast_config())
}

fn intent_abc123() -> IntentRequest {
    serde_json::from_value(serde_json::json!({
        "event_id": "abc123",
        "event_source_url": "https://example.com/book",
        "user_data": {"fbp": "fb.1.111.222", "email": "alice@example.com"}
    }))
    .unwrap()
}

fn online_booking_with_eid() -> BookingWebhook {
    serde_json::from_value(serde_json::json!({
        "booking": {
            "id": "b-500",
            "status": "booked",
            "online": true,
            "metadata": {"eid": "abc123"}
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_intent_populates_store_and_forwards() {
    let (pipeline, transport) = pipeline();

    let outcome = pipeline
        .handle_intent(intent_abc123(), RequestMeta::default())
        .await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { ref event_id, .. } if event_id == "abc123"));

    let record = pipeline.attribution_store().get("abc123").unwrap();
    assert_eq!(record.fbp.as_deref(), Some("fb.1.111.222"));
    assert_eq!(record.email, Some(sha256_hex(b"alice@example.com")));

    let batch = transport.last_batch().unwrap();
    assert_eq!(batch.data[0].event_id, "abc123");
    assert_eq!(batch.data[0].event_name, EVENT_INTENT);
    assert_eq!(batch.data[0].user_data.fbp.as_deref(), Some("fb.1.111.222"));
}

#[tokio::test]
async fn test_booking_merges_stored_attribution_and_dedups() {
    let (pipeline, transport) = pipeline();
    pipeline
        .handle_intent(intent_abc123(), RequestMeta::default())
        .await;

    let outcome = pipeline.handle_booking(online_booking_with_eid()).await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { ref event_id, .. } if event_id == "abc123"));

    let batch = transport.last_batch().unwrap();
    assert_eq!(batch.data[0].event_name, EVENT_PURCHASE);
    // The booking carried no PII; the merged fbp came from the store.
    assert_eq!(batch.data[0].user_data.fbp.as_deref(), Some("fb.1.111.222"));
    assert_eq!(transport.request_count(), 2);

    // Same booking again: blocked by the dedup store, no external call.
    let outcome = pipeline.handle_booking(online_booking_with_eid()).await;
    assert!(matches!(outcome, RelayOutcome::Skipped(SkipReason::Duplicate)));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_manual_booking_is_skipped_without_outbound_call() {
    let (pipeline, transport) = pipeline();
    let webhook: BookingWebhook = serde_json::from_value(serde_json::json!({
        "booking": {
            "id": "b-501",
            "status": "booked",
            "channel": "staff-manual",
            "metadata": {"eid": "abc123"}
        }
    }))
    .unwrap();

    let outcome = pipeline.handle_booking(webhook).await;
    assert!(matches!(
        outcome,
        RelayOutcome::Skipped(SkipReason::ManualBooking)
    ));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_pii_fallback_resolves_attribution() {
    let (pipeline, transport) = pipeline();
    pipeline
        .handle_intent(intent_abc123(), RequestMeta::default())
        .await;

    // No explicit key; the client email matches the stored intent.
    let webhook: BookingWebhook = serde_json::from_value(serde_json::json!({
        "booking": {
            "id": "b-502",
            "status": "booked",
            "online": true,
            "client": {"email": "Alice@Example.com"}
        }
    }))
    .unwrap();

    let outcome = pipeline.handle_booking(webhook).await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { ref event_id, .. } if event_id == "abc123"));
    let batch = transport.last_batch().unwrap();
    assert_eq!(batch.data[0].user_data.fbp.as_deref(), Some("fb.1.111.222"));
}

#[tokio::test]
async fn test_pii_fallback_can_be_disabled() {
    let mut config = fast_config();
    config.attribution.pii_fallback = false;
    let (pipeline, transport) = pipeline_with(config);
    pipeline
        .handle_intent(intent_abc123(), RequestMeta::default())
        .await;

    let webhook: BookingWebhook = serde_json::from_value(serde_json::json!({
        "booking": {
            "id": "b-503",
            "status": "booked",
            "online": true,
            "client": {"email": "alice@example.com"}
        }
    }))
    .unwrap();

    let outcome = pipeline.handle_booking(webhook).await;
    assert!(matches!(
        outcome,
        RelayOutcome::Skipped(SkipReason::NoAttribution)
    ));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_online_booking_with_no_signal_is_not_forwarded() {
    let (pipeline, transport) = pipeline();
    let webhook: BookingWebhook = serde_json::from_value(serde_json::json!({
        "booking": {"id": "b-504", "status": "booked", "online": true}
    }))
    .unwrap();

    let outcome = pipeline.handle_booking(webhook).await;
    assert!(matches!(
        outcome,
        RelayOutcome::Skipped(SkipReason::NoAttribution)
    ));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_explicit_key_forwards_without_stored_record() {
    // The key alone is enough signal; it also becomes the idempotency id.
    let (pipeline, transport) = pipeline();
    let outcome = pipeline.handle_booking(online_booking_with_eid()).await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { ref event_id, .. } if event_id == "abc123"));
    assert_eq!(transport.request_count(), 1);
    assert!(transport.last_batch().unwrap().data[0].user_data.fbp.is_none());
}

#[tokio::test]
async fn test_delivery_failure_releases_dedup_claim() {
    let (pipeline, transport) = pipeline();
    for _ in 0..3 {
        transport.respond_with(503, "unavailable");
    }

    let outcome = pipeline.handle_booking(online_booking_with_eid()).await;
    assert!(matches!(outcome, RelayOutcome::DeliveryFailed { .. }));
    assert_eq!(transport.request_count(), 3);
    assert!(!pipeline.dedup_store().has_been_sent("abc123"));

    // Upstream redelivers; the scripted failures are exhausted so this lands.
    let outcome = pipeline.handle_booking(online_booking_with_eid()).await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { .. }));
    assert!(pipeline.dedup_store().has_been_sent("abc123"));
}

#[tokio::test]
async fn test_require_confirmed_policy() {
    let mut config = fast_config();
    config.booking.require_confirmed = true;
    let (pipeline, transport) = pipeline_with(config);

    let outcome = pipeline.handle_booking(online_booking_with_eid()).await;
    assert!(matches!(
        outcome,
        RelayOutcome::Skipped(SkipReason::IneligibleStatus)
    ));
    assert_eq!(transport.request_count(), 0);

    let confirmed: BookingWebhook = serde_json::from_value(serde_json::json!({
        "booking": {
            "id": "b-505",
            "status": "confirmed",
            "online": true,
            "metadata": {"eid": "abc123"}
        }
    }))
    .unwrap();
    let outcome = pipeline.handle_booking(confirmed).await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { .. }));
}

#[tokio::test]
async fn test_cancelled_booking_is_ineligible() {
    let (pipeline, transport) = pipeline();
    let webhook: BookingWebhook = serde_json::from_value(serde_json::json!({
        "booking": {
            "id": "b-506",
            "status": "cancelled",
            "online": true,
            "metadata": {"eid": "abc123"}
        }
    }))
    .unwrap();

    let outcome = pipeline.handle_booking(webhook).await;
    assert!(matches!(
        outcome,
        RelayOutcome::Skipped(SkipReason::IneligibleStatus)
    ));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_inbound_dispatch_covers_both_kinds() {
    let (pipeline, _transport) = pipeline();

    let outcome = pipeline
        .handle(
            InboundEvent::Intent(intent_abc123()),
            RequestMeta {
                client_ip: Some("203.0.113.9".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
            },
        )
        .await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { .. }));

    let outcome = pipeline
        .handle(
            InboundEvent::Booking(online_booking_with_eid()),
            RequestMeta::default(),
        )
        .await;
    assert!(matches!(outcome, RelayOutcome::Forwarded { .. }));
}
