//! Per-webhook orchestration: classify, attribute, dedup-claim, build,
//! deliver, record.

use chrono::Utc;
use relay_core::config::AppConfig;
use relay_core::error::RelayError;
use relay_core::event::{ConversionEvent, EventBatch};
use relay_core::identity::{IdentityHasher, IdentityKind};
use relay_core::types::{BookingRecord, BookingWebhook, InboundEvent, IntentRequest};
use relay_delivery::{ConversionTransport, ConversionsClient, RetryPolicy};
use relay_stores::{AttributionStore, DedupStore, IdentityQuery};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::builder::EventBuilder;
use crate::classify::{self, BookingOrigin};

/// Request metadata captured at the HTTP boundary.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Why an inbound call produced no outbound event. Skips are policy, not
/// errors, and are acknowledged upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ManualBooking,
    NotOnline,
    IneligibleStatus,
    NoAttribution,
    Duplicate,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ManualBooking => "manual_booking",
            SkipReason::NotOnline => "not_online",
            SkipReason::IneligibleStatus => "ineligible_status",
            SkipReason::NoAttribution => "no_attribution",
            SkipReason::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug)]
pub enum RelayOutcome {
    Forwarded {
        event_id: String,
        response: serde_json::Value,
    },
    Skipped(SkipReason),
    /// Delivery failed after the retry budget. The inbound call is still
    /// acknowledged; the failure is observable here and in the logs.
    DeliveryFailed {
        event_id: String,
        error: RelayError,
    },
}

/// An intent event ready for delivery, prepared synchronously so the
/// attribution write lands before the inbound call is acknowledged.
#[derive(Debug)]
pub struct PreparedIntent {
    pub event: ConversionEvent,
    pub test_event_code: Option<String>,
}

pub struct ConversionPipeline<T> {
    hasher: IdentityHasher,
    builder: EventBuilder,
    attribution: AttributionStore,
    dedup: DedupStore,
    client: ConversionsClient<T>,
    config: AppConfig,
}

impl<T: ConversionTransport> ConversionPipeline<T> {
    pub fn new(config: AppConfig, transport: T) -> Self {
        let hasher = IdentityHasher::new(config.identity.default_country_code.clone());
        Self {
            builder: EventBuilder::new(hasher.clone(), config.event.clone()),
            attribution: AttributionStore::new(Duration::from_secs(config.attribution.window_secs)),
            dedup: DedupStore::new(Duration::from_secs(config.dedup.window_secs)),
            client: ConversionsClient::new(
                transport,
                RetryPolicy {
                    max_attempts: config.delivery.max_attempts,
                    base_delay: Duration::from_millis(config.delivery.base_delay_ms),
                },
            ),
            hasher,
            config,
        }
    }

    pub fn attribution_store(&self) -> &AttributionStore {
        &self.attribution
    }

    pub fn dedup_store(&self) -> &DedupStore {
        &self.dedup
    }

    /// Dispatch an inbound call resolved at the webhook boundary.
    pub async fn handle(&self, event: InboundEvent, meta: RequestMeta) -> RelayOutcome {
        match event {
            InboundEvent::Intent(request) => self.handle_intent(request, meta).await,
            InboundEvent::Booking(webhook) => self.handle_booking(webhook).await,
        }
    }

    /// Build the intent event and store its attribution record. Must run
    /// before the inbound call is acknowledged so a racing booking can
    /// find the record.
    pub fn record_intent(&self, request: &IntentRequest, meta: &RequestMeta) -> PreparedIntent {
        metrics::counter!("relay.intents_received").increment(1);
        let event_id = request
            .event_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let event = self.builder.build_intent_event(
            request,
            &event_id,
            meta.client_ip.clone(),
            meta.user_agent.clone(),
            Utc::now(),
        );

        let record = self
            .builder
            .attribution_record(&request.user_data.clone().unwrap_or_default());
        self.attribution.put(&event_id, record);
        info!(%event_id, "intent recorded");

        PreparedIntent {
            event,
            test_event_code: request.test_event_code.clone(),
        }
    }

    /// Deliver a prepared intent event and log the outcome.
    pub async fn deliver_intent(&self, prepared: PreparedIntent) -> RelayOutcome {
        let event_id = prepared.event.event_id.clone();
        let batch = EventBatch::single(prepared.event, self.test_event_code(prepared.test_event_code));
        match self.client.deliver(&batch).await {
            Ok(response) => {
                metrics::counter!("relay.events_forwarded", "kind" => "intent").increment(1);
                RelayOutcome::Forwarded { event_id, response }
            }
            Err(error) => {
                warn!(%event_id, error = %error, "intent delivery failed");
                RelayOutcome::DeliveryFailed { event_id, error }
            }
        }
    }

    pub async fn handle_intent(&self, request: IntentRequest, meta: RequestMeta) -> RelayOutcome {
        let prepared = self.record_intent(&request, &meta);
        self.deliver_intent(prepared).await
    }

    /// Booking flow: classify, resolve attribution (explicit key, else PII
    /// fallback), claim the dedup slot, build, deliver. The claim is kept
    /// on success and released on failure so a later redelivery can land.
    pub async fn handle_booking(&self, webhook: BookingWebhook) -> RelayOutcome {
        metrics::counter!("relay.bookings_received").increment(1);
        let booking = &webhook.booking;

        match classify::classify_origin(booking) {
            BookingOrigin::Online => {}
            BookingOrigin::Manual => return self.skip(booking, SkipReason::ManualBooking),
            BookingOrigin::Unknown => return self.skip(booking, SkipReason::NotOnline),
        }
        if !classify::is_eligible_status(booking, self.config.booking.require_confirmed) {
            return self.skip(booking, SkipReason::IneligibleStatus);
        }

        let explicit_key = classify::extract_attribution_key(booking);
        let resolved_key = explicit_key.clone().or_else(|| {
            if self.config.attribution.pii_fallback {
                self.find_key_by_pii(booking)
            } else {
                None
            }
        });
        let stored = resolved_key.as_deref().and_then(|key| self.attribution.get(key));

        let attributed = explicit_key.is_some()
            || stored.as_ref().map(|r| r.has_browser_ids()).unwrap_or(false);
        if !attributed {
            return self.skip(booking, SkipReason::NoAttribution);
        }

        let event_id = resolved_key.unwrap_or_else(|| format!("booking-{}", booking.id));
        if !self.dedup.claim(&event_id) {
            return self.skip(booking, SkipReason::Duplicate);
        }

        let event = self.builder.build_purchase_event(
            booking,
            webhook.sale.as_ref(),
            &event_id,
            stored.as_ref(),
            Utc::now(),
        );
        let batch = EventBatch::single(event, self.test_event_code(webhook.test_event_code));

        match self.client.deliver(&batch).await {
            Ok(response) => {
                metrics::counter!("relay.events_forwarded", "kind" => "purchase").increment(1);
                info!(%event_id, booking_id = %booking.id, "booking forwarded");
                RelayOutcome::Forwarded { event_id, response }
            }
            Err(error) => {
                self.dedup.release(&event_id);
                warn!(%event_id, error = %error, "booking delivery failed");
                RelayOutcome::DeliveryFailed { event_id, error }
            }
        }
    }

    fn skip(&self, booking: &BookingRecord, reason: SkipReason) -> RelayOutcome {
        metrics::counter!("relay.bookings_skipped", "reason" => reason.as_str()).increment(1);
        info!(booking_id = %booking.id, reason = reason.as_str(), "booking skipped");
        RelayOutcome::Skipped(reason)
    }

    /// Reverse lookup against the attribution store for bookings that
    /// arrive without an explicit key.
    fn find_key_by_pii(&self, booking: &BookingRecord) -> Option<String> {
        let client = booking.client.as_ref()?;
        let name_combo = match (client.first_name.as_deref(), client.last_name.as_deref()) {
            (Some(first), Some(last)) => self.hasher.name_combo(first, last),
            _ => None,
        };
        let query = IdentityQuery {
            email: client
                .email
                .as_deref()
                .and_then(|v| self.hasher.token(IdentityKind::Email, v)),
            phone: client
                .phone
                .as_deref()
                .and_then(|v| self.hasher.token(IdentityKind::Phone, v)),
            name_combo,
        };
        if query.email.is_none() && query.phone.is_none() && query.name_combo.is_none() {
            return None;
        }
        self.attribution.find_by_identity(&query)
    }

    fn test_event_code(&self, inbound: Option<String>) -> Option<String> {
        inbound
            .filter(|code| !code.is_empty())
            .or_else(|| self.config.conversions.test_event_code.clone())
    }
}
