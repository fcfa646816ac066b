//! Outbound event assembly: identity hashing/merging, timestamp clamping,
//! and the value/currency policy.

use chrono::{DateTime, Utc};
use relay_core::config::{EventConfig, EventTimePolicy, ValuePolicy};
use relay_core::event::{ConversionEvent, CustomData, UserData, EVENT_INTENT, EVENT_PURCHASE};
use relay_core::identity::{is_hashed, IdentityHasher, IdentityKind};
use relay_core::types::{BookingRecord, IntentRequest, RawUserData, SaleRecord};
use relay_stores::AttributionRecord;

/// Look-back window for historical timestamps (seconds). Anything older
/// clamps to now rather than being rejected.
const MAX_EVENT_AGE_SECS: i64 = 7 * 24 * 3600;

/// Clamp a source timestamp to epoch seconds: unparseable, in the future,
/// or older than the look-back window all collapse to now.
pub fn clamp_event_time(source: Option<&str>, now: DateTime<Utc>) -> i64 {
    let now_secs = now.timestamp();
    let Some(raw) = source else {
        return now_secs;
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) else {
        return now_secs;
    };
    let secs = parsed.timestamp();
    if secs > now_secs || secs < now_secs - MAX_EVENT_AGE_SECS {
        now_secs
    } else {
        secs
    }
}

pub struct EventBuilder {
    hasher: IdentityHasher,
    config: EventConfig,
}

impl EventBuilder {
    pub fn new(hasher: IdentityHasher, config: EventConfig) -> Self {
        Self { hasher, config }
    }

    /// Intent events carry whatever identity the caller supplied plus the
    /// request IP/user-agent. No value descriptor: fabricating a price for
    /// a non-purchase signal would poison downstream reporting.
    pub fn build_intent_event(
        &self,
        request: &IntentRequest,
        event_id: &str,
        client_ip: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> ConversionEvent {
        let raw = request.user_data.clone().unwrap_or_default();
        let mut user_data = self.hash_raw_user_data(&raw);
        user_data.client_ip_address = client_ip;
        user_data.client_user_agent = user_agent;

        ConversionEvent {
            event_name: request
                .event_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| EVENT_INTENT.to_string()),
            event_time: now.timestamp(),
            event_id: event_id.to_string(),
            event_source_url: request.event_source_url.clone(),
            action_source: "website".to_string(),
            user_data,
            custom_data: None,
        }
    }

    /// Purchase-equivalent event from a classified booking, merging the
    /// stored attribution record into the identity bundle. The booking's
    /// own PII wins; stored fields fill the gaps; fbp/fbc only ever come
    /// from the store.
    pub fn build_purchase_event(
        &self,
        booking: &BookingRecord,
        sale: Option<&SaleRecord>,
        event_id: &str,
        stored: Option<&AttributionRecord>,
        now: DateTime<Utc>,
    ) -> ConversionEvent {
        let mut user_data = self.hash_booking_client(booking);
        if let Some(record) = stored {
            user_data.fbp = record.fbp.clone();
            user_data.fbc = record.fbc.clone();
            user_data.em = user_data.em.or_else(|| record.email.clone());
            user_data.ph = user_data.ph.or_else(|| record.phone.clone());
            user_data.first_name = user_data.first_name.or_else(|| record.first_name.clone());
            user_data.last_name = user_data.last_name.or_else(|| record.last_name.clone());
        }

        let event_time = match self.config.time_policy {
            EventTimePolicy::Now => now.timestamp(),
            EventTimePolicy::BookingTime => clamp_event_time(booking.created_at.as_deref(), now),
        };

        ConversionEvent {
            event_name: EVENT_PURCHASE.to_string(),
            event_time,
            event_id: event_id.to_string(),
            event_source_url: booking.referrer.clone(),
            action_source: "website".to_string(),
            user_data,
            custom_data: Some(self.custom_data(booking, sale)),
        }
    }

    /// Build the attribution record stored for later correlation. The
    /// name-combo hash can only be derived from raw names, so pre-hashed
    /// names index individually but not combined.
    pub fn attribution_record(&self, raw: &RawUserData) -> AttributionRecord {
        let name_combo = match (raw.first_name.as_deref(), raw.last_name.as_deref()) {
            (Some(first), Some(last)) if !is_hashed(first) && !is_hashed(last) => {
                self.hasher.name_combo(first, last)
            }
            _ => None,
        };
        AttributionRecord {
            fbp: raw.fbp.clone().filter(|v| !v.is_empty()),
            fbc: raw.fbc.clone().filter(|v| !v.is_empty()),
            email: self.token(IdentityKind::Email, raw.em.as_deref()),
            phone: self.token(IdentityKind::Phone, raw.ph.as_deref()),
            first_name: self.token(IdentityKind::FirstName, raw.first_name.as_deref()),
            last_name: self.token(IdentityKind::LastName, raw.last_name.as_deref()),
            name_combo,
        }
    }

    fn hash_raw_user_data(&self, raw: &RawUserData) -> UserData {
        UserData {
            em: self.token(IdentityKind::Email, raw.em.as_deref()),
            ph: self.token(IdentityKind::Phone, raw.ph.as_deref()),
            first_name: self.token(IdentityKind::FirstName, raw.first_name.as_deref()),
            last_name: self.token(IdentityKind::LastName, raw.last_name.as_deref()),
            ct: self.token(IdentityKind::City, raw.ct.as_deref()),
            st: self.token(IdentityKind::State, raw.st.as_deref()),
            zp: self.token(IdentityKind::Zip, raw.zp.as_deref()),
            country: self.token(IdentityKind::Country, raw.country.as_deref()),
            external_id: raw.external_id.clone().filter(|v| !v.is_empty()),
            fbp: raw.fbp.clone().filter(|v| !v.is_empty()),
            fbc: raw.fbc.clone().filter(|v| !v.is_empty()),
            client_ip_address: None,
            client_user_agent: None,
        }
    }

    fn hash_booking_client(&self, booking: &BookingRecord) -> UserData {
        let Some(client) = &booking.client else {
            return UserData::default();
        };
        UserData {
            em: self.token(IdentityKind::Email, client.email.as_deref()),
            ph: self.token(IdentityKind::Phone, client.phone.as_deref()),
            first_name: self.token(IdentityKind::FirstName, client.first_name.as_deref()),
            last_name: self.token(IdentityKind::LastName, client.last_name.as_deref()),
            ct: self.token(IdentityKind::City, client.city.as_deref()),
            st: self.token(IdentityKind::State, client.state.as_deref()),
            zp: self.token(IdentityKind::Zip, client.postal_code.as_deref()),
            country: self.token(IdentityKind::Country, client.country.as_deref()),
            ..Default::default()
        }
    }

    fn token(&self, kind: IdentityKind, raw: Option<&str>) -> Option<String> {
        raw.and_then(|value| self.hasher.token(kind, value))
    }

    fn custom_data(&self, booking: &BookingRecord, sale: Option<&SaleRecord>) -> CustomData {
        let value = match self.config.value_policy {
            ValuePolicy::Fixed => self.config.default_value,
            ValuePolicy::Zero => 0.0,
            ValuePolicy::LineItems => sale
                .and_then(|s| s.amount)
                .or_else(|| {
                    booking
                        .items
                        .as_ref()
                        .map(|items| items.iter().filter_map(|i| i.price).sum())
                })
                .unwrap_or(0.0),
        };
        let currency = sale
            .and_then(|s| s.currency.clone())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| self.config.currency.clone());
        let content_name = booking
            .items
            .as_ref()
            .and_then(|items| items.first())
            .and_then(|item| item.name.clone());

        CustomData {
            value,
            currency,
            content_name,
        }
    }
}
