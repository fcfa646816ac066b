//! Inbound webhook payload model.
//!
//! Upstream systems disagree on field names (`firstName` vs `first_name`,
//! `source` vs `createdBy`, `appointmentId` vs `bookingId`). Every variant
//! is collapsed onto one canonical shape here, in a single normalization
//! step, so downstream components never do fallback-field lookups.

use serde::Deserialize;
use std::collections::HashMap;

/// An inbound call, resolved once at the webhook boundary.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// Checkout-intent signal from the website.
    Intent(IntentRequest),
    /// Booking from the scheduling platform, optionally carrying a sale.
    Booking(BookingWebhook),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntentRequest {
    #[serde(default, alias = "eventName")]
    pub event_name: Option<String>,
    #[serde(default, alias = "eventId")]
    pub event_id: Option<String>,
    #[serde(default, alias = "eventSourceUrl", alias = "sourceUrl")]
    pub event_source_url: Option<String>,
    #[serde(default, alias = "userData")]
    pub user_data: Option<RawUserData>,
    #[serde(default, alias = "testEventCode")]
    pub test_event_code: Option<String>,
}

/// Identity fields as supplied by the caller, raw or pre-hashed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUserData {
    #[serde(default, alias = "email")]
    pub em: Option<String>,
    #[serde(default, alias = "phone")]
    pub ph: Option<String>,
    #[serde(default, rename = "fn", alias = "firstName", alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, rename = "ln", alias = "lastName", alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default, alias = "city")]
    pub ct: Option<String>,
    #[serde(default, alias = "state", alias = "region")]
    pub st: Option<String>,
    #[serde(default, alias = "zip", alias = "postalCode")]
    pub zp: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "externalId")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub fbp: Option<String>,
    #[serde(default)]
    pub fbc: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingWebhook {
    #[serde(alias = "appointment")]
    pub booking: BookingRecord,
    #[serde(default, alias = "order", alias = "payment")]
    pub sale: Option<SaleRecord>,
    #[serde(default, alias = "testEventCode")]
    pub test_event_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRecord {
    #[serde(alias = "appointmentId", alias = "bookingId")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Explicit online-booking signal from the scheduling platform.
    #[serde(default, alias = "scheduledOnline", alias = "isOnline", alias = "onlineBooking")]
    pub online: Option<bool>,
    /// Source/channel/creator descriptor ("website", "admin", "staff-manual", ...).
    #[serde(default, alias = "source", alias = "createdBy", alias = "creatorType")]
    pub channel: Option<String>,
    #[serde(default, alias = "datetimeCreated", alias = "createdAt", alias = "created")]
    pub created_at: Option<String>,
    #[serde(default, alias = "customer")]
    pub client: Option<ClientRecord>,
    #[serde(default, alias = "referrerUrl")]
    pub referrer: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default, alias = "lineItems", alias = "services")]
    pub items: Option<Vec<LineItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRecord {
    #[serde(default, alias = "emailAddress")]
    pub email: Option<String>,
    #[serde(default, alias = "phoneNumber")]
    pub phone: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
    #[serde(default, alias = "postalCode", alias = "zip")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "region")]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleRecord {
    #[serde(default, alias = "total")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "amount")]
    pub price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_variants_collapse() {
        let raw = serde_json::json!({
            "appointment": {
                "appointmentId": "b-100",
                "status": "booked",
                "scheduledOnline": true,
                "createdBy": "client",
                "datetimeCreated": "2026-08-01T10:00:00Z",
                "customer": {
                    "firstName": "Alice",
                    "emailAddress": "alice@example.com",
                    "postalCode": "94110"
                },
                "lineItems": [{"name": "Consult", "amount": 45.0}]
            },
            "order": {"total": 45.0, "currency": "usd"}
        });

        let webhook: BookingWebhook = serde_json::from_value(raw).unwrap();
        assert_eq!(webhook.booking.id, "b-100");
        assert_eq!(webhook.booking.online, Some(true));
        assert_eq!(webhook.booking.channel.as_deref(), Some("client"));
        let client = webhook.booking.client.unwrap();
        assert_eq!(client.email.as_deref(), Some("alice@example.com"));
        assert_eq!(client.postal_code.as_deref(), Some("94110"));
        assert_eq!(webhook.sale.unwrap().amount, Some(45.0));
        assert_eq!(webhook.booking.items.unwrap()[0].price, Some(45.0));
    }

    #[test]
    fn test_intent_request_accepts_camel_case() {
        let raw = serde_json::json!({
            "eventId": "abc123",
            "eventSourceUrl": "https://example.com/book",
            "userData": {"email": "a@b.co", "fbp": "fb.1.111.222"}
        });
        let req: IntentRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.event_id.as_deref(), Some("abc123"));
        let ud = req.user_data.unwrap();
        assert_eq!(ud.em.as_deref(), Some("a@b.co"));
        assert_eq!(ud.fbp.as_deref(), Some("fb.1.111.222"));
    }
}
