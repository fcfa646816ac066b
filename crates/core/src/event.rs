//! Outbound conversion event model, shaped for the downstream
//! conversions API. Events ship in single-element batches.

use serde::Serialize;

/// Standard event names emitted by the relay.
pub const EVENT_INTENT: &str = "InitiateCheckout";
pub const EVENT_PURCHASE: &str = "Purchase";

#[derive(Debug, Clone, Serialize)]
pub struct ConversionEvent {
    pub event_name: String,
    /// Epoch seconds. Never in the future, clamped to the look-back window.
    pub event_time: i64,
    /// Stable idempotency identifier, also the dedup key.
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_source_url: Option<String>,
    pub action_source: String,
    pub user_data: UserData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,
}

/// Identity/attribution bundle. Carries hashed tokens, opaque browser ids,
/// and request metadata only; there is no field for raw email/phone/name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<String>,
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "ln", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub st: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_user_agent: Option<String>,
}

impl UserData {
    /// True when the bundle carries ad-click signal usable for matching.
    pub fn has_browser_ids(&self) -> bool {
        self.fbp.is_some() || self.fbc.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomData {
    pub value: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventBatch {
    pub data: Vec<ConversionEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_event_code: Option<String>,
}

impl EventBatch {
    pub fn single(event: ConversionEvent, test_event_code: Option<String>) -> Self {
        Self {
            data: vec![event],
            test_event_code,
        }
    }
}
