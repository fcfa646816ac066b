use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CONVERSION_RELAY__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub conversions: ConversionsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub event: EventConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Downstream conversions API endpoint and credential.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionsConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub access_token: String,
    /// Sandbox marker forwarded with every batch when set.
    #[serde(default)]
    pub test_event_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret required on the booking webhook. Unset disables the check.
    #[serde(default)]
    pub shared_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionConfig {
    /// How long a stored intent record stays eligible for correlation.
    /// Deployments run this at 6h, 24h, or 7d.
    #[serde(default = "default_attribution_window_secs")]
    pub window_secs: u64,
    /// Allow reverse lookup by hashed PII when a booking has no explicit key.
    #[serde(default = "default_pii_fallback")]
    pub pii_fallback: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Require a "confirmed" status rather than accepting booked/scheduled/pending.
    #[serde(default = "default_require_confirmed")]
    pub require_confirmed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Window during which a forwarded event identifier blocks re-delivery.
    /// Independent of the attribution window.
    #[serde(default = "default_dedup_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTimePolicy {
    /// Stamp events with delivery time.
    Now,
    /// Use the booking's creation time, clamped to the look-back window.
    BookingTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuePolicy {
    /// Always report `default_value`.
    Fixed,
    /// Sale amount when present, else the sum of line-item prices.
    LineItems,
    /// Report zero when no reliable price exists.
    Zero,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    #[serde(default = "default_time_policy")]
    pub time_policy: EventTimePolicy,
    #[serde(default = "default_value_policy")]
    pub value_policy: ValuePolicy,
    #[serde(default = "default_value")]
    pub default_value: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Country calling code assumed for 10-digit phone numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_endpoint() -> String {
    "https://graph.facebook.com/v19.0/events".to_string()
}
fn default_attribution_window_secs() -> u64 { 86_400 }
fn default_pii_fallback() -> bool { true }
fn default_require_confirmed() -> bool { false }
fn default_dedup_window_secs() -> u64 { 86_400 }
fn default_time_policy() -> EventTimePolicy { EventTimePolicy::Now }
fn default_value_policy() -> ValuePolicy { ValuePolicy::LineItems }
fn default_value() -> f64 { 0.0 }
fn default_currency() -> String { "USD".to_string() }
fn default_country_code() -> String { "1".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 500 }
fn default_timeout_ms() -> u64 { 10_000 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for ConversionsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_token: String::new(),
            test_event_code: None,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            shared_secret: None,
        }
    }
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            window_secs: default_attribution_window_secs(),
            pii_fallback: default_pii_fallback(),
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            require_confirmed: default_require_confirmed(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: default_dedup_window_secs(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            time_policy: default_time_policy(),
            value_policy: default_value_policy(),
            default_value: default_value(),
            currency: default_currency(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            conversions: ConversionsConfig::default(),
            webhook: WebhookConfig::default(),
            attribution: AttributionConfig::default(),
            booking: BookingConfig::default(),
            dedup: DedupConfig::default(),
            event: EventConfig::default(),
            identity: IdentityConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CONVERSION_RELAY")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
