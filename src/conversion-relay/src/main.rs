//! Conversion Relay — webhook-to-webhook bridge forwarding booking and
//! checkout-intent events to an ad platform's server-side conversions API.
//!
//! Main entry point that loads configuration and starts the server.

use clap::Parser;
use relay_api::ApiServer;
use relay_core::config::AppConfig;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "conversion-relay")]
#[command(about = "Webhook-to-conversions-API relay for booking platforms")]
#[command(version)]
struct Cli {
    /// HTTP port (overrides config)
    #[arg(long, env = "CONVERSION_RELAY__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Conversions API access token (overrides config)
    #[arg(long, env = "CONVERSION_RELAY__CONVERSIONS__ACCESS_TOKEN")]
    access_token: Option<String>,

    /// Attribution window in seconds (overrides config)
    #[arg(long, env = "CONVERSION_RELAY__ATTRIBUTION__WINDOW_SECS")]
    attribution_window: Option<u64>,

    /// Skip the metrics exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conversion_relay=info,relay_api=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Conversion Relay starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(token) = cli.access_token {
        config.conversions.access_token = token;
    }
    if let Some(window) = cli.attribution_window {
        config.attribution.window_secs = window;
    }

    if config.conversions.access_token.is_empty() {
        warn!("No conversions access token configured; deliveries will be rejected downstream");
    }
    if config.webhook.shared_secret.is_none() {
        warn!("No webhook shared secret configured; booking webhook is unauthenticated");
    }

    info!(
        http_port = config.api.http_port,
        attribution_window_secs = config.attribution.window_secs,
        dedup_window_secs = config.dedup.window_secs,
        pii_fallback = config.attribution.pii_fallback,
        "Configuration loaded"
    );

    let server = ApiServer::new(config);

    if !cli.no_metrics {
        if let Err(e) = server.start_metrics().await {
            warn!(error = %e, "Metrics exporter failed to start");
        }
    }

    server.start_http().await
}
