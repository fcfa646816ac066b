//! HTTP server assembly: router, store-sweep task, metrics exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use relay_core::config::AppConfig;
use relay_delivery::HttpTransport;
use relay_pipeline::ConversionPipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Interval for the background store sweep. Lazy expiry on read is the
/// correctness mechanism; the sweep only bounds memory.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ApiServer {
    config: AppConfig,
}

impl ApiServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/webhooks/intent", post(rest::handle_intent))
            .route("/webhooks/booking", post(rest::handle_booking))
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the HTTP server and the periodic store sweep.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let transport = HttpTransport::new(
            self.config.conversions.endpoint.clone(),
            self.config.conversions.access_token.clone(),
            Duration::from_millis(self.config.delivery.timeout_ms),
        )?;
        let pipeline = Arc::new(ConversionPipeline::new(self.config.clone(), transport));

        let sweeper = pipeline.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let attribution = sweeper.attribution_store().evict_expired();
                let dedup = sweeper.dedup_store().evict_expired();
                if attribution + dedup > 0 {
                    debug!(attribution, dedup, "expired store entries swept");
                }
            }
        });

        let state = AppState {
            pipeline,
            shared_secret: self.config.webhook.shared_secret.clone(),
            start_time: Instant::now(),
        };

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            Self::build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
