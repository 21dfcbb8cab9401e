//! Deals bot service entrypoint.
//! Serves the control surface (`/`, `/run`, `/status`, `/metrics`); runs are
//! triggered externally by hitting `/run` (cron, uptime pinger).

use std::sync::Arc;

use goldbox_deals::api::{self, AppState};
use goldbox_deals::metrics::Metrics;
use goldbox_deals::{DealsConfig, Pipeline};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Shuttle installs its own subscriber; this only matters outside it.
    goldbox_deals::init_tracing();

    let cfg = DealsConfig::load().map_err(shuttle_runtime::Error::Custom)?;
    tracing::info!(
        endpoints = cfg.endpoints.len(),
        min_discount = cfg.min_discount,
        max_items = cfg.max_items,
        retention_hours = cfg.retention_hours,
        "deals config loaded"
    );

    let pipeline = Pipeline::from_config(cfg).map_err(shuttle_runtime::Error::Custom)?;
    let metrics = Metrics::init();

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let router = api::router(state, Some(&metrics));

    Ok(router.into())
}
