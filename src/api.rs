//! Control surface: health check, run trigger, last-run status, metrics.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::metrics::Metrics;
use crate::pipeline::{Pipeline, RunResult};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let app = Router::new()
        .route("/", get(|| async { "OK - deals bot online" }))
        .route("/run", get(trigger_run))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

async fn trigger_run(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.try_spawn() {
        Some(_) => {
            tracing::info!("run triggered over HTTP");
            (StatusCode::ACCEPTED, "run started")
        }
        None => (StatusCode::CONFLICT, "run already in progress"),
    }
}

#[derive(Serialize)]
struct StatusResp {
    running: bool,
    last_run: Option<RunResult>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    Json(StatusResp {
        running: state.pipeline.is_running(),
        last_run: state.pipeline.last_result(),
    })
}
