// tests/api_http.rs
//
// Control surface driven in-process via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /        (liveness)
// - GET /run     (202 when idle, 409 while a run is active)
// - GET /status  (last run summary as JSON)
// - GET /metrics (Prometheus text after a run)

mod common;

use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value as Json;
use tower::ServiceExt as _;

use common::*;
use goldbox_deals::api::{self, AppState};
use goldbox_deals::fetch::StaticFetcher;
use goldbox_deals::history::MemoryStore;
use goldbox_deals::metrics::Metrics;

const BODY_LIMIT: usize = 1024 * 1024;

fn one_deal_fetcher() -> StaticFetcher {
    StaticFetcher::new().with_page(
        DEALS_1,
        page(&[card("B0APITEST1", "Robot aspirapolvere con mappatura laser", "150,00 €", &["300,00 €"])]),
    )
}

fn app(h: &Harness, metrics: Option<&Metrics>) -> Router {
    api::router(
        AppState {
            pipeline: h.pipeline.clone(),
        },
        metrics,
    )
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

#[tokio::test]
async fn root_reports_online() {
    let h = harness(config(&[DEALS_1]), one_deal_fetcher(), MemoryStore::new());
    let (status, body) = get(app(&h, None), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK - deals bot online");
}

#[tokio::test]
async fn run_is_accepted_then_rejected_while_busy() {
    let fetcher = one_deal_fetcher().with_delay(Duration::from_millis(300));
    let h = harness(config(&[DEALS_1]), fetcher, MemoryStore::new());
    let router = app(&h, None);

    let (first, body) = get(router.clone(), "/run").await;
    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(body, "run started");
    assert!(h.pipeline.is_running());

    let (second, body) = get(router, "/run").await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body, "run already in progress");

    // waits for the background run to release the lock
    h.pipeline.run().await;
    assert!(h.store.snapshot().contains_key("B0APITEST1"));
}

#[tokio::test]
async fn status_reports_last_run() {
    let h = harness(config(&[DEALS_1]), one_deal_fetcher(), MemoryStore::new());

    let (_, before) = get(app(&h, None), "/status").await;
    let v: Json = serde_json::from_str(&before).expect("json");
    assert_eq!(v["running"], false);
    assert!(v["last_run"].is_null());

    h.pipeline.run_at(t0()).await;

    let (status, after) = get(app(&h, None), "/status").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&after).expect("json");
    assert_eq!(v["last_run"]["outcome"], "published");
    assert_eq!(v["last_run"]["published"][0]["asin"], "B0APITEST1");
    assert_eq!(v["last_run"]["published"][0]["discount"], 50);
}

#[tokio::test]
async fn metrics_endpoint_exposes_run_series() {
    let metrics = Metrics::init();
    let h = harness(config(&[DEALS_1]), one_deal_fetcher(), MemoryStore::new());
    h.pipeline.run_at(t0()).await;

    let (status, body) = get(app(&h, Some(&metrics)), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    for series in ["deals_candidates_total", "deals_published_total", "deals_last_run_ts"] {
        assert!(body.contains(series), "missing {series} in:\n{body}");
    }
}
