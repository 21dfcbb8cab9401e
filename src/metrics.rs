use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

impl Metrics {
    /// Install the global Prometheus recorder once per process; later calls
    /// reuse the same handle.
    pub fn init() -> Self {
        let handle = HANDLE
            .get_or_init(|| {
                let handle = match PrometheusBuilder::new().install_recorder() {
                    Ok(h) => h,
                    Err(e) => {
                        // another recorder owns the global slot; render a private one
                        tracing::warn!(error = %e, "prometheus recorder not installed");
                        PrometheusBuilder::new().build_recorder().handle()
                    }
                };
                describe_all();
                handle
            })
            .clone();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe_all() {
    describe_counter!("deals_candidates_total", "Identifiers yielded by discovery.");
    describe_counter!("deals_endpoint_errors_total", "Endpoints skipped after fetch errors or challenges.");
    describe_counter!("deals_fetch_errors_total", "Fetches that failed after retries.");
    describe_counter!("deals_detail_fetches_total", "Detail-page escalations.");
    describe_counter!("deals_extracted_total", "Candidates that went through field extraction.");
    describe_counter!("deals_qualified_total", "Listings meeting the minimum discount.");
    describe_counter!("deals_published_total", "Listings handed to the notifier.");
    describe_counter!("deals_delivery_errors_total", "Notifier calls that failed.");
    describe_histogram!("deals_run_ms", "Pipeline run time in milliseconds.");
    describe_gauge!("deals_last_run_ts", "Unix ts when the pipeline last finished.");
}
