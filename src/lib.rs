// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod discount;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod history;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod price;
pub mod rank;

// ---- Re-exports for stable public API ----
pub use crate::config::DealsConfig;
pub use crate::model::{CandidateItem, ExtractedListing};
pub use crate::pipeline::{Pipeline, RunOutcome, RunResult};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("goldbox_deals=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
