//! Single pipeline run for cron-style scheduling. Exits non-zero only when the
//! configuration cannot be loaded.

use goldbox_deals::{DealsConfig, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    goldbox_deals::init_tracing();

    let cfg = DealsConfig::load()?;
    let pipeline = Pipeline::from_config(cfg)?;
    let result = pipeline.run().await;

    println!(
        "{:?}: {} published ({} delivered) from {} discovered",
        result.outcome,
        result.published.len(),
        result.delivered,
        result.discovered
    );
    Ok(())
}
