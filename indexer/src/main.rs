use std::error::Error;

use indexer::{build_job, JobConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // enable logging to console
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indexer=info,database=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = JobConfig::from_env()?;
    tracing::info!(
        "recording gauge history on {} via {} into {:?}",
        config.network,
        config.rpc_url,
        config.store
    );

    // run a single snapshot, the scheduler decides when to call again
    let job = build_job(&config).await?;
    match job.run().await {
        Ok(report) => {
            tracing::info!(
                "recorded {} of {} gauges for epoch {}",
                report.gauges_processed,
                report.gauges_found,
                report.epoch_start
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("error in record-gauge-history: {}", e);
            Err(e.into())
        }
    }
}
