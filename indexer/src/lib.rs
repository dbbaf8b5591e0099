pub mod chain;
pub mod config;
pub mod epoch;
pub mod job;
pub mod pricing;

use std::sync::Arc;

use database::{Database, SnapshotStore, SupabaseStore};

pub use crate::chain::{ChainError, GaugeChain, MockGaugeChain, RpcGaugeChain};
pub use crate::config::{ConfigError, JobConfig, Network, StoreConfig};
pub use crate::job::{compute_yield, JobError, JobReport, SnapshotJob};
pub use crate::pricing::{FixedPrices, PriceFeed};

/// Connects the store and RPC client described by `config` and builds a job from them
pub async fn build_job(config: &JobConfig) -> Result<SnapshotJob, JobError> {
    let store: Arc<dyn SnapshotStore> = match &config.store {
        StoreConfig::Postgres { url } => {
            let database = Database::new(url)
                .await
                .map_err(|e| JobError::Connect(format!("database: {}", e)))?;
            database.migrate().await?;
            Arc::new(database)
        }
        StoreConfig::Supabase {
            url,
            service_role_key,
        } => Arc::new(SupabaseStore::new(url, service_role_key)),
    };

    let chain = RpcGaugeChain::connect(&config.rpc_url, config.boost_voter, config.ve_btc)
        .map_err(|e| JobError::Connect(e.to_string()))?;

    let prices = FixedPrices::new(config.mezo_token)
        .with_governance_price(config.mezo_price_usd)
        .with_fallback_price(config.fallback_price_usd);

    Ok(SnapshotJob::new(Arc::new(chain), store)
        .with_prices(Arc::new(prices))
        .with_call_timeout(config.call_timeout)
        .with_concurrency(config.concurrency))
}
