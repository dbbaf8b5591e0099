//! Per-epoch gauge snapshot job.
//!
//! A run enumerates every gauge on the boost voter, reads its votes, its bound veBTC
//! position and the bribes deposited for the current epoch, derives an APY estimate and
//! upserts one `gauge_history` row per gauge. A gauge whose reads fail is skipped without
//! affecting the others; failing to enumerate gauges or to persist the rows fails the run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use amounts::{u256_to_bigdecimal, Amount, DEFAULT_DECIMALS};
use database::{GaugeSnapshot, SnapshotStore, StoreError};
use ethers::types::{Address, U256};
use futures::stream::{self, StreamExt};

use crate::chain::{index_count, ChainError, GaugeChain};
use crate::config::ConfigError;
use crate::epoch::epoch_start;
use crate::pricing::{FixedPrices, PriceFeed};

/// Weekly returns are projected over this many weeks, without compounding
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// APY recorded for a gauge with bribes but no votes
pub const UNBOUNDED_APY: f64 = 999_999.0;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to enumerate gauges: {0}")]
    Enumeration(#[source] ChainError),

    #[error("failed to store gauge history: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub epoch_start: i64,
    pub gauges_found: usize,
    pub gauges_processed: usize,
    pub gauges_skipped: usize,
}

/// veBTC position bound to a gauge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPosition {
    pub token_id: U256,
    pub voting_power: U256,
    pub boost: U256,
}

/// Links a gauge holds to other contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeLinks {
    pub bribe: Address,
    pub beneficiary: Address,
}

pub struct SnapshotJob {
    chain: Arc<dyn GaugeChain>,
    store: Arc<dyn SnapshotStore>,
    prices: Arc<dyn PriceFeed>,
    call_timeout: Duration,
    concurrency: usize,
}

impl SnapshotJob {
    pub fn new(chain: Arc<dyn GaugeChain>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            chain,
            store,
            prices: Arc::new(FixedPrices::default()),
            call_timeout: Duration::from_secs(10),
            concurrency: 4,
        }
    }

    pub fn with_prices(mut self, prices: Arc<dyn PriceFeed>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Number of gauges processed at the same time, at least one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Snapshots every gauge for the current epoch
    pub async fn run(&self) -> Result<JobReport, JobError> {
        self.run_at(chrono::Utc::now().timestamp()).await
    }

    /// Snapshots every gauge for the epoch containing `now`
    pub async fn run_at(&self, now: i64) -> Result<JobReport, JobError> {
        let epoch = epoch_start(now);
        tracing::info!(
            epoch_start = epoch,
            "starting gauge history snapshot for epoch {}",
            chrono::DateTime::<chrono::Utc>::from_timestamp(epoch, 0)
                .map(|start| start.to_rfc3339())
                .unwrap_or_default()
        );

        let gauges = self
            .enumerate_gauges()
            .await
            .map_err(JobError::Enumeration)?;
        tracing::info!("found {} gauges", gauges.len());

        if gauges.is_empty() {
            return Ok(JobReport {
                epoch_start: epoch,
                gauges_found: 0,
                gauges_processed: 0,
                gauges_skipped: 0,
            });
        }

        let results: Vec<(Address, Result<GaugeSnapshot, ChainError>)> =
            stream::iter(gauges.iter().copied())
                .map(|gauge| async move { (gauge, self.snapshot_gauge(gauge, epoch).await) })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut rows = Vec::with_capacity(results.len());
        for (gauge, result) in results {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!("skipping gauge {:#x}: {}", gauge, e),
            }
        }

        if !rows.is_empty() {
            self.store.upsert_snapshots(&rows).await?;
            tracing::info!("recorded {} gauge snapshots", rows.len());
        }

        Ok(JobReport {
            epoch_start: epoch,
            gauges_found: gauges.len(),
            gauges_processed: rows.len(),
            gauges_skipped: gauges.len() - rows.len(),
        })
    }

    /// Applies the per-call timeout to a chain read
    async fn read<T>(
        &self,
        call: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| ChainError::Timeout(self.call_timeout))?
    }

    async fn enumerate_gauges(&self) -> Result<Vec<Address>, ChainError> {
        let count = index_count(self.read(self.chain.gauge_count()).await?)?;

        let mut gauges = Vec::new();
        for index in 0..count {
            gauges.push(self.read(self.chain.gauge_at(U256::from(index))).await?);
        }

        Ok(gauges)
    }

    /// Builds the snapshot row of one gauge
    pub async fn snapshot_gauge(
        &self,
        gauge: Address,
        epoch: i64,
    ) -> Result<GaugeSnapshot, ChainError> {
        tracing::debug!("processing gauge {:#x}", gauge);

        let weight = self.fetch_gauge_weight(gauge).await?;
        let links = self.fetch_gauge_links(gauge).await?;
        let position = self
            .resolve_matching_position(gauge, links.beneficiary)
            .await?;
        let total_incentives_usd = self.sum_incentive_value(links.bribe, epoch).await?;
        let apy = compute_yield(
            total_incentives_usd,
            weight,
            self.prices.governance_token_price(),
        );

        tracing::info!(
            "processed gauge {:#x}: veMEZO={}, boost={:?}, incentives=${:.2}",
            gauge,
            Amount::from_u256(weight, DEFAULT_DECIMALS),
            position.as_ref().map(|p| boost_to_f64(p.boost)),
            total_incentives_usd
        );

        Ok(GaugeSnapshot {
            gauge_address: format!("{:#x}", gauge),
            epoch_start: epoch,
            vemezo_weight: u256_to_bigdecimal(weight),
            vebtc_weight: position
                .as_ref()
                .map(|p| u256_to_bigdecimal(p.voting_power)),
            boost_multiplier: position.as_ref().map(|p| boost_to_f64(p.boost)),
            total_incentives_usd: (total_incentives_usd > 0.0).then_some(total_incentives_usd),
            apy,
            unique_voters: None,
        })
    }

    /// veMEZO votes on the gauge
    pub async fn fetch_gauge_weight(&self, gauge: Address) -> Result<U256, ChainError> {
        self.read(self.chain.gauge_weight(gauge)).await
    }

    pub async fn fetch_gauge_links(&self, gauge: Address) -> Result<GaugeLinks, ChainError> {
        Ok(GaugeLinks {
            bribe: self.read(self.chain.gauge_bribe(gauge)).await?,
            beneficiary: self.read(self.chain.rewards_beneficiary(gauge)).await?,
        })
    }

    /// Finds the beneficiary's first veBTC position bound to `gauge`.
    ///
    /// Scans every position the beneficiary holds, so cost grows with their position count.
    pub async fn resolve_matching_position(
        &self,
        gauge: Address,
        beneficiary: Address,
    ) -> Result<Option<MatchedPosition>, ChainError> {
        if beneficiary.is_zero() {
            return Ok(None);
        }

        let count = index_count(self.read(self.chain.position_count(beneficiary)).await?)?;

        for index in 0..count {
            let token_id = self
                .read(self.chain.position_at(beneficiary, U256::from(index)))
                .await?;
            let mapped = self.read(self.chain.position_gauge(token_id)).await?;

            // addresses compare as bytes, so hex casing never matters
            if mapped == gauge {
                return Ok(Some(MatchedPosition {
                    token_id,
                    voting_power: self.read(self.chain.voting_power(token_id)).await?,
                    boost: self.read(self.chain.boost(token_id)).await?,
                }));
            }
        }

        Ok(None)
    }

    /// USD value of every bribe deposited for the epoch
    pub async fn sum_incentive_value(&self, bribe: Address, epoch: i64) -> Result<f64, ChainError> {
        if bribe.is_zero() {
            return Ok(0.0);
        }

        let epoch = U256::from(u64::try_from(epoch).unwrap_or_default());
        let count = index_count(self.read(self.chain.reward_count(bribe)).await?)?;

        let mut total = 0.0;
        for index in 0..count {
            let token = self
                .read(self.chain.reward_token_at(bribe, U256::from(index)))
                .await?;
            let amount = self
                .read(self.chain.reward_amount(bribe, token, epoch))
                .await?;

            if amount.is_zero() {
                continue;
            }

            let decimals = self.token_decimals(token).await;
            let units = Amount::from_u256(amount, decimals).to_f64();
            total += units * self.prices.token_price(token);
        }

        Ok(total)
    }

    /// Token decimals, falling back to 18 when the token does not answer
    async fn token_decimals(&self, token: Address) -> u32 {
        match self.read(self.chain.token_decimals(token)).await {
            Ok(decimals) => u32::from(decimals),
            Err(e) => {
                tracing::warn!(
                    "could not read decimals of {:#x}, assuming {}: {}",
                    token,
                    DEFAULT_DECIMALS,
                    e
                );
                DEFAULT_DECIMALS
            }
        }
    }
}

fn boost_to_f64(boost: U256) -> f64 {
    Amount::from_u256(boost, DEFAULT_DECIMALS).to_f64()
}

/// Annualized yield in percent from one epoch of bribes.
///
/// `weight` is the raw 18-decimals veMEZO vote total. Bribes with no votes yield
/// [`UNBOUNDED_APY`]; no bribes yield nothing.
pub fn compute_yield(
    total_incentives_usd: f64,
    weight: U256,
    governance_price: f64,
) -> Option<f64> {
    if total_incentives_usd <= 0.0 {
        return None;
    }

    if weight.is_zero() {
        return Some(UNBOUNDED_APY);
    }

    let staked_usd = Amount::from_u256(weight, DEFAULT_DECIMALS).to_f64() * governance_price;
    if staked_usd <= 0.0 {
        return None;
    }

    let weekly_return = total_incentives_usd / staked_usd;
    Some(weekly_return * WEEKS_PER_YEAR * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockGaugeChain;
    use crate::epoch::EPOCH_DURATION;
    use crate::pricing::{MEZO_PRICE_USD, MEZO_TOKEN};
    use bigdecimal::BigDecimal;
    use database::MemoryStore;

    const NOW: i64 = 1_717_588_800;
    const EPOCH: i64 = 1_717_027_200;

    fn address(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn tokens(units: u64, decimals: usize) -> U256 {
        U256::from(units) * U256::exp10(decimals)
    }

    fn mezo() -> Address {
        address(0x7b7c)
    }

    fn job(chain: MockGaugeChain, store: Arc<MemoryStore>) -> SnapshotJob {
        SnapshotJob::new(Arc::new(chain), store)
            .with_prices(Arc::new(FixedPrices::new(mezo())))
            .with_call_timeout(Duration::from_millis(200))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[tokio::test]
    async fn no_gauges_succeeds_without_writing() {
        let store = Arc::new(MemoryStore::new());
        let report = job(MockGaugeChain::new(), store.clone())
            .run_at(NOW)
            .await
            .unwrap();

        assert_eq!(
            report,
            JobReport {
                epoch_start: EPOCH,
                gauges_found: 0,
                gauges_processed: 0,
                gauges_skipped: 0,
            }
        );
        assert!(store.rows().await.is_empty());
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn failing_gauge_is_skipped() {
        let chain = MockGaugeChain::new()
            .with_gauge(address(1), tokens(10, 18))
            .with_gauge(address(2), tokens(20, 18))
            .failing_weight(address(1));
        let store = Arc::new(MemoryStore::new());

        let report = job(chain, store.clone()).run_at(NOW).await.unwrap();

        assert_eq!(report.gauges_found, 2);
        assert_eq!(report.gauges_processed, 1);
        assert_eq!(report.gauges_skipped, 1);

        let rows = store.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gauge_address, format!("{:#x}", address(2)));
        assert_eq!(rows[0].epoch_start, EPOCH);
        assert_eq!(rows[0].vemezo_weight, u256_to_bigdecimal(tokens(20, 18)));
    }

    #[tokio::test]
    async fn failing_bribe_skips_gauge() {
        let chain = MockGaugeChain::new()
            .with_gauge(address(1), tokens(10, 18))
            .with_bribe(address(1), address(0xb1))
            .failing_bribe(address(0xb1));
        let store = Arc::new(MemoryStore::new());

        let report = job(chain, store.clone()).run_at(NOW).await.unwrap();

        assert_eq!(report.gauges_processed, 0);
        assert_eq!(report.gauges_skipped, 1);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn slow_gauge_times_out_without_blocking_others() {
        let chain = MockGaugeChain::new()
            .with_gauge(address(1), tokens(10, 18))
            .with_gauge(address(2), tokens(20, 18))
            .slow_gauge(address(1), Duration::from_secs(30));
        let store = Arc::new(MemoryStore::new());

        let report = job(chain, store.clone()).run_at(NOW).await.unwrap();

        assert_eq!(report.gauges_processed, 1);
        assert!(store
            .get(&format!("{:#x}", address(2)), EPOCH)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn sums_incentives_across_tokens() {
        let gauge = address(1);
        let bribe = address(0xb1);
        let wbtc = address(0xbc);
        let chain = MockGaugeChain::new()
            .with_gauge(gauge, tokens(1_000, 18))
            .with_bribe(gauge, bribe)
            .with_reward(bribe, mezo(), EPOCH, tokens(100, 18))
            .with_reward(bribe, wbtc, EPOCH, U256::from(100_000u64))
            .with_reward(bribe, address(0xdd), EPOCH - EPOCH_DURATION, tokens(5, 18))
            .with_decimals(mezo(), 18)
            .with_decimals(wbtc, 8);
        let store = Arc::new(MemoryStore::new());

        job(chain, store.clone()).run_at(NOW).await.unwrap();

        // 100 MEZO at 0.22 plus 0.001 BTC at the flat placeholder price
        let expected = 100.0 * 0.22 + 0.001 * 100_000.0;
        let row = store.get(&format!("{:#x}", gauge), EPOCH).await.unwrap();
        assert!(close(row.total_incentives_usd.unwrap(), expected));

        // 122 USD over 1,000 veMEZO worth 220 USD, projected over 52 weeks
        let expected_apy = expected / 220.0 * 52.0 * 100.0;
        assert!(close(row.apy.unwrap(), expected_apy));
    }

    #[tokio::test]
    async fn default_prices_value_mezo_bribes() {
        let gauge = address(1);
        let bribe = address(0xb1);
        let chain = MockGaugeChain::new()
            .with_gauge(gauge, tokens(1_000, 18))
            .with_bribe(gauge, bribe)
            .with_reward(bribe, MEZO_TOKEN, EPOCH, tokens(100, 18))
            .with_decimals(MEZO_TOKEN, 18);
        let store = Arc::new(MemoryStore::new());

        SnapshotJob::new(Arc::new(chain), store.clone())
            .run_at(NOW)
            .await
            .unwrap();

        let row = store.get(&format!("{:#x}", gauge), EPOCH).await.unwrap();
        assert!(close(
            row.total_incentives_usd.unwrap(),
            100.0 * MEZO_PRICE_USD
        ));
        assert!(close(row.apy.unwrap(), 100.0 / 1_000.0 * 52.0 * 100.0));
    }

    #[tokio::test]
    async fn unreadable_decimals_default_to_eighteen() {
        let gauge = address(1);
        let bribe = address(0xb1);
        let chain = MockGaugeChain::new()
            .with_gauge(gauge, tokens(1, 18))
            .with_bribe(gauge, bribe)
            .with_reward(bribe, mezo(), EPOCH, tokens(50, 18));
        let store = Arc::new(MemoryStore::new());

        job(chain, store.clone()).run_at(NOW).await.unwrap();

        let row = store.get(&format!("{:#x}", gauge), EPOCH).await.unwrap();
        assert!(close(row.total_incentives_usd.unwrap(), 50.0 * 0.22));
    }

    #[tokio::test]
    async fn bribes_without_votes_get_sentinel_apy() {
        let gauge = address(1);
        let bribe = address(0xb1);
        let chain = MockGaugeChain::new()
            .with_gauge(gauge, U256::zero())
            .with_bribe(gauge, bribe)
            .with_reward(bribe, mezo(), EPOCH, tokens(10, 18))
            .with_decimals(mezo(), 18);
        let store = Arc::new(MemoryStore::new());

        job(chain, store.clone()).run_at(NOW).await.unwrap();

        let row = store.get(&format!("{:#x}", gauge), EPOCH).await.unwrap();
        assert_eq!(row.apy, Some(UNBOUNDED_APY));
    }

    #[tokio::test]
    async fn no_bribes_leave_yield_absent() {
        let gauge = address(1);
        let chain = MockGaugeChain::new().with_gauge(gauge, tokens(10, 18));
        let store = Arc::new(MemoryStore::new());

        job(chain, store.clone()).run_at(NOW).await.unwrap();

        let row = store.get(&format!("{:#x}", gauge), EPOCH).await.unwrap();
        assert_eq!(row.apy, None);
        assert_eq!(row.total_incentives_usd, None);
        assert_eq!(row.vebtc_weight, None);
        assert_eq!(row.boost_multiplier, None);
        assert_eq!(row.unique_voters, None);
    }

    #[tokio::test]
    async fn matches_first_position_bound_to_gauge() {
        let gauge = address(1);
        let other_gauge = address(2);
        let owner = address(0xa1);
        let chain = MockGaugeChain::new()
            .with_gauge(gauge, tokens(10, 18))
            .with_beneficiary(gauge, owner)
            .with_position(
                owner,
                U256::from(7),
                other_gauge,
                tokens(1, 18),
                tokens(3, 18),
            )
            .with_position(
                owner,
                U256::from(8),
                gauge,
                tokens(4, 18),
                U256::from(2_500_000_000_000_000_000u64),
            )
            .with_position(owner, U256::from(9), gauge, tokens(9, 18), tokens(9, 18));
        let store = Arc::new(MemoryStore::new());

        job(chain, store.clone()).run_at(NOW).await.unwrap();

        let row = store.get(&format!("{:#x}", gauge), EPOCH).await.unwrap();
        assert_eq!(row.vebtc_weight, Some(u256_to_bigdecimal(tokens(4, 18))));
        assert_eq!(row.boost_multiplier, Some(2.5));
    }

    #[tokio::test]
    async fn rerun_in_same_epoch_overwrites() {
        let chain = MockGaugeChain::new()
            .with_gauge(address(1), tokens(10, 18))
            .with_gauge(address(2), tokens(20, 18));
        let store = Arc::new(MemoryStore::new());
        let job = job(chain, store.clone());

        job.run_at(NOW).await.unwrap();
        job.run_at(NOW + 3_600).await.unwrap();

        assert_eq!(store.rows().await.len(), 2);
        assert_eq!(store.write_count().await, 2);
    }

    #[tokio::test]
    async fn enumeration_failure_fails_run() {
        let chain = MockGaugeChain::new()
            .with_gauge(address(1), tokens(10, 18))
            .failing_enumeration();
        let store = Arc::new(MemoryStore::new());

        let result = job(chain, store.clone()).run_at(NOW).await;

        assert!(matches!(result, Err(JobError::Enumeration(_))));
        assert!(store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn store_failure_fails_run() {
        let chain = MockGaugeChain::new().with_gauge(address(1), tokens(10, 18));
        let store = Arc::new(MemoryStore::rejecting("connection reset"));

        let result = job(chain, store).run_at(NOW).await;

        assert!(matches!(result, Err(JobError::Store(_))));
    }

    #[tokio::test]
    async fn sequential_run_keeps_gauge_order() {
        let chain = MockGaugeChain::new()
            .with_gauge(address(3), tokens(1, 18))
            .with_gauge(address(1), tokens(2, 18))
            .with_gauge(address(2), tokens(3, 18));
        let store = Arc::new(MemoryStore::new());

        let report = job(chain, store.clone())
            .with_concurrency(1)
            .run_at(NOW)
            .await
            .unwrap();

        assert_eq!(report.gauges_processed, 3);
        let weight = store
            .get(&format!("{:#x}", address(2)), EPOCH)
            .await
            .unwrap()
            .vemezo_weight;
        assert_eq!(
            weight,
            BigDecimal::from(3u64) * BigDecimal::from(1_000_000_000_000_000_000u64)
        );
    }

    #[test]
    fn yield_formula() {
        // 22 USD of bribes on 1,000 veMEZO at 0.22 USD
        let apy = compute_yield(22.0, tokens(1_000, 18), 0.22).unwrap();
        assert!(close(apy, 520.0));

        assert_eq!(compute_yield(0.0, tokens(1_000, 18), 0.22), None);
        assert_eq!(compute_yield(5.0, U256::zero(), 0.22), Some(UNBOUNDED_APY));
        assert_eq!(compute_yield(5.0, tokens(1, 18), 0.0), None);
    }
}
