use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use super::{ChainError, GaugeChain};

#[derive(Debug, Clone)]
struct Position {
    token_id: U256,
    gauge: Address,
    voting_power: U256,
    boost: U256,
}

/// In-memory chain state for exercising the snapshot job without an RPC node.
///
/// Unknown weights and amounts read as zero, unknown links as the zero address, and
/// unknown token decimals fail the read.
#[derive(Debug, Clone, Default)]
pub struct MockGaugeChain {
    gauges: Vec<Address>,
    weights: HashMap<Address, U256>,
    bribes: HashMap<Address, Address>,
    beneficiaries: HashMap<Address, Address>,
    positions: HashMap<Address, Vec<Position>>,
    rewards: HashMap<Address, Vec<Address>>,
    reward_amounts: HashMap<(Address, Address, U256), U256>,
    decimals: HashMap<Address, u8>,
    failing_weights: HashSet<Address>,
    failing_bribes: HashSet<Address>,
    slow_gauges: HashMap<Address, Duration>,
    failing_enumeration: bool,
}

fn unavailable(method: &str) -> ChainError {
    ChainError::Call {
        method: method.to_string(),
        reason: "execution reverted".to_string(),
    }
}

impl MockGaugeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gauge with its veMEZO weight
    pub fn with_gauge(mut self, gauge: Address, weight: U256) -> Self {
        self.gauges.push(gauge);
        self.weights.insert(gauge, weight);
        self
    }

    pub fn with_bribe(mut self, gauge: Address, bribe: Address) -> Self {
        self.bribes.insert(gauge, bribe);
        self
    }

    pub fn with_beneficiary(mut self, gauge: Address, owner: Address) -> Self {
        self.beneficiaries.insert(gauge, owner);
        self
    }

    /// Gives `owner` a veBTC position bound to `gauge`
    pub fn with_position(
        mut self,
        owner: Address,
        token_id: U256,
        gauge: Address,
        voting_power: U256,
        boost: U256,
    ) -> Self {
        self.positions.entry(owner).or_default().push(Position {
            token_id,
            gauge,
            voting_power,
            boost,
        });
        self
    }

    /// Deposits `amount` of `token` in `bribe` for an epoch
    pub fn with_reward(
        mut self,
        bribe: Address,
        token: Address,
        epoch_start: i64,
        amount: U256,
    ) -> Self {
        let tokens = self.rewards.entry(bribe).or_default();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
        let epoch = U256::from(epoch_start.max(0) as u64);
        self.reward_amounts.insert((bribe, token, epoch), amount);
        self
    }

    pub fn with_decimals(mut self, token: Address, decimals: u8) -> Self {
        self.decimals.insert(token, decimals);
        self
    }

    /// Makes the weight read of `gauge` revert
    pub fn failing_weight(mut self, gauge: Address) -> Self {
        self.failing_weights.insert(gauge);
        self
    }

    /// Makes every read on `bribe` revert
    pub fn failing_bribe(mut self, bribe: Address) -> Self {
        self.failing_bribes.insert(bribe);
        self
    }

    /// Delays the weight read of `gauge`
    pub fn slow_gauge(mut self, gauge: Address, delay: Duration) -> Self {
        self.slow_gauges.insert(gauge, delay);
        self
    }

    /// Makes the gauge count read revert
    pub fn failing_enumeration(mut self) -> Self {
        self.failing_enumeration = true;
        self
    }

    fn position(&self, token_id: U256) -> Option<&Position> {
        self.positions
            .values()
            .flatten()
            .find(|position| position.token_id == token_id)
    }

    fn check_bribe(&self, bribe: Address, method: &str) -> Result<(), ChainError> {
        if self.failing_bribes.contains(&bribe) {
            return Err(unavailable(method));
        }
        Ok(())
    }
}

#[async_trait]
impl GaugeChain for MockGaugeChain {
    async fn gauge_count(&self) -> Result<U256, ChainError> {
        if self.failing_enumeration {
            return Err(unavailable("length"));
        }
        Ok(U256::from(self.gauges.len()))
    }

    async fn gauge_at(&self, index: U256) -> Result<Address, ChainError> {
        usize::try_from(index.low_u64())
            .ok()
            .and_then(|index| self.gauges.get(index))
            .copied()
            .ok_or_else(|| unavailable("gauges"))
    }

    async fn gauge_weight(&self, gauge: Address) -> Result<U256, ChainError> {
        if let Some(delay) = self.slow_gauges.get(&gauge) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_weights.contains(&gauge) {
            return Err(unavailable("weights"));
        }
        Ok(self.weights.get(&gauge).copied().unwrap_or_default())
    }

    async fn gauge_bribe(&self, gauge: Address) -> Result<Address, ChainError> {
        Ok(self.bribes.get(&gauge).copied().unwrap_or_default())
    }

    async fn rewards_beneficiary(&self, gauge: Address) -> Result<Address, ChainError> {
        Ok(self.beneficiaries.get(&gauge).copied().unwrap_or_default())
    }

    async fn position_count(&self, owner: Address) -> Result<U256, ChainError> {
        Ok(U256::from(self.positions.get(&owner).map_or(0, Vec::len)))
    }

    async fn position_at(&self, owner: Address, index: U256) -> Result<U256, ChainError> {
        usize::try_from(index.low_u64())
            .ok()
            .and_then(|index| self.positions.get(&owner)?.get(index))
            .map(|position| position.token_id)
            .ok_or_else(|| unavailable("ownerToNFTokenIdList"))
    }

    async fn position_gauge(&self, token_id: U256) -> Result<Address, ChainError> {
        Ok(self
            .position(token_id)
            .map(|position| position.gauge)
            .unwrap_or_default())
    }

    async fn voting_power(&self, token_id: U256) -> Result<U256, ChainError> {
        Ok(self
            .position(token_id)
            .map(|position| position.voting_power)
            .unwrap_or_default())
    }

    async fn boost(&self, token_id: U256) -> Result<U256, ChainError> {
        Ok(self
            .position(token_id)
            .map(|position| position.boost)
            .unwrap_or_default())
    }

    async fn reward_count(&self, bribe: Address) -> Result<U256, ChainError> {
        self.check_bribe(bribe, "rewardsListLength")?;
        Ok(U256::from(self.rewards.get(&bribe).map_or(0, Vec::len)))
    }

    async fn reward_token_at(&self, bribe: Address, index: U256) -> Result<Address, ChainError> {
        self.check_bribe(bribe, "rewards")?;
        usize::try_from(index.low_u64())
            .ok()
            .and_then(|index| self.rewards.get(&bribe)?.get(index))
            .copied()
            .ok_or_else(|| unavailable("rewards"))
    }

    async fn reward_amount(
        &self,
        bribe: Address,
        token: Address,
        epoch_start: U256,
    ) -> Result<U256, ChainError> {
        self.check_bribe(bribe, "tokenRewardsPerEpoch")?;
        Ok(self
            .reward_amounts
            .get(&(bribe, token, epoch_start))
            .copied()
            .unwrap_or_default())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        self.decimals
            .get(&token)
            .copied()
            .ok_or_else(|| unavailable("decimals"))
    }
}
