//! Read-only access to the gauge, escrow and bribe contracts.

pub mod mock;
pub mod rpc;

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, U256};

pub use mock::MockGaugeChain;
pub use rpc::RpcGaugeChain;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("could not connect to rpc: {0}")]
    Connection(String),

    #[error("invalid abi: {0}")]
    Abi(String),

    #[error("call to {method} failed: {reason}")]
    Call { method: String, reason: String },

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} does not fit in 64 bits")]
    Overflow(U256),
}

/// Typed contract reads used by the snapshot job
#[async_trait]
pub trait GaugeChain: Send + Sync {
    /// Number of gauges registered on the boost voter
    async fn gauge_count(&self) -> Result<U256, ChainError>;

    async fn gauge_at(&self, index: U256) -> Result<Address, ChainError>;

    /// veMEZO votes on a gauge
    async fn gauge_weight(&self, gauge: Address) -> Result<U256, ChainError>;

    /// Bribe contract linked to a gauge, zero when none
    async fn gauge_bribe(&self, gauge: Address) -> Result<Address, ChainError>;

    /// Owner receiving the gauge's rewards, zero when none
    async fn rewards_beneficiary(&self, gauge: Address) -> Result<Address, ChainError>;

    /// Number of veBTC positions held by `owner`
    async fn position_count(&self, owner: Address) -> Result<U256, ChainError>;

    async fn position_at(&self, owner: Address, index: U256) -> Result<U256, ChainError>;

    /// Gauge a veBTC position is bound to
    async fn position_gauge(&self, token_id: U256) -> Result<Address, ChainError>;

    async fn voting_power(&self, token_id: U256) -> Result<U256, ChainError>;

    /// Boost of a veBTC position, 18 decimals
    async fn boost(&self, token_id: U256) -> Result<U256, ChainError>;

    async fn reward_count(&self, bribe: Address) -> Result<U256, ChainError>;

    async fn reward_token_at(&self, bribe: Address, index: U256) -> Result<Address, ChainError>;

    /// Amount of `token` deposited in `bribe` for the epoch starting at `epoch_start`
    async fn reward_amount(
        &self,
        bribe: Address,
        token: Address,
        epoch_start: U256,
    ) -> Result<U256, ChainError>;

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError>;
}

/// Converts an on-chain length into a loop bound
pub fn index_count(count: U256) -> Result<u64, ChainError> {
    if count.bits() > 64 {
        return Err(ChainError::Overflow(count));
    }
    Ok(count.low_u64())
}
