use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    abi::{parse_abi, Detokenize, Tokenize},
    contract::{BaseContract, Contract},
    providers::{Http, Provider},
    types::{Address, U256},
};

use super::{ChainError, GaugeChain};

const BOOST_VOTER_ABI: &[&str] = &[
    "function length() external view returns (uint256)",
    "function gauges(uint256) external view returns (address)",
    "function weights(address) external view returns (uint256)",
    "function gaugeToBribe(address) external view returns (address)",
    "function boostableTokenIdToGauge(uint256) external view returns (address)",
    "function getBoost(uint256 boostableTokenId) external view returns (uint256)",
];

const VOTING_ESCROW_ABI: &[&str] = &[
    "function balanceOf(address _owner) external view returns (uint256)",
    "function ownerToNFTokenIdList(address _owner, uint256 _index) external view returns (uint256)",
    "function votingPowerOfNFT(uint256 _tokenId) external view returns (uint256)",
];

const GAUGE_ABI: &[&str] = &["function rewardsBeneficiary() external view returns (address)"];

const BRIBE_ABI: &[&str] = &[
    "function rewardsListLength() external view returns (uint256)",
    "function rewards(uint256) external view returns (address)",
    "function tokenRewardsPerEpoch(address token, uint256 epochStart) external view returns (uint256)",
];

const ERC20_ABI: &[&str] = &["function decimals() external view returns (uint8)"];

type HttpContract = Contract<Provider<Http>>;

/// `GaugeChain` backed by JSON-RPC calls over HTTP
pub struct RpcGaugeChain {
    client: Arc<Provider<Http>>,
    boost_voter: HttpContract,
    ve_btc: HttpContract,
    gauge: BaseContract,
    bribe: BaseContract,
    erc20: BaseContract,
}

fn base_contract(abi: &[&str]) -> Result<BaseContract, ChainError> {
    parse_abi(abi)
        .map(BaseContract::from)
        .map_err(|e| ChainError::Abi(e.to_string()))
}

impl RpcGaugeChain {
    pub fn connect(
        rpc_url: &str,
        boost_voter: Address,
        ve_btc: Address,
    ) -> Result<Self, ChainError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::Connection(e.to_string()))?;
        let client = Arc::new(provider);

        Ok(Self {
            boost_voter: Contract::new(
                boost_voter,
                base_contract(BOOST_VOTER_ABI)?,
                client.clone(),
            ),
            ve_btc: Contract::new(ve_btc, base_contract(VOTING_ESCROW_ABI)?, client.clone()),
            gauge: base_contract(GAUGE_ABI)?,
            bribe: base_contract(BRIBE_ABI)?,
            erc20: base_contract(ERC20_ABI)?,
            client,
        })
    }

    fn at(&self, abi: &BaseContract, address: Address) -> HttpContract {
        Contract::new(address, abi.clone(), self.client.clone())
    }
}

/// Calls a view function by name
async fn call<T, D>(contract: &HttpContract, method: &str, args: T) -> Result<D, ChainError>
where
    T: Tokenize,
    D: Detokenize + Send,
{
    contract
        .method::<T, D>(method, args)
        .map_err(|e| ChainError::Abi(e.to_string()))?
        .call()
        .await
        .map_err(|e| ChainError::Call {
            method: method.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl GaugeChain for RpcGaugeChain {
    async fn gauge_count(&self) -> Result<U256, ChainError> {
        call(&self.boost_voter, "length", ()).await
    }

    async fn gauge_at(&self, index: U256) -> Result<Address, ChainError> {
        call(&self.boost_voter, "gauges", index).await
    }

    async fn gauge_weight(&self, gauge: Address) -> Result<U256, ChainError> {
        call(&self.boost_voter, "weights", gauge).await
    }

    async fn gauge_bribe(&self, gauge: Address) -> Result<Address, ChainError> {
        call(&self.boost_voter, "gaugeToBribe", gauge).await
    }

    async fn rewards_beneficiary(&self, gauge: Address) -> Result<Address, ChainError> {
        call(&self.at(&self.gauge, gauge), "rewardsBeneficiary", ()).await
    }

    async fn position_count(&self, owner: Address) -> Result<U256, ChainError> {
        call(&self.ve_btc, "balanceOf", owner).await
    }

    async fn position_at(&self, owner: Address, index: U256) -> Result<U256, ChainError> {
        call(&self.ve_btc, "ownerToNFTokenIdList", (owner, index)).await
    }

    async fn position_gauge(&self, token_id: U256) -> Result<Address, ChainError> {
        call(&self.boost_voter, "boostableTokenIdToGauge", token_id).await
    }

    async fn voting_power(&self, token_id: U256) -> Result<U256, ChainError> {
        call(&self.ve_btc, "votingPowerOfNFT", token_id).await
    }

    async fn boost(&self, token_id: U256) -> Result<U256, ChainError> {
        call(&self.boost_voter, "getBoost", token_id).await
    }

    async fn reward_count(&self, bribe: Address) -> Result<U256, ChainError> {
        call(&self.at(&self.bribe, bribe), "rewardsListLength", ()).await
    }

    async fn reward_token_at(&self, bribe: Address, index: U256) -> Result<Address, ChainError> {
        call(&self.at(&self.bribe, bribe), "rewards", index).await
    }

    async fn reward_amount(
        &self,
        bribe: Address,
        token: Address,
        epoch_start: U256,
    ) -> Result<U256, ChainError> {
        call(
            &self.at(&self.bribe, bribe),
            "tokenRewardsPerEpoch",
            (token, epoch_start),
        )
        .await
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        call(&self.at(&self.erc20, token), "decimals", ()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abis_parse() {
        for abi in [
            BOOST_VOTER_ABI,
            VOTING_ESCROW_ABI,
            GAUGE_ABI,
            BRIBE_ABI,
            ERC20_ABI,
        ] {
            assert!(base_contract(abi).is_ok());
        }
    }

    #[test]
    fn connect_rejects_bad_url() {
        let result = RpcGaugeChain::connect("not a url", Address::zero(), Address::zero());
        assert!(matches!(result, Err(ChainError::Connection(_))));
    }
}
