//! Job configuration read from the environment.
//!
//! Values come from the process environment (or a `.env` file through `dotenvy`) every
//! time a run is built, so credentials can change between scheduled invocations.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ethers::types::Address;

use crate::pricing::{FALLBACK_TOKEN_PRICE_USD, MEZO_PRICE_USD};

pub const TESTNET_RPC_URL: &str = "https://rpc.test.mezo.org";
pub const MAINNET_RPC_URL: &str = "https://rpc.mezo.org";

pub const MEZO_TOKEN_ADDRESS: &str = "0x7B7c000000000000000000000000000000000001";
const TESTNET_BOOST_VOTER: &str = "0x21d7bDF5a5929AD179F8cA0c9014A0B62ae6Bfd1";
const TESTNET_VEBTC: &str = "0x38E35d92E6Bfc6787272A62345856B13eA12130a";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing persistence credentials: set DATABASE_URL, or SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY")]
    MissingCredentials,

    #[error("unknown network {0:?}, expected testnet or mainnet")]
    UnknownNetwork(String),

    #[error("{contract} has no known address on {network}; set {key}")]
    MissingContract {
        network: Network,
        contract: &'static str,
        key: &'static str,
    },

    #[error("{key} is not a valid address: {value}")]
    InvalidAddress { key: &'static str, value: String },

    #[error("{key} has an invalid value: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn rpc_url(self) -> &'static str {
        match self {
            Network::Testnet => TESTNET_RPC_URL,
            Network::Mainnet => MAINNET_RPC_URL,
        }
    }

    fn boost_voter(self) -> Option<&'static str> {
        match self {
            Network::Testnet => Some(TESTNET_BOOST_VOTER),
            Network::Mainnet => None,
        }
    }

    fn ve_btc(self) -> Option<&'static str> {
        match self {
            Network::Testnet => Some(TESTNET_VEBTC),
            Network::Mainnet => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Testnet => f.write_str("testnet"),
            Network::Mainnet => f.write_str("mainnet"),
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            _ => Err(ConfigError::UnknownNetwork(value.to_string())),
        }
    }
}

/// Where snapshots are written
#[derive(Clone, PartialEq)]
pub enum StoreConfig {
    Postgres {
        url: String,
    },
    Supabase {
        url: String,
        service_role_key: String,
    },
}

// credentials stay out of logs
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::Postgres { .. } => f.write_str("Postgres"),
            StoreConfig::Supabase { url, .. } => write!(f, "Supabase({})", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub network: Network,
    pub rpc_url: String,
    pub boost_voter: Address,
    pub ve_btc: Address,
    pub mezo_token: Address,
    pub store: StoreConfig,
    pub call_timeout: Duration,
    pub concurrency: usize,
    pub mezo_price_usd: f64,
    pub fallback_price_usd: f64,
}

impl JobConfig {
    /// Loads the configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let network = match get("MEZO_NETWORK") {
            Some(value) => value.parse()?,
            None => Network::Testnet,
        };

        let rpc_url = get("MEZO_RPC_URL").unwrap_or_else(|| network.rpc_url().to_string());

        let boost_voter = contract_address(
            get("BOOST_VOTER_ADDRESS"),
            network.boost_voter(),
            network,
            "BoostVoter",
            "BOOST_VOTER_ADDRESS",
        )?;
        let ve_btc = contract_address(
            get("VEBTC_ADDRESS"),
            network.ve_btc(),
            network,
            "veBTC",
            "VEBTC_ADDRESS",
        )?;
        let mezo_token = parse_address(
            "MEZO_TOKEN_ADDRESS",
            &get("MEZO_TOKEN_ADDRESS").unwrap_or_else(|| MEZO_TOKEN_ADDRESS.to_string()),
        )?;

        let store = match (
            get("DATABASE_URL"),
            get("SUPABASE_URL"),
            get("SUPABASE_SERVICE_ROLE_KEY"),
        ) {
            (Some(url), _, _) => StoreConfig::Postgres { url },
            (None, Some(url), Some(service_role_key)) => StoreConfig::Supabase {
                url,
                service_role_key,
            },
            _ => return Err(ConfigError::MissingCredentials),
        };

        let timeout_secs = parse_or(
            "RPC_TIMEOUT_SECS",
            get("RPC_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?;
        let concurrency = parse_or(
            "GAUGE_CONCURRENCY",
            get("GAUGE_CONCURRENCY"),
            DEFAULT_CONCURRENCY,
        )?;
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GAUGE_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        let mezo_price_usd = parse_or("MEZO_PRICE_USD", get("MEZO_PRICE_USD"), MEZO_PRICE_USD)?;
        let fallback_price_usd = parse_or(
            "FALLBACK_TOKEN_PRICE_USD",
            get("FALLBACK_TOKEN_PRICE_USD"),
            FALLBACK_TOKEN_PRICE_USD,
        )?;

        Ok(Self {
            network,
            rpc_url,
            boost_voter,
            ve_btc,
            mezo_token,
            store,
            call_timeout: Duration::from_secs(timeout_secs),
            concurrency,
            mezo_price_usd,
            fallback_price_usd,
        })
    }
}

fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress {
            key,
            value: value.to_string(),
        })
}

fn contract_address(
    configured: Option<String>,
    known: Option<&'static str>,
    network: Network,
    contract: &'static str,
    key: &'static str,
) -> Result<Address, ConfigError> {
    match (configured, known) {
        (Some(value), _) => parse_address(key, &value),
        (None, Some(value)) => parse_address(key, value),
        (None, None) => Err(ConfigError::MissingContract {
            network,
            contract,
            key,
        }),
    }
}

fn parse_or<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
