use ethers::types::{Address, H160};

/// MEZO token, `0x7B7c000000000000000000000000000000000001`
pub const MEZO_TOKEN: Address = H160([
    0x7b, 0x7c, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
]);

pub const MEZO_PRICE_USD: f64 = 0.22;

/// Placeholder applied to every non-MEZO reward token until an oracle is wired in
pub const FALLBACK_TOKEN_PRICE_USD: f64 = 100_000.0;

/// USD reference prices for valuing bribes
pub trait PriceFeed: Send + Sync {
    /// Price of the governance token veMEZO locks
    fn governance_token_price(&self) -> f64;

    fn token_price(&self, token: Address) -> f64;
}

/// Constant prices: one for the governance token, one flat price for everything else
#[derive(Debug, Clone, PartialEq)]
pub struct FixedPrices {
    governance_token: Address,
    governance_price: f64,
    fallback_price: f64,
}

impl FixedPrices {
    pub fn new(governance_token: Address) -> Self {
        Self {
            governance_token,
            governance_price: MEZO_PRICE_USD,
            fallback_price: FALLBACK_TOKEN_PRICE_USD,
        }
    }

    pub fn with_governance_price(mut self, price: f64) -> Self {
        self.governance_price = price;
        self
    }

    pub fn with_fallback_price(mut self, price: f64) -> Self {
        self.fallback_price = price;
        self
    }
}

impl Default for FixedPrices {
    fn default() -> Self {
        Self::new(MEZO_TOKEN)
    }
}

impl PriceFeed for FixedPrices {
    fn governance_token_price(&self) -> f64 {
        self.governance_price
    }

    fn token_price(&self, token: Address) -> f64 {
        if token == self.governance_token {
            self.governance_price
        } else {
            self.fallback_price
        }
    }
}
