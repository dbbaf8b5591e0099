use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;

/// One row of `gauge_history`, unique per `(gauge_address, epoch_start)`.
///
/// Optional metrics serialize as `null` rather than being omitted so readers can rely on
/// every key being present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GaugeSnapshot {
    /// Lowercase `0x` hex address of the gauge
    pub gauge_address: String,
    /// First second of the 7-day epoch the snapshot belongs to
    pub epoch_start: i64,
    /// veMEZO votes on the gauge, 18 decimals
    pub vemezo_weight: BigDecimal,
    /// Voting power of the veBTC position bound to the gauge, if one was found
    pub vebtc_weight: Option<BigDecimal>,
    pub boost_multiplier: Option<f64>,
    pub total_incentives_usd: Option<f64>,
    pub apy: Option<f64>,
    // never populated yet; needs a vote event scan
    pub unique_voters: Option<i32>,
}

impl GaugeSnapshot {
    /// The composite key rows are upserted on
    pub fn key(&self) -> (&str, i64) {
        (&self.gauge_address, self.epoch_start)
    }
}
