use std::fmt;

use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use ethers::types::U256;
use num_bigint::{BigInt, BigUint, Sign};

use crate::format::format_fixed_point;

/// Scale used by every escrow and governance token on the network
pub const DEFAULT_DECIMALS: u32 = 18;

/// A non-negative fixed-point token amount read from chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    value: BigUint,
    decimals: u32,
}

impl Amount {
    pub fn new(value: impl Into<BigUint>, decimals: u32) -> Self {
        Self {
            value: value.into(),
            decimals,
        }
    }

    pub fn from_u256(value: U256, decimals: u32) -> Self {
        Self::new(u256_to_biguint(value), decimals)
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Converts to whole token units.
    ///
    /// The integer and fractional parts are separated on the big integer first so a
    /// large integer part does not swallow the fraction during float division.
    pub fn to_f64(&self) -> f64 {
        let divisor = BigUint::from(10u32).pow(self.decimals);
        let integer_part = &self.value / &divisor;
        let fractional_part = &self.value % &divisor;

        let integer = integer_part.to_f64().unwrap_or(f64::INFINITY);
        let fraction = match (fractional_part.to_f64(), divisor.to_f64()) {
            (Some(numerator), Some(denominator)) if denominator.is_finite() => {
                numerator / denominator
            }
            _ => 0.0,
        };

        integer + fraction
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed_point(&self.value, self.decimals))
    }
}

/// Converts an ethers `U256` to a `BigUint`
pub fn u256_to_biguint(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_little_endian(&mut bytes);
    BigUint::from_bytes_le(&bytes)
}

/// Converts an ethers `U256` to a `BigDecimal` for NUMERIC columns
pub fn u256_to_bigdecimal(value: U256) -> BigDecimal {
    biguint_to_bigdecimal(u256_to_biguint(value))
}

/// Converts a `BigUint` to a `BigDecimal` with no fractional digits
pub fn biguint_to_bigdecimal(value: BigUint) -> BigDecimal {
    BigDecimal::from(BigInt::from_biguint(Sign::Plus, value))
}
