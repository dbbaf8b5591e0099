pub mod convert;
pub mod format;

pub use crate::convert::{
    biguint_to_bigdecimal, u256_to_bigdecimal, u256_to_biguint, Amount, DEFAULT_DECIMALS,
};
pub use crate::format::{
    classify, format_boost_multiplier, format_countdown, format_fixed_point, format_multiplier,
    format_price, format_token_amount, format_units, Notation,
};
