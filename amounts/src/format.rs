use bigdecimal::{ToPrimitive, Zero};
use num_bigint::BigUint;

/// Shown when a non-zero amount underflows to zero on the float path
pub const BELOW_DISPLAY_PRECISION: &str = "<0.0001";

/// Shown when a price is not available
pub const MISSING_PRICE: &str = "—";

/// Display precision selected for an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    Zero,
    Grouped { max_fraction_digits: u32 },
    Exponential,
}

fn pow10(exponent: u32) -> BigUint {
    BigUint::from(10u32).pow(exponent)
}

/// Picks the display tier for `value / 10^decimals` using integer arithmetic only
pub fn classify(value: &BigUint, decimals: u32) -> Notation {
    if value.is_zero() {
        return Notation::Zero;
    }

    let divisor = pow10(decimals);
    let integer_part = value / &divisor;

    let max_fraction_digits = if integer_part >= BigUint::from(1_000_000u32) {
        0
    } else if integer_part >= BigUint::from(1_000u32) {
        2
    } else if !integer_part.is_zero() {
        4
    } else if value * pow10(4) >= divisor {
        6
    } else if value * pow10(8) >= divisor {
        8
    } else {
        return Notation::Exponential;
    };

    Notation::Grouped {
        max_fraction_digits,
    }
}

/// Formats a fixed-point integer for display, choosing precision by magnitude.
///
/// Millions and above drop the fraction entirely (truncated, never rounded into the
/// integer part). Smaller values keep progressively more fractional digits, and values
/// below `0.00000001` switch to exponential notation.
pub fn format_fixed_point(value: &BigUint, decimals: u32) -> String {
    match classify(value, decimals) {
        Notation::Zero => "0".to_string(),
        Notation::Grouped {
            max_fraction_digits: 0,
        } => group_thousands(&(value / pow10(decimals)).to_string()),
        Notation::Grouped {
            max_fraction_digits,
        } => {
            let (integer, fraction) = round_to_digits(value, decimals, max_fraction_digits);
            join_parts(&integer, fraction.trim_end_matches('0'))
        }
        Notation::Exponential => format_exponential(value, decimals),
    }
}

/// Same tiers as [`format_fixed_point`] but computed on a float conversion.
///
/// A non-zero amount that underflows to `0.0` renders as [`BELOW_DISPLAY_PRECISION`].
pub fn format_token_amount(value: &BigUint, decimals: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let numerator = value.to_f64().unwrap_or(f64::INFINITY);
    let denominator = pow10(decimals).to_f64().unwrap_or(f64::INFINITY);
    let units = numerator / denominator;

    if units == 0.0 {
        return BELOW_DISPLAY_PRECISION.to_string();
    }
    if !units.is_finite() {
        return format_fixed_point(value, decimals);
    }

    format_units(units)
}

/// Formats an amount already expressed in whole token units
pub fn format_units(units: f64) -> String {
    if units == 0.0 || !units.is_finite() {
        return if units.is_infinite() {
            "∞".to_string()
        } else {
            "0".to_string()
        };
    }

    let magnitude = units.abs();
    let max_fraction_digits = if magnitude >= 1_000_000.0 {
        0
    } else if magnitude >= 1_000.0 {
        2
    } else if magnitude >= 1.0 {
        4
    } else if magnitude >= 0.0001 {
        6
    } else if magnitude >= 0.000_000_01 {
        8
    } else {
        return format!("{:.4e}", units);
    };

    format_float(units, 0, max_fraction_digits)
}

/// Renders a boost multiplier stored with 18 decimals, e.g. `"2.50x"`
pub fn format_boost_multiplier(boost: Option<&BigUint>) -> String {
    let Some(boost) = boost else {
        return "1.00x".to_string();
    };

    let (integer, fraction) = round_to_digits(boost, 18, 2);
    format!("{}.{}x", integer, fraction)
}

/// Renders a multiplier already in float form, e.g. `"1.25x"`
pub fn format_multiplier(multiplier: f64) -> String {
    format!("{:.2}x", multiplier)
}

/// Renders a USD price for the dashboard ticker
pub fn format_price(price: Option<f64>) -> String {
    let Some(price) = price else {
        return MISSING_PRICE.to_string();
    };

    if price >= 1_000.0 {
        format_float(price, 2, 2)
    } else {
        format_float(price, 2, 4)
    }
}

/// Renders a duration in seconds as `"2d 5h 30m"`
pub fn format_countdown(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Rounds `value / 10^decimals` half-up to `digits` fractional digits and returns the
/// integer part and the zero-padded fractional part
fn round_to_digits(value: &BigUint, decimals: u32, digits: u32) -> (BigUint, String) {
    let scaled = if digits >= decimals {
        value * pow10(digits - decimals)
    } else {
        let step = pow10(decimals - digits);
        let half = &step / 2u32;
        (value + half) / step
    };

    let unit = pow10(digits);
    let integer = &scaled / &unit;
    let fraction = (&scaled % &unit).to_string();
    let fraction = format!("{:0>width$}", fraction, width = digits as usize);

    (integer, fraction)
}

fn join_parts(integer: &BigUint, fraction: &str) -> String {
    let grouped = group_thousands(&integer.to_string());
    if fraction.is_empty() {
        grouped
    } else {
        format!("{}.{}", grouped, fraction)
    }
}

/// Four significant digits after the point, matching `1.2346e-9`
fn format_exponential(value: &BigUint, decimals: u32) -> String {
    let digits = value.to_string();
    let length = digits.len() as i64;
    let mut exponent = length - 1 - i64::from(decimals);

    let mut mantissa = if length > 5 {
        let step = pow10((length - 5) as u32);
        let half = &step / 2u32;
        (value + half) / step
    } else {
        value * pow10((5 - length) as u32)
    };

    if mantissa >= BigUint::from(100_000u32) {
        mantissa /= 10u32;
        exponent += 1;
    }

    let mantissa = mantissa.to_string();
    let (lead, rest) = mantissa.split_at(1);
    let sign = if exponent < 0 { "-" } else { "+" };

    format!("{}.{}e{}{}", lead, rest, sign, exponent.abs())
}

fn format_float(value: f64, min_fraction_digits: usize, max_fraction_digits: usize) -> String {
    let rendered = format!("{:.*}", max_fraction_digits, value.abs());
    let (integer, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));

    let mut fraction = fraction.trim_end_matches('0').to_string();
    while fraction.len() < min_fraction_digits {
        fraction.push('0');
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    let grouped = group_thousands(integer);

    if fraction.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, fraction)
    }
}

/// Inserts `,` every three digits from the right
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
