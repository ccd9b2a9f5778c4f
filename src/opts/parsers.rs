use std::str::FromStr;

use crate::prelude::*;

pub fn non_zero_u32(value: &str) -> Result<u32> {
    match FromStr::from_str(value)? {
        value if value >= 1 => Ok(value),
        _ => Err(anyhow!("expected a positive number")),
    }
}

/// Parses a number strictly inside `(0, 1)`.
pub fn fraction(value: &str) -> Result<f64> {
    match f64::from_str(value)? {
        value if value > 0.0 && value < 1.0 => Ok(value),
        value => Err(anyhow!("{} is not within (0, 1)", value)),
    }
}

/// Parses a number within `[0, 1]`.
pub fn probability(value: &str) -> Result<f64> {
    match f64::from_str(value)? {
        value if (0.0..=1.0).contains(&value) => Ok(value),
        value => Err(anyhow!("{} is not within [0, 1]", value)),
    }
}
