use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Spreadsheet `ROUND`: ties go to the larger-magnitude neighbour.
///
/// The value is lifted into a decimal from its shortest round-trip text form,
/// so `1.005` rounds as the literal the user typed rather than as the binary
/// approximation just below it. `None` counts as zero. Non-finite input and
/// magnitudes beyond the decimal range are returned unchanged.
pub fn round_half_away_from_zero(value: impl Into<Option<f64>>, digits: u32) -> f64 {
    let value = value.into().unwrap_or(0.0);
    if !value.is_finite() {
        return value;
    }

    let Some(decimal) = Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
    else {
        return value;
    };

    let rounded = decimal.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return 0.0;
    }
    rounded
        .to_string()
        .parse::<f64>()
        .ok()
        .or_else(|| rounded.to_f64())
        .unwrap_or(value)
}

pub(crate) fn round0(value: f64) -> f64 {
    round_half_away_from_zero(value, 0)
}

// Text may carry thousands separators and surrounding whitespace.
pub fn numeric_or_default(value: &Value, default: f64) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => n,
        _ => {
            if !value.is_null() {
                tracing::trace!(cell = %value, default, "non-numeric cell replaced by default");
            }
            default
        }
    }
}

pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(numeric_or_default(&value, 0.0))
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// A null table reads as empty and a null row as an all-zero row.
pub(crate) fn lenient_rows<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let rows = Option::<Vec<Option<T>>>::deserialize(deserializer)?;
    Ok(rows
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    })
}
