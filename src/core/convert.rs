//! Deterministic currency conversion over an anchor-relative rate table.

use crate::core::provider::{RateTable, normalize_code};
use thiserror::Error;

/// Outcome of a single conversion. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub converted_amount: f64,
    /// Units of target currency equal to one unit of source currency.
    pub pair_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),
    #[error("no amount to convert")]
    MissingAmount,
}

/// Converts `amount` from `source` to `target` by routing through the anchor
/// currency the table is expressed in.
///
/// A code absent from the table is an error; defaulting the rate to 1 would
/// silently produce wrong numbers. Self-conversion short-circuits so the
/// result is the input amount exactly, with no division round trip.
pub fn convert(
    amount: Option<f64>,
    source: &str,
    target: &str,
    rates: &RateTable,
) -> Result<Conversion, ConvertError> {
    let amount = amount.ok_or(ConvertError::MissingAmount)?;
    let source = normalize_code(source);
    let target = normalize_code(target);

    let source_rate = *rates
        .get(&source)
        .ok_or_else(|| ConvertError::UnknownCurrency(source.clone()))?;

    if source == target {
        return Ok(Conversion {
            converted_amount: amount,
            pair_rate: 1.0,
        });
    }

    let target_rate = *rates
        .get(&target)
        .ok_or_else(|| ConvertError::UnknownCurrency(target.clone()))?;

    let anchor_amount = amount / source_rate;
    Ok(Conversion {
        converted_amount: anchor_amount * target_rate,
        pair_rate: target_rate / source_rate,
    })
}
