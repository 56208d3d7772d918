//! Tiered cost computation.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::RateTier;

/// Tiered pricing failures.
#[derive(Debug, Error, PartialEq)]
pub enum TierError {
    #[error("no pricing tiers to evaluate")]
    Empty,

    /// Usage ran past the final bounded tier; without an unbounded tier
    /// this is a critical error upstream.
    #[error("usage {usage} exceeds the final tier bound {bound}")]
    ExceedsFinalTier { usage: Decimal, bound: Decimal },
}

/// Consume usage against tiers in ascending order.
///
/// Each tier absorbs up to `max - min`; overflow passes to the next tier;
/// a final unbounded tier absorbs the remainder. Returns the total cost and
/// the minimum confidence over the tiers actually touched.
pub fn tiered_cost(usage: Decimal, tiers: &[RateTier]) -> Result<(Decimal, f64), TierError> {
    if tiers.is_empty() {
        return Err(TierError::Empty);
    }

    let mut total = Decimal::ZERO;
    let mut remaining = usage;
    let mut min_confidence = 1.0f64;
    let mut last_bound = Decimal::ZERO;

    for tier in tiers {
        if remaining <= Decimal::ZERO {
            break;
        }

        let consumed = match tier.max {
            Some(max) => {
                last_bound = max;
                let span = max - tier.min;
                remaining.min(span)
            }
            None => remaining,
        };

        total += consumed * tier.price;
        remaining -= consumed;

        if tier.confidence < min_confidence {
            min_confidence = tier.confidence;
        }
    }

    if remaining > Decimal::ZERO {
        return Err(TierError::ExceedsFinalTier {
            usage,
            bound: last_bound,
        });
    }

    Ok((total, min_confidence))
}
