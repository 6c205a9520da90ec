//! Bookmaker odds → vig-free probabilities → expected value per outcome.
//!
//! For a market with decimal odds `o_1..o_n`:
//!   implied_i = 1 / o_i                      (0 when o_i is not positive)
//!   p_i       = implied_i / Σ implied        (Σ = 0 is treated as 1)
//!   value_i   = p_i · o_i − 1                (−1 when o_i is not positive)
//!
//! Dividing by the implied sum strips the bookmaker's margin so the
//! probabilities add up to one. `value` is the expected profit per unit
//! staked if those probabilities were true; negative values are expected
//! losses, not errors.

use crate::models::{Bet, OutcomeValue};

/// Max value of a match that cannot be ranked (no odds at all).
pub const UNRANKABLE: f64 = f64::NEG_INFINITY;

/// Value assigned to an outcome quoted at zero / invalid odds.
pub const ZERO_ODD_VALUE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueBreakdown {
    pub max_value: f64,
    pub outcomes: Vec<OutcomeValue>,
}

/// Read a decimal odd. Anything unparsable, non-finite or negative reads as 0.
pub fn parse_odd(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Raw implied probability `1 / odd` (margin still included).
pub fn implied_probability(odd: f64) -> f64 {
    if odd > 0.0 {
        1.0 / odd
    } else {
        0.0
    }
}

/// Expected profit per unit staked at `odd` if `probability` is the truth.
pub fn expected_value(probability: f64, odd: f64) -> f64 {
    if odd > 0.0 {
        probability * odd - 1.0
    } else {
        ZERO_ODD_VALUE
    }
}

/// Per-outcome value for a match-winner bet plus the best value across
/// outcomes. A missing bet or an empty quote list is unrankable.
pub fn compute_outcome_values(bet: Option<&Bet>) -> ValueBreakdown {
    let quotes = match bet {
        Some(b) if !b.values.is_empty() => &b.values,
        _ => {
            return ValueBreakdown {
                max_value: UNRANKABLE,
                outcomes: Vec::new(),
            }
        }
    };

    let odds: Vec<f64> = quotes.iter().map(|q| parse_odd(&q.odd)).collect();
    let implied: Vec<f64> = odds.iter().map(|&o| implied_probability(o)).collect();
    let sum: f64 = implied.iter().sum();
    let divisor = if sum > 0.0 { sum } else { 1.0 };

    let outcomes: Vec<OutcomeValue> = quotes
        .iter()
        .zip(odds.iter().zip(implied.iter()))
        .map(|(quote, (&odd, &imp))| {
            let probability = imp / divisor;
            OutcomeValue {
                label: quote.value.clone(),
                odd,
                probability,
                value: expected_value(probability, odd),
            }
        })
        .collect();

    let max_value = outcomes
        .iter()
        .map(|o| o.value)
        .fold(UNRANKABLE, f64::max);

    ValueBreakdown { max_value, outcomes }
}
