//! Position records: backend rows and consolidated output.

use crate::{AccountId, Ticker};

/// A position row as reported by the trading backend for one account.
///
/// `quantity` is signed: negative means short. `avg_price` is the blended
/// entry price in BRL per share.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalculatedPosition {
    pub account: AccountId,
    pub ticker: Ticker,
    pub quantity: i64,
    pub avg_price: f64,
}

impl CalculatedPosition {
    pub fn new(account: AccountId, ticker: Ticker, quantity: i64, avg_price: f64) -> Self {
        Self { account, ticker, quantity, avg_price }
    }

    /// Position value at the blended entry price, in BRL. Negative for shorts.
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.avg_price
    }
}

/// A position after merging backend rows with manual adjustments.
///
/// One record per (account, ticker) in the per-account view, or per ticker
/// in the MASTER view. Zero-quantity groups are never emitted.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsolidatedPosition {
    pub ticker: Ticker,
    pub quantity: i64,
    pub avg_price: f64,
    /// True when a manual adjustment contributed to this group.
    pub adjusted: bool,
}

impl ConsolidatedPosition {
    /// Value at the blended price, in BRL. Negative for shorts.
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.avg_price
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn petr4() -> Ticker {
        Ticker::new("PETR4")
    }

    #[test]
    fn value_uses_blended_price() {
        let p = CalculatedPosition::new(AccountId(1), petr4(), 150, 10.67);
        assert!((p.value() - 1_600.5).abs() < 1e-9);
    }

    #[test]
    fn short_value_is_negative() {
        let p = ConsolidatedPosition {
            ticker: petr4(),
            quantity: -200,
            avg_price: 30.0,
            adjusted: false,
        };
        assert!(p.is_short());
        assert_eq!(p.value(), -6_000.0);
    }
}
