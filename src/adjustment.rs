//! Manual position adjustments.
//!
//! Backends occasionally miss fills (exercised options, transfers between
//! accounts, corporate actions). The desk records a signed quantity delta
//! per (strategy, account, ticker) that the consolidator folds into the
//! reported positions. At most one adjustment exists per key; re-entering
//! one overwrites the previous record.

use chrono::{DateTime, Utc};

use crate::{AccountId, Ticker};

/// A manual correction applied on top of backend-reported positions.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManualAdjustment {
    pub strategy: String,
    pub account: AccountId,
    pub ticker: Ticker,
    /// Signed quantity to add to the reported position.
    pub quantity_delta: i64,
    /// Price the delta is booked at. `None` books at the group's blended price.
    pub price_override: Option<f64>,
    /// Operator note explaining the correction.
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ManualAdjustment {
    pub fn new(
        strategy: impl Into<String>,
        account: AccountId,
        ticker: Ticker,
        quantity_delta: i64,
        price_override: Option<f64>,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            strategy: strategy.into(),
            account,
            ticker,
            quantity_delta,
            price_override,
            reason: reason.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage key: `{strategy}_{account}_{ticker}`. One adjustment per key.
    pub fn composite_id(&self) -> String {
        Self::key_for(&self.strategy, self.account, self.ticker)
    }

    /// Build the storage key without an adjustment in hand.
    pub fn key_for(strategy: &str, account: AccountId, ticker: Ticker) -> String {
        format!("{}_{}_{}", strategy, account.0, ticker)
    }

    /// Close the adjustment by zeroing its delta. The record stays on file
    /// with its reason for the audit trail.
    pub fn close(&mut self) {
        self.quantity_delta = 0;
        self.price_override = None;
        self.updated_at = Utc::now();
    }

    /// A closed adjustment no longer moves any position.
    pub fn is_closed(&self) -> bool {
        self.quantity_delta == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_id_shape() {
        let adj = ManualAdjustment::new(
            "alpha",
            AccountId(42),
            Ticker::new("PETR4"),
            50,
            None,
            "exercised call",
        );
        assert_eq!(adj.composite_id(), "alpha_42_PETR4");
        assert_eq!(
            ManualAdjustment::key_for("alpha", AccountId(42), Ticker::new("PETR4")),
            adj.composite_id()
        );
    }

    #[test]
    fn close_zeroes_delta_and_bumps_updated_at() {
        let mut adj = ManualAdjustment::new(
            "alpha",
            AccountId(1),
            Ticker::new("VALE3"),
            -100,
            Some(61.2),
            "transfer out",
        );
        let created = adj.created_at;
        adj.close();
        assert!(adj.is_closed());
        assert_eq!(adj.quantity_delta, 0);
        assert_eq!(adj.price_override, None);
        assert!(adj.updated_at >= created);
    }
}
