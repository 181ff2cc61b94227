//! Reference portfolio: the target book each account should converge to.

use crate::Ticker;

/// One row of a strategy's reference portfolio.
///
/// `target_pct` is the desired allocation as a percentage of the account's
/// capital (`20.0` means 20%). Negative percentages describe short targets.
/// `target_quantity` is the desk's sizing note for a nominal account and is
/// not used by the planner, which sizes from `target_pct` and capital.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferencePosition {
    pub strategy: String,
    pub ticker: Ticker,
    /// Limit price used when syncing toward this row, BRL per share.
    pub target_price: f64,
    pub target_quantity: i64,
    pub target_pct: f64,
}

/// Reference portfolio validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("duplicate ticker {0} in reference portfolio")]
    DuplicateTicker(Ticker),
    #[error("non-positive target price {price} for {ticker}")]
    BadPrice { ticker: Ticker, price: f64 },
    #[error("target {pct}% for {ticker} outside [-100, 100]")]
    BadPct { ticker: Ticker, pct: f64 },
    #[error("long targets sum to {0:.2}%, exceeding 100%")]
    LongsExceedCapital(f64),
    #[error("short targets sum to {0:.2}%, exceeding 100%")]
    ShortsExceedCapital(f64),
}

/// Validate a reference portfolio before planning against it.
///
/// An empty portfolio is valid; it means every held position is an orphan
/// to unwind. Long and short legs are each capped at 100% of capital.
pub fn validate_reference(entries: &[ReferencePosition]) -> Result<(), ReferenceError> {
    let mut seen: Vec<Ticker> = Vec::with_capacity(entries.len());
    let mut long_sum = 0.0;
    let mut short_sum = 0.0;

    for entry in entries {
        if seen.contains(&entry.ticker) {
            return Err(ReferenceError::DuplicateTicker(entry.ticker));
        }
        seen.push(entry.ticker);

        if !entry.target_price.is_finite() || entry.target_price <= 0.0 {
            return Err(ReferenceError::BadPrice {
                ticker: entry.ticker,
                price: entry.target_price,
            });
        }
        if !entry.target_pct.is_finite() || entry.target_pct.abs() > 100.0 {
            return Err(ReferenceError::BadPct {
                ticker: entry.ticker,
                pct: entry.target_pct,
            });
        }
        if entry.target_pct >= 0.0 {
            long_sum += entry.target_pct;
        } else {
            short_sum += -entry.target_pct;
        }
    }

    if long_sum > 100.0 + 1e-6 {
        return Err(ReferenceError::LongsExceedCapital(long_sum));
    }
    if short_sum > 100.0 + 1e-6 {
        return Err(ReferenceError::ShortsExceedCapital(short_sum));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ticker: &str, pct: f64) -> ReferencePosition {
        ReferencePosition {
            strategy: "alpha".into(),
            ticker: Ticker::new(ticker),
            target_price: 25.0,
            target_quantity: 100,
            target_pct: pct,
        }
    }

    #[test]
    fn empty_reference_is_valid() {
        assert!(validate_reference(&[]).is_ok());
    }

    #[test]
    fn accepts_long_short_mix() {
        let entries = [row("PETR4", 40.0), row("VALE3", 30.0), row("BOVA11", -20.0)];
        assert!(validate_reference(&entries).is_ok());
    }

    #[test]
    fn rejects_duplicate_ticker() {
        let entries = [row("PETR4", 10.0), row("PETR4", 20.0)];
        assert!(matches!(
            validate_reference(&entries),
            Err(ReferenceError::DuplicateTicker(_))
        ));
    }

    #[test]
    fn rejects_non_positive_price() {
        let mut bad = row("ITUB4", 10.0);
        bad.target_price = 0.0;
        assert!(matches!(
            validate_reference(&[bad]),
            Err(ReferenceError::BadPrice { .. })
        ));
    }

    #[test]
    fn rejects_overallocated_longs() {
        let entries = [row("PETR4", 60.0), row("VALE3", 50.0)];
        assert!(matches!(
            validate_reference(&entries),
            Err(ReferenceError::LongsExceedCapital(_))
        ));
    }

    #[test]
    fn exactly_100_pct_is_fine() {
        let entries = [row("PETR4", 60.0), row("VALE3", 40.0)];
        assert!(validate_reference(&entries).is_ok());
    }
}
