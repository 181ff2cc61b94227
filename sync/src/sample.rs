//! Canned dataset served when the store cannot be read.
//!
//! Rows are stamped with the caller's strategy so the usual filters still
//! match. Quantities and prices are plausible B3 numbers, nothing more.

use opsdesk::{AccountId, ManualAdjustment, ReferencePosition, Ticker};

pub fn sample_reference(strategy: &str) -> Vec<ReferencePosition> {
    let row = |ticker: &str, price: f64, qty: i64, pct: f64| ReferencePosition {
        strategy: strategy.to_string(),
        ticker: Ticker::new(ticker),
        target_price: price,
        target_quantity: qty,
        target_pct: pct,
    };
    vec![
        row("BOVA11", 129.50, 230, 30.0),
        row("FIXA11", 102.00, 195, 20.0),
        row("ITUB4", 34.15, 350, 12.0),
        row("PETR4", 38.42, 520, 20.0),
        row("VALE3", 61.80, 290, 18.0),
    ]
}

pub fn sample_adjustments(strategy: &str) -> Vec<ManualAdjustment> {
    vec![
        ManualAdjustment::new(
            strategy,
            AccountId(1),
            Ticker::new("PETR4"),
            100,
            Some(37.90),
            "exercised call",
        ),
        ManualAdjustment::new(
            strategy,
            AccountId(2),
            Ticker::new("VALE3"),
            -50,
            None,
            "custody transfer out",
        ),
    ]
}
