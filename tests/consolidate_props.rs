//! Property-based tests for position consolidation invariants.
//!
//! These tests use proptest to verify that the per-account and MASTER
//! views stay consistent across randomly generated books and adjustments.

use opsdesk::{
    AccountId, CalculatedPosition, ManualAdjustment, Ticker, consolidate_by_account,
    consolidate_master,
};
use proptest::prelude::*;

/// Generate a ticker from a small pool so groups collide often
fn ticker_strategy() -> impl Strategy<Value = Ticker> {
    prop_oneof![
        Just(Ticker::new("PETR4")),
        Just(Ticker::new("VALE3")),
        Just(Ticker::new("ITUB4")),
        Just(Ticker::new("BOVA11")),
        Just(Ticker::new("WEGE3")),
    ]
}

/// Generate an account id from a small pool
fn account_strategy() -> impl Strategy<Value = AccountId> {
    (1u64..=5u64).prop_map(AccountId)
}

/// Generate a price with two decimal places
fn price_strategy() -> impl Strategy<Value = f64> {
    (1i64..=50_000i64).prop_map(|cents| cents as f64 / 100.0)
}

fn row_strategy() -> impl Strategy<Value = CalculatedPosition> {
    (account_strategy(), ticker_strategy(), -500i64..=500i64, price_strategy())
        .prop_map(|(account, ticker, qty, price)| {
            CalculatedPosition::new(account, ticker, qty, price)
        })
}

fn adjustment_strategy() -> impl Strategy<Value = ManualAdjustment> {
    (
        account_strategy(),
        ticker_strategy(),
        -200i64..=200i64,
        prop::option::of(price_strategy()),
    )
        .prop_map(|(account, ticker, delta, price)| {
            ManualAdjustment::new("alpha", account, ticker, delta, price, "prop")
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // VIEW CONSISTENCY
    // ========================================================================

    /// MASTER quantity per ticker equals the sum over account views
    #[test]
    fn master_quantity_is_additive(
        rows in prop::collection::vec(row_strategy(), 0..40),
        adjs in prop::collection::vec(adjustment_strategy(), 0..8),
    ) {
        let by_account = consolidate_by_account(&rows, &adjs);
        let master = consolidate_master(&rows, &adjs);

        for ticker in ["PETR4", "VALE3", "ITUB4", "BOVA11", "WEGE3"].map(Ticker::new) {
            let account_sum: i64 = by_account
                .values()
                .flatten()
                .filter(|p| p.ticker == ticker)
                .map(|p| p.quantity)
                .sum();
            let master_qty = master
                .iter()
                .find(|p| p.ticker == ticker)
                .map(|p| p.quantity)
                .unwrap_or(0);
            prop_assert_eq!(
                account_sum, master_qty,
                "quantity not additive for {}: accounts={} master={}",
                ticker, account_sum, master_qty
            );
        }
    }

    /// Both views drop groups that net to zero quantity
    #[test]
    fn no_zero_quantity_groups(
        rows in prop::collection::vec(row_strategy(), 0..40),
        adjs in prop::collection::vec(adjustment_strategy(), 0..8),
    ) {
        let by_account = consolidate_by_account(&rows, &adjs);
        for pos in by_account.values().flatten() {
            prop_assert!(pos.quantity != 0, "account view emitted flat group {}", pos.ticker);
        }
        for pos in consolidate_master(&rows, &adjs) {
            prop_assert!(pos.quantity != 0, "master view emitted flat group {}", pos.ticker);
        }
    }

    /// MASTER value matches the input cost when every adjustment carries
    /// an explicit price (total_cost = sum of qty * price contributions)
    #[test]
    fn master_value_matches_input_cost(
        rows in prop::collection::vec(row_strategy(), 0..40),
        adjs in prop::collection::vec(
            (account_strategy(), ticker_strategy(), -200i64..=200i64, price_strategy())
                .prop_map(|(account, ticker, delta, price)| {
                    ManualAdjustment::new("alpha", account, ticker, delta, Some(price), "prop")
                }),
            0..8,
        ),
    ) {
        let master = consolidate_master(&rows, &adjs);
        for pos in &master {
            let expected: f64 = rows
                .iter()
                .filter(|r| r.ticker == pos.ticker)
                .map(|r| r.quantity as f64 * r.avg_price)
                .sum::<f64>()
                + adjs
                    .iter()
                    .filter(|a| a.ticker == pos.ticker)
                    .map(|a| a.quantity_delta as f64 * a.price_override.unwrap_or(0.0))
                    .sum::<f64>();
            prop_assert!(
                (pos.value() - expected).abs() < 1e-6 * (1.0 + expected.abs()),
                "cost drifted for {}: value={} expected={}",
                pos.ticker, pos.value(), expected
            );
        }
    }

    // ========================================================================
    // ADJUSTMENT SEMANTICS
    // ========================================================================

    /// A zero-delta adjustment changes nothing
    #[test]
    fn noop_adjustment_leaves_views_unchanged(
        rows in prop::collection::vec(row_strategy(), 0..30),
        account in account_strategy(),
        ticker in ticker_strategy(),
        price in prop::option::of(price_strategy()),
    ) {
        let noop = ManualAdjustment::new("alpha", account, ticker, 0, price, "noop");

        let plain = consolidate_by_account(&rows, &[]);
        let with_noop = consolidate_by_account(&rows, &[noop.clone()]);
        prop_assert_eq!(plain, with_noop, "no-op adjustment changed the account view");

        let plain_master = consolidate_master(&rows, &[]);
        let with_noop_master = consolidate_master(&rows, &[noop]);
        prop_assert_eq!(plain_master, with_noop_master, "no-op adjustment changed MASTER");
    }

    /// Booking a delta without a price override never moves the blended
    /// price of a group that had inventory before and after
    #[test]
    fn delta_at_blended_price_preserves_average(
        qty in 1i64..=500i64,
        price in price_strategy(),
        delta in -200i64..=200i64,
    ) {
        prop_assume!(qty + delta != 0);
        let rows = [CalculatedPosition::new(AccountId(1), Ticker::new("PETR4"), qty, price)];
        let adj = ManualAdjustment::new(
            "alpha", AccountId(1), Ticker::new("PETR4"), delta, None, "prop",
        );
        let book = consolidate_by_account(&rows, &[adj]);
        let pos = &book[&AccountId(1)][0];
        prop_assert_eq!(pos.quantity, qty + delta);
        prop_assert!(
            (pos.avg_price - price).abs() < 1e-9 * (1.0 + price),
            "average moved: {} -> {}",
            price, pos.avg_price
        );
    }

    /// The adjusted flag marks exactly the groups an open adjustment touched
    #[test]
    fn adjusted_flag_tracks_touched_groups(
        rows in prop::collection::vec(row_strategy(), 1..30),
        adjs in prop::collection::vec(adjustment_strategy(), 0..6),
    ) {
        let by_account = consolidate_by_account(&rows, &adjs);
        for (account, book) in &by_account {
            for pos in book {
                let touched = adjs.iter().any(|a| {
                    a.account == *account && a.ticker == pos.ticker && !a.is_closed()
                });
                prop_assert_eq!(
                    pos.adjusted, touched,
                    "flag mismatch for {} {}",
                    account, pos.ticker
                );
            }
        }
    }

    // ========================================================================
    // DETERMINISM AND ORDERING
    // ========================================================================

    /// Same inputs produce identical output regardless of run
    #[test]
    fn consolidation_is_deterministic(
        rows in prop::collection::vec(row_strategy(), 0..40),
        adjs in prop::collection::vec(adjustment_strategy(), 0..8),
    ) {
        let first = consolidate_by_account(&rows, &adjs);
        let second = consolidate_by_account(&rows, &adjs);
        prop_assert_eq!(first, second, "account view not deterministic");

        let master_first = consolidate_master(&rows, &adjs);
        let master_second = consolidate_master(&rows, &adjs);
        prop_assert_eq!(master_first, master_second, "master view not deterministic");
    }

    /// Every emitted book is sorted by ticker
    #[test]
    fn books_sorted_by_ticker(
        rows in prop::collection::vec(row_strategy(), 0..40),
        adjs in prop::collection::vec(adjustment_strategy(), 0..8),
    ) {
        let by_account = consolidate_by_account(&rows, &adjs);
        for book in by_account.values() {
            for window in book.windows(2) {
                prop_assert!(
                    window[0].ticker < window[1].ticker,
                    "account book out of order: {} >= {}",
                    window[0].ticker, window[1].ticker
                );
            }
        }
        let master = consolidate_master(&rows, &adjs);
        for window in master.windows(2) {
            prop_assert!(
                window[0].ticker < window[1].ticker,
                "master out of order: {} >= {}",
                window[0].ticker, window[1].ticker
            );
        }
    }
}

// ============================================================================
// REGRESSION TESTS (from proptest failures)
// ============================================================================

#[test]
fn regression_empty_inputs() {
    let by_account = consolidate_by_account(&[], &[]);
    assert!(by_account.is_empty());
    assert!(consolidate_master(&[], &[]).is_empty());
}

#[test]
fn regression_adjustment_on_flat_group_books_at_zero() {
    // A delta with no override lands on an empty group: blended price is 0.
    let adj = ManualAdjustment::new(
        "alpha",
        AccountId(1),
        Ticker::new("PETR4"),
        50,
        None,
        "no backend rows yet",
    );
    let book = consolidate_by_account(&[], &[adj]);
    let pos = &book[&AccountId(1)][0];
    assert_eq!(pos.quantity, 50);
    assert_eq!(pos.avg_price, 0.0);
    assert!(pos.adjusted);
}
