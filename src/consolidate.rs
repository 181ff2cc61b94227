//! Position consolidation: merge backend rows with manual adjustments.
//!
//! The backend reports calculated positions per account. The desk keeps
//! manual adjustments for what the backend missed. Consolidation folds the
//! two into one truthful book, per account or across all accounts (the
//! MASTER view). Both views are pure functions of their inputs.

use rustc_hash::FxHashMap;

use crate::{AccountId, CalculatedPosition, ConsolidatedPosition, ManualAdjustment, Ticker};

/// Quantity and cost accumulator for one group.
#[derive(Clone, Copy, Debug, Default)]
struct Lot {
    quantity: i64,
    cost: f64,
    adjusted: bool,
}

impl Lot {
    fn add(&mut self, quantity: i64, price: f64) {
        self.quantity += quantity;
        self.cost += quantity as f64 * price;
    }

    /// Blended per-share price. Positive for shorts too, since cost and
    /// quantity carry the same sign. Zero for a flat lot.
    fn blended_price(&self) -> f64 {
        if self.quantity == 0 {
            0.0
        } else {
            self.cost / self.quantity as f64
        }
    }

    /// Book an adjustment delta at its override price, or at the lot's
    /// current blended price when no override is given. Booking at the
    /// blended price shrinks or grows the lot without moving its average.
    fn apply(&mut self, adj: &ManualAdjustment) {
        let price = adj.price_override.unwrap_or_else(|| self.blended_price());
        self.add(adj.quantity_delta, price);
        self.adjusted = true;
    }

    fn into_position(self, ticker: Ticker) -> ConsolidatedPosition {
        ConsolidatedPosition {
            ticker,
            quantity: self.quantity,
            avg_price: self.blended_price(),
            adjusted: self.adjusted,
        }
    }
}

/// Open adjustments in deterministic application order.
fn ordered(adjustments: &[ManualAdjustment]) -> Vec<&ManualAdjustment> {
    let mut open: Vec<&ManualAdjustment> =
        adjustments.iter().filter(|a| !a.is_closed()).collect();
    open.sort_by_key(|a| (a.account, a.ticker));
    open
}

/// Consolidate positions per (account, ticker).
///
/// Inputs are assumed to belong to one strategy. Groups that net to zero
/// quantity are dropped; each account's positions come back sorted by
/// ticker. An adjustment keyed to an account with no backend rows
/// synthesizes a group on its own.
pub fn consolidate_by_account(
    positions: &[CalculatedPosition],
    adjustments: &[ManualAdjustment],
) -> FxHashMap<AccountId, Vec<ConsolidatedPosition>> {
    let mut lots: FxHashMap<(AccountId, Ticker), Lot> = FxHashMap::default();
    for p in positions {
        lots.entry((p.account, p.ticker))
            .or_default()
            .add(p.quantity, p.avg_price);
    }
    for adj in ordered(adjustments) {
        lots.entry((adj.account, adj.ticker)).or_default().apply(adj);
    }

    let mut out: FxHashMap<AccountId, Vec<ConsolidatedPosition>> = FxHashMap::default();
    for ((account, ticker), lot) in lots {
        if lot.quantity == 0 {
            continue;
        }
        out.entry(account).or_default().push(lot.into_position(ticker));
    }
    for book in out.values_mut() {
        book.sort_by_key(|p| p.ticker);
    }
    out
}

/// Consolidate across all accounts, grouping by ticker only.
///
/// This is the MASTER view: the same inputs as [`consolidate_by_account`]
/// projected down to one row per ticker. Quantities are additive across
/// the two views; blended prices need not be, because an adjustment with
/// no price override books at the blended price of the group it lands in.
pub fn consolidate_master(
    positions: &[CalculatedPosition],
    adjustments: &[ManualAdjustment],
) -> Vec<ConsolidatedPosition> {
    let mut lots: FxHashMap<Ticker, Lot> = FxHashMap::default();
    for p in positions {
        lots.entry(p.ticker).or_default().add(p.quantity, p.avg_price);
    }
    for adj in ordered(adjustments) {
        lots.entry(adj.ticker).or_default().apply(adj);
    }

    let mut out: Vec<ConsolidatedPosition> = lots
        .into_iter()
        .filter(|(_, lot)| lot.quantity != 0)
        .map(|(ticker, lot)| lot.into_position(ticker))
        .collect();
    out.sort_by_key(|p| p.ticker);
    out
}
