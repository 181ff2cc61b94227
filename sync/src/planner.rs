//! Sync planner: computes the orders that move every account toward the
//! strategy's reference portfolio.
//!
//! Two passes feed one instruction list. The reference pass sizes a buy or
//! sell for each (reference row, account) pair whose allocation gap exceeds
//! the tolerance. The orphan pass fully closes any held position the
//! reference no longer mentions. Legs are then grouped by (ticker, action);
//! a ticker needing buys in some accounts and sells in others keeps two
//! separate groups, both flagged, because the middleware cannot net sides
//! within one order.

use rustc_hash::FxHashMap;
use serde::Serialize;

use opsdesk::{
    AccountId, AccountWithAllocation, ConsolidatedPosition, ReferencePosition, Side, Ticker,
    position_pct,
};

/// One account's share of a sync group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncLeg {
    pub account: AccountId,
    pub quantity: i64,
    /// Target minus current allocation, in percentage points.
    pub percentage_gap: f64,
    /// Monetary intent behind `quantity`. `None` marks a full liquidation,
    /// which keeps its share count under any price.
    pub target_value_brl: Option<f64>,
}

/// A (ticker, action) batch of legs, executed as one order or iceberg job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncInstruction {
    pub ticker: Ticker,
    pub action: Side,
    /// Execution price: the reference target price, or for liquidations the
    /// quantity-weighted average of the held prices.
    pub price: f64,
    pub legs: Vec<SyncLeg>,
    /// Set on every group of a ticker that needs both actions.
    pub has_conflict: bool,
}

impl SyncInstruction {
    pub fn total_quantity(&self) -> i64 {
        self.legs.iter().map(|leg| leg.quantity).sum()
    }

    pub fn notional_brl(&self) -> f64 {
        self.total_quantity() as f64 * self.price
    }
}

/// Compute sync instructions for a strategy.
///
/// `tolerance_pct` is strict: a gap exactly at the threshold emits nothing.
pub fn plan(
    reference: &[ReferencePosition],
    accounts: &[AccountWithAllocation],
    positions_by_account: &FxHashMap<AccountId, Vec<ConsolidatedPosition>>,
    tolerance_pct: f64,
) -> Vec<SyncInstruction> {
    let ref_prices: FxHashMap<Ticker, f64> = reference
        .iter()
        .map(|r| (r.ticker, r.target_price))
        .collect();

    // Each raw leg carries the price it was sized at so liquidation groups
    // can blend a group price later.
    let mut raw: Vec<(Ticker, Side, SyncLeg, f64)> = Vec::new();

    // 1. Reference-driven sizing per (row, account)
    for entry in reference {
        for account in accounts {
            if account.capital_allocated <= 0.0 {
                continue;
            }
            let held = positions_by_account
                .get(&account.id)
                .and_then(|book| book.iter().find(|p| p.ticker == entry.ticker));
            let current_pct =
                position_pct(held.map_or(0.0, |p| p.value()), account.capital_allocated);
            let gap = entry.target_pct - current_pct;
            if gap.abs() <= tolerance_pct {
                continue;
            }

            let target_value = gap.abs() / 100.0 * account.capital_allocated;
            let quantity = (target_value / entry.target_price).round() as i64;
            if quantity <= 0 {
                continue;
            }

            let action = if gap > 0.0 { Side::Buy } else { Side::Sell };
            raw.push((
                entry.ticker,
                action,
                SyncLeg {
                    account: account.id,
                    quantity,
                    percentage_gap: gap,
                    target_value_brl: Some(target_value),
                },
                entry.target_price,
            ));
        }
    }

    // 2. Orphan liquidation: held but no longer referenced
    for account in accounts {
        let Some(book) = positions_by_account.get(&account.id) else {
            continue;
        };
        for position in book {
            if position.quantity == 0 {
                continue;
            }
            if ref_prices.contains_key(&position.ticker) {
                continue;
            }
            let action = if position.is_short() {
                Side::Buy
            } else {
                Side::Sell
            };
            let current_pct = position_pct(position.value(), account.capital_allocated);
            raw.push((
                position.ticker,
                action,
                SyncLeg {
                    account: account.id,
                    quantity: position.quantity.abs(),
                    percentage_gap: -current_pct,
                    target_value_brl: None,
                },
                position.avg_price,
            ));
        }
    }

    // 3. Group by (ticker, action), never across actions
    let mut groups: FxHashMap<(Ticker, Side), Vec<(SyncLeg, f64)>> = FxHashMap::default();
    for (ticker, action, leg, price) in raw {
        groups.entry((ticker, action)).or_default().push((leg, price));
    }

    let mut instructions: Vec<SyncInstruction> = groups
        .into_iter()
        .map(|((ticker, action), mut legs)| {
            legs.sort_by_key(|(leg, _)| leg.account);
            let price = match ref_prices.get(&ticker) {
                Some(&target_price) => target_price,
                None => blended_price(&legs),
            };
            SyncInstruction {
                ticker,
                action,
                price,
                legs: legs.into_iter().map(|(leg, _)| leg).collect(),
                has_conflict: false,
            }
        })
        .collect();

    // 4. Conflict flag on every group of a two-sided ticker
    let mut sides_seen: FxHashMap<Ticker, (bool, bool)> = FxHashMap::default();
    for instruction in &instructions {
        let seen = sides_seen.entry(instruction.ticker).or_insert((false, false));
        match instruction.action {
            Side::Buy => seen.0 = true,
            Side::Sell => seen.1 = true,
        }
    }
    for instruction in &mut instructions {
        if let Some(&(buys, sells)) = sides_seen.get(&instruction.ticker) {
            instruction.has_conflict = buys && sells;
        }
    }

    // Conflicted groups surface first so the operator sees them
    instructions.sort_by_key(|g| (!g.has_conflict, g.ticker, g.action));
    instructions
}

fn blended_price(legs: &[(SyncLeg, f64)]) -> f64 {
    let quantity: i64 = legs.iter().map(|(leg, _)| leg.quantity).sum();
    if quantity == 0 {
        return 0.0;
    }
    let cost: f64 = legs
        .iter()
        .map(|(leg, price)| leg.quantity as f64 * price)
        .sum();
    cost / quantity as f64
}

/// Recompute leg quantities for an operator-entered execution price.
///
/// Legs sized from a monetary target keep that target: quantity becomes
/// `round(target_value / new_price)`. Liquidation legs keep their share
/// count; the intent there is "close it", not "spend this much".
pub fn reprice(instruction: &mut SyncInstruction, new_price: f64) {
    instruction.price = new_price;
    for leg in &mut instruction.legs {
        if let Some(target_value) = leg.target_value_brl {
            leg.quantity = (target_value / new_price).round() as i64;
        }
    }
}

/// The looser display-only threshold: a gap within it renders as synced.
pub fn is_synced(gap_pct: f64, indicator_pct: f64) -> bool {
    gap_pct.abs() <= indicator_pct
}
