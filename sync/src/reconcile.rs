//! Post-run reconciliation: how far each account still sits from the
//! reference portfolio.

use rustc_hash::FxHashMap;
use serde::Serialize;

use opsdesk::{
    AccountId, AccountWithAllocation, ConsolidatedPosition, ReferencePosition, Ticker,
    position_pct,
};

use crate::planner::is_synced;

/// Reconciliation report over all accounts of a strategy.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub entries: Vec<ReconcileEntry>,
    /// Accounts whose every row sits within the indicator.
    pub synced_accounts: usize,
    pub total_accounts: usize,
    /// Signed gap of the worst row, 0 when there are no rows.
    pub worst_gap_pct: f64,
    pub indicator_pct: f64,
}

/// One (account, ticker) comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileEntry {
    pub account: AccountId,
    pub ticker: Ticker,
    pub target_pct: f64,
    pub actual_pct: f64,
    pub gap_pct: f64,
    pub synced: bool,
}

/// Compare each account's book against the reference portfolio.
///
/// Reference rows the account does not hold show an actual of zero; held
/// tickers outside the reference show a target of zero. `indicator_pct`
/// is the display threshold, not the planning tolerance.
pub fn reconcile(
    reference: &[ReferencePosition],
    accounts: &[AccountWithAllocation],
    positions_by_account: &FxHashMap<AccountId, Vec<ConsolidatedPosition>>,
    indicator_pct: f64,
) -> ReconcileReport {
    let referenced: FxHashMap<Ticker, f64> = reference
        .iter()
        .map(|r| (r.ticker, r.target_pct))
        .collect();
    let empty: Vec<ConsolidatedPosition> = Vec::new();

    let mut entries = Vec::new();
    let mut synced_accounts = 0;
    let mut worst_gap = 0.0_f64;

    for account in accounts {
        let book = positions_by_account.get(&account.id).unwrap_or(&empty);
        let mut account_synced = true;

        for target in reference {
            let held = book.iter().find(|p| p.ticker == target.ticker);
            let actual_pct =
                position_pct(held.map_or(0.0, |p| p.value()), account.capital_allocated);
            let gap = target.target_pct - actual_pct;
            let synced = is_synced(gap, indicator_pct);
            account_synced &= synced;
            if gap.abs() > worst_gap.abs() {
                worst_gap = gap;
            }
            entries.push(ReconcileEntry {
                account: account.id,
                ticker: target.ticker,
                target_pct: target.target_pct,
                actual_pct,
                gap_pct: gap,
                synced,
            });
        }

        for position in book {
            if position.quantity == 0 || referenced.contains_key(&position.ticker) {
                continue;
            }
            let actual_pct = position_pct(position.value(), account.capital_allocated);
            let gap = -actual_pct;
            let synced = is_synced(gap, indicator_pct);
            account_synced &= synced;
            if gap.abs() > worst_gap.abs() {
                worst_gap = gap;
            }
            entries.push(ReconcileEntry {
                account: account.id,
                ticker: position.ticker,
                target_pct: 0.0,
                actual_pct,
                gap_pct: gap,
                synced,
            });
        }

        if account_synced {
            synced_accounts += 1;
        }
    }

    entries.sort_by_key(|e| (e.account, e.ticker));

    ReconcileReport {
        entries,
        synced_accounts,
        total_accounts: accounts.len(),
        worst_gap_pct: worst_gap,
        indicator_pct,
    }
}

impl std::fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "RECONCILIATION:")?;
        writeln!(
            f,
            "  {:8} {:8} {:>9} {:>9} {:>9}  {}",
            "Account", "Ticker", "Target%", "Actual%", "Gap%", "Synced"
        )?;
        for e in &self.entries {
            writeln!(
                f,
                "  {:8} {:8} {:>9.2} {:>9.2} {:>+9.2}  {}",
                format!("{}", e.account),
                e.ticker,
                e.target_pct,
                e.actual_pct,
                e.gap_pct,
                if e.synced { "yes" } else { "NO" },
            )?;
        }
        writeln!(
            f,
            "\n  {}/{} accounts within {:.1}% of target; worst gap {:+.2}%",
            self.synced_accounts, self.total_accounts, self.indicator_pct, self.worst_gap_pct,
        )?;
        Ok(())
    }
}
