//! Pre-submission checks.
//!
//! Validates a computed sync plan before anything reaches the middleware.

use rustc_hash::FxHashMap;
use serde::Serialize;

use opsdesk::{AccountId, AccountWithAllocation, Side, Ticker};

use crate::planner::SyncInstruction;

/// Result of running all pre-submission checks.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub checks: Vec<Check>,
}

/// A single check result.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

/// Whether a check passed, warned, or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Warn => write!(f, "WARN"),
            CheckStatus::Fail => write!(f, "FAIL"),
        }
    }
}

impl CheckReport {
    /// True if any check failed (not just warned).
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    /// True if any check warned.
    pub fn has_warnings(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Warn)
    }
}

impl std::fmt::Display for CheckReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PRE-SUBMISSION CHECKS:")?;
        for check in &self.checks {
            writeln!(f, "  [{}] {}: {}", check.status, check.name, check.detail)?;
        }
        Ok(())
    }
}

/// Run all pre-submission checks over a plan.
pub fn run_checks(
    instructions: &[SyncInstruction],
    accounts: &[AccountWithAllocation],
    max_orders_per_run: usize,
) -> CheckReport {
    let mut checks = Vec::new();

    // 1. Group prices must be positive and finite
    let bad_price = instructions
        .iter()
        .find(|g| !g.price.is_finite() || g.price <= 0.0);
    checks.push(match bad_price {
        Some(group) => Check {
            name: "Group price",
            status: CheckStatus::Fail,
            detail: format!("{} {} priced at {}", group.ticker, group.action, group.price),
        },
        None => Check {
            name: "Group price",
            status: CheckStatus::Pass,
            detail: format!("{} groups priced above zero", instructions.len()),
        },
    });

    // 2. Every leg must carry a positive quantity
    let zero_legs = instructions
        .iter()
        .flat_map(|g| g.legs.iter().map(move |leg| (g, leg)))
        .filter(|(_, leg)| leg.quantity <= 0)
        .count();
    checks.push(if zero_legs > 0 {
        Check {
            name: "Leg quantity",
            status: CheckStatus::Fail,
            detail: format!("{zero_legs} legs sized at zero or below"),
        }
    } else {
        Check {
            name: "Leg quantity",
            status: CheckStatus::Pass,
            detail: "all legs sized above zero".into(),
        }
    });

    // 3. (ticker, action) must identify exactly one group
    let mut group_counts: FxHashMap<(Ticker, Side), usize> = FxHashMap::default();
    for group in instructions {
        *group_counts.entry((group.ticker, group.action)).or_insert(0) += 1;
    }
    let duplicate = group_counts.iter().find(|&(_, &count)| count > 1);
    checks.push(match duplicate {
        Some(((ticker, action), count)) => Check {
            name: "Group identity",
            status: CheckStatus::Fail,
            detail: format!("{ticker} {action} appears in {count} groups"),
        },
        None => Check {
            name: "Group identity",
            status: CheckStatus::Pass,
            detail: "one group per (ticker, action)".into(),
        },
    });

    // 4. Two-sided tickers execute as independent batches; remind the operator
    let conflicted: Vec<&SyncInstruction> =
        instructions.iter().filter(|g| g.has_conflict).collect();
    checks.push(if conflicted.is_empty() {
        Check {
            name: "Side conflicts",
            status: CheckStatus::Pass,
            detail: "no ticker needs both sides".into(),
        }
    } else {
        let tickers: Vec<String> = conflicted
            .iter()
            .map(|g| g.ticker.to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        Check {
            name: "Side conflicts",
            status: CheckStatus::Warn,
            detail: format!(
                "{} buys and sells run as separate batches, never netted",
                tickers.join(", ")
            ),
        }
    });

    // 5. Order count cap
    let total_legs: usize = instructions.iter().map(|g| g.legs.len()).sum();
    let count_status = if total_legs > max_orders_per_run {
        CheckStatus::Fail
    } else {
        CheckStatus::Pass
    };
    checks.push(Check {
        name: "Order count",
        status: count_status,
        detail: format!(
            "{} legs across {} groups {} {} limit",
            total_legs,
            instructions.len(),
            if count_status == CheckStatus::Pass {
                "<="
            } else {
                ">"
            },
            max_orders_per_run,
        ),
    });

    // 6. Every leg's account must hold an allocation
    let allocated: FxHashMap<AccountId, f64> = accounts
        .iter()
        .map(|a| (a.id, a.capital_allocated))
        .collect();
    let unallocated = instructions
        .iter()
        .flat_map(|g| g.legs.iter())
        .find(|leg| !allocated.contains_key(&leg.account));
    checks.push(match unallocated {
        Some(leg) => Check {
            name: "Capital coverage",
            status: CheckStatus::Fail,
            detail: format!("account {} has no allocation for this strategy", leg.account),
        },
        None => Check {
            name: "Capital coverage",
            status: CheckStatus::Pass,
            detail: format!("{} accounts allocated", allocated.len()),
        },
    });

    CheckReport { checks }
}
