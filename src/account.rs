//! Accounts and capital allocations.

use crate::AccountId;

/// A brokerage account known to the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    pub id: AccountId,
    pub name: String,
}

/// Capital assigned to an account under a strategy.
///
/// `broker_id` selects the execution broker for this account's orders.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    pub strategy: String,
    pub account: AccountId,
    pub broker_id: u32,
    pub capital_allocated: f64,
}

/// An account joined with its allocation for one strategy.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountWithAllocation {
    pub id: AccountId,
    pub name: String,
    pub broker_id: u32,
    pub capital_allocated: f64,
}

/// Join accounts with a strategy's allocations.
///
/// Allocations drive the result: an account without an allocation is not
/// part of the strategy and is dropped. An allocation whose account is
/// missing from the account list keeps a placeholder name so capital is
/// never silently lost.
pub fn join_allocations(
    accounts: &[Account],
    allocations: &[Allocation],
) -> Vec<AccountWithAllocation> {
    let mut joined: Vec<AccountWithAllocation> = allocations
        .iter()
        .map(|alloc| {
            let name = accounts
                .iter()
                .find(|a| a.id == alloc.account)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| format!("account {}", alloc.account.0));
            AccountWithAllocation {
                id: alloc.account,
                name,
                broker_id: alloc.broker_id,
                capital_allocated: alloc.capital_allocated,
            }
        })
        .collect();
    joined.sort_by_key(|a| a.id);
    joined
}
