//! # opsdesk
//!
//! Core domain types and position consolidation for a multi-account
//! brokerage operations desk trading Brazilian equities.
//!
//! The desk runs one strategy across many client accounts. The trading
//! backend reports calculated positions per account, but those reports
//! miss fills the backend never saw (exercised options, transfers,
//! corporate actions). This crate owns the arithmetic that turns backend
//! rows plus manual corrections into a truthful book:
//!
//! - **Consolidation**: merge backend position rows with [`ManualAdjustment`]
//!   records into per-account or cross-account (MASTER) views
//! - **Reference portfolios**: the allocation targets accounts converge to
//! - **Accounts and allocations**: capital assigned per account per strategy
//! - **BRL formatting**: `R$ 1.234,56` style display helpers
//!
//! ## Quick Start
//!
//! ```
//! use opsdesk::{AccountId, CalculatedPosition, ManualAdjustment, Ticker, consolidate_by_account};
//!
//! // The backend reports 100 PETR4 @ R$ 10,00 for one account.
//! let rows = vec![CalculatedPosition::new(
//!     AccountId(1), Ticker::new("PETR4"), 100, 10.0,
//! )];
//!
//! // The desk knows 50 more shares came in at R$ 12,00 via an exercised call.
//! let adjustments = vec![ManualAdjustment::new(
//!     "alpha", AccountId(1), Ticker::new("PETR4"), 50, Some(12.0), "exercised call",
//! )];
//!
//! let book = consolidate_by_account(&rows, &adjustments);
//! let position = &book[&AccountId(1)][0];
//!
//! assert_eq!(position.quantity, 150);
//! assert!((position.avg_price - 1_600.0 / 150.0).abs() < 1e-12);
//! assert!(position.adjusted);
//! ```
//!
//! ## Money
//!
//! Amounts are `f64` reais end to end; [`Brl`] owns the display convention:
//!
//! ```
//! use opsdesk::Brl;
//!
//! assert_eq!(format!("{}", Brl(1_234_567.891)), "R$ 1.234.567,89");
//! ```
//!
//! ## Serde
//!
//! Enable the `serde` feature to persist adjustments and reference rows;
//! tickers serialize as plain strings.

mod account;
mod adjustment;
mod consolidate;
mod money;
mod position;
mod reference;
mod side;
mod types;

// Re-export public API
pub use account::{Account, AccountWithAllocation, Allocation, join_allocations};
pub use adjustment::ManualAdjustment;
pub use consolidate::{consolidate_by_account, consolidate_master};
pub use money::{Brl, fmt_qty, position_pct};
pub use position::{CalculatedPosition, ConsolidatedPosition};
pub use reference::{ReferenceError, ReferencePosition, validate_reference};
pub use side::Side;
pub use types::{AccountId, StrategyId, Ticker};
