//! Wire types for the backend REST surface.
//!
//! Field names mirror the middleware's snake_case JSON. Requests reuse the
//! core `Ticker`/`AccountId`/`Side` types, which serialize as plain strings
//! and numbers; responses deserialize tickers as `String` first so an
//! oversized symbol from the backend surfaces as a conversion failure
//! instead of a panic.

use std::fmt;

use opsdesk::{Account, AccountId, Allocation, CalculatedPosition, Side, Ticker};
use serde::{Deserialize, Serialize};

/// An account row from `GET /accounts`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    pub id: AccountId,
    pub name: String,
}

impl AccountInfo {
    pub fn into_account(self) -> Account {
        Account { id: self.id, name: self.name }
    }
}

/// An allocation row from `GET /allocations?strategy_id=`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AllocationInfo {
    pub strategy_id: String,
    pub account_id: AccountId,
    pub broker_id: u32,
    pub capital_allocated: f64,
}

impl AllocationInfo {
    pub fn into_allocation(self) -> Allocation {
        Allocation {
            strategy: self.strategy_id,
            account: self.account_id,
            broker_id: self.broker_id,
            capital_allocated: self.capital_allocated,
        }
    }
}

/// A calculated position row from `GET /positions_strategy?strategy_id=`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PositionInfo {
    pub account_id: AccountId,
    pub ticker: String,
    pub quantity: i64,
    pub avg_price: f64,
}

impl PositionInfo {
    /// Convert to a core position. `None` when the ticker does not fit.
    pub fn to_position(&self) -> Option<CalculatedPosition> {
        let ticker = Ticker::try_new(&self.ticker)?;
        Some(CalculatedPosition::new(
            self.account_id,
            ticker,
            self.quantity,
            self.avg_price,
        ))
    }
}

/// Body for `POST /order`: a plain limit order for one account.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderRequest {
    pub account_id: AccountId,
    pub broker_id: u32,
    pub ticker: Ticker,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub exchange: String,
}

/// Acknowledgement from `POST /order`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OrderAck {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body for `POST /order_iceberg`: one account, split into lots server-side.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IcebergOrder {
    pub account_id: AccountId,
    pub broker_id: u32,
    pub ticker: Ticker,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub exchange: String,
    pub lot_size: i64,
    pub twap_enabled: bool,
    pub twap_interval_secs: u64,
}

/// One account's share of a master iceberg.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IcebergLeg {
    pub account_id: AccountId,
    pub broker_id: u32,
    pub quantity: i64,
}

/// Body for `POST /order_iceberg_master`: one instrument across many
/// accounts, executed in waves of `accounts_per_wave`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IcebergMasterOrder {
    pub ticker: Ticker,
    pub side: Side,
    pub price: f64,
    pub exchange: String,
    pub lot_size: i64,
    pub twap_enabled: bool,
    pub twap_interval_secs: u64,
    pub accounts_per_wave: u32,
    pub accounts: Vec<IcebergLeg>,
}

/// Server-assigned iceberg job identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Acknowledgement from the iceberg submission endpoints.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IcebergAck {
    pub iceberg_id: JobId,
}

/// One poll of `GET /iceberg_status/{id}`.
///
/// The middleware reports both a status string and legacy boolean flags;
/// either form marks the job terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IcebergStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub executed_lots: u32,
    #[serde(default)]
    pub total_lots: u32,
    #[serde(default)]
    pub message: Option<String>,
}

impl IcebergStatus {
    /// Terminal success: the flag or the status string, whichever arrives.
    pub fn is_completed(&self) -> bool {
        self.completed || self.status == "completed"
    }

    /// Terminal failure.
    pub fn is_failed(&self) -> bool {
        self.failed || self.status == "failed"
    }

    /// Executed fraction in `[0, 1]`. Zero when the backend has not
    /// reported lot counts yet.
    pub fn progress(&self) -> f64 {
        if self.total_lots == 0 {
            0.0
        } else {
            self.executed_lots as f64 / self.total_lots as f64
        }
    }

    pub fn waiting(total_lots: u32) -> Self {
        Self {
            status: "waiting".into(),
            completed: false,
            failed: false,
            executed_lots: 0,
            total_lots,
            message: None,
        }
    }

    pub fn executing(executed_lots: u32, total_lots: u32) -> Self {
        Self {
            status: "executing".into(),
            completed: false,
            failed: false,
            executed_lots,
            total_lots,
            message: None,
        }
    }

    pub fn completed(total_lots: u32) -> Self {
        Self {
            status: "completed".into(),
            completed: true,
            failed: false,
            executed_lots: total_lots,
            total_lots,
            message: None,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            status: "failed".into(),
            completed: false,
            failed: true,
            executed_lots: 0,
            total_lots: 0,
            message: Some(message.to_string()),
        }
    }
}
