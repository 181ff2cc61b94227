//! Trading backend client for the operations desk.
//!
//! The desk talks to its brokerage middleware over a small REST surface:
//! account and allocation listings, calculated positions per strategy, and
//! order submission in three shapes (plain limit order, single-account
//! iceberg, multi-account master iceberg). This crate provides:
//!
//! - **`Backend` trait**: the abstract surface the sync tool runs against
//! - **REST client** ([`RestBackend`]): blocking HTTP implementation
//! - **Iceberg coordination** ([`iceberg`]): lot splitting, job state
//!   machine, and the polling wait loop with cooperative cancellation
//! - **Mock** ([`mock::MockBackend`]): scriptable in-memory backend for tests

pub mod error;
pub mod iceberg;
pub mod mock;
pub mod rest;
pub mod types;

pub use error::{BackendError, describe_reject_code};
pub use rest::RestBackend;
pub use types::*;

/// A trading backend that reports accounts and positions and executes orders.
pub trait Backend {
    /// List all brokerage accounts known to the backend.
    fn accounts(&self) -> Result<Vec<AccountInfo>, BackendError>;

    /// Capital allocations for one strategy.
    fn allocations(&self, strategy: &str) -> Result<Vec<AllocationInfo>, BackendError>;

    /// Calculated positions for one strategy, one row per account holding.
    fn strategy_positions(&self, strategy: &str) -> Result<Vec<PositionInfo>, BackendError>;

    /// Submit a plain limit order.
    fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, BackendError>;

    /// Submit a single-account iceberg. Returns the job to poll.
    fn submit_iceberg(&self, order: &IcebergOrder) -> Result<JobId, BackendError>;

    /// Submit a multi-account master iceberg. Returns the job to poll.
    fn submit_iceberg_master(&self, order: &IcebergMasterOrder) -> Result<JobId, BackendError>;

    /// Poll the status of an iceberg job.
    fn iceberg_status(&self, job: &JobId) -> Result<IcebergStatus, BackendError>;

    /// Request cancellation of an iceberg job.
    fn cancel_iceberg(&self, job: &JobId) -> Result<(), BackendError>;
}
