//! opsdesk-sync: Multi-account position sync for a brokerage operations desk.
//!
//! Reads the reference portfolio and manual adjustments from the local
//! store, fetches live positions from the backend middleware, computes
//! per-account sync instructions, and executes them as grouped iceberg
//! jobs with pre-submission checks and an audit trail.

pub mod audit;
pub mod checks;
pub mod config;
pub mod error;
pub mod execution;
pub mod planner;
pub mod reconcile;
pub mod sample;
pub mod store;
pub mod watch;
