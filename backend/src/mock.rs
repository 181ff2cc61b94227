//! Mock backend for testing. Implements `Backend` with scriptable behavior.
//!
//! Use this in tests to simulate the middleware without network calls.
//! Iceberg jobs get sequential ids (`job-1`, `job-2`, ...) so status
//! scripts can be keyed ahead of time; the last scripted status repeats
//! once the script runs out.
//!
//! ```ignore
//! use opsdesk_backend::mock::MockBackend;
//! use opsdesk_backend::IcebergStatus;
//!
//! let backend = MockBackend::builder()
//!     .with_account(1, "Alpha Fund")
//!     .with_allocation("alpha", 1, 3, 100_000.0)
//!     .with_position("alpha", 1, "PETR4", 100, 10.0)
//!     .with_status_script("job-1", vec![IcebergStatus::completed(2)])
//!     .build();
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use opsdesk::AccountId;

use crate::Backend;
use crate::error::BackendError;
use crate::types::{
    AccountInfo, AllocationInfo, IcebergMasterOrder, IcebergOrder, IcebergStatus, JobId,
    OrderAck, OrderRequest, PositionInfo,
};

/// Builder for [`MockBackend`].
pub struct MockBackendBuilder {
    accounts: Vec<AccountInfo>,
    allocations: Vec<AllocationInfo>,
    positions: Vec<(String, PositionInfo)>,
    statuses: HashMap<String, VecDeque<IcebergStatus>>,
    poll_failures: HashMap<String, usize>,
    reject: Option<(String, String)>,
}

impl MockBackendBuilder {
    pub fn with_account(mut self, id: u64, name: &str) -> Self {
        self.accounts.push(AccountInfo { id: AccountId(id), name: name.to_string() });
        self
    }

    pub fn with_allocation(
        mut self,
        strategy: &str,
        account: u64,
        broker_id: u32,
        capital: f64,
    ) -> Self {
        self.allocations.push(AllocationInfo {
            strategy_id: strategy.to_string(),
            account_id: AccountId(account),
            broker_id,
            capital_allocated: capital,
        });
        self
    }

    pub fn with_position(
        mut self,
        strategy: &str,
        account: u64,
        ticker: &str,
        quantity: i64,
        avg_price: f64,
    ) -> Self {
        self.positions.push((
            strategy.to_string(),
            PositionInfo {
                account_id: AccountId(account),
                ticker: ticker.to_string(),
                quantity,
                avg_price,
            },
        ));
        self
    }

    /// Script the status polls for a job id. The last entry repeats.
    pub fn with_status_script(mut self, job: &str, statuses: Vec<IcebergStatus>) -> Self {
        self.statuses.insert(job.to_string(), statuses.into());
        self
    }

    /// Fail the first `n` status polls for a job with a connection error.
    pub fn with_poll_failures(mut self, job: &str, n: usize) -> Self {
        self.poll_failures.insert(job.to_string(), n);
        self
    }

    /// Reject every order submission with this gateway code and message.
    pub fn reject_orders(mut self, code: &str, message: &str) -> Self {
        self.reject = Some((code.to_string(), message.to_string()));
        self
    }

    pub fn build(self) -> MockBackend {
        MockBackend {
            accounts: self.accounts,
            allocations: self.allocations,
            positions: self.positions,
            statuses: Mutex::new(self.statuses),
            poll_failures: Mutex::new(self.poll_failures),
            reject: self.reject,
            orders: Mutex::new(Vec::new()),
            icebergs: Mutex::new(Vec::new()),
            master_icebergs: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            next_job: Mutex::new(1),
            next_order: Mutex::new(1),
        }
    }
}

/// In-memory backend that records submissions and replays scripted polls.
pub struct MockBackend {
    accounts: Vec<AccountInfo>,
    allocations: Vec<AllocationInfo>,
    positions: Vec<(String, PositionInfo)>,
    statuses: Mutex<HashMap<String, VecDeque<IcebergStatus>>>,
    poll_failures: Mutex<HashMap<String, usize>>,
    reject: Option<(String, String)>,
    orders: Mutex<Vec<OrderRequest>>,
    icebergs: Mutex<Vec<IcebergOrder>>,
    master_icebergs: Mutex<Vec<IcebergMasterOrder>>,
    cancelled: Mutex<Vec<JobId>>,
    next_job: Mutex<u64>,
    next_order: Mutex<u64>,
}

impl MockBackend {
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder {
            accounts: Vec::new(),
            allocations: Vec::new(),
            positions: Vec::new(),
            statuses: HashMap::new(),
            poll_failures: HashMap::new(),
            reject: None,
        }
    }

    /// Plain orders submitted so far (for assertion in tests).
    pub fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    /// Single-account icebergs submitted so far.
    pub fn submitted_icebergs(&self) -> Vec<IcebergOrder> {
        self.icebergs.lock().unwrap().clone()
    }

    /// Master icebergs submitted so far.
    pub fn submitted_master_icebergs(&self) -> Vec<IcebergMasterOrder> {
        self.master_icebergs.lock().unwrap().clone()
    }

    /// Jobs that received a cancel request.
    pub fn cancelled_jobs(&self) -> Vec<JobId> {
        self.cancelled.lock().unwrap().clone()
    }

    fn next_job_id(&self) -> JobId {
        let mut n = self.next_job.lock().unwrap();
        let id = JobId(format!("job-{}", *n));
        *n += 1;
        id
    }

    fn check_reject(&self) -> Result<(), BackendError> {
        if let Some((code, message)) = &self.reject {
            return Err(BackendError::Rejected {
                code: code.clone(),
                message: message.clone(),
            });
        }
        Ok(())
    }
}

impl Backend for MockBackend {
    fn accounts(&self) -> Result<Vec<AccountInfo>, BackendError> {
        Ok(self.accounts.clone())
    }

    fn allocations(&self, strategy: &str) -> Result<Vec<AllocationInfo>, BackendError> {
        Ok(self
            .allocations
            .iter()
            .filter(|a| a.strategy_id == strategy)
            .cloned()
            .collect())
    }

    fn strategy_positions(&self, strategy: &str) -> Result<Vec<PositionInfo>, BackendError> {
        Ok(self
            .positions
            .iter()
            .filter(|(s, _)| s == strategy)
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, BackendError> {
        self.check_reject()?;
        self.orders.lock().unwrap().push(order.clone());
        let mut n = self.next_order.lock().unwrap();
        let ack = OrderAck {
            order_id: Some(format!("ord-{}", *n)),
            message: None,
        };
        *n += 1;
        Ok(ack)
    }

    fn submit_iceberg(&self, order: &IcebergOrder) -> Result<JobId, BackendError> {
        self.check_reject()?;
        self.icebergs.lock().unwrap().push(order.clone());
        Ok(self.next_job_id())
    }

    fn submit_iceberg_master(&self, order: &IcebergMasterOrder) -> Result<JobId, BackendError> {
        self.check_reject()?;
        self.master_icebergs.lock().unwrap().push(order.clone());
        Ok(self.next_job_id())
    }

    fn iceberg_status(&self, job: &JobId) -> Result<IcebergStatus, BackendError> {
        let mut failures = self.poll_failures.lock().unwrap();
        if let Some(left) = failures.get_mut(&job.0) {
            if *left > 0 {
                *left -= 1;
                return Err(BackendError::Connection("mock: poll failed".into()));
            }
        }
        drop(failures);

        let mut statuses = self.statuses.lock().unwrap();
        let script = statuses
            .get_mut(&job.0)
            .ok_or_else(|| BackendError::Status {
                status: 404,
                body: format!("unknown iceberg job {job}"),
            })?;
        if script.len() > 1 {
            if let Some(status) = script.pop_front() {
                return Ok(status);
            }
        }
        script.front().cloned().ok_or_else(|| BackendError::Status {
            status: 404,
            body: format!("exhausted script for {job}"),
        })
    }

    fn cancel_iceberg(&self, job: &JobId) -> Result<(), BackendError> {
        self.cancelled.lock().unwrap().push(job.clone());
        Ok(())
    }
}
