//! Iceberg job coordination: lot splitting, job state, and the wait loop.
//!
//! The middleware executes an iceberg server-side; the desk's job is to
//! split quantities for progress accounting, then poll `iceberg_status`
//! until the job reaches a terminal state. The wait loop owns the whole
//! lifecycle: transient poll failures are retried, a cooperative cancel
//! flag is honored between polls, and a deadline turns a stuck job into
//! a timeout.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::Backend;
use crate::types::{IcebergStatus, JobId};

/// Split a quantity into lots of `lot_size`, remainder last.
///
/// `split_lots(250, 100)` is `[100, 100, 50]`. A quantity at or below the
/// lot size goes out as a single lot, as does any quantity when the lot
/// size is zero or negative (splitting disabled).
pub fn split_lots(quantity: i64, lot_size: i64) -> Vec<i64> {
    if quantity <= 0 {
        return Vec::new();
    }
    if lot_size <= 0 || quantity <= lot_size {
        return vec![quantity];
    }
    let mut lots = vec![lot_size; (quantity / lot_size) as usize];
    let remainder = quantity % lot_size;
    if remainder > 0 {
        lots.push(remainder);
    }
    lots
}

/// Total lot count across several account quantities.
pub fn total_lots(quantities: &[i64], lot_size: i64) -> u32 {
    quantities
        .iter()
        .map(|&q| split_lots(q, lot_size).len() as u32)
        .sum()
}

/// Lifecycle state of an iceberg job.
///
/// `Waiting` and `Executing` are the only non-terminal states; everything
/// else ends the wait loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Executing,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Waiting | JobState::Executing)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Waiting => "waiting",
            JobState::Executing => "executing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::TimedOut => "timeout",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Observable progress of one iceberg job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobProgress {
    pub state: JobState,
    pub executed_lots: u32,
    pub total_lots: u32,
    pub message: Option<String>,
}

/// Shared handle onto a job's progress.
///
/// The wait loop writes through one clone while watchers read another.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<Mutex<JobProgress>>,
}

impl JobTracker {
    /// Start tracking a job expected to execute `total_lots` lots.
    pub fn new(total_lots: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(JobProgress {
                state: JobState::Waiting,
                executed_lots: 0,
                total_lots,
                message: None,
            })),
        }
    }

    pub fn snapshot(&self) -> JobProgress {
        self.inner.lock().unwrap().clone()
    }

    pub fn state(&self) -> JobState {
        self.inner.lock().unwrap().state
    }

    /// Executed fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let p = self.inner.lock().unwrap();
        if p.total_lots == 0 {
            0.0
        } else {
            p.executed_lots as f64 / p.total_lots as f64
        }
    }

    /// Fold a non-terminal poll into the tracker. Lot counts from the
    /// backend win over the local prediction once they start arriving.
    fn observe(&self, status: &IcebergStatus) {
        let mut p = self.inner.lock().unwrap();
        p.state = if status.status == "executing" || status.executed_lots > 0 {
            JobState::Executing
        } else {
            JobState::Waiting
        };
        if status.total_lots > 0 {
            p.executed_lots = status.executed_lots;
            p.total_lots = status.total_lots;
        }
        if status.message.is_some() {
            p.message = status.message.clone();
        }
    }

    fn finish(&self, state: JobState, status: Option<&IcebergStatus>) {
        let mut p = self.inner.lock().unwrap();
        p.state = state;
        if let Some(s) = status {
            if s.total_lots > 0 {
                p.executed_lots = s.executed_lots;
                p.total_lots = s.total_lots;
            }
            if s.message.is_some() {
                p.message = s.message.clone();
            }
        }
        if state == JobState::Completed {
            p.executed_lots = p.total_lots;
        }
    }
}

/// Cooperative cancellation flag, shared between the wait loop and
/// whatever requests the cancel (Ctrl-C handler, watch teardown).
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Polling cadence and deadline for [`await_completion`].
#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    /// 300ms cadence with a 10-hour deadline. Master icebergs over many
    /// accounts with TWAP pacing legitimately run for hours.
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            timeout: Duration::from_secs(600 * 60),
        }
    }
}

/// Poll a job until it reaches a terminal state.
///
/// Each iteration polls first and checks the cancel flag second, so a job
/// that finished remotely wins over a cancel requested in the same
/// interval; the remote result is what actually happened at the exchange.
/// A cancel sends `cancel_iceberg` and returns without waiting for the
/// backend to confirm. Poll failures are logged and retried until the
/// deadline; only the deadline itself produces `TimedOut`.
pub fn await_completion(
    backend: &dyn Backend,
    job: &JobId,
    tracker: &JobTracker,
    cancel: &CancelToken,
    opts: PollOptions,
) -> JobState {
    let start = Instant::now();

    loop {
        match backend.iceberg_status(job) {
            Ok(status) => {
                if status.is_completed() {
                    tracker.finish(JobState::Completed, Some(&status));
                    info!(
                        "Iceberg {job} completed ({}/{} lots)",
                        status.executed_lots, status.total_lots
                    );
                    return JobState::Completed;
                }
                if status.is_failed() {
                    tracker.finish(JobState::Failed, Some(&status));
                    warn!(
                        "Iceberg {job} failed: {}",
                        status.message.as_deref().unwrap_or("no detail")
                    );
                    return JobState::Failed;
                }
                debug!(
                    "Iceberg {job} status: {} {}/{} lots",
                    status.status, status.executed_lots, status.total_lots
                );
                tracker.observe(&status);
            }
            Err(e) => {
                warn!("Status poll for iceberg {job} failed: {e}");
            }
        }

        if cancel.is_cancelled() {
            info!("Cancelling iceberg {job}");
            if let Err(e) = backend.cancel_iceberg(job) {
                warn!("Cancel request for iceberg {job} failed: {e}");
            }
            tracker.finish(JobState::Cancelled, None);
            return JobState::Cancelled;
        }

        if start.elapsed() > opts.timeout {
            warn!("Iceberg {job} timed out after {}s", opts.timeout.as_secs());
            tracker.finish(JobState::TimedOut, None);
            return JobState::TimedOut;
        }

        thread::sleep(opts.interval);
    }
}
