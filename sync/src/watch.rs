//! Watch registry for in-flight iceberg jobs.
//!
//! Every live job the run submits is registered here under a stable key.
//! Removing a key tears the job down deterministically: a watch whose
//! tracker is still non-terminal gets its cancel token set and a
//! best-effort remote cancel. The Ctrl-C path drains the whole registry
//! the same way.

use log::{info, warn};
use rustc_hash::FxHashMap;

use opsdesk_backend::Backend;
use opsdesk_backend::iceberg::{CancelToken, JobTracker};
use opsdesk_backend::types::JobId;

/// One watched job.
pub struct WatchEntry {
    pub job: JobId,
    pub tracker: JobTracker,
    pub cancel: CancelToken,
}

/// Key to cancel-handle map for the jobs of one run.
#[derive(Default)]
pub struct WatchManager {
    entries: FxHashMap<String, WatchEntry>,
}

impl WatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching a job. A displaced entry under the same key is torn
    /// down first.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        job: JobId,
        tracker: JobTracker,
        cancel: CancelToken,
        backend: &dyn Backend,
    ) {
        let entry = WatchEntry { job, tracker, cancel };
        if let Some(old) = self.entries.insert(key.into(), entry) {
            teardown(&old, backend);
        }
    }

    pub fn get(&self, key: &str) -> Option<&WatchEntry> {
        self.entries.get(key)
    }

    /// Stop watching a key, cancelling the job if it is still running.
    pub fn remove(&mut self, key: &str, backend: &dyn Backend) -> Option<WatchEntry> {
        let entry = self.entries.remove(key)?;
        teardown(&entry, backend);
        Some(entry)
    }

    /// Tear down every watched job. Used on operator interrupt.
    pub fn cancel_all(&mut self, backend: &dyn Backend) {
        for (_, entry) in self.entries.drain() {
            teardown(&entry, backend);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn teardown(entry: &WatchEntry, backend: &dyn Backend) {
    if entry.tracker.state().is_terminal() {
        return;
    }
    info!("Tearing down watch on iceberg {}", entry.job);
    entry.cancel.cancel();
    if let Err(e) = backend.cancel_iceberg(&entry.job) {
        warn!("Cancel request for iceberg {} failed: {e}", entry.job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use opsdesk_backend::iceberg::{self, JobState, PollOptions};
    use opsdesk_backend::mock::MockBackend;
    use opsdesk_backend::types::IcebergStatus;

    fn job(id: &str) -> JobId {
        JobId(id.into())
    }

    #[test]
    fn register_and_get() {
        let backend = MockBackend::builder().build();
        let mut watches = WatchManager::new();

        watches.register("PETR4_buy", job("job-1"), JobTracker::new(3), CancelToken::new(), &backend);

        assert_eq!(watches.len(), 1);
        assert_eq!(watches.get("PETR4_buy").unwrap().job, job("job-1"));
        assert!(watches.get("VALE3_sell").is_none());
    }

    #[test]
    fn remove_cancels_live_job() {
        let backend = MockBackend::builder().build();
        let mut watches = WatchManager::new();
        let cancel = CancelToken::new();

        watches.register("PETR4_buy", job("job-1"), JobTracker::new(3), cancel.clone(), &backend);
        let removed = watches.remove("PETR4_buy", &backend).unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(backend.cancelled_jobs(), vec![job("job-1")]);
        assert_eq!(removed.job, job("job-1"));
        assert!(watches.is_empty());
    }

    #[test]
    fn remove_finished_job_skips_remote_cancel() {
        let backend = MockBackend::builder()
            .with_status_script("job-1", vec![IcebergStatus::completed(3)])
            .build();
        let tracker = JobTracker::new(3);
        let opts = PollOptions {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
        };
        let state = iceberg::await_completion(
            &backend,
            &job("job-1"),
            &tracker,
            &CancelToken::new(),
            opts,
        );
        assert_eq!(state, JobState::Completed);

        let mut watches = WatchManager::new();
        watches.register("PETR4_buy", job("job-1"), tracker, CancelToken::new(), &backend);
        watches.remove("PETR4_buy", &backend);

        assert!(backend.cancelled_jobs().is_empty());
    }

    #[test]
    fn cancel_all_drains_everything() {
        let backend = MockBackend::builder().build();
        let mut watches = WatchManager::new();

        watches.register("PETR4_buy", job("job-1"), JobTracker::new(2), CancelToken::new(), &backend);
        watches.register("VALE3_sell", job("job-2"), JobTracker::new(4), CancelToken::new(), &backend);
        watches.cancel_all(&backend);

        assert!(watches.is_empty());
        let mut cancelled = backend.cancelled_jobs();
        cancelled.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(cancelled, vec![job("job-1"), job("job-2")]);
    }

    #[test]
    fn reregistering_a_key_tears_down_the_old_watch() {
        let backend = MockBackend::builder().build();
        let mut watches = WatchManager::new();

        watches.register("PETR4_buy", job("job-1"), JobTracker::new(2), CancelToken::new(), &backend);
        watches.register("PETR4_buy", job("job-2"), JobTracker::new(2), CancelToken::new(), &backend);

        assert_eq!(watches.len(), 1);
        assert_eq!(watches.get("PETR4_buy").unwrap().job, job("job-2"));
        assert_eq!(backend.cancelled_jobs(), vec![job("job-1")]);
    }
}
