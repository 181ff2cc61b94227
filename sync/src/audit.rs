//! JSONL audit trail logging.
//!
//! Every sync run appends events to an audit.jsonl file, one JSON object
//! per line. The trail is what operations reviews against broker
//! statements, so submissions and rejections are logged even when the run
//! itself fails later.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use opsdesk::{ManualAdjustment, ReferencePosition, Ticker};
use opsdesk_backend::iceberg::JobProgress;
use opsdesk_backend::types::{JobId, OrderRequest};

use crate::checks::CheckReport;
use crate::error::Result;
use crate::planner::SyncInstruction;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Convenience: log a run start event.
pub fn log_run_started(audit: &mut AuditLog, strategy: &str, dry_run: bool) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "strategy": strategy,
            "dry_run": dry_run,
        }),
    )
}

/// Convenience: log the fetched account and position snapshot.
pub fn log_snapshot(audit: &mut AuditLog, accounts: usize, positions: usize) -> Result<()> {
    audit.log(
        "snapshot_fetched",
        serde_json::json!({
            "accounts": accounts,
            "positions": positions,
        }),
    )
}

/// Convenience: log the computed sync plan.
pub fn log_plan(audit: &mut AuditLog, instructions: &[SyncInstruction]) -> Result<()> {
    let group_data: Vec<_> = instructions
        .iter()
        .map(|g| {
            serde_json::json!({
                "ticker": g.ticker.as_str(),
                "action": format!("{}", g.action),
                "price": g.price,
                "quantity": g.total_quantity(),
                "legs": g.legs.len(),
                "conflict": g.has_conflict,
            })
        })
        .collect();

    audit.log("plan_computed", serde_json::json!({ "groups": group_data }))
}

/// Convenience: log pre-submission check results.
pub fn log_checks(audit: &mut AuditLog, report: &CheckReport) -> Result<()> {
    let check_data: Vec<_> = report
        .checks
        .iter()
        .map(|c| {
            serde_json::json!({
                "name": c.name,
                "status": format!("{}", c.status),
                "detail": c.detail,
            })
        })
        .collect();

    audit.log(
        "checks_evaluated",
        serde_json::json!({
            "passed": !report.has_failures(),
            "checks": check_data,
        }),
    )
}

/// Convenience: log a direct order submission.
pub fn log_order_submitted(
    audit: &mut AuditLog,
    order: &OrderRequest,
    order_id: Option<&str>,
) -> Result<()> {
    audit.log(
        "order_submitted",
        serde_json::json!({
            "account": order.account_id.0,
            "ticker": order.ticker.as_str(),
            "side": format!("{}", order.side),
            "quantity": order.quantity,
            "price": order.price,
            "order_id": order_id,
        }),
    )
}

/// Convenience: log a gateway rejection of a direct order.
pub fn log_order_rejected(audit: &mut AuditLog, order: &OrderRequest, reason: &str) -> Result<()> {
    audit.log(
        "order_rejected",
        serde_json::json!({
            "account": order.account_id.0,
            "ticker": order.ticker.as_str(),
            "side": format!("{}", order.side),
            "quantity": order.quantity,
            "price": order.price,
            "reason": reason,
        }),
    )
}

/// Convenience: log a master iceberg submission.
pub fn log_iceberg_submitted(
    audit: &mut AuditLog,
    job: &JobId,
    instruction: &SyncInstruction,
    total_lots: u32,
) -> Result<()> {
    audit.log(
        "iceberg_submitted",
        serde_json::json!({
            "job": job.0,
            "ticker": instruction.ticker.as_str(),
            "action": format!("{}", instruction.action),
            "price": instruction.price,
            "quantity": instruction.total_quantity(),
            "accounts": instruction.legs.len(),
            "total_lots": total_lots,
        }),
    )
}

/// Convenience: log an iceberg reaching a terminal state.
pub fn log_iceberg_finished(audit: &mut AuditLog, job: &JobId, progress: &JobProgress) -> Result<()> {
    audit.log(
        "iceberg_finished",
        serde_json::json!({
            "job": job.0,
            "state": format!("{}", progress.state),
            "executed_lots": progress.executed_lots,
            "total_lots": progress.total_lots,
            "message": progress.message,
        }),
    )
}

/// Convenience: log a manual adjustment being recorded or edited.
pub fn log_adjustment_upserted(audit: &mut AuditLog, adj: &ManualAdjustment) -> Result<()> {
    audit.log(
        "adjustment_upserted",
        serde_json::json!({
            "strategy": adj.strategy,
            "account": adj.account.0,
            "ticker": adj.ticker.as_str(),
            "quantity_delta": adj.quantity_delta,
            "price_override": adj.price_override,
            "reason": adj.reason,
        }),
    )
}

/// Convenience: log a manual adjustment being closed.
pub fn log_adjustment_closed(audit: &mut AuditLog, adj: &ManualAdjustment) -> Result<()> {
    audit.log(
        "adjustment_closed",
        serde_json::json!({
            "strategy": adj.strategy,
            "account": adj.account.0,
            "ticker": adj.ticker.as_str(),
            "reason": adj.reason,
        }),
    )
}

/// Convenience: log a reference row being set.
pub fn log_reference_upserted(audit: &mut AuditLog, row: &ReferencePosition) -> Result<()> {
    audit.log(
        "reference_upserted",
        serde_json::json!({
            "strategy": row.strategy,
            "ticker": row.ticker.as_str(),
            "target_price": row.target_price,
            "target_quantity": row.target_quantity,
            "target_pct": row.target_pct,
        }),
    )
}

/// Convenience: log a reference row being removed.
pub fn log_reference_deleted(audit: &mut AuditLog, strategy: &str, ticker: Ticker) -> Result<()> {
    audit.log(
        "reference_deleted",
        serde_json::json!({
            "strategy": strategy,
            "ticker": ticker.as_str(),
        }),
    )
}

/// Convenience: log run completion.
pub fn log_run_completed(
    audit: &mut AuditLog,
    submitted: usize,
    completed: usize,
    failed: usize,
    cancelled: usize,
) -> Result<()> {
    audit.log(
        "run_completed",
        serde_json::json!({
            "submitted": submitted,
            "completed": completed,
            "failed": failed,
            "cancelled": cancelled,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.log_simple("test_event").unwrap();
            log.log("test_data", serde_json::json!({"key": "value"}))
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        // Each line should be valid JSON
        for line in &lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }

        // First line should have "test_event"
        assert!(lines[0].contains("\"event\":\"test_event\""));
    }

    #[test]
    fn audit_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdir").join("deep").join("audit.jsonl");

        let mut log = AuditLog::open(&path).unwrap();
        log.log_simple("test").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn convenience_events_carry_domain_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log_run_started(&mut log, "alpha", true).unwrap();
            log_run_completed(&mut log, 3, 2, 1, 0).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let started: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(started["event"], "run_started");
        assert_eq!(started["strategy"], "alpha");
        assert_eq!(started["dry_run"], true);

        let completed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(completed["submitted"], 3);
        assert_eq!(completed["failed"], 1);
    }
}
