//! Sync orchestrator: snapshot → plan → confirm → execute → reconcile.
//!
//! This is the main workflow that ties together all components.

use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use rustc_hash::FxHashMap;

use opsdesk::{
    AccountId, AccountWithAllocation, Brl, CalculatedPosition, ConsolidatedPosition, Ticker,
    consolidate_by_account, consolidate_master, fmt_qty, join_allocations, position_pct,
};
use opsdesk_backend::iceberg::{self, CancelToken, JobState, JobTracker};
use opsdesk_backend::types::{IcebergLeg, IcebergMasterOrder, OrderRequest};
use opsdesk_backend::{Backend, BackendError, describe_reject_code};

use crate::audit::{self, AuditLog};
use crate::checks;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::planner::{self, SyncInstruction};
use crate::reconcile;
use crate::store::Store;
use crate::watch::WatchManager;

/// Options for a sync run.
pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
    /// Per-ticker price overrides from the command line.
    pub price_overrides: Vec<(Ticker, f64)>,
}

/// Terminal outcome of one instruction group.
enum GroupOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Fetch accounts and join them with the strategy's allocations.
fn fetch_accounts(backend: &dyn Backend, strategy: &str) -> Result<Vec<AccountWithAllocation>> {
    let accounts: Vec<_> = backend
        .accounts()?
        .into_iter()
        .map(|a| a.into_account())
        .collect();
    let allocations: Vec<_> = backend
        .allocations(strategy)?
        .into_iter()
        .map(|a| a.into_allocation())
        .collect();
    Ok(join_allocations(&accounts, &allocations))
}

/// Fetch the strategy's calculated positions. Rows whose ticker does not
/// fit the inline representation are skipped with a warning.
fn fetch_positions(backend: &dyn Backend, strategy: &str) -> Result<Vec<CalculatedPosition>> {
    let rows = backend.strategy_positions(strategy)?;
    let mut positions = Vec::with_capacity(rows.len());
    for row in &rows {
        match row.to_position() {
            Some(p) => positions.push(p),
            None => warn!(
                "Skipping position with oversized ticker {:?} on account {}",
                row.ticker, row.account_id
            ),
        }
    }
    Ok(positions)
}

/// Execute a full sync run.
pub fn run(
    config: &Config,
    backend: &dyn Backend,
    cancel: &CancelToken,
    opts: &RunOptions,
) -> Result<()> {
    let strategy = &config.strategy.id;

    // 1. Open audit log
    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, strategy, opts.dry_run)?;

    // 2. Fetch the account and position snapshot
    let accounts = fetch_accounts(backend, strategy)?;
    let positions = fetch_positions(backend, strategy)?;
    audit::log_snapshot(&mut audit, accounts.len(), positions.len())?;

    // 3. Load the local book. Strict: a run never executes against samples.
    let store = Store::open(&config.store.dir)?;
    let adjustments = store.load_adjustments(strategy)?;
    let reference = store.load_reference(strategy)?;
    if reference.is_empty() {
        return Err(Error::Store(format!(
            "no reference portfolio stored for strategy {strategy}"
        )));
    }

    // 4. Consolidate and display
    let book = consolidate_by_account(&positions, &adjustments);
    display_book(&accounts, &book);

    // 5. Compute the plan
    let mut instructions =
        planner::plan(&reference, &accounts, &book, config.planner.tolerance_pct);

    if instructions.is_empty() {
        println!("\nNothing to sync: all accounts within tolerance.");
        audit.log_simple("nothing_to_sync")?;
        return Ok(());
    }

    // 6. Apply operator price overrides
    for (ticker, price) in &opts.price_overrides {
        let mut hit = false;
        for instruction in instructions.iter_mut().filter(|g| g.ticker == *ticker) {
            planner::reprice(instruction, *price);
            hit = true;
        }
        if !hit {
            warn!("Price override for {ticker} matches no planned group");
        }
    }

    audit::log_plan(&mut audit, &instructions)?;
    display_plan(&instructions);

    // 7. Run pre-submission checks
    let report = checks::run_checks(&instructions, &accounts, config.execution.max_orders_per_run);
    print!("{report}");
    audit::log_checks(&mut audit, &report)?;

    if report.has_failures() {
        return Err(Error::ChecksFailed(
            "one or more pre-submission checks failed".into(),
        ));
    }

    // 8. Dry run stops here
    if opts.dry_run {
        println!("\n[DRY RUN] No orders submitted.");
        return Ok(());
    }

    // 9. Confirm execution
    if !opts.force {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Execute?")
            .default(false)
            .interact()
            .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;

        if !confirmed {
            println!("Aborted.");
            audit.log("user_confirmed", serde_json::json!({"approved": false}))?;
            return Ok(());
        }

        audit.log("user_confirmed", serde_json::json!({"approved": true}))?;
    }

    // 10. Execute groups
    let brokers: FxHashMap<AccountId, u32> =
        accounts.iter().map(|a| (a.id, a.broker_id)).collect();
    let mut watches = WatchManager::new();
    let mut submitted = 0;
    let mut completed = 0;
    let mut failed = 0;
    let mut cancelled = 0;

    for (i, instruction) in instructions.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                "Cancel requested, {} group(s) left unsubmitted",
                instructions.len() - i
            );
            break;
        }

        print!(
            "[{}/{}] {} {} {} @ {} ... ",
            i + 1,
            instructions.len(),
            instruction.action,
            fmt_qty(instruction.total_quantity()),
            instruction.ticker,
            Brl(instruction.price),
        );

        submitted += 1;

        let outcome = if config.execution.lot_size == 0 {
            submit_direct(config, backend, &mut audit, &brokers, instruction)?
        } else {
            submit_iceberg_group(
                config,
                backend,
                &mut audit,
                &mut watches,
                &brokers,
                cancel,
                instruction,
            )?
        };

        match outcome {
            GroupOutcome::Completed => {
                completed += 1;
                close_covered_adjustments(&store, &mut audit, strategy, instruction)?;
            }
            GroupOutcome::Failed => failed += 1,
            GroupOutcome::Cancelled => cancelled += 1,
        }

        // Rate limiting between groups
        if i + 1 < instructions.len() {
            thread::sleep(Duration::from_millis(config.execution.order_interval_ms));
        }
    }

    // 11. Log completion
    audit::log_run_completed(&mut audit, submitted, completed, failed, cancelled)?;
    println!(
        "\n{submitted} submitted, {completed} completed, {failed} failed, {cancelled} cancelled. Audit logged to {}",
        config.audit_path().display()
    );

    // 12. Reconcile against a fresh snapshot
    info!("Running post-execution reconciliation...");
    let final_positions = fetch_positions(backend, strategy)?;
    let final_adjustments = store.load_adjustments(strategy)?;
    let final_book = consolidate_by_account(&final_positions, &final_adjustments);

    let report = reconcile::reconcile(
        &reference,
        &accounts,
        &final_book,
        config.planner.synced_indicator_pct,
    );
    print!("\n{report}");

    Ok(())
}

/// Submit one group as plain per-account limit orders.
///
/// Rejects are logged and the rest of the batch keeps going; a partially
/// accepted group counts as failed so the operator re-runs it.
fn submit_direct(
    config: &Config,
    backend: &dyn Backend,
    audit: &mut AuditLog,
    brokers: &FxHashMap<AccountId, u32>,
    instruction: &SyncInstruction,
) -> Result<GroupOutcome> {
    let mut accepted = 0;

    for leg in &instruction.legs {
        let Some(&broker_id) = brokers.get(&leg.account) else {
            warn!("No allocation for account {}, leg skipped", leg.account);
            continue;
        };

        let order = OrderRequest {
            account_id: leg.account,
            broker_id,
            ticker: instruction.ticker,
            side: instruction.action,
            quantity: leg.quantity,
            price: instruction.price,
            exchange: config.execution.exchange.clone(),
        };

        match backend.submit_order(&order) {
            Ok(ack) => {
                audit::log_order_submitted(audit, &order, ack.order_id.as_deref())?;
                accepted += 1;
            }
            Err(e) => {
                let reason = reject_reason(&e);
                if e.is_reject() {
                    warn!(
                        "Order rejected for {} on {}: {reason}",
                        order.ticker, order.account_id
                    );
                } else {
                    error!(
                        "Order submission failed for {} on {}: {e}",
                        order.ticker, order.account_id
                    );
                }
                audit::log_order_rejected(audit, &order, &reason)?;
            }
        }
    }

    let total = instruction.legs.len();
    if accepted == total {
        println!("OK ({accepted} orders)");
        Ok(GroupOutcome::Completed)
    } else if accepted > 0 {
        println!("PARTIAL ({accepted}/{total} orders accepted)");
        Ok(GroupOutcome::Failed)
    } else {
        println!("REJECTED");
        Ok(GroupOutcome::Failed)
    }
}

/// Submit one group as a master iceberg and wait for its terminal state.
fn submit_iceberg_group(
    config: &Config,
    backend: &dyn Backend,
    audit: &mut AuditLog,
    watches: &mut WatchManager,
    brokers: &FxHashMap<AccountId, u32>,
    cancel: &CancelToken,
    instruction: &SyncInstruction,
) -> Result<GroupOutcome> {
    let mut legs = Vec::with_capacity(instruction.legs.len());
    for leg in &instruction.legs {
        let Some(&broker_id) = brokers.get(&leg.account) else {
            warn!("No allocation for account {}, leg skipped", leg.account);
            continue;
        };
        legs.push(IcebergLeg {
            account_id: leg.account,
            broker_id,
            quantity: leg.quantity,
        });
    }
    if legs.is_empty() {
        println!("SKIPPED (no executable legs)");
        return Ok(GroupOutcome::Failed);
    }

    let order = IcebergMasterOrder {
        ticker: instruction.ticker,
        side: instruction.action,
        price: instruction.price,
        exchange: config.execution.exchange.clone(),
        lot_size: config.execution.lot_size,
        twap_enabled: config.execution.twap_enabled,
        twap_interval_secs: config.execution.twap_interval_secs,
        accounts_per_wave: config.execution.accounts_per_wave,
        accounts: legs,
    };

    let job = match backend.submit_iceberg_master(&order) {
        Ok(job) => job,
        Err(e) => {
            println!("ERROR: {e}");
            error!("Iceberg submission failed for {}: {e}", instruction.ticker);
            return Ok(GroupOutcome::Failed);
        }
    };

    let quantities: Vec<i64> = order.accounts.iter().map(|l| l.quantity).collect();
    let lots = iceberg::total_lots(&quantities, config.execution.lot_size);
    audit::log_iceberg_submitted(audit, &job, instruction, lots)?;

    let tracker = JobTracker::new(lots);
    let key = format!("{}:{}", instruction.ticker, instruction.action);
    watches.register(&key, job.clone(), tracker.clone(), cancel.clone(), backend);

    let state = iceberg::await_completion(backend, &job, &tracker, cancel, config.poll_options());
    watches.remove(&key, backend);

    let progress = tracker.snapshot();
    audit::log_iceberg_finished(audit, &job, &progress)?;

    match state {
        JobState::Completed => {
            println!(
                "COMPLETED ({}/{} lots)",
                progress.executed_lots, progress.total_lots
            );
            Ok(GroupOutcome::Completed)
        }
        JobState::Failed => {
            println!(
                "FAILED: {}",
                progress.message.as_deref().unwrap_or("no detail")
            );
            Ok(GroupOutcome::Failed)
        }
        JobState::TimedOut => {
            println!("TIMED OUT after {}s", config.execution.iceberg_timeout_secs);
            Ok(GroupOutcome::Failed)
        }
        JobState::Cancelled => {
            println!("CANCELLED");
            Ok(GroupOutcome::Cancelled)
        }
        // await_completion only returns terminal states
        JobState::Waiting | JobState::Executing => Ok(GroupOutcome::Failed),
    }
}

/// Operator-facing reason for a submission failure.
fn reject_reason(e: &BackendError) -> String {
    match e {
        BackendError::Rejected { code, message } => describe_reject_code(code)
            .map(str::to_string)
            .unwrap_or_else(|| message.clone()),
        other => other.to_string(),
    }
}

/// After a liquidation group fully executes, close the manual adjustments
/// it covered so the next run does not re-book them.
fn close_covered_adjustments(
    store: &Store,
    audit: &mut AuditLog,
    strategy: &str,
    instruction: &SyncInstruction,
) -> Result<()> {
    for leg in &instruction.legs {
        if leg.target_value_brl.is_some() {
            continue;
        }
        match store.close_adjustment(strategy, leg.account, instruction.ticker) {
            Ok(Some(adj)) => {
                info!("Closed adjustment {} after liquidation", adj.composite_id());
                audit::log_adjustment_closed(audit, &adj)?;
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Failed to close adjustment for {} on {}: {e}",
                instruction.ticker, leg.account
            ),
        }
    }
    Ok(())
}

/// Show consolidated positions, per account or across the whole strategy.
pub fn show_positions(config: &Config, backend: &dyn Backend, master: bool) -> Result<()> {
    let strategy = &config.strategy.id;
    let accounts = fetch_accounts(backend, strategy)?;
    let positions = fetch_positions(backend, strategy)?;

    let store = Store::open(&config.store.dir)?;
    let (adjustments, degraded) = store.load_adjustments_or_sample(strategy);
    if degraded {
        println!("(adjustment store unreadable; showing sample adjustments)\n");
        log_degraded(config);
    }

    if master {
        let consolidated = consolidate_master(&positions, &adjustments);
        display_master(&consolidated);
    } else {
        let book = consolidate_by_account(&positions, &adjustments);
        display_book(&accounts, &book);
    }
    Ok(())
}

/// Show each account's cash proxy holding next to its allocated capital.
pub fn show_cash(config: &Config, backend: &dyn Backend) -> Result<()> {
    let strategy = &config.strategy.id;
    let proxy = config.proxy_ticker();
    let accounts = fetch_accounts(backend, strategy)?;
    let positions = fetch_positions(backend, strategy)?;

    let store = Store::open(&config.store.dir)?;
    let (adjustments, degraded) = store.load_adjustments_or_sample(strategy);
    if degraded {
        println!("(adjustment store unreadable; showing sample adjustments)\n");
        log_degraded(config);
    }
    let book = consolidate_by_account(&positions, &adjustments);

    println!("CASH PROXY ({proxy}):");
    println!(
        "  {:8} {:>14} {:>14} {:>7}",
        "Account", "Capital", "Proxy", "%"
    );
    for account in &accounts {
        let value = book
            .get(&account.id)
            .and_then(|positions| positions.iter().find(|p| p.ticker == proxy))
            .map_or(0.0, |p| p.value());
        println!(
            "  {:8} {:>14} {:>14} {:>6.1}%",
            format!("{}", account.id),
            format!("{}", Brl(account.capital_allocated)),
            format!("{}", Brl(value)),
            position_pct(value, account.capital_allocated),
        );
    }
    Ok(())
}

/// Check backend reachability.
pub fn check_status(config: &Config, backend: &dyn Backend) -> Result<()> {
    print!("Checking backend at {}... ", config.backend.base_url);

    let accounts = backend.accounts()?;
    println!("OK");

    let allocations = backend.allocations(&config.strategy.id)?;
    println!(
        "{} accounts, {} allocated to strategy {}",
        accounts.len(),
        allocations.len(),
        config.strategy.id,
    );
    Ok(())
}

/// Reconcile live positions against the stored reference portfolio.
pub fn run_reconcile(config: &Config, backend: &dyn Backend) -> Result<()> {
    let strategy = &config.strategy.id;
    let accounts = fetch_accounts(backend, strategy)?;
    let positions = fetch_positions(backend, strategy)?;

    let store = Store::open(&config.store.dir)?;
    let (adjustments, adj_degraded) = store.load_adjustments_or_sample(strategy);
    let (reference, ref_degraded) = store.load_reference_or_sample(strategy);
    if adj_degraded || ref_degraded {
        println!("(store unreadable; reconciling against sample data)\n");
        log_degraded(config);
    }

    let book = consolidate_by_account(&positions, &adjustments);
    let report = reconcile::reconcile(
        &reference,
        &accounts,
        &book,
        config.planner.synced_indicator_pct,
    );
    print!("{report}");
    Ok(())
}

// === Helpers ===

fn log_degraded(config: &Config) {
    if let Ok(mut audit) = AuditLog::open(&config.audit_path()) {
        let _ = audit.log_simple("store_degraded");
    }
}

fn display_book(
    accounts: &[AccountWithAllocation],
    book: &FxHashMap<AccountId, Vec<ConsolidatedPosition>>,
) {
    println!("CURRENT POSITIONS:");
    for account in accounts {
        println!(
            "  {} {} (capital {}):",
            account.id,
            account.name,
            Brl(account.capital_allocated)
        );

        let positions = book.get(&account.id).map(Vec::as_slice).unwrap_or(&[]);
        if positions.is_empty() {
            println!("    (none)");
            continue;
        }
        for pos in positions {
            println!(
                "    {:8} {:>8} @ {:>10} = {:>14}  ({:>5.1}%){}",
                pos.ticker,
                fmt_qty(pos.quantity),
                format!("{}", Brl(pos.avg_price)),
                format!("{}", Brl(pos.value())),
                position_pct(pos.value(), account.capital_allocated),
                if pos.adjusted { "  [adj]" } else { "" },
            );
        }
    }
}

fn display_master(positions: &[ConsolidatedPosition]) {
    if positions.is_empty() {
        println!("No positions.");
        return;
    }

    println!("MASTER POSITION:");
    let total: f64 = positions.iter().map(|p| p.value()).sum();
    for pos in positions {
        println!(
            "  {:8} {:>10} @ {:>10} = {:>14}{}",
            pos.ticker,
            fmt_qty(pos.quantity),
            format!("{}", Brl(pos.avg_price)),
            format!("{}", Brl(pos.value())),
            if pos.adjusted { "  [adj]" } else { "" },
        );
    }
    println!("\nTotal value: {}", Brl(total));
}

fn display_plan(instructions: &[SyncInstruction]) {
    println!("\nSYNC ORDERS:");
    println!(
        "  {:>3}  {:6} {:8} {:>10} {:>12} {:>14} {:>9}",
        "#", "Action", "Ticker", "Quantity", "Price", "Notional", "Accounts"
    );

    for (i, instruction) in instructions.iter().enumerate() {
        println!(
            "  {:>3}  {:6} {:8} {:>10} {:>12} {:>14} {:>9}{}",
            i + 1,
            format!("{}", instruction.action),
            instruction.ticker,
            fmt_qty(instruction.total_quantity()),
            format!("{}", Brl(instruction.price)),
            format!("{}", Brl(instruction.notional_brl())),
            instruction.legs.len(),
            if instruction.has_conflict {
                "   [both sides]"
            } else {
                ""
            },
        );
    }

    let total: f64 = instructions.iter().map(|g| g.notional_brl()).sum();
    println!("\nTotal notional: {}", Brl(total));
}
