//! CLI entry point for the desk sync tool.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use opsdesk::{AccountId, Brl, ManualAdjustment, ReferencePosition, Ticker, fmt_qty};
use opsdesk_backend::RestBackend;
use opsdesk_backend::iceberg::CancelToken;
use opsdesk_sync::audit::{self, AuditLog};
use opsdesk_sync::config::Config;
use opsdesk_sync::error::{Error, Result};
use opsdesk_sync::execution::{self, RunOptions};
use opsdesk_sync::store::Store;

#[derive(Parser)]
#[command(name = "desksync")]
#[command(about = "Multi-account position sync: reference portfolio → brokerage accounts")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute sync instructions, confirm, and execute them
    Run {
        /// Show the plan without executing
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,

        /// Override a group's limit price, e.g. --price PETR4=38.10
        #[arg(long = "price", value_parser = price_override_arg)]
        price: Vec<(Ticker, f64)>,
    },

    /// Show consolidated positions per account
    Positions {
        /// Aggregate across all accounts instead
        #[arg(long)]
        master: bool,
    },

    /// Show each account's cash proxy holding
    Cash,

    /// Check backend connectivity
    Status,

    /// Compare actual positions against the reference portfolio
    Reconcile,

    /// Manage manual position adjustments
    Adjust {
        #[command(subcommand)]
        command: AdjustCommand,
    },

    /// Manage the reference portfolio
    Reference {
        #[command(subcommand)]
        command: ReferenceCommand,
    },
}

#[derive(Subcommand)]
enum AdjustCommand {
    /// Record or update an adjustment for one account and ticker
    Set {
        account: u64,
        #[arg(value_parser = ticker_arg)]
        ticker: Ticker,
        /// Signed quantity delta, e.g. 100 or -- -50
        delta: i64,
        /// Book the delta at this price instead of the blended price
        #[arg(long)]
        price: Option<f64>,
        /// Operator note explaining the correction
        #[arg(long)]
        reason: String,
    },

    /// Close an adjustment, zeroing its effect
    Close {
        account: u64,
        #[arg(value_parser = ticker_arg)]
        ticker: Ticker,
    },

    /// List adjustments for the configured strategy
    Ls,
}

#[derive(Subcommand)]
enum ReferenceCommand {
    /// Insert or update one reference row
    Set {
        #[arg(value_parser = ticker_arg)]
        ticker: Ticker,
        /// Limit price in BRL
        price: f64,
        /// Target quantity per account
        quantity: i64,
        /// Target weight as a percentage of allocated capital
        pct: f64,
    },

    /// Remove one reference row
    Rm {
        #[arg(value_parser = ticker_arg)]
        ticker: Ticker,
    },

    /// List the reference portfolio
    Ls,
}

fn ticker_arg(s: &str) -> std::result::Result<Ticker, String> {
    Ticker::try_new(s).ok_or_else(|| format!("invalid ticker {s:?} (1-8 ASCII characters)"))
}

fn price_override_arg(s: &str) -> std::result::Result<(Ticker, f64), String> {
    let (ticker, price) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TICKER=PRICE, got {s:?}"))?;
    let ticker = ticker_arg(ticker)?;
    let price: f64 = price
        .parse()
        .map_err(|_| format!("invalid price {price:?}"))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(format!("price must be positive, got {price}"));
    }
    Ok((ticker, price))
}

fn connect(config: &Config) -> Result<RestBackend> {
    let timeout = Duration::from_secs(config.backend.timeout_secs);
    Ok(RestBackend::new(&config.backend.base_url, timeout)?)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run {
            dry_run,
            force,
            price,
        } => {
            let cancel = CancelToken::new();
            let handler_cancel = cancel.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                eprintln!("\nCancel requested, finishing the current job...");
                handler_cancel.cancel();
            }) {
                log::warn!("Failed to install Ctrl-C handler: {e}");
            }

            let opts = RunOptions {
                dry_run,
                force,
                price_overrides: price,
            };
            connect(&config).and_then(|backend| execution::run(&config, &backend, &cancel, &opts))
        }
        Command::Positions { master } => {
            connect(&config).and_then(|backend| execution::show_positions(&config, &backend, master))
        }
        Command::Cash => connect(&config).and_then(|backend| execution::show_cash(&config, &backend)),
        Command::Status => {
            connect(&config).and_then(|backend| execution::check_status(&config, &backend))
        }
        Command::Reconcile => {
            connect(&config).and_then(|backend| execution::run_reconcile(&config, &backend))
        }
        Command::Adjust { command } => match command {
            AdjustCommand::Set {
                account,
                ticker,
                delta,
                price,
                reason,
            } => adjust_set(&config, AccountId(account), ticker, delta, price, reason),
            AdjustCommand::Close { account, ticker } => {
                adjust_close(&config, AccountId(account), ticker)
            }
            AdjustCommand::Ls => adjust_ls(&config),
        },
        Command::Reference { command } => match command {
            ReferenceCommand::Set {
                ticker,
                price,
                quantity,
                pct,
            } => reference_set(&config, ticker, price, quantity, pct),
            ReferenceCommand::Rm { ticker } => reference_rm(&config, ticker),
            ReferenceCommand::Ls => reference_ls(&config),
        },
    };

    if let Err(e) = result {
        match &e {
            Error::ChecksFailed(msg) => {
                eprintln!("\nAborted: {msg}");
                process::exit(2);
            }
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}

fn adjust_set(
    config: &Config,
    account: AccountId,
    ticker: Ticker,
    delta: i64,
    price: Option<f64>,
    reason: String,
) -> Result<()> {
    let store = Store::open(&config.store.dir)?;
    let adjustment =
        ManualAdjustment::new(&config.strategy.id, account, ticker, delta, price, reason);
    store.upsert_adjustment(&adjustment)?;

    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_adjustment_upserted(&mut audit, &adjustment)?;

    println!(
        "Recorded adjustment {} {} on {}",
        fmt_qty(delta),
        ticker,
        account
    );
    Ok(())
}

fn adjust_close(config: &Config, account: AccountId, ticker: Ticker) -> Result<()> {
    let store = Store::open(&config.store.dir)?;
    match store.close_adjustment(&config.strategy.id, account, ticker)? {
        Some(adjustment) => {
            let mut audit = AuditLog::open(&config.audit_path())?;
            audit::log_adjustment_closed(&mut audit, &adjustment)?;
            println!("Closed adjustment for {ticker} on {account}");
        }
        None => println!("No adjustment found for {ticker} on {account}"),
    }
    Ok(())
}

fn adjust_ls(config: &Config) -> Result<()> {
    let store = Store::open(&config.store.dir)?;
    let (adjustments, degraded) = store.load_adjustments_or_sample(&config.strategy.id);
    if degraded {
        println!("(adjustment store unreadable; showing sample adjustments)\n");
    }
    if adjustments.is_empty() {
        println!("No adjustments recorded for {}.", config.strategy.id);
        return Ok(());
    }

    println!("ADJUSTMENTS for {}:", config.strategy.id);
    for adj in &adjustments {
        println!(
            "  {:6} {:8} {:>8} @ {:>10}  {}{}",
            format!("{}", adj.account),
            adj.ticker,
            fmt_qty(adj.quantity_delta),
            adj.price_override
                .map_or_else(|| "blended".to_string(), |p| format!("{}", Brl(p))),
            adj.reason,
            if adj.is_closed() { "  [closed]" } else { "" },
        );
    }
    Ok(())
}

fn reference_set(
    config: &Config,
    ticker: Ticker,
    price: f64,
    quantity: i64,
    pct: f64,
) -> Result<()> {
    let store = Store::open(&config.store.dir)?;
    let row = ReferencePosition {
        strategy: config.strategy.id.clone(),
        ticker,
        target_price: price,
        target_quantity: quantity,
        target_pct: pct,
    };
    store.upsert_reference(&row)?;

    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_reference_upserted(&mut audit, &row)?;

    println!("Reference updated: {ticker} {pct:.1}% @ {}", Brl(price));
    Ok(())
}

fn reference_rm(config: &Config, ticker: Ticker) -> Result<()> {
    let store = Store::open(&config.store.dir)?;
    if store.delete_reference(&config.strategy.id, ticker)? {
        let mut audit = AuditLog::open(&config.audit_path())?;
        audit::log_reference_deleted(&mut audit, &config.strategy.id, ticker)?;
        println!("Removed {ticker} from the reference portfolio");
    } else {
        println!("{ticker} is not in the reference portfolio");
    }
    Ok(())
}

fn reference_ls(config: &Config) -> Result<()> {
    let store = Store::open(&config.store.dir)?;
    let (reference, degraded) = store.load_reference_or_sample(&config.strategy.id);
    if degraded {
        println!("(reference store unreadable; showing sample portfolio)\n");
    }
    if reference.is_empty() {
        println!("No reference portfolio stored for {}.", config.strategy.id);
        return Ok(());
    }

    println!("REFERENCE PORTFOLIO for {}:", config.strategy.id);
    println!(
        "  {:8} {:>12} {:>10} {:>8}",
        "Ticker", "Price", "Quantity", "Weight"
    );
    for row in &reference {
        println!(
            "  {:8} {:>12} {:>10} {:>7.1}%",
            row.ticker,
            format!("{}", Brl(row.target_price)),
            fmt_qty(row.target_quantity),
            row.target_pct,
        );
    }
    let total: f64 = reference.iter().map(|r| r.target_pct).sum();
    println!("\n  Total weight: {total:.1}%");
    Ok(())
}
