//! TOML configuration loading and validation.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use opsdesk::Ticker;
use opsdesk_backend::iceberg::PollOptions;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub strategy: StrategyConfig,
    pub store: StoreConfig,
    pub planner: PlannerConfig,
    pub execution: ExecutionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    /// Fixed-income instrument whose balance stands in for free cash.
    #[serde(default = "default_proxy_ticker")]
    pub proxy_ticker: String,
}

fn default_proxy_ticker() -> String {
    "FIXA11".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

fn default_store_dir() -> String {
    "./store".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Gap magnitude above which an instruction is emitted (strict).
    #[serde(default = "default_tolerance")]
    pub tolerance_pct: f64,
    /// Looser threshold for the "synced" display flag only.
    #[serde(default = "default_synced_indicator")]
    pub synced_indicator_pct: f64,
}

fn default_tolerance() -> f64 {
    0.5
}
fn default_synced_indicator() -> f64 {
    2.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// 0 sends plain orders instead of iceberg jobs.
    #[serde(default)]
    pub lot_size: i64,
    #[serde(default = "default_accounts_per_wave")]
    pub accounts_per_wave: u32,
    #[serde(default)]
    pub twap_enabled: bool,
    #[serde(default = "default_twap_interval")]
    pub twap_interval_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_iceberg_timeout")]
    pub iceberg_timeout_secs: u64,
    #[serde(default = "default_max_orders")]
    pub max_orders_per_run: usize,
    #[serde(default = "default_order_interval")]
    pub order_interval_ms: u64,
}

fn default_exchange() -> String {
    "B3".into()
}
fn default_accounts_per_wave() -> u32 {
    5
}
fn default_twap_interval() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    300
}
fn default_iceberg_timeout() -> u64 {
    36_000
}
fn default_max_orders() -> usize {
    50
}
fn default_order_interval() -> u64 {
    250
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.backend.base_url.is_empty() {
            return Err(Error::Config("backend base_url must not be empty".into()));
        }
        if self.backend.timeout_secs == 0 {
            return Err(Error::Config("backend timeout_secs must be > 0".into()));
        }
        if self.strategy.id.is_empty() {
            return Err(Error::Config("strategy id must not be empty".into()));
        }
        if Ticker::try_new(&self.strategy.proxy_ticker).is_none() {
            return Err(Error::Config(format!(
                "proxy_ticker '{}' exceeds 8 bytes",
                self.strategy.proxy_ticker
            )));
        }
        if self.planner.tolerance_pct <= 0.0 {
            return Err(Error::Config("tolerance_pct must be > 0".into()));
        }
        if self.planner.synced_indicator_pct < self.planner.tolerance_pct {
            return Err(Error::Config(
                "synced_indicator_pct must be >= tolerance_pct".into(),
            ));
        }
        if self.execution.lot_size < 0 {
            return Err(Error::Config("lot_size must be >= 0".into()));
        }
        if self.execution.accounts_per_wave == 0 {
            return Err(Error::Config("accounts_per_wave must be >= 1".into()));
        }
        if self.execution.poll_interval_ms < 50 {
            return Err(Error::Config("poll_interval_ms must be >= 50".into()));
        }
        if self.execution.iceberg_timeout_secs == 0 {
            return Err(Error::Config("iceberg_timeout_secs must be > 0".into()));
        }
        if self.execution.max_orders_per_run == 0 {
            return Err(Error::Config("max_orders_per_run must be >= 1".into()));
        }
        Ok(())
    }

    /// Cash-balance proxy instrument as a typed ticker.
    pub fn proxy_ticker(&self) -> Ticker {
        Ticker::new(&self.strategy.proxy_ticker)
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> std::path::PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }

    /// Iceberg polling options derived from the execution section.
    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(self.execution.poll_interval_ms),
            timeout: Duration::from_secs(self.execution.iceberg_timeout_secs),
        }
    }
}
