//! Daemon configuration, read once from `JOBQUEUE_*` environment variables

use anyhow::{bail, Context, Result};
use jobqueue_core::application::queue::{DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};
use jobqueue_core::application::worker::constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_REAPER_INTERVAL, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_WORKER_COUNT,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.jobqueue/jobs.db";
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9627;
const DEFAULT_EMAIL_FROM: &str = "noreply@localhost";

/// Console log format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format '{}' (expected pretty, compact or json)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub auto_retry: bool,
    pub retry_base_delay_ms: u64,
    pub retention_days: i64,
    pub reaper_interval: Duration,
    /// `None` disables the stuck-job reclaimer
    pub stuck_job_timeout: Option<Duration>,
    pub email_from: String,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("JOBQUEUE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = PathBuf::from(shellexpand::tilde(&db_path).into_owned());

        let worker_count: usize = parse_or(&get, "JOBQUEUE_WORKERS", DEFAULT_WORKER_COUNT)?;
        if worker_count == 0 {
            bail!("JOBQUEUE_WORKERS must be at least 1");
        }

        let retention_days: i64 =
            parse_or(&get, "JOBQUEUE_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        if !(0..=MAX_RETENTION_DAYS).contains(&retention_days) {
            bail!(
                "JOBQUEUE_RETENTION_DAYS must be between 0 and {}",
                MAX_RETENTION_DAYS
            );
        }

        let reaper_secs: u64 = parse_or(
            &get,
            "JOBQUEUE_REAPER_INTERVAL_SECS",
            DEFAULT_REAPER_INTERVAL.as_secs(),
        )?;
        if reaper_secs == 0 {
            bail!("JOBQUEUE_REAPER_INTERVAL_SECS must be positive");
        }

        let stuck_job_timeout = match get("JOBQUEUE_STUCK_JOB_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid JOBQUEUE_STUCK_JOB_TIMEOUT_SECS '{}'", raw))?;
                if secs == 0 {
                    bail!("JOBQUEUE_STUCK_JOB_TIMEOUT_SECS must be positive");
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let auto_retry = match get("JOBQUEUE_AUTO_RETRY") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("invalid JOBQUEUE_AUTO_RETRY '{}'", raw))?,
            None => true,
        };

        let log_format = match get("JOBQUEUE_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            db_path,
            rpc_host: get("JOBQUEUE_RPC_HOST").unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port: parse_or(&get, "JOBQUEUE_RPC_PORT", DEFAULT_RPC_PORT)?,
            worker_count,
            poll_interval: Duration::from_millis(parse_or(
                &get,
                "JOBQUEUE_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL.as_millis() as u64,
            )?),
            auto_retry,
            retry_base_delay_ms: parse_or(
                &get,
                "JOBQUEUE_RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY_MS,
            )?,
            retention_days,
            reaper_interval: Duration::from_secs(reaper_secs),
            stuck_job_timeout,
            email_from: get("JOBQUEUE_EMAIL_FROM")
                .unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            log_format,
            log_dir: get("JOBQUEUE_LOG_DIR")
                .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned())),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected true or false"),
    }
}
