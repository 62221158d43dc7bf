use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{fs, path::Path, str::FromStr};

use crate::{
    constant::{
        DEFAULT_COOLDOWN_HOURS, DEFAULT_HISTORY_PATH, DEFAULT_INTER_TX_DELAY_MS,
        DEFAULT_MAX_READ_RETRIES, DEFAULT_MIN_INACTIVE_DAYS, DEFAULT_READ_RETRY_BASE_MS,
        DEFAULT_REGISTRY_PATH, DEFAULT_RPC_TIMEOUT_SECS,
    },
    error::SweepError,
};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub sweep: SweepConfig,
}

/// Fully resolved runtime configuration. The pipeline never reads the
/// environment itself; the CLI resolves everything into this struct.
#[derive(Clone, Debug, Deserialize)]
pub struct SweepConfig {
    /// Solana RPC endpoint the ledger client connects to.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Per-request timeout for RPC calls, in seconds.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    /// Destination address that receives reclaimed rent.
    pub treasury: String,

    /// Operator signing key: file path, base58 string, or `[u8; 64]` array string.
    pub authority_key: String,

    /// When true, reclaim calls without an explicit override never submit.
    #[serde(default = "default_dry_run")]
    pub dry_run_default: bool,

    /// Days without observed activity before a funded account is flagged
    /// `inactive` (manual review only, never auto-closed).
    #[serde(default = "default_min_inactive_days")]
    pub min_inactive_days: u64,

    /// Reserved. Parsed for forward compatibility, not applied by any gate.
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u64,

    /// Fixed sleep after each successful non-dry-run close.
    #[serde(default = "default_inter_tx_delay_ms")]
    pub inter_tx_delay_ms: u64,

    /// Bounded retry attempts for ledger reads. Writes are never retried.
    #[serde(default = "default_max_read_retries")]
    pub max_read_retries: u32,

    /// Base delay for the exponential read backoff.
    #[serde(default = "default_read_retry_base_ms")]
    pub read_retry_base_ms: u64,

    /// JSON snapshot file holding tracked accounts, protections and operators.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Append-only CSV audit trail of executed reclaims.
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8899".to_string()
}

fn default_rpc_timeout_secs() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

fn default_dry_run() -> bool {
    true
}

fn default_min_inactive_days() -> u64 {
    DEFAULT_MIN_INACTIVE_DAYS
}

fn default_cooldown_hours() -> u64 {
    DEFAULT_COOLDOWN_HOURS
}

fn default_inter_tx_delay_ms() -> u64 {
    DEFAULT_INTER_TX_DELAY_MS
}

fn default_max_read_retries() -> u32 {
    DEFAULT_MAX_READ_RETRIES
}

fn default_read_retry_base_ms() -> u64 {
    DEFAULT_READ_RETRY_BASE_MS
}

fn default_registry_path() -> String {
    DEFAULT_REGISTRY_PATH.to_string()
}

fn default_history_path() -> String {
    DEFAULT_HISTORY_PATH.to_string()
}

/// Typed partial overrides with enumerated fields. Each `Some` replaces the
/// corresponding resolved value; `None` leaves the file value untouched.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Replaces `sweep.rpc_url`.
    pub rpc_url: Option<String>,
    /// Replaces `sweep.treasury`.
    pub treasury: Option<String>,
    /// Replaces `sweep.authority_key`.
    pub authority_key: Option<String>,
    /// Replaces `sweep.dry_run_default`.
    pub dry_run_default: Option<bool>,
    /// Replaces `sweep.min_inactive_days`.
    pub min_inactive_days: Option<u64>,
    /// Replaces `sweep.registry_path`.
    pub registry_path: Option<String>,
    /// Replaces `sweep.history_path`.
    pub history_path: Option<String>,
}

impl Config {
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, SweepError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SweepError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| SweepError::ConfigError(format!("Failed to parse config file: {e}")))?;

        Ok(config)
    }

    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Config {
        let sweep = &mut self.sweep;
        if let Some(v) = overrides.rpc_url {
            sweep.rpc_url = v;
        }
        if let Some(v) = overrides.treasury {
            sweep.treasury = v;
        }
        if let Some(v) = overrides.authority_key {
            sweep.authority_key = v;
        }
        if let Some(v) = overrides.dry_run_default {
            sweep.dry_run_default = v;
        }
        if let Some(v) = overrides.min_inactive_days {
            sweep.min_inactive_days = v;
        }
        if let Some(v) = overrides.registry_path {
            sweep.registry_path = v;
        }
        if let Some(v) = overrides.history_path {
            sweep.history_path = v;
        }
        self
    }

    /// Fatal-at-startup checks: a sweep run with an unparseable treasury or a
    /// missing signing key must never get as far as the pipeline.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.sweep.treasury.trim().is_empty() {
            return Err(SweepError::ConfigError("treasury address is required".to_string()));
        }
        Pubkey::from_str(&self.sweep.treasury).map_err(|_| {
            SweepError::ConfigError(format!("invalid treasury address: {}", self.sweep.treasury))
        })?;
        if self.sweep.authority_key.trim().is_empty() {
            return Err(SweepError::ConfigError("authority key is required".to_string()));
        }
        Ok(())
    }

    pub fn treasury_pubkey(&self) -> Result<Pubkey, SweepError> {
        Pubkey::from_str(&self.sweep.treasury).map_err(|_| {
            SweepError::ConfigError(format!("invalid treasury address: {}", self.sweep.treasury))
        })
    }
}
