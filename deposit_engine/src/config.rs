use std::env;

use dpg_common::{Secret, WalletAddress};
use log::*;
use thiserror::Error;

pub const DEFAULT_CONFIRMATION_THRESHOLD: i64 = 12;
pub const DEFAULT_SCAN_CHUNK_SIZE: i64 = 500;
pub const DEFAULT_SCAN_LOOKBACK: i64 = 5_000;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 15;

/// Hard floor on the configurable confirmation threshold. Transfers become `Confirming` at this
/// count, so a threshold below it would make the state machine skip a state.
pub const MIN_CONFIRMATION_THRESHOLD: i64 = 6;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    MissingField(String),
    #[error("Invalid configuration: {0}")]
    InvalidField(String),
}

/// Configuration for the chain scanner and reconciliation worker.
#[derive(Clone, Debug)]
pub struct ScannerConfig {
    /// JSON-RPC endpoint of an execution node. Often carries an API key, so it is kept secret.
    pub rpc_url: Secret<String>,
    /// Contract address of the token being watched.
    pub token_address: Option<WalletAddress>,
    /// The treasury wallet deposits are sent to. Only transfers addressed to it are recorded.
    pub treasury_address: Option<WalletAddress>,
    /// Confirmations required before a transfer may be credited.
    pub confirmation_threshold: i64,
    /// If set, the worker checks the node's chain id on startup and refuses to scan a mismatch.
    pub chain_id: Option<i64>,
    /// Maximum number of blocks a single pass will scan.
    pub scan_chunk_size: i64,
    /// How far behind the tip a fresh deployment starts scanning.
    pub bootstrap_lookback: i64,
    /// Seconds between scan passes.
    pub poll_interval_secs: u64,
    pub database_url: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rpc_url: Secret::new(String::default()),
            token_address: None,
            treasury_address: None,
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            chain_id: None,
            scan_chunk_size: DEFAULT_SCAN_CHUNK_SIZE,
            bootstrap_lookback: DEFAULT_SCAN_LOOKBACK,
            poll_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            database_url: String::default(),
        }
    }
}

impl ScannerConfig {
    pub fn from_env_or_default() -> Self {
        let rpc_url = env::var("DPG_RPC_URL").map(Secret::new).unwrap_or_else(|_| {
            error!("🪛️ DPG_RPC_URL is not set. Please set it to the JSON-RPC URL of an execution node.");
            Secret::new(String::default())
        });
        let token_address = address_from_env("DPG_TOKEN_ADDRESS");
        let treasury_address = address_from_env("DPG_TREASURY_ADDRESS");
        let confirmation_threshold = i64_from_env("DPG_CONFIRMATION_THRESHOLD", DEFAULT_CONFIRMATION_THRESHOLD);
        let chain_id = env::var("DPG_CHAIN_ID").ok().and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| {
                    error!("🪛️ {s} is not a valid chain id for DPG_CHAIN_ID. {e}. The chain id check is disabled.");
                })
                .ok()
        });
        let scan_chunk_size = i64_from_env("DPG_SCAN_CHUNK_SIZE", DEFAULT_SCAN_CHUNK_SIZE);
        let bootstrap_lookback = i64_from_env("DPG_SCAN_LOOKBACK", DEFAULT_SCAN_LOOKBACK);
        let poll_interval_secs = env::var("DPG_SCAN_INTERVAL_SECS")
            .map(|s| {
                s.parse::<u64>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid interval for DPG_SCAN_INTERVAL_SECS. {e}. Using the default, \
                         {DEFAULT_SCAN_INTERVAL_SECS}s, instead."
                    );
                    DEFAULT_SCAN_INTERVAL_SECS
                })
            })
            .unwrap_or(DEFAULT_SCAN_INTERVAL_SECS);
        let database_url = env::var("DPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ DPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        Self {
            rpc_url,
            token_address,
            treasury_address,
            confirmation_threshold,
            chain_id,
            scan_chunk_size,
            bootstrap_lookback,
            poll_interval_secs,
            database_url,
        }
    }

    /// Checks that the configuration is complete enough to scan with. The worker refuses to start
    /// on a failure here rather than limping along against the wrong contract or wallet.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.reveal().is_empty() {
            return Err(ConfigError::MissingField("DPG_RPC_URL".into()));
        }
        if self.token_address.is_none() {
            return Err(ConfigError::MissingField("DPG_TOKEN_ADDRESS".into()));
        }
        if self.treasury_address.is_none() {
            return Err(ConfigError::MissingField("DPG_TREASURY_ADDRESS".into()));
        }
        if self.confirmation_threshold < MIN_CONFIRMATION_THRESHOLD {
            return Err(ConfigError::InvalidField(format!(
                "Confirmation threshold {} is below the minimum of {MIN_CONFIRMATION_THRESHOLD}",
                self.confirmation_threshold
            )));
        }
        if self.scan_chunk_size <= 0 {
            return Err(ConfigError::InvalidField(format!("Scan chunk size must be positive, not {}", self.scan_chunk_size)));
        }
        if self.bootstrap_lookback < 0 {
            return Err(ConfigError::InvalidField(format!("Scan lookback cannot be negative ({})", self.bootstrap_lookback)));
        }
        Ok(())
    }
}

fn address_from_env(var: &str) -> Option<WalletAddress> {
    env::var(var).ok().and_then(|s| {
        s.parse::<WalletAddress>()
            .map_err(|e| {
                error!("🪛️ {s} is not a valid address for {var}. {e}");
            })
            .ok()
    })
}

fn i64_from_env(var: &str, default: i64) -> i64 {
    env::var(var)
        .map(|s| {
            s.parse::<i64>().unwrap_or_else(|e| {
                error!("🪛️ {s} is not a valid value for {var}. {e}. Using the default, {default}, instead.");
                default
            })
        })
        .unwrap_or(default)
}
