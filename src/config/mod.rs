// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod chains;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::fhevm::FhevmError;

pub use chains::{parse_address, MockChains, RelayerNetworkConfig};

/// Where the ephemeral decryption private key lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KeyRetention {
    /// Full signature record, private key included, goes to the persistent store
    #[default]
    Persistent,
    /// Records stay in process memory; every new process re-signs
    InMemory,
}

impl std::str::FromStr for KeyRetention {
    type Err = FhevmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" => Ok(KeyRetention::Persistent),
            "in-memory" | "memory" => Ok(KeyRetention::InMemory),
            other => Err(FhevmError::InvalidConfig(format!(
                "Unknown key retention '{}'",
                other
            ))),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct FhevmConfig {
    pub mock_chains: MockChains,
    pub rpc_timeout_ms: u64,
    pub decryption_duration_days: u64,
    pub key_retention: KeyRetention,
    pub storage_dir: Option<PathBuf>,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for FhevmConfig {
    fn default() -> Self {
        Self {
            mock_chains: MockChains::default(),
            rpc_timeout_ms: 10_000,
            decryption_duration_days: 365,
            key_retention: KeyRetention::Persistent,
            storage_dir: None,
            log_level: "info".to_string(),
        }
    }
}

/// `[fhevm]` section as written in a TOML file
#[derive(Debug, Default, Deserialize)]
struct FileSection {
    #[serde(default)]
    mock_chains: BTreeMap<String, String>,
    rpc_timeout_ms: Option<u64>,
    decryption_duration_days: Option<u64>,
    key_retention: Option<KeyRetention>,
    storage_dir: Option<PathBuf>,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    fhevm: FileSection,
}

impl FhevmConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Load from environment variables (and `.env` if present)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FHEVM_MOCK_CHAINS") {
            match MockChains::parse_list(&val) {
                Ok(chains) => config.mock_chains = config.mock_chains.merged(&chains),
                Err(e) => warn!("Ignoring FHEVM_MOCK_CHAINS: {}", e),
            }
        }

        if let Ok(val) = std::env::var("FHEVM_RPC_TIMEOUT_MS") {
            match val.parse() {
                Ok(num) => config.rpc_timeout_ms = num,
                Err(_) => warn!("Ignoring FHEVM_RPC_TIMEOUT_MS={}", val),
            }
        }

        if let Ok(val) = std::env::var("FHEVM_DECRYPTION_DURATION_DAYS") {
            match val.parse() {
                Ok(num) if num > 0 => config.decryption_duration_days = num,
                _ => warn!("Ignoring FHEVM_DECRYPTION_DURATION_DAYS={}", val),
            }
        }

        if let Ok(val) = std::env::var("FHEVM_KEY_RETENTION") {
            match val.parse() {
                Ok(retention) => config.key_retention = retention,
                Err(e) => warn!("Ignoring FHEVM_KEY_RETENTION: {}", e),
            }
        }

        if let Ok(val) = std::env::var("FHEVM_STORAGE_DIR") {
            if !val.trim().is_empty() {
                config.storage_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("FHEVM_LOG_LEVEL") {
            if !val.trim().is_empty() {
                config.log_level = val.trim().to_string();
            }
        }

        config
    }

    /// Parse the `[fhevm]` section of a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, FhevmError> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| FhevmError::InvalidConfig(format!("Invalid TOML: {}", e)))?;
        let section = file.fhevm;
        let mut config = Self::default();

        let mut overrides = MockChains::empty();
        for (id, url) in section.mock_chains {
            let chain_id = id.parse::<u64>().map_err(|e| {
                FhevmError::InvalidConfig(format!("Invalid mock chain id '{}': {}", id, e))
            })?;
            overrides.insert(chain_id, url);
        }
        config.mock_chains = config.mock_chains.merged(&overrides);

        if let Some(timeout) = section.rpc_timeout_ms {
            config.rpc_timeout_ms = timeout;
        }
        if let Some(days) = section.decryption_duration_days {
            if days == 0 {
                return Err(FhevmError::InvalidConfig(
                    "decryption_duration_days must be positive".to_string(),
                ));
            }
            config.decryption_duration_days = days;
        }
        if let Some(retention) = section.key_retention {
            config.key_retention = retention;
        }
        config.storage_dir = section.storage_dir;
        if let Some(level) = section.log_level {
            config.log_level = level;
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FhevmError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            FhevmError::InvalidConfig(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}
