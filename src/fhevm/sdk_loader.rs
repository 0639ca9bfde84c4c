// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relayer runtime loading
//!
//! The remote encryption runtime is fetched and initialized at most once per
//! `SdkLoader`, and `SdkLoader::global_or_init` shares one loader across the
//! process. All state transitions happen under one async mutex, so
//! concurrent callers wait on the in-flight fetch or init instead of
//! starting their own. Both steps are bounded by a timeout. Failed steps leave the state untouched and may be
//! retried.

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::error::FhevmError;
use super::types::{FhevmInstanceConfig, FhevmSession};
use crate::config::RelayerNetworkConfig;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the relayer runtime
#[async_trait]
pub trait SdkSource: Send + Sync {
    async fn fetch(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError>;
}

/// A loaded relayer runtime
#[async_trait]
pub trait RelayerSdk: Send + Sync {
    /// One-time initialization; `Ok(false)` means the runtime refused
    async fn init(&self) -> Result<bool, FhevmError>;

    /// Built-in network configuration for `chain_id`
    fn network_config(&self, chain_id: u64) -> Option<RelayerNetworkConfig>;

    async fn create_session(
        &self,
        config: FhevmInstanceConfig,
    ) -> Result<Arc<dyn FhevmSession>, FhevmError>;
}

#[derive(Default)]
struct LoaderState {
    sdk: Option<Arc<dyn RelayerSdk>>,
    initialized: bool,
}

pub struct SdkLoader {
    source: Arc<dyn SdkSource>,
    state: Mutex<LoaderState>,
    load_timeout: Duration,
    init_timeout: Duration,
}

static GLOBAL_LOADER: OnceLock<Arc<SdkLoader>> = OnceLock::new();

impl SdkLoader {
    pub fn new(source: Arc<dyn SdkSource>) -> Self {
        Self {
            source,
            state: Mutex::new(LoaderState::default()),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Process-wide loader; `source` is only consulted on first use
    pub fn global_or_init(source: impl FnOnce() -> Arc<dyn SdkSource>) -> Arc<SdkLoader> {
        GLOBAL_LOADER
            .get_or_init(|| Arc::new(SdkLoader::new(source())))
            .clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.lock().await.sdk.is_some()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    /// Fetch the runtime unless it is already present
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError> {
        let mut state = self.state.lock().await;
        if let Some(sdk) = &state.sdk {
            return Ok(sdk.clone());
        }

        info!("Loading relayer runtime");
        let sdk = match tokio::time::timeout(self.load_timeout, self.source.fetch()).await {
            Ok(Ok(sdk)) => sdk,
            Ok(Err(FhevmError::Aborted)) => return Err(FhevmError::Aborted),
            Ok(Err(FhevmError::SdkLoadFailed(reason))) => {
                warn!("Relayer runtime load failed: {}", reason);
                return Err(FhevmError::SdkLoadFailed(reason));
            }
            Ok(Err(e)) => {
                warn!("Relayer runtime load failed: {}", e);
                return Err(FhevmError::SdkLoadFailed(e.to_string()));
            }
            Err(_) => {
                warn!("Relayer runtime load timed out after {:?}", self.load_timeout);
                return Err(FhevmError::SdkLoadFailed(format!(
                    "timed out after {}ms",
                    self.load_timeout.as_millis()
                )));
            }
        };

        state.sdk = Some(sdk.clone());
        info!("Relayer runtime loaded");
        Ok(sdk)
    }

    /// Run the runtime's init routine unless it already succeeded
    ///
    /// The runtime must have been loaded with `ensure_loaded` first.
    pub async fn ensure_initialized(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError> {
        let mut state = self.state.lock().await;
        let sdk = state.sdk.clone().ok_or_else(|| {
            FhevmError::SdkInitFailed("relayer runtime has not been loaded".to_string())
        })?;
        if state.initialized {
            return Ok(sdk);
        }

        info!("Initializing relayer runtime");
        match tokio::time::timeout(self.init_timeout, sdk.init()).await {
            Err(_) => {
                warn!("Relayer runtime init timed out after {:?}", self.init_timeout);
                Err(FhevmError::SdkInitFailed(format!(
                    "timed out after {}ms",
                    self.init_timeout.as_millis()
                )))
            }
            Ok(Ok(true)) => {
                state.initialized = true;
                info!("Relayer runtime initialized");
                Ok(sdk)
            }
            Ok(Ok(false)) => {
                warn!("Relayer runtime init returned false");
                Err(FhevmError::SdkInitFailed("init returned false".to_string()))
            }
            Ok(Err(FhevmError::Aborted)) => Err(FhevmError::Aborted),
            Ok(Err(e)) => {
                warn!("Relayer runtime init failed: {}", e);
                Err(FhevmError::SdkInitFailed(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for SdkLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkLoader")
            .field("load_timeout", &self.load_timeout)
            .field("init_timeout", &self.init_timeout)
            .finish_non_exhaustive()
    }
}
