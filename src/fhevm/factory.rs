// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session creation
//!
//! `FhevmInstanceFactory::create_session` walks one attempt through:
//!
//! ```text
//! resolving ─┬─ mock + local backend ──────────────────────────────────── creating ─ ready
//!            └─ sdk-loading ─ sdk-loaded ─ sdk-initializing ─ sdk-initialized ─ creating ─ ready
//! ```
//!
//! The cancellation token is checked before the first suspension point and
//! after every resumption; awaits are also raced against it. A cancelled
//! attempt fails with `FhevmError::Aborted` and skips the remaining side
//! effects, including the key material cache write.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::discovery::{discover, Discovery};
use super::error::FhevmError;
use super::mock::{MockSession, MockSessionConfig};
use super::resolver::resolve;
use super::sdk_loader::{SdkLoader, SdkSource};
use super::status::{SessionStatus, StatusNotifier};
use super::types::{FhevmInstanceConfig, FhevmSession, PUBLIC_PARAMS_BITS};
use crate::config::{FhevmConfig, MockChains};
use crate::rpc::{HttpConnector, NetworkTarget, RpcConnector};
use crate::storage::PublicKeyStorage;

/// Builds Sessions for local dev nodes with FHE metadata
#[async_trait]
pub trait MockBackendFactory: Send + Sync {
    async fn create(&self, config: MockSessionConfig) -> Result<Arc<dyn FhevmSession>, FhevmError>;
}

/// Default mock backend: a `MockSession` living in this process
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessMockBackend;

#[async_trait]
impl MockBackendFactory for InProcessMockBackend {
    async fn create(&self, config: MockSessionConfig) -> Result<Arc<dyn FhevmSession>, FhevmError> {
        Ok(Arc::new(MockSession::new(config)))
    }
}

/// Arguments of one `create_session` attempt
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub target: NetworkTarget,
    /// Extra mock chains; entries override the factory's mapping
    pub mock_chains: Option<MockChains>,
    pub cancel: CancellationToken,
    pub notifier: StatusNotifier,
}

impl CreateSessionParams {
    pub fn new(target: impl Into<NetworkTarget>) -> Self {
        Self {
            target: target.into(),
            mock_chains: None,
            cancel: CancellationToken::new(),
            notifier: StatusNotifier::silent(),
        }
    }

    pub fn with_mock_chains(mut self, mock_chains: MockChains) -> Self {
        self.mock_chains = Some(mock_chains);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_notifier(mut self, notifier: StatusNotifier) -> Self {
        self.notifier = notifier;
        self
    }
}

fn throw_if_cancelled(cancel: &CancellationToken) -> Result<(), FhevmError> {
    if cancel.is_cancelled() {
        Err(FhevmError::Aborted)
    } else {
        Ok(())
    }
}

/// Await `fut` unless `cancel` fires first; re-checks the token on resumption
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, FhevmError> {
    let output = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FhevmError::Aborted),
        output = fut => output,
    };
    throw_if_cancelled(cancel)?;
    Ok(output)
}

pub struct FhevmInstanceFactory {
    mock_chains: MockChains,
    connector: Arc<dyn RpcConnector>,
    sdk: Arc<SdkLoader>,
    mock_backend: Arc<dyn MockBackendFactory>,
    key_cache: PublicKeyStorage,
}

impl FhevmInstanceFactory {
    pub fn new(config: &FhevmConfig, sdk: Arc<SdkLoader>, key_cache: PublicKeyStorage) -> Self {
        Self {
            mock_chains: config.mock_chains.clone(),
            connector: Arc::new(HttpConnector::new(config.rpc_timeout())),
            sdk,
            mock_backend: Arc::new(InProcessMockBackend),
            key_cache,
        }
    }

    /// Factory backed by the process-wide relayer runtime loader
    ///
    /// `source` is only used if no factory has created the shared loader yet.
    pub fn with_global_sdk(
        config: &FhevmConfig,
        source: impl FnOnce() -> Arc<dyn SdkSource>,
        key_cache: PublicKeyStorage,
    ) -> Self {
        Self::new(config, SdkLoader::global_or_init(source), key_cache)
    }

    pub fn with_connector(mut self, connector: Arc<dyn RpcConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_mock_backend(mut self, mock_backend: Arc<dyn MockBackendFactory>) -> Self {
        self.mock_backend = mock_backend;
        self
    }

    pub fn sdk(&self) -> &Arc<SdkLoader> {
        &self.sdk
    }

    pub fn key_cache(&self) -> &PublicKeyStorage {
        &self.key_cache
    }

    /// Produce a ready Session for `params.target`
    pub async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<Arc<dyn FhevmSession>, FhevmError> {
        let CreateSessionParams {
            target,
            mock_chains,
            cancel,
            notifier,
        } = params;

        throw_if_cancelled(&cancel)?;
        notifier.notify(SessionStatus::Resolving);

        let mock_chains = match &mock_chains {
            Some(overrides) => self.mock_chains.merged(overrides),
            None => self.mock_chains.clone(),
        };
        let env = cancellable(
            &cancel,
            resolve(&target, &mock_chains, self.connector.as_ref()),
        )
        .await??;

        if env.is_mock {
            if let Some(rpc_url) = env.rpc_url.clone() {
                let discovery =
                    cancellable(&cancel, discover(&rpc_url, self.connector.as_ref())).await?;
                match discovery {
                    Discovery::LocalBackend(metadata) => {
                        notifier.notify(SessionStatus::Creating);
                        let session = cancellable(
                            &cancel,
                            self.mock_backend.create(MockSessionConfig {
                                rpc_url,
                                chain_id: env.chain_id,
                                metadata,
                            }),
                        )
                        .await??;
                        notifier.notify(SessionStatus::Ready);
                        info!("Mock FHE session ready on chain {}", env.chain_id);
                        return Ok(session);
                    }
                    Discovery::Absent(reason) => {
                        debug!(
                            "No local FHE backend on chain {} ({:?}), using relayer",
                            env.chain_id, reason
                        );
                    }
                }
            }
        }

        notifier.notify(SessionStatus::SdkLoading);
        cancellable(&cancel, self.sdk.ensure_loaded()).await??;
        notifier.notify(SessionStatus::SdkLoaded);

        notifier.notify(SessionStatus::SdkInitializing);
        let sdk = cancellable(&cancel, self.sdk.ensure_initialized()).await??;
        notifier.notify(SessionStatus::SdkInitialized);

        let network = sdk
            .network_config(env.chain_id)
            .ok_or(FhevmError::UnsupportedChain {
                chain_id: env.chain_id,
            })?;
        let acl_address = network.acl_address()?;

        let cached = cancellable(&cancel, self.key_cache.get(acl_address)).await?;
        debug!(
            "Key material cache for ACL {:?}: public key {}, params {}",
            acl_address,
            if cached.public_key.is_some() { "hit" } else { "miss" },
            if cached.public_params.is_some() { "hit" } else { "miss" }
        );

        notifier.notify(SessionStatus::Creating);
        let session = cancellable(
            &cancel,
            sdk.create_session(FhevmInstanceConfig {
                network,
                acl_address,
                chain_id: env.chain_id,
                target,
                public_key: cached.public_key,
                public_params: cached.public_params,
            }),
        )
        .await??;

        let public_key = session.public_key();
        let public_params = session.public_params(PUBLIC_PARAMS_BITS);
        throw_if_cancelled(&cancel)?;
        if public_key.is_some() || public_params.is_some() {
            let write = self
                .key_cache
                .set(acl_address, public_key.as_ref(), public_params.as_ref());
            if let Err(e) = cancellable(&cancel, write).await? {
                warn!("Failed to cache key material for ACL {:?}: {}", acl_address, e);
            }
        }

        notifier.notify(SessionStatus::Ready);
        info!(
            "Relayer FHE session ready on chain {} (ACL {:?})",
            env.chain_id, acl_address
        );
        Ok(session)
    }
}

impl std::fmt::Debug for FhevmInstanceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhevmInstanceFactory")
            .field("mock_chains", &self.mock_chains)
            .field("key_cache", &self.key_cache)
            .finish_non_exhaustive()
    }
}
