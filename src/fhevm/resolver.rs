// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::Serialize;
use tracing::debug;

use super::error::FhevmError;
use crate::config::MockChains;
use crate::rpc::{self, NetworkTarget, RpcConnector};

/// Network classification for one session-creation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEnvironment {
    pub is_mock: bool,
    pub chain_id: u64,
    pub rpc_url: Option<String>,
}

/// Classify `target` as a mock (local) or remote network
///
/// A caller-supplied URL is kept as the RPC endpoint; a live connection
/// picks up the endpoint configured for its chain in `mock_chains`. Only
/// transport failures are errors.
pub async fn resolve(
    target: &NetworkTarget,
    mock_chains: &MockChains,
    connector: &dyn RpcConnector,
) -> Result<ResolvedEnvironment, FhevmError> {
    let transport = target.transport(connector).await?;
    let chain_id = rpc::chain_id(transport.as_ref()).await?;

    let is_mock = mock_chains.contains(chain_id);
    let rpc_url = match target.as_url() {
        Some(url) => Some(url.to_string()),
        None if is_mock => mock_chains.get(chain_id).map(str::to_string),
        None => None,
    };

    debug!(
        "Resolved chain {} (mock: {}, rpc: {:?})",
        chain_id, is_mock, rpc_url
    );

    Ok(ResolvedEnvironment {
        is_mock,
        chain_id,
        rpc_url,
    })
}
