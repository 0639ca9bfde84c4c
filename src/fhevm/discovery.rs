// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local FHE backend probing
//!
//! A candidate local node qualifies for the in-process mock backend only if
//! its client version names the local dev node and it answers the relayer
//! metadata call with all three contract addresses. Every other outcome,
//! including transport failures, is reported as `Discovery::Absent`.

use ethers::types::Address;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::parse_address;
use crate::rpc::{methods, RpcConnector};

/// Substring (case-insensitive) of `web3_clientVersion` on a local dev node
pub const LOCAL_NODE_MARKER: &str = "hardhat";

/// Contract addresses of an FHE-capable local node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendMetadata {
    pub acl_address: Address,
    pub input_verifier_address: Address,
    pub kms_verifier_address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentReason {
    NotLocalNode,
    MetadataUnavailable,
    MalformedMetadata,
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    LocalBackend(BackendMetadata),
    Absent(AbsentReason),
}

impl Discovery {
    pub fn metadata(&self) -> Option<&BackendMetadata> {
        match self {
            Discovery::LocalBackend(metadata) => Some(metadata),
            Discovery::Absent(_) => None,
        }
    }
}

/// Required fields only; nodes may report further contract addresses
#[derive(Deserialize)]
struct RawMetadata {
    #[serde(rename = "ACLAddress")]
    acl_address: String,
    #[serde(rename = "InputVerifierAddress")]
    input_verifier_address: String,
    #[serde(rename = "KMSVerifierAddress")]
    kms_verifier_address: String,
}

impl BackendMetadata {
    /// Decode an `fhevm_relayer_metadata` result
    ///
    /// The three addresses must be present as well-formed address strings.
    pub fn from_rpc_value(value: Value) -> Option<Self> {
        let raw: RawMetadata = serde_json::from_value(value).ok()?;
        Some(BackendMetadata {
            acl_address: parse_address("ACL", &raw.acl_address).ok()?,
            input_verifier_address: parse_address("input verifier", &raw.input_verifier_address)
                .ok()?,
            kms_verifier_address: parse_address("KMS verifier", &raw.kms_verifier_address).ok()?,
        })
    }
}

/// Probe `rpc_url` for an FHE-capable local node
pub async fn discover(rpc_url: &str, connector: &dyn RpcConnector) -> Discovery {
    let transport = match connector.connect(rpc_url).await {
        Ok(transport) => transport,
        Err(e) => {
            debug!("Discovery could not connect to {}: {}", rpc_url, e);
            return Discovery::Absent(AbsentReason::Transport);
        }
    };

    match transport
        .request(methods::WEB3_CLIENT_VERSION, Value::Array(vec![]))
        .await
    {
        Ok(Value::String(version)) if version.to_lowercase().contains(LOCAL_NODE_MARKER) => {
            debug!("Local node detected at {}: {}", rpc_url, version);
        }
        Ok(other) => {
            debug!("{} is not a local dev node (client version {})", rpc_url, other);
            return Discovery::Absent(AbsentReason::NotLocalNode);
        }
        Err(e) => {
            debug!("{} failed on {}: {}", methods::WEB3_CLIENT_VERSION, rpc_url, e);
            return Discovery::Absent(AbsentReason::Transport);
        }
    }

    let raw = match transport
        .request(methods::FHEVM_RELAYER_METADATA, Value::Array(vec![]))
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            debug!("{} failed on {}: {}", methods::FHEVM_RELAYER_METADATA, rpc_url, e);
            return Discovery::Absent(AbsentReason::MetadataUnavailable);
        }
    };

    match BackendMetadata::from_rpc_value(raw) {
        Some(metadata) => {
            info!(
                "FHE mock backend available at {} (ACL {:?})",
                rpc_url, metadata.acl_address
            );
            Discovery::LocalBackend(metadata)
        }
        None => {
            debug!("Malformed relayer metadata from {}", rpc_url);
            Discovery::Absent(AbsentReason::MalformedMetadata)
        }
    }
}
