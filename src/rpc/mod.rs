// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Blockchain connection seam
//!
//! The subsystem only ever issues raw JSON-RPC calls: `eth_chainId` to
//! classify the network, and the two local-node probes used by backend
//! discovery. Callers either hand in a live connection or a URL, in which
//! case a throwaway HTTP transport is opened through an `RpcConnector`.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::fhevm::FhevmError;

pub use http::{HttpConnector, HttpTransport};

pub mod methods {
    pub const ETH_CHAIN_ID: &str = "eth_chainId";
    pub const WEB3_CLIENT_VERSION: &str = "web3_clientVersion";
    pub const FHEVM_RELAYER_METADATA: &str = "fhevm_relayer_metadata";
}

/// A live JSON-RPC connection
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, FhevmError>;
}

/// Opens transports for bare RPC URLs
#[async_trait]
pub trait RpcConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RpcTransport>, FhevmError>;
}

/// Where a Session should talk to: an RPC URL or an existing connection
#[derive(Clone)]
pub enum NetworkTarget {
    Url(String),
    Connection(Arc<dyn RpcTransport>),
}

impl NetworkTarget {
    pub fn url(url: impl Into<String>) -> Self {
        NetworkTarget::Url(url.into())
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            NetworkTarget::Url(url) => Some(url),
            NetworkTarget::Connection(_) => None,
        }
    }

    /// Transport for this target, opening one through `connector` for URLs
    pub async fn transport(
        &self,
        connector: &dyn RpcConnector,
    ) -> Result<Arc<dyn RpcTransport>, FhevmError> {
        match self {
            NetworkTarget::Url(url) => connector.connect(url).await,
            NetworkTarget::Connection(transport) => Ok(transport.clone()),
        }
    }
}

impl std::fmt::Debug for NetworkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkTarget::Url(url) => f.debug_tuple("Url").field(url).finish(),
            NetworkTarget::Connection(_) => f.write_str("Connection(..)"),
        }
    }
}

impl From<&str> for NetworkTarget {
    fn from(url: &str) -> Self {
        NetworkTarget::Url(url.to_string())
    }
}

impl From<Arc<dyn RpcTransport>> for NetworkTarget {
    fn from(transport: Arc<dyn RpcTransport>) -> Self {
        NetworkTarget::Connection(transport)
    }
}

/// Query the chain id over `transport`
pub async fn chain_id(transport: &dyn RpcTransport) -> Result<u64, FhevmError> {
    let raw = transport
        .request(methods::ETH_CHAIN_ID, Value::Array(vec![]))
        .await?;
    parse_quantity(&raw).ok_or_else(|| {
        FhevmError::transport(methods::ETH_CHAIN_ID, format!("unexpected result {}", raw))
    })
}

/// Decode a JSON-RPC quantity (`"0x7a69"`) or a plain JSON number
pub fn parse_quantity(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => {
            let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
            u64::from_str_radix(digits, 16).ok()
        }
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
