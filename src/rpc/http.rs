// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{RpcConnector, RpcTransport};
use crate::fhevm::FhevmError;

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC over HTTP with a bounded per-call timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    provider: Provider<Http>,
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn connect(rpc_url: &str, timeout: Duration) -> Result<Self, FhevmError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| FhevmError::InvalidConfig(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FhevmError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        let provider = Provider::new(Http::new_with_client(url, client));

        Ok(Self {
            provider,
            url: rpc_url.to_string(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, FhevmError> {
        debug!("RPC {} -> {}", method, self.url);
        let call = self.provider.request::<Value, Value>(method, params);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(FhevmError::transport(method, e)),
            Err(_) => Err(FhevmError::Timeout {
                method: method.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Default connector: one fresh HTTP transport per URL
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_RPC_TIMEOUT)
    }
}

#[async_trait]
impl RpcConnector for HttpConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RpcTransport>, FhevmError> {
        Ok(Arc::new(HttpTransport::connect(url, self.timeout)?))
    }
}
