// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fakes for the session subsystem tests

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Signature};
use fabstir_fhevm_client::config::RelayerNetworkConfig;
use fabstir_fhevm_client::crypto::{SignerError, TypedDataSigner};
use fabstir_fhevm_client::fhevm::{
    ClearValue, EncryptedInput, FhevmInstanceConfig, FhevmSession, Handle, Keypair,
    PublicKeyMaterial, PublicParamsMaterial, RelayerSdk, SdkSource, UserDecryptRequest,
};
use fabstir_fhevm_client::{FhevmError, RpcConnector, RpcTransport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const LOCAL_RPC_URL: &str = "http://localhost:8545";
pub const SEPOLIA_RPC_URL: &str = "https://sepolia.example.org";

pub const MOCK_ACL: &str = "0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D";
pub const MOCK_INPUT_VERIFIER: &str = "0x901F8942346f7AB3a01F6D7613119Bca447Bb030";
pub const MOCK_KMS_VERIFIER: &str = "0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC";

pub fn hardhat_metadata() -> Value {
    json!({
        "ACLAddress": MOCK_ACL,
        "InputVerifierAddress": MOCK_INPUT_VERIFIER,
        "KMSVerifierAddress": MOCK_KMS_VERIFIER
    })
}

#[derive(Clone)]
pub enum Reply {
    Ok(Value),
    Fail(String),
}

/// JSON-RPC transport answering from a fixed script
#[derive(Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, method: &str, value: Value) -> Self {
        self.replies.insert(method.to_string(), Reply::Ok(value));
        self
    }

    pub fn fail(mut self, method: &str, reason: &str) -> Self {
        self.replies
            .insert(method.to_string(), Reply::Fail(reason.to_string()));
        self
    }

    /// Node on `chain_id` with no FHE support
    pub fn chain(chain_id: u64) -> Self {
        Self::new().reply("eth_chainId", json!(format!("0x{:x}", chain_id)))
    }

    /// Local dev node with FHE metadata
    pub fn hardhat(chain_id: u64) -> Self {
        Self::chain(chain_id)
            .reply("web3_clientVersion", json!("HardhatNetwork/2.22.15/@fhevm/mock-utils"))
            .reply("fhevm_relayer_metadata", hardhat_metadata())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, FhevmError> {
        self.calls.lock().unwrap().push(method.to_string());
        match self.replies.get(method) {
            Some(Reply::Ok(value)) => Ok(value.clone()),
            Some(Reply::Fail(reason)) => Err(FhevmError::Transport {
                method: method.to_string(),
                reason: reason.clone(),
            }),
            None => Err(FhevmError::Transport {
                method: method.to_string(),
                reason: "method not found".to_string(),
            }),
        }
    }
}

/// Connector handing out scripted transports by URL
#[derive(Default)]
pub struct FakeConnector {
    transports: HashMap<String, Arc<ScriptedTransport>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, transport: ScriptedTransport) -> Self {
        self.transports.insert(url.to_string(), Arc::new(transport));
        self
    }

    pub fn transport(&self, url: &str) -> Option<Arc<ScriptedTransport>> {
        self.transports.get(url).cloned()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcConnector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RpcTransport>, FhevmError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.transports.get(url) {
            Some(transport) => Ok(transport.clone() as Arc<dyn RpcTransport>),
            None => Err(FhevmError::Transport {
                method: "connect".to_string(),
                reason: format!("connection refused: {}", url),
            }),
        }
    }
}

pub fn relayer_public_key() -> PublicKeyMaterial {
    PublicKeyMaterial {
        public_key_id: "relayer-pk-1".to_string(),
        public_key: vec![0xaa; 64],
    }
}

pub fn relayer_public_params() -> PublicParamsMaterial {
    PublicParamsMaterial {
        public_params_id: "relayer-crs-2048".to_string(),
        public_params: vec![0xbb; 128],
    }
}

/// Session handed out by `FakeRuntime`; only key material is meaningful
pub struct RelayerSession {
    pub config: FhevmInstanceConfig,
    pub public_key: Option<PublicKeyMaterial>,
    pub public_params: Option<PublicParamsMaterial>,
}

#[async_trait]
impl FhevmSession for RelayerSession {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn acl_address(&self) -> Address {
        self.config.acl_address
    }

    async fn encrypt_inputs(
        &self,
        _contract: Address,
        _user: Address,
        _values: &[ClearValue],
    ) -> Result<EncryptedInput, FhevmError> {
        Err(FhevmError::Session("not available in tests".to_string()))
    }

    fn create_eip712(
        &self,
        _public_key: &str,
        _contract_addresses: &[Address],
        _start_timestamp: u64,
        _duration_days: u64,
    ) -> Result<TypedData, FhevmError> {
        Err(FhevmError::Session("not available in tests".to_string()))
    }

    fn generate_keypair(&self) -> Result<Keypair, FhevmError> {
        Err(FhevmError::Session("not available in tests".to_string()))
    }

    async fn user_decrypt(
        &self,
        _request: &UserDecryptRequest,
    ) -> Result<HashMap<Handle, ClearValue>, FhevmError> {
        Err(FhevmError::Session("not available in tests".to_string()))
    }

    fn public_key(&self) -> Option<PublicKeyMaterial> {
        self.public_key.clone()
    }

    fn public_params(&self, _bits: u32) -> Option<PublicParamsMaterial> {
        self.public_params.clone()
    }
}

/// Relayer runtime with scripted init result, optional init delay and recorded sessions
pub struct FakeRuntime {
    pub init_result: bool,
    pub init_calls: AtomicUsize,
    pub networks: HashMap<u64, RelayerNetworkConfig>,
    pub created: Mutex<Vec<FhevmInstanceConfig>>,
    pub served_key: Option<PublicKeyMaterial>,
    pub served_params: Option<PublicParamsMaterial>,
    pub init_delay: Option<Duration>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        let sepolia = RelayerNetworkConfig::sepolia();
        let mut networks = HashMap::new();
        networks.insert(sepolia.chain_id, sepolia);
        Self {
            init_result: true,
            init_calls: AtomicUsize::new(0),
            networks,
            created: Mutex::new(Vec::new()),
            served_key: Some(relayer_public_key()),
            served_params: Some(relayer_public_params()),
            init_delay: None,
        }
    }

    pub fn refusing_init() -> Self {
        Self {
            init_result: false,
            ..Self::new()
        }
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub fn with_network(mut self, network: RelayerNetworkConfig) -> Self {
        self.networks.insert(network.chain_id, network);
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<FhevmInstanceConfig> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayerSdk for FakeRuntime {
    async fn init(&self) -> Result<bool, FhevmError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.init_result)
    }

    fn network_config(&self, chain_id: u64) -> Option<RelayerNetworkConfig> {
        self.networks.get(&chain_id).cloned()
    }

    async fn create_session(
        &self,
        config: FhevmInstanceConfig,
    ) -> Result<Arc<dyn FhevmSession>, FhevmError> {
        self.created.lock().unwrap().push(config.clone());
        Ok(Arc::new(RelayerSession {
            config,
            public_key: self.served_key.clone(),
            public_params: self.served_params.clone(),
        }))
    }
}

/// Source of a `FakeRuntime`, with optional failures, delay and cancellation
pub struct FakeSdkSource {
    pub runtime: Arc<FakeRuntime>,
    pub fetch_calls: AtomicUsize,
    pub failures_left: AtomicUsize,
    pub delay: Option<Duration>,
    pub cancel_on_fetch: Option<CancellationToken>,
}

impl FakeSdkSource {
    pub fn new(runtime: Arc<FakeRuntime>) -> Self {
        Self {
            runtime,
            fetch_calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: None,
            cancel_on_fetch: None,
        }
    }

    pub fn failing_times(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fire `token` as the fetch completes
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_fetch = Some(token);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SdkSource for FakeSdkSource {
    async fn fetch(&self) -> Result<Arc<dyn RelayerSdk>, FhevmError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(FhevmError::Transport {
                method: "fetch".to_string(),
                reason: "network unreachable".to_string(),
            });
        }

        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }
        Ok(self.runtime.clone() as Arc<dyn RelayerSdk>)
    }
}

/// Real wallet that counts signing requests
pub struct CountingSigner {
    pub wallet: ethers::signers::LocalWallet,
    pub sign_calls: AtomicUsize,
}

impl CountingSigner {
    pub fn random() -> Self {
        Self {
            wallet: ethers::signers::LocalWallet::new(&mut rand::thread_rng()),
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypedDataSigner for CountingSigner {
    fn address(&self) -> Address {
        TypedDataSigner::address(&self.wallet)
    }

    async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature, SignerError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        TypedDataSigner::sign_typed_data(&self.wallet, data).await
    }
}

mockall::mock! {
    pub Wallet {}

    #[async_trait]
    impl TypedDataSigner for Wallet {
        fn address(&self) -> Address;
        async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature, SignerError>;
    }
}
