// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process mock encryption backend
//!
//! Used against local dev nodes that expose FHE metadata. Plaintexts never
//! leave the process: "ciphertexts" are entries in a registry keyed by
//! handle, each carrying the accounts allowed to read it. Handles and input
//! proofs use the same layout as the real backend so contract-side checks
//! can be exercised locally.
//!
//! Handle layout (32 bytes):
//! - `[0..21]`  keccak(seed || index) prefix
//! - `[21]`     index of the value within its input
//! - `[22..30]` chain id, big endian
//! - `[30]`     FHE type code
//! - `[31]`     handle version
//!
//! Input proof: `count (u16 BE) || handles || keccak(chainId || contract || user || handles)`.

use async_trait::async_trait;
use ethers::types::transaction::eip712::{Eip712, TypedData};
use ethers::types::{Address, Bytes, H256};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::discovery::BackendMetadata;
use super::eip712::user_decrypt_typed_data;
use super::error::FhevmError;
use super::types::{
    ClearValue, EncryptedInput, FheType, FhevmSession, Handle, Keypair, PublicKeyMaterial,
    PublicParamsMaterial, UserDecryptRequest,
};
use super::unix_now;
use crate::crypto::{keccak256, parse_signature_hex, recover_signer};

pub const HANDLE_VERSION: u8 = 0;
/// Most values one encrypted input can carry
pub const MAX_INPUT_VALUES: usize = 256;
const SECONDS_PER_DAY: u64 = 86_400;
const RESULT_INDEX: u8 = 0xff;

/// What the factory hands to a mock backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSessionConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub metadata: BackendMetadata,
}

struct Ciphertext {
    value: ClearValue,
    allowed: HashSet<Address>,
}

pub struct MockSession {
    config: MockSessionConfig,
    registry: RwLock<HashMap<Handle, Ciphertext>>,
}

impl MockSession {
    pub fn new(config: MockSessionConfig) -> Self {
        debug!(
            "Creating mock session for chain {} at {}",
            config.chain_id, config.rpc_url
        );
        Self {
            config,
            registry: RwLock::new(HashMap::new()),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.config.rpc_url
    }

    pub fn metadata(&self) -> &BackendMetadata {
        &self.config.metadata
    }

    fn handle(&self, seed: &[u8; 32], index: u8, ty: FheType) -> Handle {
        let mut preimage = seed.to_vec();
        preimage.push(index);
        let hash = keccak256(&preimage);

        let mut bytes = [0u8; 32];
        bytes[..21].copy_from_slice(&hash[..21]);
        bytes[21] = index;
        bytes[22..30].copy_from_slice(&self.config.chain_id.to_be_bytes());
        bytes[30] = ty.type_code();
        bytes[31] = HANDLE_VERSION;
        H256(bytes)
    }

    fn random_seed(&self, contract: Address, user: Address) -> [u8; 32] {
        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);

        let mut preimage = Vec::with_capacity(20 * 3 + 8 + 32);
        preimage.extend_from_slice(self.config.metadata.acl_address.as_bytes());
        preimage.extend_from_slice(&self.config.chain_id.to_be_bytes());
        preimage.extend_from_slice(contract.as_bytes());
        preimage.extend_from_slice(user.as_bytes());
        preimage.extend_from_slice(&nonce);
        keccak256(&preimage)
    }

    fn proof_digest(&self, contract: Address, user: Address, handles: &[Handle]) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(8 + 40 + handles.len() * 32);
        preimage.extend_from_slice(&self.config.chain_id.to_be_bytes());
        preimage.extend_from_slice(contract.as_bytes());
        preimage.extend_from_slice(user.as_bytes());
        for handle in handles {
            preimage.extend_from_slice(handle.as_bytes());
        }
        keccak256(&preimage)
    }

    /// Contract-side check of an input proof; on success the contract may use the handles
    pub async fn verify_input(
        &self,
        contract: Address,
        user: Address,
        input: &EncryptedInput,
    ) -> Result<(), FhevmError> {
        let proof = input.input_proof.as_ref();
        let rejected = |reason: &str| FhevmError::Session(format!("Input proof rejected: {}", reason));

        if proof.len() < 2 {
            return Err(rejected("truncated"));
        }
        let count = u16::from_be_bytes([proof[0], proof[1]]) as usize;
        if proof.len() != 2 + count * 32 + 32 || count != input.handles.len() {
            return Err(rejected("length mismatch"));
        }

        let proven: Vec<Handle> = proof[2..2 + count * 32]
            .chunks(32)
            .map(H256::from_slice)
            .collect();
        if proven != input.handles {
            return Err(rejected("handles differ from proof"));
        }
        if proof[2 + count * 32..] != self.proof_digest(contract, user, &proven)[..] {
            return Err(rejected("not bound to this contract and user"));
        }

        let mut registry = self.registry.write().await;
        for handle in &proven {
            let entry = registry
                .get_mut(handle)
                .ok_or_else(|| rejected("unknown handle"))?;
            entry.allowed.insert(contract);
        }
        Ok(())
    }

    /// Grant `account` access to `handle`, as an ACL `allow` call would
    pub async fn allow(&self, handle: Handle, account: Address) -> Result<(), FhevmError> {
        let mut registry = self.registry.write().await;
        let entry = registry
            .get_mut(&handle)
            .ok_or_else(|| FhevmError::Session(format!("Unknown handle {:?}", handle)))?;
        entry.allowed.insert(account);
        Ok(())
    }

    /// Store a value computed on-chain and return its handle
    pub async fn register_result(&self, value: ClearValue, allowed: &[Address]) -> Handle {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let handle = self.handle(&seed, RESULT_INDEX, value.fhe_type());

        self.registry.write().await.insert(
            handle,
            Ciphertext {
                value,
                allowed: allowed.iter().copied().collect(),
            },
        );
        handle
    }

    fn check_keypair(request: &UserDecryptRequest) -> Result<(), FhevmError> {
        let private = hex::decode(request.private_key.trim_start_matches("0x"))
            .map_err(|_| FhevmError::DecryptionRejected("malformed private key".to_string()))?;
        let key = SigningKey::from_slice(&private)
            .map_err(|_| FhevmError::DecryptionRejected("malformed private key".to_string()))?;
        let derived = hex::encode(key.verifying_key().to_encoded_point(true).as_bytes());

        if !derived.eq_ignore_ascii_case(request.public_key.trim_start_matches("0x")) {
            return Err(FhevmError::DecryptionRejected(
                "private key does not match public key".to_string(),
            ));
        }
        Ok(())
    }

    fn check_signature(&self, request: &UserDecryptRequest) -> Result<(), FhevmError> {
        let typed = self.create_eip712(
            &request.public_key,
            &request.contract_addresses,
            request.start_timestamp,
            request.duration_days,
        )?;
        let digest = typed
            .encode_eip712()
            .map_err(|e| FhevmError::Serialization(e.to_string()))?;
        let signature = parse_signature_hex(&request.signature)
            .map_err(|e| FhevmError::DecryptionRejected(e.to_string()))?;
        let signer = recover_signer(&signature, &digest)
            .map_err(|e| FhevmError::DecryptionRejected(e.to_string()))?;

        if signer != request.user_address {
            return Err(FhevmError::DecryptionRejected(format!(
                "signature was made by {:?}, not {:?}",
                signer, request.user_address
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FhevmSession for MockSession {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn acl_address(&self) -> Address {
        self.config.metadata.acl_address
    }

    async fn encrypt_inputs(
        &self,
        contract: Address,
        user: Address,
        values: &[ClearValue],
    ) -> Result<EncryptedInput, FhevmError> {
        if values.is_empty() {
            return Err(FhevmError::InvalidArgument(
                "encrypted input has no values".to_string(),
            ));
        }
        if values.len() > MAX_INPUT_VALUES {
            return Err(FhevmError::InvalidArgument(format!(
                "encrypted input holds at most {} values",
                MAX_INPUT_VALUES
            )));
        }

        let seed = self.random_seed(contract, user);
        let handles: Vec<Handle> = values
            .iter()
            .enumerate()
            .map(|(index, value)| self.handle(&seed, index as u8, value.fhe_type()))
            .collect();

        let mut proof = Vec::with_capacity(2 + handles.len() * 32 + 32);
        proof.extend_from_slice(&(handles.len() as u16).to_be_bytes());
        for handle in &handles {
            proof.extend_from_slice(handle.as_bytes());
        }
        proof.extend_from_slice(&self.proof_digest(contract, user, &handles));

        let mut registry = self.registry.write().await;
        for (handle, value) in handles.iter().zip(values) {
            registry.insert(
                *handle,
                Ciphertext {
                    value: value.clone(),
                    allowed: HashSet::new(),
                },
            );
        }

        debug!(
            "Encrypted {} values for contract {:?} / user {:?}",
            handles.len(),
            contract,
            user
        );
        Ok(EncryptedInput {
            handles,
            input_proof: Bytes::from(proof),
        })
    }

    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<TypedData, FhevmError> {
        // Local nodes act as their own gateway
        user_decrypt_typed_data(
            public_key,
            contract_addresses,
            self.config.chain_id,
            start_timestamp,
            duration_days,
            self.config.chain_id,
            self.config.metadata.kms_verifier_address,
        )
    }

    fn generate_keypair(&self) -> Result<Keypair, FhevmError> {
        let key = SigningKey::random(&mut OsRng);
        Ok(Keypair {
            public_key: hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
            private_key: hex::encode(key.to_bytes()),
        })
    }

    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<HashMap<Handle, ClearValue>, FhevmError> {
        if request.items.is_empty() {
            return Err(FhevmError::InvalidArgument("no handles to decrypt".to_string()));
        }

        let now = unix_now();
        let expires = request
            .start_timestamp
            .saturating_add(request.duration_days.saturating_mul(SECONDS_PER_DAY));
        if now < request.start_timestamp || now >= expires {
            return Err(FhevmError::DecryptionRejected(
                "request is outside its validity window".to_string(),
            ));
        }

        Self::check_keypair(request)?;
        self.check_signature(request)?;

        let registry = self.registry.read().await;
        let mut results = HashMap::with_capacity(request.items.len());
        for item in &request.items {
            if !request.contract_addresses.contains(&item.contract_address) {
                return Err(FhevmError::DecryptionRejected(format!(
                    "contract {:?} is not covered by the signature",
                    item.contract_address
                )));
            }
            let entry = registry.get(&item.handle).ok_or_else(|| {
                FhevmError::DecryptionRejected(format!("unknown handle {:?}", item.handle))
            })?;
            if !entry.allowed.contains(&request.user_address)
                || !entry.allowed.contains(&item.contract_address)
            {
                warn!("ACL denies decryption of {:?}", item.handle);
                return Err(FhevmError::DecryptionRejected(format!(
                    "handle {:?} is not allowed for this user and contract",
                    item.handle
                )));
            }
            results.insert(item.handle, entry.value.clone());
        }
        Ok(results)
    }

    fn public_key(&self) -> Option<PublicKeyMaterial> {
        None
    }

    fn public_params(&self, _bits: u32) -> Option<PublicParamsMaterial> {
        None
    }
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
