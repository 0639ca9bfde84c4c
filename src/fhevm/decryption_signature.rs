// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decryption authorization signatures
//!
//! A `DecryptionSignature` is a user's EIP-712 signature over an ephemeral
//! public key, a set of contracts and a validity window. It is cached per
//! (user, contract set) and reused until it expires; only then is the user
//! asked to sign again.
//!
//! With `KeyRetention::Persistent` the whole record, ephemeral private key
//! included, goes to the key-value store. Treat that store as sensitive.
//! `KeyRetention::InMemory` keeps records in this manager only.

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::FhevmError;
use super::types::{FhevmSession, HandleContractPair, UserDecryptRequest};
use super::unix_now;
use crate::config::{FhevmConfig, KeyRetention};
use crate::crypto::{keccak256, signature_to_hex, SignerError, TypedDataSigner};
use crate::storage::KeyValueStore;

pub const DEFAULT_DURATION_DAYS: u64 = 365;
const SECONDS_PER_DAY: u64 = 86_400;
const STORAGE_PREFIX: &str = "fhevm.decryptionSignature";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionSignature {
    pub public_key: String,
    pub private_key: String,
    pub signature: String,
    /// Sorted and deduplicated
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl DecryptionSignature {
    /// First second at which the signature is no longer valid
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    /// Exact match on user and on the normalized contract set
    pub fn matches(&self, user: Address, contract_addresses: &[Address]) -> bool {
        self.user_address == user
            && self.contract_addresses == normalize_contract_addresses(contract_addresses)
    }

    pub fn is_usable_for(&self, user: Address, contract_addresses: &[Address], now: u64) -> bool {
        self.matches(user, contract_addresses) && self.is_valid_at(now)
    }

    /// Decryption request for `items` authorized by this signature
    pub fn decrypt_request(&self, items: Vec<HandleContractPair>) -> UserDecryptRequest {
        UserDecryptRequest {
            items,
            private_key: self.private_key.clone(),
            public_key: self.public_key.clone(),
            signature: self.signature.clone(),
            contract_addresses: self.contract_addresses.clone(),
            user_address: self.user_address,
            start_timestamp: self.start_timestamp,
            duration_days: self.duration_days,
        }
    }
}

impl std::fmt::Debug for DecryptionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionSignature")
            .field("public_key", &self.public_key)
            .field("contract_addresses", &self.contract_addresses)
            .field("user_address", &self.user_address)
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_days", &self.duration_days)
            .finish_non_exhaustive()
    }
}

/// Canonical form of a contract set: sorted, no duplicates
pub fn normalize_contract_addresses(addresses: &[Address]) -> Vec<Address> {
    let mut normalized = addresses.to_vec();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Cache key for `(user, contract set)`; `contracts` must be normalized
pub fn storage_key(user: Address, contracts: &[Address]) -> String {
    let mut packed = Vec::with_capacity(contracts.len() * 20);
    for contract in contracts {
        packed.extend_from_slice(contract.as_bytes());
    }
    format!(
        "{}:{:?}:0x{}",
        STORAGE_PREFIX,
        user,
        hex::encode(keccak256(&packed))
    )
}

pub struct DecryptionSignatureManager {
    storage: Option<Arc<dyn KeyValueStore>>,
    duration_days: u64,
    retention: KeyRetention,
    memory: Mutex<HashMap<String, DecryptionSignature>>,
}

impl DecryptionSignatureManager {
    /// Manager with the default 365-day window and persistent retention
    ///
    /// Without `storage`, records live in memory only.
    pub fn new(storage: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self {
            storage,
            duration_days: DEFAULT_DURATION_DAYS,
            retention: KeyRetention::Persistent,
            memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(storage: Option<Arc<dyn KeyValueStore>>, config: &FhevmConfig) -> Self {
        Self::new(storage)
            .with_duration_days(config.decryption_duration_days)
            .with_retention(config.key_retention)
    }

    pub fn with_duration_days(mut self, days: u64) -> Self {
        self.duration_days = days.max(1);
        self
    }

    pub fn with_retention(mut self, retention: KeyRetention) -> Self {
        self.retention = retention;
        self
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    fn persistent_store(&self) -> Option<&Arc<dyn KeyValueStore>> {
        match self.retention {
            KeyRetention::Persistent => self.storage.as_ref(),
            KeyRetention::InMemory => None,
        }
    }

    async fn read(&self, key: &str) -> Option<DecryptionSignature> {
        let Some(store) = self.persistent_store() else {
            return self.memory.lock().await.get(key).cloned();
        };

        match store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Ignoring corrupt decryption signature {}: {}", key, e);
                    None
                }
            },
            // Records whose store write failed are kept in memory
            Ok(None) => self.memory.lock().await.get(key).cloned(),
            Err(e) => {
                warn!("Decryption signature read failed for {}: {}", key, e);
                self.memory.lock().await.get(key).cloned()
            }
        }
    }

    async fn write(&self, key: &str, record: &DecryptionSignature) -> Result<(), FhevmError> {
        match self.persistent_store() {
            Some(store) => {
                let raw = serde_json::to_string(record)?;
                store.put(key, raw).await?;
            }
            None => {
                self.memory
                    .lock()
                    .await
                    .insert(key.to_string(), record.clone());
            }
        }
        Ok(())
    }

    /// Stored signature for `(user, contracts)`, valid or not
    pub async fn load(
        &self,
        user: Address,
        contract_addresses: &[Address],
    ) -> Option<DecryptionSignature> {
        let normalized = normalize_contract_addresses(contract_addresses);
        self.read(&storage_key(user, &normalized)).await
    }

    /// Forget the stored signature for `(user, contracts)`
    pub async fn clear(
        &self,
        user: Address,
        contract_addresses: &[Address],
    ) -> Result<(), FhevmError> {
        let normalized = normalize_contract_addresses(contract_addresses);
        let key = storage_key(user, &normalized);
        self.memory.lock().await.remove(&key);
        if let Some(store) = self.persistent_store() {
            store.remove(&key).await?;
        }
        Ok(())
    }

    /// Reuse a valid cached signature, or ask `signer` for a new one
    ///
    /// Returns `Ok(None)` when the wallet declines or fails to sign; the
    /// caller cannot decrypt until the user signs.
    pub async fn load_or_sign(
        &self,
        session: &dyn FhevmSession,
        contract_addresses: &[Address],
        signer: &dyn TypedDataSigner,
    ) -> Result<Option<DecryptionSignature>, FhevmError> {
        if contract_addresses.is_empty() {
            return Err(FhevmError::InvalidArgument(
                "at least one contract address is required".to_string(),
            ));
        }

        let user = signer.address();
        let normalized = normalize_contract_addresses(contract_addresses);
        let key = storage_key(user, &normalized);

        if let Some(cached) = self.read(&key).await {
            if cached.is_usable_for(user, &normalized, unix_now()) {
                debug!("Reusing decryption signature for {:?}", user);
                return Ok(Some(cached));
            }
            debug!(
                "Cached decryption signature for {:?} is expired or mismatched",
                user
            );
        }

        let keypair = session.generate_keypair()?;
        let start_timestamp = unix_now();
        let typed_data = session.create_eip712(
            &keypair.public_key,
            &normalized,
            start_timestamp,
            self.duration_days,
        )?;

        let signature = match signer.sign_typed_data(&typed_data).await {
            Ok(signature) => signature,
            Err(SignerError::Rejected) => {
                info!("User {:?} declined to sign decryption request", user);
                return Ok(None);
            }
            Err(e) => {
                warn!("Decryption request signing failed for {:?}: {}", user, e);
                return Ok(None);
            }
        };

        let record = DecryptionSignature {
            public_key: keypair.public_key,
            private_key: keypair.private_key,
            signature: signature_to_hex(&signature),
            contract_addresses: normalized,
            user_address: user,
            start_timestamp,
            duration_days: self.duration_days,
        };

        if let Err(e) = self.write(&key, &record).await {
            warn!("Failed to store decryption signature for {:?}: {}", user, e);
            self.memory.lock().await.insert(key, record.clone());
        }
        info!(
            "New decryption signature for {:?} ({} contracts)",
            user,
            record.contract_addresses.len()
        );
        Ok(Some(record))
    }
}

impl std::fmt::Debug for DecryptionSignatureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionSignatureManager")
            .field("persistent", &self.storage.is_some())
            .field("duration_days", &self.duration_days)
            .field("retention", &self.retention)
            .finish()
    }
}
