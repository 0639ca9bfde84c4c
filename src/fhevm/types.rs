// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session contract and the value types that cross it
//!
//! A Session is bound to one chain and one ACL address. It is created by
//! `FhevmInstanceFactory` and must be dropped and re-created when the chain
//! or account changes.

use async_trait::async_trait;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::FhevmError;
use crate::config::RelayerNetworkConfig;
use crate::rpc::NetworkTarget;

/// Opaque on-chain reference to an encrypted value
pub type Handle = H256;

/// Public params are requested for this packing size
pub const PUBLIC_PARAMS_BITS: u32 = 2048;

/// Encrypted types understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FheType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
    Address,
    Uint256,
}

impl FheType {
    pub fn bits(&self) -> u16 {
        match self {
            FheType::Bool => 2,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Address => 160,
            FheType::Uint256 => 256,
        }
    }

    /// Type byte embedded in ciphertext handles
    pub fn type_code(&self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint8 => 2,
            FheType::Uint16 => 3,
            FheType::Uint32 => 4,
            FheType::Uint64 => 5,
            FheType::Uint128 => 6,
            FheType::Address => 7,
            FheType::Uint256 => 8,
        }
    }

    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FheType::Bool),
            2 => Some(FheType::Uint8),
            3 => Some(FheType::Uint16),
            4 => Some(FheType::Uint32),
            5 => Some(FheType::Uint64),
            6 => Some(FheType::Uint128),
            7 => Some(FheType::Address),
            8 => Some(FheType::Uint256),
            _ => None,
        }
    }

    pub(crate) fn uint_for_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(FheType::Uint8),
            16 => Some(FheType::Uint16),
            32 => Some(FheType::Uint32),
            64 => Some(FheType::Uint64),
            128 => Some(FheType::Uint128),
            256 => Some(FheType::Uint256),
            _ => None,
        }
    }
}

/// A plaintext on its way into, or out of, the encryption backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearValue {
    Bool(bool),
    Uint { ty: FheType, value: U256 },
    Address(Address),
}

impl ClearValue {
    pub fn fhe_type(&self) -> FheType {
        match self {
            ClearValue::Bool(_) => FheType::Bool,
            ClearValue::Uint { ty, .. } => *ty,
            ClearValue::Address(_) => FheType::Address,
        }
    }

    /// Numeric view; booleans are 0/1 and addresses their 160-bit integer
    pub fn as_u256(&self) -> U256 {
        match self {
            ClearValue::Bool(b) => U256::from(*b as u8),
            ClearValue::Uint { value, .. } => *value,
            ClearValue::Address(a) => U256::from_big_endian(a.as_bytes()),
        }
    }
}

/// Ciphertext handles plus the proof that binds them to one (contract, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handles: Vec<Handle>,
    pub input_proof: Bytes,
}

/// Ephemeral keypair used for one decryption authorization, hex without 0x
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keypair {
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyMaterial {
    pub public_key_id: String,
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicParamsMaterial {
    pub public_params_id: String,
    #[serde(with = "base64_bytes")]
    pub public_params: Vec<u8>,
}

/// Everything a relayer runtime needs to build a Session
#[derive(Debug, Clone)]
pub struct FhevmInstanceConfig {
    pub network: RelayerNetworkConfig,
    pub acl_address: Address,
    pub chain_id: u64,
    pub target: NetworkTarget,
    pub public_key: Option<PublicKeyMaterial>,
    pub public_params: Option<PublicParamsMaterial>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract_address: Address,
}

/// Arguments of a user decryption, usually built from a `DecryptionSignature`
#[derive(Clone)]
pub struct UserDecryptRequest {
    pub items: Vec<HandleContractPair>,
    pub private_key: String,
    pub public_key: String,
    pub signature: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl std::fmt::Debug for UserDecryptRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDecryptRequest")
            .field("items", &self.items)
            .field("contract_addresses", &self.contract_addresses)
            .field("user_address", &self.user_address)
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_days", &self.duration_days)
            .finish_non_exhaustive()
    }
}

/// An encryption backend bound to one chain/ACL configuration
#[async_trait]
pub trait FhevmSession: Send + Sync {
    fn chain_id(&self) -> u64;

    fn acl_address(&self) -> Address;

    /// Encrypt `values` for `contract` on behalf of `user`, in order
    async fn encrypt_inputs(
        &self,
        contract: Address,
        user: Address,
        values: &[ClearValue],
    ) -> Result<EncryptedInput, FhevmError>;

    /// Typed data the user signs to authorize decryption for `contract_addresses`
    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<TypedData, FhevmError>;

    fn generate_keypair(&self) -> Result<Keypair, FhevmError>;

    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<HashMap<Handle, ClearValue>, FhevmError>;

    fn public_key(&self) -> Option<PublicKeyMaterial>;

    fn public_params(&self, bits: u32) -> Option<PublicParamsMaterial>;
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
