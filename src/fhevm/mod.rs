// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! FHE client sessions
//!
//! Creates encryption Sessions bound to one chain (mock backend on local dev
//! nodes, relayer runtime elsewhere), builds encrypted contract inputs and
//! manages the signatures that authorize user decryption.
//!
//! ## Components
//!
//! - **resolver**: classifies a network target as mock or remote
//! - **discovery**: probes a local node for FHE metadata
//! - **sdk_loader**: loads and initializes the relayer runtime once
//! - **factory**: orchestrates the above into a ready Session
//! - **input**: encrypted input builder
//! - **decryption_signature**: cached EIP-712 decryption authorizations
//! - **status**: ordered progress notifications
//! - **mock**: in-process backend for local dev nodes

pub mod decryption_signature;
pub mod discovery;
pub mod eip712;
pub mod error;
pub mod factory;
pub mod input;
pub mod mock;
pub mod resolver;
pub mod sdk_loader;
pub mod status;
pub mod types;

pub use decryption_signature::{
    normalize_contract_addresses, DecryptionSignature, DecryptionSignatureManager,
};
pub use discovery::{discover, AbsentReason, BackendMetadata, Discovery};
pub use error::FhevmError;
pub use factory::{
    CreateSessionParams, FhevmInstanceFactory, InProcessMockBackend, MockBackendFactory,
};
pub use input::{create_encrypted_input, EncryptedInputBuilder};
pub use mock::{MockSession, MockSessionConfig};
pub use resolver::{resolve, ResolvedEnvironment};
pub use sdk_loader::{RelayerSdk, SdkLoader, SdkSource};
pub use status::{SessionStatus, StatusNotifier};
pub use types::{
    ClearValue, EncryptedInput, FheType, FhevmInstanceConfig, FhevmSession, Handle,
    HandleContractPair, Keypair, PublicKeyMaterial, PublicParamsMaterial, UserDecryptRequest,
    PUBLIC_PARAMS_BITS,
};

/// Current Unix time in seconds
pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
