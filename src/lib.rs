// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod contracts;
pub mod crypto;
pub mod fhevm;
pub mod rpc;
pub mod storage;
pub mod version;

// Re-export the session entry points
pub use config::{FhevmConfig, KeyRetention, MockChains, RelayerNetworkConfig};
pub use fhevm::{
    create_encrypted_input, BackendMetadata, ClearValue, CreateSessionParams,
    DecryptionSignature, DecryptionSignatureManager, Discovery, EncryptedInput,
    EncryptedInputBuilder, FhevmError, FhevmInstanceFactory, FhevmSession, ResolvedEnvironment,
    SdkLoader, SessionStatus, StatusNotifier,
};
pub use rpc::{HttpConnector, NetworkTarget, RpcConnector, RpcTransport};
pub use storage::{FileStore, InMemoryStore, KeyValueStore, PublicKeyStorage, StorageError};
