// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for FHE session creation, input encryption and user decryption
//!
//! Variants follow four families:
//! - Configuration errors (malformed address, unsupported chain) are fatal
//! - Transport errors (RPC failures, timeouts) are retryable by re-running the flow
//! - Initialization errors (runtime load/init) are fatal for the attempt, retryable
//! - `Aborted` is a cancelled attempt and is not a failure
//!
//! A user declining to sign is not an error at all: the signature manager
//! reports it as `Ok(None)`.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised by the FHE client session subsystem
#[derive(Error, Debug)]
pub enum FhevmError {
    /// An on-chain address failed validation
    #[error("Invalid {field} address: {value}")]
    InvalidAddress { field: String, value: String },

    /// The initialized runtime has no built-in network config for the chain
    #[error("Chain {chain_id} is not supported by the relayer runtime")]
    UnsupportedChain { chain_id: u64 },

    /// Configuration could not be parsed or is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller passed an argument the operation cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON-RPC call failed at the transport level
    #[error("RPC call {method} failed: {reason}")]
    Transport { method: String, reason: String },

    /// JSON-RPC call did not answer within the configured bound
    #[error("RPC call {method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The remote encryption runtime could not be fetched
    #[error("Failed to load relayer runtime: {0}")]
    SdkLoadFailed(String),

    /// The remote encryption runtime refused to initialize
    #[error("Failed to initialize relayer runtime: {0}")]
    SdkInitFailed(String),

    /// The cancellation signal fired while the operation was in flight
    #[error("Operation aborted")]
    Aborted,

    /// `finalize` was called twice, or a value was added after it
    #[error("Encrypted input has already been finalized")]
    InputAlreadyFinalized,

    /// A plaintext does not fit in the requested bit width
    #[error("Value does not fit in {bits} bits")]
    ValueOutOfRange { bits: u16 },

    /// The packed width of all values exceeds what one input proof can carry
    #[error("Encrypted input exceeds {limit} bits (requested {requested})")]
    InputCapacityExceeded { limit: u32, requested: u32 },

    /// The encryption backend failed an operation
    #[error("Session error: {0}")]
    Session(String),

    /// The backend refused a user decryption request
    #[error("Decryption rejected: {0}")]
    DecryptionRejected(String),

    /// Persistent storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored or received payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FhevmError {
    fn from(err: serde_json::Error) -> Self {
        FhevmError::Serialization(err.to_string())
    }
}

impl FhevmError {
    /// Stable error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            FhevmError::InvalidAddress { .. } => "INVALID_ADDRESS",
            FhevmError::UnsupportedChain { .. } => "UNSUPPORTED_CHAIN",
            FhevmError::InvalidConfig(_) => "INVALID_CONFIG",
            FhevmError::InvalidArgument(_) => "INVALID_ARGUMENT",
            FhevmError::Transport { .. } => "TRANSPORT_ERROR",
            FhevmError::Timeout { .. } => "TIMEOUT",
            FhevmError::SdkLoadFailed(_) => "SDK_LOAD_FAILED",
            FhevmError::SdkInitFailed(_) => "SDK_INIT_FAILED",
            FhevmError::Aborted => "ABORTED",
            FhevmError::InputAlreadyFinalized => "INPUT_ALREADY_FINALIZED",
            FhevmError::ValueOutOfRange { .. } => "VALUE_OUT_OF_RANGE",
            FhevmError::InputCapacityExceeded { .. } => "INPUT_CAPACITY_EXCEEDED",
            FhevmError::Session(_) => "SESSION_ERROR",
            FhevmError::DecryptionRejected(_) => "DECRYPTION_REJECTED",
            FhevmError::Storage(_) => "STORAGE_ERROR",
            FhevmError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether re-invoking the whole session-creation flow may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FhevmError::Transport { .. }
                | FhevmError::Timeout { .. }
                | FhevmError::SdkLoadFailed(_)
                | FhevmError::SdkInitFailed(_)
        )
    }

    /// Whether the error can only be fixed by changing configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FhevmError::InvalidAddress { .. }
                | FhevmError::UnsupportedChain { .. }
                | FhevmError::InvalidConfig(_)
        )
    }

    /// Cancelled attempts are reported through this variant only
    pub fn is_aborted(&self) -> bool {
        matches!(self, FhevmError::Aborted)
    }

    pub(crate) fn transport(method: &str, reason: impl ToString) -> Self {
        FhevmError::Transport {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}
