// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Signature Recovery
//!
//! Recovers Ethereum addresses from 65-byte ECDSA signatures over a 32-byte
//! digest. The mock backend uses this to check that a user-decrypt
//! authorization was really signed by the user it names.

use ethers::types::Address;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid signature size: expected 65 bytes, got {0}")]
    InvalidSize(usize),

    #[error("Invalid recovery ID: expected 0-3, got {0}")]
    InvalidRecoveryId(u8),

    #[error("Invalid signature encoding: {0}")]
    InvalidEncoding(String),

    #[error("Failed to recover public key: {0}")]
    RecoveryFailed(String),
}

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut hash);
    hash
}

/// Ethereum address of a secp256k1 verifying key
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let public_key = key.to_encoded_point(false);
    // Skip the 0x04 prefix byte
    let hash = keccak256(&public_key.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Decode a 0x-prefixed (or bare) hex signature
pub fn parse_signature_hex(signature: &str) -> Result<Vec<u8>, SignatureError> {
    let digits = signature.strip_prefix("0x").unwrap_or(signature);
    hex::decode(digits).map_err(|e| SignatureError::InvalidEncoding(e.to_string()))
}

/// Recover the signer of `digest` from a 65-byte r || s || v signature
pub fn recover_signer(signature: &[u8], digest: &[u8; 32]) -> Result<Address, SignatureError> {
    if signature.len() != 65 {
        return Err(SignatureError::InvalidSize(signature.len()));
    }

    let mut recovery_id = signature[64];
    // Normalize Ethereum-style 27/28
    if recovery_id >= 27 {
        recovery_id -= 27;
    }
    if recovery_id > 3 {
        return Err(SignatureError::InvalidRecoveryId(recovery_id));
    }

    let recovery_id = RecoveryId::try_from(recovery_id)
        .map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
    let signature = Signature::try_from(&signature[..64])
        .map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;

    let verifying_key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))?;

    Ok(address_from_verifying_key(&verifying_key))
}
