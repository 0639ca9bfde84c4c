// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wallet seam for EIP-712 signing
//!
//! Any `ethers` signer (local wallet, hardware wallet, ...) can sign a
//! decryption authorization. Interactive wallets report a declined prompt as
//! `SignerError::Rejected`.

use async_trait::async_trait;
use ethers::signers::Signer;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Signature};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("User rejected the signing request")]
    Rejected,

    #[error("Signing failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    /// Account the signature will be attributed to
    fn address(&self) -> Address;

    async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature, SignerError>;
}

#[async_trait]
impl<S> TypedDataSigner for S
where
    S: Signer + Send + Sync,
{
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_typed_data(&self, data: &TypedData) -> Result<Signature, SignerError> {
        Signer::sign_typed_data(self, data)
            .await
            .map_err(|e| SignerError::Failed(e.to_string()))
    }
}

/// 0x-prefixed hex of the 65-byte r || s || v encoding
pub fn signature_to_hex(signature: &Signature) -> String {
    format!("0x{}", hex::encode(signature.to_vec()))
}
