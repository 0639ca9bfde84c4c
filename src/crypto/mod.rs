// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Signing primitives for decryption authorization
//!
//! - **Signer**: wallet seam producing EIP-712 signatures
//! - **Signature**: ECDSA recovery of the signing address (secp256k1 + Keccak-256)

pub mod signature;
pub mod signer;

pub use signature::{keccak256, parse_signature_hex, recover_signer, SignatureError};
pub use signer::{signature_to_hex, SignerError, TypedDataSigner};
