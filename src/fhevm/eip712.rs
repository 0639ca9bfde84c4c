// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! EIP-712 typed data authorizing a user decryption
//!
//! The wallet signs a `UserDecryptRequestVerification` that binds an
//! ephemeral public key to a set of contracts and a validity window. The
//! decryption service re-derives the same digest to check the signature.

use ethers::types::transaction::eip712::TypedData;
use ethers::types::Address;
use ethers::utils::to_checksum;
use serde_json::json;

use super::error::FhevmError;

pub const DOMAIN_NAME: &str = "Decryption";
pub const DOMAIN_VERSION: &str = "1";
pub const USER_DECRYPT_PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

/// Build the typed data a user signs to allow decryption under `public_key`
///
/// `public_key` is hex with or without the 0x prefix. `contracts_chain_id`
/// is the chain hosting the contracts; `gateway_chain_id` and
/// `verifying_contract` form the signing domain.
pub fn user_decrypt_typed_data(
    public_key: &str,
    contract_addresses: &[Address],
    contracts_chain_id: u64,
    start_timestamp: u64,
    duration_days: u64,
    gateway_chain_id: u64,
    verifying_contract: Address,
) -> Result<TypedData, FhevmError> {
    let digits = public_key.strip_prefix("0x").unwrap_or(public_key);
    if digits.is_empty() || hex::decode(digits).is_err() {
        return Err(FhevmError::InvalidArgument(
            "public key must be non-empty hex".to_string(),
        ));
    }
    if contract_addresses.is_empty() {
        return Err(FhevmError::InvalidArgument(
            "at least one contract address is required".to_string(),
        ));
    }
    if duration_days == 0 {
        return Err(FhevmError::InvalidArgument(
            "duration must be at least one day".to_string(),
        ));
    }

    let contracts: Vec<String> = contract_addresses
        .iter()
        .map(|address| to_checksum(address, None))
        .collect();

    let value = json!({
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"},
                {"name": "verifyingContract", "type": "address"}
            ],
            USER_DECRYPT_PRIMARY_TYPE: [
                {"name": "publicKey", "type": "bytes"},
                {"name": "contractAddresses", "type": "address[]"},
                {"name": "contractsChainId", "type": "uint256"},
                {"name": "startTimestamp", "type": "uint256"},
                {"name": "durationDays", "type": "uint256"}
            ]
        },
        "primaryType": USER_DECRYPT_PRIMARY_TYPE,
        "domain": {
            "name": DOMAIN_NAME,
            "version": DOMAIN_VERSION,
            "chainId": gateway_chain_id,
            "verifyingContract": to_checksum(&verifying_contract, None)
        },
        "message": {
            "publicKey": format!("0x{}", digits),
            "contractAddresses": contracts,
            "contractsChainId": contracts_chain_id.to_string(),
            "startTimestamp": start_timestamp.to_string(),
            "durationDays": duration_days.to_string()
        }
    });

    Ok(serde_json::from_value(value)?)
}
