// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::fhevm::FhevmError;

pub const HARDHAT_CHAIN_ID: u64 = 31337;
pub const HARDHAT_RPC_URL: &str = "http://localhost:8545";
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Chain ids served by a local mock backend, with their default RPC URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockChains(BTreeMap<u64, String>);

impl Default for MockChains {
    fn default() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(HARDHAT_CHAIN_ID, HARDHAT_RPC_URL.to_string());
        MockChains(chains)
    }
}

impl MockChains {
    pub fn empty() -> Self {
        MockChains(BTreeMap::new())
    }

    pub fn insert(&mut self, chain_id: u64, rpc_url: impl Into<String>) {
        self.0.insert(chain_id, rpc_url.into());
    }

    pub fn with(mut self, chain_id: u64, rpc_url: impl Into<String>) -> Self {
        self.insert(chain_id, rpc_url);
        self
    }

    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.0.get(&chain_id).map(String::as_str)
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.0.contains_key(&chain_id)
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.0.keys().copied().collect()
    }

    /// `self` overlaid with `overrides`; entries in `overrides` win
    pub fn merged(&self, overrides: &MockChains) -> MockChains {
        let mut merged = self.0.clone();
        for (chain_id, url) in &overrides.0 {
            merged.insert(*chain_id, url.clone());
        }
        MockChains(merged)
    }

    /// Parse `"31337=http://localhost:8545,1337=http://127.0.0.1:7545"`
    pub fn parse_list(raw: &str) -> Result<MockChains, FhevmError> {
        let mut chains = MockChains::empty();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, url) = entry.split_once('=').ok_or_else(|| {
                FhevmError::InvalidConfig(format!("Mock chain entry '{}' is not ID=URL", entry))
            })?;
            let chain_id = id.trim().parse::<u64>().map_err(|e| {
                FhevmError::InvalidConfig(format!("Invalid mock chain id '{}': {}", id, e))
            })?;
            chains.insert(chain_id, url.trim());
        }
        Ok(chains)
    }
}

/// Built-in configuration of a relayer-served network
///
/// Addresses are kept as the strings the runtime ships with; they are only
/// validated when a Session is about to be created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayerNetworkConfig {
    pub chain_id: u64,
    pub gateway_chain_id: u64,
    pub acl_contract_address: String,
    pub kms_contract_address: String,
    pub input_verifier_contract_address: String,
    pub verifying_contract_address_decryption: String,
    pub verifying_contract_address_input_verification: String,
    pub relayer_url: String,
}

impl RelayerNetworkConfig {
    pub fn sepolia() -> Self {
        RelayerNetworkConfig {
            chain_id: SEPOLIA_CHAIN_ID,
            gateway_chain_id: 55815,
            acl_contract_address: "0x687820221192C5B662b25367F70076A37bc79b6c".to_string(),
            kms_contract_address: "0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC".to_string(),
            input_verifier_contract_address: "0xbc91f3daD1A5F19F8390c400196e58073B6a0BC4"
                .to_string(),
            verifying_contract_address_decryption: "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1"
                .to_string(),
            verifying_contract_address_input_verification:
                "0x7048C39f048125eDa9d678AEbaDfB22F7900a29F".to_string(),
            relayer_url: std::env::var("SEPOLIA_RELAYER_URL")
                .unwrap_or_else(|_| "https://relayer.testnet.zama.cloud".to_string()),
        }
    }

    /// Built-in config for `chain_id`, if the relayer serves it
    pub fn for_chain(chain_id: u64) -> Option<Self> {
        match chain_id {
            SEPOLIA_CHAIN_ID => Some(Self::sepolia()),
            _ => None,
        }
    }

    pub fn acl_address(&self) -> Result<Address, FhevmError> {
        parse_address("ACL", &self.acl_contract_address)
    }

    pub fn decryption_verifier_address(&self) -> Result<Address, FhevmError> {
        parse_address("decryption verifier", &self.verifying_contract_address_decryption)
    }
}

/// Parse a 0x-prefixed 20-byte account address
pub fn parse_address(field: &str, value: &str) -> Result<Address, FhevmError> {
    let invalid = || FhevmError::InvalidAddress {
        field: field.to_string(),
        value: value.to_string(),
    };
    let digits = value.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 {
        return Err(invalid());
    }
    Address::from_str(value).map_err(|_| invalid())
}
