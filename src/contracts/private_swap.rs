// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Private swap quotes
//!
//! Amounts and slippage are encrypted client-side and submitted as handles
//! plus an input proof. The contract stores the encrypted quote per user;
//! the user reads it back through an authorized user decryption.

use anyhow::{anyhow, Result};
use ethers::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

use crate::crypto::TypedDataSigner;
use crate::fhevm::{
    create_encrypted_input, DecryptionSignatureManager, FhevmSession, HandleContractPair,
};

/// The contract reports quotes as numerators over this scale
pub const QUOTE_SCALE: u64 = 100_000_000;

abigen!(
    PrivateSwap,
    r#"[
        {
            "anonymous": false,
            "inputs": [],
            "name": "PricesUpdated",
            "type": "event"
        },
        {
            "anonymous": false,
            "inputs": [{"indexed": true, "internalType": "address", "name": "user", "type": "address"}],
            "name": "Quoted",
            "type": "event"
        },
        {
            "inputs": [{"internalType": "address", "name": "user", "type": "address"}],
            "name": "getLastQuoteHandle",
            "outputs": [{"internalType": "euint64", "name": "", "type": "bytes32"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "getPrices",
            "outputs": [
                {"internalType": "euint32", "name": "", "type": "bytes32"},
                {"internalType": "euint32", "name": "", "type": "bytes32"}
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "uint32", "name": "priceAtoB_1e4", "type": "uint32"},
                {"internalType": "uint32", "name": "priceBtoA_1e4", "type": "uint32"}
            ],
            "name": "initPrices",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "protocolId",
            "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
            "stateMutability": "pure",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "externalEuint32", "name": "amountIn_encrypted", "type": "bytes32"},
                {"internalType": "externalEuint32", "name": "maxSlippagePpm_encrypted", "type": "bytes32"},
                {"internalType": "bytes", "name": "inputProof", "type": "bytes"}
            ],
            "name": "quoteAtoB",
            "outputs": [{"internalType": "euint64", "name": "", "type": "bytes32"}],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "externalEuint32", "name": "amountIn_encrypted", "type": "bytes32"},
                {"internalType": "externalEuint32", "name": "maxSlippagePpm_encrypted", "type": "bytes32"},
                {"internalType": "bytes", "name": "inputProof", "type": "bytes"}
            ],
            "name": "quoteBtoA",
            "outputs": [{"internalType": "euint64", "name": "", "type": "bytes32"}],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "externalEuint32", "name": "priceAtoB_encrypted", "type": "bytes32"},
                {"internalType": "externalEuint32", "name": "priceBtoA_encrypted", "type": "bytes32"},
                {"internalType": "bytes", "name": "inputProof", "type": "bytes"}
            ],
            "name": "setPrices",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]"#
);

/// Swap direction of a quote request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDirection {
    AtoB,
    BtoA,
}

impl QuoteDirection {
    fn function_name(&self) -> &'static str {
        match self {
            QuoteDirection::AtoB => "quoteAtoB",
            QuoteDirection::BtoA => "quoteBtoA",
        }
    }
}

/// Handles and proof for a two-value encrypted call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPair {
    pub first: [u8; 32],
    pub second: [u8; 32],
    pub input_proof: Bytes,
}

/// Encrypt `(a, b)` as two u32 values for `contract` on behalf of `user`
pub async fn encrypt_u32_pair(
    session: &Arc<dyn FhevmSession>,
    contract: Address,
    user: Address,
    a: u32,
    b: u32,
) -> Result<EncryptedPair> {
    let mut input = create_encrypted_input(session, contract, user);
    input.add32(a)?.add32(b)?;
    let encrypted = input.finalize().await?;

    match encrypted.handles.as_slice() {
        [first, second] => Ok(EncryptedPair {
            first: first.0,
            second: second.0,
            input_proof: encrypted.input_proof,
        }),
        other => Err(anyhow!("expected 2 handles, got {}", other.len())),
    }
}

/// Numerator reported by the contract, divided down to a plain amount
pub fn scale_quote(numerator: U256) -> U256 {
    numerator / U256::from(QUOTE_SCALE)
}

pub struct PrivateSwapClient<M: Middleware> {
    contract: PrivateSwap<M>,
    session: Arc<dyn FhevmSession>,
    signatures: Arc<DecryptionSignatureManager>,
}

impl<M: Middleware + 'static> PrivateSwapClient<M> {
    pub fn new(
        address: Address,
        client: Arc<M>,
        session: Arc<dyn FhevmSession>,
        signatures: Arc<DecryptionSignatureManager>,
    ) -> Self {
        Self {
            contract: PrivateSwap::new(address, client),
            session,
            signatures,
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    fn sender(&self) -> Result<Address> {
        self.contract
            .client()
            .default_sender()
            .ok_or_else(|| anyhow!("Middleware has no default sender"))
    }

    /// Submit an encrypted quote request and wait for it to be mined
    pub async fn request_quote(
        &self,
        direction: QuoteDirection,
        amount_in: u32,
        max_slippage_ppm: u32,
    ) -> Result<Option<TransactionReceipt>> {
        let user = self.sender()?;
        let encrypted =
            encrypt_u32_pair(&self.session, self.address(), user, amount_in, max_slippage_ppm)
                .await?;

        debug!("Submitting {} for {:?}", direction.function_name(), user);
        let call = self.contract.method::<_, [u8; 32]>(
            direction.function_name(),
            (encrypted.first, encrypted.second, encrypted.input_proof),
        )?;
        let pending = call.send().await?;
        let receipt = pending.await?;

        info!("Quote request {} mined", direction.function_name());
        Ok(receipt)
    }

    pub async fn quote_a_to_b(
        &self,
        amount_in: u32,
        max_slippage_ppm: u32,
    ) -> Result<Option<TransactionReceipt>> {
        self.request_quote(QuoteDirection::AtoB, amount_in, max_slippage_ppm)
            .await
    }

    pub async fn quote_b_to_a(
        &self,
        amount_in: u32,
        max_slippage_ppm: u32,
    ) -> Result<Option<TransactionReceipt>> {
        self.request_quote(QuoteDirection::BtoA, amount_in, max_slippage_ppm)
            .await
    }

    /// Replace the encrypted prices (1e4 fixed point)
    pub async fn set_prices(
        &self,
        price_a_to_b: u32,
        price_b_to_a: u32,
    ) -> Result<Option<TransactionReceipt>> {
        let user = self.sender()?;
        let encrypted =
            encrypt_u32_pair(&self.session, self.address(), user, price_a_to_b, price_b_to_a)
                .await?;

        let call = self
            .contract
            .set_prices(encrypted.first, encrypted.second, encrypted.input_proof);
        let pending = call.send().await?;
        Ok(pending.await?)
    }

    pub async fn last_quote_handle(&self, user: Address) -> Result<H256> {
        let handle = self.contract.get_last_quote_handle(user).call().await?;
        Ok(H256(handle))
    }

    /// Decrypt the caller's last quote
    ///
    /// `Ok(None)` when there is no quote yet or the user declined to sign.
    pub async fn decrypt_last_quote(&self, signer: &dyn TypedDataSigner) -> Result<Option<U256>> {
        let user = signer.address();
        let handle = self.last_quote_handle(user).await?;
        if handle.is_zero() {
            debug!("No quote stored for {:?}", user);
            return Ok(None);
        }

        let contract_address = self.address();
        let Some(signature) = self
            .signatures
            .load_or_sign(self.session.as_ref(), &[contract_address], signer)
            .await?
        else {
            info!("No decryption signature available for {:?}", user);
            return Ok(None);
        };

        let request = signature.decrypt_request(vec![HandleContractPair {
            handle,
            contract_address,
        }]);
        let results = self.session.user_decrypt(&request).await?;
        let numerator = results
            .get(&handle)
            .ok_or_else(|| anyhow!("Decryption result missing handle {:?}", handle))?
            .as_u256();

        Ok(Some(scale_quote(numerator)))
    }
}
