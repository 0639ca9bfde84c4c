// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::debug;

use super::error::FhevmError;
use super::mock::MAX_INPUT_VALUES;
use super::types::{ClearValue, EncryptedInput, FheType, FhevmSession, PUBLIC_PARAMS_BITS};

/// Collects plaintexts for one contract call and encrypts them in one go
///
/// Values must be added in the order of the target function's parameters.
/// The builder is single-use: after `finalize` every further call fails
/// with `InputAlreadyFinalized`.
pub struct EncryptedInputBuilder {
    session: Arc<dyn FhevmSession>,
    contract: Address,
    user: Address,
    values: Vec<ClearValue>,
    total_bits: u32,
    finalized: bool,
}

/// Start an encrypted input scoped to `(contract, user)`
pub fn create_encrypted_input(
    session: &Arc<dyn FhevmSession>,
    contract: Address,
    user: Address,
) -> EncryptedInputBuilder {
    EncryptedInputBuilder {
        session: session.clone(),
        contract,
        user,
        values: Vec::new(),
        total_bits: 0,
        finalized: false,
    }
}

impl EncryptedInputBuilder {
    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Packed width of the values added so far
    pub fn total_bits(&self) -> u32 {
        self.total_bits
    }

    fn push(&mut self, value: ClearValue) -> Result<&mut Self, FhevmError> {
        if self.finalized {
            return Err(FhevmError::InputAlreadyFinalized);
        }
        if self.values.len() >= MAX_INPUT_VALUES {
            return Err(FhevmError::InvalidArgument(format!(
                "encrypted input holds at most {} values",
                MAX_INPUT_VALUES
            )));
        }

        let requested = self.total_bits + u32::from(value.fhe_type().bits());
        if requested > PUBLIC_PARAMS_BITS {
            return Err(FhevmError::InputCapacityExceeded {
                limit: PUBLIC_PARAMS_BITS,
                requested,
            });
        }

        self.total_bits = requested;
        self.values.push(value);
        Ok(self)
    }

    pub fn add_bool(&mut self, value: bool) -> Result<&mut Self, FhevmError> {
        self.push(ClearValue::Bool(value))
    }

    pub fn add8(&mut self, value: u8) -> Result<&mut Self, FhevmError> {
        self.add_uint(8, U256::from(value))
    }

    pub fn add16(&mut self, value: u16) -> Result<&mut Self, FhevmError> {
        self.add_uint(16, U256::from(value))
    }

    pub fn add32(&mut self, value: u32) -> Result<&mut Self, FhevmError> {
        self.add_uint(32, U256::from(value))
    }

    pub fn add64(&mut self, value: u64) -> Result<&mut Self, FhevmError> {
        self.add_uint(64, U256::from(value))
    }

    pub fn add128(&mut self, value: u128) -> Result<&mut Self, FhevmError> {
        self.add_uint(128, U256::from(value))
    }

    pub fn add256(&mut self, value: U256) -> Result<&mut Self, FhevmError> {
        self.add_uint(256, value)
    }

    pub fn add_address(&mut self, value: Address) -> Result<&mut Self, FhevmError> {
        self.push(ClearValue::Address(value))
    }

    /// Add an unsigned integer of width `bits` (8, 16, 32, 64, 128 or 256)
    pub fn add_uint(&mut self, bits: u16, value: U256) -> Result<&mut Self, FhevmError> {
        let ty = FheType::uint_for_bits(bits).ok_or_else(|| {
            FhevmError::InvalidArgument(format!("unsupported integer width {}", bits))
        })?;
        if value.bits() > usize::from(bits) {
            return Err(FhevmError::ValueOutOfRange { bits });
        }
        self.push(ClearValue::Uint { ty, value })
    }

    /// Encrypt every value added so far
    ///
    /// Returns one handle per value, in insertion order, plus the proof
    /// binding them to this builder's contract and user.
    pub async fn finalize(&mut self) -> Result<EncryptedInput, FhevmError> {
        if self.finalized {
            return Err(FhevmError::InputAlreadyFinalized);
        }
        if self.values.is_empty() {
            return Err(FhevmError::InvalidArgument(
                "encrypted input has no values".to_string(),
            ));
        }
        self.finalized = true;

        let input = self
            .session
            .encrypt_inputs(self.contract, self.user, &self.values)
            .await?;
        if input.handles.len() != self.values.len() {
            return Err(FhevmError::Session(format!(
                "backend returned {} handles for {} values",
                input.handles.len(),
                self.values.len()
            )));
        }

        debug!(
            "Finalized encrypted input: {} values, {} bits",
            self.values.len(),
            self.total_bits
        );
        Ok(input)
    }
}

impl std::fmt::Debug for EncryptedInputBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedInputBuilder")
            .field("contract", &self.contract)
            .field("user", &self.user)
            .field("values", &self.values.len())
            .field("total_bits", &self.total_bits)
            .field("finalized", &self.finalized)
            .finish()
    }
}
