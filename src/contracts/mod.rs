// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod private_swap;

pub use private_swap::{
    encrypt_u32_pair, scale_quote, EncryptedPair, PrivateSwap, PrivateSwapClient, QuoteDirection,
    QUOTE_SCALE,
};
