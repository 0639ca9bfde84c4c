// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir FHEVM client

/// Full version string with feature description
pub const VERSION: &str = "v0.3.0-fhevm-sessions-2025-10-16";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.3.0";

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-10-16";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "mock-chain-resolution",
    "local-backend-discovery",
    "relayer-runtime",
    "key-material-cache",
    "encrypted-inputs",
    "eip712-user-decrypt",
    "decryption-signature-cache",
    "cancellable-session-creation",
    "private-swap",
];

/// Chain IDs with built-in support
pub const SUPPORTED_CHAINS: &[u64] = &[
    31337,    // Hardhat (mock backend)
    11155111, // Sepolia (relayer)
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir FHEVM Client {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info as JSON
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
        "chains": SUPPORTED_CHAINS,
    })
}
