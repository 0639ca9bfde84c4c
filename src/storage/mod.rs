// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod file_store;
pub mod kv_store;
pub mod public_key_storage;

// Re-export main types for convenience
pub use file_store::FileStore;
pub use kv_store::{InMemoryStore, KeyValueStore, StorageError};
pub use public_key_storage::{CachedKeyMaterial, PublicKeyStorage};
