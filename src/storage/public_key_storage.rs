// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistent cache of relayer public key material
//!
//! Two independent tables keyed by ACL address: the FHE public key and the
//! public params. Reads never fail (errors and missing entries read as
//! absent) and writes only upsert the fields that were supplied. Without a
//! backing store the cache is always empty and discards writes.

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::kv_store::{KeyValueStore, StorageError};
use crate::fhevm::types::{PublicKeyMaterial, PublicParamsMaterial};

const PUBLIC_KEY_TABLE: &str = "fhevm.publicKeyStore";
const PARAMS_TABLE: &str = "fhevm.paramsStore";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord<T> {
    acl: Address,
    value: T,
}

/// Whatever the cache holds for one ACL address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedKeyMaterial {
    pub public_key: Option<PublicKeyMaterial>,
    pub public_params: Option<PublicParamsMaterial>,
}

impl CachedKeyMaterial {
    pub fn is_empty(&self) -> bool {
        self.public_key.is_none() && self.public_params.is_none()
    }
}

#[derive(Clone, Default)]
pub struct PublicKeyStorage {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for PublicKeyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeyStorage")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl PublicKeyStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Cache for environments with no persistent storage
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    fn key(table: &str, acl: Address) -> String {
        format!("{}:{:?}", table, acl)
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        store: &dyn KeyValueStore,
        table: &str,
        acl: Address,
    ) -> Option<T> {
        let raw = match store.get(&Self::key(table, acl)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Key material read from {} failed for {:?}: {}", table, acl, e);
                return None;
            }
        };

        match serde_json::from_str::<StoredRecord<T>>(&raw) {
            Ok(record) if record.acl == acl => Some(record.value),
            Ok(record) => {
                warn!(
                    "Ignoring {} entry stored for {:?} under key of {:?}",
                    table, record.acl, acl
                );
                None
            }
            Err(e) => {
                warn!("Ignoring corrupt {} entry for {:?}: {}", table, acl, e);
                None
            }
        }
    }

    async fn write<T: Serialize>(
        store: &dyn KeyValueStore,
        table: &str,
        acl: Address,
        value: &T,
    ) -> Result<(), StorageError> {
        let record = StoredRecord { acl, value };
        let raw = serde_json::to_string(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        store.put(&Self::key(table, acl), raw).await
    }

    /// Look up cached material for `acl`; missing entries read as `None`
    pub async fn get(&self, acl: Address) -> CachedKeyMaterial {
        let Some(store) = self.store.as_deref() else {
            return CachedKeyMaterial::default();
        };

        let cached = CachedKeyMaterial {
            public_key: Self::read(store, PUBLIC_KEY_TABLE, acl).await,
            public_params: Self::read(store, PARAMS_TABLE, acl).await,
        };
        debug!(
            "Key material cache for {:?}: public_key={} public_params={}",
            acl,
            cached.public_key.is_some(),
            cached.public_params.is_some()
        );
        cached
    }

    /// Upsert the supplied fields; `None` leaves the stored field untouched
    pub async fn set(
        &self,
        acl: Address,
        public_key: Option<&PublicKeyMaterial>,
        public_params: Option<&PublicParamsMaterial>,
    ) -> Result<(), StorageError> {
        let Some(store) = self.store.as_deref() else {
            return Ok(());
        };

        if let Some(public_key) = public_key {
            Self::write(store, PUBLIC_KEY_TABLE, acl, public_key).await?;
        }
        if let Some(public_params) = public_params {
            Self::write(store, PARAMS_TABLE, acl, public_params).await?;
        }
        Ok(())
    }
}
