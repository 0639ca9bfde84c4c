// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use fabstir_fhevm_client::fhevm::{PublicKeyMaterial, PublicParamsMaterial};
use fabstir_fhevm_client::storage::{FileStore, InMemoryStore, KeyValueStore, PublicKeyStorage};
use std::sync::Arc;
use tempfile::TempDir;

fn sepolia_acl() -> Address {
    "0x687820221192C5B662b25367F70076A37bc79b6c".parse().unwrap()
}

fn other_acl() -> Address {
    "0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D".parse().unwrap()
}

fn key(id: &str) -> PublicKeyMaterial {
    PublicKeyMaterial {
        public_key_id: id.to_string(),
        public_key: vec![0x42; 48],
    }
}

fn params(id: &str) -> PublicParamsMaterial {
    PublicParamsMaterial {
        public_params_id: id.to_string(),
        public_params: vec![0x24; 96],
    }
}

#[tokio::test]
async fn test_material_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let cache = PublicKeyStorage::new(Arc::new(FileStore::open(dir.path()).await.unwrap()));
        cache
            .set(sepolia_acl(), Some(&key("pk-1")), Some(&params("crs-1")))
            .await
            .unwrap();
    }

    let cache = PublicKeyStorage::new(Arc::new(FileStore::open(dir.path()).await.unwrap()));
    let cached = cache.get(sepolia_acl()).await;

    assert_eq!(cached.public_key, Some(key("pk-1")));
    assert_eq!(cached.public_params, Some(params("crs-1")));
}

#[tokio::test]
async fn test_entries_are_scoped_by_acl() {
    let cache = PublicKeyStorage::new(Arc::new(InMemoryStore::new()));
    cache
        .set(sepolia_acl(), Some(&key("pk-sepolia")), None)
        .await
        .unwrap();

    assert!(cache.get(other_acl()).await.is_empty());
    assert_eq!(
        cache.get(sepolia_acl()).await.public_key,
        Some(key("pk-sepolia"))
    );
}

#[tokio::test]
async fn test_params_only_write_keeps_public_key() {
    let cache = PublicKeyStorage::new(Arc::new(InMemoryStore::new()));
    cache
        .set(sepolia_acl(), Some(&key("pk-1")), None)
        .await
        .unwrap();
    cache
        .set(sepolia_acl(), None, Some(&params("crs-2")))
        .await
        .unwrap();

    let cached = cache.get(sepolia_acl()).await;
    assert_eq!(cached.public_key, Some(key("pk-1")));
    assert_eq!(cached.public_params, Some(params("crs-2")));
}

#[tokio::test]
async fn test_entry_moved_to_wrong_key_is_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let cache = PublicKeyStorage::new(store.clone());
    cache
        .set(sepolia_acl(), Some(&key("pk-1")), None)
        .await
        .unwrap();

    // Copy the raw record under another ACL's key
    let source = format!("fhevm.publicKeyStore:{:?}", sepolia_acl());
    let raw = store.get(&source).await.unwrap().unwrap();
    store
        .put(&format!("fhevm.publicKeyStore:{:?}", other_acl()), raw)
        .await
        .unwrap();

    assert!(cache.get(other_acl()).await.public_key.is_none());
}
