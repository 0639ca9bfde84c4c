// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decryption signature caching tests

use super::common::{CountingSigner, MockWallet};
use ethers::types::Address;
use fabstir_fhevm_client::crypto::{SignerError, TypedDataSigner};
use fabstir_fhevm_client::fhevm::decryption_signature::storage_key;
use fabstir_fhevm_client::fhevm::{
    normalize_contract_addresses, BackendMetadata, DecryptionSignature,
    DecryptionSignatureManager, FhevmError, MockSession, MockSessionConfig,
};
use fabstir_fhevm_client::{InMemoryStore, KeyRetention, KeyValueStore, StorageError};
use async_trait::async_trait;
use std::sync::Arc;

fn session() -> MockSession {
    MockSession::new(MockSessionConfig {
        rpc_url: "http://localhost:8545".to_string(),
        chain_id: 31337,
        metadata: BackendMetadata {
            acl_address: Address::from_low_u64_be(0xac1),
            input_verifier_address: Address::from_low_u64_be(0x1f),
            kms_verifier_address: Address::from_low_u64_be(0x4b),
        },
    })
}

fn contracts() -> Vec<Address> {
    vec![Address::from_low_u64_be(0xc2), Address::from_low_u64_be(0xc1)]
}

fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

/// Store that serves reads but refuses every write
#[derive(Default)]
struct ReadOnlyStore {
    inner: InMemoryStore,
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn put(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("read-only".to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

fn manager(store: &Arc<InMemoryStore>) -> DecryptionSignatureManager {
    DecryptionSignatureManager::new(Some(store.clone() as Arc<dyn KeyValueStore>))
}

#[tokio::test]
async fn test_fresh_signature_is_persisted_then_reused() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);
    let session = session();
    let signer = CountingSigner::random();

    let before = now();
    let first = manager
        .load_or_sign(&session, &contracts(), &signer)
        .await
        .unwrap()
        .expect("signature");

    assert!(first.start_timestamp >= before && first.start_timestamp <= now() + 1);
    assert_eq!(first.duration_days, 365);
    assert_eq!(first.user_address, signer.address());
    assert_eq!(first.contract_addresses, normalize_contract_addresses(&contracts()));
    assert!(first.signature.starts_with("0x"));
    assert_eq!(store.len().await, 1);

    let second = manager
        .load_or_sign(&session, &contracts(), &signer)
        .await
        .unwrap()
        .expect("signature");

    assert_eq!(second, first);
    assert_eq!(signer.sign_calls(), 1);
}

#[tokio::test]
async fn test_reuse_ignores_contract_order_and_duplicates() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);
    let session = session();
    let signer = CountingSigner::random();

    let mut reordered = contracts();
    reordered.reverse();
    reordered.push(reordered[0]);

    let first = manager.load_or_sign(&session, &contracts(), &signer).await.unwrap();
    let second = manager.load_or_sign(&session, &reordered, &signer).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(signer.sign_calls(), 1);
}

#[tokio::test]
async fn test_expired_signature_is_replaced() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);
    let session = session();
    let signer = CountingSigner::random();
    let user = signer.address();
    let normalized = normalize_contract_addresses(&contracts());

    let expired = DecryptionSignature {
        public_key: "02".repeat(33),
        private_key: "11".repeat(32),
        signature: format!("0x{}", "00".repeat(65)),
        contract_addresses: normalized.clone(),
        user_address: user,
        start_timestamp: now() - 400 * 86_400,
        duration_days: 365,
    };
    store
        .put(
            &storage_key(user, &normalized),
            serde_json::to_string(&expired).unwrap(),
        )
        .await
        .unwrap();

    let fresh = manager
        .load_or_sign(&session, &contracts(), &signer)
        .await
        .unwrap()
        .expect("signature");

    assert_ne!(fresh, expired);
    assert!(fresh.is_valid_at(now()));
    assert_eq!(signer.sign_calls(), 1);

    let stored = manager.load(user, &contracts()).await.unwrap();
    assert_eq!(stored, fresh);
}

#[tokio::test]
async fn test_different_contract_set_needs_new_signature() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);
    let session = session();
    let signer = CountingSigner::random();

    manager.load_or_sign(&session, &contracts(), &signer).await.unwrap();
    manager
        .load_or_sign(&session, &[Address::from_low_u64_be(0xc1)], &signer)
        .await
        .unwrap();

    assert_eq!(signer.sign_calls(), 2);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_rejected_signing_returns_none_and_stores_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);
    let session = session();

    let mut wallet = MockWallet::new();
    wallet
        .expect_address()
        .return_const(Address::from_low_u64_be(0x05e));
    wallet
        .expect_sign_typed_data()
        .times(1)
        .returning(|_| Err(SignerError::Rejected));

    let result = manager.load_or_sign(&session, &contracts(), &wallet).await.unwrap();

    assert!(result.is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_failed_signing_returns_none() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);

    let mut wallet = MockWallet::new();
    wallet
        .expect_address()
        .return_const(Address::from_low_u64_be(0x05e));
    wallet
        .expect_sign_typed_data()
        .returning(|_| Err(SignerError::Failed("hardware wallet disconnected".to_string())));

    let result = manager
        .load_or_sign(&session(), &contracts(), &wallet)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_empty_contract_set_is_invalid() {
    let manager = DecryptionSignatureManager::new(None);
    let signer = CountingSigner::random();

    let err = manager
        .load_or_sign(&session(), &[], &signer)
        .await
        .unwrap_err();
    assert!(matches!(err, FhevmError::InvalidArgument(_)));
    assert_eq!(signer.sign_calls(), 0);
}

#[tokio::test]
async fn test_in_memory_retention_never_writes_store() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store).with_retention(KeyRetention::InMemory);
    let session = session();
    let signer = CountingSigner::random();

    let first = manager.load_or_sign(&session, &contracts(), &signer).await.unwrap();
    let second = manager.load_or_sign(&session, &contracts(), &signer).await.unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert!(store.is_empty().await);
    assert_eq!(signer.sign_calls(), 1);
}

#[tokio::test]
async fn test_store_read_failure_falls_back_to_signing() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);
    let signer = CountingSigner::random();

    // Consumed by the initial cache lookup
    store
        .inject_error(StorageError::Unavailable("quota exceeded".to_string()))
        .await;

    let sig = manager
        .load_or_sign(&session(), &contracts(), &signer)
        .await
        .unwrap();
    assert!(sig.is_some());
}

#[tokio::test]
async fn test_clear_forces_resign() {
    let store = Arc::new(InMemoryStore::new());
    let manager = manager(&store);
    let session = session();
    let signer = CountingSigner::random();
    let user = signer.address();

    manager.load_or_sign(&session, &contracts(), &signer).await.unwrap();
    manager.clear(user, &contracts()).await.unwrap();
    assert!(manager.load(user, &contracts()).await.is_none());

    manager.load_or_sign(&session, &contracts(), &signer).await.unwrap();
    assert_eq!(signer.sign_calls(), 2);
}

#[tokio::test]
async fn test_custom_duration_is_signed() {
    let manager = DecryptionSignatureManager::new(None).with_duration_days(7);
    let signer = CountingSigner::random();

    let sig = manager
        .load_or_sign(&session(), &contracts(), &signer)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sig.duration_days, 7);
    assert_eq!(sig.expires_at(), sig.start_timestamp + 7 * 86_400);
}

#[tokio::test]
async fn test_failed_store_write_is_reused_from_memory() {
    let manager = DecryptionSignatureManager::new(Some(
        Arc::new(ReadOnlyStore::default()) as Arc<dyn KeyValueStore>
    ));
    let session = session();
    let signer = CountingSigner::random();

    let first = manager
        .load_or_sign(&session, &contracts(), &signer)
        .await
        .unwrap()
        .expect("signature");
    let second = manager
        .load_or_sign(&session, &contracts(), &signer)
        .await
        .unwrap()
        .expect("signature");

    assert_eq!(signer.sign_calls(), 1);
    assert_eq!(first, second);
}
