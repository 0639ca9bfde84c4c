// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local backend discovery tests

use super::common::{hardhat_metadata, FakeConnector, ScriptedTransport, LOCAL_RPC_URL, MOCK_ACL};
use ethers::types::Address;
use fabstir_fhevm_client::fhevm::{discover, AbsentReason, Discovery};
use serde_json::json;

async fn discover_with(transport: ScriptedTransport) -> Discovery {
    let connector = FakeConnector::new().with(LOCAL_RPC_URL, transport);
    discover(LOCAL_RPC_URL, &connector).await
}

#[tokio::test]
async fn test_hardhat_node_with_metadata_is_local_backend() {
    let discovery = discover_with(ScriptedTransport::hardhat(31337)).await;

    let metadata = discovery.metadata().expect("local backend");
    assert_eq!(metadata.acl_address, MOCK_ACL.parse::<Address>().unwrap());
}

#[tokio::test]
async fn test_marker_is_case_insensitive() {
    let discovery = discover_with(
        ScriptedTransport::chain(31337)
            .reply("web3_clientVersion", json!("HARDHATNETWORK/2.22.0"))
            .reply("fhevm_relayer_metadata", hardhat_metadata()),
    )
    .await;

    assert!(matches!(discovery, Discovery::LocalBackend(_)));
}

#[tokio::test]
async fn test_other_client_is_absent_without_metadata_call() {
    let transport = ScriptedTransport::chain(31337)
        .reply("web3_clientVersion", json!("anvil/v0.2.0"))
        .reply("fhevm_relayer_metadata", hardhat_metadata());
    let connector = FakeConnector::new().with(LOCAL_RPC_URL, transport);

    let discovery = discover(LOCAL_RPC_URL, &connector).await;

    assert_eq!(discovery, Discovery::Absent(AbsentReason::NotLocalNode));
    let calls = connector.transport(LOCAL_RPC_URL).unwrap().calls();
    assert_eq!(calls, vec!["web3_clientVersion".to_string()]);
}

#[tokio::test]
async fn test_non_string_client_version_is_absent() {
    let discovery = discover_with(
        ScriptedTransport::chain(31337)
            .reply("web3_clientVersion", json!({"name": "hardhat"}))
            .reply("fhevm_relayer_metadata", hardhat_metadata()),
    )
    .await;

    assert_eq!(discovery, Discovery::Absent(AbsentReason::NotLocalNode));
}

#[tokio::test]
async fn test_missing_metadata_field_is_absent() {
    for missing in ["ACLAddress", "InputVerifierAddress", "KMSVerifierAddress"] {
        let mut metadata = hardhat_metadata();
        metadata.as_object_mut().unwrap().remove(missing);

        let discovery = discover_with(
            ScriptedTransport::chain(31337)
                .reply("web3_clientVersion", json!("HardhatNetwork/2.22.0"))
                .reply("fhevm_relayer_metadata", metadata),
        )
        .await;

        assert_eq!(
            discovery,
            Discovery::Absent(AbsentReason::MalformedMetadata),
            "missing {}",
            missing
        );
    }
}

#[tokio::test]
async fn test_mistyped_metadata_field_is_absent() {
    let mut metadata = hardhat_metadata();
    metadata["ACLAddress"] = json!(42);

    let discovery = discover_with(
        ScriptedTransport::chain(31337)
            .reply("web3_clientVersion", json!("HardhatNetwork/2.22.0"))
            .reply("fhevm_relayer_metadata", metadata),
    )
    .await;

    assert_eq!(discovery, Discovery::Absent(AbsentReason::MalformedMetadata));
}

#[tokio::test]
async fn test_metadata_rpc_failure_is_absent() {
    let discovery = discover_with(
        ScriptedTransport::chain(31337)
            .reply("web3_clientVersion", json!("HardhatNetwork/2.22.0"))
            .fail("fhevm_relayer_metadata", "method not supported"),
    )
    .await;

    assert_eq!(discovery, Discovery::Absent(AbsentReason::MetadataUnavailable));
}

#[tokio::test]
async fn test_transport_errors_are_swallowed() {
    let discovery = discover_with(
        ScriptedTransport::chain(31337).fail("web3_clientVersion", "connection reset"),
    )
    .await;
    assert_eq!(discovery, Discovery::Absent(AbsentReason::Transport));

    let unreachable = discover("http://127.0.0.1:1", &FakeConnector::new()).await;
    assert_eq!(unreachable, Discovery::Absent(AbsentReason::Transport));
}

#[tokio::test]
async fn test_metadata_with_extra_fields_is_local_backend() {
    let mut metadata = hardhat_metadata();
    metadata["CoprocessorAddress"] = json!("0x92C920834Ec8941d2C77D188936E1f7A6f49c127");
    metadata["DecryptionOracleAddress"] = json!("0xa02Cda4Ca3a71D7C46997716F4283aa851C28812");

    let discovery = discover_with(
        ScriptedTransport::chain(31337)
            .reply("web3_clientVersion", json!("HardhatNetwork/2.22.0"))
            .reply("fhevm_relayer_metadata", metadata),
    )
    .await;

    let metadata = discovery.metadata().expect("local backend");
    assert_eq!(metadata.acl_address, MOCK_ACL.parse::<Address>().unwrap());
}
