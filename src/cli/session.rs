// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{parse_address, FhevmConfig, MockChains};
use crate::fhevm::{discover, resolve, Discovery};
use crate::rpc::{HttpConnector, NetworkTarget};
use crate::storage::{FileStore, PublicKeyStorage};
use crate::version;

/// Arguments for the resolve command
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// JSON-RPC endpoint of the target network
    #[arg(long, env = "FHEVM_RPC_URL")]
    pub rpc_url: String,

    /// Extra mock chain as ID=URL (repeatable); overrides the configured mapping
    #[arg(long)]
    pub mock_chain: Vec<String>,
}

/// Arguments for the discover command
#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// JSON-RPC endpoint of the local node
    #[arg(long, env = "FHEVM_RPC_URL")]
    pub rpc_url: String,
}

/// Arguments for the cache command
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Directory of the file-backed store (defaults to FHEVM_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// ACL contract address the key material belongs to
    #[arg(long)]
    pub acl: String,
}

pub async fn resolve_network(args: ResolveArgs) -> Result<()> {
    let config = FhevmConfig::from_env();
    let overrides = MockChains::parse_list(&args.mock_chain.join(","))?;
    let mock_chains = config.mock_chains.merged(&overrides);
    let connector = HttpConnector::new(config.rpc_timeout());

    info!("Resolving {}", args.rpc_url);
    let env = resolve(&NetworkTarget::url(&args.rpc_url), &mock_chains, &connector).await?;
    println!("{}", serde_json::to_string_pretty(&env)?);
    Ok(())
}

pub async fn discover_backend(args: DiscoverArgs) -> Result<()> {
    let config = FhevmConfig::from_env();
    let connector = HttpConnector::new(config.rpc_timeout());

    match discover(&args.rpc_url, &connector).await {
        Discovery::LocalBackend(metadata) => {
            println!("Local FHE backend at {}", args.rpc_url);
            println!("  ACL:            {:?}", metadata.acl_address);
            println!("  Input verifier: {:?}", metadata.input_verifier_address);
            println!("  KMS verifier:   {:?}", metadata.kms_verifier_address);
        }
        Discovery::Absent(reason) => {
            println!("No local FHE backend at {} ({:?})", args.rpc_url, reason);
        }
    }
    Ok(())
}

pub async fn show_cache(args: CacheArgs) -> Result<()> {
    let storage_dir = args
        .storage_dir
        .or_else(|| FhevmConfig::from_env().storage_dir)
        .ok_or_else(|| anyhow!("No storage directory given (--storage-dir or FHEVM_STORAGE_DIR)"))?;
    let acl = parse_address("ACL", &args.acl)?;

    let store = FileStore::open(&storage_dir).await?;
    let cache = PublicKeyStorage::new(Arc::new(store));
    let material = cache.get(acl).await;

    println!("Key material for ACL {:?} in {}", acl, storage_dir.display());
    match &material.public_key {
        Some(key) => println!(
            "  Public key:    {} ({} bytes)",
            key.public_key_id,
            key.public_key.len()
        ),
        None => println!("  Public key:    <none>"),
    }
    match &material.public_params {
        Some(params) => println!(
            "  Public params: {} ({} bytes)",
            params.public_params_id,
            params.public_params.len()
        ),
        None => println!("  Public params: <none>"),
    }
    Ok(())
}

pub fn print_version() {
    println!("{}", version::get_version_string());
    println!("Build: {}", version::VERSION);
    println!("Features: {}", version::FEATURES.join(", "));
    println!(
        "Chains: {}",
        version::SUPPORTED_CHAINS
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
}
