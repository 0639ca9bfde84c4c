// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fabstir FHEVM client CLI
#[derive(Parser, Debug)]
#[command(name = "fhevm-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Inspect FHE networks, local backends and cached key material", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a network as mock or relayer-backed
    Resolve(session::ResolveArgs),

    /// Probe a local node for FHE backend metadata
    Discover(session::DiscoverArgs),

    /// Show cached public key material for an ACL address
    Cache(session::CacheArgs),

    /// Print version and feature information
    Version,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve(args) => session::resolve_network(args).await,
        Commands::Discover(args) => session::discover_backend(args).await,
        Commands::Cache(args) => session::show_cache(args).await,
        Commands::Version => {
            session::print_version();
            Ok(())
        }
    }
}
