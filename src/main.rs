//! Push Hub CLI - serves the subscription API and delivers web push.
//!
//! This is the main binary entry point. See the `push_hub` library for the
//! core functionality.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use push_hub::env::Environment;
use push_hub::{ApiServer, AppState, Config, Registry, VapidKeys, WebPushSender};
use std::sync::Arc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "push-hub")]
#[command(version)]
#[command(about = "Browser push notification hub")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Override the bind address (e.g. 0.0.0.0:3000)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the VAPID public key, creating the keypair if needed
    VapidPublicKey,
    /// Generate a new VAPID keypair and print it without saving
    GenerateVapidKeys,
    /// Print the effective configuration
    Config,
}

/// Composition root: builds the registry, sender and dispatcher, then serves.
async fn serve(bind: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(bind) = bind {
        config.bind_address = bind;
    }

    let keys = Config::vapid_keys(&Config::config_dir()?)?;
    let client = reqwest::Client::builder()
        .timeout(config.send_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let sender = WebPushSender::new(
        client,
        &keys,
        config.vapid_subject.clone(),
        config.push_ttl_secs,
    );

    log::info!(
        "Push Hub v{} starting (payload policy {:?}, prune policy {:?})",
        env!("CARGO_PKG_VERSION"),
        config.payload_policy,
        config.prune_policy
    );

    let registry = Arc::new(Registry::new());
    let state = Arc::new(AppState::new(
        config,
        registry,
        Arc::new(sender),
        keys.public_key_base64url(),
    ));

    ApiServer::new(state).run_with_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutdown signal received"),
        Err(e) => log::error!("Failed to listen for shutdown signal: {e}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let environment = Environment::current();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(environment.default_log_filter()),
    )
    .format_timestamp_secs()
    .init();
    log::debug!("Running in {environment} environment");

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => serve(bind).await?,
        Commands::VapidPublicKey => {
            let keys = Config::vapid_keys(&Config::config_dir()?)?;
            println!("{}", keys.public_key_base64url());
        }
        Commands::GenerateVapidKeys => {
            let keys = VapidKeys::generate()?;
            println!("PUSH_HUB_VAPID_PUBLIC_KEY={}", keys.public_key_base64url());
            println!("PUSH_HUB_VAPID_PRIVATE_KEY={}", keys.private_key_base64url());
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
