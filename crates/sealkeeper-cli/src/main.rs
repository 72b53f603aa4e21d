//! `sealkeeper` — operator CLI for initializing, unsealing, and
//! declaratively configuring a sealed secret-store server.

#![allow(clippy::print_stdout)]

mod document;
mod keystore_select;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sealkeeper_client::Client;
use sealkeeper_reconcile::{InitConfig, LifecycleManager};
use tracing::info;

use keystore_select::{KeystoreArgs, KeystoreKind};

const DEFAULT_CONFIG_FILENAME: &str = "vault-config.yml";

#[derive(Parser)]
#[command(
    name = "sealkeeper",
    version,
    about = "Initialize, unseal, and declaratively configure a sealed secret-store server",
    long_about = None
)]
struct Cli {
    /// Server address.
    #[arg(long, env = "VAULT_ADDR", default_value = "http://127.0.0.1:8200")]
    addr: String,

    /// Trust-root backend for unseal shares, recovery shares, and the root token.
    #[arg(long, env = "SEALKEEPER_KEYSTORE", value_enum, default_value = "memory")]
    keystore: CliKeystoreKind,

    /// S3 bucket backing the `s3` keystore.
    #[arg(long, env = "SEALKEEPER_KEYSTORE_BUCKET")]
    keystore_bucket: Option<String>,

    /// Key prefix within the S3 bucket.
    #[arg(long, env = "SEALKEEPER_KEYSTORE_PREFIX", default_value = "")]
    keystore_prefix: String,

    /// Log verbosity filter, e.g. `info`, `debug`, `sealkeeper_reconcile=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliKeystoreKind {
    Memory,
    #[value(name = "s3")]
    S3,
}

impl From<CliKeystoreKind> for KeystoreKind {
    fn from(value: CliKeystoreKind) -> Self {
        match value {
            CliKeystoreKind::Memory => KeystoreKind::Memory,
            CliKeystoreKind::S3 => KeystoreKind::S3,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the server, persisting unseal shares, recovery shares, and
    /// the root token to the keystore. A no-op against an already
    /// initialized server (falls through to unseal).
    Init {
        /// Number of unseal key shares to generate.
        #[arg(long, default_value_t = 5)]
        shares: u8,
        /// Minimum shares required to unseal.
        #[arg(long, default_value_t = 3)]
        threshold: u8,
        /// Recovery-key shares. Defaults to `--shares` when unset.
        #[arg(long, default_value_t = 0)]
        recovery_shares: u8,
        /// Recovery-key threshold. Defaults to `--threshold` when unset.
        #[arg(long, default_value_t = 0)]
        recovery_threshold: u8,
        /// Exchange the server-issued root token for this one and revoke
        /// the original.
        #[arg(long)]
        root_token: Option<String>,
        /// Skip persisting the effective root token to the keystore (it is
        /// logged as a warning instead).
        #[arg(long, default_value_t = false)]
        no_store_root_token: bool,
        /// Verify a keystore round-trip before attempting init.
        #[arg(long, default_value_t = false)]
        preflight: bool,
    },
    /// Submit unseal shares from the keystore until the server reports unsealed.
    Unseal,
    /// Give up Raft leadership.
    StepDown,
    /// Load a config document and reconcile it against the server.
    Configure {
        /// Path to the config document (YAML or JSON, detected by extension).
        #[arg(long, default_value = DEFAULT_CONFIG_FILENAME)]
        config: PathBuf,
    },
    /// Print seal/health status without mutating anything.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let client = Arc::new(Client::new(cli.addr.clone()));
    let keystore_args = KeystoreArgs {
        kind: cli.keystore.into(),
        bucket: cli.keystore_bucket.clone(),
        prefix: cli.keystore_prefix.clone(),
    };

    match cli.command {
        Commands::Init {
            shares,
            threshold,
            recovery_shares,
            recovery_threshold,
            root_token,
            no_store_root_token,
            preflight,
        } => {
            // LifecycleManager::new takes ownership of `Arc<K>`, so the
            // dynamically-selected keystore trait object is wrapped in a
            // second Arc: `Keystore` is implemented for `Arc<dyn Keystore>`.
            let keystore = Arc::new(keystore_select::build(&keystore_args).await?);
            let init_config = InitConfig {
                secret_shares: shares,
                secret_threshold: threshold,
                recovery_shares,
                recovery_threshold,
                init_root_token: root_token,
                store_root_token: !no_store_root_token,
                preflight_checks: preflight,
            };
            let manager = LifecycleManager::new(client, keystore, init_config)
                .context("invalid init parameters")?;
            manager.init().await.context("init/unseal sequence failed")?;
            info!("server is active");
        }
        Commands::Unseal => {
            let keystore = Arc::new(keystore_select::build(&keystore_args).await?);
            let manager = LifecycleManager::new(
                client,
                keystore,
                InitConfig {
                    secret_shares: 1,
                    secret_threshold: 1,
                    recovery_shares: 0,
                    recovery_threshold: 0,
                    init_root_token: None,
                    store_root_token: false,
                    preflight_checks: false,
                },
            )
            .context("invalid init parameters")?;
            manager.unseal().await.context("unseal failed")?;
            info!("server is unsealed");
        }
        Commands::StepDown => {
            let keystore = keystore_select::build(&keystore_args).await?;
            sealkeeper_reconcile::step_down(client.as_ref(), &keystore)
                .await
                .context("step-down failed")?;
            info!("stepped down from leadership");
        }
        Commands::Configure { config } => {
            let keystore = keystore_select::build(&keystore_args).await?;
            let document = document::load(&config)
                .with_context(|| format!("failed to load config document {}", config.display()))?;
            sealkeeper_reconcile::configure(client.as_ref(), &keystore, &document)
                .await
                .context("configure run failed")?;
            info!("configuration reconciled");
        }
        Commands::Status => {
            use sealkeeper_client::SealedStoreApi;
            let seal = client.seal_status().await.context("failed to fetch seal status")?;
            let health = client.health().await.context("failed to fetch health")?;
            println!(
                "initialized={} sealed={} standby={} progress={}/{}",
                seal.initialized, seal.sealed, health.standby, seal.progress, seal.t
            );
        }
    }

    Ok(())
}

fn init_logging(log_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
