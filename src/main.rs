//! # kvconfig
//!
//! Command-line front end for the Key Vault configuration provider.
//!
//! ## Usage
//!
//! ```bash
//! # Load once and list the published configuration keys
//! kvconfig --vault my-vault keys
//!
//! # Print one configuration value
//! kvconfig --vault my-vault get secrets:Db:Password
//!
//! # Keep the configuration live, serving /metrics, /healthz and /readyz
//! kvconfig --vault my-vault --reload-interval-secs 300 serve
//! ```
//!
//! Every flag falls back to the matching `KEYVAULT_*` environment variable.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyvault_configuration::config::settings::parse_secret_map;
use keyvault_configuration::keys;
use keyvault_configuration::observability::{init_tracing, register_metrics};
use keyvault_configuration::server::{start_server, ServerState};
use keyvault_configuration::store::azure::auth::{build_credential, AzureAuth};
use keyvault_configuration::store::azure::AzureKeyVaultStore;
use keyvault_configuration::{
    load_with_retry, KeyVaultConfigurationProvider, ProviderOptions, ProviderSettings, RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Key Vault configuration provider CLI
#[derive(Parser, Debug)]
#[command(name = "kvconfig")]
#[command(about = "Load Azure Key Vault secrets as hierarchical configuration", long_about = None)]
struct Cli {
    /// Vault name or URL
    #[arg(long, env = "KEYVAULT_URL")]
    vault: Option<String>,

    /// Section the secrets are published under (empty for none)
    #[arg(long)]
    section_prefix: Option<String>,

    /// Load only these secrets (repeatable)
    #[arg(long = "secret")]
    secrets: Vec<String>,

    /// Load and rename secrets, as `id=key` pairs separated by commas
    #[arg(long)]
    secret_map: Option<String>,

    /// Seconds between background reloads, 0 disables them
    #[arg(long)]
    reload_interval_secs: Option<u64>,

    /// managed-identity, workload-identity or static-token
    #[arg(long)]
    auth: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load once and print every configuration key
    Keys,
    /// Load once and print the value of a configuration key
    Get {
        key: String,
    },
    /// Load once and print the immediate children of a configuration path
    Children {
        parent: Option<String>,
    },
    /// Keep the configuration loaded and serve metrics and health probes
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    // Configure rustls crypto provider before any TLS client is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();
    let settings = apply_overrides(ProviderSettings::from_env()?, &cli)?;
    init_tracing(&settings.log);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start Tokio runtime")?;
    runtime.block_on(run(cli.command, settings))
}

/// Command-line flags win over environment variables
fn apply_overrides(mut settings: ProviderSettings, cli: &Cli) -> Result<ProviderSettings> {
    if let Some(vault) = &cli.vault {
        settings.vault_url = Some(vault.clone());
    }
    if let Some(prefix) = &cli.section_prefix {
        settings.section_prefix.clone_from(prefix);
    }
    if !cli.secrets.is_empty() {
        settings.secrets.clone_from(&cli.secrets);
    }
    if let Some(raw) = &cli.secret_map {
        settings.secret_map = parse_secret_map(raw).context("Invalid --secret-map")?;
    }
    if let Some(secs) = cli.reload_interval_secs {
        settings.reload_interval_secs = secs;
    }
    if let Some(auth) = &cli.auth {
        settings.auth.clone_from(auth);
    }
    Ok(settings)
}

fn build_provider(settings: &ProviderSettings) -> Result<KeyVaultConfigurationProvider> {
    let vault = settings
        .vault_url
        .as_deref()
        .context("A vault is required: pass --vault or set KEYVAULT_URL")?;
    let auth = AzureAuth::parse(
        &settings.auth,
        settings.client_id.as_deref(),
        settings.access_token.as_deref(),
    )?;
    let credential = build_credential(&auth)?;
    let store = AzureKeyVaultStore::new(vault, settings.cloud(), credential)?;
    info!(vault_url = store.vault_url(), auth = ?auth, "Using Azure Key Vault");

    let mut options = ProviderOptions::new(Arc::new(store))
        .with_secrets(settings.secrets.clone())
        .with_secret_map(settings.secret_map.clone())
        .with_section_prefix(settings.section_prefix.clone())
        .with_retry(settings.retry_policy());
    if let Some(interval) = settings.reload_interval() {
        options = options.with_reload_interval(interval);
    }

    Ok(KeyVaultConfigurationProvider::new(options)?)
}

async fn run(command: Commands, settings: ProviderSettings) -> Result<()> {
    let provider = build_provider(&settings)?;
    let retry = provider.retry_policy();

    match command {
        Commands::Keys => {
            load_with_retry(&provider, &retry).await?;
            let mut published = provider.keys();
            published.sort_by(|a, b| keys::compare_keys(a, b));
            for key in published {
                println!("{key}");
            }
            provider.shutdown().await;
        }
        Commands::Get { key } => {
            load_with_retry(&provider, &retry).await?;
            println!("{}", provider.get(&key)?);
            provider.shutdown().await;
        }
        Commands::Children { parent } => {
            load_with_retry(&provider, &retry).await?;
            for child in provider.get_child_keys(Vec::new(), parent.as_deref()) {
                println!("{child}");
            }
            provider.shutdown().await;
        }
        Commands::Serve { port } => {
            serve(provider, &retry, port.unwrap_or(settings.metrics_port)).await?;
        }
    }

    Ok(())
}

async fn serve(
    provider: KeyVaultConfigurationProvider,
    retry: &RetryPolicy,
    port: u16,
) -> Result<()> {
    register_metrics()?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(ServerState::default());
    let server = tokio::spawn(start_server(port, Arc::clone(&state), shutdown.clone()));

    let outcome = load_with_retry(&provider, retry)
        .await
        .context("Initial Key Vault load failed")?;
    state.mark_ready();
    info!(
        keys = outcome.published_keys,
        polling = provider.is_polling(),
        "Key Vault configuration ready"
    );

    let mut token = provider.reload_token();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Shutdown signal received");
                break;
            }
            changed = token.changed() => match changed {
                Ok(generation) => info!(
                    generation,
                    keys = provider.snapshot().len(),
                    "Key Vault configuration reloaded"
                ),
                Err(e) => {
                    error!(error = %e, "Reload notifications stopped");
                    break;
                }
            },
        }
    }

    provider.shutdown().await;
    shutdown.cancel();
    match tokio::time::timeout(Duration::from_secs(5), server).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => error!(error = %e, "HTTP server task failed"),
        Err(_elapsed) => error!("HTTP server did not stop in time"),
    }
    Ok(())
}
