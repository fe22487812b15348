//! runcoach CLI
//!
//! Command-line interface for the Strava credentials used by runcoach.
//!
//! # Usage
//!
//! ```bash
//! # Seed the store with tokens from the initial OAuth authorization
//! runcoach import --access-token A --refresh-token R --expires-at 1735689600
//!
//! # Show whether the stored token is valid or stale
//! runcoach status
//!
//! # Print a valid access token, refreshing it if needed
//! runcoach token
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use runcoach_core::{ClientCredentials, CredentialStore, Credentials, EnvConfig, StoreConfig};
use std::path::PathBuf;
use tracing::info;

mod config;
mod logging;

#[derive(Parser)]
#[command(name = "runcoach")]
#[command(about = "Manage the Strava credentials used by the running coach")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration directory (defaults to ~/.running_coach)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Strava client id (overrides STRAVA_CLIENT_ID)
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Strava client secret (overrides STRAVA_CLIENT_SECRET)
    #[arg(long, global = true)]
    client_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the state of the stored credentials
    Status,

    /// Print a valid access token, refreshing it if necessary
    Token {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Refresh the access token now, even if it is still valid
    Refresh,

    /// Save a token pair obtained from the initial OAuth authorization
    Import {
        #[arg(long)]
        access_token: String,

        #[arg(long)]
        refresh_token: String,

        /// Expiry of the access token in epoch seconds
        #[arg(long)]
        expires_at: i64,
    },

    /// Print the locations of the key and credential files
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = config::resolve_config_dir(cli.config_dir.clone());
    let settings = config::load_config(&config_dir)?;
    logging::init_logging(cli.verbose, settings.log_level(), &config_dir);

    let store_config = settings.store_config(&config_dir);

    // Only reports locations, so it needs neither client credentials nor a key.
    if let Commands::Path = cli.command {
        for line in path_lines(&store_config) {
            println!("{}", line);
        }
        return Ok(());
    }

    let env = EnvConfig::load();
    let client = ClientCredentials::resolve(cli.client_id, cli.client_secret, &env)?;
    let store = CredentialStore::open(store_config, client)
        .with_context(|| format!("Failed to open credential store in {:?}", config_dir))?;

    match cli.command {
        Commands::Status => status(&store),
        Commands::Token { format } => token(&store, format).await,
        Commands::Refresh => refresh(&store).await,
        Commands::Import {
            access_token,
            refresh_token,
            expires_at,
        } => import(&store, Credentials::new(access_token, refresh_token, expires_at)),
        Commands::Path => Ok(()),
    }
}

fn status(store: &CredentialStore) -> Result<()> {
    let status = store
        .status()
        .context("Stored credentials could not be read; re-import them")?;
    println!("Strava credentials: {}", status);
    Ok(())
}

async fn token(store: &CredentialStore, format: OutputFormat) -> Result<()> {
    let token = store.get_valid_token().await?;

    match format {
        OutputFormat::Json => {
            let expires_at = store.load()?.map(|c| c.expires_at);
            let output = serde_json::json!({
                "access_token": token.expose(),
                "expires_at": expires_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => println!("{}", token.expose()),
    }
    Ok(())
}

async fn refresh(store: &CredentialStore) -> Result<()> {
    store.refresh().await?;
    println!("Strava credentials: {}", store.status()?);
    Ok(())
}

fn import(store: &CredentialStore, credentials: Credentials) -> Result<()> {
    store.save(&credentials)?;
    info!("Imported credentials into {:?}", store.credentials_path());
    println!("Strava credentials: {}", store.status()?);
    Ok(())
}

fn path_lines(config: &StoreConfig) -> Vec<String> {
    vec![
        format!("Config directory: {}", config.config_dir.display()),
        format!("Encryption key:   {}", config.key_path().display()),
        format!("Credentials:      {}", config.credentials_path().display()),
    ]
}
