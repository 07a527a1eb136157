//! authbridge - runs the OAuth sign-in callback flow from the command line.
//!
//! Reads the identity provider session, exchanges it for application
//! credentials at the configured backend, stores them in the OS keychain
//! and prints the route the user would be sent to.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use authbridge_core::api::ApiClient;
use authbridge_core::auth::{
    CredentialStore, FileSessionProvider, IdentityProvider, KeyringCredentialStore,
    MemoryCredentialStore, StaticSessionProvider, StoredCredentials,
};
use authbridge_core::{CallbackHandler, Config, Navigator, Resolution};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: authbridge <command>

Commands:
  callback [--token <provider-token>] [--dry-run]
                 Exchange the provider session for app credentials
  status         Show whether credentials are stored
  sign-out       Remove stored credentials and the provider session";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Prints each navigation target on stdout.
struct StdoutNavigator;

impl Navigator for StdoutNavigator {
    fn navigate(&mut self, path: &str) {
        println!("{}", path);
    }
}

#[derive(Debug, Default)]
struct CallbackArgs {
    token: Option<String>,
    dry_run: bool,
}

fn parse_callback_args(args: &[String]) -> Result<CallbackArgs> {
    let mut parsed = CallbackArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--token" => {
                let token = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--token requires a value"))?;
                parsed.token = Some(token.clone());
            }
            "--dry-run" => parsed.dry_run = true,
            other => anyhow::bail!("Unknown argument: {}\n\n{}", other, USAGE),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    match args.get(1).map(String::as_str) {
        Some("callback") => run_callback(&config, parse_callback_args(&args[2..])?).await,
        Some("status") => show_status(&config),
        Some("sign-out") => sign_out(&config).await,
        _ => {
            eprintln!("{}", USAGE);
            Ok(ExitCode::from(2))
        }
    }
}

async fn run_callback(config: &Config, args: CallbackArgs) -> Result<ExitCode> {
    let base_url = config.api_base_url()?;
    info!(base_url = %base_url, dry_run = args.dry_run, "Running OAuth callback");

    let provider: Arc<dyn IdentityProvider> = match args.token {
        Some(token) => Arc::new(StaticSessionProvider::signed_in(token)),
        None => Arc::new(FileSessionProvider::new(config.cache_dir()?)),
    };

    let memory_store = Arc::new(MemoryCredentialStore::new());
    let store: Arc<dyn CredentialStore> = if args.dry_run {
        memory_store.clone()
    } else {
        Arc::new(KeyringCredentialStore::new(config.keyring_service()))
    };

    let client = ApiClient::new(&base_url)?;
    let handler = CallbackHandler::new(provider, Arc::new(client), store, config.routes());

    let resolution = handler.run(&mut StdoutNavigator).await;

    if args.dry_run {
        if let Some(stored) = StoredCredentials::load(memory_store.as_ref())? {
            eprintln!("Would store user: {}", stored.user);
        }
    }

    Ok(match resolution {
        Resolution::Authenticated => ExitCode::SUCCESS,
        Resolution::Unauthenticated | Resolution::Failed => ExitCode::FAILURE,
    })
}

fn show_status(config: &Config) -> Result<ExitCode> {
    let store = KeyringCredentialStore::new(config.keyring_service());
    match StoredCredentials::load(&store).context("Failed to read stored credentials")? {
        Some(stored) => {
            let user = stored.user_value().context("Stored user record is not valid JSON")?;
            println!("Signed in");
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("Not signed in");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn sign_out(config: &Config) -> Result<ExitCode> {
    let store = KeyringCredentialStore::new(config.keyring_service());
    StoredCredentials::clear(&store).context("Failed to remove stored credentials")?;

    FileSessionProvider::new(config.cache_dir()?)
        .clear()
        .await
        .context("Failed to remove provider session")?;

    info!("Signed out");
    println!("Signed out");
    Ok(ExitCode::SUCCESS)
}
