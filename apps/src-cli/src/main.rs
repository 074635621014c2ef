//! `src` - command-line client for the srclib API
//!
//! # Usage
//!
//! ```bash
//! # Which endpoint and credentials would be used
//! src endpoint
//!
//! # Store a credential for the current endpoint, then call the API
//! src login --uid 42 --key "$KEY"
//! src get repos/github.com/gorilla/mux
//!
//! # Talk to a local instance and show auth decisions
//! SRC_ENDPOINT=http://localhost:3080/api/ src -v get repos
//! ```

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use srclib_auth::{Credential, EnvSnapshot, FileCredentialStore};
use srclib_client::{CacheFailurePolicy, ClientConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// srclib API client
///
/// The endpoint comes from `SRC_ENDPOINT` (default
/// `https://sourcegraph.com/api/`). Requests authenticate with
/// `SRC_UID`/`SRC_KEY` or the credential stored for the endpoint, and carry
/// the `SRCLIB_TICKET` permission grant when it is set.
#[derive(Parser, Debug)]
#[command(name = "src")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug output, including which credentials are used
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Credential store file (default: $HOME/.src-auth)
    #[arg(long, global = true, value_name = "PATH")]
    auth_file: Option<PathBuf>,

    /// HTTP cache directory (default: <temp dir>/srclib-cache)
    #[arg(long, global = true, value_name = "PATH")]
    cache_dir: Option<PathBuf>,

    /// Fail instead of running uncached when the cache directory is unusable
    #[arg(long, global = true)]
    no_cache_fallback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the API endpoint and how requests will authenticate
    Endpoint,

    /// GET an API path (relative to the endpoint) and print the body
    Get {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Store a credential for the current endpoint
    Login {
        #[arg(long)]
        uid: i64,

        #[arg(long)]
        key: String,
    },

    /// Remove the stored credential for the current endpoint
    Logout,
}

/// Default filter directives when `RUST_LOG` is not set.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,srclib=debug"
    } else {
        "warn,srclib=info"
    }
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn build_config(cli: &Cli) -> anyhow::Result<(ClientConfig, FileCredentialStore)> {
    let store = match &cli.auth_file {
        Some(path) => FileCredentialStore::new(path),
        None => FileCredentialStore::default_location()?,
    };

    let mut config = ClientConfig::new(EnvSnapshot::from_process(), Arc::new(store.clone()));
    if let Some(dir) = &cli.cache_dir {
        config = config.with_cache_dir(dir);
    }
    if cli.no_cache_fallback {
        config = config.with_cache_failure(CacheFailurePolicy::Fail);
    }
    Ok((config, store))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, store) = build_config(&cli)?;
    let mut out = std::io::stdout();

    match cli.command {
        Command::Endpoint => commands::endpoint(&config, &mut out),
        Command::Get { path } => commands::get(&config, &path, &mut out).await,
        Command::Login { uid, key } => {
            commands::login(&config, &store, Credential::new(uid, key), &mut out)
        }
        Command::Logout => commands::logout(&config, &store, &mut out),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
