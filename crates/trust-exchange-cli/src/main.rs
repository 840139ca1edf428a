// crates/trust-exchange-cli/src/main.rs
// ============================================================================
// Module: Trust Exchange CLI Entry Point
// Description: Command dispatcher for exchanges and key management.
// Purpose: Run a single Broker-mediated exchange from the command line.
// Dependencies: clap, tokio, tracing-subscriber, trust-exchange-cli
// ============================================================================

//! ## Overview
//! `trust-exchange run` performs one complete exchange and writes the outcome
//! as JSON to stdout. Logs go to stderr, filtered by `RUST_LOG` (default
//! `info`). `keygen` and `public-key` manage the requester's signing key.
//! Security posture: the signing key and API key are never written to logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trust_exchange_cli::CliError;
use trust_exchange_cli::CliResult;
use trust_exchange_cli::ExchangeTarget;
use trust_exchange_cli::build_engine;
use trust_exchange_cli::exchange_params;
use trust_exchange_cli::generate_key_file;
use trust_exchange_cli::public_key_of;
use trust_exchange_config::TrustExchangeConfig;
use trust_exchange_core::Clock;
use trust_exchange_core::KeyPair;
use trust_exchange_core::SystemClock;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "trust-exchange", version, about = "Broker-mediated data exchange client")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one data exchange.
    Run(RunCommand),
    /// Generate a new signing key file.
    Keygen(KeygenCommand),
    /// Print the public key of a signing key file.
    PublicKey(PublicKeyCommand),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Institution holding the data.
    #[arg(long, value_name = "ID")]
    provider_id: String,
    /// Subject of the data.
    #[arg(long, value_name = "ID")]
    data_owner_id: String,
    /// Schema of the requested data.
    #[arg(long, value_name = "ID")]
    schema_id: String,
    /// Consent relationship authorizing the exchange.
    #[arg(long, value_name = "ID")]
    relationship_id: String,
    /// Request lifetime in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 3600)]
    expires_in_secs: u64,
    /// Config file (defaults to `TRUST_EXCHANGE_CONFIG`, then `trust-exchange.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `keygen`.
#[derive(Args, Debug)]
struct KeygenCommand {
    /// Destination for the new key; must not exist.
    #[arg(long, value_name = "PATH")]
    out: PathBuf,
}

/// Arguments for `public-key`.
#[derive(Args, Debug)]
struct PublicKeyCommand {
    /// Signing key file.
    #[arg(long, value_name = "PATH")]
    key: PathBuf,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write_stderr_line(&err.to_string());
            err.exit_code()
        }
    }
}

/// Installs the stderr log subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Dispatches the selected command.
async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Run(command) => command_run(command).await,
        Commands::Keygen(command) => command_keygen(&command),
        Commands::PublicKey(command) => command_public_key(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `run`.
async fn command_run(command: RunCommand) -> CliResult<()> {
    let config = TrustExchangeConfig::load(command.config.as_deref())?;
    let key_pair = KeyPair::load(&config.identity.signing_key_path())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let params = exchange_params(
        ExchangeTarget {
            provider_id: command.provider_id,
            data_owner_id: command.data_owner_id,
            schema_id: command.schema_id,
            relationship_id: command.relationship_id,
        },
        clock.now(),
        Duration::from_secs(command.expires_in_secs),
    )?;
    let engine = build_engine(&config, key_pair, clock)?;
    info!(
        requester_id = %config.client_id(),
        broker = %config.broker.base_url,
        provider_id = %params.provider_id,
        expires_at = %params.expires_at,
        "starting exchange"
    );
    let outcome = engine.run(params).await?;
    let mut bytes = serde_json::to_vec_pretty(&outcome)
        .map_err(|err| CliError::Output(format!("outcome encoding failed: {err}")))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes)
}

/// Executes `keygen`.
fn command_keygen(command: &KeygenCommand) -> CliResult<()> {
    let public_key = generate_key_file(&command.out)?;
    write_stderr_line(&format!("wrote signing key to {}", command.out.display()))
        .map_err(|err| CliError::Output(err.to_string()))?;
    write_stdout_bytes(format!("{}\n", public_key.to_base64()).as_bytes())
}

/// Executes `public-key`.
fn command_public_key(command: &PublicKeyCommand) -> CliResult<()> {
    let public_key = public_key_of(&command.key)?;
    write_stdout_bytes(format!("{}\n", public_key.to_base64()).as_bytes())
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes raw bytes to stdout.
fn write_stdout_bytes(bytes: &[u8]) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|err| CliError::Output(format!("stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}
