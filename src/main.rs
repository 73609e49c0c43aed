//! graceful-run: run a command under a termination scope
//!
//! Forwards shutdown to the child as SIGTERM and exits with a code that
//! reflects how the run ended:
//! - 0 when the child succeeded
//! - 128 + signo when SIGINT/SIGTERM arrived
//! - the child's own code when its failure is reported to the scope
//! - 1 for other failures and panics

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use graceful::config::Config;
use graceful::exec::{Command, ExecError};
use graceful::Scope;

#[derive(Parser)]
#[command(name = "graceful-run")]
#[command(about = "Run a command with graceful termination handling")]
#[command(version)]
struct Cli {
    /// Report child failures with the child's exit code, not only during shutdown
    #[arg(long)]
    any_context: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Print the resolved termination as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Program to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration, CLI flags override the environment
    let mut config = Config::load()?;
    if cli.any_context {
        config.any_context = true;
    }
    if cli.debug {
        config.log_filter = "debug".to_string();
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ?config,
        "graceful-run starting"
    );

    let scope = Scope::root().with_termination();
    let descriptor = graceful::supervise(&scope, run_child(&scope, &cli, &config), |desc| desc).await;
    scope.close();

    if cli.json {
        println!("{}", serde_json::to_string(&descriptor.report())?);
    }

    info!(%descriptor, "graceful-run stopped");
    std::process::exit(descriptor.exit_code());
}

/// Run the requested command to completion under `scope`
async fn run_child(scope: &Scope, cli: &Cli, config: &Config) -> Result<()> {
    let (program, args) = cli
        .command
        .split_first()
        .ok_or_else(|| anyhow!("no command given"))?;

    let mut cmd = Command::new(scope, program);
    cmd.args(args).graceful_any_context(config.any_context);

    let status = cmd.status().await?;
    if !status.success() && !scope.is_terminating() {
        return Err(ExecError::Exited {
            program: program.clone(),
            status,
        }
        .into());
    }

    Ok(())
}
