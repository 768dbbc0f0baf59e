//! fabkit - chaincode invocation CLI
//!
//! ```text
//! fabkit chaincode invoke --ccid <id> --args <JSON> [--iterations N] [--concurrency C] ...
//! fabkit chaincode query  --ccid <id> --args <JSON> ...
//! ```

mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fabkit_core::domain::InvokeMode;
use fabkit_core::impls::{OutputTarget, PrintFormat, SeededRandom, ThreadRandom, WriterPrinter};
use fabkit_core::ports::{RandomSource, SequentialIdGenerator};
use fabkit_core::{InvocationCoordinator, InvokeConfig};
use tracing_subscriber::EnvFilter;

use crate::settings::NetworkSettings;

#[derive(Debug, Parser)]
#[command(name = "fabkit")]
#[command(about = "Permissioned blockchain administration tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Network file (YAML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where progress, responses and summaries go: stdout, stderr or log
    #[arg(long, global = true)]
    output: Option<OutputTarget>,

    /// Print format: display or json
    #[arg(long, global = true)]
    format: Option<PrintFormat>,

    /// Log filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Seed for `$rand(n)` argument templates
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chaincode operations
    Chaincode {
        #[command(subcommand)]
        action: ChaincodeCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ChaincodeCommands {
    /// Submit transactions and wait for their commit
    Invoke(InvokeArgs),
    /// Evaluate transactions on endorsers without committing
    Query(CallArgs),
}

#[derive(Debug, Args)]
struct CallArgs {
    /// Chaincode id
    #[arg(long)]
    ccid: String,

    /// `{"Func":..,"Args":[..]}` or a JSON array of them
    #[arg(long)]
    args: String,

    /// Channel id (defaults to the network file's channel)
    #[arg(long)]
    cid: Option<String>,

    #[arg(long, default_value_t = 1)]
    iterations: usize,

    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Per-call timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout: u64,

    /// Print every proposal response
    #[arg(long)]
    verbose: bool,

    /// Print only response payloads
    #[arg(long)]
    payload: bool,

    /// Target peer URLs, comma separated
    #[arg(long, value_delimiter = ',')]
    peer: Vec<String>,

    /// Target every peer of these org ids, comma separated
    #[arg(long, value_delimiter = ',')]
    orgid: Vec<String>,
}

#[derive(Debug, Args)]
struct InvokeArgs {
    #[command(flatten)]
    call: CallArgs,

    /// Maximum submissions per invocation, including the first
    #[arg(long, default_value_t = 3)]
    attempts: u32,

    /// Delay before each resubmission in milliseconds
    #[arg(long, default_value_t = 3000)]
    resubmitdelay: u64,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(call: &CallArgs, settings: &NetworkSettings, mode: InvokeMode) -> Result<InvokeConfig> {
    let mut config = InvokeConfig::from_args_json(call.ccid.clone(), &call.args)
        .context("failed to parse --args")?;
    config.channel_id = call.cid.clone().unwrap_or_else(|| settings.channel.clone());
    config.iterations = call.iterations;
    config.concurrency = call.concurrency;
    config.timeout = Duration::from_millis(call.timeout);
    config.verbose = call.verbose;
    config.payload_only = call.payload;
    config.peer_urls = call.peer.clone();
    config.org_ids = call.orgid.clone();
    config.mode = mode;
    Ok(config)
}

fn invoke_config(args: &InvokeArgs, settings: &NetworkSettings) -> Result<InvokeConfig> {
    let mut config = build_config(&args.call, settings, InvokeMode::Invoke)?;
    config.max_attempts = args.attempts;
    config.resubmit_delay = Duration::from_millis(args.resubmitdelay);
    Ok(config)
}

fn query_config(args: &CallArgs, settings: &NetworkSettings) -> Result<InvokeConfig> {
    let mut config = build_config(args, settings, InvokeMode::Query)?;
    config.max_attempts = 1;
    config.resubmit_delay = Duration::ZERO;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => NetworkSettings::load(path)?,
        None => NetworkSettings::default(),
    };

    let Commands::Chaincode { action } = &cli.command;
    let config = match action {
        ChaincodeCommands::Invoke(args) => invoke_config(args, &settings)?,
        ChaincodeCommands::Query(args) => query_config(args, &settings)?,
    };

    let printer = Arc::new(WriterPrinter::new(
        cli.output.unwrap_or(settings.output.target),
        cli.format.unwrap_or(settings.output.format),
    ));
    let rng: Arc<dyn RandomSource> = match cli.seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };
    let channel = Arc::new(settings.channel(&config.channel_id));

    let coordinator = InvocationCoordinator::new(
        channel,
        printer,
        rng,
        Arc::new(SequentialIdGenerator::new()),
    );
    let report = coordinator
        .run(&config)
        .await
        .context("invocation run failed")?;
    report.into_result()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
