use anyhow::{Context, Result};
use clap::Parser;
use provisionctl_core::{Config, WaitContext};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod progress;

use cli::{Cli, Commands};

/// Environment variable taking precedence over `RUST_LOG`
const LOG_ENV: &str = "PROVISIONCTL_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let (config, config_path) = load_config(cli.config_file.as_deref())?;

    let token = CancellationToken::new();
    spawn_interrupt_handler(token.clone());
    let ctx = WaitContext::with_token(token);

    trace!("Executing command: {:?}", cli.command);
    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Operation(cmd) => {
            commands::operation::handle(cmd, &config, cli.profile.as_deref(), &ctx, cli.output)
                .await
        }
        Commands::Resource(cmd) => {
            commands::resource::handle(cmd, &config, cli.profile.as_deref(), &ctx, cli.output)
                .await
        }
        Commands::Config(cmd) => commands::config::handle(
            cmd,
            &config,
            config_path.as_deref(),
            cli.profile.as_deref(),
            cli.output,
        ),
    };
    info!("Command finished in {:?}", start.elapsed());
    result
}

fn load_config(config_file: Option<&str>) -> Result<(Config, Option<PathBuf>)> {
    match config_file {
        Some(file) => {
            let path = PathBuf::from(file);
            debug!("Loading config from explicit path: {:?}", path);
            let config = Config::load_from_path(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            Ok((config, Some(path)))
        }
        None => {
            debug!("Loading config from default location");
            Ok((Config::load().context("Failed to load configuration")?, None))
        }
    }
}

/// Cancel in-flight waits on Ctrl-C; a second Ctrl-C terminates immediately
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

/// Filter directive for a `-v` count
fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "provisionctl=warn,provisionctl_core=warn",
        1 => "provisionctl=info,provisionctl_core=info",
        2 => "provisionctl=debug,provisionctl_core=debug",
        _ => "provisionctl=trace,provisionctl_core=trace",
    }
}

fn init_tracing(verbose: u8) {
    // PROVISIONCTL_LOG, then RUST_LOG, then the verbosity flag
    let filter = std::env::var(LOG_ENV)
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}
