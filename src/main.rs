//! appd - Lightweight declarative process supervisor
//!
//! Entry point for the appd application.

use appd::cli::{Cli, Commands, ConfigCommands};
use appd::config::{AppConfig, LogFormat, LogOutput, LoggingConfig};
use appd::error::exit_code;
use appd::service::{Manager, Status};
use appd::AppdError;
use clap::Parser;
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};
use tracing::Span;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings live in the config file, so it is loaded first.
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    if let Err(e) = init_logging(&cli, &config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(exit_code::GENERAL_ERROR as u8);
    }

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the CLI flags, which win over the configured level.
fn init_logging(
    cli: &Cli,
    logging: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default_level = match cli.log_level() {
        Some(level) => level.parse()?,
        None => LevelFilter::from_level(logging.level.into()),
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match (logging.format, logging.output) {
        (LogFormat::Json, LogOutput::Stdout) => {
            builder.json().with_writer(std::io::stdout).try_init()
        }
        (LogFormat::Json, LogOutput::Stderr) => {
            builder.json().with_writer(std::io::stderr).try_init()
        }
        (LogFormat::Text, LogOutput::Stdout) => builder.with_writer(std::io::stdout).try_init(),
        (LogFormat::Text, LogOutput::Stderr) => builder.with_writer(std::io::stderr).try_init(),
    }
}

/// Main application logic.
fn run(cli: &Cli, config: &AppConfig) -> appd::Result<()> {
    match &cli.command {
        Commands::Run => cmd_run(config),
        Commands::Config(subcmd) => cmd_config(config, subcmd),
    }
}

/// Handle the `run` command.
fn cmd_run(config: &AppConfig) -> appd::Result<()> {
    let span = tracing::info_span!("appd");
    let manager = Manager::new(config.unit_config()?, span)?;

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let failures = manager.start().await;
        if let Some(failed) = failures.first() {
            log_failures("failed to start service", &failures);
            let service = failed.service_name.clone();

            tracing::info!("stopping services that were already started");
            log_failures("service stop reported failure", &manager.stop().await);
            return Err(AppdError::StartFailed { service });
        }

        tracing::info!("supervising services, waiting for shutdown signal");
        wait_for_shutdown().await?;

        tracing::info!("shutdown requested, stopping services");
        log_failures("service stop reported failure", &manager.stop().await);
        Ok(())
    })
}

/// Waits for SIGINT or SIGTERM.
async fn wait_for_shutdown() -> appd::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = term.recv() => {}
    }
    Ok(())
}

fn log_failures(message: &str, statuses: &[Status]) {
    for status in statuses {
        let error = status
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        tracing::warn!(
            service_name = %status.service_name,
            status = %status.current,
            error = %error,
            "{}",
            message
        );
    }
}

/// Handle the `config` subcommand.
fn cmd_config(config: &AppConfig, subcmd: &ConfigCommands) -> appd::Result<()> {
    let mut units = config.unit_config()?;
    match subcmd {
        ConfigCommands::Validate => match units.services(&Span::none()) {
            Ok(services) => {
                println!("✓ Configuration is valid ({} units)", services.len());
                Ok(())
            }
            Err(e) => {
                println!("✗ Configuration is invalid: {}", e);
                Err(e)
            }
        },
        ConfigCommands::Show => {
            units.services(&Span::none())?;
            let json = serde_json::to_string_pretty(&units)?;
            println!("{}", json);
            Ok(())
        }
    }
}
