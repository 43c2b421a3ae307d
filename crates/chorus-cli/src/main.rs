mod cli;
mod console;
mod credentials_file;
mod events;
mod settings;

use std::process::ExitCode;

use chorus_common::ChorusError;
use chorus_config::ChorusConfig;
use chorus_gateway::SessionOrchestrator;

use crate::cli::{Command, JoinArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Config loading logs too, so it runs under a subscriber built from
    // RUST_LOG and --log-level alone.
    let provisional = tracing_subscriber::fmt()
        .with_env_filter(settings::env_filter(&settings::resolve_directive(
            args.log_level.as_deref(),
            None,
        )))
        .finish();
    let loaded = tracing::subscriber::with_default(provisional, || match &args.config {
        Some(path) => chorus_config::load_config_from(path),
        None => chorus_config::load_config(),
    });

    let directive = settings::resolve_directive(
        args.log_level.as_deref(),
        loaded.as_ref().ok().map(|config| config.logging.level),
    );
    tracing_subscriber::fmt()
        .with_env_filter(settings::env_filter(&directive))
        .init();

    tracing::info!("Chorus v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) if args.config.is_some() => {
            tracing::error!("Config load failed: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::warn!("Config load failed, using defaults: {e}");
            ChorusConfig::default()
        }
    };

    let result = match args.command {
        Command::Join(join_args) => join(join_args, &config).await,
        Command::Check { file } => check(&file).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn check(file: &std::path::Path) -> Result<(), ChorusError> {
    let text = credentials_file::read_source(file).await?;
    let report = credentials_file::check(&text);
    println!(
        "{} valid, {} invalid, {} duplicate",
        report.added, report.invalid, report.duplicate
    );
    if report.invalid > 0 {
        return Err(ChorusError::Credential(format!(
            "{} invalid line(s) in {}",
            report.invalid,
            file.display()
        )));
    }
    Ok(())
}

async fn join(args: JoinArgs, config: &ChorusConfig) -> Result<(), ChorusError> {
    let text = credentials_file::read_source(&args.file).await?;

    let (orchestrator, event_rx) = SessionOrchestrator::new(
        settings::orchestrator_config(config),
        settings::directory(config, args.no_lookup),
    );
    let event_log = tokio::spawn(events::log_events(event_rx));

    let imported = credentials_file::import(&orchestrator, &text).await;
    tracing::info!(
        added = imported.added,
        invalid = imported.invalid,
        duplicate = imported.duplicate,
        "Credentials loaded"
    );

    let joined = tokio::select! {
        report = orchestrator.join_all(&args.guild, &args.channel, args.presence()) => Some(report?),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted while joining");
            None
        }
    };

    if let Some(report) = joined {
        println!("joined {}/{}", report.succeeded, report.total);
        if report.succeeded > 0 {
            console::run(&orchestrator, !credentials_file::is_stdin(&args.file)).await;
        }
    }

    let left = orchestrator.leave_all(&args.guild, &args.channel).await?;
    println!("left with {left} session(s)");

    drop(orchestrator);
    event_log.abort();
    Ok(())
}
