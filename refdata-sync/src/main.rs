use std::env;
use std::process::ExitCode;

use clap::Parser;
use refdata_cache::{ReloadOutcome, StartupOutcome};
use refdata_sync::{Cli, Command, Dependencies, SyncConfig, SyncError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            if let Err(e) = dotenv::from_filename(path) {
                eprintln!("Could not load {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    init_tracing();

    let result = tokio::select! {
        result = run(cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), SyncError> {
    let deps = Dependencies::new(SyncConfig::from_env()?);

    match command {
        Command::Index { data_types } => {
            let result = deps.orchestrator(&data_types).await?.run().await;
            let report = match &result {
                Ok(report) => Some(report),
                Err(e) => e.report(),
            };
            if let Some(report) = report {
                for (data_type, outcome) in &report.outcomes {
                    println!("{:<32} {}", data_type, outcome);
                }
                info!(indexed = report.indexed_total(), "Index run finished");
            }
            result?;
        }
        Command::WarmCache => {
            let outcome = deps.coordinator().await?.on_app_start().await?;
            match outcome {
                StartupOutcome::LockHeld => info!("Another process is populating the cache"),
                StartupOutcome::AlreadyCached => info!("Cache already populated"),
                StartupOutcome::Reloaded(reload) => report_reload(reload)?,
            }
        }
        Command::ReloadCache => {
            let outcome = deps.coordinator().await?.reload().await;
            report_reload(outcome)?;
        }
        Command::Show => {
            let blob = deps.coordinator().await?.get_reference_data().await?;
            println!("{}", serde_json::to_string_pretty(&blob.counts())?);
        }
        Command::ReconcileOrganizations => {
            let summary = deps.reconciler()?.run().await?;
            println!(
                "updated {} added {} total {}",
                summary.updated, summary.added, summary.total
            );
        }
    }

    Ok(())
}

fn report_reload(outcome: ReloadOutcome) -> Result<(), SyncError> {
    match outcome {
        ReloadOutcome::Ready(blob) => {
            info!(counts = ?blob.counts(), "Cache reloaded");
            Ok(())
        }
        ReloadOutcome::InProgress => {
            info!("Reload already running in another process");
            Ok(())
        }
        ReloadOutcome::Failed(cause) => Err(refdata_cache::CacheError::reload_failed(cause).into()),
    }
}
