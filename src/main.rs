mod auth;
mod backup;
mod config;
mod database;
mod error;
mod log;
mod upload;

use auth::{AuthCodeProvider, ConsoleCodeProvider, StaticCodeProvider};
use backup::{BackupOrchestrator, DumpProducer, RunReport, RunState};
use config::AppConfig;
use console::style;
use database::DatabaseEnumerator;
use error::Result;
use tracing::{error, info};
use upload::DriveConnector;

#[tokio::main]
async fn main() {
    log::init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());
    let outcome = match command.as_str() {
        "run" => run_backup().await,
        "init" => write_default_config(),
        other => {
            eprintln!("Unknown command '{}'. Usage: sql-drive-backup [run|init]", other);
            std::process::exit(2);
        }
    };

    match outcome {
        Ok(true) => info!("Application exited normally"),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_backup() -> Result<bool> {
    let config = config::load()?;
    info!("SQL to Google Drive backup starting...");

    let orchestrator = build_orchestrator(&config);
    let report = orchestrator.run().await;
    print_summary(&report);

    Ok(report.state == RunState::Completed)
}

fn build_orchestrator(config: &AppConfig) -> BackupOrchestrator {
    let code_provider: Box<dyn AuthCodeProvider> = match &config.drive.auth_code {
        Some(code) => Box::new(StaticCodeProvider::new(code.clone())),
        None => Box::new(ConsoleCodeProvider),
    };

    BackupOrchestrator::new(
        Box::new(DriveConnector::new(&config.drive, code_provider)),
        Box::new(DatabaseEnumerator::from_config(config)),
        Box::new(DumpProducer::new(config)),
        config.drive.root_folder_name.clone(),
    )
}

fn write_default_config() -> Result<bool> {
    let path = config::config_path();
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(true);
    }

    config::save_to(&AppConfig::default(), &path)?;
    println!("Default configuration written to {}", style(path.display()).green());
    Ok(true)
}

fn print_summary(report: &RunReport) {
    println!();
    match report.state {
        RunState::Completed => println!(
            "{} {} of {} databases backed up in {} seconds",
            style("Backup completed:").green().bold(),
            report.succeeded(),
            report.outcomes.len(),
            report.duration_secs
        ),
        RunState::Aborted => {
            println!("{}", style("Backup aborted").red().bold());
            if let Some(reason) = &report.error {
                error!("{}", reason);
            }
        }
    }

    for done in report.outcomes.iter().filter(|o| o.succeeded()) {
        if let (Some(artifact), Some(folder)) = (&done.artifact, &done.folder_id) {
            println!(
                "  {} {} -> {} (folder {}, file {})",
                style("✓").green(),
                done.database,
                artifact.file_name,
                folder,
                done.remote_file_id.as_deref().unwrap_or("?")
            );
        }
    }

    for failed in report.failures() {
        println!(
            "  {} {}: {}",
            style("✗").red(),
            failed.database,
            failed.error.as_deref().unwrap_or_default()
        );
    }
}
