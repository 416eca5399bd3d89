use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use account_mover::cli::commands::{MigrateCommand, RunStatus};
use account_mover::cli::Cli;
use account_mover::config::MoverConfig;
use account_mover::telemetry::{init_telemetry, shutdown_telemetry, TelemetrySettings};
use account_mover::MigrationError;

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let status = match run(cli) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("❌ {e:#}");
            if let Some(migration_error) = e.downcast_ref::<MigrationError>() {
                eprintln!("💡 {}", migration_error.remediation());
            }
            RunStatus::Incomplete
        }
    };

    shutdown_telemetry();
    std::process::exit(status.exit_code());
}

fn run(cli: Cli) -> Result<RunStatus> {
    let mut config = MoverConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    init_telemetry(&TelemetrySettings {
        log_level: config.logging.log_level.clone(),
        json: config.logging.log_format == "json",
        // Dry runs leave the error log untouched.
        error_log_path: (!cli.dry_run).then(|| PathBuf::from(&config.logging.error_log_path)),
    })?;

    let command = MigrateCommand::new(
        cli.csv_file,
        cli.source_profile,
        cli.target_profile,
        cli.target_ou_id,
        config,
    )
    .with_dry_run(cli.dry_run);

    tokio::runtime::Runtime::new()?.block_on(async { command.execute().await })
}
