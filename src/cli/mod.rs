use clap::Parser;
use std::path::PathBuf;

use crate::config::MoverConfig;

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "account-mover")]
#[command(version)]
#[command(about = "Move AWS accounts from one organization to another")]
#[command(long_about = "Reads account ids from a CSV file and moves each account out of the source \
                       organization, into the target organization, and under the given OU. \
                       Stops after too many accounts fail.")]
pub struct Cli {
    /// CSV file with an `account_id` column
    #[arg(long, help = "Path to the CSV file containing account IDs")]
    pub csv_file: PathBuf,

    /// Profile for the source organization's management account
    #[arg(long, help = "AWS CLI profile for the source organization")]
    pub source_profile: String,

    /// Profile for the target organization's management account
    #[arg(long, help = "AWS CLI profile for the target organization")]
    pub target_profile: String,

    /// Destination organizational unit in the target organization
    #[arg(long, help = "Target OU ID in the destination organization")]
    pub target_ou_id: String,

    #[arg(long, help = "Maximum number of failed accounts before stopping [default: 3]")]
    pub max_failures: Option<u32>,

    #[arg(long, help = "File that receives error logs [default: migration_errors.log]")]
    pub log_file: Option<PathBuf>,

    #[arg(long, help = "Access role assumed in each member account")]
    pub role_name: Option<String>,

    #[arg(long, help = "Seconds to wait after removing an account from the source organization")]
    pub settle_seconds: Option<u64>,

    #[arg(long, help = "Configuration file (defaults to ./account-mover.toml when present)")]
    pub config: Option<PathBuf>,

    /// Validate the input and print the plan without contacting AWS
    #[arg(long, help = "Show what would be migrated without making changes")]
    pub dry_run: bool,

    #[arg(long, help = "Emit console logs as JSON")]
    pub json_logs: bool,
}

impl Cli {
    /// Command-line options take precedence over file and environment values.
    pub fn apply_overrides(&self, config: &mut MoverConfig) {
        if let Some(max_failures) = self.max_failures {
            config.migration.max_failures = max_failures;
        }
        if let Some(log_file) = &self.log_file {
            config.logging.error_log_path = log_file.display().to_string();
        }
        if let Some(role_name) = &self.role_name {
            config.migration.access_role_name = role_name.clone();
        }
        if let Some(settle_seconds) = self.settle_seconds {
            config.migration.settle_delay_seconds = settle_seconds;
        }
        if self.json_logs {
            config.logging.log_format = "json".to_string();
        }
    }
}
