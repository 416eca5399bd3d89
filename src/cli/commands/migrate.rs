use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cloud::aws::AwsSessions;
use crate::cloud::{CloudSessions, Sleeper, TokioSleeper};
use crate::config::MoverConfig;
use crate::input::load_accounts;
use crate::migration::{MigrationOrchestrator, MigrationReport, MigrationSettings};
use crate::types::AccountId;

/// How the process should exit once the command returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Clean,
    Incomplete,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Clean => 0,
            RunStatus::Incomplete => 1,
        }
    }
}

pub struct MigrateCommand {
    pub csv_file: PathBuf,
    pub source_profile: String,
    pub target_profile: String,
    pub target_ou_id: String,
    pub config: MoverConfig,
    pub dry_run: bool,
}

impl MigrateCommand {
    pub fn new(
        csv_file: PathBuf,
        source_profile: String,
        target_profile: String,
        target_ou_id: String,
        config: MoverConfig,
    ) -> Self {
        Self {
            csv_file,
            source_profile,
            target_profile,
            target_ou_id,
            config,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn settings(&self) -> MigrationSettings {
        let migration = &self.config.migration;
        MigrationSettings {
            source_profile: self.source_profile.clone(),
            target_profile: self.target_profile.clone(),
            target_ou_id: self.target_ou_id.clone(),
            role_name: migration.access_role_name.clone(),
            session_name: migration.role_session_name.clone(),
            max_failures: migration.max_failures,
            settle_delay: migration.settle_delay(),
            poll: migration.poll_config(),
        }
    }

    pub async fn execute(&self) -> Result<RunStatus> {
        self.execute_with(Arc::new(AwsSessions::new()), Arc::new(TokioSleeper))
            .await
    }

    pub async fn execute_with(
        &self,
        sessions: Arc<dyn CloudSessions>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<RunStatus> {
        let loaded = load_accounts(&self.csv_file)
            .with_context(|| format!("Failed to load accounts from {}", self.csv_file.display()))?;
        if !loaded.skipped_rows.is_empty() {
            warn!("Skipped {} row(s) without an account id", loaded.skipped_rows.len());
        }
        info!(
            "Loaded {} account(s) from {}",
            loaded.accounts.len(),
            self.csv_file.display()
        );

        if self.dry_run {
            self.print_plan(&loaded.accounts)?;
            return Ok(RunStatus::Clean);
        }

        let orchestrator = MigrationOrchestrator::new(sessions, sleeper, self.settings());
        let report = orchestrator
            .run(&loaded.accounts)
            .await
            .context("Migration could not start")?;

        report.log_summary(&self.config.logging.error_log_path);
        Ok(status_of(&report))
    }

    fn print_plan(&self, accounts: &[AccountId]) -> Result<()> {
        let settings = self.settings();
        println!("DRY RUN - no AWS calls will be made");
        println!();
        println!("Source profile:  {}", settings.source_profile);
        println!("Target profile:  {}", settings.target_profile);
        println!("Target OU:       {}", settings.target_ou_id);
        println!("Access role:     {}", settings.role_name);
        println!("Max failures:    {}", settings.max_failures);
        println!();
        println!("Accounts to migrate ({}):", accounts.len());
        for (index, account_id) in accounts.iter().enumerate() {
            println!("  {}. {}", index + 1, account_id);
        }
        println!();
        println!("Effective configuration:");
        println!("{}", self.config.to_toml()?);
        Ok(())
    }
}

fn status_of(report: &MigrationReport) -> RunStatus {
    if report.is_clean() {
        RunStatus::Clean
    } else {
        RunStatus::Incomplete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::mocks::{FailPoint, FakeCall, FakeCloud, RecordingSleeper};
    use std::io::Write;

    fn csv_with(ids: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "account_id,name").unwrap();
        for id in ids {
            writeln!(file, "{id},workload").unwrap();
        }
        file
    }

    fn command(csv: &tempfile::NamedTempFile) -> MigrateCommand {
        MigrateCommand::new(
            csv.path().to_path_buf(),
            "source".to_string(),
            "target".to_string(),
            "ou-dest".to_string(),
            MoverConfig::default(),
        )
    }

    fn cloud_with(members: &[&str]) -> FakeCloud {
        let cloud = FakeCloud::new();
        let source = AccountId::new("100000000000").unwrap();
        let target = AccountId::new("200000000000").unwrap();
        cloud.add_organization("source", &source, "r-src", &[]);
        cloud.add_organization("target", &target, "r-dst", &["ou-dest"]);
        for member in members {
            cloud.add_member_account(&AccountId::new(*member).unwrap(), &source);
        }
        cloud
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let csv = csv_with(&["111111111111"]);
        let cloud = cloud_with(&["111111111111"]);

        let status = command(&csv)
            .with_dry_run(true)
            .execute_with(Arc::new(cloud.clone()), Arc::new(RecordingSleeper::new()))
            .await
            .unwrap();

        assert_eq!(status, RunStatus::Clean);
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_successful_run_is_clean() {
        let csv = csv_with(&["111111111111"]);
        let cloud = cloud_with(&["111111111111"]);

        let status = command(&csv)
            .execute_with(Arc::new(cloud.clone()), Arc::new(RecordingSleeper::new()))
            .await
            .unwrap();

        assert_eq!(status, RunStatus::Clean);
        assert_eq!(status.exit_code(), 0);
        assert_eq!(
            cloud.calls().first(),
            Some(&FakeCall::CallerIdentity {
                profile: "target".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_account_failure_is_incomplete() {
        let csv = csv_with(&["111111111111"]);
        let cloud = cloud_with(&["111111111111"]);
        cloud.fail_on(FailPoint::Remove, &AccountId::new("111111111111").unwrap());

        let status = command(&csv)
            .execute_with(Arc::new(cloud), Arc::new(RecordingSleeper::new()))
            .await
            .unwrap();

        assert_eq!(status.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_unknown_target_profile_is_error() {
        let csv = csv_with(&["111111111111"]);
        let cloud = FakeCloud::new();

        let result = command(&csv)
            .execute_with(Arc::new(cloud), Arc::new(RecordingSleeper::new()))
            .await;

        assert!(result.is_err());
    }
}
