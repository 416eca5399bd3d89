use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::cloud::MigrationError;
use crate::migration::state::MigrationStage;
use crate::types::AccountId;

#[derive(Debug, Clone, PartialEq)]
pub enum AccountOutcome {
    Migrated {
        account_id: AccountId,
    },
    Failed {
        account_id: AccountId,
        stage: MigrationStage,
        error: MigrationError,
    },
}

impl AccountOutcome {
    pub fn account_id(&self) -> &AccountId {
        match self {
            AccountOutcome::Migrated { account_id } | AccountOutcome::Failed { account_id, .. } => {
                account_id
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AccountOutcome::Migrated { .. })
    }
}

/// Result of one batch run, in input order.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<AccountOutcome>,
    /// Set when the failure ceiling stopped the run with accounts left over.
    pub halted: bool,
    /// Accounts never attempted because of the ceiling.
    pub unvisited: usize,
}

impl MigrationReport {
    pub fn successful(&self) -> Vec<&AccountId> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(AccountOutcome::account_id)
            .collect()
    }

    pub fn failed(&self) -> Vec<&AccountId> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.is_success())
            .map(AccountOutcome::account_id)
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.successful().len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().len()
    }

    pub fn duration(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0 && !self.halted
    }

    pub fn log_summary(&self, error_log: &str) {
        info!("--- Migration Summary ---");
        info!("Successful migrations: {}", self.success_count());
        info!("Failed migrations: {}", self.failure_count());
        info!(
            "Run {} took {}s",
            self.run_id,
            self.duration().num_seconds()
        );
        if self.halted {
            info!(
                "Stopped early after reaching the failure limit; {} account(s) were not attempted",
                self.unvisited
            );
        }
        if self.failure_count() > 0 {
            let failed: Vec<&str> = self.failed().iter().map(|id| id.as_str()).collect();
            info!("Failed account IDs: {}", failed.join(", "));
            for outcome in &self.outcomes {
                if let AccountOutcome::Failed {
                    account_id,
                    stage,
                    error,
                } = outcome
                {
                    info!(
                        "  {} stopped after {} ({}): {}",
                        account_id,
                        stage,
                        error.category(),
                        error
                    );
                    if stage.left_source() {
                        warn!(
                            "  {} already left the source organization and needs manual follow-up",
                            account_id
                        );
                    }
                }
            }
            info!("Check the log file '{}' for detailed errors.", error_log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> AccountId {
        AccountId::new(raw).unwrap()
    }

    #[test]
    fn test_counts_keep_input_order() {
        let now = Utc::now();
        let report = MigrationReport {
            run_id: "run".to_string(),
            started_at: now,
            finished_at: now,
            outcomes: vec![
                AccountOutcome::Failed {
                    account_id: id("3"),
                    stage: MigrationStage::Pending,
                    error: MigrationError::NoOrganizationRoot,
                },
                AccountOutcome::Migrated { account_id: id("1") },
                AccountOutcome::Failed {
                    account_id: id("2"),
                    stage: MigrationStage::Invited,
                    error: MigrationError::NoOrganizationRoot,
                },
            ],
            halted: false,
            unvisited: 0,
        };

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.duration(), TimeDelta::zero());
        assert_eq!(report.failed(), vec![&id("3"), &id("2")]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_duration_spans_run() {
        let started_at = Utc::now();
        let report = MigrationReport {
            run_id: "run".to_string(),
            started_at,
            finished_at: started_at + TimeDelta::seconds(130),
            outcomes: Vec::new(),
            halted: false,
            unvisited: 0,
        };

        assert_eq!(report.duration().num_seconds(), 130);
        assert!(report.is_clean());
    }
}
