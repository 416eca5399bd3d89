use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

use crate::cloud::{CloudSessions, MigrationError, PollConfig, Sleeper};
use crate::membership::MembershipManager;
use crate::migration::report::{AccountOutcome, MigrationReport};
use crate::migration::state::MigrationStage;
use crate::placement::PlacementManager;
use crate::telemetry::{create_migration_span, generate_correlation_id};
use crate::trust::TrustPolicyEditor;
use crate::types::AccountId;

/// Everything one batch run needs to know besides the account list.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationSettings {
    pub source_profile: String,
    pub target_profile: String,
    pub target_ou_id: String,
    pub role_name: String,
    pub session_name: String,
    pub max_failures: u32,
    pub settle_delay: Duration,
    pub poll: PollConfig,
}

/// Drives accounts one at a time through trust grant, removal, invitation,
/// acceptance and OU placement, stopping once `max_failures` accounts failed.
pub struct MigrationOrchestrator {
    sessions: Arc<dyn CloudSessions>,
    sleeper: Arc<dyn Sleeper>,
    settings: MigrationSettings,
    trust: TrustPolicyEditor,
    membership: MembershipManager,
    placement: PlacementManager,
}

impl MigrationOrchestrator {
    pub fn new(
        sessions: Arc<dyn CloudSessions>,
        sleeper: Arc<dyn Sleeper>,
        settings: MigrationSettings,
    ) -> Self {
        let trust = TrustPolicyEditor::new(sessions.clone(), settings.session_name.clone());
        let membership = MembershipManager::new(
            sessions.clone(),
            sleeper.clone(),
            settings.poll,
            settings.role_name.clone(),
            settings.session_name.clone(),
        );
        let placement = PlacementManager::new(sessions.clone());
        Self {
            sessions,
            sleeper,
            settings,
            trust,
            membership,
            placement,
        }
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    /// Resolve the target management account, then migrate `accounts`.
    ///
    /// Only a failure to resolve the management account is returned as an
    /// error; per-account failures end up in the report.
    pub async fn run(&self, accounts: &[AccountId]) -> Result<MigrationReport, MigrationError> {
        let target_management = self
            .sessions
            .caller_account(&self.settings.target_profile)
            .await
            .inspect_err(|e| error!("Could not resolve target management account: {}", e))?;
        info!("Target organization management account: {}", target_management);

        Ok(self.run_with_management(accounts, &target_management).await)
    }

    pub async fn run_with_management(
        &self,
        accounts: &[AccountId],
        target_management: &AccountId,
    ) -> MigrationReport {
        let run_id = generate_correlation_id();
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(accounts.len());
        let mut failure_count: u32 = 0;
        let mut halted = false;
        let mut unvisited = 0;

        for (index, account_id) in accounts.iter().enumerate() {
            if failure_count >= self.settings.max_failures {
                warn!(
                    "Stopping due to reaching max failures ({}).",
                    self.settings.max_failures
                );
                halted = true;
                unvisited = accounts.len() - index;
                break;
            }

            let span = create_migration_span(account_id, &run_id);
            let outcome = self
                .migrate_one(account_id, target_management)
                .instrument(span)
                .await;
            if !outcome.is_success() {
                failure_count += 1;
            }
            outcomes.push(outcome);
        }

        MigrationReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
            halted,
            unvisited,
        }
    }

    async fn migrate_one(
        &self,
        account_id: &AccountId,
        target_management: &AccountId,
    ) -> AccountOutcome {
        info!("Starting migration for account: {}", account_id);
        let mut stage = MigrationStage::Pending;

        match self
            .advance(account_id, target_management, &mut stage)
            .await
        {
            Ok(()) => {
                info!(
                    "Account {} has been successfully moved to the target organization and OU.",
                    account_id
                );
                AccountOutcome::Migrated {
                    account_id: account_id.clone(),
                }
            }
            Err(e) => {
                error!(
                    account_id = %account_id,
                    stage = %stage,
                    "Failed to move account {}: {}",
                    account_id,
                    e
                );
                AccountOutcome::Failed {
                    account_id: account_id.clone(),
                    stage,
                    error: e,
                }
            }
        }
    }

    async fn advance(
        &self,
        account_id: &AccountId,
        target_management: &AccountId,
        stage: &mut MigrationStage,
    ) -> Result<(), MigrationError> {
        let settings = &self.settings;

        // Must precede removal: the source profile loses its way into the
        // member role once the account leaves the organization.
        self.trust
            .grant_trust(
                account_id,
                &settings.role_name,
                target_management,
                &settings.source_profile,
            )
            .await?;
        *stage = MigrationStage::TrustGranted;

        self.membership
            .remove_from_source(account_id, &settings.source_profile)
            .await?;
        *stage = MigrationStage::RemovedFromSource;

        info!("Waiting for account removal to complete...");
        self.sleeper.sleep(settings.settle_delay).await;

        let handshake_id = self
            .membership
            .invite_to_target(account_id, &settings.target_profile)
            .await?;
        *stage = MigrationStage::Invited;

        self.membership
            .accept_invitation(
                &handshake_id,
                &settings.source_profile,
                account_id,
                target_management,
            )
            .await?;
        *stage = MigrationStage::Accepted;

        self.placement
            .move_to_ou(account_id, &settings.target_ou_id, &settings.target_profile)
            .await?;
        *stage = MigrationStage::Placed;

        Ok(())
    }
}
