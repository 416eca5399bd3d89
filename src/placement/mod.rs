use std::sync::Arc;
use tracing::{error, info};

use crate::cloud::{CloudSessions, MigrationError};
use crate::types::AccountId;

/// Moves freshly joined accounts from the organization root into an OU.
pub struct PlacementManager {
    sessions: Arc<dyn CloudSessions>,
}

impl PlacementManager {
    pub fn new(sessions: Arc<dyn CloudSessions>) -> Self {
        Self { sessions }
    }

    /// The account must currently sit directly under the root, which holds
    /// right after it accepts an invitation.
    pub async fn move_to_ou(
        &self,
        account_id: &AccountId,
        target_ou_id: &str,
        target_profile: &str,
    ) -> Result<(), MigrationError> {
        info!("Moving account {} to OU {}...", account_id, target_ou_id);
        self.try_move(account_id, target_ou_id, target_profile)
            .await
            .inspect_err(|e| error!(account_id = %account_id, "Error moving account to OU: {}", e))?;
        info!("Account {} moved to OU {}", account_id, target_ou_id);
        Ok(())
    }

    async fn try_move(
        &self,
        account_id: &AccountId,
        target_ou_id: &str,
        target_profile: &str,
    ) -> Result<(), MigrationError> {
        let org = self.sessions.organizations(target_profile).await?;
        let root_id = org
            .list_root_ids()
            .await?
            .into_iter()
            .next()
            .ok_or(MigrationError::NoOrganizationRoot)?;
        org.move_account(account_id, &root_id, target_ou_id).await
    }
}
