use std::sync::Arc;
use tracing::{error, info};

use crate::cloud::{AssumeRoleRequest, CloudSessions, IamApi, MigrationError};
use crate::trust::policy::TrustPolicyDocument;
use crate::types::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Added,
    AlreadyPresent,
}

/// Reads and rewrites a member account's access-role trust document through
/// a role assumed into that account.
#[derive(Clone)]
pub struct TrustPolicyEditor {
    sessions: Arc<dyn CloudSessions>,
    session_name: String,
}

impl TrustPolicyEditor {
    pub fn new(sessions: Arc<dyn CloudSessions>, session_name: impl Into<String>) -> Self {
        Self {
            sessions,
            session_name: session_name.into(),
        }
    }

    async fn iam_for(
        &self,
        account_id: &AccountId,
        role_name: &str,
        acting_profile: &str,
    ) -> Result<Arc<dyn IamApi>, MigrationError> {
        let role = AssumeRoleRequest::for_account(account_id, role_name, &self.session_name);
        self.sessions.assumed_iam(acting_profile, &role).await
    }

    /// Let `granted_account` assume `role_name` in `account_id`, keeping every
    /// existing statement. Calling it again is a no-op.
    pub async fn grant_trust(
        &self,
        account_id: &AccountId,
        role_name: &str,
        granted_account: &AccountId,
        acting_profile: &str,
    ) -> Result<GrantOutcome, MigrationError> {
        self.try_grant(account_id, role_name, granted_account, acting_profile)
            .await
            .inspect_err(|e| {
                error!(
                    account_id = %account_id,
                    "Error adding {} to trust relationship of {}: {}",
                    granted_account, role_name, e
                )
            })
    }

    async fn try_grant(
        &self,
        account_id: &AccountId,
        role_name: &str,
        granted_account: &AccountId,
        acting_profile: &str,
    ) -> Result<GrantOutcome, MigrationError> {
        let iam = self.iam_for(account_id, role_name, acting_profile).await?;
        let raw = iam.get_assume_role_policy(role_name).await?;
        let mut document =
            TrustPolicyDocument::parse(&raw).map_err(|e| MigrationError::MalformedTrustPolicy {
                role_name: role_name.to_string(),
                message: e.to_string(),
            })?;

        if !document.grant_assume_role(&granted_account.root_principal_arn()) {
            info!(
                "Account {} is already in the trust relationship for role {}",
                granted_account, role_name
            );
            return Ok(GrantOutcome::AlreadyPresent);
        }

        let json = document
            .to_json()
            .map_err(|e| MigrationError::MalformedTrustPolicy {
                role_name: role_name.to_string(),
                message: e.to_string(),
            })?;
        iam.update_assume_role_policy(role_name, &json).await?;
        info!(
            "Added account {} to trust relationship for role {}",
            granted_account, role_name
        );
        Ok(GrantOutcome::Added)
    }

    /// Overwrite the trust document so `sole_trusted_account` is the only
    /// principal allowed to assume the role.
    pub async fn replace_trust(
        &self,
        account_id: &AccountId,
        role_name: &str,
        sole_trusted_account: &AccountId,
        acting_profile: &str,
    ) -> Result<(), MigrationError> {
        self.try_replace(account_id, role_name, sole_trusted_account, acting_profile)
            .await
            .inspect_err(|e| {
                error!(
                    account_id = %account_id,
                    "Error replacing trust relationship of {}: {}", role_name, e
                )
            })
    }

    async fn try_replace(
        &self,
        account_id: &AccountId,
        role_name: &str,
        sole_trusted_account: &AccountId,
        acting_profile: &str,
    ) -> Result<(), MigrationError> {
        let iam = self.iam_for(account_id, role_name, acting_profile).await?;
        let json = TrustPolicyDocument::sole_trust(sole_trusted_account.root_principal_arn())
            .to_json()
            .map_err(|e| MigrationError::MalformedTrustPolicy {
                role_name: role_name.to_string(),
                message: e.to_string(),
            })?;
        iam.update_assume_role_policy(role_name, &json).await?;
        info!("Replaced trust relationship for role {}", role_name);
        Ok(())
    }
}
