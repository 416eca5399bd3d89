//! Organization membership: leaving the source organization and joining the
//! target one through an invitation handshake.

use std::sync::Arc;
use tracing::{error, info};

use crate::cloud::retry::poll_until;
use crate::cloud::{AssumeRoleRequest, CloudSessions, MigrationError, PollConfig, PollOutcome, Sleeper};
use crate::trust::TrustPolicyEditor;
use crate::types::AccountId;

pub struct MembershipManager {
    sessions: Arc<dyn CloudSessions>,
    trust: TrustPolicyEditor,
    sleeper: Arc<dyn Sleeper>,
    poll: PollConfig,
    role_name: String,
    session_name: String,
}

impl MembershipManager {
    pub fn new(
        sessions: Arc<dyn CloudSessions>,
        sleeper: Arc<dyn Sleeper>,
        poll: PollConfig,
        role_name: impl Into<String>,
        session_name: impl Into<String>,
    ) -> Self {
        let session_name = session_name.into();
        Self {
            trust: TrustPolicyEditor::new(sessions.clone(), session_name.clone()),
            sessions,
            sleeper,
            poll,
            role_name: role_name.into(),
            session_name,
        }
    }

    pub async fn remove_from_source(
        &self,
        account_id: &AccountId,
        source_profile: &str,
    ) -> Result<(), MigrationError> {
        info!("Removing account {} from source organization...", account_id);
        let result: Result<(), MigrationError> = async {
            let org = self.sessions.organizations(source_profile).await?;
            org.remove_account(account_id).await
        }
        .await;

        match result {
            Ok(()) => {
                info!("Account {} removed from source organization", account_id);
                Ok(())
            }
            Err(e) => {
                error!(account_id = %account_id, "Error removing account: {}", e);
                Err(e)
            }
        }
    }

    /// Returns the id of the invitation handshake.
    pub async fn invite_to_target(
        &self,
        account_id: &AccountId,
        target_profile: &str,
    ) -> Result<String, MigrationError> {
        info!("Inviting account {} to target organization...", account_id);
        let result: Result<String, MigrationError> = async {
            let org = self.sessions.organizations(target_profile).await?;
            org.invite_account(account_id).await
        }
        .await;

        match result {
            Ok(handshake_id) => {
                info!("Invitation sent. Handshake ID: {}", handshake_id);
                Ok(handshake_id)
            }
            Err(e) => {
                error!(account_id = %account_id, "Error sending invitation: {}", e);
                Err(e)
            }
        }
    }

    /// Accept `handshake_id` from inside the member account, then lock its
    /// access role down to the target management account.
    ///
    /// The invitation may not be listed right away, so the member's pending
    /// invitations are polled with `PollConfig`. Nothing is accepted when the
    /// handshake never shows up.
    pub async fn accept_invitation(
        &self,
        handshake_id: &str,
        source_profile: &str,
        account_id: &AccountId,
        target_management: &AccountId,
    ) -> Result<(), MigrationError> {
        info!("Accepting invitation handshake {}...", handshake_id);
        self.try_accept(handshake_id, source_profile, account_id, target_management)
            .await
            .inspect_err(|e| {
                error!(account_id = %account_id, "Error accepting invitation: {}", e)
            })
    }

    async fn try_accept(
        &self,
        handshake_id: &str,
        source_profile: &str,
        account_id: &AccountId,
        target_management: &AccountId,
    ) -> Result<(), MigrationError> {
        let role = AssumeRoleRequest::for_account(account_id, &self.role_name, &self.session_name);
        let member_org = self
            .sessions
            .assumed_organizations(source_profile, &role)
            .await?;

        let outcome = poll_until(&self.poll, self.sleeper.as_ref(), "handshake", |_| {
            let member_org = member_org.clone();
            async move {
                let pending = member_org.list_invite_handshakes().await?;
                Ok(pending.iter().any(|id| id == handshake_id).then_some(()))
            }
        })
        .await?;

        if let PollOutcome::Exhausted { attempts } = outcome {
            return Err(MigrationError::HandshakeNotFound {
                handshake_id: handshake_id.to_string(),
                attempts,
            });
        }

        member_org.accept_handshake(handshake_id).await?;
        info!("Invitation accepted. Account has joined the target organization.");

        self.trust
            .replace_trust(account_id, &self.role_name, target_management, source_profile)
            .await
    }
}
