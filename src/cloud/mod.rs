//! Seams between the migration workflow and the cloud provider.
//!
//! The workflow only talks to these traits. `aws` provides the SDK-backed
//! implementation used by the binary, `mocks` an in-memory organization used
//! by tests.

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::AccountId;

pub mod aws;
pub mod errors;
pub mod mocks;
pub mod retry;

pub use errors::{ErrorCategory, MembershipOperation, MigrationError};
pub use retry::{PollConfig, PollOutcome, Sleeper, TokioSleeper};

/// Role to assume inside a member account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub session_name: String,
}

impl AssumeRoleRequest {
    pub fn for_account(account_id: &AccountId, role_name: &str, session_name: &str) -> Self {
        Self {
            role_arn: account_id.role_arn(role_name),
            session_name: session_name.to_string(),
        }
    }
}

/// Organization management calls used by the workflow.
#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    async fn remove_account(&self, account_id: &AccountId) -> Result<(), MigrationError>;

    /// Returns the id of the created handshake.
    async fn invite_account(&self, account_id: &AccountId) -> Result<String, MigrationError>;

    /// Ids of the invitation handshakes visible to the calling account.
    async fn list_invite_handshakes(&self) -> Result<Vec<String>, MigrationError>;

    async fn accept_handshake(&self, handshake_id: &str) -> Result<(), MigrationError>;

    async fn list_root_ids(&self) -> Result<Vec<String>, MigrationError>;

    async fn move_account(
        &self,
        account_id: &AccountId,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> Result<(), MigrationError>;
}

/// Role trust document calls used by the workflow.
#[async_trait]
pub trait IamApi: Send + Sync {
    /// The role's assume-role policy as raw JSON.
    async fn get_assume_role_policy(&self, role_name: &str) -> Result<String, MigrationError>;

    async fn update_assume_role_policy(
        &self,
        role_name: &str,
        policy_document: &str,
    ) -> Result<(), MigrationError>;
}

/// Hands out fresh clients per operation, either for a named profile or for
/// a role assumed through that profile.
#[async_trait]
pub trait CloudSessions: Send + Sync {
    async fn organizations(&self, profile: &str)
        -> Result<Arc<dyn OrganizationsApi>, MigrationError>;

    async fn assumed_organizations(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<Arc<dyn OrganizationsApi>, MigrationError>;

    async fn assumed_iam(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<Arc<dyn IamApi>, MigrationError>;

    /// Account id behind `profile`'s credentials.
    async fn caller_account(&self, profile: &str) -> Result<AccountId, MigrationError>;
}
