//! AWS SDK implementation of the cloud seams.
//!
//! Every call site builds its clients from scratch: a named profile is
//! resolved through the shared config chain, and assumed-role clients get
//! static credentials from a fresh STS `AssumeRole`.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_organizations::types::{ActionType, HandshakeFilter, HandshakeParty, HandshakePartyType};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::cloud::{
    AssumeRoleRequest, CloudSessions, IamApi, MembershipOperation, MigrationError,
    OrganizationsApi,
};
use crate::types::AccountId;

/// Pending invitations only; `INVITE` on the wire.
fn invite_filter() -> HandshakeFilter {
    HandshakeFilter::builder()
        .action_type(ActionType::InviteAccountToOrganization)
        .build()
}

/// Full error chain of an SDK failure, including the service error code.
fn describe<E: std::error::Error>(err: E) -> String {
    aws_sdk_organizations::error::DisplayErrorContext(err).to_string()
}

#[derive(Debug, Default, Clone)]
pub struct AwsSessions;

impl AwsSessions {
    pub fn new() -> Self {
        Self
    }

    async fn profile_config(&self, profile: &str) -> SdkConfig {
        aws_config::defaults(BehaviorVersion::latest())
            .profile_name(profile)
            .load()
            .await
    }

    async fn assume(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<(SdkConfig, aws_sdk_sts::config::Credentials), MigrationError> {
        let base = self.profile_config(profile).await;
        let sts = aws_sdk_sts::Client::new(&base);

        let output = sts
            .assume_role()
            .role_arn(&role.role_arn)
            .role_session_name(&role.session_name)
            .send()
            .await
            .map_err(|e| MigrationError::AssumeRole {
                role_arn: role.role_arn.clone(),
                message: describe(e),
            })?;

        let issued = output.credentials().ok_or_else(|| MigrationError::AssumeRole {
            role_arn: role.role_arn.clone(),
            message: "response carried no credentials".to_string(),
        })?;

        debug!(role_arn = %role.role_arn, "Assumed role");

        let credentials = aws_sdk_sts::config::Credentials::new(
            issued.access_key_id(),
            issued.secret_access_key(),
            Some(issued.session_token().to_string()),
            SystemTime::try_from(*issued.expiration()).ok(),
            "AssumeRole",
        );
        Ok((base, credentials))
    }
}

#[async_trait]
impl CloudSessions for AwsSessions {
    async fn organizations(
        &self,
        profile: &str,
    ) -> Result<Arc<dyn OrganizationsApi>, MigrationError> {
        let config = self.profile_config(profile).await;
        Ok(Arc::new(AwsOrganizations {
            client: aws_sdk_organizations::Client::new(&config),
        }))
    }

    async fn assumed_organizations(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<Arc<dyn OrganizationsApi>, MigrationError> {
        let (base, credentials) = self.assume(profile, role).await?;
        let config = aws_sdk_organizations::config::Builder::from(&base)
            .credentials_provider(credentials)
            .build();
        Ok(Arc::new(AwsOrganizations {
            client: aws_sdk_organizations::Client::from_conf(config),
        }))
    }

    async fn assumed_iam(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<Arc<dyn IamApi>, MigrationError> {
        let (base, credentials) = self.assume(profile, role).await?;
        let config = aws_sdk_iam::config::Builder::from(&base)
            .credentials_provider(credentials)
            .build();
        Ok(Arc::new(AwsIam {
            client: aws_sdk_iam::Client::from_conf(config),
        }))
    }

    async fn caller_account(&self, profile: &str) -> Result<AccountId, MigrationError> {
        let config = self.profile_config(profile).await;
        let identity = aws_sdk_sts::Client::new(&config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| MigrationError::Credentials {
                profile: profile.to_string(),
                message: describe(e),
            })?;

        let account = identity.account().ok_or_else(|| MigrationError::Credentials {
            profile: profile.to_string(),
            message: "caller identity carried no account id".to_string(),
        })?;
        AccountId::new(account)
    }
}

pub struct AwsOrganizations {
    client: aws_sdk_organizations::Client,
}

#[async_trait]
impl OrganizationsApi for AwsOrganizations {
    async fn remove_account(&self, account_id: &AccountId) -> Result<(), MigrationError> {
        self.client
            .remove_account_from_organization()
            .account_id(account_id.as_str())
            .send()
            .await
            .map_err(|e| {
                MigrationError::membership(
                    MembershipOperation::Remove,
                    format!("account {account_id}"),
                    describe(e),
                )
            })?;
        Ok(())
    }

    async fn invite_account(&self, account_id: &AccountId) -> Result<String, MigrationError> {
        let invite_error = |message: String| {
            MigrationError::membership(
                MembershipOperation::Invite,
                format!("account {account_id}"),
                message,
            )
        };

        let target = HandshakeParty::builder()
            .id(account_id.as_str())
            .r#type(HandshakePartyType::Account)
            .build()
            .map_err(|e| invite_error(e.to_string()))?;

        let output = self
            .client
            .invite_account_to_organization()
            .target(target)
            .send()
            .await
            .map_err(|e| invite_error(describe(e)))?;

        output
            .handshake()
            .and_then(|handshake| handshake.id())
            .map(str::to_string)
            .ok_or_else(|| invite_error("response carried no handshake id".to_string()))
    }

    async fn list_invite_handshakes(&self) -> Result<Vec<String>, MigrationError> {
        let filter = invite_filter();

        let mut ids = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_handshakes_for_account()
                .filter(filter.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    MigrationError::membership(
                        MembershipOperation::ListHandshakes,
                        "pending invitations",
                        describe(e),
                    )
                })?;

            ids.extend(
                page.handshakes()
                    .iter()
                    .filter_map(|handshake| handshake.id().map(str::to_string)),
            );

            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(ids)
    }

    async fn accept_handshake(&self, handshake_id: &str) -> Result<(), MigrationError> {
        self.client
            .accept_handshake()
            .handshake_id(handshake_id)
            .send()
            .await
            .map_err(|e| {
                MigrationError::membership(
                    MembershipOperation::Accept,
                    format!("handshake {handshake_id}"),
                    describe(e),
                )
            })?;
        Ok(())
    }

    async fn list_root_ids(&self) -> Result<Vec<String>, MigrationError> {
        let output = self
            .client
            .list_roots()
            .send()
            .await
            .map_err(|e| {
                MigrationError::membership(MembershipOperation::ListRoots, "organization", describe(e))
            })?;

        Ok(output
            .roots()
            .iter()
            .filter_map(|root| root.id().map(str::to_string))
            .collect())
    }

    async fn move_account(
        &self,
        account_id: &AccountId,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> Result<(), MigrationError> {
        self.client
            .move_account()
            .account_id(account_id.as_str())
            .source_parent_id(source_parent_id)
            .destination_parent_id(destination_parent_id)
            .send()
            .await
            .map_err(|e| {
                MigrationError::membership(
                    MembershipOperation::Move,
                    format!("account {account_id}"),
                    describe(e),
                )
            })?;
        Ok(())
    }
}

pub struct AwsIam {
    client: aws_sdk_iam::Client,
}

#[async_trait]
impl IamApi for AwsIam {
    async fn get_assume_role_policy(&self, role_name: &str) -> Result<String, MigrationError> {
        let output = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| MigrationError::TrustPolicyRead {
                role_name: role_name.to_string(),
                message: describe(e),
            })?;

        output
            .role()
            .and_then(|role| role.assume_role_policy_document())
            .map(str::to_string)
            .ok_or_else(|| MigrationError::TrustPolicyRead {
                role_name: role_name.to_string(),
                message: "role carried no assume-role policy document".to_string(),
            })
    }

    async fn update_assume_role_policy(
        &self,
        role_name: &str,
        policy_document: &str,
    ) -> Result<(), MigrationError> {
        self.client
            .update_assume_role_policy()
            .role_name(role_name)
            .policy_document(policy_document)
            .send()
            .await
            .map_err(|e| MigrationError::TrustPolicyWrite {
                role_name: role_name.to_string(),
                message: describe(e),
            })?;
        Ok(())
    }
}
