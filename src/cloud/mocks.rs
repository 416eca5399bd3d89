// In-memory organizations and IAM roles for tests - no network calls

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cloud::{
    AssumeRoleRequest, CloudSessions, IamApi, MembershipOperation, MigrationError,
    OrganizationsApi, Sleeper,
};
use crate::trust::TrustPolicyDocument;
use crate::types::AccountId;

/// Every call the fake cloud served, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    CallerIdentity { profile: String },
    AssumeRole { profile: String, role_arn: String },
    GetRole { account: AccountId },
    UpdateRole { account: AccountId },
    Remove { account: AccountId },
    Invite { account: AccountId },
    ListHandshakes { account: AccountId },
    Accept { account: AccountId, handshake_id: String },
    ListRoots { management: AccountId },
    Move { account: AccountId, from: String, to: String },
}

impl FakeCall {
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            FakeCall::GetRole { account }
            | FakeCall::UpdateRole { account }
            | FakeCall::Remove { account }
            | FakeCall::Invite { account }
            | FakeCall::ListHandshakes { account }
            | FakeCall::Accept { account, .. }
            | FakeCall::Move { account, .. } => Some(account),
            _ => None,
        }
    }
}

/// Calls that can be made to fail for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    AssumeRole,
    GetRole,
    UpdateRole,
    Remove,
    Invite,
    Accept,
    Move,
}

#[derive(Debug)]
struct FakeOrganization {
    management: AccountId,
    root_ids: Vec<String>,
    ous: HashSet<String>,
}

#[derive(Debug)]
struct FakeAccount {
    organization: Option<AccountId>,
    parent: Option<String>,
    trust: TrustPolicyDocument,
    polls: u32,
    visible_on_poll: u32,
}

#[derive(Debug)]
struct FakeHandshake {
    account: AccountId,
    inviter: AccountId,
    accepted: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    profiles: HashMap<String, AccountId>,
    organizations: HashMap<AccountId, FakeOrganization>,
    accounts: HashMap<AccountId, FakeAccount>,
    handshakes: HashMap<String, FakeHandshake>,
    failures: HashSet<(FailPoint, AccountId)>,
    calls: Vec<FakeCall>,
    next_handshake: u32,
}

impl FakeState {
    fn check(&self, point: FailPoint, account: &AccountId) -> Result<(), MigrationError> {
        if !self.failures.contains(&(point, account.clone())) {
            return Ok(());
        }
        let message = "injected failure".to_string();
        let target = format!("account {account}");
        Err(match point {
            FailPoint::AssumeRole => MigrationError::AssumeRole {
                role_arn: account.role_arn("*"),
                message,
            },
            FailPoint::GetRole => MigrationError::TrustPolicyRead {
                role_name: "*".to_string(),
                message,
            },
            FailPoint::UpdateRole => MigrationError::TrustPolicyWrite {
                role_name: "*".to_string(),
                message,
            },
            FailPoint::Remove => {
                MigrationError::membership(MembershipOperation::Remove, target, message)
            }
            FailPoint::Invite => {
                MigrationError::membership(MembershipOperation::Invite, target, message)
            }
            FailPoint::Accept => {
                MigrationError::membership(MembershipOperation::Accept, target, message)
            }
            FailPoint::Move => MigrationError::membership(MembershipOperation::Move, target, message),
        })
    }

    fn management_for(&self, profile: &str) -> Result<AccountId, MigrationError> {
        self.profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| MigrationError::Credentials {
                profile: profile.to_string(),
                message: "profile not configured".to_string(),
            })
    }

    fn account_mut(
        &mut self,
        account: &AccountId,
        operation: MembershipOperation,
    ) -> Result<&mut FakeAccount, MigrationError> {
        self.accounts.get_mut(account).ok_or_else(|| {
            MigrationError::membership(operation, format!("account {account}"), "AccountNotFoundException")
        })
    }
}

/// Shared handle to a simulated pair of organizations.
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an organization reachable through `profile`.
    pub fn add_organization(&self, profile: &str, management: &AccountId, root_id: &str, ous: &[&str]) {
        let mut state = self.state();
        state.profiles.insert(profile.to_string(), management.clone());
        state.organizations.insert(
            management.clone(),
            FakeOrganization {
                management: management.clone(),
                root_ids: vec![root_id.to_string()],
                ous: ous.iter().map(|ou| ou.to_string()).collect(),
            },
        );
    }

    /// Member account parented at the organization root, whose access role
    /// trusts only the organization's management account.
    pub fn add_member_account(&self, account: &AccountId, management: &AccountId) {
        let mut state = self.state();
        let parent = state
            .organizations
            .get(management)
            .and_then(|org| org.root_ids.first().cloned());
        state.accounts.insert(
            account.clone(),
            FakeAccount {
                organization: Some(management.clone()),
                parent,
                trust: TrustPolicyDocument::sole_trust(management.root_principal_arn()),
                polls: 0,
                visible_on_poll: 1,
            },
        );
    }

    pub fn set_trust_document(&self, account: &AccountId, document: TrustPolicyDocument) {
        if let Some(entry) = self.state().accounts.get_mut(account) {
            entry.trust = document;
        }
    }

    pub fn fail_on(&self, point: FailPoint, account: &AccountId) {
        self.state().failures.insert((point, account.clone()));
    }

    pub fn deny_assume_role(&self, account: &AccountId) {
        self.fail_on(FailPoint::AssumeRole, account);
    }

    /// Invitations for `account` only show up from the `poll`-th listing on.
    pub fn set_handshake_visible_on_poll(&self, account: &AccountId, poll: u32) {
        if let Some(entry) = self.state().accounts.get_mut(account) {
            entry.visible_on_poll = poll;
        }
    }

    pub fn clear_root_ids(&self, management: &AccountId) {
        if let Some(org) = self.state().organizations.get_mut(management) {
            org.root_ids.clear();
        }
    }

    pub fn trust_document(&self, account: &AccountId) -> Option<TrustPolicyDocument> {
        self.state().accounts.get(account).map(|a| a.trust.clone())
    }

    pub fn organization_of(&self, account: &AccountId) -> Option<AccountId> {
        self.state()
            .accounts
            .get(account)
            .and_then(|a| a.organization.clone())
    }

    pub fn parent_of(&self, account: &AccountId) -> Option<String> {
        self.state().accounts.get(account).and_then(|a| a.parent.clone())
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state().calls.clone()
    }

    pub fn calls_for(&self, account: &AccountId) -> Vec<FakeCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.account() == Some(account))
            .collect()
    }

    fn assumed_account(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<AccountId, MigrationError> {
        let mut state = self.state();
        state.calls.push(FakeCall::AssumeRole {
            profile: profile.to_string(),
            role_arn: role.role_arn.clone(),
        });

        let denied = |message: &str| MigrationError::AssumeRole {
            role_arn: role.role_arn.clone(),
            message: message.to_string(),
        };
        let account_id = role
            .role_arn
            .strip_prefix("arn:aws:iam::")
            .and_then(|rest| rest.split(':').next())
            .ok_or_else(|| denied("malformed role ARN"))?;
        let account = AccountId::new(account_id)?;

        state.check(FailPoint::AssumeRole, &account)?;
        let caller = state.management_for(profile)?;
        let entry = state
            .accounts
            .get(&account)
            .ok_or_else(|| denied("no such account"))?;
        if !entry.trust.trusts(&caller.root_principal_arn()) {
            return Err(denied("AccessDenied: caller is not trusted by the role"));
        }
        Ok(account)
    }
}

#[async_trait]
impl CloudSessions for FakeCloud {
    async fn organizations(
        &self,
        profile: &str,
    ) -> Result<Arc<dyn OrganizationsApi>, MigrationError> {
        let management = self.state().management_for(profile)?;
        Ok(Arc::new(FakeOrganizations {
            cloud: self.clone(),
            caller: Caller::Management(management),
        }))
    }

    async fn assumed_organizations(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<Arc<dyn OrganizationsApi>, MigrationError> {
        let account = self.assumed_account(profile, role)?;
        Ok(Arc::new(FakeOrganizations {
            cloud: self.clone(),
            caller: Caller::Member(account),
        }))
    }

    async fn assumed_iam(
        &self,
        profile: &str,
        role: &AssumeRoleRequest,
    ) -> Result<Arc<dyn IamApi>, MigrationError> {
        let account = self.assumed_account(profile, role)?;
        Ok(Arc::new(FakeIam {
            cloud: self.clone(),
            account,
        }))
    }

    async fn caller_account(&self, profile: &str) -> Result<AccountId, MigrationError> {
        let mut state = self.state();
        state.calls.push(FakeCall::CallerIdentity {
            profile: profile.to_string(),
        });
        state.management_for(profile)
    }
}

#[derive(Debug, Clone)]
enum Caller {
    Management(AccountId),
    Member(AccountId),
}

struct FakeOrganizations {
    cloud: FakeCloud,
    caller: Caller,
}

impl FakeOrganizations {
    fn management(&self, operation: MembershipOperation) -> Result<&AccountId, MigrationError> {
        match &self.caller {
            Caller::Management(management) => Ok(management),
            Caller::Member(account) => Err(MigrationError::membership(
                operation,
                format!("account {account}"),
                "AccessDeniedException: caller is not a management account",
            )),
        }
    }

    fn member(&self, operation: MembershipOperation) -> Result<&AccountId, MigrationError> {
        match &self.caller {
            Caller::Member(account) => Ok(account),
            Caller::Management(management) => Err(MigrationError::membership(
                operation,
                format!("account {management}"),
                "caller is not the invited account",
            )),
        }
    }
}

#[async_trait]
impl OrganizationsApi for FakeOrganizations {
    async fn remove_account(&self, account_id: &AccountId) -> Result<(), MigrationError> {
        let management = self.management(MembershipOperation::Remove)?.clone();
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::Remove {
            account: account_id.clone(),
        });
        state.check(FailPoint::Remove, account_id)?;

        let reject = |message: &str| {
            MigrationError::membership(
                MembershipOperation::Remove,
                format!("account {account_id}"),
                message,
            )
        };
        if *account_id == management {
            return Err(reject("ConstraintViolationException: cannot remove the management account"));
        }
        let entry = state.account_mut(account_id, MembershipOperation::Remove)?;
        if entry.organization.as_ref() != Some(&management) {
            return Err(reject("AccountNotFoundException: account is not a member"));
        }
        entry.organization = None;
        entry.parent = None;
        Ok(())
    }

    async fn invite_account(&self, account_id: &AccountId) -> Result<String, MigrationError> {
        let management = self.management(MembershipOperation::Invite)?.clone();
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::Invite {
            account: account_id.clone(),
        });
        state.check(FailPoint::Invite, account_id)?;

        let entry = state.account_mut(account_id, MembershipOperation::Invite)?;
        if entry.organization.is_some() {
            return Err(MigrationError::membership(
                MembershipOperation::Invite,
                format!("account {account_id}"),
                "DuplicateAccountException: account already belongs to an organization",
            ));
        }
        entry.polls = 0;

        state.next_handshake += 1;
        let handshake_id = format!("h-{:08}", state.next_handshake);
        state.handshakes.insert(
            handshake_id.clone(),
            FakeHandshake {
                account: account_id.clone(),
                inviter: management,
                accepted: false,
            },
        );
        Ok(handshake_id)
    }

    async fn list_invite_handshakes(&self) -> Result<Vec<String>, MigrationError> {
        let account = self.member(MembershipOperation::ListHandshakes)?.clone();
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::ListHandshakes {
            account: account.clone(),
        });

        let entry = state.account_mut(&account, MembershipOperation::ListHandshakes)?;
        entry.polls += 1;
        if entry.polls < entry.visible_on_poll {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = state
            .handshakes
            .iter()
            .filter(|(_, handshake)| handshake.account == account && !handshake.accepted)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn accept_handshake(&self, handshake_id: &str) -> Result<(), MigrationError> {
        let account = self.member(MembershipOperation::Accept)?.clone();
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::Accept {
            account: account.clone(),
            handshake_id: handshake_id.to_string(),
        });
        state.check(FailPoint::Accept, &account)?;

        let reject = |message: &str| {
            MigrationError::membership(
                MembershipOperation::Accept,
                format!("handshake {handshake_id}"),
                message,
            )
        };
        let inviter = match state.handshakes.get_mut(handshake_id) {
            Some(handshake) if handshake.account == account && !handshake.accepted => {
                handshake.accepted = true;
                handshake.inviter.clone()
            }
            _ => return Err(reject("HandshakeNotFoundException")),
        };
        let root = state
            .organizations
            .get(&inviter)
            .and_then(|org| org.root_ids.first().cloned());
        let entry = state.account_mut(&account, MembershipOperation::Accept)?;
        entry.organization = Some(inviter);
        entry.parent = root;
        Ok(())
    }

    async fn list_root_ids(&self) -> Result<Vec<String>, MigrationError> {
        let management = self.management(MembershipOperation::ListRoots)?.clone();
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::ListRoots {
            management: management.clone(),
        });
        Ok(state
            .organizations
            .get(&management)
            .map(|org| org.root_ids.clone())
            .unwrap_or_default())
    }

    async fn move_account(
        &self,
        account_id: &AccountId,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> Result<(), MigrationError> {
        let management = self.management(MembershipOperation::Move)?.clone();
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::Move {
            account: account_id.clone(),
            from: source_parent_id.to_string(),
            to: destination_parent_id.to_string(),
        });
        state.check(FailPoint::Move, account_id)?;

        let reject = |message: &str| {
            MigrationError::membership(
                MembershipOperation::Move,
                format!("account {account_id}"),
                message,
            )
        };
        let known_ou = state
            .organizations
            .get(&management)
            .is_some_and(|org| org.management == management && org.ous.contains(destination_parent_id));
        if !known_ou {
            return Err(reject("DestinationParentNotFoundException"));
        }
        let entry = state.account_mut(account_id, MembershipOperation::Move)?;
        if entry.organization.as_ref() != Some(&management) {
            return Err(reject("AccountNotFoundException"));
        }
        if entry.parent.as_deref() != Some(source_parent_id) {
            return Err(reject("SourceParentNotFoundException"));
        }
        entry.parent = Some(destination_parent_id.to_string());
        Ok(())
    }
}

struct FakeIam {
    cloud: FakeCloud,
    account: AccountId,
}

#[async_trait]
impl IamApi for FakeIam {
    async fn get_assume_role_policy(&self, role_name: &str) -> Result<String, MigrationError> {
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::GetRole {
            account: self.account.clone(),
        });
        state.check(FailPoint::GetRole, &self.account)?;

        let json = state
            .accounts
            .get(&self.account)
            .map(|entry| entry.trust.to_json())
            .transpose()
            .map_err(|e| MigrationError::TrustPolicyRead {
                role_name: role_name.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| MigrationError::TrustPolicyRead {
                role_name: role_name.to_string(),
                message: "NoSuchEntity".to_string(),
            })?;
        // IAM hands the document back URL-encoded.
        Ok(utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string())
    }

    async fn update_assume_role_policy(
        &self,
        role_name: &str,
        policy_document: &str,
    ) -> Result<(), MigrationError> {
        let mut state = self.cloud.state();
        state.calls.push(FakeCall::UpdateRole {
            account: self.account.clone(),
        });
        state.check(FailPoint::UpdateRole, &self.account)?;

        let document = TrustPolicyDocument::parse(policy_document).map_err(|e| {
            MigrationError::TrustPolicyWrite {
                role_name: role_name.to_string(),
                message: format!("MalformedPolicyDocument: {e}"),
            }
        })?;
        if let Some(entry) = state.accounts.get_mut(&self.account) {
            entry.trust = document;
        }
        Ok(())
    }
}

/// Sleeper that returns immediately and remembers what it was asked to wait.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}
