use std::fmt;
use thiserror::Error;

/// Organization API calls that can fail for a single account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOperation {
    Remove,
    Invite,
    ListHandshakes,
    Accept,
    ListRoots,
    Move,
}

impl fmt::Display for MembershipOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MembershipOperation::Remove => "remove-account-from-organization",
            MembershipOperation::Invite => "invite-account-to-organization",
            MembershipOperation::ListHandshakes => "list-handshakes-for-account",
            MembershipOperation::Accept => "accept-handshake",
            MembershipOperation::ListRoots => "list-roots",
            MembershipOperation::Move => "move-account",
        };
        f.write_str(name)
    }
}

/// Coarse grouping used in logs and the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    TrustPolicy,
    Membership,
    HandshakeTimeout,
    Input,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::TrustPolicy => "trust-policy",
            ErrorCategory::Membership => "membership",
            ErrorCategory::HandshakeTimeout => "handshake-timeout",
            ErrorCategory::Input => "input",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MigrationError {
    #[error("Could not load credentials for profile '{profile}': {message}")]
    Credentials { profile: String, message: String },
    #[error("Failed to assume role {role_arn}: {message}")]
    AssumeRole { role_arn: String, message: String },
    #[error("Failed to read trust policy of role {role_name}: {message}")]
    TrustPolicyRead { role_name: String, message: String },
    #[error("Failed to write trust policy of role {role_name}: {message}")]
    TrustPolicyWrite { role_name: String, message: String },
    #[error("Trust policy of role {role_name} is not a valid policy document: {message}")]
    MalformedTrustPolicy { role_name: String, message: String },
    #[error("{operation} failed for {target}: {message}")]
    Membership {
        operation: MembershipOperation,
        target: String,
        message: String,
    },
    #[error("Organization has no root container")]
    NoOrganizationRoot,
    #[error("Handshake {handshake_id} not found after {attempts} attempts")]
    HandshakeNotFound { handshake_id: String, attempts: u32 },
    #[error("Invalid account id: '{raw}'")]
    InvalidAccountId { raw: String },
    #[error("Could not read account list {path}: {message}")]
    Input { path: String, message: String },
}

impl MigrationError {
    /// `target` names what the call acted on, e.g. `account 111122223333`.
    pub fn membership(
        operation: MembershipOperation,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrationError::Membership {
            operation,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MigrationError::Credentials { .. } | MigrationError::AssumeRole { .. } => {
                ErrorCategory::Authentication
            }
            MigrationError::TrustPolicyRead { .. }
            | MigrationError::TrustPolicyWrite { .. }
            | MigrationError::MalformedTrustPolicy { .. } => ErrorCategory::TrustPolicy,
            MigrationError::Membership { .. } | MigrationError::NoOrganizationRoot => {
                ErrorCategory::Membership
            }
            MigrationError::HandshakeNotFound { .. } => ErrorCategory::HandshakeTimeout,
            MigrationError::InvalidAccountId { .. } | MigrationError::Input { .. } => {
                ErrorCategory::Input
            }
        }
    }

    /// Operator-facing hint printed next to setup failures.
    pub fn remediation(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Authentication => {
                "Check the profile with `aws sts get-caller-identity --profile <name>` and that the access role exists in the member account"
            }
            ErrorCategory::TrustPolicy => {
                "Inspect the role with `aws iam get-role --role-name <name>` from the member account"
            }
            ErrorCategory::Membership => {
                "Verify the account is a member (not the management account) and the OU id exists"
            }
            ErrorCategory::HandshakeTimeout => {
                "The invitation may still be propagating; check `aws organizations list-handshakes-for-account` in the member account"
            }
            ErrorCategory::Input => "The input CSV needs a header row with an `account_id` column",
        }
    }
}
