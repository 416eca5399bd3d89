// Account Mover Library - AWS organization account migration
// This exposes the core components for testing and integration

pub mod cli;
pub mod cloud;
pub mod config;
pub mod input;
pub mod membership;
pub mod migration;
pub mod placement;
pub mod telemetry;
pub mod trust;
pub mod types;

// Re-export key types for easy access
pub use cloud::{
    CloudSessions, ErrorCategory, IamApi, MigrationError, OrganizationsApi, PollConfig, Sleeper,
    TokioSleeper,
};
pub use config::MoverConfig;
pub use input::{load_accounts, LoadedAccounts};
pub use membership::MembershipManager;
pub use migration::{
    AccountOutcome, MigrationOrchestrator, MigrationReport, MigrationSettings, MigrationStage,
};
pub use placement::PlacementManager;
pub use telemetry::{create_migration_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use trust::{GrantOutcome, TrustPolicyDocument, TrustPolicyEditor};
pub use types::AccountId;
