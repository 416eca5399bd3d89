pub mod orchestrator;
pub mod report;
pub mod state;

pub use orchestrator::{MigrationOrchestrator, MigrationSettings};
pub use report::{AccountOutcome, MigrationReport};
pub use state::MigrationStage;
