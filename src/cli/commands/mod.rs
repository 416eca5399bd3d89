pub mod migrate;

pub use migrate::{MigrateCommand, RunStatus};
