// Bounded fixed-interval polling for eventually consistent organization state

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::cloud::MigrationError;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(10),
        }
    }
}

/// Time source for deliberate waits, swapped out in tests.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Found { value: T, attempt: u32 },
    Exhausted { attempts: u32 },
}

/// Run `check` up to `config.max_attempts` times, pausing `config.interval`
/// after every miss. Check errors end the poll immediately.
pub async fn poll_until<T, F, Fut>(
    config: &PollConfig,
    sleeper: &dyn Sleeper,
    waiting_for: &str,
    mut check: F,
) -> Result<PollOutcome<T>, MigrationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, MigrationError>>,
{
    for attempt in 1..=config.max_attempts {
        if let Some(value) = check(attempt).await? {
            debug!(attempt, "{} observed", waiting_for);
            return Ok(PollOutcome::Found { value, attempt });
        }
        info!(
            "Waiting for {} to propagate... (attempt {}/{})",
            waiting_for, attempt, config.max_attempts
        );
        sleeper.sleep(config.interval).await;
    }

    Ok(PollOutcome::Exhausted {
        attempts: config.max_attempts,
    })
}
