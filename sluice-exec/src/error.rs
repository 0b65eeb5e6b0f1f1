use thiserror::Error;

use crate::feed::FeedError;
use sluice_strategy::StrategyError;

/// Convenience alias for engine results.
pub type ExecResult<T> = Result<T, ExecError>;

/// Failures surfaced by the execution engine.
///
/// Construction and seeding failures abort `execute` and bubble to the
/// caller; everything that happens after the engine is live is surfaced to
/// observers through the event bus instead.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The engine was constructed with invalid options.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Historical seeding failed before going live.
    #[error("seeding failed: {0}")]
    Seed(#[source] FeedError),
    /// A feed collaborator failed.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
    /// A strategy callback failed.
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    /// The engine has already been stopped.
    #[error("execution already stopped")]
    Stopped,
}
