//! CLI error types

use proclock_scheduler::SchedulerError;
use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A replay step was rejected by the scheduler
    #[error("Step {index} ({action}) failed: {source}")]
    Step {
        /// Zero-based step index
        index: usize,
        /// Step action name
        action: &'static str,
        /// Scheduler error
        #[source]
        source: SchedulerError,
    },

    /// A replay step could not be turned into a lock request
    #[error("Step {index}: {message}")]
    InvalidStep {
        /// Zero-based step index
        index: usize,
        /// What is wrong with it
        message: String,
    },

    /// Scheduler error outside a replay step
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),
}
