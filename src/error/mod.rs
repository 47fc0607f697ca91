//! Error types for stepwise.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all stepwise operations.
#[derive(Error, Debug)]
pub enum StepwiseError {
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Exceeded maximum of {max_steps} steps without a final answer")]
    MaxStepsExceeded { max_steps: usize },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Remote tool host error: {host}: {message}")]
    Remote { host: String, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl StepwiseError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a remote host error.
    pub fn remote(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ToolNotFound { .. } | Self::ToolExecution { .. } => {
                ErrorCategory::ToolExecution
            }
            Self::MaxStepsExceeded { .. } => ErrorCategory::Budget,
            Self::Inference(_) | Self::Stream(_) => ErrorCategory::Inference,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Network(_) => ErrorCategory::Network,
            Self::Remote { .. } => ErrorCategory::RemoteHost,
            Self::Configuration(_) | Self::Toml(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Inference,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether this error, raised during a run, ends the run.
    ///
    /// Tool-level errors are absorbed into tool results and never reach here
    /// from the loop itself.
    pub fn is_fatal_to_run(&self) -> bool {
        self.category() != ErrorCategory::ToolExecution
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Budget => RecoverySuggestion::IncreaseStepBudget,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::RemoteHost => RecoverySuggestion::CheckRemoteHost,
            _ => RecoverySuggestion::None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StepwiseError>;
