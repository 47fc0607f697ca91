//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Inference,
    ToolExecution,
    Budget,
    Cancellation,
    RateLimit,
    Network,
    Timeout,
    Server,
    RemoteHost,
    Configuration,
    Serialization,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    IncreaseStepBudget,
    IncreaseTimeout,
    CheckConfiguration,
    CheckToolImplementation,
    CheckRemoteHost,
    None,
}
