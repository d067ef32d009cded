use thiserror::Error;

/// Programmer errors: fatal, surfaced immediately rather than degraded.
/// Provider failures never reach this type; they are converted to health
/// states at the cache boundary.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Unknown metric key: {0}")]
    UnknownMetric(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Failure kinds a provider adapter can report. All of them are treated
/// uniformly as "fetch failed" for cache purposes; the kind is logged for
/// observability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limited")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Series not found: {0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}
