//! Error taxonomy for the analysis core.
//!
//! Each component gets its own `thiserror` enum so call sites can match on
//! the failure kind that actually matters to them (a caller retrying a
//! timeout does not want to also handle "batch store full"). [`AnalysisError`]
//! is the union type returned at the crate boundary (Surface A); every
//! component error converts into it via `#[from]`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised validating or running the Prober.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("input is empty")]
    EmptyInput,
    #[error("input path does not exist: {0}")]
    FileNotFound(PathBuf),
    #[error("input path is not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("input contains a disallowed shell metacharacter: {0:?}")]
    ShellMetacharacter(char),
    #[error("timeout {0:?} exceeds the 60 minute cap")]
    TimeoutTooLarge(Duration),
    #[error("timeout must be greater than zero")]
    TimeoutZero,
    #[error("output size cap {0} exceeds the 1 GiB cap")]
    OutputCapTooLarge(u64),
    #[error("show-entries expression rejected by grammar: {0:?}")]
    InvalidShowEntries(String),
    #[error("stream selector expression rejected by grammar: {0:?}")]
    InvalidStreamSelector(String),
    #[error("read-interval expression rejected by grammar: {0:?}")]
    InvalidReadInterval(String),
    #[error("failed to launch prober: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("prober timed out after {0:?}")]
    Timeout(Duration),
    #[error("prober output exceeded the {cap} byte cap ({} bytes captured before truncation)", partial.len())]
    OutputTooLarge { cap: u64, partial: Vec<u8> },
    #[error("failed to parse prober output: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("prober report failed internal consistency checks: {0}")]
    InvalidReport(String),
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors raised invoking the Filter engine.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("input is empty")]
    EmptyInput,
    #[error("failed to launch filter: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("filter timed out after {0:?}")]
    Timeout(Duration),
    #[error("filter exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors raised by an individual analyzer.
///
/// Orchestrated runs swallow these (§4.4); they only surface when an
/// analyzer is invoked directly.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("required prober field missing: {0}")]
    MissingField(&'static str),
}

/// Errors raised by the quality comparator.
#[derive(Debug, Error)]
pub enum QualityError {
    #[error("no metrics were requested")]
    NoMetrics,
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("failed to parse {metric} measurement output: {reason}")]
    Parse { metric: &'static str, reason: String },
}

/// Errors raised by the rate limiter.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("caller {identifier} is over quota; retry after {retry_after:?}")]
    Exceeded {
        identifier: String,
        retry_after: Duration,
    },
}

/// Errors raised by the batch store.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch job {0} not found")]
    NotFound(uuid::Uuid),
}

/// Errors raised by the optional remote worker client.
#[derive(Debug, Error)]
pub enum WorkerClientError {
    #[error("worker client is not configured")]
    NotConfigured,
    #[error("health probe failed: {0}")]
    HealthCheckFailed(#[source] reqwest::Error),
    #[error("remote analysis request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("remote worker reported failure: {0}")]
    RemoteError(String),
}

/// Union error type returned at the crate boundary (Surface A).
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    WorkerClient(#[from] WorkerClientError),
}

impl AnalysisError {
    /// Stable, user-facing kind tag. No internal paths or stack traces —
    /// only the enum discriminant and the `Display` message are exposed.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Probe(ProbeError::Timeout(_)) | Self::Filter(FilterError::Timeout(_)) => {
                "timeout"
            },
            Self::Probe(ProbeError::OutputTooLarge { .. }) => "resource_exceeded",
            Self::Probe(ProbeError::Parse(_)) | Self::Probe(ProbeError::InvalidReport(_)) => {
                "parse"
            },
            Self::Probe(ProbeError::Cancelled) | Self::Filter(FilterError::Cancelled) => {
                "cancellation"
            },
            Self::Probe(
                ProbeError::EmptyInput
                | ProbeError::FileNotFound(_)
                | ProbeError::NotAFile(_)
                | ProbeError::ShellMetacharacter(_)
                | ProbeError::TimeoutTooLarge(_)
                | ProbeError::TimeoutZero
                | ProbeError::OutputCapTooLarge(_)
                | ProbeError::InvalidShowEntries(_)
                | ProbeError::InvalidStreamSelector(_)
                | ProbeError::InvalidReadInterval(_),
            ) => "validation",
            Self::Filter(FilterError::EmptyInput) => "validation",
            Self::Probe(_) | Self::Filter(_) | Self::Analyzer(_) | Self::Quality(_) => {
                "execution"
            },
            Self::RateLimit(_) => "rate_limited",
            Self::Batch(_) => "validation",
            Self::WorkerClient(_) => "execution",
        }
    }
}
