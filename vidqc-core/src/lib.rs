//! Media analysis core.
//!
//! Probes and filters are external processes; this crate only builds their
//! argument vectors, runs them under a deadline, and interprets what comes
//! back. Nothing here decodes or re-encodes media itself.

pub mod analyzers;
pub mod batch;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod prober;
pub mod quality;
pub mod ratelimit;
pub mod report;
pub mod util;
pub mod worker_client;

pub use tokio_util::sync::CancellationToken;

pub use error::AnalysisError;
pub use report::AnalysisReport;

pub use orchestrator::{analyze_content, ContentOrchestrator, OrchestratorConfig};
pub use prober::{probe_file, probe_url, ProbeOptions, Prober};
pub use quality::{compare_quality, QualityComparator, QualityResult};
pub use ratelimit::{select_identifier, IdentifierPolicy, RateLimiter};
pub use batch::{BatchHandle, BatchRunner, BatchStore};
pub use worker_client::WorkerClient;
