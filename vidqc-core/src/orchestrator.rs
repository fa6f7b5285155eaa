//! Content Orchestrator (§4.4): fans out the analyzer catalogue with
//! bounded concurrency, applies every successful result to the master
//! report on a single writer, and never fails the whole analysis because
//! one analyzer failed.
//!
//! Teacher grounding: `av1an-core::broker` runs a bounded worker pool over
//! a crossbeam channel; this translates the same "bounded pool, collect,
//! single writer" shape onto `tokio::sync::Semaphore` + `JoinSet`, which is
//! the idiomatic async equivalent for a crate built on the `tokio` runtime.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::analyzers::{catalogue, AnalysisContext, AnalyzerSpec};
use crate::error::AnalysisError;
use crate::filter::FilterRunner;
use crate::prober::{Prober, ProbeOptions};
use crate::report::{AnalysisReport, EnhancedReport};
use crate::CancellationToken;

/// Bounded-parallel fan-out settings (§5). `content_analysis` is the
/// single toggle collapsing the source catalogue's "standard" and
/// "advanced" invocation paths (§9 Open Question, resolved in DESIGN.md).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrency: usize,
    pub content_analysis: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            max_concurrency: cpus.min(8),
            content_analysis: true,
        }
    }
}

pub struct ContentOrchestrator {
    prober: Arc<Prober>,
    filter: Arc<FilterRunner>,
    config: OrchestratorConfig,
}

impl Default for ContentOrchestrator {
    fn default() -> Self {
        Self::new(Prober::default(), FilterRunner::default(), OrchestratorConfig::default())
    }
}

impl ContentOrchestrator {
    pub fn new(prober: Prober, filter: FilterRunner, config: OrchestratorConfig) -> Self {
        Self {
            prober: Arc::new(prober),
            filter: Arc::new(filter),
            config,
        }
    }

    /// Probes `input` for the primary report, then (unless
    /// `content_analysis` is disabled) runs every analyzer in the
    /// catalogue and folds their output into `report.enhanced`.
    #[tracing::instrument(level = "info", skip(self, token), fields(input))]
    pub async fn analyze(
        &self,
        input: &str,
        token: &CancellationToken,
    ) -> Result<AnalysisReport, AnalysisError> {
        let primary_options = ProbeOptions {
            show_format: true,
            show_streams: true,
            show_chapters: true,
            show_programs: true,
            ..ProbeOptions::for_input(input)
        };
        // Fatal by design (§4.4): a failed primary probe aborts the whole
        // analysis rather than running analyzers against absent data.
        let mut report = self.prober.probe(&primary_options, token).await?;

        if !self.config.content_analysis {
            return Ok(report);
        }

        let enhanced = self.run_analyzers(input, &report, token).await;
        report.enhanced = enhanced;
        Ok(report)
    }

    async fn run_analyzers(
        &self,
        input: &str,
        primary: &AnalysisReport,
        token: &CancellationToken,
    ) -> EnhancedReport {
        let child_token = token.child_token();
        let primary = Arc::new(primary.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for AnalyzerSpec { name, run } in catalogue() {
            let ctx = AnalysisContext {
                prober: self.prober.clone(),
                filter: self.filter.clone(),
                token: child_token.clone(),
                primary: primary.clone(),
            };
            let permits = semaphore.clone();
            let input = input.to_owned();
            join_set.spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore never closed");
                (name, run(ctx, input).await)
            });
        }

        let mut enhanced = EnhancedReport::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_name, Ok(apply))) => apply(&mut enhanced),
                Ok((name, Err(err))) => {
                    warn!(analyzer = name, error = %err, "analyzer failed, omitting sub-report");
                },
                Err(join_err) if join_err.is_cancelled() => {},
                Err(join_err) => {
                    warn!(error = %join_err, "analyzer task panicked, omitting sub-report");
                },
            }
        }

        enhanced
    }
}

/// Surface A entry point (§6): a one-shot orchestrator over default
/// collaborators. Callers that need to reuse a `Prober`/`FilterRunner`
/// across many requests should construct a [`ContentOrchestrator`]
/// directly instead.
pub async fn analyze_content(input: &str) -> Result<AnalysisReport, AnalysisError> {
    let orchestrator = ContentOrchestrator::default();
    let token = CancellationToken::new();
    orchestrator.analyze(input, &token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FormatRecord, InputDescriptor};
    use uuid::Uuid;

    fn empty_report() -> AnalysisReport {
        AnalysisReport {
            id: Uuid::new_v4(),
            input: InputDescriptor {
                location: "/tmp/a.mp4".to_owned(),
                is_url: false,
                bytes_size: None,
                content_hash: None,
            },
            format: FormatRecord::default(),
            streams: Vec::new(),
            chapters: Vec::new(),
            programs: Vec::new(),
            enhanced: EnhancedReport::default(),
            exit_code: 0,
            success: true,
            elapsed: std::time::Duration::from_secs(0),
        }
    }

    /// A stub `ffprobe` that ignores its argv and exits 0 with empty
    /// stdout, so `Prober::probe` succeeds with an empty report without
    /// needing a real media file or a real ffprobe binary on `PATH`.
    fn stub_prober() -> (Prober, tempfile::TempPath) {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(script, "#!/bin/sh\nexit 0").unwrap();
        let mut perms = script.as_file().metadata().unwrap().permissions();
        perms.set_mode(0o755);
        script.as_file().set_permissions(perms).unwrap();
        let path = script.into_temp_path();
        (Prober::new(path.to_path_buf()), path)
    }

    #[tokio::test]
    async fn disabling_content_analysis_runs_no_analyzers() {
        let (prober, _script) = stub_prober();
        let orchestrator =
            ContentOrchestrator::new(prober, FilterRunner::default(), OrchestratorConfig {
                max_concurrency: 4,
                content_analysis: false,
            });
        let input = tempfile::NamedTempFile::new().unwrap();
        let token = CancellationToken::new();

        // Drive the public entry point, not `run_analyzers` directly: the
        // `content_analysis` gate lives in `analyze`, one level above the
        // helper this test used to call.
        let report = orchestrator
            .analyze(input.path().to_str().unwrap(), &token)
            .await
            .expect("primary probe against the stub binary succeeds");

        let default_json = serde_json::to_string(&EnhancedReport::default()).unwrap();
        assert_eq!(serde_json::to_string(&report.enhanced).unwrap(), default_json);
    }

    #[tokio::test]
    async fn analyzers_with_no_matching_streams_are_omitted_not_fatal() {
        let orchestrator = ContentOrchestrator::new(
            Prober::default(),
            FilterRunner::default(),
            OrchestratorConfig {
                max_concurrency: 4,
                content_analysis: true,
            },
        );
        let primary = empty_report();
        let token = CancellationToken::new();
        let enhanced = orchestrator.run_analyzers("/tmp/a.mp4", &primary, &token).await;
        // stream_counts never touches the Prober/Filter, so it always succeeds.
        assert_eq!(enhanced.stream_counts.unwrap().video, 0);
        // resolution requires a video stream; absent here, so omitted.
        assert!(enhanced.resolution.is_none());
    }
}
