//! Filter Runner (§4.2): invokes the external filter binary with a single
//! filtergraph expression and hands back its raw stderr. It never
//! interprets filter-specific output — that is the analyzer's job.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::FilterError;
use crate::prober::{DEFAULT_OUTPUT_CAP_BYTES, DEFAULT_TIMEOUT};
use crate::CancellationToken;

/// One filtergraph invocation. `filter_expr` becomes a single `-vf`/
/// `-af`/`-filter_complex` argument, never shell-interpolated.
#[derive(Debug, Clone)]
pub struct FilterRequest {
    pub input: String,
    pub filter_expr: String,
    pub complex: bool,
    pub audio: bool,
    pub extra_args: Vec<String>,
    pub timeout: Duration,
    pub output_size_cap: u64,
}

impl FilterRequest {
    pub fn new(input: impl Into<String>, filter_expr: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            filter_expr: filter_expr.into(),
            complex: false,
            audio: false,
            extra_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            output_size_cap: DEFAULT_OUTPUT_CAP_BYTES,
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        if self.input.is_empty() {
            return Err(FilterError::EmptyInput);
        }
        Ok(())
    }

    fn build_argv(&self) -> Vec<String> {
        let mut argv = vec![
            "-hide_banner".to_owned(),
            "-loglevel".to_owned(),
            "error".to_owned(),
            "-nostats".to_owned(),
            "-i".to_owned(),
            self.input.clone(),
        ];
        let flag = if self.complex {
            "-filter_complex"
        } else if self.audio {
            "-af"
        } else {
            "-vf"
        };
        argv.push(flag.to_owned());
        argv.push(self.filter_expr.clone());
        argv.extend(self.extra_args.iter().cloned());
        argv.push("-f".to_owned());
        argv.push("null".to_owned());
        argv.push("-".to_owned());
        argv
    }
}

/// stdout is discarded (`-f null -`); every measurement a filter produces
/// is written to its own stderr lines, which analyzers parse themselves.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub stderr: String,
    pub elapsed: Duration,
}

pub struct FilterRunner {
    binary: String,
}

impl Default for FilterRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FilterRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, token), fields(input = %request.input))]
    pub async fn run(
        &self,
        request: &FilterRequest,
        token: &CancellationToken,
    ) -> Result<FilterOutput, FilterError> {
        request.validate()?;

        let argv = request.build_argv();
        debug!(?argv, "invoking filter");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&argv);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(FilterError::Spawn)?;
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let cap = request.output_size_cap;

        let stderr_bytes = tokio::select! {
            biased;
            _ = token.cancelled() => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Err(FilterError::Cancelled);
            }
            result = tokio::time::timeout(request.timeout, read_capped(&mut stderr, cap)) => {
                match result {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        let _ = child.kill().await;
                        let _ = child.wait().await;
                        return Err(FilterError::Timeout(request.timeout));
                    }
                }
            }
        };

        let status = child.wait().await.map_err(FilterError::Spawn)?;
        let stderr_text = String::from_utf8_lossy(&stderr_bytes).into_owned();

        if !status.success() {
            return Err(FilterError::NonZeroExit {
                status: status.code().unwrap_or(-1),
                stderr: stderr_text,
            });
        }

        Ok(FilterOutput {
            stderr: stderr_text,
            elapsed: start.elapsed(),
        })
    }
}

async fn read_capped<R: AsyncReadExt + Unpin>(reader: &mut R, cap: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() as u64 > cap {
                    break;
                }
            },
        }
    }
    buf
}

/// Computes the `percentile`-th value of `scores` in place (§4.5 pooling).
/// `percentile` is in `[0, 1]`.
pub fn percentile(scores: &mut [f64], percentile: f64) -> f64 {
    assert!(!scores.is_empty(), "percentile of an empty score set");
    let k = ((scores.len() - 1) as f64 * percentile) as usize;
    let (_, kth, _) =
        scores.select_nth_unstable_by(k, |a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Less));
    *kth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_vf_argv_by_default() {
        let req = FilterRequest::new("/tmp/a.mp4", "blackdetect=d=0:pix_th=0.1");
        assert_eq!(
            req.build_argv(),
            vec![
                "-hide_banner",
                "-loglevel",
                "error",
                "-nostats",
                "-i",
                "/tmp/a.mp4",
                "-vf",
                "blackdetect=d=0:pix_th=0.1",
                "-f",
                "null",
                "-",
            ]
        );
    }

    #[test]
    fn builds_af_argv_when_audio() {
        let req = FilterRequest {
            audio: true,
            ..FilterRequest::new("/tmp/a.wav", "ebur128")
        };
        assert_eq!(req.build_argv()[6], "-af");
    }

    #[test]
    fn percentile_of_singleton_is_that_value() {
        let mut scores = vec![42.0];
        assert_eq!(percentile(&mut scores, 0.5), 42.0);
    }

    #[test]
    fn percentile_picks_minimum_at_zero() {
        let mut scores = vec![3.0, 1.0, 2.0];
        assert_eq!(percentile(&mut scores, 0.0), 1.0);
    }

    #[test]
    fn percentile_picks_maximum_at_one() {
        let mut scores = vec![3.0, 1.0, 2.0];
        assert_eq!(percentile(&mut scores, 1.0), 3.0);
    }
}
