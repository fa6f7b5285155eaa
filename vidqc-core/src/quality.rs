//! Quality Comparator (§4.5): reference-vs-distorted measurement via the
//! Filter Runner, with percentile pooling grounded in
//! `av1an-core::vmaf::get_percentile`.

use serde::{Deserialize, Serialize};

use crate::error::QualityError;
use crate::filter::{percentile, FilterRequest};
use crate::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Vmaf,
    Psnr,
    Ssim,
    Mse,
    MsSsim,
    Lpips,
}

impl MetricKind {
    fn name(self) -> &'static str {
        match self {
            Self::Vmaf => "VMAF",
            Self::Psnr => "PSNR",
            Self::Ssim => "SSIM",
            Self::Mse => "MSE",
            Self::MsSsim => "MS-SSIM",
            Self::Lpips => "LPIPS",
        }
    }

    fn filter_expr(self) -> &'static str {
        match self {
            Self::Vmaf => "libvmaf=log_fmt=json:log_path=-",
            // The psnr filter emits both mse_avg and psnr_avg per frame;
            // Mse reuses the same invocation and reads the other field.
            Self::Psnr | Self::Mse => "psnr=stats_file=-",
            Self::Ssim | Self::MsSsim => "ssim=stats_file=-",
            Self::Lpips => "libvmaf=log_fmt=json:log_path=-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolingMethod {
    Mean,
    HarmonicMean,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetric {
    pub frame_number: u64,
    pub timestamp: f64,
    pub score: f64,
    pub per_plane: Vec<f64>,
}

const PERCENTILE_POINTS: &[f64] = &[0.01, 0.05, 0.10, 0.25, 0.75, 0.90, 0.95, 0.99];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMeasurement {
    pub metric: MetricKind,
    pub overall_score: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub percentiles: Vec<(u8, f64)>,
    pub frame_count: usize,
    pub rating: Rating,
    pub frames: Option<Vec<FrameMetric>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResult {
    pub measurements: Vec<QualityMeasurement>,
    pub overall_rating: Option<Rating>,
    pub status: ComparisonStatus,
}

#[derive(Debug, Clone)]
pub struct QualityConfig {
    pub pooling: PoolingMethod,
    pub frame_level: bool,
    /// Source frame rate, used to convert a `FrameMetric`'s frame number
    /// into a timestamp. Neither `psnr` nor `ssim` report `pts_time` in
    /// their stderr output, only a frame index, so the caller supplies
    /// this (e.g. from the primary report's `frame_rate.effective_fps`).
    /// When absent, the frame index is used as the timestamp unchanged.
    pub frame_rate: Option<f64>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            pooling: PoolingMethod::Mean,
            frame_level: false,
            frame_rate: None,
        }
    }
}

fn rate(metric: MetricKind, score: f64) -> Rating {
    // MSE is an error metric: unlike every other metric modeled here,
    // near zero is best, so the threshold comparison direction inverts.
    if metric == MetricKind::Mse {
        let thresholds = [2.0, 8.0, 20.0];
        return if score <= thresholds[0] {
            Rating::Excellent
        } else if score <= thresholds[1] {
            Rating::Good
        } else if score <= thresholds[2] {
            Rating::Fair
        } else {
            Rating::Poor
        };
    }

    let thresholds = match metric {
        MetricKind::Vmaf | MetricKind::Lpips => [95.0, 85.0, 75.0, 60.0],
        MetricKind::Psnr => [40.0, 35.0, 30.0, 25.0],
        MetricKind::Ssim | MetricKind::MsSsim => [0.95, 0.90, 0.85, 0.80],
        MetricKind::Mse => unreachable!("handled above"),
    };
    if score >= thresholds[0] {
        Rating::Excellent
    } else if score >= thresholds[1] {
        Rating::Good
    } else if score >= thresholds[2] {
        Rating::Fair
    } else {
        Rating::Poor
    }
}

fn pool(scores: &[f64], method: PoolingMethod) -> f64 {
    match method {
        PoolingMethod::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
        PoolingMethod::HarmonicMean => {
            scores.len() as f64 / scores.iter().map(|s| 1.0 / s.max(1e-9)).sum::<f64>()
        },
        PoolingMethod::Min => scores.iter().cloned().fold(f64::INFINITY, f64::min),
    }
}

fn std_dev(scores: &[f64], mean: f64) -> f64 {
    let variance =
        scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    variance.sqrt()
}

/// Parses per-frame scores out of a filter's stderr. VMAF's libvmaf JSON
/// log is piped to `log_path=-` (stdout in this runner's model is
/// discarded, so we read it off stderr like every other filter here);
/// PSNR/SSIM write one `n:<frame> ... <metric>:<value>` line per frame.
fn parse_frame_scores(metric: MetricKind, stderr: &str) -> Vec<f64> {
    match metric {
        MetricKind::Vmaf | MetricKind::Lpips => crate::regex!(r#""vmaf"\s*:\s*([0-9.]+)"#)
            .captures_iter(stderr)
            .filter_map(|c| c[1].parse().ok())
            .collect(),
        MetricKind::Psnr => crate::regex!(r"psnr_avg:([0-9.]+|inf)")
            .captures_iter(stderr)
            .filter_map(|c| {
                if &c[1] == "inf" {
                    Some(100.0)
                } else {
                    c[1].parse().ok()
                }
            })
            .collect(),
        // mse_avg is never "inf": a perfect match is 0.0, not an unbounded value.
        MetricKind::Mse => crate::regex!(r"mse_avg:([0-9.]+)")
            .captures_iter(stderr)
            .filter_map(|c| c[1].parse().ok())
            .collect(),
        MetricKind::Ssim | MetricKind::MsSsim => crate::regex!(r"All:([0-9.]+)")
            .captures_iter(stderr)
            .filter_map(|c| c[1].parse().ok())
            .collect(),
    }
}

/// Parses the per-plane (Y/U/V) breakdown the `psnr`/`ssim` filters emit
/// alongside their averaged score, one `Vec<f64>` of `[y, u, v]` per frame.
/// VMAF/LPIPS have no plane breakdown in this process model.
fn parse_per_plane_scores(metric: MetricKind, stderr: &str) -> Vec<Vec<f64>> {
    fn parse_component(s: &str) -> f64 {
        if s == "inf" {
            100.0
        } else {
            s.parse().unwrap_or(0.0)
        }
    }

    match metric {
        MetricKind::Psnr => crate::regex!(r"psnr_y:([0-9.]+|inf)\s+psnr_u:([0-9.]+|inf)\s+psnr_v:([0-9.]+|inf)")
            .captures_iter(stderr)
            .map(|c| vec![parse_component(&c[1]), parse_component(&c[2]), parse_component(&c[3])])
            .collect(),
        MetricKind::Mse => crate::regex!(r"mse_y:([0-9.]+)\s+mse_u:([0-9.]+)\s+mse_v:([0-9.]+)")
            .captures_iter(stderr)
            .map(|c| vec![parse_component(&c[1]), parse_component(&c[2]), parse_component(&c[3])])
            .collect(),
        MetricKind::Ssim | MetricKind::MsSsim => {
            crate::regex!(r"Y:([0-9.]+)\s+U:([0-9.]+)\s+V:([0-9.]+)")
                .captures_iter(stderr)
                .map(|c| vec![parse_component(&c[1]), parse_component(&c[2]), parse_component(&c[3])])
                .collect()
        },
        MetricKind::Vmaf | MetricKind::Lpips => Vec::new(),
    }
}

pub struct QualityComparator;

impl QualityComparator {
    #[tracing::instrument(level = "info", skip(token))]
    pub async fn compare(
        &self,
        reference: &str,
        distorted: &str,
        metrics: &[MetricKind],
        config: &QualityConfig,
        filter: &crate::filter::FilterRunner,
        token: &CancellationToken,
    ) -> Result<QualityResult, QualityError> {
        if metrics.is_empty() {
            return Err(QualityError::NoMetrics);
        }

        let mut measurements = Vec::new();
        for &metric in metrics {
            match self.run_one(reference, distorted, metric, config, filter, token).await {
                Ok(m) => measurements.push(m),
                Err(err) => {
                    tracing::warn!(metric = metric.name(), error = %err, "metric failed, skipping");
                },
            }
        }

        if measurements.is_empty() {
            return Ok(QualityResult {
                measurements,
                overall_rating: None,
                status: ComparisonStatus::Failed,
            });
        }

        let overall_rating = measurements.iter().map(|m| m.rating).min();

        Ok(QualityResult {
            measurements,
            overall_rating,
            status: ComparisonStatus::Completed,
        })
    }

    async fn run_one(
        &self,
        reference: &str,
        distorted: &str,
        metric: MetricKind,
        config: &QualityConfig,
        filter: &crate::filter::FilterRunner,
        token: &CancellationToken,
    ) -> Result<QualityMeasurement, QualityError> {
        let req = FilterRequest {
            complex: true,
            extra_args: vec!["-i".to_owned(), reference.to_owned()],
            ..FilterRequest::new(distorted, metric.filter_expr())
        };
        let out = filter.run(&req, token).await?;

        let mut scores = parse_frame_scores(metric, &out.stderr);
        if scores.is_empty() {
            return Err(QualityError::Parse {
                metric: metric.name(),
                reason: "no per-frame measurements found in filter output".to_owned(),
            });
        }

        let overall_score = pool(&scores, config.pooling);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let median = percentile(&mut scores.clone(), 0.5);
        let deviation = std_dev(&scores, mean);

        let percentiles = PERCENTILE_POINTS
            .iter()
            .map(|&p| ((p * 100.0).round() as u8, percentile(&mut scores.clone(), p)))
            .collect();

        let frames = config.frame_level.then(|| {
            let per_plane = parse_per_plane_scores(metric, &out.stderr);
            scores
                .iter()
                .enumerate()
                .map(|(i, &score)| {
                    let frame_number = i as u64;
                    let timestamp = match config.frame_rate {
                        Some(fps) if fps > 0.0 => frame_number as f64 / fps,
                        _ => frame_number as f64,
                    };
                    FrameMetric {
                        frame_number,
                        timestamp,
                        score,
                        per_plane: per_plane.get(i).cloned().unwrap_or_default(),
                    }
                })
                .collect()
        });

        Ok(QualityMeasurement {
            metric,
            overall_score,
            min,
            max,
            mean,
            median,
            std_dev: deviation,
            percentiles,
            frame_count: scores.len(),
            rating: rate(metric, overall_score),
            frames,
        })
    }
}

/// Surface A entry point (§6).
pub async fn compare_quality(
    reference: &str,
    distorted: &str,
    metrics: &[MetricKind],
    config: &QualityConfig,
) -> Result<QualityResult, QualityError> {
    let filter = crate::filter::FilterRunner::default();
    let token = CancellationToken::new();
    QualityComparator.compare(reference, distorted, metrics, config, &filter, &token).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vmaf_rating_thresholds_match_glossary() {
        assert_eq!(rate(MetricKind::Vmaf, 96.0), Rating::Excellent);
        assert_eq!(rate(MetricKind::Vmaf, 90.0), Rating::Good);
        assert_eq!(rate(MetricKind::Vmaf, 80.0), Rating::Fair);
        assert_eq!(rate(MetricKind::Vmaf, 50.0), Rating::Poor);
    }

    #[test]
    fn psnr_rating_thresholds_match_glossary() {
        assert_eq!(rate(MetricKind::Psnr, 41.0), Rating::Excellent);
        assert_eq!(rate(MetricKind::Psnr, 20.0), Rating::Poor);
    }

    #[test]
    fn weakest_metric_wins_overall_rating() {
        let ratings = [Rating::Excellent, Rating::Fair, Rating::Good];
        assert_eq!(ratings.into_iter().min(), Some(Rating::Fair));
    }

    #[test]
    fn parses_vmaf_json_like_scores_from_stderr() {
        let stderr = r#"{"frames":[{"metrics":{"vmaf":91.2}},{"metrics":{"vmaf":93.4}}]}"#;
        let scores = parse_frame_scores(MetricKind::Vmaf, stderr);
        assert_eq!(scores, vec![91.2, 93.4]);
    }

    #[test]
    fn parses_psnr_avg_lines() {
        let stderr = "n:1 mse_avg:1.2 psnr_avg:42.1\nn:2 mse_avg:1.4 psnr_avg:inf\n";
        let scores = parse_frame_scores(MetricKind::Psnr, stderr);
        assert_eq!(scores, vec![42.1, 100.0]);
    }

    #[test]
    fn parses_mse_avg_lines_distinct_from_psnr_avg() {
        let stderr = "n:1 mse_avg:1.2 psnr_avg:42.1\nn:2 mse_avg:1.4 psnr_avg:inf\n";
        let scores = parse_frame_scores(MetricKind::Mse, stderr);
        assert_eq!(scores, vec![1.2, 1.4]);
    }

    #[test]
    fn mse_rating_direction_is_inverted_lower_is_better() {
        assert_eq!(rate(MetricKind::Mse, 0.5), Rating::Excellent);
        assert_eq!(rate(MetricKind::Mse, 30.0), Rating::Poor);
    }

    #[test]
    fn parses_per_plane_psnr_components() {
        let stderr = "n:1 mse_avg:1.2 mse_y:1.0 mse_u:1.5 mse_v:1.6 psnr_avg:42.1 psnr_y:43.0 psnr_u:41.0 psnr_v:40.5\n";
        let planes = parse_per_plane_scores(MetricKind::Psnr, stderr);
        assert_eq!(planes, vec![vec![43.0, 41.0, 40.5]]);
    }

    #[test]
    fn pooling_harmonic_mean_is_not_arithmetic_mean() {
        let scores = [10.0, 20.0];
        let harmonic = pool(&scores, PoolingMethod::HarmonicMean);
        let mean = pool(&scores, PoolingMethod::Mean);
        assert!(harmonic < mean);
    }

    #[tokio::test]
    async fn no_metrics_requested_is_an_error_not_a_failed_status() {
        let comparator = QualityComparator;
        let filter = crate::filter::FilterRunner::default();
        let token = CancellationToken::new();
        let result = comparator
            .compare("ref.mp4", "dist.mp4", &[], &QualityConfig::default(), &filter, &token)
            .await;
        assert!(matches!(result, Err(QualityError::NoMetrics)));
    }

    #[tokio::test]
    async fn every_metric_failing_yields_a_failed_status_not_an_error() {
        let comparator = QualityComparator;
        let filter = crate::filter::FilterRunner::default();
        let token = CancellationToken::new();
        // Nonexistent inputs make every metric's filter invocation fail;
        // compare() still returns Ok with a Failed status (§4.5).
        let result = comparator
            .compare(
                "/no/such/ref.mp4",
                "/no/such/dist.mp4",
                &[MetricKind::Vmaf],
                &QualityConfig::default(),
                &filter,
                &token,
            )
            .await
            .unwrap();
        assert_eq!(result.status, ComparisonStatus::Failed);
        assert!(result.measurements.is_empty());
        assert!(result.overall_rating.is_none());
    }
}
