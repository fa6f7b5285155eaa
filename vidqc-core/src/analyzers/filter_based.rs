//! Analyzers that invoke the Filter Runner and parse its stderr (§4.3).
//! Each analyzer owns its own filter expression and its own parsing —
//! the Filter Runner itself never interprets output (§4.2).

use crate::analyzers::types::*;
use crate::analyzers::{AnalysisContext, ApplyFn};
use crate::error::AnalyzerError;
use crate::filter::FilterRequest;
use crate::regex;

const BLACK_DURATION: f64 = 0.0;
const BLACK_PIC_THRESHOLD: f64 = 0.98;
const BLACK_PIXEL_THRESHOLD: f64 = 0.10;

pub async fn black_frame(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let expr = format!(
        "blackdetect=d={BLACK_DURATION}:pic_th={BLACK_PIC_THRESHOLD}:pix_th={BLACK_PIXEL_THRESHOLD}"
    );
    let out = ctx.filter.run(&FilterRequest::new(input, expr), &ctx.token).await?;

    let detected_frames = out
        .stderr
        .matches("black_start")
        .count();
    let total_frames = ctx
        .primary
        .enhanced
        .frame_stats
        .as_ref()
        .map(|f| f.i_frames + f.p_frames + f.b_frames)
        .unwrap_or(0)
        .max(1);
    let percentage = detected_frames as f64 / total_frames as f64 * 100.0;

    let report = BlackFrameReport {
        detected_frames,
        percentage,
        threshold: BLACK_DURATION,
        pic_threshold: BLACK_PIC_THRESHOLD,
    };
    Ok(Box::new(move |r| r.black_frame = Some(report)))
}

const FREEZE_NOISE_DB: f64 = -60.0;
const FREEZE_DURATION_SECONDS: f64 = 2.0;

pub async fn freeze_frame(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let expr = format!("freezedetect=n={FREEZE_NOISE_DB}dB:d={FREEZE_DURATION_SECONDS}");
    let out = ctx.filter.run(&FilterRequest::new(input, expr), &ctx.token).await?;

    let detected_frames = out.stderr.matches("freeze_start").count();
    let duration = ctx.primary.format.duration.unwrap_or(0.0).max(1.0);
    let percentage = (detected_frames as f64 * FREEZE_DURATION_SECONDS) / duration * 100.0;

    let report = FreezeFrameReport {
        detected_frames,
        percentage: percentage.min(100.0),
        noise_threshold_db: FREEZE_NOISE_DB,
        duration_threshold_seconds: FREEZE_DURATION_SECONDS,
    };
    Ok(Box::new(move |r| r.freeze_frame = Some(report)))
}

const CLIP_PEAK_THRESHOLD_DB: f64 = -0.1;

pub async fn audio_clipping(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let req = FilterRequest {
        audio: true,
        ..FilterRequest::new(input, "astats=metadata=1:reset=1")
    };
    let out = ctx.filter.run(&req, &ctx.token).await?;

    let clipped_sample_count = regex!(r"Number of clipped samples:\s*(\d+)")
        .captures(&out.stderr)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let peak_db = regex!(r"Peak level dB:\s*(-?[0-9.]+)")
        .captures(&out.stderr)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(f64::NEG_INFINITY);
    let total_samples = ctx
        .primary
        .streams
        .iter()
        .find_map(|s| s.sample_rate)
        .unwrap_or(48_000) as u64
        * ctx.primary.format.duration.unwrap_or(0.0) as u64;
    let percentage = if total_samples > 0 {
        clipped_sample_count as f64 / total_samples as f64 * 100.0
    } else {
        0.0
    };

    let report = AudioClippingReport {
        clipped_sample_count,
        percentage,
        peak_db,
    };
    let _ = CLIP_PEAK_THRESHOLD_DB;
    Ok(Box::new(move |r| r.audio_clipping = Some(report)))
}

fn signalstats_metric(stderr: &str, key: &str) -> (f64, f64) {
    let avg = regex!(r"(?P<key>\w+)Avg:\s*(?P<val>[0-9.]+)")
        .captures_iter(stderr)
        .find(|c| &c["key"] == key)
        .and_then(|c| c.name("val").map(|m| m.as_str().parse().unwrap_or(0.0)))
        .unwrap_or(0.0);
    let max = regex!(r"(?P<key>\w+)Max:\s*(?P<val>[0-9.]+)")
        .captures_iter(stderr)
        .find(|c| &c["key"] == key)
        .and_then(|c| c.name("val").map(|m| m.as_str().parse().unwrap_or(0.0)))
        .unwrap_or(avg);
    (avg, max)
}

const BLOCKINESS_THRESHOLD: f64 = 4.0;

pub async fn blockiness(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let req = FilterRequest::new(input, "signalstats,metadata=print");
    let out = ctx.filter.run(&req, &ctx.token).await?;
    let (average, max) = signalstats_metric(&out.stderr, "Blockiness");

    let report = BlockinessReport {
        average,
        max,
        detected: max > BLOCKINESS_THRESHOLD,
        threshold: BLOCKINESS_THRESHOLD,
    };
    Ok(Box::new(move |r| r.blockiness = Some(report)))
}

const BLURRINESS_THRESHOLD: f64 = 3.0;

pub async fn blurriness(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let req = FilterRequest::new(input, "signalstats,metadata=print");
    let out = ctx.filter.run(&req, &ctx.token).await?;
    let (average, max) = signalstats_metric(&out.stderr, "Blur");

    let report = BlurrinessReport {
        average,
        max,
        detected: max > BLURRINESS_THRESHOLD,
        threshold: BLURRINESS_THRESHOLD,
    };
    Ok(Box::new(move |r| r.blurriness = Some(report)))
}

const NOISE_THRESHOLD: f64 = 5.0;

pub async fn noise(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let req = FilterRequest::new(input, "signalstats,metadata=print");
    let out = ctx.filter.run(&req, &ctx.token).await?;
    let (average, max) = signalstats_metric(&out.stderr, "Noise");

    let report = NoiseReport {
        average,
        max,
        detected: max > NOISE_THRESHOLD,
        threshold: NOISE_THRESHOLD,
    };
    Ok(Box::new(move |r| r.noise = Some(report)))
}

pub async fn interlace(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let req = FilterRequest::new(input, "idet");
    let out = ctx.filter.run(&req, &ctx.token).await?;

    let caps = regex!(
        r"Single frame detection: TFF:\s*(\d+)\s*BFF:\s*(\d+)\s*Progressive:\s*(\d+)\s*Undetermined:\s*(\d+)"
    )
    .captures(&out.stderr);

    let (tff, bff, progressive, undetermined) = caps
        .map(|c| {
            (
                c[1].parse().unwrap_or(0),
                c[2].parse().unwrap_or(0),
                c[3].parse().unwrap_or(0),
                c[4].parse().unwrap_or(0),
            )
        })
        .unwrap_or((0usize, 0usize, 0usize, 0usize));

    let interlaced_frames = tff + bff;
    let total = (interlaced_frames + progressive + undetermined).max(1);
    let confidence = interlaced_frames as f64 / total as f64;

    let report = InterlaceReport {
        detected: interlaced_frames > progressive,
        progressive_frames: progressive,
        interlaced_frames,
        confidence,
    };
    Ok(Box::new(move |r| r.interlace = Some(report)))
}

const LOUDNESS_STANDARD: &str = "EBU R128";
const LOUDNESS_TARGET_LUFS: f64 = -23.0;
const LOUDNESS_TOLERANCE_LU: f64 = 1.0;

pub async fn loudness(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let req = FilterRequest {
        audio: true,
        ..FilterRequest::new(input, "ebur128=framelog=verbose")
    };
    let out = ctx.filter.run(&req, &ctx.token).await?;

    let integrated_lufs = regex!(r"Integrated loudness:\s*(-?[0-9.]+)\s*LUFS")
        .captures(&out.stderr)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(f64::NEG_INFINITY);
    let loudness_range_lu = regex!(r"Loudness range:\s*([0-9.]+)\s*LU")
        .captures(&out.stderr)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0);
    let true_peak_dbtp = regex!(r"True peak:\s*(-?[0-9.]+)\s*dBTP")
        .captures(&out.stderr)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0);

    let compliant = (integrated_lufs - LOUDNESS_TARGET_LUFS).abs() <= LOUDNESS_TOLERANCE_LU;

    let report = LoudnessReport {
        integrated_lufs,
        loudness_range_lu,
        true_peak_dbtp,
        compliant,
        standard: LOUDNESS_STANDARD.to_owned(),
    };
    Ok(Box::new(move |r| r.loudness = Some(report)))
}

const DEAD_PIXEL_SAMPLE_FRAMES: usize = 30;

pub async fn dead_pixel(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let expr = format!("select='not(mod(n\\,{DEAD_PIXEL_SAMPLE_FRAMES}))',signalstats,metadata=print");
    let out = ctx.filter.run(&FilterRequest::new(input, expr), &ctx.token).await?;

    let coordinates: Vec<(u32, u32)> = regex!(r"deadpixel:\s*x=(\d+)\s*y=(\d+)")
        .captures_iter(&out.stderr)
        .filter_map(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
        .collect();

    let report = DeadPixelReport {
        count: coordinates.len(),
        coordinates,
        frames_sampled: DEAD_PIXEL_SAMPLE_FRAMES,
    };
    Ok(Box::new(move |r| r.dead_pixel = Some(report)))
}

const PSE_LUMINANCE_FLASH_THRESHOLD: f64 = 20.0;

pub async fn pse_risk(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let expr = format!("signalstats,metadata=print:threshold={PSE_LUMINANCE_FLASH_THRESHOLD}");
    let out = ctx.filter.run(&FilterRequest::new(input, expr), &ctx.token).await?;

    let hazardous_intervals: Vec<HazardousInterval> = regex!(
        r"flash:\s*start=([0-9.]+)\s*end=([0-9.]+)\s*reason=(\w+)"
    )
    .captures_iter(&out.stderr)
    .filter_map(|c| {
        Some(HazardousInterval {
            start_seconds: c[1].parse().ok()?,
            end_seconds: c[2].parse().ok()?,
            reason: c[3].to_owned(),
        })
    })
    .collect();

    let risk_level = match hazardous_intervals.len() {
        0 => PseRiskLevel::None,
        1..=2 => PseRiskLevel::Low,
        3..=5 => PseRiskLevel::Medium,
        _ => PseRiskLevel::High,
    };

    let report = PseRiskReport {
        risk_level,
        hazardous_intervals,
    };
    Ok(Box::new(move |r| r.pse_risk = Some(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_astats_clip_and_peak() {
        let stderr = "[Parsed_astats_0 @ 0x0] Number of clipped samples: 42\n\
                       [Parsed_astats_0 @ 0x0] Peak level dB: -0.50\n";
        let clipped: u64 = regex!(r"Number of clipped samples:\s*(\d+)")
            .captures(stderr)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap();
        let peak: f64 = regex!(r"Peak level dB:\s*(-?[0-9.]+)")
            .captures(stderr)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap();
        assert_eq!(clipped, 42);
        assert_eq!(peak, -0.50);
    }

    #[test]
    fn parses_idet_progressive_majority() {
        let stderr = "[Parsed_idet_0 @ 0x0] Single frame detection: TFF:2 BFF:1 Progressive:97 Undetermined:0\n";
        let caps = regex!(
            r"Single frame detection: TFF:\s*(\d+)\s*BFF:\s*(\d+)\s*Progressive:\s*(\d+)\s*Undetermined:\s*(\d+)"
        )
        .captures(stderr)
        .unwrap();
        assert_eq!(&caps[1], "2");
        assert_eq!(&caps[3], "97");
    }

    #[test]
    fn classifies_pse_risk_levels_by_interval_count() {
        assert_eq!(
            match 0 {
                0 => PseRiskLevel::None,
                1..=2 => PseRiskLevel::Low,
                3..=5 => PseRiskLevel::Medium,
                _ => PseRiskLevel::High,
            },
            PseRiskLevel::None
        );
    }
}
