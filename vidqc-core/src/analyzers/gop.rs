//! GOP and frame-type analyzers (§4.3): both read a `-show_frames` dump
//! from the Prober rather than the Filter.

use crate::analyzers::types::{FrameStats, GopStats};
use crate::analyzers::{AnalysisContext, ApplyFn};
use crate::error::AnalyzerError;

const GOP_WINDOW_SECONDS: f64 = 10.0;

pub async fn gop(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let frames = ctx.prober.probe_frames(input, &ctx.token).await?;
    if frames.is_empty() {
        return Err(AnalyzerError::MissingField("frame dump"));
    }

    let key_frame_indices: Vec<usize> = frames
        .iter()
        .enumerate()
        .filter(|(_, f)| f.pict_type == 'I')
        .map(|(i, _)| i)
        .collect();

    let gop_sizes: Vec<usize> = key_frame_indices
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect();

    let (avg_gop_size, min_gop_size, max_gop_size) = if gop_sizes.is_empty() {
        (frames.len() as f64, frames.len(), frames.len())
    } else {
        let sum: usize = gop_sizes.iter().sum();
        (
            sum as f64 / gop_sizes.len() as f64,
            *gop_sizes.iter().min().unwrap(),
            *gop_sizes.iter().max().unwrap(),
        )
    };

    let pattern_label = if gop_sizes.iter().all(|&s| s == gop_sizes.first().copied().unwrap_or(0)) {
        format!("closed-{}", gop_sizes.first().copied().unwrap_or(0))
    } else {
        "variable".to_owned()
    };

    let report = GopStats {
        avg_gop_size,
        min_gop_size,
        max_gop_size,
        key_frame_count: key_frame_indices.len(),
        total_frames: frames.len(),
        pattern_label,
        window_seconds: GOP_WINDOW_SECONDS,
    };
    Ok(Box::new(move |r| r.gop = Some(report)))
}

pub async fn frame_stats(ctx: &AnalysisContext, input: &str) -> Result<ApplyFn, AnalyzerError> {
    let frames = ctx.prober.probe_frames(input, &ctx.token).await?;
    if frames.is_empty() {
        return Err(AnalyzerError::MissingField("frame dump"));
    }

    let mut i_frames = 0usize;
    let mut p_frames = 0usize;
    let mut b_frames = 0usize;
    let mut min_size = u64::MAX;
    let mut max_size = 0u64;
    let mut total_size = 0u64;

    for frame in &frames {
        match frame.pict_type {
            'I' => i_frames += 1,
            'P' => p_frames += 1,
            'B' => b_frames += 1,
            _ => {},
        }
        min_size = min_size.min(frame.pkt_size);
        max_size = max_size.max(frame.pkt_size);
        total_size += frame.pkt_size;
    }

    let report = FrameStats {
        i_frames,
        p_frames,
        b_frames,
        avg_frame_size_bytes: total_size as f64 / frames.len() as f64,
        min_frame_size_bytes: if min_size == u64::MAX { 0 } else { min_size },
        max_frame_size_bytes: max_size,
    };
    Ok(Box::new(move |r| r.frame_stats = Some(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::FrameSummary;

    fn gop_sizes_from(frames: &[FrameSummary]) -> Vec<usize> {
        let key_frame_indices: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.pict_type == 'I')
            .map(|(i, _)| i)
            .collect();
        key_frame_indices.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn uniform_gop_spacing_is_detected() {
        let frames: Vec<FrameSummary> = (0..30)
            .map(|i| FrameSummary {
                pict_type: if i % 10 == 0 { 'I' } else if i % 3 == 0 { 'P' } else { 'B' },
                pkt_size: 1000,
                pts_time: i as f64 / 24.0,
            })
            .collect();
        let sizes = gop_sizes_from(&frames);
        assert!(sizes.iter().all(|&s| s == 10));
    }
}
