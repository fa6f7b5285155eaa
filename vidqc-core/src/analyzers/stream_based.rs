//! Analyzers derived entirely from the already-probed primary report: no
//! Prober or Filter invocation, just typed reads over `ctx.primary`.

use crate::analyzers::types::*;
use crate::analyzers::{AnalysisContext, ApplyFn};
use crate::error::AnalyzerError;
use crate::report::{StreamKind, StreamRecord};

fn first_video<'a>(ctx: &'a AnalysisContext) -> Option<&'a StreamRecord> {
    ctx.primary.streams.iter().find(|s| s.kind == StreamKind::Video)
}

pub async fn stream_counts(
    ctx: &AnalysisContext,
    _input: &str,
) -> Result<ApplyFn, AnalyzerError> {
    let mut counts = StreamCounts::default();
    for stream in &ctx.primary.streams {
        match stream.kind {
            StreamKind::Video => counts.video += 1,
            StreamKind::Audio => counts.audio += 1,
            StreamKind::Subtitle => counts.subtitle += 1,
            StreamKind::Data => counts.data += 1,
            StreamKind::Attachment => counts.attachment += 1,
        }
    }
    Ok(Box::new(move |r| r.stream_counts = Some(counts)))
}

pub async fn video_characteristics(
    ctx: &AnalysisContext,
    _input: &str,
) -> Result<ApplyFn, AnalyzerError> {
    let video = first_video(ctx).ok_or(AnalyzerError::MissingField("video stream"))?;

    let chroma_subsampling = video.pix_fmt.as_deref().map(classify_chroma_subsampling);
    let bit_rate_mode = classify_bit_rate_mode(video);
    let closed_captions_present = video
        .tags
        .keys()
        .any(|k| k.eq_ignore_ascii_case("closed_captions") || k.eq_ignore_ascii_case("cc"));

    let report = VideoCharacteristics {
        chroma_subsampling,
        matrix_coefficients: video.color.space.clone(),
        bit_rate_mode,
        closed_captions_present,
    };
    Ok(Box::new(move |r| r.video_characteristics = Some(report)))
}

fn classify_chroma_subsampling(pix_fmt: &str) -> String {
    if pix_fmt.contains("444") {
        "4:4:4".to_owned()
    } else if pix_fmt.contains("422") {
        "4:2:2".to_owned()
    } else if pix_fmt.contains("410") {
        "4:1:0".to_owned()
    } else {
        "4:2:0".to_owned()
    }
}

fn classify_bit_rate_mode(video: &StreamRecord) -> BitRateMode {
    match (&video.tags.get("variable_bitrate"), video.bit_rate) {
        (Some(v), _) if v.as_str() == "1" => BitRateMode::Variable,
        (_, Some(_)) => BitRateMode::Constant,
        _ => BitRateMode::Unknown,
    }
}

pub async fn hdr(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let video = first_video(ctx).ok_or(AnalyzerError::MissingField("video stream"))?;

    let transfer = video.color.transfer.as_deref().unwrap_or("");
    let primaries = video.color.primaries.as_deref().unwrap_or("");

    let format = if transfer == "smpte2084" && video.tags.contains_key("dovi_rpu") {
        HdrFormat::DolbyVision
    } else if transfer == "smpte2084" && video.tags.contains_key("hdr10plus") {
        HdrFormat::Hdr10Plus
    } else if transfer == "smpte2084" && primaries == "bt2020" {
        HdrFormat::Hdr10
    } else if transfer == "arib-std-b67" {
        HdrFormat::Hlg
    } else {
        HdrFormat::None
    };
    let is_hdr = format != HdrFormat::None;

    let mut compliance_issues = Vec::new();
    if is_hdr && primaries != "bt2020" {
        compliance_issues.push(format!("unexpected color primaries for HDR stream: {primaries}"));
    }

    let report = HdrReport {
        is_hdr,
        format,
        color_primaries: video.color.primaries.clone(),
        color_transfer: video.color.transfer.clone(),
        color_space: video.color.space.clone(),
        mastering_display: video.mastering_display.clone(),
        max_content_light_level: video.max_content_light_level,
        max_frame_average_light_level: video.max_frame_average_light_level,
        compliance_issues,
    };
    Ok(Box::new(move |r| r.hdr = Some(report)))
}

pub async fn bit_depth(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let video = first_video(ctx).ok_or(AnalyzerError::MissingField("video stream"))?;

    let (bit_depth, source) = if let Some(raw) = video.bits_per_raw_sample {
        (raw, BitDepthSource::BitsPerRawSample)
    } else if let Some(profile) = &video.profile {
        (bit_depth_from_profile(profile), BitDepthSource::Profile)
    } else if let Some(pix_fmt) = &video.pix_fmt {
        (bit_depth_from_pix_fmt(pix_fmt), BitDepthSource::PixelFormat)
    } else {
        (8, BitDepthSource::PixelFormat)
    };

    let pix_fmt_depth = video.pix_fmt.as_deref().map(bit_depth_from_pix_fmt);
    let consistent = pix_fmt_depth.map_or(true, |d| d == bit_depth);

    let report = BitDepthReport {
        bit_depth,
        source,
        consistent,
    };
    Ok(Box::new(move |r| r.bit_depth = Some(report)))
}

fn bit_depth_from_profile(profile: &str) -> u32 {
    if profile.contains("10") {
        10
    } else if profile.contains("12") {
        12
    } else {
        8
    }
}

fn bit_depth_from_pix_fmt(pix_fmt: &str) -> u32 {
    if pix_fmt.ends_with("12le") || pix_fmt.ends_with("12be") {
        12
    } else if pix_fmt.ends_with("10le") || pix_fmt.ends_with("10be") {
        10
    } else {
        8
    }
}

pub async fn resolution(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let video = first_video(ctx).ok_or(AnalyzerError::MissingField("video stream"))?;
    let width = video.width.ok_or(AnalyzerError::MissingField("width"))?;
    let height = video.height.ok_or(AnalyzerError::MissingField("height"))?;

    let standard_label = standard_label_for(width, height);
    let pixel_aspect_ratio = video
        .sample_aspect_ratio
        .as_deref()
        .and_then(parse_ratio);
    let anamorphic = pixel_aspect_ratio.map_or(false, |par| (par - 1.0).abs() > 0.01);

    let report = ResolutionReport {
        width,
        height,
        pixel_count: u64::from(width) * u64::from(height),
        standard_label,
        sample_aspect_ratio: video.sample_aspect_ratio.clone(),
        display_aspect_ratio: video.display_aspect_ratio.clone(),
        pixel_aspect_ratio,
        anamorphic,
    };
    Ok(Box::new(move |r| r.resolution = Some(report)))
}

/// Classifies by the larger of the two dimensions, so a portrait-oriented
/// frame (e.g. 720x1280) lands on the tier its *narrower* side actually
/// supports rather than being inflated by whichever side happens to be
/// taller.
fn standard_label_for(width: u32, height: u32) -> String {
    let long_side = width.max(height);
    match long_side {
        l if l >= 7680 => "8K".to_owned(),
        l if l >= 3840 => "4K UHD".to_owned(),
        l if l >= 1920 => "1080p".to_owned(),
        l if l >= 1280 => "720p".to_owned(),
        l if l >= 720 => "480p".to_owned(),
        _ => "SD".to_owned(),
    }
}

fn parse_ratio(s: &str) -> Option<f64> {
    let (num, den) = s.split_once(':').or_else(|| s.split_once('/'))?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

pub async fn frame_rate(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let video = first_video(ctx).ok_or(AnalyzerError::MissingField("video stream"))?;

    let (effective_fps, source) = if let Some(rate) = video.r_frame_rate.as_deref().and_then(parse_ratio) {
        (rate, FrameRateSource::RFrameRate)
    } else if let Some(rate) = video.avg_frame_rate.as_deref().and_then(parse_ratio) {
        (rate, FrameRateSource::AvgFrameRate)
    } else {
        return Err(AnalyzerError::MissingField("r_frame_rate/avg_frame_rate"));
    };

    let variable_frame_rate = match (
        video.r_frame_rate.as_deref().and_then(parse_ratio),
        video.avg_frame_rate.as_deref().and_then(parse_ratio),
    ) {
        (Some(r), Some(a)) => (r - a).abs() > 0.05,
        _ => false,
    };

    let report = FrameRateReport {
        effective_fps,
        source,
        standard_label: standard_frame_rate_label(effective_fps),
        variable_frame_rate,
        interlaced: video.tags.get("field_order").map_or(false, |f| f != "progressive"),
    };
    Ok(Box::new(move |r| r.frame_rate = Some(report)))
}

fn standard_frame_rate_label(fps: f64) -> String {
    const KNOWN: &[(f64, &str)] = &[
        (23.976, "23.976p"),
        (24.0, "24p"),
        (25.0, "25p"),
        (29.97, "29.97p"),
        (30.0, "30p"),
        (50.0, "50p"),
        (59.94, "59.94p"),
        (60.0, "60p"),
    ];
    KNOWN
        .iter()
        .find(|(rate, _)| (fps - rate).abs() < 0.02)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| format!("{fps:.3}p"))
}

pub async fn codec(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let video = first_video(ctx).ok_or(AnalyzerError::MissingField("video stream"))?;

    let (family, generation_label) = classify_codec(&video.codec_name);
    let valid = !video.codec_name.is_empty() && family != "unknown";

    let report = CodecReport {
        family,
        generation_label,
        profile: video.profile.clone(),
        level: video.tags.get("level").cloned(),
        valid,
    };
    Ok(Box::new(move |r| r.codec = Some(report)))
}

fn classify_codec(name: &str) -> (String, String) {
    match name {
        "h264" | "avc" => ("AVC".to_owned(), "legacy".to_owned()),
        "hevc" | "h265" => ("HEVC".to_owned(), "modern".to_owned()),
        "av1" => ("AV1".to_owned(), "next-gen".to_owned()),
        "vp9" => ("VP9".to_owned(), "modern".to_owned()),
        "mpeg2video" => ("MPEG-2".to_owned(), "legacy".to_owned()),
        "prores" => ("ProRes".to_owned(), "mezzanine".to_owned()),
        other if other.is_empty() => ("unknown".to_owned(), "unknown".to_owned()),
        other => (other.to_owned(), "unclassified".to_owned()),
    }
}

pub async fn container(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let tags = &ctx.primary.format.tags;
    let family = tags
        .get("major_brand")
        .cloned()
        .unwrap_or_else(|| "unknown".to_owned());

    let (description, streaming_friendly) = classify_container(&family);
    let supported_codecs = supported_codecs_for(&family);

    let report = ContainerReport {
        family,
        description,
        supported_codecs,
        streaming_friendly,
    };
    Ok(Box::new(move |r| r.container = Some(report)))
}

fn classify_container(family: &str) -> (String, bool) {
    match family {
        "isom" | "mp42" | "mp41" => ("ISO Base Media (MP4)".to_owned(), true),
        "qt" => ("QuickTime".to_owned(), false),
        _ => ("unrecognized container".to_owned(), false),
    }
}

fn supported_codecs_for(family: &str) -> Vec<String> {
    match family {
        "isom" | "mp42" | "mp41" => vec!["h264".into(), "hevc".into(), "av1".into(), "aac".into()],
        "qt" => vec!["prores".into(), "h264".into(), "pcm_s24le".into()],
        _ => Vec::new(),
    }
}

pub async fn stream_disposition(
    ctx: &AnalysisContext,
    _input: &str,
) -> Result<ApplyFn, AnalyzerError> {
    let roles = ctx
        .primary
        .streams
        .iter()
        .map(|s| StreamRole {
            stream_index: s.index,
            role: role_for(s),
            accessibility_score: accessibility_score_for(s),
        })
        .collect();

    let report = StreamDispositionReport { roles };
    Ok(Box::new(move |r| r.stream_disposition = Some(report)))
}

fn role_for(stream: &StreamRecord) -> String {
    if stream.disposition.hearing_impaired {
        "sdh".to_owned()
    } else if stream.disposition.visual_impaired {
        "audio_description".to_owned()
    } else if stream.disposition.forced {
        "forced_narrative".to_owned()
    } else if stream.disposition.comment {
        "commentary".to_owned()
    } else {
        match stream.kind {
            StreamKind::Video => "main_video".to_owned(),
            StreamKind::Audio => "main_audio".to_owned(),
            StreamKind::Subtitle => "subtitle".to_owned(),
            StreamKind::Data => "data".to_owned(),
            StreamKind::Attachment => "attachment".to_owned(),
        }
    }
}

fn accessibility_score_for(stream: &StreamRecord) -> u8 {
    let mut score = 0u8;
    if stream.disposition.hearing_impaired {
        score += 50;
    }
    if stream.disposition.visual_impaired {
        score += 50;
    }
    score.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_label_classifies_1080p() {
        assert_eq!(standard_label_for(1920, 1080), "1080p");
    }

    #[test]
    fn standard_label_classifies_4k() {
        assert_eq!(standard_label_for(3840, 2160), "4K UHD");
    }

    #[test]
    fn standard_label_for_portrait_input_is_not_inflated_by_the_tall_side() {
        // Portrait orientation: the narrower dimension (width) should drive
        // the tier, not the taller one.
        assert_eq!(standard_label_for(720, 1280), "720p");
    }

    #[test]
    fn parses_colon_separated_ratio() {
        assert_eq!(parse_ratio("24000:1001"), Some(24000.0 / 1001.0));
    }

    #[test]
    fn rejects_zero_denominator_ratio() {
        assert_eq!(parse_ratio("1:0"), None);
    }

    #[test]
    fn classifies_ntsc_film_rate() {
        assert_eq!(standard_frame_rate_label(23.976), "23.976p");
    }

    #[test]
    fn classifies_known_codec_families() {
        assert_eq!(classify_codec("hevc").0, "HEVC");
        assert_eq!(classify_codec("av1").0, "AV1");
        assert_eq!(classify_codec("").0, "unknown");
    }
}
