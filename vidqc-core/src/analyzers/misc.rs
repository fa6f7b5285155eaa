//! The remaining metadata-derived analyzers (§4.3): timecode, AFD,
//! transport-stream, endianness, audio-wrapping, IMF, MXF, data integrity.
//! All read from the already-probed format/stream tag maps; none invoke
//! the Filter.

use crate::analyzers::types::*;
use crate::analyzers::{AnalysisContext, ApplyFn};
use crate::error::AnalyzerError;
use crate::report::StreamKind;

pub async fn timecode(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let video = ctx
        .primary
        .streams
        .iter()
        .find(|s| s.kind == StreamKind::Video);

    let start_timecode = ctx
        .primary
        .format
        .tags
        .get("timecode")
        .or_else(|| video.and_then(|v| v.tags.get("timecode")))
        .cloned();
    let drop_frame = start_timecode.as_deref().map_or(false, |tc| tc.contains(';'));
    let frame_rate = video
        .and_then(|v| v.r_frame_rate.as_deref())
        .and_then(parse_ratio_local);

    let report = TimecodeReport {
        start_timecode,
        drop_frame,
        frame_rate,
    };
    Ok(Box::new(move |r| r.timecode = Some(report)))
}

fn parse_ratio_local(s: &str) -> Option<f64> {
    let (num, den) = s.split_once(':').or_else(|| s.split_once('/'))?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den != 0.0).then_some(num / den)
}

pub async fn afd(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let afd_code: Option<u8> = ctx
        .primary
        .streams
        .iter()
        .find_map(|s| s.tags.get("afd"))
        .and_then(|s| s.parse().ok());

    let description = afd_code.map(describe_afd_code);

    let report = AfdReport {
        afd_code,
        description,
    };
    Ok(Box::new(move |r| r.afd = Some(report)))
}

fn describe_afd_code(code: u8) -> String {
    match code {
        8 => "full frame 4:3".to_owned(),
        9 => "4:3 pillarbox".to_owned(),
        10 => "16:9 letterbox".to_owned(),
        11 => "full frame 16:9".to_owned(),
        13 => "16:9 center".to_owned(),
        _ => format!("reserved/undefined ({code})"),
    }
}

pub async fn transport_stream(
    ctx: &AnalysisContext,
    _input: &str,
) -> Result<ApplyFn, AnalyzerError> {
    let is_mpegts = ctx
        .primary
        .format
        .tags
        .get("format_name")
        .map_or(false, |n| n.contains("mpegts"));

    let program_count = ctx.primary.programs.len();
    let pcr_pid = ctx
        .primary
        .format
        .tags
        .get("pcr_pid")
        .and_then(|s| s.parse().ok());
    let continuity_errors = ctx
        .primary
        .format
        .tags
        .get("continuity_errors")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if !is_mpegts && program_count == 0 {
        return Err(AnalyzerError::MissingField("mpegts program table"));
    }

    let report = TransportStreamReport {
        program_count,
        pcr_pid,
        continuity_errors,
    };
    Ok(Box::new(move |r| r.transport_stream = Some(report)))
}

pub async fn endianness(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let audio = ctx
        .primary
        .streams
        .iter()
        .find(|s| s.kind == StreamKind::Audio)
        .ok_or(AnalyzerError::MissingField("audio stream"))?;

    let endianness = match audio.codec_name.as_str() {
        name if name.ends_with("le") => Endianness::Little,
        name if name.ends_with("be") => Endianness::Big,
        "pcm_s16le" | "pcm_s24le" | "pcm_s32le" => Endianness::Little,
        _ => Endianness::Unknown,
    };

    let report = EndiannessReport { endianness };
    Ok(Box::new(move |r| r.endianness = Some(report)))
}

pub async fn audio_wrapping(
    ctx: &AnalysisContext,
    _input: &str,
) -> Result<ApplyFn, AnalyzerError> {
    let audio = ctx
        .primary
        .streams
        .iter()
        .find(|s| s.kind == StreamKind::Audio)
        .ok_or(AnalyzerError::MissingField("audio stream"))?;

    let (wrapper_format, embedded_codec) = match audio.codec_name.as_str() {
        "dts" if audio.profile.as_deref() == Some("DTS-HD MA") => {
            (Some("wav".to_owned()), Some("dts_hd_ma".to_owned()))
        },
        "ac3" | "eac3" => (Some("spdif".to_owned()), Some(audio.codec_name.clone())),
        _ => (None, None),
    };

    let report = AudioWrappingReport {
        wrapper_format,
        embedded_codec,
    };
    Ok(Box::new(move |r| r.audio_wrapping = Some(report)))
}

pub async fn imf(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let package_type = ctx.primary.format.tags.get("imf_package_type").cloned();
    let asset_map_present = ctx.primary.format.tags.contains_key("imf_asset_map");
    let is_imf = package_type.is_some() || asset_map_present;

    let report = ImfReport {
        is_imf,
        package_type,
        asset_map_present,
    };
    Ok(Box::new(move |r| r.imf = Some(report)))
}

pub async fn mxf(ctx: &AnalysisContext, _input: &str) -> Result<ApplyFn, AnalyzerError> {
    let is_mxf = ctx
        .primary
        .format
        .tags
        .get("format_name")
        .map_or(false, |n| n.contains("mxf"));
    let operational_pattern = ctx.primary.format.tags.get("operational_pattern").cloned();
    let essence_containers: Vec<String> = ctx
        .primary
        .streams
        .iter()
        .map(|s| s.codec_name.clone())
        .collect();

    if !is_mxf {
        return Err(AnalyzerError::MissingField("mxf format tag"));
    }

    let report = MxfReport {
        is_mxf,
        operational_pattern,
        essence_containers,
    };
    Ok(Box::new(move |r| r.mxf = Some(report)))
}

pub async fn data_integrity(
    ctx: &AnalysisContext,
    _input: &str,
) -> Result<ApplyFn, AnalyzerError> {
    let mut error_counts_by_class = std::collections::BTreeMap::new();
    if !ctx.primary.success {
        error_counts_by_class.insert("decode_error".to_owned(), 1u64);
    }
    for stream in &ctx.primary.streams {
        if stream.kind == StreamKind::Video && (stream.width.unwrap_or(0) == 0 || stream.height.unwrap_or(0) == 0) {
            *error_counts_by_class.entry("malformed_dimensions".to_owned()).or_insert(0) += 1;
        }
    }

    let total_errors: u64 = error_counts_by_class.values().sum();
    let integrity_score = 100u8.saturating_sub((total_errors * 20).min(100) as u8);

    let report = DataIntegrityReport {
        error_counts_by_class,
        integrity_score,
        corrupted: total_errors > 0,
    };
    Ok(Box::new(move |r| r.data_integrity = Some(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_common_afd_codes() {
        assert_eq!(describe_afd_code(8), "full frame 4:3");
        assert_eq!(describe_afd_code(10), "16:9 letterbox");
    }

    #[test]
    fn parses_ratio_like_frame_rate() {
        assert_eq!(parse_ratio_local("25/1"), Some(25.0));
        assert_eq!(parse_ratio_local("25:0"), None);
    }
}
