//! The master report data model (§3).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyzers::types::*;

/// Absolute path or URL, with the size/hash we know about it up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub location: String,
    pub is_url: bool,
    pub bytes_size: Option<u64>,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorMetadata {
    pub primaries: Option<String>,
    pub transfer: Option<String>,
    pub space: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disposition {
    pub default: bool,
    pub forced: bool,
    pub hearing_impaired: bool,
    pub visual_impaired: bool,
    pub comment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub index: usize,
    pub kind: StreamKind,
    pub codec_name: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub color: ColorMetadata,
    pub disposition: Disposition,
    pub language: Option<String>,
    pub bit_rate: Option<u64>,
    pub profile: Option<String>,
    pub pix_fmt: Option<String>,
    pub bits_per_raw_sample: Option<u32>,
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub sample_aspect_ratio: Option<String>,
    pub display_aspect_ratio: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub mastering_display: Option<MasteringDisplayMetadata>,
    pub max_content_light_level: Option<u32>,
    pub max_frame_average_light_level: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatRecord {
    pub duration: Option<f64>,
    pub bit_rate: Option<u64>,
    pub size_bytes: Option<u64>,
    pub probe_score: Option<u8>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub start: f64,
    pub end: f64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub id: i64,
    pub stream_indices: Vec<usize>,
}

/// Aggregates every per-analyzer sub-report. Every field is optional: it is
/// populated only when the corresponding analyzer both ran and succeeded
/// (§4.4 partial-failure semantics — failure omits the field, it never
/// zeroes it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancedReport {
    pub stream_counts: Option<StreamCounts>,
    pub video_characteristics: Option<VideoCharacteristics>,
    pub gop: Option<GopStats>,
    pub frame_stats: Option<FrameStats>,
    pub black_frame: Option<BlackFrameReport>,
    pub freeze_frame: Option<FreezeFrameReport>,
    pub audio_clipping: Option<AudioClippingReport>,
    pub blockiness: Option<BlockinessReport>,
    pub blurriness: Option<BlurrinessReport>,
    pub noise: Option<NoiseReport>,
    pub interlace: Option<InterlaceReport>,
    pub loudness: Option<LoudnessReport>,
    pub hdr: Option<HdrReport>,
    pub bit_depth: Option<BitDepthReport>,
    pub resolution: Option<ResolutionReport>,
    pub frame_rate: Option<FrameRateReport>,
    pub codec: Option<CodecReport>,
    pub container: Option<ContainerReport>,
    pub timecode: Option<TimecodeReport>,
    pub afd: Option<AfdReport>,
    pub transport_stream: Option<TransportStreamReport>,
    pub endianness: Option<EndiannessReport>,
    pub audio_wrapping: Option<AudioWrappingReport>,
    pub imf: Option<ImfReport>,
    pub mxf: Option<MxfReport>,
    pub dead_pixel: Option<DeadPixelReport>,
    pub pse_risk: Option<PseRiskReport>,
    pub stream_disposition: Option<StreamDispositionReport>,
    pub data_integrity: Option<DataIntegrityReport>,
}

/// The master artifact produced for one input (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub input: InputDescriptor,
    pub format: FormatRecord,
    pub streams: Vec<StreamRecord>,
    pub chapters: Vec<Chapter>,
    pub programs: Vec<ProgramRecord>,
    pub enhanced: EnhancedReport,
    pub exit_code: i32,
    pub success: bool,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl AnalysisReport {
    /// `success = true ⇔ exitCode = 0` and every stream index is unique.
    pub fn validate_invariants(&self) -> Result<(), String> {
        if self.success != (self.exit_code == 0) {
            return Err(format!(
                "success={} inconsistent with exit_code={}",
                self.success, self.exit_code
            ));
        }
        let mut seen = std::collections::HashSet::with_capacity(self.streams.len());
        for stream in &self.streams {
            if !seen.insert(stream.index) {
                return Err(format!("duplicate stream index {}", stream.index));
            }
        }
        if let Some(score) = self.format.probe_score {
            if score > 100 {
                return Err(format!("probe score {score} out of range [0,100]"));
            }
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
