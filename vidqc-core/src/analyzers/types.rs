//! Sub-report types produced by the analyzer set (§4.3).
//!
//! Every struct here documents, in its own fields, the default parameters
//! the analyzer used to produce it — callers should never have to guess
//! what threshold a report was generated under.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamCounts {
    pub video: usize,
    pub audio: usize,
    pub subtitle: usize,
    pub data: usize,
    pub attachment: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCharacteristics {
    pub chroma_subsampling: Option<String>,
    pub matrix_coefficients: Option<String>,
    pub bit_rate_mode: BitRateMode,
    pub closed_captions_present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitRateMode {
    Constant,
    Variable,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GopStats {
    pub avg_gop_size: f64,
    pub min_gop_size: usize,
    pub max_gop_size: usize,
    pub key_frame_count: usize,
    pub total_frames: usize,
    pub pattern_label: String,
    pub window_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameStats {
    pub i_frames: usize,
    pub p_frames: usize,
    pub b_frames: usize,
    pub avg_frame_size_bytes: f64,
    pub min_frame_size_bytes: u64,
    pub max_frame_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackFrameReport {
    pub detected_frames: usize,
    pub percentage: f64,
    pub threshold: f64,
    pub pic_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeFrameReport {
    pub detected_frames: usize,
    pub percentage: f64,
    pub noise_threshold_db: f64,
    pub duration_threshold_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioClippingReport {
    pub clipped_sample_count: u64,
    pub percentage: f64,
    pub peak_db: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockinessReport {
    pub average: f64,
    pub max: f64,
    pub detected: bool,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlurrinessReport {
    pub average: f64,
    pub max: f64,
    pub detected: bool,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseReport {
    pub average: f64,
    pub max: f64,
    pub detected: bool,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterlaceReport {
    pub detected: bool,
    pub progressive_frames: usize,
    pub interlaced_frames: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoudnessReport {
    pub integrated_lufs: f64,
    pub loudness_range_lu: f64,
    pub true_peak_dbtp: f64,
    pub compliant: bool,
    pub standard: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HdrFormat {
    Hdr10,
    Hdr10Plus,
    DolbyVision,
    Hlg,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasteringDisplayMetadata {
    pub max_luminance_nits: Option<f64>,
    pub min_luminance_nits: Option<f64>,
    pub primaries: Option<[(f64, f64); 3]>,
    pub white_point: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HdrReport {
    pub is_hdr: bool,
    pub format: HdrFormat,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_space: Option<String>,
    pub mastering_display: Option<MasteringDisplayMetadata>,
    pub max_content_light_level: Option<u32>,
    pub max_frame_average_light_level: Option<u32>,
    pub compliance_issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepthSource {
    PixelFormat,
    Profile,
    BitsPerRawSample,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitDepthReport {
    pub bit_depth: u32,
    pub source: BitDepthSource,
    pub consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub width: u32,
    pub height: u32,
    pub pixel_count: u64,
    pub standard_label: String,
    pub sample_aspect_ratio: Option<String>,
    pub display_aspect_ratio: Option<String>,
    pub pixel_aspect_ratio: Option<f64>,
    pub anamorphic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRateSource {
    RFrameRate,
    AvgFrameRate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRateReport {
    pub effective_fps: f64,
    pub source: FrameRateSource,
    pub standard_label: String,
    pub variable_frame_rate: bool,
    pub interlaced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecReport {
    pub family: String,
    pub generation_label: String,
    pub profile: Option<String>,
    pub level: Option<String>,
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerReport {
    pub family: String,
    pub description: String,
    pub supported_codecs: Vec<String>,
    pub streaming_friendly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimecodeReport {
    pub start_timecode: Option<String>,
    pub drop_frame: bool,
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfdReport {
    pub afd_code: Option<u8>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportStreamReport {
    pub program_count: usize,
    pub pcr_pid: Option<u32>,
    pub continuity_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndiannessReport {
    pub endianness: Endianness,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioWrappingReport {
    pub wrapper_format: Option<String>,
    pub embedded_codec: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImfReport {
    pub is_imf: bool,
    pub package_type: Option<String>,
    pub asset_map_present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxfReport {
    pub is_mxf: bool,
    pub operational_pattern: Option<String>,
    pub essence_containers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadPixelReport {
    pub coordinates: Vec<(u32, u32)>,
    pub count: usize,
    pub frames_sampled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PseRiskLevel {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardousInterval {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseRiskReport {
    pub risk_level: PseRiskLevel,
    pub hazardous_intervals: Vec<HazardousInterval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRole {
    pub stream_index: usize,
    pub role: String,
    pub accessibility_score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDispositionReport {
    pub roles: Vec<StreamRole>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataIntegrityReport {
    pub error_counts_by_class: BTreeMap<String, u64>,
    pub integrity_score: u8,
    pub corrupted: bool,
}
