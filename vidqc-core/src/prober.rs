//! Prober Adapter (§4.1): builds the argument vector for the external
//! probing tool, executes it under a deadline, and parses its JSON output
//! into an [`AnalysisReport`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ProbeError;
use crate::analyzers::types::MasteringDisplayMetadata;
use crate::report::{
    AnalysisReport, Chapter, ColorMetadata, Disposition, EnhancedReport, FormatRecord,
    InputDescriptor, ProgramRecord, StreamKind, StreamRecord,
};
use crate::util::{find_shell_metacharacter, looks_like_url};
use crate::{regex, CancellationToken};

pub const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const MAX_OUTPUT_CAP_BYTES: u64 = 1 << 30; // 1 GiB
pub const DEFAULT_OUTPUT_CAP_BYTES: u64 = 256 << 20; // 256 MiB

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Json,
    Xml,
    Csv,
    Flat,
    Ini,
}

impl OutputFormat {
    fn as_arg(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Csv => "csv",
            Self::Flat => "flat",
            Self::Ini => "ini",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_arg(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Panic => "panic",
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Options for one Prober invocation (§4.1). Serializable so a remote
/// worker request (§6 Surface C) can carry the same shape a local
/// `Prober::probe` call would use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOptions {
    pub input: String,
    pub output_format: OutputFormat,
    pub show_format: bool,
    pub show_streams: bool,
    pub show_packets: bool,
    pub show_frames: bool,
    pub show_chapters: bool,
    pub show_programs: bool,
    pub show_entries: Option<String>,
    pub select_streams: Option<String>,
    pub read_intervals: Option<String>,
    pub count_frames: bool,
    pub count_packets: bool,
    pub probe_size: Option<u64>,
    pub analyze_duration: Option<Duration>,
    pub log_level: Option<LogLevel>,
    pub input_format: Option<String>,
    pub input_options: BTreeMap<String, String>,
    pub hide_banner: bool,
    pub timeout: Duration,
    pub output_size_cap: u64,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            input: String::new(),
            output_format: OutputFormat::Json,
            show_format: false,
            show_streams: false,
            show_packets: false,
            show_frames: false,
            show_chapters: false,
            show_programs: false,
            show_entries: None,
            select_streams: None,
            read_intervals: None,
            count_frames: false,
            count_packets: false,
            probe_size: None,
            analyze_duration: None,
            log_level: None,
            input_format: None,
            input_options: BTreeMap::new(),
            hide_banner: true,
            timeout: DEFAULT_TIMEOUT,
            output_size_cap: DEFAULT_OUTPUT_CAP_BYTES,
        }
    }
}

impl ProbeOptions {
    pub fn for_input(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// §4.1.1-2: reject everything before a process is ever spawned.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.input.is_empty() {
            return Err(ProbeError::EmptyInput);
        }

        if let Some(c) = find_shell_metacharacter(&self.input) {
            return Err(ProbeError::ShellMetacharacter(c));
        }

        if !looks_like_url(&self.input) {
            let path = Path::new(&self.input);
            if !path.exists() {
                return Err(ProbeError::FileNotFound(path.to_path_buf()));
            }
            if !path.is_file() {
                return Err(ProbeError::NotAFile(path.to_path_buf()));
            }
        }

        if self.timeout.is_zero() {
            return Err(ProbeError::TimeoutZero);
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(ProbeError::TimeoutTooLarge(self.timeout));
        }
        if let Some(d) = self.analyze_duration {
            if d > MAX_TIMEOUT {
                return Err(ProbeError::TimeoutTooLarge(d));
            }
        }

        if self.output_size_cap > MAX_OUTPUT_CAP_BYTES {
            return Err(ProbeError::OutputCapTooLarge(self.output_size_cap));
        }
        if let Some(size) = self.probe_size {
            if size > MAX_OUTPUT_CAP_BYTES {
                return Err(ProbeError::OutputCapTooLarge(size));
            }
        }

        if let Some(entries) = &self.show_entries {
            if !regex!(r"^[a-zA-Z_]+(=[a-zA-Z_,]+)?(:[a-zA-Z_]+(=[a-zA-Z_,]+)?)*$")
                .is_match(entries)
            {
                return Err(ProbeError::InvalidShowEntries(entries.clone()));
            }
        }
        if let Some(sel) = &self.select_streams {
            if !regex!(r"^[vVaAsSdDtT]?(:\d+(-\d+)?)?(,[vVaAsSdDtT]?(:\d+(-\d+)?)?)*$")
                .is_match(sel)
            {
                return Err(ProbeError::InvalidStreamSelector(sel.clone()));
            }
        }
        if let Some(ri) = &self.read_intervals {
            if !regex!(r"^[%+\-.:0-9]+(,[%+\-.:0-9]+)*$").is_match(ri) {
                return Err(ProbeError::InvalidReadInterval(ri.clone()));
            }
        }

        Ok(())
    }

    /// Builds the argument vector in the fixed order mandated by §4.1.3.
    /// Never touches a shell: every element here becomes one `argv` entry.
    pub fn build_argv(&self) -> Vec<String> {
        let mut argv = Vec::new();

        if self.hide_banner {
            argv.push("-hide_banner".to_owned());
        }
        if let Some(level) = self.log_level {
            argv.push("-loglevel".to_owned());
            argv.push(level.as_arg().to_owned());
        }
        if let Some(fmt) = &self.input_format {
            argv.push("-f".to_owned());
            argv.push(fmt.clone());
        }
        for (key, value) in &self.input_options {
            argv.push(format!("-{key}"));
            argv.push(value.clone());
        }
        if let Some(size) = self.probe_size {
            argv.push("-probesize".to_owned());
            argv.push(size.to_string());
        }
        if let Some(dur) = self.analyze_duration {
            argv.push("-analyzeduration".to_owned());
            argv.push(dur.as_micros().to_string());
        }

        argv.push("-of".to_owned());
        argv.push(self.output_format.as_arg().to_owned());

        if self.show_format {
            argv.push("-show_format".to_owned());
        }
        if self.show_streams {
            argv.push("-show_streams".to_owned());
        }
        if self.show_packets {
            argv.push("-show_packets".to_owned());
        }
        if self.show_frames {
            argv.push("-show_frames".to_owned());
        }
        if self.show_chapters {
            argv.push("-show_chapters".to_owned());
        }
        if self.show_programs {
            argv.push("-show_programs".to_owned());
        }
        if let Some(entries) = &self.show_entries {
            argv.push("-show_entries".to_owned());
            argv.push(entries.clone());
        }

        if let Some(sel) = &self.select_streams {
            argv.push("-select_streams".to_owned());
            argv.push(sel.clone());
        }
        if let Some(ri) = &self.read_intervals {
            argv.push("-read_intervals".to_owned());
            argv.push(ri.clone());
        }

        if self.count_frames {
            argv.push("-count_frames".to_owned());
        }
        if self.count_packets {
            argv.push("-count_packets".to_owned());
        }

        argv.push("-i".to_owned());
        argv.push(self.input.clone());

        argv
    }
}

/// Invokes the configured Prober binary and parses its output (§4.1).
pub struct Prober {
    binary: PathBuf,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl Prober {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, token), fields(input = %options.input))]
    pub async fn probe(
        &self,
        options: &ProbeOptions,
        token: &CancellationToken,
    ) -> Result<AnalysisReport, ProbeError> {
        let (stdout_bytes, exit_code, success, elapsed) = self.execute_raw(options, token).await?;
        let report = self.parse_report(options, &stdout_bytes, exit_code, success, elapsed)?;
        report
            .validate_invariants()
            .map_err(ProbeError::InvalidReport)?;
        Ok(report)
    }

    /// Runs a `-show_frames` dump and hands back a lightweight per-frame
    /// summary, used by GOP/frame-statistics analyzers. Not part of
    /// Surface A; a `Prober` implementation detail those two analyzers lean
    /// on (§4.3 "GOP ... Prober frame dump").
    pub(crate) async fn probe_frames(
        &self,
        input: &str,
        token: &CancellationToken,
    ) -> Result<Vec<FrameSummary>, ProbeError> {
        let options = ProbeOptions {
            show_frames: true,
            select_streams: Some("v".to_owned()),
            ..ProbeOptions::for_input(input)
        };
        let (stdout_bytes, _exit_code, success, _elapsed) = self.execute_raw(&options, token).await?;
        if !success || stdout_bytes.is_empty() {
            return Ok(Vec::new());
        }
        let parsed: FramesJson = serde_json::from_slice(&stdout_bytes).map_err(ProbeError::Parse)?;
        Ok(parsed.frames.into_iter().map(RawFrame::into_summary).collect())
    }

    async fn execute_raw(
        &self,
        options: &ProbeOptions,
        token: &CancellationToken,
    ) -> Result<(Vec<u8>, i32, bool, Duration), ProbeError> {
        options.validate()?;

        let argv = options.build_argv();
        debug!(?argv, "invoking prober");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&argv);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(ProbeError::Spawn)?;

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let cap = options.output_size_cap;

        let read_fut = async {
            let stdout_buf = read_capped(&mut stdout, cap);
            let stderr_buf = read_capped(&mut stderr, cap);
            tokio::join!(stdout_buf, stderr_buf)
        };

        let (stdout_bytes, stderr_bytes) = tokio::select! {
            biased;
            _ = token.cancelled() => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return Err(ProbeError::Cancelled);
            }
            result = tokio::time::timeout(options.timeout, read_fut) => {
                match result {
                    Ok(pair) => pair,
                    Err(_) => {
                        let _ = child.kill().await;
                        let _ = child.wait().await;
                        return Err(ProbeError::Timeout(options.timeout));
                    }
                }
            }
        };

        let stdout_bytes =
            stdout_bytes.map_err(|partial| ProbeError::OutputTooLarge { cap, partial })?;
        let stderr_bytes = stderr_bytes.unwrap_or_default();

        let status = child.wait().await.map_err(ProbeError::Spawn)?;
        let elapsed = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        if !status.success() {
            warn!(
                exit_code,
                stderr = %String::from_utf8_lossy(&stderr_bytes),
                "prober exited non-zero"
            );
        }

        Ok((stdout_bytes, exit_code, status.success(), elapsed))
    }

    fn parse_report(
        &self,
        options: &ProbeOptions,
        stdout: &[u8],
        exit_code: i32,
        success: bool,
        elapsed: Duration,
    ) -> Result<AnalysisReport, ProbeError> {
        let (format, streams, chapters, programs) = if options.output_format == OutputFormat::Json
            && !stdout.is_empty()
        {
            let parsed: ProberJson = serde_json::from_slice(stdout).map_err(ProbeError::Parse)?;
            (
                parsed.format.map(RawFormat::into_record).unwrap_or_default(),
                parsed
                    .streams
                    .into_iter()
                    .flatten()
                    .map(RawStream::into_record)
                    .collect(),
                parsed.chapters.into_iter().flatten().map(RawChapter::into_record).collect(),
                parsed
                    .programs
                    .into_iter()
                    .flatten()
                    .map(RawProgram::into_record)
                    .collect(),
            )
        } else {
            (FormatRecord::default(), Vec::new(), Vec::new(), Vec::new())
        };

        Ok(AnalysisReport {
            id: Uuid::new_v4(),
            input: InputDescriptor {
                is_url: looks_like_url(&options.input),
                location: options.input.clone(),
                bytes_size: None,
                content_hash: None,
            },
            format,
            streams,
            chapters,
            programs,
            enhanced: EnhancedReport::default(),
            exit_code,
            success,
            elapsed,
        })
    }
}

/// Reads up to `cap + 1` bytes so we can distinguish "exactly at cap" from
/// "over cap" without buffering a multi-GiB stream (§4.1 output capture,
/// §9 "bounded buffers with an early-abort branch").
async fn read_capped<R: AsyncReadExt + Unpin>(reader: &mut R, cap: u64) -> Result<Vec<u8>, Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(n) => n,
            Err(_) => return Err(buf),
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() as u64 > cap {
            buf.truncate(cap as usize);
            return Err(buf);
        }
    }
    Ok(buf)
}

/// One entry of a `-show_frames` dump, reduced to what GOP/frame-stats
/// analyzers need.
#[derive(Debug, Clone)]
pub(crate) struct FrameSummary {
    pub pict_type: char,
    pub pkt_size: u64,
    pub pts_time: f64,
}

#[derive(Debug, Default, Deserialize)]
struct FramesJson {
    #[serde(default)]
    frames: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    pict_type: String,
    #[serde(default)]
    pkt_size: Option<String>,
    #[serde(default)]
    pkt_pts_time: Option<String>,
    #[serde(default)]
    best_effort_timestamp_time: Option<String>,
}

impl RawFrame {
    fn into_summary(self) -> FrameSummary {
        let pts_time = self
            .pkt_pts_time
            .or(self.best_effort_timestamp_time)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);
        FrameSummary {
            pict_type: self.pict_type.chars().next().unwrap_or('?'),
            pkt_size: self.pkt_size.and_then(|s| s.parse().ok()).unwrap_or(0),
            pts_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProberJson {
    format: Option<RawFormat>,
    streams: Option<Vec<RawStream>>,
    chapters: Option<Vec<RawChapter>>,
    programs: Option<Vec<RawProgram>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
    probe_score: Option<u8>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl RawFormat {
    fn into_record(self) -> FormatRecord {
        FormatRecord {
            duration: self.duration.and_then(|s| s.parse().ok()),
            bit_rate: self.bit_rate.and_then(|s| s.parse().ok()),
            size_bytes: self.size.and_then(|s| s.parse().ok()),
            probe_score: self.probe_score,
            tags: self.tags,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
    #[serde(default)]
    hearing_impaired: u8,
    #[serde(default)]
    visual_impaired: u8,
    #[serde(default)]
    comment: u8,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: usize,
    codec_type: String,
    #[serde(default)]
    codec_name: String,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_space: Option<String>,
    color_range: Option<String>,
    #[serde(default)]
    disposition: RawDisposition,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    bit_rate: Option<String>,
    profile: Option<String>,
    pix_fmt: Option<String>,
    bits_per_raw_sample: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_aspect_ratio: Option<String>,
    display_aspect_ratio: Option<String>,
    #[serde(default)]
    side_data_list: Vec<RawSideData>,
}

/// One entry of ffprobe's per-stream `side_data_list` (§4.3 HDR metadata).
/// Only the two side-data kinds HDR reporting cares about have named
/// fields; everything else ffprobe can emit there is ignored.
#[derive(Debug, Deserialize)]
struct RawSideData {
    side_data_type: Option<String>,
    red_x: Option<String>,
    red_y: Option<String>,
    green_x: Option<String>,
    green_y: Option<String>,
    blue_x: Option<String>,
    blue_y: Option<String>,
    white_point_x: Option<String>,
    white_point_y: Option<String>,
    min_luminance: Option<String>,
    max_luminance: Option<String>,
    max_content: Option<u32>,
    max_average: Option<u32>,
}

/// ffprobe reports mastering-display chromaticity/luminance as `"num/den"`
/// rational strings.
fn parse_side_data_rational(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

fn mastering_display_from(entries: &[RawSideData]) -> Option<MasteringDisplayMetadata> {
    let m = entries
        .iter()
        .find(|e| e.side_data_type.as_deref() == Some("Mastering display metadata"))?;

    let primaries = match (
        m.red_x.as_deref().and_then(parse_side_data_rational),
        m.red_y.as_deref().and_then(parse_side_data_rational),
        m.green_x.as_deref().and_then(parse_side_data_rational),
        m.green_y.as_deref().and_then(parse_side_data_rational),
        m.blue_x.as_deref().and_then(parse_side_data_rational),
        m.blue_y.as_deref().and_then(parse_side_data_rational),
    ) {
        (Some(rx), Some(ry), Some(gx), Some(gy), Some(bx), Some(by)) => {
            Some([(rx, ry), (gx, gy), (bx, by)])
        },
        _ => None,
    };
    let white_point = match (
        m.white_point_x.as_deref().and_then(parse_side_data_rational),
        m.white_point_y.as_deref().and_then(parse_side_data_rational),
    ) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    };

    Some(MasteringDisplayMetadata {
        max_luminance_nits: m.max_luminance.as_deref().and_then(parse_side_data_rational),
        min_luminance_nits: m.min_luminance.as_deref().and_then(parse_side_data_rational),
        primaries,
        white_point,
    })
}

fn content_light_level_from(entries: &[RawSideData]) -> (Option<u32>, Option<u32>) {
    let Some(c) = entries
        .iter()
        .find(|e| e.side_data_type.as_deref() == Some("Content light level metadata"))
    else {
        return (None, None);
    };
    (c.max_content, c.max_average)
}

impl RawStream {
    fn into_record(self) -> StreamRecord {
        let kind = match self.codec_type.as_str() {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            "subtitle" => StreamKind::Subtitle,
            "attachment" => StreamKind::Attachment,
            _ => StreamKind::Data,
        };
        let language = self.tags.get("language").cloned();
        let mastering_display = mastering_display_from(&self.side_data_list);
        let (max_content_light_level, max_frame_average_light_level) =
            content_light_level_from(&self.side_data_list);
        StreamRecord {
            index: self.index,
            kind,
            codec_name: self.codec_name,
            width: self.width,
            height: self.height,
            sample_rate: self.sample_rate.and_then(|s| s.parse().ok()),
            channels: self.channels,
            color: ColorMetadata {
                primaries: self.color_primaries,
                transfer: self.color_transfer,
                space: self.color_space,
                range: self.color_range,
            },
            disposition: Disposition {
                default: self.disposition.default != 0,
                forced: self.disposition.forced != 0,
                hearing_impaired: self.disposition.hearing_impaired != 0,
                visual_impaired: self.disposition.visual_impaired != 0,
                comment: self.disposition.comment != 0,
            },
            language,
            bit_rate: self.bit_rate.and_then(|s| s.parse().ok()),
            profile: self.profile,
            pix_fmt: self.pix_fmt,
            bits_per_raw_sample: self.bits_per_raw_sample.and_then(|s| s.parse().ok()),
            r_frame_rate: self.r_frame_rate,
            avg_frame_rate: self.avg_frame_rate,
            sample_aspect_ratio: self.sample_aspect_ratio,
            display_aspect_ratio: self.display_aspect_ratio,
            tags: self.tags,
            mastering_display,
            max_content_light_level,
            max_frame_average_light_level,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawChapter {
    id: i64,
    start_time: String,
    end_time: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl RawChapter {
    fn into_record(self) -> Chapter {
        Chapter {
            id: self.id,
            start: self.start_time.parse().unwrap_or(0.0),
            end: self.end_time.parse().unwrap_or(0.0),
            title: self.tags.get("title").cloned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawProgram {
    program_id: i64,
    #[serde(default)]
    streams: Vec<RawProgramStream>,
}

#[derive(Debug, Deserialize)]
struct RawProgramStream {
    index: usize,
}

impl RawProgram {
    fn into_record(self) -> ProgramRecord {
        ProgramRecord {
            id: self.program_id,
            stream_indices: self.streams.into_iter().map(|s| s.index).collect(),
        }
    }
}

/// Surface A entry point (§6) over a default [`Prober`] and a fresh
/// cancellation token. Callers that need to reuse a `Prober` or share a
/// token across many probes should construct one directly instead.
pub async fn probe_file(options: &ProbeOptions) -> Result<AnalysisReport, ProbeError> {
    let prober = Prober::default();
    let token = CancellationToken::new();
    prober.probe(options, &token).await
}

/// Same path as [`probe_file`]; the prober binary itself does not
/// distinguish a local path from a URL (§4.1), so this is kept as a
/// separate entry point purely to match the callers' intent at the
/// Surface A boundary named in §6.
pub async fn probe_url(options: &ProbeOptions) -> Result<AnalysisReport, ProbeError> {
    probe_file(options).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_matches_scenario_one() {
        let opts = ProbeOptions {
            show_format: true,
            show_streams: true,
            ..ProbeOptions::for_input("/tmp/a.mp4")
        };
        assert_eq!(
            opts.build_argv(),
            vec![
                "-hide_banner",
                "-of",
                "json",
                "-show_format",
                "-show_streams",
                "-i",
                "/tmp/a.mp4",
            ]
        );
    }

    #[test]
    fn rejects_shell_metacharacters() {
        let opts = ProbeOptions::for_input("/tmp/a.mp4; rm -rf /");
        let err = opts.validate().unwrap_err();
        assert!(matches!(err, ProbeError::ShellMetacharacter(';')));
    }

    #[test]
    fn rejects_each_forbidden_metacharacter_individually() {
        for c in crate::util::FORBIDDEN_SHELL_METACHARACTERS {
            let opts = ProbeOptions::for_input(format!("/tmp/a{c}.mp4"));
            assert!(matches!(
                opts.validate(),
                Err(ProbeError::ShellMetacharacter(_))
            ));
        }
    }

    #[test]
    fn rejects_nonexistent_file() {
        let opts = ProbeOptions::for_input("/no/such.mp4");
        assert!(matches!(opts.validate(), Err(ProbeError::FileNotFound(_))));
    }

    #[test]
    fn accepts_url_without_filesystem_check() {
        let opts = ProbeOptions::for_input("https://host/v.mp4");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout() {
        let opts = ProbeOptions {
            timeout: Duration::ZERO,
            ..ProbeOptions::for_input("https://host/v.mp4")
        };
        assert!(matches!(opts.validate(), Err(ProbeError::TimeoutZero)));
    }

    #[test]
    fn rejects_timeout_over_an_hour() {
        let opts = ProbeOptions {
            timeout: Duration::from_secs(61 * 60),
            ..ProbeOptions::for_input("https://host/v.mp4")
        };
        assert!(matches!(
            opts.validate(),
            Err(ProbeError::TimeoutTooLarge(_))
        ));
    }

    #[test]
    fn output_cap_at_limit_is_accepted_above_limit_rejected() {
        let mut opts = ProbeOptions::for_input("https://host/v.mp4");
        opts.output_size_cap = MAX_OUTPUT_CAP_BYTES;
        assert!(opts.validate().is_ok());
        opts.output_size_cap = MAX_OUTPUT_CAP_BYTES + 1;
        assert!(matches!(
            opts.validate(),
            Err(ProbeError::OutputCapTooLarge(_))
        ));
    }

    #[test]
    fn rejects_invalid_stream_selector() {
        let opts = ProbeOptions {
            select_streams: Some("; drop table".to_owned()),
            ..ProbeOptions::for_input("https://host/v.mp4")
        };
        assert!(matches!(
            opts.validate(),
            Err(ProbeError::InvalidStreamSelector(_))
        ));
    }

    #[test]
    fn accepts_valid_stream_selector() {
        let opts = ProbeOptions {
            select_streams: Some("v:0".to_owned()),
            ..ProbeOptions::for_input("https://host/v.mp4")
        };
        assert!(opts.validate().is_ok());
    }
}
