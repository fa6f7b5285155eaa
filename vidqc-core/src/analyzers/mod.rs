//! Analyzer Set (§4.3): ~25 independent passes over a probed input, each
//! producing one sub-report field of [`crate::report::EnhancedReport`].
//!
//! Analyzers are values, not a trait-object hierarchy (§9): each
//! [`AnalyzerSpec`] pairs a name with a function pointer. The orchestrator
//! iterates a fixed list built by [`catalogue`]; list order is also the
//! field order of `EnhancedReport`, which is what makes report field
//! ordering deterministic regardless of completion order.

pub mod filter_based;
pub mod gop;
pub mod misc;
pub mod stream_based;
pub mod types;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::AnalyzerError;
use crate::filter::FilterRunner;
use crate::prober::Prober;
use crate::report::{AnalysisReport, EnhancedReport};
use crate::CancellationToken;

/// Closure applied to the master report on the orchestrator's single
/// writer task. Never shared; moved in from exactly one analyzer task.
pub type ApplyFn = Box<dyn FnOnce(&mut EnhancedReport) + Send>;

pub type AnalyzerFuture = Pin<Box<dyn Future<Output = Result<ApplyFn, AnalyzerError>> + Send>>;

/// Shared, read-only context every analyzer is handed. Owns `Arc`s so an
/// owned clone can be moved into a spawned `'static` task; `primary` is
/// the already-parsed probe report that seeded streams/format data.
#[derive(Clone)]
pub struct AnalysisContext {
    pub prober: Arc<Prober>,
    pub filter: Arc<FilterRunner>,
    pub token: CancellationToken,
    pub primary: Arc<AnalysisReport>,
}

pub struct AnalyzerSpec {
    pub name: &'static str,
    pub run: fn(AnalysisContext, String) -> AnalyzerFuture,
}

macro_rules! analyzer_entry {
    ($name:literal, $module:ident :: $func:ident) => {
        AnalyzerSpec {
            name: $name,
            run: |ctx, input| Box::pin(async move { $module::$func(&ctx, &input).await }),
        }
    };
}

/// The fixed analyzer list. Order here is the field order of
/// `EnhancedReport` (§4.4 "Tie-break and ordering").
pub fn catalogue() -> Vec<AnalyzerSpec> {
    vec![
        analyzer_entry!("stream_counts", stream_based::stream_counts),
        analyzer_entry!("video_characteristics", stream_based::video_characteristics),
        analyzer_entry!("gop", gop::gop),
        analyzer_entry!("frame_stats", gop::frame_stats),
        analyzer_entry!("black_frame", filter_based::black_frame),
        analyzer_entry!("freeze_frame", filter_based::freeze_frame),
        analyzer_entry!("audio_clipping", filter_based::audio_clipping),
        analyzer_entry!("blockiness", filter_based::blockiness),
        analyzer_entry!("blurriness", filter_based::blurriness),
        analyzer_entry!("noise", filter_based::noise),
        analyzer_entry!("interlace", filter_based::interlace),
        analyzer_entry!("loudness", filter_based::loudness),
        analyzer_entry!("hdr", stream_based::hdr),
        analyzer_entry!("bit_depth", stream_based::bit_depth),
        analyzer_entry!("resolution", stream_based::resolution),
        analyzer_entry!("frame_rate", stream_based::frame_rate),
        analyzer_entry!("codec", stream_based::codec),
        analyzer_entry!("container", stream_based::container),
        analyzer_entry!("timecode", misc::timecode),
        analyzer_entry!("afd", misc::afd),
        analyzer_entry!("transport_stream", misc::transport_stream),
        analyzer_entry!("endianness", misc::endianness),
        analyzer_entry!("audio_wrapping", misc::audio_wrapping),
        analyzer_entry!("imf", misc::imf),
        analyzer_entry!("mxf", misc::mxf),
        analyzer_entry!("dead_pixel", filter_based::dead_pixel),
        analyzer_entry!("pse_risk", filter_based::pse_risk),
        analyzer_entry!("stream_disposition", stream_based::stream_disposition),
        analyzer_entry!("data_integrity", misc::data_integrity),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_order_matches_enhanced_report_field_order() {
        let names: Vec<&str> = catalogue().iter().map(|a| a.name).collect();
        assert_eq!(
            names,
            vec![
                "stream_counts",
                "video_characteristics",
                "gop",
                "frame_stats",
                "black_frame",
                "freeze_frame",
                "audio_clipping",
                "blockiness",
                "blurriness",
                "noise",
                "interlace",
                "loudness",
                "hdr",
                "bit_depth",
                "resolution",
                "frame_rate",
                "codec",
                "container",
                "timecode",
                "afd",
                "transport_stream",
                "endianness",
                "audio_wrapping",
                "imf",
                "mxf",
                "dead_pixel",
                "pse_risk",
                "stream_disposition",
                "data_integrity",
            ]
        );
    }

    #[test]
    fn catalogue_has_no_duplicate_names() {
        let names: Vec<&str> = catalogue().iter().map(|a| a.name).collect();
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }
}
