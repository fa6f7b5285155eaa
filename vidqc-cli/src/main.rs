//! `vidqc`: a local, debugging-oriented front end over the analysis core.
//!
//! Exercises Surface A end-to-end (§6) without a transport layer: probe a
//! file, run a filter expression, fully analyze a file, or compare two
//! files for quality. Exit codes follow §6: 0 success, 1 validation error,
//! 2 Prober/Filter failure, 3 timeout.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use vidqc_core::filter::{FilterRequest, FilterRunner};
use vidqc_core::prober::{ProbeOptions, Prober};
use vidqc_core::quality::{compare_quality, MetricKind, QualityConfig};
use vidqc_core::{analyze_content, AnalysisError, CancellationToken};

#[derive(Parser)]
#[command(name = "vidqc", version, about = "Media analysis core CLI")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the rotated log file (see `vidqc-logging`).
    #[arg(long, global = true, default_value = "vidqc.log")]
    log_file: String,

    /// Console log verbosity.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Prober against a file or URL and print the JSON report.
    Probe {
        input: String,
        #[arg(long)]
        show_frames: bool,
    },
    /// Run a raw filter expression and print parsed measurement lines.
    Filter {
        input: String,
        #[arg(long)]
        expr: String,
        #[arg(long)]
        audio: bool,
    },
    /// Probe and run the full analyzer catalogue over a file.
    Analyze { input: String },
    /// Compare a reference and distorted file across one or more metrics.
    CompareQuality {
        reference: String,
        distorted: String,
        #[arg(long, value_delimiter = ',', default_value = "vmaf")]
        metrics: Vec<String>,
    },
}

fn parse_metric(name: &str) -> Option<MetricKind> {
    match name.to_ascii_lowercase().as_str() {
        "vmaf" => Some(MetricKind::Vmaf),
        "psnr" => Some(MetricKind::Psnr),
        "ssim" => Some(MetricKind::Ssim),
        "mse" => Some(MetricKind::Mse),
        "ms-ssim" | "msssim" => Some(MetricKind::MsSsim),
        "lpips" => Some(MetricKind::Lpips),
        _ => None,
    }
}

fn exit_code_for(error: &AnalysisError) -> ExitCode {
    match error.kind() {
        "validation" => ExitCode::from(1),
        "timeout" => ExitCode::from(3),
        _ => ExitCode::from(2),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let console_level = args.log_level.parse().unwrap_or(LevelFilter::INFO);
    vidqc_logging::try_init(console_level, LevelFilter::DEBUG, &args.log_file).ok();

    match run(args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            match err.downcast_ref::<AnalysisError>() {
                Some(analysis_err) => exit_code_for(analysis_err),
                None => ExitCode::from(1),
            }
        },
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Probe { input, show_frames } => {
            let prober = Prober::default();
            let token = CancellationToken::new();
            let options = ProbeOptions {
                show_format: true,
                show_streams: true,
                show_chapters: true,
                show_programs: true,
                show_frames,
                ..ProbeOptions::for_input(&input)
            };
            let report = prober.probe(&options, &token).await.map_err(AnalysisError::from)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
        Command::Filter { input, expr, audio } => {
            let runner = FilterRunner::default();
            let token = CancellationToken::new();
            let request = FilterRequest {
                audio,
                ..FilterRequest::new(&input, &expr)
            };
            let output = runner.run(&request, &token).await.map_err(AnalysisError::from)?;
            print!("{}", output.stderr);
        },
        Command::Analyze { input } => {
            let report = analyze_content(&input).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
        Command::CompareQuality {
            reference,
            distorted,
            metrics,
        } => {
            let parsed: Vec<MetricKind> = metrics
                .iter()
                .filter_map(|name| parse_metric(name))
                .collect();
            if parsed.is_empty() {
                anyhow::bail!("no recognized metrics among {metrics:?}");
            }
            let result =
                compare_quality(&reference, &distorted, &parsed, &QualityConfig::default())
                    .await
                    .map_err(AnalysisError::from)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        },
    }
    Ok(())
}
