//! CLI binary for docx-slideshow.
//!
//! A thin shim over the library crate: flags map onto `SlideshowConfig`,
//! subcommands onto `convert_to_file`, `inspect` and `serve`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docx_slideshow::{
    convert_to_file, inspect, serve, ImageNaming, ProgressCallback, ServerConfig, SlideshowConfig,
    SlideshowProgressCallback, SlideshowStats, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner for the whole run, with a log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Extraction => "reading document…",
        Stage::Narration => "synthesising voice-over…",
        Stage::Composition => "rendering video…",
    }
}

impl SlideshowProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, document: &str) {
        self.bar.set_message(document.to_string());
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(stage_message(stage));
    }

    fn on_stage_complete(&self, stage: Stage, summary: &str) {
        self.bar.println(format!(
            "  {} {:<12} {}",
            green("✓"),
            stage.as_str(),
            dim(summary)
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        self.bar.println(format!("  {} {:<12} {}", red("✗"), stage.as_str(), red(error)));
        self.bar.finish_and_clear();
    }

    fn on_pipeline_complete(&self, _stats: &SlideshowStats) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a document into a video
  docx2video convert report.docx -o report.mp4

  # See what a document contains (no network, no ffmpeg)
  docx2video inspect report.docx

  # Run the upload form on http://127.0.0.1:5000/
  docx2video serve

  # Narrate in French, through translate.google.fr
  docx2video convert --language fr --tts-tld fr notes.docx -o notes.mp4

TIMING:
  Narration shorter than 150 s is split evenly across the images, so the
  video ends with the voice-over. From 150 s on, every image is shown for
  50 s and the video is cut to images × 50 s.

REQUIREMENTS:
  ffmpeg and ffprobe on PATH (or --ffmpeg / --ffprobe).
  Network access to translate.google.<tld> for speech synthesis.
"#;

#[derive(Parser, Debug)]
#[command(
    name = "docx2video",
    version,
    about = "Turn a Word document into a narrated slideshow video",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug-level logging.
    #[arg(short, long, global = true, env = "DOCX2VIDEO_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "DOCX2VIDEO_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document to an MP4 file.
    Convert {
        input: PathBuf,

        #[arg(short, long, env = "DOCX2VIDEO_OUTPUT", default_value = "slideshow.mp4")]
        output: PathBuf,

        /// Print the run statistics as JSON on stdout.
        #[arg(long, env = "DOCX2VIDEO_JSON")]
        json: bool,

        #[arg(long, env = "DOCX2VIDEO_NO_PROGRESS")]
        no_progress: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Show the images and text a document would contribute.
    Inspect {
        input: PathBuf,

        #[arg(long, env = "DOCX2VIDEO_JSON")]
        json: bool,
    },

    /// Serve the upload form.
    Serve {
        #[arg(long, env = "DOCX2VIDEO_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, env = "DOCX2VIDEO_PORT", default_value_t = 5000)]
        port: u16,

        /// Largest accepted upload, in MiB.
        #[arg(long, env = "DOCX2VIDEO_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Narration language (a Google Translate language code).
    #[arg(long, env = "DOCX2VIDEO_LANGUAGE", default_value = "en")]
    language: String,

    /// Top-level domain of the Google Translate host.
    #[arg(long, env = "DOCX2VIDEO_TTS_TLD", default_value = "com")]
    tts_tld: String,

    #[arg(long, env = "DOCX2VIDEO_TTS_TIMEOUT", default_value_t = 60)]
    tts_timeout: u64,

    #[arg(long, env = "DOCX2VIDEO_FPS", default_value_t = 24,
          value_parser = clap::value_parser!(u32).range(1..=120))]
    fps: u32,

    /// Narration length (seconds) from which every image gets a fixed duration.
    #[arg(long, env = "DOCX2VIDEO_LONG_AUDIO_THRESHOLD", default_value_t = 150.0)]
    long_audio_threshold: f64,

    /// Seconds per image once the threshold is reached.
    #[arg(long, env = "DOCX2VIDEO_DEFAULT_IMAGE_SECS", default_value_t = 50.0)]
    default_image_secs: f64,

    /// Name every extracted image `imageN.png` whatever its real format.
    #[arg(long, env = "DOCX2VIDEO_KEEP_PNG_EXTENSION")]
    keep_png_extension: bool,

    #[arg(long, env = "DOCX2VIDEO_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[arg(long, env = "DOCX2VIDEO_FFPROBE", default_value = "ffprobe")]
    ffprobe: PathBuf,

    #[arg(long, env = "DOCX2VIDEO_VIDEO_CODEC", default_value = "libx264")]
    video_codec: String,

    #[arg(long, env = "DOCX2VIDEO_AUDIO_CODEC", default_value = "aac")]
    audio_codec: String,

    /// Parent directory for per-run workspaces (default: system temp dir).
    #[arg(long, env = "DOCX2VIDEO_WORKDIR")]
    workdir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers the INFO-level stage logs during `convert`.
    let show_progress = match &cli.command {
        Command::Convert {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert {
            input,
            output,
            json,
            pipeline,
            ..
        } => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn SlideshowProgressCallback>)
            } else {
                None
            };
            let config = build_config(&pipeline, progress)?;

            let stats = convert_to_file(&input, &output, &config)
                .await
                .with_context(|| format!("Failed to convert {}", input.display()))?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
                );
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} images  {:.1}s audio  {:.1}s video{}  {}ms  →  {}",
                    green("✔"),
                    stats.image_count,
                    stats.audio_duration_secs,
                    stats.video_duration_secs,
                    if stats.fixed_duration_branch {
                        dim(&format!(" ({:.0}s per image)", stats.seconds_per_image))
                    } else {
                        String::new()
                    },
                    stats.total_duration_ms,
                    bold(&output.display().to_string()),
                );
            }
        }

        Command::Inspect { input, json } => {
            let summary = inspect(&input)
                .await
                .with_context(|| format!("Failed to inspect {}", input.display()))?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)
                        .context("Failed to serialise summary")?
                );
            } else {
                println!("File:         {}", input.display());
                println!("Images:       {}", summary.image_parts.len());
                for part in &summary.image_parts {
                    println!("              {}", part);
                }
                println!(
                    "Paragraphs:   {} ({} blank)",
                    summary.paragraph_count, summary.blank_paragraphs
                );
                println!("Narration:    {} chars", summary.narration_chars);
            }
        }

        Command::Serve {
            host,
            port,
            max_upload_mb,
            pipeline,
        } => {
            let config = build_config(&pipeline, None)?;
            let server = ServerConfig {
                host,
                port,
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            };
            serve(server, config).await.context("Server failed")?;
        }
    }

    Ok(())
}

fn build_config(
    args: &PipelineArgs,
    progress: Option<ProgressCallback>,
) -> Result<SlideshowConfig> {
    let mut builder = SlideshowConfig::builder()
        .language(&args.language)
        .tts_tld(&args.tts_tld)
        .tts_timeout_secs(args.tts_timeout)
        .fps(args.fps)
        .long_audio_threshold_secs(args.long_audio_threshold)
        .default_image_secs(args.default_image_secs)
        .image_naming(if args.keep_png_extension {
            ImageNaming::AlwaysPng
        } else {
            ImageNaming::DetectFormat
        })
        .ffmpeg_bin(&args.ffmpeg)
        .ffprobe_bin(&args.ffprobe)
        .video_codec(&args.video_codec)
        .audio_codec(&args.audio_codec);

    if let Some(ref dir) = args.workdir {
        builder = builder.workspace_root(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
