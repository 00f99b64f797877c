//! # docx-slideshow
//!
//! Turn a Word document into a narrated slideshow video.
//!
//! The pictures embedded in a `.docx` become the slides, in the order the
//! package relationships list them. The paragraph text, joined with spaces,
//! is read aloud by a speech synthesiser and becomes the soundtrack. ffmpeg
//! renders the two together into an MP4.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx
//!  │
//!  ├─ 1. Extract  unzip, walk relationships + body XML (spawn_blocking)
//!  ├─ 2. Narrate  joined text → voiceover.mp3 (Google Translate TTS by default)
//!  ├─ 3. Time     even split of the audio, or a fixed 50 s per image
//!  └─ 4. Compose  ffprobe the audio, one ffmpeg run → slideshow.mp4
//! ```
//!
//! Every run happens inside its own [`Workspace`], a temporary directory that
//! is deleted when the workspace is dropped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docx_slideshow::{convert_to_file, SlideshowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SlideshowConfig::default();
//!     let stats = convert_to_file("report.docx", "report.mp4", &config).await?;
//!     eprintln!(
//!         "{} images, {:.1}s of narration",
//!         stats.image_count, stats.audio_duration_secs
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! `ffmpeg` and `ffprobe` must be on `PATH` (or configured with
//! [`SlideshowConfigBuilder::ffmpeg_bin`] / [`SlideshowConfigBuilder::ffprobe_bin`]).
//! The default synthesiser needs network access to `translate.google.com`;
//! plug in your own with [`SlideshowConfigBuilder::synthesizer`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docx2video` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ImageNaming, SlideshowConfig, SlideshowConfigBuilder, TimingPolicy};
pub use convert::{convert_sync, convert_to_file, inspect, render_slideshow};
pub use error::{SlideshowError, Stage};
pub use output::{DocumentSummary, SlideshowOutput, SlideshowStats};
pub use pipeline::tts::{GoogleTranslateTts, SpeechSynthesizer};
pub use progress::{NoopProgressCallback, ProgressCallback, SlideshowProgressCallback};
pub use server::{router, serve, AppState, ServerConfig};
pub use workspace::Workspace;
