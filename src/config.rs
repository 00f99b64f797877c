//! Configuration types for docx-to-slideshow conversion.
//!
//! All conversion behaviour is controlled through [`SlideshowConfig`], built
//! via its [`SlideshowConfigBuilder`]. The config is process-wide: one value
//! is shared (behind an `Arc`) by every request the server handles, and
//! nothing in it is mutated per request.

use crate::error::SlideshowError;
use crate::pipeline::tts::SpeechSynthesizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a docx-to-slideshow conversion.
///
/// # Example
/// ```rust
/// use docx_slideshow::SlideshowConfig;
///
/// let config = SlideshowConfig::builder()
///     .fps(30)
///     .language("en")
///     .build()
///     .unwrap();
/// assert_eq!(config.fps, 30);
/// ```
#[derive(Clone)]
pub struct SlideshowConfig {
    /// Narration language code passed to the speech backend. Default: `"en"`.
    pub language: String,

    /// Output frame rate. Range: 1–120. Default: 24.
    pub fps: u32,

    /// How long each image stays on screen.
    pub timing: TimingPolicy,

    /// Extension policy for extracted image files. Default: [`ImageNaming::DetectFormat`].
    pub image_naming: ImageNaming,

    /// `ffmpeg` executable. Default: `"ffmpeg"` (looked up on `PATH`).
    pub ffmpeg_bin: PathBuf,

    /// `ffprobe` executable. Default: `"ffprobe"`.
    pub ffprobe_bin: PathBuf,

    /// ffmpeg video encoder. Default: `"libx264"`.
    pub video_codec: String,

    /// ffmpeg audio encoder. Default: `"aac"`.
    pub audio_codec: String,

    /// Top-level domain of the Google Translate TTS host. Default: `"com"`.
    pub tts_tld: String,

    /// Per-request timeout for each TTS HTTP call, in seconds. Default: 60.
    pub tts_timeout_secs: u64,

    /// Parent directory for per-request workspaces. `None` = system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Pre-constructed speech backend. `None` = Google Translate TTS.
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,

    /// Optional stage-event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            fps: 24,
            timing: TimingPolicy::default(),
            image_naming: ImageNaming::default(),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            tts_tld: "com".to_string(),
            tts_timeout_secs: 60,
            workspace_root: None,
            synthesizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SlideshowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlideshowConfig")
            .field("language", &self.language)
            .field("fps", &self.fps)
            .field("timing", &self.timing)
            .field("image_naming", &self.image_naming)
            .field("ffmpeg_bin", &self.ffmpeg_bin)
            .field("ffprobe_bin", &self.ffprobe_bin)
            .field("video_codec", &self.video_codec)
            .field("audio_codec", &self.audio_codec)
            .field("tts_tld", &self.tts_tld)
            .field("tts_timeout_secs", &self.tts_timeout_secs)
            .field("workspace_root", &self.workspace_root)
            .field(
                "synthesizer",
                &self.synthesizer.as_ref().map(|_| "<dyn SpeechSynthesizer>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SlideshowProgressCallback>"),
            )
            .finish()
    }
}

impl SlideshowConfig {
    /// Create a new builder for `SlideshowConfig`.
    pub fn builder() -> SlideshowConfigBuilder {
        SlideshowConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SlideshowConfig`].
pub struct SlideshowConfigBuilder {
    config: SlideshowConfig,
}

impl SlideshowConfigBuilder {
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn fps(mut self, fps: u32) -> Self {
        self.config.fps = fps;
        self
    }

    pub fn timing(mut self, timing: TimingPolicy) -> Self {
        self.config.timing = timing;
        self
    }

    pub fn long_audio_threshold_secs(mut self, secs: f64) -> Self {
        self.config.timing.long_audio_threshold_secs = secs;
        self
    }

    pub fn default_image_secs(mut self, secs: f64) -> Self {
        self.config.timing.default_image_secs = secs;
        self
    }

    pub fn image_naming(mut self, naming: ImageNaming) -> Self {
        self.config.image_naming = naming;
        self
    }

    pub fn ffmpeg_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_bin = path.into();
        self
    }

    pub fn ffprobe_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffprobe_bin = path.into();
        self
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.config.video_codec = codec.into();
        self
    }

    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.config.audio_codec = codec.into();
        self
    }

    pub fn tts_tld(mut self, tld: impl Into<String>) -> Self {
        self.config.tts_tld = tld.into();
        self
    }

    pub fn tts_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tts_timeout_secs = secs.max(1);
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn synthesizer(mut self, synth: Arc<dyn SpeechSynthesizer>) -> Self {
        self.config.synthesizer = Some(synth);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SlideshowConfig, SlideshowError> {
        let c = &self.config;
        if c.fps == 0 || c.fps > 120 {
            return Err(SlideshowError::InvalidConfig(format!(
                "fps must be 1–120, got {}",
                c.fps
            )));
        }
        if c.language.trim().is_empty() {
            return Err(SlideshowError::InvalidConfig(
                "language must not be empty".into(),
            ));
        }
        c.timing.validate()?;
        Ok(self.config)
    }
}

// ── Policies ─────────────────────────────────────────────────────────────

/// Per-image display duration policy.
///
/// Short narrations are split evenly across the images so the slideshow ends
/// with the voice-over. Narrations at or above `long_audio_threshold_secs`
/// give every image `default_image_secs` instead, so the video length is
/// `images × default_image_secs` and need not match the audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPolicy {
    /// Audio duration (seconds) from which the fixed per-image duration applies. Default: 150.
    pub long_audio_threshold_secs: f64,
    /// Seconds per image once the threshold is reached. Default: 50.
    pub default_image_secs: f64,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            long_audio_threshold_secs: 150.0,
            default_image_secs: 50.0,
        }
    }
}

impl TimingPolicy {
    fn validate(&self) -> Result<(), SlideshowError> {
        if !(self.long_audio_threshold_secs.is_finite() && self.long_audio_threshold_secs > 0.0) {
            return Err(SlideshowError::InvalidConfig(format!(
                "long-audio threshold must be a positive number of seconds, got {}",
                self.long_audio_threshold_secs
            )));
        }
        if !(self.default_image_secs.is_finite() && self.default_image_secs > 0.0) {
            return Err(SlideshowError::InvalidConfig(format!(
                "default image duration must be a positive number of seconds, got {}",
                self.default_image_secs
            )));
        }
        Ok(())
    }
}

/// File extension policy for images written to the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageNaming {
    /// Always `imageN.png`, whatever the payload really is.
    AlwaysPng,
    /// Sniff the payload and use its real extension (`imageN.jpg`, …). (default)
    #[default]
    DetectFormat,
}
