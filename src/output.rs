//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A rendered slideshow sitting inside its workspace.
///
/// `video_path` is only valid while the [`crate::workspace::Workspace`] it
/// was rendered into is alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideshowOutput {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub image_paths: Vec<PathBuf>,
    pub stats: SlideshowStats,
}

/// Numbers describing one conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideshowStats {
    pub image_count: usize,
    pub paragraph_count: usize,
    /// Characters in the space-joined narration.
    pub narration_chars: usize,
    pub audio_duration_secs: f64,
    pub seconds_per_image: f64,
    pub video_duration_secs: f64,
    /// `true` when the audio hit the long-audio threshold and every image got
    /// the fixed duration; video and audio lengths may then differ.
    pub fixed_duration_branch: bool,
    pub extract_duration_ms: u64,
    pub narrate_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What [`crate::convert::inspect`] reports about a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Package part names of the image relationships, in extraction order.
    pub image_parts: Vec<String>,
    pub paragraph_count: usize,
    pub blank_paragraphs: usize,
    pub narration_chars: usize,
}
