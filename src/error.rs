//! Error types for the docx-slideshow library.
//!
//! Every failure is fatal for the request that hit it: there is no partial
//! video worth returning. [`SlideshowError`] carries enough detail for the
//! logs, and [`SlideshowError::stage`] tells the orchestrator which pipeline
//! stage produced it. The HTTP layer collapses all of them into one generic
//! message; the CLI prints them verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Pull images and paragraph text out of the document package.
    Extraction,
    /// Synthesise the voice-over from the paragraph text.
    Narration,
    /// Render stills + voice-over into the output video.
    Composition,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Narration => "narration",
            Stage::Composition => "composition",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All fatal errors returned by the docx-slideshow library.
#[derive(Debug, Error)]
pub enum SlideshowError {
    // ── Input / extraction errors ─────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file could not be opened as a ZIP package.
    #[error("File is not a valid .docx package: '{path}': {detail}")]
    NotADocx { path: PathBuf, detail: String },

    /// A part the package refers to is absent.
    #[error("Document package is missing part '{part}'")]
    MissingPart { part: String },

    /// A part exists but its XML cannot be parsed.
    #[error("Malformed XML in part '{part}': {detail}")]
    MalformedXml { part: String, detail: String },

    /// An extracted image could not be written to the workspace.
    #[error("Failed to write extracted image '{path}': {source}")]
    ImageWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Narration errors ──────────────────────────────────────────────────
    /// Every paragraph was blank; there is nothing to speak.
    #[error("Document has no text to narrate (all paragraphs are blank)")]
    EmptyNarration,

    /// The speech backend could not be reached or returned garbage.
    #[error("Speech synthesis request failed: {detail}")]
    TtsRequestFailed { detail: String },

    /// The speech backend answered with a non-success status.
    #[error("Speech synthesis returned HTTP {status} for chunk {chunk}")]
    TtsHttpStatus { status: u16, chunk: usize },

    /// The speech backend did not answer in time.
    #[error("Speech synthesis timed out after {secs}s")]
    TtsTimeout { secs: u64 },

    /// The voice-over file could not be written.
    #[error("Failed to write voice-over '{path}': {source}")]
    AudioWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Composition errors ────────────────────────────────────────────────
    /// The document has no images, so there is nothing to show.
    #[error("Document contains no images; a slideshow needs at least one")]
    NoImages,

    /// ffprobe reported a zero (or negative) voice-over duration.
    #[error("Voice-over '{path}' has zero duration")]
    ZeroLengthAudio { path: PathBuf },

    /// An external media tool is not installed or not on `PATH`.
    #[error("'{tool}' could not be started: {detail}\n{hint}")]
    ToolNotFound {
        tool: String,
        detail: String,
        hint: String,
    },

    /// `ffprobe` ran but its output could not be understood.
    #[error("Could not determine duration of '{path}': {detail}")]
    ProbeFailed { path: PathBuf, detail: String },

    /// An extracted image cannot be decoded (e.g. EMF/WMF vector art).
    #[error("Unreadable image '{path}': {detail}")]
    UnreadableImage { path: PathBuf, detail: String },

    /// `ffmpeg` exited unsuccessfully.
    #[error("Video encoding failed ({status}): {stderr}")]
    EncodeFailed { status: String, stderr: String },

    // ── Workspace / output errors ─────────────────────────────────────────
    /// The per-request workspace directory could not be created.
    #[error("Failed to create workspace directory: {source}")]
    WorkspaceFailed {
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output video file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlideshowError {
    /// The pipeline stage this error belongs to, if any.
    ///
    /// Workspace, output, config and internal errors happen outside the
    /// three stages and return `None`.
    pub fn stage(&self) -> Option<Stage> {
        use SlideshowError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | NotADocx { .. }
            | MissingPart { .. }
            | MalformedXml { .. }
            | ImageWriteFailed { .. } => Some(Stage::Extraction),
            EmptyNarration
            | TtsRequestFailed { .. }
            | TtsHttpStatus { .. }
            | TtsTimeout { .. }
            | AudioWriteFailed { .. } => Some(Stage::Narration),
            NoImages
            | ZeroLengthAudio { .. }
            | ToolNotFound { .. }
            | ProbeFailed { .. }
            | UnreadableImage { .. }
            | EncodeFailed { .. } => Some(Stage::Composition),
            WorkspaceFailed { .. } | OutputWriteFailed { .. } | InvalidConfig(_) | Internal(_) => {
                None
            }
        }
    }
}
