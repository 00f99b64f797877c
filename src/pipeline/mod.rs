//! Pipeline stages for docx-to-slideshow conversion.
//!
//! Each submodule implements exactly one transformation step, and the stages
//! run strictly in sequence; none calls back into an earlier one.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ narrate ──▶ compose
//! (zip/xml)   (tts)       (ffprobe + ffmpeg)
//! ```
//!
//! 1. [`extract`] — images in relationship order + one string per paragraph
//! 2. [`narrate`] — space-joined paragraph text → `voiceover.mp3`, through a
//!    [`tts::SpeechSynthesizer`]
//! 3. [`compose`] — per-image durations from [`timing`], then one ffmpeg run
//!    → `slideshow.mp4`

pub mod compose;
pub mod extract;
pub mod narrate;
pub mod timing;
pub mod tts;
