//! Narration: paragraph text → one voice-over file.

use crate::error::SlideshowError;
use crate::pipeline::tts::SpeechSynthesizer;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The synthesised voice-over.
#[derive(Debug, Clone)]
pub struct Narration {
    pub audio_path: PathBuf,
    /// Characters in the narration string sent to the synthesiser.
    pub text_chars: usize,
}

/// Join paragraph blocks with single spaces.
///
/// Blank blocks add no characters but keep their separators, so
/// `["a", "", "b"]` becomes `"a  b"`.
pub fn narration_text(blocks: &[String]) -> String {
    blocks.join(" ")
}

/// Synthesise `paragraphs` into `out`.
///
/// A narration that is only whitespace fails with
/// [`SlideshowError::EmptyNarration`] before the synthesiser is called.
pub async fn narrate(
    paragraphs: &[String],
    synthesizer: &dyn SpeechSynthesizer,
    language: &str,
    out: &Path,
) -> Result<Narration, SlideshowError> {
    let text = narration_text(paragraphs);
    if text.trim().is_empty() {
        return Err(SlideshowError::EmptyNarration);
    }

    let text_chars = text.chars().count();
    debug!(
        "Narrating {} chars via {} ({})",
        text_chars,
        synthesizer.name(),
        language
    );
    synthesizer.synthesize(&text, language, out).await?;

    let size = tokio::fs::metadata(out)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    if size == 0 {
        return Err(SlideshowError::TtsRequestFailed {
            detail: format!("{} produced no audio", synthesizer.name()),
        });
    }
    info!("Voice-over written: {} ({} bytes)", out.display(), size);

    Ok(Narration {
        audio_path: out.to_path_buf(),
        text_chars,
    })
}
