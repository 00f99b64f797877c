//! Speech synthesis backends.
//!
//! [`SpeechSynthesizer`] is the seam between the narration stage and whatever
//! turns text into audio. The default backend, [`GoogleTranslateTts`], speaks
//! to the public Google Translate TTS endpoint: it accepts at most 100
//! characters per request and returns MP3, so the text is chunked and the
//! MP3 frames of each answer are appended to one file in order. MPEG audio
//! frames are self-delimiting, so plain concatenation is a valid stream.

use crate::error::SlideshowError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Maximum characters the Translate TTS endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Sentence-ish pieces: a run of text up to and including its punctuation.
static RE_PIECE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^.!?;:,\n。！？；：，、]+[.!?;:,\n。！？；：，、]*|[.!?;:,\n。！？；：，、]+").unwrap()
});

/// Turns text into an audio file.
///
/// Implementations must write a complete, playable file at `out` or return
/// an error; the narration stage treats an empty file as a failure.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, language: &str, out: &Path)
        -> Result<(), SlideshowError>;
}

/// Google Translate text-to-speech over HTTPS.
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    /// `https://translate.google.<tld>`, without a trailing slash.
    base_url: String,
    timeout_secs: u64,
}

impl GoogleTranslateTts {
    pub fn new(tld: impl Into<String>, timeout_secs: u64) -> Result<Self, SlideshowError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SlideshowError::TtsRequestFailed {
                detail: format!("could not build HTTP client: {e}"),
            })?;
        let tld: String = tld.into();
        Ok(Self {
            client,
            base_url: format!("https://translate.google.{}", tld),
            timeout_secs,
        })
    }

    /// Point the backend at another host serving `/translate_tts`.
    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Request URL for chunk `idx` of `total`.
    pub fn chunk_url(
        &self,
        chunk: &str,
        language: &str,
        idx: usize,
        total: usize,
    ) -> Result<Url, SlideshowError> {
        let endpoint = format!("{}/translate_tts", self.base_url);
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        Url::parse_with_params(
            &endpoint,
            &[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", chunk),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
                ("ttsspeed", "1"),
            ],
        )
        .map_err(|e| SlideshowError::TtsRequestFailed {
            detail: format!("invalid TTS endpoint '{endpoint}': {e}"),
        })
    }

    async fn fetch_chunk(&self, url: Url, chunk_no: usize) -> Result<Vec<u8>, SlideshowError> {
        let referer = format!("{}/", self.base_url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, referer)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(SlideshowError::TtsHttpStatus {
                status: response.status().as_u16(),
                chunk: chunk_no,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if bytes.is_empty() {
            return Err(SlideshowError::TtsRequestFailed {
                detail: format!("empty audio returned for chunk {chunk_no}"),
            });
        }
        Ok(bytes.to_vec())
    }

    fn transport_error(&self, e: reqwest::Error) -> SlideshowError {
        if e.is_timeout() {
            SlideshowError::TtsTimeout {
                secs: self.timeout_secs,
            }
        } else {
            SlideshowError::TtsRequestFailed {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google-translate"
    }

    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        out: &Path,
    ) -> Result<(), SlideshowError> {
        let chunks = split_for_tts(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SlideshowError::EmptyNarration);
        }
        debug!("Synthesising {} chunks ({})", chunks.len(), language);

        let write_err = |source| SlideshowError::AudioWriteFailed {
            path: out.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(out).await.map_err(write_err)?;

        let total = chunks.len();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, language, idx, total)?;
            let audio = self.fetch_chunk(url, idx + 1).await?;
            debug!("Chunk {}/{}: {} bytes", idx + 1, total, audio.len());
            file.write_all(&audio).await.map_err(write_err)?;
        }

        file.flush().await.map_err(write_err)?;
        Ok(())
    }
}

/// Split narration into request-sized chunks of at most `max_chars` characters.
///
/// Sentence punctuation is the preferred break, then whitespace, then a hard
/// cut. Neighbouring short pieces are packed together to keep the request
/// count down. Pieces with no letters or digits are dropped: the endpoint
/// has nothing to say for them.
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces: Vec<String> = Vec::new();

    for m in RE_PIECE.find_iter(text) {
        let piece = collapse_whitespace(m.as_str());
        if !piece.chars().any(char::is_alphanumeric) {
            continue;
        }
        if piece.chars().count() <= max_chars {
            pieces.push(piece);
        } else {
            pieces.extend(split_long(&piece, max_chars));
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    for piece in pieces {
        match chunks.last_mut() {
            Some(last) if last.chars().count() + 1 + piece.chars().count() <= max_chars => {
                last.push(' ');
                last.push_str(&piece);
            }
            _ => chunks.push(piece),
        }
    }
    chunks
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Break an over-long piece at word boundaries, hard-cutting words that are
/// themselves too long.
fn split_long(piece: &str, max_chars: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in piece.split(' ') {
        let mut word = word.to_string();
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let cut: String = word.chars().take(max_chars).collect();
            word = word.chars().skip(max_chars).collect();
            out.push(cut);
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
