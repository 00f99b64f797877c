//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docx_slideshow::{SlideshowError, SpeechSynthesizer};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Build a minimal `.docx` in memory: one PNG per entry of `image_sizes`
/// (in relationship order) and one body paragraph per entry of `paragraphs`.
pub fn docx_bytes(paragraphs: &[&str], image_sizes: &[(u32, u32)]) -> Vec<u8> {
    let images: Vec<(&str, Vec<u8>)> = image_sizes
        .iter()
        .enumerate()
        .map(|(i, &(w, h))| ("png", encode_image(w, h, i, image::ImageFormat::Png)))
        .collect();
    docx_with_images(paragraphs, &images)
}

/// Like [`docx_bytes`], with ready-made payloads as `(extension, bytes)`.
pub fn docx_with_images(paragraphs: &[&str], images: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, (ext, _)) in images.iter().enumerate() {
        let n = i + 1;
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{IMAGE_REL}" Target="media/image{n}.{ext}"/>"#
        ));
    }
    rels.push_str("</Relationships>");

    let body: String = paragraphs
        .iter()
        .map(|p| {
            if p.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>")
            }
        })
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    );

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.start_file("word/_rels/document.xml.rels", opts).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();

        for (i, (ext, bytes)) in images.iter().enumerate() {
            zip.start_file(format!("word/media/image{}.{}", i + 1, ext), opts)
                .unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// A `w`×`h` gradient encoded as `format`; `seed` varies the colours.
pub fn encode_image(w: u32, h: u32, seed: usize, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, (seed * 90 % 256) as u8])
    });
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

pub fn write_docx(path: &Path, paragraphs: &[&str], image_sizes: &[(u32, u32)]) {
    std::fs::write(path, docx_bytes(paragraphs, image_sizes)).unwrap();
}

/// Always fails, as a network outage would.
pub struct FailingSynth;

#[async_trait]
impl SpeechSynthesizer for FailingSynth {
    fn name(&self) -> &str {
        "failing"
    }

    async fn synthesize(
        &self,
        _text: &str,
        _language: &str,
        _out: &Path,
    ) -> Result<(), SlideshowError> {
        Err(SlideshowError::TtsRequestFailed {
            detail: "network unreachable".to_string(),
        })
    }
}

/// Renders a sine tone of a fixed length with ffmpeg, whatever the text.
pub struct ToneSynth {
    pub secs: f64,
}

#[async_trait]
impl SpeechSynthesizer for ToneSynth {
    fn name(&self) -> &str {
        "tone"
    }

    async fn synthesize(
        &self,
        _text: &str,
        _language: &str,
        out: &Path,
    ) -> Result<(), SlideshowError> {
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
            .arg(format!("sine=frequency=440:duration={}", self.secs))
            .arg(out)
            .status()
            .await
            .map_err(|e| SlideshowError::TtsRequestFailed {
                detail: e.to_string(),
            })?;
        if !status.success() {
            return Err(SlideshowError::TtsRequestFailed {
                detail: format!("ffmpeg exited with {status}"),
            });
        }
        Ok(())
    }
}

/// Container duration of a media file, via ffprobe.
pub fn media_secs(path: &Path) -> f64 {
    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .unwrap();
    String::from_utf8_lossy(&out.stdout).trim().parse().unwrap()
}

/// `(width, height)` of the first video stream, via ffprobe.
pub fn video_dimensions(path: &Path) -> (u32, u32) {
    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .unwrap();
    let text = String::from_utf8_lossy(&out.stdout);
    let (w, h) = text.trim().split_once('x').unwrap();
    (w.parse().unwrap(), h.parse().unwrap())
}

pub fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
