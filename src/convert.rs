//! Conversion entry points.
//!
//! [`render_slideshow`] is the core: it runs the three stages inside a
//! caller-owned [`Workspace`] and leaves the video there. The HTTP server
//! uses it directly so it can stream the file before the workspace goes
//! away. [`convert_to_file`] wraps it for callers who just want an MP4 at a
//! path.

use crate::config::SlideshowConfig;
use crate::error::{SlideshowError, Stage};
use crate::output::{DocumentSummary, SlideshowOutput, SlideshowStats};
use crate::pipeline::tts::{GoogleTranslateTts, SpeechSynthesizer};
use crate::pipeline::{compose, extract, narrate};
use crate::workspace::Workspace;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Convert a `.docx` into a narrated slideshow inside `workspace`.
///
/// # Errors
/// Any stage failure is returned as-is after being logged with its stage.
/// Nothing is retried.
pub async fn render_slideshow(
    doc_path: impl AsRef<Path>,
    workspace: &Workspace,
    config: &SlideshowConfig,
) -> Result<SlideshowOutput, SlideshowError> {
    let total_start = Instant::now();
    let doc_path = doc_path.as_ref();
    info!("Starting conversion: {}", doc_path.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_start(&doc_path.display().to_string());
    }

    let synthesizer = resolve_synthesizer(config)?;

    // ── Step 1: Extract ──────────────────────────────────────────────────
    let extract_start = Instant::now();
    let content = run_stage(
        config,
        Stage::Extraction,
        extract::extract(doc_path, workspace.path(), config.image_naming),
        |c| format!("{} images, {} paragraphs", c.images.len(), c.paragraphs.len()),
    )
    .await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Step 2: Narrate ──────────────────────────────────────────────────
    let narrate_start = Instant::now();
    let narration = run_stage(
        config,
        Stage::Narration,
        narrate::narrate(
            &content.paragraphs,
            synthesizer.as_ref(),
            &config.language,
            &workspace.voiceover_path(),
        ),
        |n| format!("{} characters narrated", n.text_chars),
    )
    .await?;
    let narrate_duration_ms = narrate_start.elapsed().as_millis() as u64;

    // ── Step 3: Compose ──────────────────────────────────────────────────
    let compose_start = Instant::now();
    let image_paths = content.image_paths();
    let composition = run_stage(
        config,
        Stage::Composition,
        compose::compose(
            &image_paths,
            &narration.audio_path,
            &workspace.video_path(),
            config,
        ),
        |c| {
            format!(
                "{:.1}s video, {:.2}s per image",
                c.plan.total_secs, c.timing.seconds_per_image
            )
        },
    )
    .await?;
    let compose_duration_ms = compose_start.elapsed().as_millis() as u64;

    let stats = SlideshowStats {
        image_count: image_paths.len(),
        paragraph_count: content.paragraphs.len(),
        narration_chars: narration.text_chars,
        audio_duration_secs: composition.audio_secs,
        seconds_per_image: composition.timing.seconds_per_image,
        video_duration_secs: composition.plan.total_secs,
        fixed_duration_branch: composition.timing.fixed,
        extract_duration_ms,
        narrate_duration_ms,
        compose_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} images, {:.1}s audio, {:.1}s video, {}ms total",
        stats.image_count,
        stats.audio_duration_secs,
        stats.video_duration_secs,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_pipeline_complete(&stats);
    }

    Ok(SlideshowOutput {
        video_path: composition.video_path,
        audio_path: narration.audio_path,
        image_paths,
        stats,
    })
}

/// Convert a `.docx` and write the video to `output_path`.
///
/// Uses its own workspace, removed before returning on every path. The copy
/// is atomic (temp file + rename) so a failed run never leaves a partial MP4
/// behind.
pub async fn convert_to_file(
    doc_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &SlideshowConfig,
) -> Result<SlideshowStats, SlideshowError> {
    let workspace = Workspace::create(config.workspace_root.as_deref())?;

    let result = match render_slideshow(doc_path, &workspace, config).await {
        Ok(output) => write_output(&output.video_path, output_path.as_ref())
            .await
            .map(|()| output.stats),
        Err(e) => Err(e),
    };

    workspace.release().await;
    result
}

/// Synchronous wrapper around [`convert_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    doc_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &SlideshowConfig,
) -> Result<SlideshowStats, SlideshowError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlideshowError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_to_file(doc_path, output_path, config))
}

/// Describe what a document would contribute without synthesising or
/// rendering anything.
pub async fn inspect(doc_path: impl AsRef<Path>) -> Result<DocumentSummary, SlideshowError> {
    let document = extract::load_document(doc_path.as_ref()).await?;
    let narration = narrate::narration_text(&document.paragraphs);

    Ok(DocumentSummary {
        image_parts: document
            .images
            .iter()
            .map(|i| i.part_name.clone())
            .collect(),
        paragraph_count: document.paragraphs.len(),
        blank_paragraphs: document
            .paragraphs
            .iter()
            .filter(|p| p.trim().is_empty())
            .count(),
        narration_chars: narration.chars().count(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Copy `video` to `path` through `<path>.mp4.tmp`, removing the temp file
/// if either step fails.
async fn write_output(video: &Path, path: &Path) -> Result<(), SlideshowError> {
    let write_err = |source| SlideshowError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("mp4.tmp");
    let copied = async {
        tokio::fs::copy(video, &tmp_path).await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(source) = copied {
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", tmp_path.display(), e);
            }
        }
        return Err(write_err(source));
    }
    Ok(())
}

/// The configured synthesiser, or the Google Translate backend.
fn resolve_synthesizer(
    config: &SlideshowConfig,
) -> Result<Arc<dyn SpeechSynthesizer>, SlideshowError> {
    if let Some(ref synth) = config.synthesizer {
        return Ok(Arc::clone(synth));
    }
    let tts = GoogleTranslateTts::new(config.tts_tld.clone(), config.tts_timeout_secs)?;
    Ok(Arc::new(tts))
}

/// Run one stage, reporting start/finish/failure to the log and the
/// progress callback.
async fn run_stage<T, F>(
    config: &SlideshowConfig,
    stage: Stage,
    fut: F,
    summarize: impl FnOnce(&T) -> String,
) -> Result<T, SlideshowError>
where
    F: Future<Output = Result<T, SlideshowError>>,
{
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }

    match fut.await {
        Ok(value) => {
            let summary = summarize(&value);
            info!("Stage {} done: {}", stage, summary);
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_complete(stage, &summary);
            }
            Ok(value)
        }
        Err(e) => {
            error!("Stage {} failed: {}", stage, e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_error(stage, &e.to_string());
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SlideshowProgressCallback;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;
    use zip::write::SimpleFileOptions;

    const IMAGE_REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

    struct SilentSynth;

    #[async_trait]
    impl SpeechSynthesizer for SilentSynth {
        fn name(&self) -> &str {
            "silent"
        }

        async fn synthesize(
            &self,
            _text: &str,
            _language: &str,
            out: &Path,
        ) -> Result<(), SlideshowError> {
            std::fs::write(out, b"ID3").unwrap();
            Ok(())
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl SlideshowProgressCallback for Events {
        fn on_stage_start(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("start:{stage}"));
        }
        fn on_stage_complete(&self, stage: Stage, _summary: &str) {
            self.0.lock().unwrap().push(format!("done:{stage}"));
        }
        fn on_stage_error(&self, stage: Stage, _error: &str) {
            self.0.lock().unwrap().push(format!("fail:{stage}"));
        }
    }

    fn write_docx(path: &Path, paragraphs: &[&str], images: usize) {
        let mut rels = String::from(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for i in 1..=images {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{i}" Type="{IMAGE_REL}" Target="media/image{i}.png"/>"#
            ));
        }
        rels.push_str("</Relationships>");

        let mut body = String::new();
        for p in paragraphs {
            if p.is_empty() {
                body.push_str("<w:p/>");
            } else {
                body.push_str(&format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"));
            }
        }
        let document = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );

        let mut png = Vec::new();
        image::RgbImage::new(3, 3)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        let opts =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.start_file("word/_rels/document.xml.rels", opts).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();
        for i in 1..=images {
            zip.start_file(format!("word/media/image{i}.png"), opts)
                .unwrap();
            zip.write_all(&png).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn inspect_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("d.docx");
        write_docx(&doc, &["One", "", "Three"], 2);

        let summary = inspect(&doc).await.unwrap();
        assert_eq!(
            summary.image_parts,
            vec!["word/media/image1.png", "word/media/image2.png"]
        );
        assert_eq!(summary.paragraph_count, 3);
        assert_eq!(summary.blank_paragraphs, 1);
        assert_eq!(summary.narration_chars, "One  Three".len());
    }

    #[tokio::test]
    async fn empty_text_fails_in_narration_stage() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("d.docx");
        write_docx(&doc, &["", ""], 1);

        let events = Arc::new(Events::default());
        let config = SlideshowConfig::builder()
            .synthesizer(Arc::new(SilentSynth))
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let ws = Workspace::create(None).unwrap();

        let err = render_slideshow(&doc, &ws, &config).await.unwrap_err();
        assert!(matches!(err, SlideshowError::EmptyNarration));
        assert_eq!(err.stage(), Some(Stage::Narration));
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                "start:extraction",
                "done:extraction",
                "start:narration",
                "fail:narration"
            ]
        );
        assert!(ws.path().join("image1.png").exists());
    }

    #[tokio::test]
    async fn document_without_images_fails_in_composition_stage() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("d.docx");
        write_docx(&doc, &["Some words"], 0);

        let config = SlideshowConfig::builder()
            .synthesizer(Arc::new(SilentSynth))
            .build()
            .unwrap();
        let ws = Workspace::create(None).unwrap();

        let err = render_slideshow(&doc, &ws, &config).await.unwrap_err();
        assert!(matches!(err, SlideshowError::NoImages));
        assert_eq!(err.stage(), Some(Stage::Composition));
    }

    #[tokio::test]
    async fn failed_conversion_leaves_no_output_or_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("d.docx");
        write_docx(&doc, &["text"], 0);
        let root = dir.path().join("workspaces");
        std::fs::create_dir(&root).unwrap();
        let out = dir.path().join("out/slideshow.mp4");

        let config = SlideshowConfig::builder()
            .synthesizer(Arc::new(SilentSynth))
            .workspace_root(&root)
            .build()
            .unwrap();

        assert!(convert_to_file(&doc, &out, &config).await.is_err());
        assert!(!out.exists());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("slideshow.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        // A non-empty directory where the output file should go.
        let out = dir.path().join("out.mp4");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("keep"), b"x").unwrap();

        let err = write_output(&video, &out).await.unwrap_err();
        assert!(matches!(err, SlideshowError::OutputWriteFailed { .. }), "{err:?}");
        assert!(!dir.path().join("out.mp4.tmp").exists());
        assert!(out.join("keep").exists());
    }

    #[tokio::test]
    async fn output_is_written_with_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("slideshow.mp4");
        std::fs::write(&video, b"mp4 bytes").unwrap();
        let out = dir.path().join("a/b/final.mp4");

        write_output(&video, &out).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"mp4 bytes");
        assert!(!dir.path().join("a/b/final.mp4.tmp").exists());
    }

    #[tokio::test]
    async fn garbage_input_fails_in_extraction_stage() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("d.docx");
        std::fs::write(&doc, b"plain text, not a zip").unwrap();

        let config = SlideshowConfig::builder()
            .synthesizer(Arc::new(SilentSynth))
            .build()
            .unwrap();
        let ws = Workspace::create(None).unwrap();
        let err = render_slideshow(&doc, &ws, &config).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Extraction));
    }
}
