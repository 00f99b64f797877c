//! Composition: still images + voice-over → MP4, via the system `ffmpeg`.
//!
//! The whole slideshow is one ffmpeg invocation. Each image is a looped
//! still input held for its slot, padded (never scaled) onto a shared canvas
//! as large as the largest image, and the padded streams are concatenated.
//! The voice-over is mapped as the only audio track, and `-t` caps the output
//! at the slideshow length, so in the fixed-duration branch the audio is cut
//! or runs silent past its end rather than stretching the video.

use crate::config::SlideshowConfig;
use crate::error::SlideshowError;
use crate::pipeline::timing::{seconds_per_image, SlideTiming};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

const STDERR_TAIL_LINES: usize = 20;

/// One image and how long it is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub image: PathBuf,
    pub secs: f64,
}

/// Everything ffmpeg needs to know about the video track.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidePlan {
    pub slides: Vec<Slide>,
    /// Even `(width, height)` every slide is centred on.
    pub canvas: (u32, u32),
    pub fps: u32,
    pub total_secs: f64,
}

/// Result of the composition stage.
#[derive(Debug, Clone)]
pub struct Composition {
    pub video_path: PathBuf,
    pub audio_secs: f64,
    pub timing: SlideTiming,
    pub plan: SlidePlan,
}

/// Render `images` over `audio` into `out`.
pub async fn compose(
    images: &[PathBuf],
    audio: &Path,
    out: &Path,
    config: &SlideshowConfig,
) -> Result<Composition, SlideshowError> {
    // Checked before anything touches ffprobe so a document without images
    // always reports the same error.
    if images.is_empty() {
        return Err(SlideshowError::NoImages);
    }

    let audio_secs = probe_duration(&config.ffprobe_bin, audio).await?;
    let timing = seconds_per_image(audio_secs, images.len(), &config.timing)?;
    info!(
        "Audio {:.2}s over {} images → {:.3}s per image{}",
        audio_secs,
        images.len(),
        timing.seconds_per_image,
        if timing.fixed { " (fixed)" } else { "" }
    );

    let dims = image_dimensions(images).await?;
    let plan = plan_slides(images, &dims, timing, config.fps);

    let args = ffmpeg_args(&plan, audio, out, &config.video_codec, &config.audio_codec);
    let output = run_tool(&config.ffmpeg_bin, &args).await?;
    if !output.status.success() {
        return Err(SlideshowError::EncodeFailed {
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        });
    }
    info!(
        "Rendered {} ({}x{}, {:.2}s)",
        out.display(),
        plan.canvas.0,
        plan.canvas.1,
        plan.total_secs
    );

    Ok(Composition {
        video_path: out.to_path_buf(),
        audio_secs,
        timing,
        plan,
    })
}

/// Container duration of `audio` in seconds, as reported by ffprobe.
pub async fn probe_duration(ffprobe: &Path, audio: &Path) -> Result<f64, SlideshowError> {
    let args: Vec<OsString> = vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        audio.as_os_str().to_owned(),
    ];
    let output = run_tool(ffprobe, &args).await?;
    if !output.status.success() {
        return Err(SlideshowError::ProbeFailed {
            path: audio.to_path_buf(),
            detail: stderr_tail(&output.stderr),
        });
    }
    parse_duration_output(&String::from_utf8_lossy(&output.stdout), audio)
}

/// Parse `ffprobe -show_entries format=duration` output.
pub fn parse_duration_output(stdout: &str, audio: &Path) -> Result<f64, SlideshowError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| SlideshowError::ProbeFailed {
            path: audio.to_path_buf(),
            detail: "ffprobe printed no duration".into(),
        })?;

    let secs: f64 = line.parse().map_err(|_| SlideshowError::ProbeFailed {
        path: audio.to_path_buf(),
        detail: format!("unexpected duration value '{line}'"),
    })?;

    if !secs.is_finite() {
        return Err(SlideshowError::ProbeFailed {
            path: audio.to_path_buf(),
            detail: format!("unexpected duration value '{line}'"),
        });
    }
    if secs <= 0.0 {
        return Err(SlideshowError::ZeroLengthAudio {
            path: audio.to_path_buf(),
        });
    }
    Ok(secs)
}

/// Pixel dimensions of each image, format sniffed from content.
async fn image_dimensions(images: &[PathBuf]) -> Result<Vec<(u32, u32)>, SlideshowError> {
    let paths = images.to_vec();
    tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .map(|p| {
                let unreadable = |detail: String| SlideshowError::UnreadableImage {
                    path: p.clone(),
                    detail,
                };
                image::ImageReader::open(p)
                    .map_err(|e| unreadable(e.to_string()))?
                    .with_guessed_format()
                    .map_err(|e| unreadable(e.to_string()))?
                    .into_dimensions()
                    .map_err(|e| unreadable(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| SlideshowError::Internal(format!("Image size task panicked: {}", e)))?
}

/// Smallest even canvas that holds every image without scaling.
pub fn canvas_size(dims: &[(u32, u32)]) -> (u32, u32) {
    let w = dims.iter().map(|d| d.0).max().unwrap_or(2);
    let h = dims.iter().map(|d| d.1).max().unwrap_or(2);
    (round_up_even(w), round_up_even(h))
}

fn round_up_even(v: u32) -> u32 {
    let v = v.max(2);
    v + (v % 2)
}

pub fn plan_slides(
    images: &[PathBuf],
    dims: &[(u32, u32)],
    timing: SlideTiming,
    fps: u32,
) -> SlidePlan {
    let slides = images
        .iter()
        .map(|image| Slide {
            image: image.clone(),
            secs: timing.seconds_per_image,
        })
        .collect::<Vec<_>>();
    SlidePlan {
        total_secs: timing.video_secs(slides.len()),
        slides,
        canvas: canvas_size(dims),
        fps,
    }
}

/// Command-line arguments (without the program name) that render `plan`.
pub fn ffmpeg_args(
    plan: &SlidePlan,
    audio: &Path,
    out: &Path,
    video_codec: &str,
    audio_codec: &str,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
        .into_iter()
        .map(OsString::from)
        .collect();

    for slide in &plan.slides {
        args.extend(
            [
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                plan.fps.to_string(),
                "-t".to_string(),
                format_secs(slide.secs),
                // Format detection would pick the gif demuxer, which has no -loop.
                "-f".to_string(),
                "image2".to_string(),
                "-i".to_string(),
            ]
            .map(OsString::from),
        );
        args.push(slide.image.as_os_str().to_owned());
    }
    args.push("-i".into());
    args.push(audio.as_os_str().to_owned());

    let audio_input = plan.slides.len();
    args.extend(
        [
            "-filter_complex".to_string(),
            filter_graph(plan),
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            format!("{audio_input}:a"),
            "-r".to_string(),
            plan.fps.to_string(),
            "-c:v".to_string(),
            video_codec.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            audio_codec.to_string(),
            "-t".to_string(),
            format_secs(plan.total_secs),
        ]
        .map(OsString::from),
    );
    args.push(out.as_os_str().to_owned());
    args
}

/// `pad` each still onto the canvas, then `concat` them in order.
pub fn filter_graph(plan: &SlidePlan) -> String {
    let (w, h) = plan.canvas;
    let mut chains: Vec<String> = plan
        .slides
        .iter()
        .enumerate()
        .map(|(i, _)| {
            format!(
                "[{i}:v]pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,\
                 setsar=1,fps={fps},format=yuv420p[v{i}]",
                fps = plan.fps
            )
        })
        .collect();

    let inputs: String = (0..plan.slides.len()).map(|i| format!("[v{i}]")).collect();
    chains.push(format!(
        "{inputs}concat=n={}:v=1:a=0[vout]",
        plan.slides.len()
    ));
    chains.join(";")
}

fn format_secs(secs: f64) -> String {
    format!("{:.6}", secs)
}

/// Run an external media tool, mapping "not installed" to a helpful error.
async fn run_tool(bin: &Path, args: &[OsString]) -> Result<Output, SlideshowError> {
    debug!("Running {} {:?}", bin.display(), args);
    Command::new(bin)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            let tool = bin.display().to_string();
            let hint = format!(
                "Install ffmpeg (which ships ffprobe) from https://ffmpeg.org, or point \
                 --ffmpeg / --ffprobe at the executables. Tried: {tool}"
            );
            SlideshowError::ToolNotFound {
                tool,
                detail: e.to_string(),
                hint,
            }
        })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
