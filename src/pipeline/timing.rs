//! How long each image stays on screen.

use crate::config::TimingPolicy;
use crate::error::SlideshowError;
use serde::{Deserialize, Serialize};

/// Per-image duration chosen for one slideshow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlideTiming {
    pub seconds_per_image: f64,
    /// `true` when the long-audio branch applied.
    pub fixed: bool,
}

impl SlideTiming {
    /// Total video length for `image_count` images.
    pub fn video_secs(&self, image_count: usize) -> f64 {
        self.seconds_per_image * image_count as f64
    }
}

/// Pick the per-image duration for `image_count` images over `audio_secs`.
///
/// * no images: [`SlideshowError::NoImages`]
/// * audio shorter than the threshold: even split, images fill the audio exactly
/// * otherwise: the policy's fixed duration, whatever the audio length
pub fn seconds_per_image(
    audio_secs: f64,
    image_count: usize,
    policy: &TimingPolicy,
) -> Result<SlideTiming, SlideshowError> {
    if image_count == 0 {
        return Err(SlideshowError::NoImages);
    }

    if audio_secs < policy.long_audio_threshold_secs {
        Ok(SlideTiming {
            seconds_per_image: audio_secs / image_count as f64,
            fixed: false,
        })
    } else {
        Ok(SlideTiming {
            seconds_per_image: policy.default_image_secs,
            fixed: true,
        })
    }
}
