//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn SlideshowProgressCallback>`] via
//! [`crate::config::SlideshowConfigBuilder::progress_callback`] to be told
//! when each stage starts, finishes or fails. The CLI uses it to drive a
//! spinner; a server could forward the events to a job table.
//!
//! # Example
//!
//! ```rust
//! use docx_slideshow::{SlideshowConfig, SlideshowProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SlideshowProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, summary: &str) {
//!         eprintln!("{stage}: {summary}");
//!     }
//! }
//!
//! let config = SlideshowConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn SlideshowProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use crate::output::SlideshowStats;
use std::sync::Arc;

/// Called by the pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait SlideshowProgressCallback: Send + Sync {
    /// Called once before extraction begins.
    fn on_pipeline_start(&self, document: &str) {
        let _ = document;
    }

    /// Called just before a stage runs.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes.
    ///
    /// `summary` is a short human-readable line such as `"3 images, 5 paragraphs"`.
    fn on_stage_complete(&self, stage: Stage, summary: &str) {
        let _ = (stage, summary);
    }

    /// Called when a stage fails. The pipeline stops afterwards.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after the video has been written.
    fn on_pipeline_complete(&self, stats: &SlideshowStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SlideshowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SlideshowConfig`].
pub type ProgressCallback = Arc<dyn SlideshowProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SlideshowProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }

        fn on_stage_complete(&self, stage: Stage, _summary: &str) {
            self.events.lock().unwrap().push(format!("done:{stage}"));
        }

        fn on_stage_error(&self, stage: Stage, _error: &str) {
            self.events.lock().unwrap().push(format!("fail:{stage}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_pipeline_start("a.docx");
        cb.on_stage_start(Stage::Extraction);
        cb.on_stage_complete(Stage::Extraction, "1 image");
        cb.on_stage_error(Stage::Narration, "boom");
        cb.on_pipeline_complete(&SlideshowStats::default());
    }

    #[test]
    fn recorder_sees_events_in_order() {
        let rec = Recorder::default();
        rec.on_stage_start(Stage::Extraction);
        rec.on_stage_complete(Stage::Extraction, "");
        rec.on_stage_start(Stage::Narration);
        rec.on_stage_error(Stage::Narration, "empty");

        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "start:extraction",
                "done:extraction",
                "start:narration",
                "fail:narration"
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Composition);
    }
}
