//! Progress callbacks for the media pipeline.
//!
//! The pipeline announces each [`Stage`] before starting it. The bot forwards
//! stages to the user as localized status messages; the CLI drives a
//! terminal spinner. The pipeline itself knows nothing about either.
//!
//! Callbacks are infallible. An implementation that talks to the network
//! logs its own failures; a lost status message never aborts a conversion.

use async_trait::async_trait;

/// A step of the photo/document pipeline, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Rasterising an incoming PDF.
    ConvertingPdf,
    /// Transcribing page `page` of `total` (1-indexed).
    ReadingPage { page: usize, total: usize },
    /// Transcribing a single photo or image document.
    Extracting,
    /// Correcting the transcribed text.
    Correcting,
    /// Laying out the output document.
    BuildingDocument,
}

/// Receives pipeline events. Every method defaults to a no-op.
#[async_trait]
pub trait PipelineProgress: Send + Sync {
    /// Called before a stage starts.
    async fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after a page's text was extracted.
    ///
    /// * `chars`: length of the extracted text in characters
    async fn on_page_complete(&self, page: usize, total: usize, chars: usize) {
        let _ = (page, total, chars);
    }
}

/// Ignores every event.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
        pages_done: AtomicUsize,
    }

    #[async_trait]
    impl PipelineProgress for Recorder {
        async fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        async fn on_page_complete(&self, _page: usize, _total: usize, _chars: usize) {
            self.pages_done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn noop_accepts_everything() {
        let p: &dyn PipelineProgress = &NoopProgress;
        p.on_stage(Stage::ConvertingPdf).await;
        p.on_page_complete(1, 1, 10).await;
    }

    #[tokio::test]
    async fn recorder_sees_stages_in_order() {
        let r = Recorder::default();
        r.on_stage(Stage::ReadingPage { page: 1, total: 2 }).await;
        r.on_page_complete(1, 2, 100).await;
        r.on_stage(Stage::Correcting).await;

        assert_eq!(
            *r.stages.lock().unwrap(),
            vec![Stage::ReadingPage { page: 1, total: 2 }, Stage::Correcting]
        );
        assert_eq!(r.pages_done.load(Ordering::SeqCst), 1);
    }
}
