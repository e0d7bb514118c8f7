//! The media pipeline: photo or PDF bytes → corrected, formatted PDF.
//!
//! [`Pipeline`] strings the stages together for one request. It is shared by
//! the bot dispatcher and the `docbot convert` CLI command; the two differ
//! only in where bytes come from, where the result goes, and how progress is
//! reported.
//!
//! Stages run strictly in sequence and the first error stops the request.
//! Every file the pipeline touches lives in the caller's [`Workspace`].

use crate::error::DocBotError;
use crate::pipeline::encode::{encode_image_bytes, encode_page};
use crate::pipeline::format::{format_text, text_block_count};
use crate::pipeline::input::{read_local, sniff_media, MediaKind, Workspace};
use crate::pipeline::llm::AiGateway;
use crate::pipeline::rasterize::PageRasterizer;
use crate::pipeline::render::DocumentRenderer;
use crate::progress::{PipelineProgress, Stage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// File name of the generated document, as shown to the user.
pub const OUTPUT_FILE_NAME: &str = "formatted_document.pdf";

/// Separator between the texts of consecutive PDF pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

const INPUT_PDF_NAME: &str = "input.pdf";

/// Extraction, correction and rendering for one request at a time.
#[derive(Clone)]
pub struct Pipeline {
    gateway: AiGateway,
    rasterizer: Arc<dyn PageRasterizer>,
    renderer: Arc<dyn DocumentRenderer>,
}

impl Pipeline {
    pub fn new(
        gateway: AiGateway,
        rasterizer: Arc<dyn PageRasterizer>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            gateway,
            rasterizer,
            renderer,
        }
    }

    pub fn gateway(&self) -> &AiGateway {
        &self.gateway
    }

    /// Run every stage and return the path of the rendered PDF inside `workspace`.
    pub async fn process(
        &self,
        workspace: &Workspace,
        bytes: &[u8],
        kind: MediaKind,
        progress: &dyn PipelineProgress,
    ) -> Result<PathBuf, DocBotError> {
        let text = self.transcribe(workspace, bytes, kind, progress).await?;
        self.produce_document(workspace, &text, progress).await
    }

    /// Extract the raw text of a photo or of every page of a PDF.
    ///
    /// Page texts are joined with a blank line, in page order.
    pub async fn transcribe(
        &self,
        workspace: &Workspace,
        bytes: &[u8],
        kind: MediaKind,
        progress: &dyn PipelineProgress,
    ) -> Result<String, DocBotError> {
        match kind {
            MediaKind::Image => {
                progress.on_stage(Stage::Extracting).await;
                let image = encode_image_bytes(bytes)?;
                self.gateway.extract_text(image).await
            }
            MediaKind::Pdf => {
                let pdf_path = workspace.write(INPUT_PDF_NAME, bytes).await?;

                progress.on_stage(Stage::ConvertingPdf).await;
                let pages = self.rasterizer.rasterize(&pdf_path).await?;
                let total = pages.len();

                let mut texts = Vec::with_capacity(total);
                for (idx, page) in pages.iter().enumerate() {
                    let page_num = idx + 1;
                    progress
                        .on_stage(Stage::ReadingPage {
                            page: page_num,
                            total,
                        })
                        .await;
                    let image = encode_page(page)?;
                    let text = self.gateway.extract_text(image).await?;
                    progress
                        .on_page_complete(page_num, total, text.chars().count())
                        .await;
                    texts.push(text);
                }

                Ok(texts.join(PAGE_SEPARATOR))
            }
        }
    }

    /// Correct `text`, format it and render the PDF into `workspace`.
    pub async fn produce_document(
        &self,
        workspace: &Workspace,
        text: &str,
        progress: &dyn PipelineProgress,
    ) -> Result<PathBuf, DocBotError> {
        progress.on_stage(Stage::Correcting).await;
        let corrected = self.gateway.correct_text(text).await?;

        progress.on_stage(Stage::BuildingDocument).await;
        let blocks = format_text(&corrected);
        debug!(
            "Formatted {} blocks ({} with text)",
            blocks.len(),
            text_block_count(&blocks)
        );

        let destination = workspace.file(OUTPUT_FILE_NAME);
        let renderer = Arc::clone(&self.renderer);
        let target = destination.clone();
        tokio::task::spawn_blocking(move || renderer.render(&blocks, &target))
            .await
            .map_err(|e| DocBotError::Internal(format!("Render task panicked: {}", e)))??;

        Ok(destination)
    }
}

/// Outcome of [`convert_file`].
#[derive(Debug, Clone)]
pub struct ConvertSummary {
    pub kind: MediaKind,
    pub output: PathBuf,
    pub duration_ms: u64,
}

/// Convert a local PDF or image file and write the result to `output`.
pub async fn convert_file(
    pipeline: &Pipeline,
    input: &Path,
    output: &Path,
    progress: &dyn PipelineProgress,
) -> Result<ConvertSummary, DocBotError> {
    let start = Instant::now();
    info!("Starting conversion: {}", input.display());

    // ── Step 1: Read and classify input ──────────────────────────────────
    let bytes = read_local(input).await?;
    let kind = sniff_media(&bytes)?;
    debug!("Input is {:?} ({} bytes)", kind, bytes.len());

    // ── Step 2: Run the pipeline in a scratch workspace ──────────────────
    let workspace = Workspace::new()?;
    let rendered = pipeline.process(&workspace, &bytes, kind, progress).await?;

    // ── Step 3: Copy the result out before the workspace is dropped ──────
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocBotError::OutputWriteFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
    }
    tokio::fs::copy(&rendered, output)
        .await
        .map_err(|e| DocBotError::OutputWriteFailed {
            path: output.to_path_buf(),
            source: e,
        })?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Conversion complete: {} in {}ms",
        output.display(),
        duration_ms
    );

    Ok(ConvertSummary {
        kind,
        output: output.to_path_buf(),
        duration_ms,
    })
}
