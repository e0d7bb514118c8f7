//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! pdfium keeps thread-local state and is CPU-bound, so all work runs inside
//! `tokio::task::spawn_blocking`. Pages are rendered at the configured DPI,
//! then the longest edge is capped at `max_rendered_pixels` so a poster-sized
//! page cannot blow up memory or the vision request.

use crate::config::BotConfig;
use crate::error::DocBotError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const POINTS_PER_INCH: f32 = 72.0;

/// Turns a PDF file into one image per page, in page order.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, DocBotError>;
}

/// [`PageRasterizer`] backed by the pdfium shared library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    lib_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u32, max_pixels: u32, lib_path: Option<PathBuf>) -> Self {
        Self {
            dpi,
            max_pixels,
            lib_path,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            config.dpi,
            config.max_rendered_pixels,
            config.pdfium_lib_path.clone(),
        )
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, DocBotError> {
        let path = pdf_path.to_path_buf();
        let this = self.clone();

        tokio::task::spawn_blocking(move || this.rasterize_blocking(&path))
            .await
            .map_err(|e| DocBotError::Internal(format!("Render task panicked: {}", e)))?
    }
}

impl PdfiumRasterizer {
    fn bind(&self) -> Result<Pdfium, DocBotError> {
        let bindings = match &self.lib_path {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| DocBotError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }

    fn rasterize_blocking(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, DocBotError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| load_error(pdf_path, e))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        if total_pages == 0 {
            return Err(DocBotError::EmptyPdf {
                path: pdf_path.to_path_buf(),
            });
        }
        info!("PDF loaded: {} pages", total_pages);

        let mut images = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let (width, height) = target_size(
                page.width().value,
                page.height().value,
                self.dpi,
                self.max_pixels,
            );
            let render_config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_maximum_height(height as i32);

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                DocBotError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

fn load_error(pdf_path: &Path, e: PdfiumError) -> DocBotError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        DocBotError::PasswordRequired {
            path: pdf_path.to_path_buf(),
        }
    } else {
        DocBotError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Pixel size for a page of `width_pt` × `height_pt` at `dpi`, with the
/// longest edge capped at `max_pixels`. Aspect ratio is preserved.
fn target_size(width_pt: f32, height_pt: f32, dpi: u32, max_pixels: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let mut width = (width_pt * scale).max(1.0);
    let mut height = (height_pt * scale).max(1.0);

    let longest = width.max(height);
    let cap = max_pixels.max(1) as f32;
    if longest > cap {
        let shrink = cap / longest;
        width *= shrink;
        height *= shrink;
    }

    (width.round().max(1.0) as u32, height.round().max(1.0) as u32)
}
