//! Pipeline stages for turning a photo or PDF into a formatted document.
//!
//! Each submodule implements one transformation step, so each is testable on
//! its own and the external engines (pdfium, the model, genpdf) can be
//! replaced behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ encode ──▶ llm ──▶ llm ──▶ format ──▶ render
//! (bytes)    (pdfium)     (base64)  extract correct  (blocks)   (genpdf)
//! ```
//!
//! 1. [`input`]: per-request workspace; PDF vs image sniffing
//! 2. [`rasterize`]: PDF pages → images, in `spawn_blocking`
//! 3. [`encode`]: images → base64 `ImageData`
//! 4. [`llm`]: chat, extraction and correction calls
//! 5. [`format`]: corrected text → ordered [`format::Block`]s
//! 6. [`render`]: blocks → PDF (or HTML preview)

pub mod encode;
pub mod format;
pub mod input;
pub mod llm;
pub mod rasterize;
pub mod render;
