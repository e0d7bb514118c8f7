//! Document rendering: formatted blocks → PDF file (genpdf), or → HTML preview.
//!
//! The renderer sees only [`Block`]s and a [`Stylesheet`]; it never inspects
//! the text. Fonts are parsed once when the [`PdfRenderer`] is built and
//! cloned into every document, so a request pays for layout only.
//!
//! genpdf lays out glyphs left to right without shaping. Scripts that need
//! shaping (Arabic, Devanagari) render as isolated glyphs, and only if the
//! configured font family covers them.

use crate::config::Stylesheet;
use crate::error::DocBotError;
use crate::pipeline::format::Block;
use genpdf::elements::{Break, Paragraph, UnorderedList};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Color, Style};
use genpdf::{Document, Element, Margins, SimplePageDecorator, Size};
use std::path::Path;
use tracing::{debug, info};

/// Lays out blocks into a document at `destination`.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, blocks: &[Block], destination: &Path) -> Result<(), DocBotError>;
}

/// [`DocumentRenderer`] producing PDF through genpdf.
pub struct PdfRenderer {
    fonts: FontFamily<FontData>,
    stylesheet: Stylesheet,
}

impl PdfRenderer {
    /// Load `{font_family}-{Regular,Bold,Italic,BoldItalic}.ttf` from the
    /// stylesheet's font directory.
    pub fn new(stylesheet: Stylesheet) -> Result<Self, DocBotError> {
        let fonts = genpdf::fonts::from_files(
            &stylesheet.fonts_dir,
            &stylesheet.font_family,
            None,
        )
        .map_err(|e| DocBotError::FontLoadFailed {
            family: stylesheet.font_family.clone(),
            dir: stylesheet.fonts_dir.clone(),
            detail: e.to_string(),
        })?;
        debug!(
            "Loaded font family '{}' from {}",
            stylesheet.font_family,
            stylesheet.fonts_dir.display()
        );
        Ok(Self { fonts, stylesheet })
    }

    fn heading_style(&self) -> Style {
        let s = &self.stylesheet;
        let [r, g, b] = s.heading_color;
        let style = Style::new()
            .with_font_size(s.heading_font_size)
            .with_color(Color::Rgb(r, g, b));
        if s.heading_bold {
            style.bold()
        } else {
            style
        }
    }

    fn build_document(&self, blocks: &[Block]) -> Document {
        let s = &self.stylesheet;
        let (width, height) = s.paper.dimensions_mm();

        let mut doc = Document::new(self.fonts.clone());
        doc.set_title("Formatted document");
        doc.set_paper_size(Size::new(width, height));
        doc.set_font_size(s.font_size);
        doc.set_line_spacing(s.line_spacing);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(Margins::trbl(
            s.margin_mm,
            s.margin_mm,
            s.margin_mm,
            s.margin_mm,
        ));
        doc.set_page_decorator(decorator);

        let mut list: Option<UnorderedList> = None;
        for block in blocks {
            match block {
                Block::ListStart => {
                    list.get_or_insert_with(|| UnorderedList::with_bullet("•"));
                }
                Block::ListItem(text) => {
                    let item = Paragraph::new(text.as_str()).padded(Margins::trbl(
                        0.0,
                        0.0,
                        s.list_item_space_mm,
                        0.0,
                    ));
                    list.get_or_insert_with(|| UnorderedList::with_bullet("•"))
                        .push(item);
                }
                Block::ListEnd => {
                    if let Some(items) = list.take() {
                        self.push_list(&mut doc, items);
                    }
                }
                other => {
                    if let Some(items) = list.take() {
                        self.push_list(&mut doc, items);
                    }
                    self.push_block(&mut doc, other);
                }
            }
        }
        if let Some(items) = list.take() {
            self.push_list(&mut doc, items);
        }

        doc
    }

    fn push_list(&self, doc: &mut Document, items: UnorderedList) {
        let s = &self.stylesheet;
        doc.push(items.padded(Margins::trbl(
            0.0,
            0.0,
            s.list_space_after_mm,
            s.list_indent_mm,
        )));
    }

    fn push_block(&self, doc: &mut Document, block: &Block) {
        let s = &self.stylesheet;
        match block {
            Block::Heading(text) => doc.push(
                Paragraph::new(text.as_str())
                    .styled(self.heading_style())
                    .padded(Margins::trbl(
                        s.heading_space_before_mm,
                        0.0,
                        s.heading_space_after_mm,
                        0.0,
                    )),
            ),
            Block::Paragraph(text) => doc.push(Paragraph::new(text.as_str()).padded(
                Margins::trbl(0.0, 0.0, s.paragraph_space_mm, 0.0),
            )),
            Block::Break => doc.push(Break::new(1)),
            Block::ListStart | Block::ListItem(_) | Block::ListEnd => {}
        }
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, blocks: &[Block], destination: &Path) -> Result<(), DocBotError> {
        let doc = self.build_document(blocks);
        doc.render_to_file(destination)
            .map_err(|e| DocBotError::RenderFailed {
                path: destination.to_path_buf(),
                detail: e.to_string(),
            })?;
        info!(
            "Rendered {} blocks → {}",
            blocks.len(),
            destination.display()
        );
        Ok(())
    }
}

/// Render blocks as a standalone HTML page with the stylesheet embedded as CSS.
pub fn render_html(blocks: &[Block], stylesheet: &Stylesheet) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<style>\n");
    out.push_str(&stylesheet_css(stylesheet));
    out.push_str("</style>\n</head>\n<body>\n");

    for block in blocks {
        match block {
            Block::Heading(text) => {
                out.push_str(&format!("<h1>{}</h1>\n", escape_html(text)));
            }
            Block::Paragraph(text) => {
                out.push_str(&format!(
                    "<p class=\"normal-text\">{}</p>\n",
                    escape_html(text)
                ));
            }
            Block::ListStart => out.push_str("<ul>\n"),
            Block::ListItem(text) => {
                out.push_str(&format!("<li>{}</li>\n", escape_html(text)));
            }
            Block::ListEnd => out.push_str("</ul>\n"),
            Block::Break => out.push_str("<br>\n"),
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn stylesheet_css(s: &Stylesheet) -> String {
    let heading_weight = if s.heading_bold { "bold" } else { "normal" };
    format!(
        "@page {{ size: {paper}; margin: {margin}mm; }}\n\
body {{ font-family: {family}; font-size: {size}pt; line-height: {spacing}; color: #000000; }}\n\
h1 {{ color: {color}; font-size: {hsize}pt; font-weight: {weight}; margin-top: {before}mm; margin-bottom: {after}mm; }}\n\
p {{ margin-bottom: {para}mm; text-align: left; }}\n\
ul {{ margin-left: {indent}mm; margin-bottom: {list_after}mm; }}\n\
li {{ margin-bottom: {item}mm; }}\n",
        paper = s.paper.css_name(),
        margin = s.margin_mm,
        family = s.css_font_family,
        size = s.font_size,
        spacing = s.line_spacing,
        color = s.heading_color_hex(),
        hsize = s.heading_font_size,
        weight = heading_weight,
        before = s.heading_space_before_mm,
        after = s.heading_space_after_mm,
        para = s.paragraph_space_mm,
        indent = s.list_indent_mm,
        list_after = s.list_space_after_mm,
        item = s.list_item_space_mm,
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::format::format_text;

    #[test]
    fn html_structure_follows_blocks() {
        let blocks = format_text("1. Intro\nHello world\n- item one\n- item two\n\nDone.");
        let html = render_html(&blocks, &Stylesheet::default());

        let body = html
            .split("<body>\n")
            .nth(1)
            .and_then(|rest| rest.split("</body>").next())
            .unwrap();
        assert_eq!(
            body,
            "<h1>1. Intro</h1>\n\
<p class=\"normal-text\">Hello world</p>\n\
<ul>\n<li>item one</li>\n<li>item two</li>\n</ul>\n\
<br>\n\
<p class=\"normal-text\">Done.</p>\n"
        );
    }

    #[test]
    fn html_escapes_text() {
        let blocks = format_text("a < b & c > d\n- <script>");
        let html = render_html(&blocks, &Stylesheet::default());
        assert!(html.contains("a &lt; b &amp; c &gt; d"));
        assert!(html.contains("<li>&lt;script&gt;</li>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn html_keeps_scientific_symbols() {
        let blocks = format_text("H₂O → Ca²⁺ at 25 °C, ΔG ≤ 0");
        let html = render_html(&blocks, &Stylesheet::default());
        assert!(html.contains("H₂O → Ca²⁺ at 25 °C, ΔG ≤ 0"));
    }

    #[test]
    fn css_reflects_stylesheet() {
        let mut style = Stylesheet::default();
        style.heading_color = [0x00, 0x33, 0x99];
        style.font_size = 11;
        let html = render_html(&[], &style);
        assert!(html.contains("color: #003399"));
        assert!(html.contains("font-size: 11pt"));
        assert!(html.contains("size: letter"));
    }

    #[test]
    fn missing_font_family_is_reported() {
        let mut style = Stylesheet::default();
        style.fonts_dir = "/nonexistent/fonts".into();
        let err = PdfRenderer::new(style).err().unwrap();
        assert!(matches!(err, DocBotError::FontLoadFailed { .. }));
    }
}
