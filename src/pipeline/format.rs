//! Text formatting: corrected plain text → structured blocks.
//!
//! The model returns flat text with one logical line per newline. This stage
//! recovers just enough structure for a readable document using line-pattern
//! heuristics: numbered section titles become headings, bullet lines become a
//! flat list, everything else is a paragraph, and empty lines are breaks.
//!
//! The output is a pure function of the input and is always well-formed:
//! every [`Block::ListStart`] is matched by a [`Block::ListEnd`].

use serde::{Deserialize, Serialize};

/// Leading glyphs that mark a list item.
const BULLET_GLYPHS: [char; 3] = ['•', '-', '*'];

/// How many leading characters may contain the `". "` heading delimiter.
const HEADING_DELIMITER_WINDOW: usize = 10;

/// Classification of a single input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    Blank,
    Heading,
    ListItem,
    Paragraph,
}

/// One unit of the structured document handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    ListStart,
    ListItem(String),
    ListEnd,
    /// Visual break produced by an empty input line.
    Break,
}

impl Block {
    /// The text carried by this block, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Block::Heading(t) | Block::Paragraph(t) | Block::ListItem(t) => Some(t),
            Block::ListStart | Block::ListEnd | Block::Break => None,
        }
    }
}

/// Classify one line. The line is trimmed first; whitespace-only is blank.
///
/// Priority: blank, heading, list item, paragraph.
pub fn classify_line(line: &str) -> LineKind {
    let line = line.trim();
    if line.is_empty() {
        LineKind::Blank
    } else if is_numbered_heading(line) {
        LineKind::Heading
    } else if line.starts_with(BULLET_GLYPHS) {
        LineKind::ListItem
    } else {
        LineKind::Paragraph
    }
}

/// A heading starts with a digit and has `". "` within its first
/// [`HEADING_DELIMITER_WINDOW`] characters, e.g. `"1. Introduction"` or
/// `"١. مقدمة"`. Any Unicode digit counts, not only ASCII.
/// `"1.5 grams"` does not qualify: there is no literal `". "`.
fn is_numbered_heading(line: &str) -> bool {
    let starts_with_digit = line.chars().next().is_some_and(char::is_numeric);
    if !starts_with_digit {
        return false;
    }
    let window_end = line
        .char_indices()
        .nth(HEADING_DELIMITER_WINDOW)
        .map_or(line.len(), |(i, _)| i);
    line[..window_end].contains(". ")
}

/// Strip the single leading bullet glyph and the whitespace around the rest.
fn strip_bullet(line: &str) -> &str {
    line.strip_prefix(BULLET_GLYPHS).unwrap_or(line).trim()
}

/// Convert a block of text into an ordered, well-formed block sequence.
pub fn format_text(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut in_list = false;

    for raw in text.split('\n') {
        let line = raw.trim();
        let kind = classify_line(line);

        if in_list && kind != LineKind::ListItem {
            blocks.push(Block::ListEnd);
            in_list = false;
        }

        match kind {
            LineKind::Blank => blocks.push(Block::Break),
            LineKind::Heading => blocks.push(Block::Heading(line.to_string())),
            LineKind::ListItem => {
                if !in_list {
                    blocks.push(Block::ListStart);
                    in_list = true;
                }
                blocks.push(Block::ListItem(strip_bullet(line).to_string()));
            }
            LineKind::Paragraph => blocks.push(Block::Paragraph(line.to_string())),
        }
    }

    if in_list {
        blocks.push(Block::ListEnd);
    }

    blocks
}

/// Number of blocks that carry a text payload.
pub fn text_block_count(blocks: &[Block]) -> usize {
    blocks.iter().filter(|b| b.text().is_some()).count()
}
