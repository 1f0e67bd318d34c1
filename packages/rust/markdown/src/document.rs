//! Line-block model of a markdown document.
//!
//! The document is held as an ordered list of blocks, one per source line:
//! either an ATX heading (level + title) or an opaque body line. Every block
//! keeps its raw text, so an untouched document renders back byte-for-byte.
//! Lines inside fenced code blocks are always body lines.
//!
//! Edits are structural (insert a section after a heading, append lines to a
//! section, remove a line range) and never work on character offsets.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Matches an ATX heading: `## Title`.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t]*$").expect("heading regex"));

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// An ATX heading line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Number of leading `#` characters (1–6).
    pub level: usize,
    /// Heading text without markup.
    pub title: String,
}

/// One line of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A heading line, with its raw text.
    Heading { heading: Heading, raw: String },
    /// Any other line, verbatim.
    Body(String),
}

impl Block {
    /// Raw line text (without the line terminator).
    pub fn raw(&self) -> &str {
        match self {
            Self::Heading { raw, .. } | Self::Body(raw) => raw,
        }
    }

    /// The heading record, if this is a heading line.
    pub fn heading(&self) -> Option<&Heading> {
        match self {
            Self::Heading { heading, .. } => Some(heading),
            Self::Body(_) => None,
        }
    }

    /// Whether the line contains only whitespace.
    pub fn is_blank(&self) -> bool {
        self.raw().trim().is_empty()
    }
}

/// Classify a line that is known to be outside a fenced code block.
fn classify(raw: &str) -> Block {
    let text = raw.strip_suffix('\r').unwrap_or(raw);
    match HEADING_RE.captures(text) {
        Some(caps) if !caps[2].is_empty() => Block::Heading {
            heading: Heading {
                level: caps[1].len(),
                title: caps[2].to_string(),
            },
            raw: raw.to_string(),
        },
        _ => Block::Body(raw.to_string()),
    }
}

/// Return the fence marker (```` ``` ```` or `~~~`) opening or closing a code block.
fn fence_marker(raw: &str) -> Option<&'static str> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Section spans
// ---------------------------------------------------------------------------

/// Line range `[heading, end)` of a section: its heading line through the
/// line before the next heading of equal or shallower level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Index of the section's heading line.
    pub heading: usize,
    /// Exclusive end index.
    pub end: usize,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A markdown document as an ordered list of line blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
    crlf: bool,
}

impl Document {
    /// Parse text into blocks. `parse(t).render() == t` for every input.
    pub fn parse(text: &str) -> Self {
        let mut blocks = Vec::new();
        let mut open_fence: Option<&'static str> = None;

        for raw in text.split('\n') {
            match (open_fence, fence_marker(raw)) {
                (None, Some(marker)) => {
                    open_fence = Some(marker);
                    blocks.push(Block::Body(raw.to_string()));
                }
                (Some(open), Some(marker)) if open == marker => {
                    open_fence = None;
                    blocks.push(Block::Body(raw.to_string()));
                }
                (Some(_), _) => blocks.push(Block::Body(raw.to_string())),
                (None, None) => blocks.push(classify(raw)),
            }
        }

        let crlf = text.split('\n').next().is_some_and(|l| l.ends_with('\r'))
            && text.contains("\r\n");

        Self { blocks, crlf }
    }

    /// Render the blocks back to text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.blocks.iter().map(|b| b.raw().len() + 1).sum());
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(block.raw());
        }
        out
    }

    /// All blocks in order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Iterate raw line texts.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(Block::raw)
    }

    /// Whether any single line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().any(|line| line.contains(needle))
    }

    /// Indices of every heading with the given level and exact title.
    pub fn find_headings(&self, level: usize, title: &str) -> Vec<usize> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| {
                b.heading()
                    .filter(|h| h.level == level && h.title == title)
                    .map(|_| i)
            })
            .collect()
    }

    /// Span of the section headed at `index`, or `None` if that line is not a heading.
    pub fn section_span(&self, index: usize) -> Option<SectionSpan> {
        let level = self.blocks.get(index)?.heading()?.level;
        let end = self.blocks[index + 1..]
            .iter()
            .position(|b| b.heading().is_some_and(|h| h.level <= level))
            .map_or(self.blocks.len(), |offset| index + 1 + offset);
        Some(SectionSpan {
            heading: index,
            end,
        })
    }

    /// Insert a new section directly after the heading at `anchor`.
    ///
    /// The inserted block is a blank line, the new heading, then `lines`.
    /// A blank separator is added after it when the following line has text.
    /// Returns the span of the new section's inserted lines.
    pub fn insert_section_after(
        &mut self,
        anchor: usize,
        level: usize,
        title: &str,
        lines: &[String],
    ) -> SectionSpan {
        let at = (anchor + 1).min(self.blocks.len());
        let needs_separator = self.blocks.get(at).is_some_and(|b| !b.is_blank());

        let mut new_blocks = Vec::with_capacity(lines.len() + 3);
        new_blocks.push(self.body_line(""));
        new_blocks.push(Block::Heading {
            heading: Heading {
                level,
                title: title.to_string(),
            },
            raw: self.terminate(&format!("{} {title}", "#".repeat(level))),
        });
        new_blocks.extend(lines.iter().map(|l| self.body_line(l)));
        if needs_separator {
            new_blocks.push(self.body_line(""));
        }

        let heading = at + 1;
        let end = heading + 1 + lines.len();
        self.blocks.splice(at..at, new_blocks);
        SectionSpan { heading, end }
    }

    /// Append `lines` to a section, after its last non-blank line.
    ///
    /// Trailing blank lines of the section stay after the new lines.
    /// Returns the index of the first inserted line.
    pub fn append_lines_to_section(&mut self, span: SectionSpan, lines: &[String]) -> usize {
        let end = span.end.min(self.blocks.len());
        let last_text = self.blocks[span.heading..end]
            .iter()
            .rposition(|b| !b.is_blank())
            .map_or(span.heading, |offset| span.heading + offset);
        let at = last_text + 1;

        let new_blocks: Vec<Block> = lines.iter().map(|l| self.body_line(l)).collect();
        self.blocks.splice(at..at, new_blocks);
        at
    }

    /// Remove a line range, dropping blank lines directly before it.
    ///
    /// Returns the number of lines removed.
    pub fn remove_collapsing(&mut self, range: Range<usize>) -> usize {
        let end = range.end.min(self.blocks.len());
        let mut start = range.start.min(end);
        while start > 0 && self.blocks[start - 1].is_blank() {
            start -= 1;
        }
        self.blocks.drain(start..end);
        end - start
    }

    fn terminate(&self, text: &str) -> String {
        if self.crlf {
            format!("{text}\r")
        } else {
            text.to_string()
        }
    }

    fn body_line(&self, text: &str) -> Block {
        Block::Body(self.terminate(text))
    }
}
