//! Category section lookup.

use tracing::warn;

use contribmerge_shared::{ContribMergeError, Result};

use crate::MergeOptions;
use crate::document::{Document, SectionSpan};

/// Where entries for a category go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLocation {
    /// The category heading exists; entries are appended to this span.
    Existing(SectionSpan),
    /// No category heading yet; create one right after the anchor heading line.
    Create { anchor: usize },
}

/// Find the section for `category`, or the anchor heading to create it under.
///
/// The category heading must match exactly, one level below the anchor.
/// Returns [`ContribMergeError::Section`] when neither the category nor the
/// anchor heading exists.
pub fn locate_section(
    doc: &Document,
    category: &str,
    opts: &MergeOptions,
) -> Result<SectionLocation> {
    let matches = doc.find_headings(opts.category_level(), category);
    if matches.len() > 1 {
        warn!(category, count = matches.len(), "category heading repeated, using the first");
    }
    if let Some(span) = matches.first().and_then(|&i| doc.section_span(i)) {
        return Ok(SectionLocation::Existing(span));
    }

    let anchors = doc.find_headings(opts.anchor_level, &opts.anchor_heading);
    if anchors.len() > 1 {
        warn!(
            anchor = %opts.anchor_heading,
            count = anchors.len(),
            "anchor heading repeated, using the first"
        );
    }
    match anchors.first() {
        Some(&anchor) => Ok(SectionLocation::Create { anchor }),
        None => Err(ContribMergeError::section(
            category,
            format!(
                "anchor heading '{} {}' not found",
                "#".repeat(opts.anchor_level),
                opts.anchor_heading
            ),
        )),
    }
}
