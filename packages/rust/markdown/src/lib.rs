//! Structured editing of the curated contributions document.
//!
//! The document is parsed into line blocks ([`Document`]), the disposable
//! stale section is pruned ([`prune_stale_section`]), and each category batch
//! is located or created under the anchor heading ([`locate_section`]) and
//! filtered through whole-document duplicate detection ([`DuplicateDetector`])
//! before being spliced in ([`merge_entries`]).
//!
//! Nothing here touches the filesystem; callers persist
//! [`MergeOutcome::document`] when [`MergeOutcome::modified`] is set.

mod dedupe;
mod document;
mod locate;
mod merge;
mod prune;

pub use dedupe::{DuplicateDetector, DuplicateMatch, entry_index};
pub use document::{Block, Document, Heading, SectionSpan};
pub use locate::{SectionLocation, locate_section};
pub use merge::{DocumentMutator, MergeOutcome, format_entry_line, merge_entries};
pub use prune::{PruneOutcome, prune_stale_section};

use contribmerge_shared::AppConfig;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Document layout knobs for one merge pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Title of the heading that category sections live under.
    pub anchor_heading: String,
    /// Level of the anchor heading; category headings sit one level deeper.
    pub anchor_level: usize,
    /// Title of the disposable section removed before merging.
    pub stale_section_heading: String,
    /// Prefix of the line that closes the disposable section.
    pub stale_trailer_marker: String,
    /// Web base used for repository links and exact-link duplicate checks.
    pub web_base: String,
    /// Short repository names too generic for the fuzzy duplicate check.
    pub short_name_stoplist: Vec<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl MergeOptions {
    /// Options from the `[document]` and `[github]` config tables.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            anchor_heading: config.document.anchor_heading.clone(),
            anchor_level: 2,
            stale_section_heading: config.document.stale_section_heading.clone(),
            stale_trailer_marker: config.document.stale_trailer_marker.clone(),
            web_base: config.github.web_base.clone(),
            short_name_stoplist: config.document.short_name_stoplist.clone(),
        }
    }

    /// Heading level of category sections.
    pub fn category_level(&self) -> usize {
        self.anchor_level + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_config() {
        let opts = MergeOptions::default();
        assert_eq!(opts.anchor_heading, "Notable Open-Source Contributions");
        assert_eq!(opts.anchor_level, 2);
        assert_eq!(opts.category_level(), 3);
        assert_eq!(opts.web_base, "https://github.com");
        assert!(opts.short_name_stoplist.iter().any(|s| s == "galaxy"));
    }

    #[test]
    fn from_config_picks_up_overrides() {
        let mut config = AppConfig::default();
        config.document.anchor_heading = "Contributions".into();
        config.github.web_base = "https://git.example.org".into();
        let opts = MergeOptions::from_config(&config);
        assert_eq!(opts.anchor_heading, "Contributions");
        assert_eq!(opts.web_base, "https://git.example.org");
    }
}
