//! Removal of the disposable "recent contributions" section.
//!
//! Older runs injected a `##` section that ends with a `*Last updated: …*`
//! line. It is owned by this tool and dropped before every merge.

use tracing::{debug, warn};

use crate::MergeOptions;
use crate::document::Document;

/// What the pruning pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneOutcome {
    /// No stale section in the document.
    NotPresent,
    /// The section was removed; `lines` counts removed lines, collapsed blanks included.
    Removed { lines: usize },
    /// Start heading found without a trailer line; the document was left as is.
    TrailerMissing { start: usize },
}

/// Whether a line closes the stale section (`*Last updated: …*`).
fn is_trailer(line: &str, marker: &str) -> bool {
    line.trim_start()
        .trim_start_matches(['*', '_'])
        .trim_start()
        .starts_with(marker)
}

/// Remove the stale section from `doc`.
///
/// Everything from the start heading through the trailer line is dropped,
/// along with blank lines directly before the start heading. The trailer
/// must sit inside the stale section, before the next heading of the same
/// or a higher level. Without one nothing is removed.
pub fn prune_stale_section(doc: &mut Document, opts: &MergeOptions) -> PruneOutcome {
    let Some(&start) = doc
        .find_headings(opts.anchor_level, &opts.stale_section_heading)
        .first()
    else {
        return PruneOutcome::NotPresent;
    };

    let section_end = doc.section_span(start).map_or(start + 1, |span| span.end);
    let trailer = doc
        .lines()
        .enumerate()
        .take(section_end)
        .skip(start + 1)
        .find(|(_, line)| is_trailer(line, &opts.stale_trailer_marker))
        .map(|(i, _)| i);

    match trailer {
        Some(end) => {
            let lines = doc.remove_collapsing(start..end + 1);
            debug!(start, end, lines, "removed stale section");
            PruneOutcome::Removed { lines }
        }
        None => {
            warn!(
                start,
                heading = %opts.stale_section_heading,
                "stale section has no trailer line, leaving it in place"
            );
            PruneOutcome::TrailerMissing { start }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prune(text: &str) -> (String, PruneOutcome) {
        let mut doc = Document::parse(text);
        let outcome = prune_stale_section(&mut doc, &MergeOptions::default());
        (doc.render(), outcome)
    }

    #[test]
    fn absent_section_is_noop() {
        let text = "# Projects\n\n## Notable Open-Source Contributions\n";
        let (out, outcome) = prune(text);
        assert_eq!(out, text);
        assert_eq!(outcome, PruneOutcome::NotPresent);
    }

    #[test]
    fn removes_section_through_trailer() {
        let text = "# Projects\n\nIntro.\n\n## 🆕 Recent Contributions\n\n- **[a/b](https://github.com/a/b)** - B.\n\n---\n\n*Last updated: 2024-05-01*\n\n## Talks\n";
        let (out, outcome) = prune(text);
        assert_eq!(out, "# Projects\n\nIntro.\n\n## Talks\n");
        assert!(matches!(outcome, PruneOutcome::Removed { .. }));
    }

    #[test]
    fn trailer_as_last_line_without_newline() {
        let text = "Intro.\n\n## 🆕 Recent Contributions\n- x\n*Last updated: today*";
        let (out, _) = prune(text);
        assert_eq!(out, "Intro.");
    }

    #[test]
    fn trailer_at_end_of_file() {
        let text = "Intro.\n\n## 🆕 Recent Contributions\n- x\n---\n\n*Last updated: today*\n";
        let (out, _) = prune(text);
        assert_eq!(out, "Intro.\n");
    }

    #[test]
    fn missing_trailer_leaves_document_alone() {
        let text = "Intro.\n\n## 🆕 Recent Contributions\n- x\n\n## Talks\nSlides.\n";
        let (out, outcome) = prune(text);
        assert_eq!(out, text);
        assert_eq!(outcome, PruneOutcome::TrailerMissing { start: 2 });
    }

    #[test]
    fn footer_after_later_section_is_not_a_trailer() {
        let text = "Intro.\n\n## 🆕 Recent Contributions\n- x\n\n## Talks\nSlides.\n\n_Last updated: by hand, page footer_\n";
        let (out, outcome) = prune(text);
        assert_eq!(out, text);
        assert_eq!(outcome, PruneOutcome::TrailerMissing { start: 2 });
    }

    #[test]
    fn subheadings_stay_inside_stale_section() {
        let text = "Intro.\n\n## 🆕 Recent Contributions\n### Galaxy\n- x\n\n---\n\n*Last updated: today*\n\n## Talks\n";
        let (out, outcome) = prune(text);
        assert_eq!(out, "Intro.\n\n## Talks\n");
        assert!(matches!(outcome, PruneOutcome::Removed { .. }));
    }

    #[test]
    fn trailer_before_start_is_ignored() {
        let text = "*Last updated: yesterday*\n\n## 🆕 Recent Contributions\n- x\n";
        let (out, outcome) = prune(text);
        assert_eq!(out, text);
        assert!(matches!(outcome, PruneOutcome::TrailerMissing { .. }));
    }

    #[test]
    fn trailer_marker_variants() {
        assert!(is_trailer("*Last updated: 2024-01-01*", "Last updated:"));
        assert!(is_trailer("_Last updated: 2024-01-01_", "Last updated:"));
        assert!(is_trailer("Last updated: 2024-01-01", "Last updated:"));
        assert!(!is_trailer("Not last updated", "Last updated:"));
    }
}
