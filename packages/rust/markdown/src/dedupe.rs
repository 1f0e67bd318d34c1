//! Duplicate detection against the whole document.
//!
//! An entry counts as already documented when it appears anywhere in the
//! document, not only in the category it is being merged into: a human may
//! have filed it under a different heading, and a second copy is worse than
//! a misfiled one.
//!
//! Checks, in order:
//! 1. the identifier is the link text of an existing entry line
//! 2. the canonical repository link (`github.com/<identifier>`) appears
//! 3. the short repository name appears in the visible text of a bold run
//!    (`**Name**`, `**[Name](url)**`) on a single line, unless the short
//!    name is on the stoplist of generic words

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use contribmerge_shared::Entry;

use crate::MergeOptions;
use crate::document::Document;

/// Matches an entry line: `- **[identifier](url)** …`.
static ENTRY_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*+]\s+\*\*\[([^\]]+)\]\(([^)\s]+)\)\*\*").expect("entry line regex")
});

/// Matches a link destination: `](url)`.
static LINK_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\([^)]*\)").expect("link target regex"));

/// Which check flagged an entry as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateMatch {
    /// The identifier is already the link text of an entry line.
    Indexed,
    /// The canonical repository link is already present.
    ExactLink,
    /// The short repository name is already present in emphasized text.
    FuzzyName,
}

impl DuplicateMatch {
    /// Human-readable explanation for the decision log.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Indexed => "already listed as an entry",
            Self::ExactLink => "repository link already present",
            Self::FuzzyName => "repository name already mentioned in emphasized text",
        }
    }
}

/// Identifiers (lower-cased) of every entry line in the document.
pub fn entry_index(doc: &Document) -> HashSet<String> {
    doc.lines()
        .filter_map(|line| ENTRY_LINE_RE.captures(line))
        .map(|caps| caps[1].trim().to_lowercase())
        .collect()
}

/// Decides whether an entry is already represented in a document.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    link_stem: String,
    stoplist: HashSet<String>,
}

impl DuplicateDetector {
    /// Build a detector from merge options.
    pub fn new(opts: &MergeOptions) -> Self {
        let host = opts
            .web_base
            .split_once("://")
            .map_or(opts.web_base.as_str(), |(_, rest)| rest);
        Self {
            link_stem: host.trim_end_matches('/').to_string(),
            stoplist: opts
                .short_name_stoplist
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    /// Run all checks; `None` means the entry is new.
    ///
    /// `index` is the [`entry_index`] of `doc`, kept current by the caller.
    pub fn check(
        &self,
        entry: &Entry,
        doc: &Document,
        index: &HashSet<String>,
    ) -> Option<DuplicateMatch> {
        if index.contains(&entry.identifier.trim().to_lowercase()) {
            return Some(DuplicateMatch::Indexed);
        }
        if self.has_exact_link(entry, doc) {
            return Some(DuplicateMatch::ExactLink);
        }
        if self.has_fuzzy_name(entry, doc) {
            return Some(DuplicateMatch::FuzzyName);
        }
        None
    }

    /// `github.com/<identifier>` anywhere, case-insensitive. A longer name
    /// sharing the prefix (`o/galaxy-hub` for `o/galaxy`) also matches.
    fn has_exact_link(&self, entry: &Entry, doc: &Document) -> bool {
        let needle = format!("{}/{}", self.link_stem, entry.identifier.trim()).to_lowercase();
        doc.lines().any(|line| line.to_lowercase().contains(&needle))
    }

    /// Short name inside the visible text of a closed `**…**` run.
    fn has_fuzzy_name(&self, entry: &Entry, doc: &Document) -> bool {
        let short = entry.short_name();
        if short.is_empty() || self.stoplist.contains(&short) {
            return false;
        }
        doc.lines()
            .any(|line| emphasized_runs(line).any(|run| visible_text(run).contains(&short)))
    }
}

/// Text between paired `**` markers on one line; an unclosed run is ignored.
fn emphasized_runs(line: &str) -> impl Iterator<Item = &str> {
    let parts: Vec<&str> = line.split("**").collect();
    let closed = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .filter(move |(i, _)| i % 2 == 1 && *i < closed)
        .map(|(_, part)| part)
}

/// Lower-cased run text with link destinations removed.
fn visible_text(run: &str) -> String {
    LINK_TARGET_RE.replace_all(run, "]").to_lowercase()
}
