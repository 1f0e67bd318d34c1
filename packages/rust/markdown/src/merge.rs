//! The document mutator: splices new entries into category sections.
//!
//! One pass over one in-memory buffer:
//!
//! ```text
//! RAW -> PRUNED -> (locate | create) per category -> MUTATED
//! ```
//!
//! The caller persists the result only when [`MergeOutcome::modified`] is set.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use contribmerge_shared::{CategoryBatch, DecisionKind, Entry, MergeDecision};

use crate::MergeOptions;
use crate::dedupe::{DuplicateDetector, entry_index};
use crate::document::Document;
use crate::locate::{SectionLocation, locate_section};
use crate::prune::{PruneOutcome, prune_stale_section};

/// Result of merging a set of category batches into a document.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Final document text.
    pub document: String,
    /// One decision per input entry, in input order.
    pub decisions: Vec<MergeDecision>,
    /// What happened to the stale section.
    pub pruned: PruneOutcome,
    /// Whether any entry was created or appended.
    pub modified: bool,
}

impl MergeOutcome {
    /// Number of entries that made it into the document.
    pub fn added(&self) -> usize {
        self.decisions.iter().filter(|d| d.kind.is_addition()).count()
    }

    /// Number of entries left out.
    pub fn skipped(&self) -> usize {
        self.decisions.len() - self.added()
    }

    /// Decisions of one kind.
    pub fn count(&self, kind: DecisionKind) -> usize {
        self.decisions.iter().filter(|d| d.kind == kind).count()
    }
}

/// Format one entry as a bullet line:
/// `- **[identifier](repo_url)** - description ([PRs](reference_url))`.
///
/// Whitespace runs in the description (newlines included) collapse to one
/// space so the entry stays on a single line.
pub fn format_entry_line(entry: &Entry, web_base: &str) -> String {
    let description = entry.description.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "- **[{id}]({url})** - {description} ([PRs]({prs}))",
        id = entry.identifier,
        url = entry.repo_url(web_base),
        prs = entry.reference_url,
    )
}

/// Applies category batches to a document buffer, recording a decision per entry.
pub struct DocumentMutator<'a> {
    doc: Document,
    opts: &'a MergeOptions,
    detector: DuplicateDetector,
    /// Lower-cased identifiers of the entry lines in `doc`.
    index: HashSet<String>,
    decisions: Vec<MergeDecision>,
    modified: bool,
}

impl<'a> DocumentMutator<'a> {
    /// Start mutating an already-pruned document.
    pub fn new(doc: Document, opts: &'a MergeOptions) -> Self {
        let index = entry_index(&doc);
        Self {
            doc,
            opts,
            detector: DuplicateDetector::new(opts),
            index,
            decisions: Vec::new(),
            modified: false,
        }
    }

    /// Merge one category's entries.
    ///
    /// Without a category section or an anchor heading every entry is
    /// skipped as `skipped_no_anchor`. Otherwise duplicates are skipped and
    /// the remaining entries are appended to the section, or placed under a
    /// new heading directly after the anchor line.
    pub fn apply(&mut self, batch: &CategoryBatch) {
        if batch.entries.is_empty() {
            return;
        }

        let location = match locate_section(&self.doc, &batch.category, self.opts) {
            Ok(location) => location,
            Err(e) => {
                warn!(category = %batch.category, error = %e, "skipping category");
                for entry in &batch.entries {
                    self.record(entry, &batch.category, DecisionKind::SkippedNoAnchor, e.to_string());
                }
                return;
            }
        };

        let fresh = self.filter_duplicates(batch);
        if fresh.is_empty() {
            debug!(category = %batch.category, "nothing new for category");
            return;
        }

        let lines: Vec<String> = fresh
            .iter()
            .map(|entry| format_entry_line(entry, &self.opts.web_base))
            .collect();

        match location {
            SectionLocation::Existing(span) => {
                self.doc.append_lines_to_section(span, &lines);
                for entry in &fresh {
                    self.record(
                        entry,
                        &batch.category,
                        DecisionKind::Appended,
                        format!("appended to '{}'", batch.category),
                    );
                }
            }
            SectionLocation::Create { anchor } => {
                self.doc.insert_section_after(
                    anchor,
                    self.opts.category_level(),
                    &batch.category,
                    &lines,
                );
                info!(category = %batch.category, entries = fresh.len(), "created category section");
                for (i, entry) in fresh.iter().enumerate() {
                    let (kind, reason) = if i == 0 {
                        (
                            DecisionKind::CreatedSection,
                            format!(
                                "created '{}' under '{}'",
                                batch.category, self.opts.anchor_heading
                            ),
                        )
                    } else {
                        (
                            DecisionKind::Appended,
                            format!("appended to new section '{}'", batch.category),
                        )
                    };
                    self.record(entry, &batch.category, kind, reason);
                }
            }
        }

        self.index
            .extend(fresh.iter().map(|entry| entry.identifier.trim().to_lowercase()));
        self.modified = true;
    }

    /// Drop entries already in the document or repeated within the batch.
    ///
    /// Skipped entries are recorded here; the survivors are returned in order.
    fn filter_duplicates<'b>(&mut self, batch: &'b CategoryBatch) -> Vec<&'b Entry> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut fresh = Vec::new();

        for entry in &batch.entries {
            let key = entry.identifier.trim().to_lowercase();
            let reason = if seen.contains(&key) {
                Some("repeated in this batch".to_string())
            } else {
                self.detector
                    .check(entry, &self.doc, &self.index)
                    .map(|m| m.reason().to_string())
            };

            match reason {
                Some(reason) => {
                    self.record(entry, &batch.category, DecisionKind::SkippedDuplicate, reason);
                }
                None => {
                    seen.insert(key);
                    fresh.push(entry);
                }
            }
        }

        fresh
    }

    fn record(&mut self, entry: &Entry, category: &str, kind: DecisionKind, reason: String) {
        debug!(identifier = %entry.identifier, category, %kind, %reason, "merge decision");
        self.decisions.push(MergeDecision {
            identifier: entry.identifier.clone(),
            category: category.to_string(),
            kind,
            reason,
        });
    }

    /// Finish the pass.
    pub fn finish(self, pruned: PruneOutcome) -> MergeOutcome {
        MergeOutcome {
            document: self.doc.render(),
            decisions: self.decisions,
            pruned,
            modified: self.modified,
        }
    }
}

/// Merge `batches` into `text`: prune the stale section, then apply each
/// category in order.
#[instrument(skip_all, fields(categories = batches.len()))]
pub fn merge_entries(text: &str, batches: &[CategoryBatch], opts: &MergeOptions) -> MergeOutcome {
    let mut doc = Document::parse(text);
    let pruned = prune_stale_section(&mut doc, opts);

    let mut mutator = DocumentMutator::new(doc, opts);
    for batch in batches {
        mutator.apply(batch);
    }
    let outcome = mutator.finish(pruned);

    info!(
        added = outcome.added(),
        skipped = outcome.skipped(),
        modified = outcome.modified,
        "merge complete"
    );
    outcome
}
