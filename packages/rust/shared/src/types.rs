//! Core domain types shared between the entry source and the merge engine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One contribution record, rendered as a single bullet line in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Repository path, e.g. `galaxyproject/galaxy`.
    pub identifier: String,
    /// Human-readable summary of the contribution.
    pub description: String,
    /// Link to the contributor's merged pull requests in this repository.
    pub reference_url: String,
    /// Number of merged pull requests behind this entry.
    #[serde(default)]
    pub occurrence_count: usize,
}

impl Entry {
    /// Canonical repository link built from the identifier.
    pub fn repo_url(&self, web_base: &str) -> String {
        format!("{}/{}", web_base.trim_end_matches('/'), self.identifier)
    }

    /// Final path segment of the identifier, lower-cased.
    pub fn short_name(&self) -> String {
        self.identifier
            .rsplit('/')
            .next()
            .unwrap_or(&self.identifier)
            .to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// CategoryBatch
// ---------------------------------------------------------------------------

/// Entries destined for one category section, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBatch {
    /// Category label, matched against `###` heading text.
    pub category: String,
    /// Candidate entries for that category.
    pub entries: Vec<Entry>,
}

// ---------------------------------------------------------------------------
// MergeDecision
// ---------------------------------------------------------------------------

/// What the merge did with a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// A new category heading was created and the entry placed under it.
    CreatedSection,
    /// The entry was appended to a category section.
    Appended,
    /// The entry is already documented somewhere in the document.
    SkippedDuplicate,
    /// The document has no anchor heading to create the category under.
    SkippedNoAnchor,
}

impl DecisionKind {
    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedSection => "created_section",
            Self::Appended => "appended",
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::SkippedNoAnchor => "skipped_no_anchor",
        }
    }

    /// Whether the entry ended up in the document.
    pub fn is_addition(&self) -> bool {
        matches!(self, Self::CreatedSection | Self::Appended)
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entry decision log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDecision {
    /// Entry identifier.
    pub identifier: String,
    /// Category the entry was merged into (or skipped from).
    pub category: String,
    /// Outcome.
    pub kind: DecisionKind,
    /// Human-readable explanation.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(identifier: &str) -> Entry {
        Entry {
            identifier: identifier.into(),
            description: "Fixed things.".into(),
            reference_url: format!("https://github.com/{identifier}/pulls"),
            occurrence_count: 2,
        }
    }

    #[test]
    fn repo_url_joins_base_and_identifier() {
        let e = entry("galaxyproject/planemo");
        assert_eq!(
            e.repo_url("https://github.com"),
            "https://github.com/galaxyproject/planemo"
        );
        assert_eq!(
            e.repo_url("https://github.com/"),
            "https://github.com/galaxyproject/planemo"
        );
    }

    #[test]
    fn short_name_is_last_segment_lowercased() {
        assert_eq!(entry("BGruening/GalaxyTools").short_name(), "galaxytools");
        assert_eq!(entry("standalone").short_name(), "standalone");
    }

    #[test]
    fn decision_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DecisionKind::SkippedNoAnchor).expect("serialize");
        assert_eq!(json, r#""skipped_no_anchor""#);
        assert_eq!(DecisionKind::CreatedSection.to_string(), "created_section");
        assert!(DecisionKind::Appended.is_addition());
        assert!(!DecisionKind::SkippedDuplicate.is_addition());
    }

    #[test]
    fn batch_deserializes_without_count() {
        let json = r#"[{"category":"Other Open-Source Projects","entries":[
            {"identifier":"a/b","description":"d","reference_url":"https://github.com/a/b/pulls"}
        ]}]"#;
        let batches: Vec<CategoryBatch> = serde_json::from_str(json).expect("deserialize");
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].entries[0].occurrence_count, 0);
    }

    #[test]
    fn entries_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/entries.fixture.json")
            .expect("read fixture");
        let batches: Vec<CategoryBatch> =
            serde_json::from_str(&fixture).expect("deserialize fixture entries");
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].category, "Galaxy Project Core");
        assert_eq!(batches[0].entries[0].identifier, "galaxyproject/planemo");
    }
}
