//! Repository → category assignment.

use contribmerge_shared::{AppConfig, CategoryRule};

/// Ordered substring rules with a fallback category.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
    fallback: String,
}

impl Categorizer {
    /// Patterns are matched case-insensitively.
    pub fn new(rules: Vec<CategoryRule>, fallback: impl Into<String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CategoryRule {
                name: rule.name,
                patterns: rule.patterns.iter().map(|p| p.to_lowercase()).collect(),
            })
            .collect();
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.categories.clone(), config.fallback_category.clone())
    }

    /// Category for `repo` (`owner/repo`): the first rule with a pattern
    /// contained in the lower-cased name, else the fallback.
    pub fn categorize(&self, repo: &str) -> &str {
        let repo = repo.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|p| repo.contains(p.as_str())))
            .map_or(self.fallback.as_str(), |rule| rule.name.as_str())
    }
}
