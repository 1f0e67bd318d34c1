//! Entry construction: describe and categorize each repository.

use std::path::Path;

use tracing::{info, instrument, warn};

use contribmerge_github::RepoContributions;
use contribmerge_shared::{CategoryBatch, ContribMergeError, Entry, Result};

use crate::categorize::Categorizer;
use crate::describe::{Describer, fallback_description};
use crate::pipeline::ProgressReporter;

/// Link to the user's merged pull requests in `repo`.
pub fn pr_list_url(web_base: &str, repo: &str, username: &str) -> String {
    format!(
        "{}/{repo}/pulls?q=is%3Apr+author%3A{username}+is%3Amerged",
        web_base.trim_end_matches('/')
    )
}

/// Build category batches from grouped contributions.
///
/// Repositories are handled one at a time in the given order; categories
/// appear in the order their first repository does. A failed or empty
/// description is replaced by [`fallback_description`].
#[instrument(skip_all, fields(repos = repos.len()))]
pub async fn build_entries<D: Describer>(
    repos: &[RepoContributions],
    username: &str,
    web_base: &str,
    describer: &D,
    categorizer: &Categorizer,
    progress: &dyn ProgressReporter,
) -> Vec<CategoryBatch> {
    let mut batches: Vec<CategoryBatch> = Vec::new();

    for (i, repo) in repos.iter().enumerate() {
        progress.repository(&repo.repository, i + 1, repos.len());

        let description = match describer.describe(&repo.repository, &repo.pull_requests).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => fallback_description(repo.count()),
            Err(e) => {
                warn!(repository = %repo.repository, error = %e, "using fallback description");
                fallback_description(repo.count())
            }
        };

        let entry = Entry {
            identifier: repo.repository.clone(),
            description,
            reference_url: pr_list_url(web_base, &repo.repository, username),
            occurrence_count: repo.count(),
        };

        let category = categorizer.categorize(&repo.repository);
        match batches.iter_mut().find(|b| b.category == category) {
            Some(batch) => batch.entries.push(entry),
            None => batches.push(CategoryBatch {
                category: category.to_string(),
                entries: vec![entry],
            }),
        }
    }

    info!(categories = batches.len(), "entries built");
    batches
}

/// Read a pre-built entry set (JSON array of category batches).
pub fn load_entries(path: &Path) -> Result<Vec<CategoryBatch>> {
    let json = std::fs::read_to_string(path).map_err(|e| ContribMergeError::io(path, e))?;
    let batches: Vec<CategoryBatch> = serde_json::from_str(&json)
        .map_err(|e| ContribMergeError::parse(format!("{}: {e}", path.display())))?;

    for batch in &batches {
        if batch.category.trim().is_empty() {
            return Err(ContribMergeError::validation("category name must not be empty"));
        }
        if let Some(entry) = batch.entries.iter().find(|e| e.identifier.trim().is_empty()) {
            return Err(ContribMergeError::validation(format!(
                "entry in '{}' has an empty identifier ({})",
                batch.category, entry.reference_url
            )));
        }
    }

    Ok(batches)
}
