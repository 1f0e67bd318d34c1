//! Pull request records and per-repository grouping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A merged pull request, as much of it as the rest of the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub html_url: String,
    pub title: String,
    pub body: Option<String>,
    /// API URL of the target repository (`{api_base}/repos/{owner}/{repo}`).
    pub repository_url: String,
    pub labels: Vec<String>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// `owner/repo` derived from the API repository URL.
    pub fn repository(&self) -> Option<&str> {
        self.repository_url
            .split_once("/repos/")
            .map(|(_, rest)| rest.trim_end_matches('/'))
            .filter(|name| {
                matches!(name.split_once('/'), Some((owner, repo))
                    if !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            })
    }
}

/// All of one user's pull requests to one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContributions {
    /// `owner/repo`.
    pub repository: String,
    pub pull_requests: Vec<PullRequest>,
}

impl RepoContributions {
    pub fn count(&self) -> usize {
        self.pull_requests.len()
    }

    pub fn owner(&self) -> &str {
        self.repository
            .split_once('/')
            .map_or(self.repository.as_str(), |(owner, _)| owner)
    }
}

/// Group pull requests by repository.
///
/// Repositories owned by `username` (case-insensitive) are dropped. Groups
/// are ordered by pull request count, descending; ties keep the order in
/// which each repository first appeared.
pub fn group_by_repository(prs: Vec<PullRequest>, username: &str) -> Vec<RepoContributions> {
    let mut groups: Vec<RepoContributions> = Vec::new();

    for pr in prs {
        let Some(repository) = pr.repository().map(str::to_string) else {
            warn!(url = %pr.repository_url, "cannot derive repository name, skipping pull request");
            continue;
        };

        match groups.iter_mut().find(|g| g.repository == repository) {
            Some(group) => group.pull_requests.push(pr),
            None => groups.push(RepoContributions {
                repository,
                pull_requests: vec![pr],
            }),
        }
    }

    groups.retain(|g| {
        let own = g.owner().eq_ignore_ascii_case(username);
        if own {
            debug!(repository = %g.repository, "skipping own repository");
        }
        !own
    });
    groups.sort_by(|a, b| b.count().cmp(&a.count()));
    groups
}
