//! End-to-end runs: `sync` (fetch → describe → categorize → merge) and
//! `merge_file` (merge a ready entry set into the document on disk).

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use contribmerge_github::{GithubClient, PullRequest, group_by_repository};
use contribmerge_markdown::{MergeOptions, PruneOutcome, merge_entries};
use contribmerge_shared::{AppConfig, CategoryBatch, ContribMergeError, MergeDecision, Result};

use crate::categorize::Categorizer;
use crate::describe::Describer;
use crate::entries::build_entries;
use crate::persist::write_atomic;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Where merged pull requests come from.
pub trait ContributionSource: Send + Sync {
    fn fetch_merged_prs(
        &self,
        username: &str,
        since: NaiveDate,
    ) -> impl Future<Output = Result<Vec<PullRequest>>> + Send;
}

impl ContributionSource for GithubClient {
    fn fetch_merged_prs(
        &self,
        username: &str,
        since: NaiveDate,
    ) -> impl Future<Output = Result<Vec<PullRequest>>> + Send {
        GithubClient::fetch_merged_prs(self, username, since)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before describing each repository.
    fn repository(&self, name: &str, current: usize, total: usize);
    /// Called once per merge decision, in input order.
    fn decision(&self, decision: &MergeDecision);
    /// Called when the document merge completes.
    fn done(&self, result: &MergeFileResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn repository(&self, _name: &str, _current: usize, _total: usize) {}
    fn decision(&self, _decision: &MergeDecision) {}
    fn done(&self, _result: &MergeFileResult) {}
}

// ---------------------------------------------------------------------------
// merge_file
// ---------------------------------------------------------------------------

/// Configuration for [`merge_file`].
#[derive(Debug, Clone)]
pub struct MergeFileConfig {
    /// Target document.
    pub path: PathBuf,
    pub options: MergeOptions,
    /// Report decisions without writing.
    pub dry_run: bool,
}

impl MergeFileConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            path: config.document.path.clone(),
            options: MergeOptions::from_config(config),
            dry_run: false,
        }
    }
}

/// Result of [`merge_file`].
#[derive(Debug, Clone)]
pub struct MergeFileResult {
    pub path: PathBuf,
    pub decisions: Vec<MergeDecision>,
    pub pruned: PruneOutcome,
    /// At least one entry was added.
    pub modified: bool,
    /// The document on disk was replaced.
    pub written: bool,
    pub elapsed: Duration,
}

impl MergeFileResult {
    pub fn added(&self) -> usize {
        self.decisions.iter().filter(|d| d.kind.is_addition()).count()
    }

    pub fn skipped(&self) -> usize {
        self.decisions.len() - self.added()
    }
}

/// Merge `batches` into the document at `config.path`.
///
/// The file is read once and replaced atomically only when an entry was
/// added and `dry_run` is off.
#[instrument(skip_all, fields(path = %config.path.display(), categories = batches.len()))]
pub fn merge_file(
    config: &MergeFileConfig,
    batches: &[CategoryBatch],
    progress: &dyn ProgressReporter,
) -> Result<MergeFileResult> {
    let start = Instant::now();

    progress.phase("Merging entries");
    let text = std::fs::read_to_string(&config.path)
        .map_err(|e| ContribMergeError::io(&config.path, e))?;

    let outcome = merge_entries(&text, batches, &config.options);
    for decision in &outcome.decisions {
        progress.decision(decision);
    }

    let written = outcome.modified && !config.dry_run;
    if written {
        progress.phase("Writing document");
        write_atomic(&config.path, &outcome.document)?;
    } else if outcome.modified {
        info!("dry run, document not written");
    }

    let result = MergeFileResult {
        path: config.path.clone(),
        decisions: outcome.decisions,
        pruned: outcome.pruned,
        modified: outcome.modified,
        written,
        elapsed: start.elapsed(),
    };

    info!(
        added = result.added(),
        skipped = result.skipped(),
        written,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "merge_file complete"
    );

    progress.done(&result);
    Ok(result)
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

/// Configuration for [`sync`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Author whose merged pull requests are collected.
    pub username: String,
    /// Earliest merge date included.
    pub since: NaiveDate,
    /// Web base for repository and pull request list links.
    pub web_base: String,
    pub categorizer: Categorizer,
    pub merge: MergeFileConfig,
}

impl SyncConfig {
    /// Settings from config; `since` is `window_days` before `today`.
    pub fn from_config(config: &AppConfig, username: impl Into<String>, today: NaiveDate) -> Self {
        let since = today - chrono::Duration::days(i64::from(config.github.window_days));
        Self {
            username: username.into(),
            since,
            web_base: config.github.web_base.clone(),
            categorizer: Categorizer::from_config(config),
            merge: MergeFileConfig::from_config(config),
        }
    }
}

/// Result of [`sync`].
#[derive(Debug)]
pub struct SyncResult {
    /// Merged pull requests found in the window.
    pub pull_requests: usize,
    /// Repositories contributed to, own repositories excluded.
    pub repositories: usize,
    /// Entries handed to the merge.
    pub batches: Vec<CategoryBatch>,
    /// `None` when there was nothing to merge.
    pub merge: Option<MergeFileResult>,
    pub elapsed: Duration,
}

/// Run a full sync.
///
/// A failed fetch is logged and treated as no contributions: the run ends
/// without touching the document. Description failures fall back to a
/// template and never abort the run.
#[instrument(skip_all, fields(user = %config.username, since = %config.since))]
pub async fn sync<S, D>(
    config: &SyncConfig,
    source: &S,
    describer: &D,
    progress: &dyn ProgressReporter,
) -> Result<SyncResult>
where
    S: ContributionSource,
    D: Describer,
{
    let start = Instant::now();

    progress.phase("Fetching merged pull requests");
    let prs = match source.fetch_merged_prs(&config.username, config.since).await {
        Ok(prs) => prs,
        Err(e) => {
            warn!(error = %e, "fetch failed, treating as no contributions");
            Vec::new()
        }
    };
    let pull_requests = prs.len();
    info!(pull_requests, "merged pull requests found");

    let repos = group_by_repository(prs, &config.username);
    info!(repositories = repos.len(), "contributions grouped");

    if repos.is_empty() {
        return Ok(SyncResult {
            pull_requests,
            repositories: 0,
            batches: Vec::new(),
            merge: None,
            elapsed: start.elapsed(),
        });
    }

    progress.phase("Generating descriptions");
    let batches = build_entries(
        &repos,
        &config.username,
        &config.web_base,
        describer,
        &config.categorizer,
        progress,
    )
    .await;

    let merge = merge_file(&config.merge, &batches, progress)?;

    Ok(SyncResult {
        pull_requests,
        repositories: repos.len(),
        batches,
        merge: Some(merge),
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use contribmerge_shared::{DecisionKind, Entry};

    use crate::describe::fallback_description;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cm-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn copy_fixture(dir: &Path) -> PathBuf {
        let target = dir.join("index.md");
        std::fs::copy("../../../fixtures/markdown/projects.fixture.md", &target).unwrap();
        target
    }

    fn pr(repo: &str, n: usize) -> PullRequest {
        PullRequest {
            html_url: format!("https://github.com/{repo}/pull/{n}"),
            title: format!("Change {n}"),
            body: Some("Details.".into()),
            repository_url: format!("https://api.github.com/repos/{repo}"),
            labels: vec![],
            merged_at: None,
        }
    }

    struct FixedSource(Result<Vec<PullRequest>>);

    impl ContributionSource for FixedSource {
        async fn fetch_merged_prs(
            &self,
            _username: &str,
            _since: NaiveDate,
        ) -> Result<Vec<PullRequest>> {
            match &self.0 {
                Ok(prs) => Ok(prs.clone()),
                Err(e) => Err(ContribMergeError::Fetch(e.to_string())),
            }
        }
    }

    struct FailingDescriber;

    impl Describer for FailingDescriber {
        async fn describe(&self, repo: &str, _prs: &[PullRequest]) -> Result<String> {
            Err(ContribMergeError::Generation(format!("{repo}: unavailable")))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        decisions: Mutex<Vec<DecisionKind>>,
        phases: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn repository(&self, _name: &str, _current: usize, _total: usize) {}
        fn decision(&self, decision: &MergeDecision) {
            self.decisions.lock().unwrap().push(decision.kind);
        }
        fn done(&self, _result: &MergeFileResult) {}
    }

    fn sync_config(path: PathBuf) -> SyncConfig {
        let mut config = SyncConfig::from_config(
            &AppConfig::default(),
            "octo-dev",
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        );
        config.merge.path = path;
        config
    }

    #[test]
    fn since_is_window_before_today() {
        let config = sync_config(PathBuf::from("x.md"));
        assert_eq!(config.since, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn merge_file_writes_when_modified() {
        let tmp = temp_dir();
        let path = copy_fixture(&tmp);
        let config = MergeFileConfig {
            path: path.clone(),
            ..MergeFileConfig::from_config(&AppConfig::default())
        };
        let batches = vec![CategoryBatch {
            category: "Other Open-Source Projects".into(),
            entries: vec![Entry {
                identifier: "rust-lang/rust-clippy".into(),
                description: "Lint fixes.".into(),
                reference_url: "https://github.com/rust-lang/rust-clippy/pulls".into(),
                occurrence_count: 1,
            }],
        }];

        let progress = RecordingProgress::default();
        let result = merge_file(&config, &batches, &progress).unwrap();
        assert!(result.modified);
        assert!(result.written);
        assert_eq!(*progress.decisions.lock().unwrap(), vec![DecisionKind::Appended]);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[rust-lang/rust-clippy]"));
        assert!(!text.contains("Recent Contributions"));

        // second run: nothing new, file untouched
        let again = merge_file(&config, &batches, &SilentProgress).unwrap();
        assert!(!again.modified);
        assert!(!again.written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn dry_run_leaves_file_alone() {
        let tmp = temp_dir();
        let path = copy_fixture(&tmp);
        let before = std::fs::read_to_string(&path).unwrap();
        let config = MergeFileConfig {
            path: path.clone(),
            dry_run: true,
            ..MergeFileConfig::from_config(&AppConfig::default())
        };
        let batches = vec![CategoryBatch {
            category: "Research Software Ecosystem".into(),
            entries: vec![Entry {
                identifier: "bio-tools/biotoolsSchema".into(),
                description: "Schema work.".into(),
                reference_url: "https://github.com/bio-tools/biotoolsSchema/pulls".into(),
                occurrence_count: 2,
            }],
        }];

        let result = merge_file(&config, &batches, &SilentProgress).unwrap();
        assert!(result.modified);
        assert!(!result.written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_document_is_io_error() {
        let config = MergeFileConfig {
            path: PathBuf::from("/nonexistent/contribmerge/index.md"),
            ..MergeFileConfig::from_config(&AppConfig::default())
        };
        let err = merge_file(&config, &[], &SilentProgress).unwrap_err();
        assert!(matches!(err, ContribMergeError::Io { .. }));
    }

    #[tokio::test]
    async fn sync_with_failing_descriptions_uses_fallback() {
        let tmp = temp_dir();
        let path = copy_fixture(&tmp);
        let source = FixedSource(Ok(vec![
            pr("nf-core/rnaseq", 1),
            pr("nf-core/rnaseq", 2),
            pr("octo-dev/dotfiles", 3),
            pr("usegalaxy-eu/infrastructure-playbook", 4),
        ]));

        let progress = RecordingProgress::default();
        let result = sync(&sync_config(path.clone()), &source, &FailingDescriber, &progress)
            .await
            .unwrap();

        assert_eq!(result.pull_requests, 4);
        assert_eq!(result.repositories, 2);
        let merge = result.merge.expect("merge ran");
        assert!(merge.written);
        assert_eq!(merge.added(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(&fallback_description(2)));
        assert!(text.contains(&fallback_description(1)));
        assert!(text.contains("### UseGalaxy.eu Infrastructure"));
        assert!(!text.contains("octo-dev/dotfiles"));
        assert!(
            text.contains("([PRs](https://github.com/nf-core/rnaseq/pulls?q=is%3Apr+author%3Aocto-dev+is%3Amerged))")
        );
        assert_eq!(
            progress.phases.lock().unwrap()[0],
            "Fetching merged pull requests"
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn sync_fetch_failure_changes_nothing() {
        let tmp = temp_dir();
        let path = copy_fixture(&tmp);
        let before = std::fs::read_to_string(&path).unwrap();
        let source = FixedSource(Err(ContribMergeError::Fetch("HTTP 401".into())));

        let result = sync(&sync_config(path.clone()), &source, &FailingDescriber, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.pull_requests, 0);
        assert!(result.merge.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn sync_only_own_repositories_is_noop() {
        let tmp = temp_dir();
        let path = copy_fixture(&tmp);
        let source = FixedSource(Ok(vec![pr("Octo-Dev/site", 1)]));

        let result = sync(&sync_config(path.clone()), &source, &FailingDescriber, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.pull_requests, 1);
        assert_eq!(result.repositories, 0);
        assert!(result.merge.is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
