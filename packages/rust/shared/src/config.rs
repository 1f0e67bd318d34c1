//! Application configuration for contribmerge.
//!
//! User config lives at `~/.contribmerge/contribmerge.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are only ever read from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ContribMergeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contribmerge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contribmerge";

// ---------------------------------------------------------------------------
// Config structs (matching contribmerge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Category for repositories no rule matches.
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,

    /// GitHub access settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Description generation settings.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Target document settings.
    #[serde(default)]
    pub document: DocumentConfig,

    /// Ordered categorization rules; the first match wins.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fallback_category: default_fallback_category(),
            github: GithubConfig::default(),
            models: ModelsConfig::default(),
            document: DocumentConfig::default(),
            categories: default_categories(),
        }
    }
}

/// `[github]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Name of the env var holding the actor identity.
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Name of the env var holding the access token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Actor identity used when the username env var is unset.
    #[serde(default)]
    pub username: String,

    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Web base URL used to build repository and PR links.
    #[serde(default = "default_web_base")]
    pub web_base: String,

    /// How many days back to look for merged pull requests.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Maximum number of pull requests to retrieve.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            username_env: default_username_env(),
            token_env: default_token_env(),
            username: String::new(),
            api_base: default_api_base(),
            web_base: default_web_base(),
            window_days: default_window_days(),
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_username_env() -> String {
    "GITHUB_USERNAME".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_web_base() -> String {
    "https://github.com".into()
}
fn default_window_days() -> u32 {
    30
}
fn default_max_results() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[models]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// OpenAI-compatible inference endpoint.
    #[serde(default = "default_models_endpoint")]
    pub endpoint: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Most recent pull requests included in the prompt.
    #[serde(default = "default_max_prs_in_prompt")]
    pub max_prs_in_prompt: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_models_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_prs_in_prompt: default_max_prs_in_prompt(),
        }
    }
}

fn default_models_endpoint() -> String {
    "https://models.github.ai/inference".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    200
}
fn default_max_prs_in_prompt() -> usize {
    15
}

/// `[document]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Target markdown file, relative to the working directory.
    #[serde(default = "default_document_path")]
    pub path: PathBuf,

    /// Title of the `##` heading category sections live under.
    #[serde(default = "default_anchor_heading")]
    pub anchor_heading: String,

    /// Title of the disposable `##` section removed before every merge.
    #[serde(default = "default_stale_section_heading")]
    pub stale_section_heading: String,

    /// Text the stale section's closing line starts with.
    #[serde(default = "default_stale_trailer_marker")]
    pub stale_trailer_marker: String,

    /// Short repository names too generic for fuzzy duplicate matching.
    #[serde(default = "default_short_name_stoplist")]
    pub short_name_stoplist: Vec<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: default_document_path(),
            anchor_heading: default_anchor_heading(),
            stale_section_heading: default_stale_section_heading(),
            stale_trailer_marker: default_stale_trailer_marker(),
            short_name_stoplist: default_short_name_stoplist(),
        }
    }
}

fn default_document_path() -> PathBuf {
    PathBuf::from("content/projects/index.md")
}
fn default_anchor_heading() -> String {
    "Notable Open-Source Contributions".into()
}
fn default_stale_section_heading() -> String {
    "🆕 Recent Contributions".into()
}
fn default_stale_trailer_marker() -> String {
    "Last updated:".into()
}
fn default_short_name_stoplist() -> Vec<String> {
    ["galaxy", "content", "utils", "tools"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[[categories]]` entry: a substring rule mapping repositories to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category label (the `###` heading text).
    pub name: String,
    /// Lower-case substrings matched against `owner/repo`.
    pub patterns: Vec<String>,
}

fn rule(name: &str, patterns: &[&str]) -> CategoryRule {
    CategoryRule {
        name: name.into(),
        patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
    }
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        rule(
            "Galaxy Project Core",
            &[
                "galaxyproject/galaxy",
                "bgruening/galaxytools",
                "galaxyproject/galaxy-hub",
                "galaxyproject/galaxy-visualizations",
                "galaxyproject/tools-iuc",
                "galaxyproject/planemo",
                "bgruening/docker-galaxy",
            ],
        ),
        rule(
            "Galaxy Training & Community",
            &["training-material", "galaxyecology"],
        ),
        rule("UseGalaxy.eu Infrastructure", &["usegalaxy-eu/", "vgcn"]),
        rule(
            "Research Software Ecosystem",
            &["research-software-ecosystem"],
        ),
    ]
}

fn default_fallback_category() -> String {
    "Other Open-Source Projects".into()
}

impl AppConfig {
    /// Check that every configured URL parses and required labels are non-empty.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("github.api_base", &self.github.api_base),
            ("github.web_base", &self.github.web_base),
            ("models.endpoint", &self.models.endpoint),
        ] {
            Url::parse(value).map_err(|e| {
                ContribMergeError::validation(format!("{field} '{value}' is not a URL: {e}"))
            })?;
        }

        if self.document.anchor_heading.trim().is_empty() {
            return Err(ContribMergeError::validation(
                "document.anchor_heading must not be empty",
            ));
        }
        if self.fallback_category.trim().is_empty() {
            return Err(ContribMergeError::validation(
                "fallback_category must not be empty",
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Actor identity and access token resolved from the environment.
#[derive(Clone)]
pub struct Credentials {
    /// GitHub login whose contributions are collected.
    pub username: String,
    /// Bearer token for the GitHub API and GitHub Models.
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Resolve credentials from the process environment.
///
/// A missing token is fatal and reported before any network or file access.
pub fn resolve_credentials(config: &AppConfig) -> Result<Credentials> {
    resolve_credentials_with(config, |name| std::env::var(name).ok())
}

/// Resolve credentials using a custom variable lookup.
pub fn resolve_credentials_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
    let token_env = &config.github.token_env;
    let token = match lookup(token_env) {
        Some(val) if !val.trim().is_empty() => val,
        _ => {
            return Err(ContribMergeError::config(format!(
                "{token_env} environment variable not set"
            )));
        }
    };

    let username_env = &config.github.username_env;
    let username = match lookup(username_env) {
        Some(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ if !config.github.username.trim().is_empty() => config.github.username.trim().to_string(),
        _ => {
            return Err(ContribMergeError::config(format!(
                "no GitHub username: set {username_env} or github.username in {CONFIG_FILE_NAME}"
            )));
        }
    };

    Ok(Credentials { username, token })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contribmerge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContribMergeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contribmerge/contribmerge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContribMergeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContribMergeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ContribMergeError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContribMergeError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ContribMergeError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("anchor_heading"));
        assert!(toml_str.contains("GITHUB_TOKEN"));
        assert!(toml_str.contains("Galaxy Project Core"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.github.window_days, 30);
        assert_eq!(parsed.models.model, "gpt-4o");
        assert_eq!(parsed.categories.len(), 4);
        assert_eq!(parsed.fallback_category, "Other Open-Source Projects");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[document]
path = "docs/projects.md"

[[categories]]
name = "Rust Ecosystem"
patterns = ["rust-lang/"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.document.path, PathBuf::from("docs/projects.md"));
        assert_eq!(
            config.document.anchor_heading,
            "Notable Open-Source Contributions"
        );
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].name, "Rust Ecosystem");
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn init_then_load_from_path() {
        let dir = std::env::temp_dir().join(format!("cm-config-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("contribmerge.toml");

        init_config_at(&path).expect("init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded, AppConfig::default());

        std::fs::write(&path, "[github\nbroken").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ContribMergeError::Config { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn validate_rejects_bad_urls() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        config.models.endpoint = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("models.endpoint"));
    }

    #[test]
    fn missing_token_is_config_error() {
        let config = AppConfig::default();
        let err = resolve_credentials_with(&config, env_of(&[("GITHUB_USERNAME", "octo")]))
            .unwrap_err();
        assert!(matches!(err, ContribMergeError::Config { .. }));
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn empty_token_is_config_error() {
        let config = AppConfig::default();
        let result = resolve_credentials_with(
            &config,
            env_of(&[("GITHUB_TOKEN", "  "), ("GITHUB_USERNAME", "octo")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn username_falls_back_to_config() {
        let mut config = AppConfig::default();
        config.github.username = "arash77".into();
        let creds =
            resolve_credentials_with(&config, env_of(&[("GITHUB_TOKEN", "ghp_x")])).expect("creds");
        assert_eq!(creds.username, "arash77");
        assert_eq!(creds.token, "ghp_x");
        assert!(!format!("{creds:?}").contains("ghp_x"));
    }

    #[test]
    fn username_env_wins_over_config() {
        let mut config = AppConfig::default();
        config.github.username = "arash77".into();
        let creds = resolve_credentials_with(
            &config,
            env_of(&[("GITHUB_TOKEN", "t"), ("GITHUB_USERNAME", "octocat")]),
        )
        .expect("creds");
        assert_eq!(creds.username, "octocat");
    }

    #[test]
    fn missing_username_everywhere_is_config_error() {
        let config = AppConfig::default();
        let err = resolve_credentials_with(&config, env_of(&[("GITHUB_TOKEN", "t")])).unwrap_err();
        assert!(err.to_string().contains("GITHUB_USERNAME"));
    }

    #[test]
    fn process_env_lookup_reports_missing_token() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.github.token_env = "CM_TEST_NONEXISTENT_TOKEN_12345".into();
        let result = resolve_credentials(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not set"));
    }
}
