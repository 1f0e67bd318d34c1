//! Repository descriptions from pull request activity.
//!
//! [`ModelsClient`] asks an OpenAI-compatible chat completions endpoint for a
//! short third-person summary of what was contributed. When generation fails
//! the caller substitutes [`fallback_description`].

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use contribmerge_github::PullRequest;
use contribmerge_shared::{ContribMergeError, ModelsConfig, Result};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("contribmerge/", env!("CARGO_PKG_VERSION"));

/// Pull request bodies are cut to this many characters in the prompt.
const BODY_PROMPT_CHARS: usize = 300;

const SYSTEM_PROMPT: &str = "You are a technical writer creating concise project descriptions \
based on GitHub contributions. Write in third person, focusing on technical impact.";

// ---------------------------------------------------------------------------
// Describer
// ---------------------------------------------------------------------------

/// Produces a one-paragraph description of a user's work on a repository.
pub trait Describer: Send + Sync {
    /// Describe the contributions in `prs` to `repo` (`owner/repo`).
    fn describe(
        &self,
        repo: &str,
        prs: &[PullRequest],
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Description used when generation fails or returns nothing.
pub fn fallback_description(pr_count: usize) -> String {
    let plural = if pr_count == 1 { "" } else { "s" };
    format!("Contributed {pr_count} pull request{plural} to improve functionality and fix issues.")
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PromptPr<'a> {
    title: &'a str,
    body: String,
    labels: &'a [String],
    merged_at: String,
}

/// First `max_chars` characters of `text`.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}

/// User prompt listing at most `max_prs` pull requests.
pub fn build_prompt(repo: &str, prs: &[PullRequest], max_prs: usize) -> String {
    let details: Vec<PromptPr<'_>> = prs
        .iter()
        .take(max_prs)
        .map(|pr| PromptPr {
            title: &pr.title,
            body: pr
                .body
                .as_deref()
                .map(|b| truncate_chars(b, BODY_PROMPT_CHARS).to_string())
                .unwrap_or_default(),
            labels: &pr.labels,
            merged_at: pr.merged_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        })
        .collect();
    let listing = serde_json::to_string_pretty(&details).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Based on these recent pull requests to {repo}, write a concise, professional project \
description (2-3 sentences) that explains:
1. What the contributor worked on
2. The technical areas or features they contributed to
3. The impact or purpose of their contributions

Pull Requests:
{listing}

Write ONLY the description text, no additional formatting or labels. Make it sound professional and technical."
    )
}

// ---------------------------------------------------------------------------
// Chat completions wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ModelsClient
// ---------------------------------------------------------------------------

/// Settings for [`ModelsClient`].
#[derive(Debug, Clone)]
pub struct ModelsOptions {
    /// Inference base URL; requests go to `{endpoint}/chat/completions`.
    pub endpoint: String,
    pub token: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Most pull requests listed in one prompt.
    pub max_prs_in_prompt: usize,
    pub timeout_secs: u64,
}

impl ModelsOptions {
    pub fn from_config(config: &ModelsConfig, token: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            token: token.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_prs_in_prompt: config.max_prs_in_prompt,
            timeout_secs,
        }
    }
}

/// Chat completions client for description generation.
#[derive(Debug, Clone)]
pub struct ModelsClient {
    http: Client,
    url: Url,
    token: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_prs: usize,
}

impl ModelsClient {
    pub fn new(opts: ModelsOptions) -> Result<Self> {
        let base = opts.endpoint.trim_end_matches('/');
        let url = Url::parse(&format!("{base}/chat/completions")).map_err(|e| {
            ContribMergeError::validation(format!("invalid models endpoint '{}': {e}", opts.endpoint))
        })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| {
                ContribMergeError::Generation(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            url,
            token: opts.token,
            model: opts.model,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
            max_prs: opts.max_prs_in_prompt,
        })
    }
}

impl Describer for ModelsClient {
    #[instrument(skip(self, prs), fields(prs = prs.len(), model = %self.model))]
    async fn describe(&self, repo: &str, prs: &[PullRequest]) -> Result<String> {
        let prompt = build_prompt(repo, prs, self.max_prs);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ContribMergeError::Generation(format!("{repo}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContribMergeError::Generation(format!(
                "{repo}: HTTP {status}: {}",
                truncate_chars(body.trim(), 200)
            )));
        }

        let reply: ChatResponse = response.json().await.map_err(|e| {
            ContribMergeError::Generation(format!("{repo}: invalid completion response: {e}"))
        })?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ContribMergeError::Generation(format!(
                "{repo}: model returned an empty description"
            )));
        }

        debug!(chars = text.len(), "description generated");
        Ok(text)
    }
}
