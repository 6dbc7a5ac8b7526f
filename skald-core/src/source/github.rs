// GitHub source: lists and reads repository contents via the REST contents API.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GitHubSourceConfig;
use crate::error::{SkaldError, SourceError};
use crate::types::{EntryType, SourceEntry};

use super::ContentSource;

/// Maximum retry attempts for rate-limited requests.
const MAX_RETRIES: u32 = 5;
/// Pause and wait for reset when remaining drops below this threshold.
const RATE_LIMIT_PAUSE_THRESHOLD: u32 = 5;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";

/// Remote repository source backed by `GET /repos/{owner}/{repo}/contents/{path}`.
///
/// Paths are repository-relative; the root is the empty string.
#[derive(Debug)]
pub struct GitHubSource {
    owner: String,
    repo: String,
    git_ref: Option<String>,
    token: Option<String>,
    api_base: String,
    client: Client,
    /// Remaining API calls before rate limit resets.
    rate_remaining: AtomicU32,
    /// Unix timestamp when the rate limit window resets.
    rate_reset: AtomicU64,
}

impl GitHubSource {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
    ) -> crate::error::Result<Self> {
        let client = crate::http::client(Some(Duration::from_secs(60)))
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(Self {
            owner: owner.into(),
            repo: repo.into(),
            git_ref: None,
            token,
            api_base: "https://api.github.com".to_string(),
            client,
            rate_remaining: AtomicU32::new(u32::MAX),
            rate_reset: AtomicU64::new(0),
        })
    }

    /// Build from an `owner/repo` or URL string and the `[source.github]` config.
    pub fn from_spec(
        spec: &str,
        git_ref: Option<String>,
        config: &GitHubSourceConfig,
    ) -> crate::error::Result<Self> {
        let (owner, repo) = parse_github_url(spec).ok_or_else(|| {
            SkaldError::Source(SourceError::NotFound(format!(
                "not a GitHub repository: {spec}"
            )))
        })?;
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_none() {
            debug!(env = %config.token_env, "No GitHub token; using anonymous rate limit");
        }
        let mut source = Self::new(owner, repo, token)?;
        source.git_ref = git_ref;
        source.api_base = config.api_base.trim_end_matches('/').to_string();
        Ok(source)
    }

    #[must_use]
    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// URL of the contents endpoint for a repository-relative path.
    fn contents_url(&self, path: &str) -> crate::error::Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| SourceError::Network(format!("bad api base '{}': {e}", self.api_base)))?;
        url.path_segments_mut()
            .map_err(|()| SourceError::Network(format!("bad api base '{}'", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        if let Some(git_ref) = &self.git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }
        Ok(url)
    }

    async fn api_get(&self, url: Url, accept: &str) -> crate::error::Result<Vec<u8>> {
        // Pre-check: if remaining is low, wait for reset
        self.wait_for_rate_reset().await;

        let mut delay = Duration::from_secs(1);

        for attempt in 0..=MAX_RETRIES {
            let mut req = self
                .client
                .get(url.clone())
                .header("Accept", accept)
                .header("X-GitHub-Api-Version", "2022-11-28");

            if let Some(token) = &self.token {
                req = req.header("Authorization", format!("Bearer {token}"));
            }

            debug!(url = %url, attempt, "GitHub API request");

            let resp = req
                .send()
                .await
                .map_err(|e| SourceError::Network(format!("GitHub API: {e}")))?;

            self.update_rate_limit(&resp);

            let status = resp.status().as_u16();
            if resp.status().is_success() {
                return resp
                    .bytes()
                    .await
                    .map(|b| b.to_vec())
                    .map_err(|e| SkaldError::Source(SourceError::Network(e.to_string())));
            }
            if status == 404 {
                return Err(SkaldError::Source(SourceError::NotFound(url.path().to_string())));
            }

            // Rate limited: retry with backoff
            if (status == 403 || status == 429) && attempt < MAX_RETRIES {
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map_or(delay, Duration::from_secs);
                warn!(
                    attempt,
                    status,
                    wait_secs = wait.as_secs(),
                    "Rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(Duration::from_secs(60));
                continue;
            }

            let body = resp.text().await.unwrap_or_default();
            return Err(SkaldError::Source(SourceError::Http { status, body }));
        }

        Err(SkaldError::Source(SourceError::Network(format!(
            "GitHub API: max retries ({MAX_RETRIES}) exceeded for {url}"
        ))))
    }

    fn update_rate_limit(&self, resp: &reqwest::Response) {
        if let Some(remaining) = header_u64(resp, "x-ratelimit-remaining") {
            let remaining = u32::try_from(remaining).unwrap_or(u32::MAX);
            self.rate_remaining.store(remaining, Ordering::Relaxed);
            if remaining < 10 {
                warn!(remaining, "GitHub API rate limit low");
            }
        }
        if let Some(reset) = header_u64(resp, "x-ratelimit-reset") {
            self.rate_reset.store(reset, Ordering::Relaxed);
        }
    }

    /// Sleep until the rate limit window resets if remaining is low.
    async fn wait_for_rate_reset(&self) {
        let remaining = self.rate_remaining.load(Ordering::Relaxed);
        if remaining > RATE_LIMIT_PAUSE_THRESHOLD {
            return;
        }
        let reset_at = self.rate_reset.load(Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if reset_at > now {
            let wait = reset_at - now + 1;
            warn!(remaining, wait_secs = wait, "Rate limit low, waiting for reset");
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }
    }
}

fn header_u64(resp: &reqwest::Response, name: &str) -> Option<u64> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

#[async_trait::async_trait]
impl ContentSource for GitHubSource {
    fn name(&self) -> &'static str {
        "github"
    }

    fn root_path(&self) -> &str {
        ""
    }

    fn root_name(&self) -> String {
        self.repo.clone()
    }

    async fn list_entries(&self, path: &str) -> Vec<SourceEntry> {
        let body = match self.contents_url(path) {
            Ok(url) => self.api_get(url, ACCEPT_JSON).await,
            Err(e) => Err(e),
        };
        match body.and_then(|b| parse_listing(&b)) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path, error = %e, "Cannot list GitHub directory");
                Vec::new()
            }
        }
    }

    async fn read_file(&self, path: &str) -> Option<String> {
        let body = match self.contents_url(path) {
            Ok(url) => self.api_get(url, ACCEPT_RAW).await,
            Err(e) => Err(e),
        };
        match body {
            Ok(bytes) => decode_file(path, bytes),
            Err(e) => {
                warn!(path, error = %e, "Cannot read GitHub file");
                None
            }
        }
    }
}

// ── GitHub API Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GhContent {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Raw file bytes as text; non-UTF-8 content reads as absent, like a local file.
fn decode_file(path: &str, bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(_) => {
            warn!(path, "GitHub file is not valid UTF-8");
            None
        }
    }
}

/// Parse a contents-API directory listing. A single object (the path named a
/// file) yields no entries.
fn parse_listing(body: &[u8]) -> crate::error::Result<Vec<SourceEntry>> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| SourceError::Network(format!("Parse response: {e}")))?;
    if !value.is_array() {
        return Ok(Vec::new());
    }
    let items: Vec<GhContent> = serde_json::from_value(value)
        .map_err(|e| SourceError::Network(format!("Parse response: {e}")))?;
    Ok(items
        .into_iter()
        .map(|item| SourceEntry {
            entry_type: match item.kind.as_str() {
                "file" => EntryType::File,
                "dir" => EntryType::Dir,
                _ => EntryType::Other,
            },
            name: item.name,
            path: item.path,
        })
        .collect())
}

/// Extract `(owner, repo)` from `owner/repo`, an HTTPS URL or an SSH remote.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let url = url.trim().trim_end_matches('/');

    // SSH: git@github.com:owner/repo.git, HTTPS: https://github.com/owner/repo.git
    let rest = if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else if let Some((_, after)) = url.split_once("github.com/") {
        after
    } else if url.contains("://") || url.contains('@') {
        return None;
    } else {
        url
    };

    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut parts = rest.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    Some((owner.to_string(), repo.to_string()))
}

// ── Tests ───────────────────────────────────────────────────────────
