//! GitHub REST client implementing [`Platform`].
//!
//! One request per trait method (plus pagination) and no retries. A
//! client-wide timeout turns a stalled call into an upstream error.

use crate::error::{GateError, Result};
use crate::github::types::*;
use crate::github::Platform;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";

/// Connection settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// API root, e.g. `https://api.github.com` or `https://ghe.example.com/api/v3`.
    pub base_url: String,
    pub token: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Token-authenticated GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

// ── Wire types ──

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    #[serde(default)]
    commit: Option<CommitDetail>,
    #[serde(default)]
    parents: Vec<ShaRef>,
    #[serde(default)]
    files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    committer: Option<Signature>,
    #[serde(default)]
    author: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    status: CompareStatus,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    id: u64,
    /// Null when the reviewer's account was deleted.
    #[serde(default)]
    user: Option<UserRef>,
    state: String,
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    commit_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl From<CommitResponse> for Commit {
    fn from(raw: CommitResponse) -> Self {
        let timestamp = raw.commit.and_then(|c| {
            c.committer
                .and_then(|s| s.date)
                .or_else(|| c.author.and_then(|s| s.date))
        });
        Commit {
            sha: raw.sha,
            timestamp,
            parents: raw.parents.into_iter().map(|p| p.sha).collect(),
            files: raw
                .files
                .map(|files| files.into_iter().map(|f| f.filename).collect()),
        }
    }
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| GateError::upstream("configure client", "token contains invalid characters"))?;
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("gatectl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GateError::upstream("configure client", e.to_string()))?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| GateError::upstream("configure client", format!("invalid API URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build an API URL from path segments; each segment is percent-encoded.
    fn url(&self, operation: &'static str, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GateError::upstream(operation, "API URL cannot have a path"))?
            .pop_if_empty()
            .extend(segments.iter().flat_map(|s| s.split('/')).filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;
        Self::check_status(operation, response).await
    }

    fn transport_error(&self, operation: &'static str, e: reqwest::Error) -> GateError {
        if e.is_timeout() {
            GateError::upstream(operation, format!("timed out after {}s", self.timeout_secs))
        } else {
            GateError::upstream(operation, e.to_string())
        }
    }

    async fn check_status(operation: &'static str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(GateError::upstream_status(operation, status.as_u16(), message))
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &'static str, url: Url) -> Result<T> {
        let response = self.send(operation, self.request(Method::GET, url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| self.transport_error(operation, e))
    }

    async fn get_commit_page(&self, operation: &'static str, url: &Url, page: usize) -> Result<CommitResponse> {
        let request = self
            .request(Method::GET, url.clone())
            .query(&[("per_page", PER_PAGE), ("page", page)]);
        let response = self.send(operation, request).await?;
        response
            .json()
            .await
            .map_err(|e| self.transport_error(operation, e))
    }

    /// Fetch every page of a list endpoint.
    async fn get_all_pages<T: DeserializeOwned>(&self, operation: &'static str, url: Url) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1usize;
        loop {
            let request = self
                .request(Method::GET, url.clone())
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let response = self.send(operation, request).await?;
            let batch: Vec<T> = response
                .json()
                .await
                .map_err(|e| self.transport_error(operation, e))?;
            let done = batch.len() < PER_PAGE;
            all.extend(batch);
            if done {
                return Ok(all);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl Platform for GitHubClient {
    async fn fetch_file_at_ref(&self, repo: &str, path: &str, git_ref: &str) -> Result<Option<Vec<u8>>> {
        const OP: &str = "fetch_file_at_ref";
        let url = self.url(OP, &["repos", repo, "contents", path])?;
        let response = self
            .request(Method::GET, url)
            .query(&[("ref", git_ref)])
            .send()
            .await
            .map_err(|e| self.transport_error(OP, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_status(OP, response).await?;
        let body: ContentResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(OP, e))?;
        decode_content(&body).map(Some)
    }

    async fn list_commits(&self, repo: &str, pr_number: u64) -> Result<Vec<Commit>> {
        const OP: &str = "list_commits";
        let number = pr_number.to_string();
        let url = self.url(OP, &["repos", repo, "pulls", &number, "commits"])?;
        let raw: Vec<CommitResponse> = self.get_all_pages(OP, url).await?;
        Ok(raw
            .into_iter()
            .map(|c| Commit {
                files: None,
                ..Commit::from(c)
            })
            .collect())
    }

    async fn get_commit(&self, repo: &str, sha: &str) -> Result<Commit> {
        const OP: &str = "get_commit";
        // Ref names such as `release/1.2` stay unescaped, as the API expects
        let url = self.url(OP, &["repos", repo, "commits", sha])?;

        // Large diffs are split across pages; every page repeats the commit
        // metadata with the next slice of files.
        let first = self.get_commit_page(OP, &url, 1).await?;
        let mut done = is_last_file_page(&first);
        let mut commit = Commit::from(first);
        commit.files.get_or_insert_with(Vec::new);

        let mut page = 1usize;
        while !done {
            page += 1;
            let next = self.get_commit_page(OP, &url, page).await?;
            done = append_file_page(&mut commit, next);
        }
        Ok(commit)
    }

    async fn compare_refs(&self, repo: &str, base: &str, head: &str) -> Result<CompareStatus> {
        const OP: &str = "compare_refs";
        let range = format!("{}...{}", base, head);
        let url = self.url(OP, &["repos", repo, "compare", &range])?;
        let raw: CompareResponse = self.get_json(OP, url).await?;
        Ok(raw.status)
    }

    async fn list_reviews(&self, repo: &str, pr_number: u64) -> Result<Vec<Review>> {
        const OP: &str = "list_reviews";
        let number = pr_number.to_string();
        let url = self.url(OP, &["repos", repo, "pulls", &number, "reviews"])?;
        let raw: Vec<ReviewResponse> = self.get_all_pages(OP, url).await?;

        let mut reviews = Vec::with_capacity(raw.len());
        for r in raw {
            let Some(user) = r.user else {
                tracing::debug!(review_id = r.id, "Skipping review from a deleted account");
                continue;
            };
            let Some(state) = ReviewState::from_str_loose(&r.state) else {
                tracing::warn!(review_id = r.id, state = %r.state, "Skipping review with unknown state");
                continue;
            };
            reviews.push(Review {
                id: r.id,
                login: user.login,
                state,
                submitted_at: r.submitted_at,
                commit_id: r.commit_id.unwrap_or_default(),
            });
        }
        Ok(reviews)
    }

    async fn list_changed_files(&self, repo: &str, pr_number: u64) -> Result<Vec<String>> {
        const OP: &str = "list_changed_files";
        let number = pr_number.to_string();
        let url = self.url(OP, &["repos", repo, "pulls", &number, "files"])?;
        let raw: Vec<FileEntry> = self.get_all_pages(OP, url).await?;
        Ok(raw.into_iter().map(|f| f.filename).collect())
    }

    async fn list_org_teams(&self, org: &str) -> Result<Vec<TeamInfo>> {
        const OP: &str = "list_org_teams";
        let url = self.url(OP, &["orgs", org, "teams"])?;
        self.get_all_pages(OP, url).await
    }

    async fn list_team_members(&self, team_id: u64) -> Result<Vec<String>> {
        const OP: &str = "list_team_members";
        let id = team_id.to_string();
        let url = self.url(OP, &["teams", &id, "members"])?;
        let raw: Vec<UserRef> = self.get_all_pages(OP, url).await?;
        Ok(raw.into_iter().map(|u| u.login).collect())
    }

    async fn post_status(&self, repo: &str, sha: &str, status: &StatusReport) -> Result<()> {
        const OP: &str = "post_status";
        let url = self.url(OP, &["repos", repo, "statuses", sha])?;
        let body = serde_json::json!({
            "state": status.state,
            "context": status.context,
            "description": status.description,
        });
        self.send(OP, self.request(Method::POST, url).json(&body))
            .await?;
        Ok(())
    }

    async fn dismiss_review(&self, repo: &str, pr_number: u64, review_id: u64, reason: &str) -> Result<()> {
        const OP: &str = "dismiss_review";
        let number = pr_number.to_string();
        let id = review_id.to_string();
        let url = self.url(
            OP,
            &["repos", repo, "pulls", &number, "reviews", &id, "dismissals"],
        )?;
        let body = serde_json::json!({ "message": reason, "event": "DISMISS" });
        self.send(OP, self.request(Method::PUT, url).json(&body))
            .await?;
        Ok(())
    }
}

fn is_last_file_page(raw: &CommitResponse) -> bool {
    raw.files.as_ref().map_or(0, Vec::len) < PER_PAGE
}

/// Add one further page of a commit's files; true once the last page is in.
fn append_file_page(commit: &mut Commit, raw: CommitResponse) -> bool {
    let done = is_last_file_page(&raw);
    commit
        .files
        .get_or_insert_with(Vec::new)
        .extend(raw.files.unwrap_or_default().into_iter().map(|f| f.filename));
    done
}

/// Decode the content API's base64 payload (wrapped at 60 columns).
fn decode_content(body: &ContentResponse) -> Result<Vec<u8>> {
    if !body.encoding.is_empty() && body.encoding != "base64" {
        return Err(GateError::upstream(
            "fetch_file_at_ref",
            format!("unsupported content encoding '{}'", body.encoding),
        ));
    }
    let compact: String = body.content.split_whitespace().collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| GateError::upstream("fetch_file_at_ref", format!("invalid base64 content: {}", e)))
}
