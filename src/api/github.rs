//! GitHub contents API client for the shared data file.
//!
//! The document lives at `repos/{owner}/{repo}/contents/{path}` on a branch.
//! GitHub returns the file base64-encoded together with its blob `sha`, which
//! serves as the revision tag: a `PUT` must carry the `sha` it replaces.

use super::{default_commit_message, short_revision, PushOutcome, RemoteDocument, RemoteMetadata, RemoteStore};
use crate::libs::config::SyncConfig;
use crate::libs::error::{SyncError, SyncResult};
use crate::libs::http::{Http, TransportPolicy, PUSH_TIMEOUT, STORE_TIMEOUT};
use base64::prelude::*;
use chrono::{DateTime, Local};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

/// Summary shown by `lru-tracker sync status`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub repo: String,
    pub file_path: String,
    pub branch: String,
    pub last_revision: Option<String>,
    pub last_sync: Option<DateTime<Local>>,
    pub has_token: bool,
}

impl SyncStatus {
    pub fn last_revision_display(&self) -> String {
        self.last_revision.as_deref().map(short_revision).unwrap_or_else(|| "Never".to_string())
    }

    pub fn last_sync_display(&self) -> String {
        self.last_sync
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Never".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct GitHubStore {
    http: Http,
    api_base: String,
    owner: String,
    repo: String,
    path: String,
    branch: String,
    token: Option<String>,
    cached_revision: Option<String>,
}

impl GitHubStore {
    pub fn new(config: &SyncConfig, token: Option<String>, policy: TransportPolicy) -> SyncResult<Self> {
        if !policy.permits(&config.api_base) {
            return Err(SyncError::InsecureTransport(config.api_base.clone()));
        }

        Ok(Self {
            http: Http::new(policy),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: config.repo_owner.clone(),
            repo: config.repo_name.clone(),
            path: config.data_file_path.trim_start_matches('/').to_string(),
            branch: config.branch.clone(),
            token: token.filter(|t| !t.trim().is_empty()),
            cached_revision: None,
        })
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.cached_revision = revision;
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn status(&self, last_sync: Option<DateTime<Local>>) -> SyncStatus {
        SyncStatus {
            repo: format!("{}/{}", self.owner, self.repo),
            file_path: self.path.clone(),
            branch: self.branch.clone(),
            last_revision: self.cached_revision.clone(),
            last_sync,
            has_token: self.has_token(),
        }
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.owner, self.repo)
    }

    fn contents_url(&self) -> String {
        format!("{}/contents/{}", self.repo_url(), self.path)
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, GITHUB_ACCEPT);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn get_contents(&self) -> SyncResult<Option<ContentResponse>> {
        let request = self
            .http
            .client()
            .get(self.contents_url())
            .query(&[("ref", self.branch.as_str())])
            .timeout(STORE_TIMEOUT);
        let res = self.with_headers(request).send().await?;

        if res.status() == StatusCode::NOT_FOUND {
            debug!("{} does not exist on {}", self.path, self.branch);
            return Ok(None);
        }
        let res = ensure_success(res).await?;

        Ok(Some(res.json::<ContentResponse>().await?))
    }
}

async fn ensure_success(res: Response) -> SyncResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    Err(SyncError::RemoteStore {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    })
}

/// Decodes GitHub's line-wrapped base64 into JSON.
pub fn decode_content(encoded: &str) -> SyncResult<Value> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD.decode(compact)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn encode_content(content: &Value) -> SyncResult<String> {
    let pretty = serde_json::to_string_pretty(content)?;
    Ok(BASE64_STANDARD.encode(pretty.as_bytes()))
}

impl RemoteStore for GitHubStore {
    async fn read_revision(&self) -> SyncResult<Option<RemoteMetadata>> {
        Ok(self.get_contents().await?.map(|c| RemoteMetadata {
            revision: c.sha,
            size: c.size,
        }))
    }

    async fn pull(&mut self) -> SyncResult<Option<RemoteDocument>> {
        let Some(contents) = self.get_contents().await? else {
            return Ok(None);
        };

        let encoded = contents.content.unwrap_or_default();
        let content = decode_content(&encoded)?;

        self.cached_revision = Some(contents.sha.clone());
        info!("Pulled {} at {}", self.path, short_revision(&contents.sha));

        Ok(Some(RemoteDocument {
            content,
            revision: contents.sha,
        }))
    }

    async fn push(&mut self, content: &Value, message: Option<&str>) -> SyncResult<PushOutcome> {
        let message = message.map(str::to_string).unwrap_or_else(default_commit_message);
        let body = PutRequest {
            message: &message,
            content: encode_content(content)?,
            branch: &self.branch,
            sha: self.cached_revision.as_deref(),
        };

        let request = self.http.client().put(self.contents_url()).json(&body).timeout(PUSH_TIMEOUT);
        let res = self.with_headers(request).send().await?;

        let status = res.status();
        if status == StatusCode::CONFLICT || status == StatusCode::PRECONDITION_FAILED {
            warn!("Push rejected with {}: remote revision moved", status);
            return Ok(PushOutcome::Conflict);
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let text = res.text().await.unwrap_or_default();
            if text.to_lowercase().contains("sha") {
                warn!("Push rejected with 422: {}", text);
                return Ok(PushOutcome::Conflict);
            }
            return Err(SyncError::RemoteStore {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unprocessable Entity").to_string(),
            });
        }

        let res = ensure_success(res).await?;
        let revision = res.json::<PutResponse>().await?.content.sha;
        self.cached_revision = Some(revision.clone());
        info!("Pushed {} as {}", self.path, short_revision(&revision));

        Ok(PushOutcome::Committed { revision })
    }

    async fn test_connection(&self) -> (bool, String) {
        let repo = format!("{}/{}", self.owner, self.repo);
        let request = self.http.client().get(self.repo_url()).timeout(STORE_TIMEOUT);

        match self.with_headers(request).send().await {
            Ok(res) if res.status().is_success() => (true, format!("Connected to {}", repo)),
            Ok(res) if res.status() == StatusCode::NOT_FOUND => (false, format!("Repository not found: {}", repo)),
            Ok(res) if res.status() == StatusCode::UNAUTHORIZED => (false, "Authentication failed - check your token".to_string()),
            Ok(res) => {
                let status = res.status();
                (
                    false,
                    format!("HTTP Error {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown")),
                )
            }
            Err(e) => (false, format!("Connection error: {}", e)),
        }
    }

    fn cached_revision(&self) -> Option<&str> {
        self.cached_revision.as_deref()
    }

    fn set_cached_revision(&mut self, revision: Option<String>) {
        self.cached_revision = revision;
    }
}
