//! GitHub release API client.
//!
//! Covers the handful of REST calls the generator needs: look a release up by
//! tag (creating it when missing), list its assets, upload and delete assets.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;

const API_BASE: &str = "https://api.github.com";
const UPLOADS_BASE: &str = "https://uploads.github.com";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: String,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

/// MIME type sent with an uploaded asset.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Turns a failed API response into a readable error.
fn api_error(status: StatusCode, body: &str, action: &str) -> anyhow::Error {
    let message = match status.as_u16() {
        401 => "GitHub token is invalid or expired. Set GITHUB_TOKEN to a token with repo access.".to_string(),
        403 => format!("GitHub refused to {action}. Check the token's permissions and rate limit."),
        404 => format!("GitHub could not find the resource needed to {action}. Check GITHUB_REPO."),
        422 => format!("GitHub rejected the request to {action}: {body}"),
        500 | 502 | 503 | 504 => "GitHub API is experiencing issues. Please try again later.".to_string(),
        _ => format!("GitHub API error while trying to {action} (status {status}): {body}"),
    };
    anyhow::anyhow!(message)
}

fn network_error(e: reqwest::Error) -> anyhow::Error {
    if e.is_connect() {
        anyhow::anyhow!("Failed to connect to GitHub. Check your internet connection.")
    } else if e.is_timeout() {
        anyhow::anyhow!("Request to GitHub timed out.")
    } else {
        anyhow::anyhow!("GitHub network error: {e}")
    }
}

pub struct GitHubReleases {
    client: reqwest::Client,
    api_base: String,
    uploads_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubReleases {
    /// Creates a client for `owner/repo`.
    ///
    /// # Errors
    /// - If `repository` is not of the form `owner/repo`
    /// - If `token` is empty
    pub fn new(repository: &str, token: &str) -> anyhow::Result<Self> {
        let (owner, repo) = repository
            .trim()
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| {
                anyhow::anyhow!("Invalid GitHub repository '{repository}'. Expected 'owner/repo'")
            })?;
        if token.trim().is_empty() {
            return Err(anyhow::anyhow!("GitHub token is not configured"));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("unjazz/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            uploads_base: UPLOADS_BASE.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.trim().to_string(),
        })
    }

    /// Points the client at a local stand-in server.
    #[cfg(test)]
    pub(crate) fn with_endpoints(mut self, api_base: &str, uploads_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.uploads_base = uploads_base.trim_end_matches('/').to_string();
        self
    }

    #[cfg(test)]
    pub(crate) fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn repo_url(&self, base: &str, rest: &str) -> String {
        format!("{base}/repos/{}/{}/{rest}", self.owner, self.repo)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        tracing::debug!("GitHub API call: {method} {url}");
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        action: &str,
    ) -> anyhow::Result<reqwest::Response> {
        let response = builder.send().await.map_err(network_error)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(api_error(status, &body, action))
    }

    /// Fetches the release for `tag`, creating it when it does not exist.
    pub async fn ensure_release(&self, tag: &str) -> anyhow::Result<Release> {
        let url = self.repo_url(
            &self.api_base,
            &format!("releases/tags/{}", urlencoding::encode(tag)),
        );
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(network_error)?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to parse GitHub release: {e}"));
        }
        if response.status() != StatusCode::NOT_FOUND {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body, "look up the release"));
        }

        tracing::info!("Release {tag} not found, creating it");
        let payload = CreateRelease {
            tag_name: tag,
            name: format!("Audio Files {tag}"),
            body: "Audio files for the unjazz music player",
            draft: false,
            prerelease: false,
        };
        let url = self.repo_url(&self.api_base, "releases");
        self.send(
            self.request(reqwest::Method::POST, url).json(&payload),
            "create the release",
        )
        .await?
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse created GitHub release: {e}"))
    }

    /// Lists every asset attached to a release, following pagination.
    pub async fn list_assets(&self, release_id: u64) -> anyhow::Result<Vec<ReleaseAsset>> {
        let mut assets = Vec::new();
        for page in 1.. {
            let url = self.repo_url(
                &self.api_base,
                &format!("releases/{release_id}/assets?per_page={PAGE_SIZE}&page={page}"),
            );
            let batch: Vec<ReleaseAsset> = self
                .send(self.request(reqwest::Method::GET, url), "list release assets")
                .await?
                .json()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to parse release assets: {e}"))?;
            let done = batch.len() < PAGE_SIZE;
            assets.extend(batch);
            if done {
                break;
            }
        }
        Ok(assets)
    }

    /// Uploads `path` as asset `name`.
    pub async fn upload_asset(
        &self,
        release_id: u64,
        name: &str,
        path: &Path,
    ) -> anyhow::Result<ReleaseAsset> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        let url = self.repo_url(
            &self.uploads_base,
            &format!(
                "releases/{release_id}/assets?name={}",
                urlencoding::encode(name)
            ),
        );
        self.send(
            self.request(reqwest::Method::POST, url)
                .header("Content-Type", content_type_for(path))
                .body(data),
            "upload a release asset",
        )
        .await?
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse uploaded asset: {e}"))
    }

    pub async fn delete_asset(&self, asset_id: u64) -> anyhow::Result<()> {
        let url = self.repo_url(&self.api_base, &format!("releases/assets/{asset_id}"));
        self.send(
            self.request(reqwest::Method::DELETE, url),
            "delete a release asset",
        )
        .await?;
        Ok(())
    }
}
