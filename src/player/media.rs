//! Fetching track bytes from the site root, the network or the relay.

use std::path::PathBuf;

use regex::Regex;

use crate::config::{PlayerConfig, RelayConfig};

/// Where a track URL points.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaLocation {
    Remote(String),
    Local(PathBuf),
}

pub struct MediaFetcher {
    client: reqwest::Client,
    site_root: PathBuf,
    base_path: String,
    relay: Option<(String, Regex)>,
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl MediaFetcher {
    /// # Errors
    /// - If a relay is configured and its allow pattern is invalid
    pub fn new(player: &PlayerConfig, relay: &RelayConfig) -> anyhow::Result<Self> {
        let relay = match player.relay_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                let pattern = Regex::new(&relay.allow_pattern).map_err(|e| {
                    anyhow::anyhow!("Invalid relay allow_pattern '{}': {e}", relay.allow_pattern)
                })?;
                Some((url.trim_end_matches('/').to_string(), pattern))
            }
            _ => None,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            site_root: player.site_root.clone(),
            base_path: player.base_path.trim_end_matches('/').to_string(),
            relay,
        })
    }

    /// Maps a manifest URL to what will actually be read.
    pub fn resolve(&self, url: &str) -> MediaLocation {
        if is_remote(url) {
            return match &self.relay {
                Some((relay, pattern)) if pattern.is_match(url) => MediaLocation::Remote(format!(
                    "{relay}/?url={}",
                    urlencoding::encode(url)
                )),
                _ => MediaLocation::Remote(url.to_string()),
            };
        }

        let site_path = if self.base_path.is_empty() {
            url
        } else {
            url.strip_prefix(&self.base_path)
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
                .unwrap_or(url)
        };
        MediaLocation::Local(self.site_root.join(site_path.trim_start_matches('/')))
    }

    /// Reads the whole media file behind `url`.
    ///
    /// # Errors
    /// - If the local file cannot be read
    /// - If the HTTP request fails or answers with a non-success status
    pub async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        match self.resolve(url) {
            MediaLocation::Local(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display())),
            MediaLocation::Remote(remote) => {
                tracing::debug!("Fetching media from {remote}");
                let response = self
                    .client
                    .get(&remote)
                    .send()
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to fetch {remote}: {e}"))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(anyhow::anyhow!("Fetching {remote} failed with status {status}"));
                }
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}
