//! Configuration file management for unjazz.
//!
//! This module handles loading configuration from the TOML file in the user's
//! config directory and layering the generator's environment variables on top.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest generator settings (`[manifest]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManifestConfig {
    /// Directory containing one sub-directory per album
    pub albums_dir: PathBuf,
    /// Output directory for tracks.json, waveforms.json and waveforms/<id>.json
    pub metadata_dir: PathBuf,
    /// URL prefix the static site is served under (e.g. "/unjazz")
    pub base_path: String,
    /// GitHub repository as "owner/repo", used when uploading to releases
    pub github_repo: String,
    /// Token used for the GitHub release API. Prefer the GITHUB_TOKEN variable.
    pub github_token: String,
    /// Release tag the audio assets are attached to
    pub release_tag: String,
    /// Upload audio and artwork to a GitHub release instead of linking static paths
    pub use_github_releases: bool,
    /// Number of amplitude samples stored per track
    pub waveform_samples: usize,
    /// Delete release assets that no longer correspond to a local file
    pub prune_orphans: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            albums_dir: PathBuf::from("./public/albums"),
            metadata_dir: PathBuf::from("./public/metadata"),
            base_path: default_base_path(),
            github_repo: String::new(),
            github_token: String::new(),
            release_tag: "v1.0".to_string(),
            use_github_releases: false,
            waveform_samples: 200,
            prune_orphans: true,
        }
    }
}

/// Relay server settings (`[relay]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Socket address the relay listens on
    pub bind: String,
    /// Regular expression an upstream URL must match to be relayed
    pub allow_pattern: String,
    /// max-age (seconds) advertised in Cache-Control for relayed responses
    pub cache_max_age: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            allow_pattern: default_allow_pattern(),
            cache_max_age: 3600,
        }
    }
}

/// Waveform drawing constants (`[player.waveform]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveformConfig {
    /// Narrowest bar allowed, in terminal columns
    pub min_bar_width: f32,
    /// Gap between bars, in terminal columns
    pub bar_gap: f32,
    /// Fraction of the half-height a full-scale sample reaches
    pub height_scale: f32,
    /// Color of bars already played ("#rrggbb" or a color name)
    pub active_color: String,
    /// Color of bars not yet played
    pub dimmed_color: String,
    /// Background behind the bars
    pub background_color: String,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            min_bar_width: 2.0,
            bar_gap: 1.0,
            height_scale: 0.9,
            active_color: "#ff5500".to_string(),
            dimmed_color: "#4d4d4d".to_string(),
            background_color: "#000000".to_string(),
        }
    }
}

/// Terminal player settings (`[player]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Directory or http(s) base URL holding tracks.json and waveforms.json
    pub manifest_source: String,
    /// Local directory that `base_path` maps onto when track URLs are site paths
    pub site_root: PathBuf,
    /// URL prefix stripped from site paths before resolving them under `site_root`
    pub base_path: String,
    /// Relay endpoint used for remote URLs matching the relay allow pattern
    pub relay_url: Option<String>,
    /// How often the playback position is published while playing
    pub poll_interval_ms: u64,
    /// Minimum spacing between two accepted waveform seeks on one row
    pub seek_debounce_ms: u64,
    /// Initial volume (0.0 - 1.0)
    pub volume: f32,
    #[serde(default)]
    pub waveform: WaveformConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            manifest_source: "./public/metadata".to_string(),
            site_root: PathBuf::from("./public"),
            base_path: default_base_path(),
            relay_url: None,
            poll_interval_ms: 100,
            seek_debounce_ms: 300,
            volume: 1.0,
            waveform: WaveformConfig::default(),
        }
    }
}

fn default_base_path() -> String {
    "/unjazz".to_string()
}

fn default_allow_pattern() -> String {
    r"^https://github\.com/[\w-]+/[\w-]+/releases/download/".to_string()
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnjazzConfig {
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl UnjazzConfig {
    /// Loads configuration from the user's config directory and applies
    /// environment overrides.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parses a configuration file without consulting the environment.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {e}", path.display())
        })?;
        let config: UnjazzConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Applies BASE_PATH, GITHUB_REPO, GITHUB_TOKEN, RELEASE_TAG and
    /// USE_GITHUB_RELEASES on top of the file values.
    ///
    /// Empty variables are ignored. BASE_PATH applies to both the generator and
    /// the player so that generated site paths resolve locally.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_path) = get("BASE_PATH") {
            self.manifest.base_path = base_path.clone();
            self.player.base_path = base_path;
        }
        if let Some(repo) = get("GITHUB_REPO") {
            self.manifest.github_repo = repo;
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.manifest.github_token = token;
        }
        if let Some(tag) = get("RELEASE_TAG") {
            self.manifest.release_tag = tag;
        }
        if let Some(flag) = get("USE_GITHUB_RELEASES") {
            self.manifest.use_github_releases = flag.trim() == "true";
        }
    }
}

/// Retrieves the path to the config file, creating its directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home.join(".config").join("unjazz");
    fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create config directory: {e}"))?;
    Ok(config_dir.join("unjazz.toml"))
}
