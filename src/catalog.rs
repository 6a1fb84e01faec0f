//! Loading the generated manifest and grouping its tracks into albums.

use std::path::Path;

use crate::manifest::types::{Track, TrackManifest, WaveformMap};

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub description: String,
    pub artwork: Option<String>,
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(|t| t.duration.max(0.0)).sum()
    }
}

/// Album titles share an id when they only differ in case or spacing.
pub fn album_id(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Groups tracks into albums in order of first appearance. Tracks within an
/// album are ordered by track number, then filename.
pub fn group_albums(tracks: &[Track]) -> Vec<Album> {
    let mut albums: Vec<Album> = Vec::new();

    for track in tracks {
        let id = album_id(&track.album);
        match albums.iter_mut().find(|a| a.id == id) {
            Some(album) => album.tracks.push(track.clone()),
            None => albums.push(Album {
                id,
                title: track.album.clone(),
                artist: track.artist.clone(),
                description: track.album_description.clone(),
                artwork: track.artwork.clone(),
                tracks: vec![track.clone()],
            }),
        }
    }

    for album in &mut albums {
        album.tracks.sort_by(|a, b| {
            a.track_number
                .cmp(&b.track_number)
                .then_with(|| a.filename.cmp(&b.filename))
        });
    }
    albums
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub albums: Vec<Album>,
    pub waveforms: WaveformMap,
    pub generated_at: String,
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads `name` from the manifest source. `Ok(None)` means the file does not exist.
async fn read_artifact(source: &str, name: &str) -> anyhow::Result<Option<String>> {
    if is_remote(source) {
        let url = format!("{}/{name}", source.trim_end_matches('/'));
        let response = reqwest::get(&url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch {url}: {e}"))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("Fetching {url} failed with status {status}"));
        }
        return Ok(Some(response.text().await?));
    }

    let path = Path::new(source).join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::anyhow!("Failed to read {}: {e}", path.display())),
    }
}

impl Catalog {
    /// Loads `tracks.json` and, when present, `waveforms.json` from a local
    /// directory or an http(s) base URL.
    ///
    /// # Errors
    /// - If `tracks.json` is missing, unreadable or malformed
    pub async fn load(source: &str) -> anyhow::Result<Self> {
        let tracks = read_artifact(source, "tracks.json").await?.ok_or_else(|| {
            anyhow::anyhow!("No tracks.json found in {source}. Run 'unjazz generate' first.")
        })?;
        let manifest: TrackManifest = serde_json::from_str(&tracks)
            .map_err(|e| anyhow::anyhow!("Invalid tracks.json in {source}: {e}"))?;

        let waveforms = match read_artifact(source, "waveforms.json").await {
            Ok(Some(content)) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed waveforms.json: {e}");
                WaveformMap::new()
            }),
            Ok(None) => {
                tracing::warn!("No waveforms.json in {source}, waveforms will be empty");
                WaveformMap::new()
            }
            Err(e) => {
                tracing::warn!("Could not load waveforms: {e}");
                WaveformMap::new()
            }
        };

        let albums = group_albums(&manifest.tracks);
        tracing::info!(
            "Loaded {} tracks in {} albums from {source}",
            manifest.tracks.len(),
            albums.len()
        );
        Ok(Self {
            albums,
            waveforms,
            generated_at: manifest.generated_at,
        })
    }

    pub fn waveform(&self, track_id: &str) -> &[f32] {
        self.waveforms
            .get(track_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn track_count(&self) -> usize {
        self.albums.iter().map(|a| a.tracks.len()).sum()
    }
}
