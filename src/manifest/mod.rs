//! Manifest generation.
//!
//! Walks the albums directory, reads tags, computes (or reuses) waveforms and
//! writes `tracks.json` plus `waveforms.json`. In release mode the audio and
//! artwork files are reconciled with a GitHub release and the manifest links
//! to the release downloads instead of static site paths.

pub mod metadata;
pub mod reconcile;
pub mod release;
pub mod scan;
pub mod tools;
pub mod types;
pub mod waveform;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use console::style;

use crate::config::ManifestConfig;
use metadata::extract_metadata;
use reconcile::{asset_name, plan_assets, ExpectedAsset};
use release::GitHubReleases;
use scan::{scan_albums, AlbumSource};
use types::{sort_tracks, Track, TrackManifest, TrackMetadata, WaveformMap};
use waveform::{fallback_waveform, WaveformGenerator, WaveformOrigin};

/// Totals reported once generation finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateSummary {
    pub tracks: usize,
    pub albums: usize,
    pub skipped: usize,
    pub manifest_path: PathBuf,
}

/// A track whose metadata could be read, before URLs are known.
struct PendingTrack {
    album_dir: String,
    path: PathBuf,
    metadata: TrackMetadata,
}

/// Release asset download URLs by asset name.
type AssetUrls = HashMap<String, String>;

fn static_url(base_path: &str, album_dir: &str, file: &str) -> String {
    format!("{base_path}/albums/{album_dir}/{file}")
}

fn waveform_url(base_path: &str, id: &str) -> String {
    format!("{base_path}/metadata/waveforms/{id}.json")
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Uploads, replaces and prunes release assets so that every expected file
/// is present. Returns the download URL of every asset that ended up present.
async fn sync_release(
    config: &ManifestConfig,
    client: &GitHubReleases,
    expected: &[ExpectedAsset],
) -> anyhow::Result<AssetUrls> {
    let release = client.ensure_release(&config.release_tag).await?;
    let existing = client.list_assets(release.id).await?;
    let plan = plan_assets(expected, &existing);

    tracing::info!(
        "Release {}: keep {}, upload {}, replace {}, orphans {}",
        release.tag_name,
        plan.keep.len(),
        plan.upload.len(),
        plan.replace.len(),
        plan.orphans.len()
    );
    if plan.is_noop() {
        println!("  {} release {} up to date", style("✓").green(), release.tag_name);
    }

    let mut urls: AssetUrls = plan
        .keep
        .iter()
        .map(|a| (a.name.clone(), a.browser_download_url.clone()))
        .collect();

    let mut uploads: Vec<&ExpectedAsset> = plan.upload.iter().collect();
    for (old, wanted) in &plan.replace {
        println!("  {} replacing {}", style("↻").yellow(), wanted.name);
        match client.delete_asset(old.id).await {
            Ok(()) => uploads.push(wanted),
            Err(e) => {
                // The outdated asset is still downloadable
                tracing::error!("Failed to delete outdated asset {}: {e}", old.name);
                urls.insert(wanted.name.clone(), old.browser_download_url.clone());
            }
        }
    }

    for wanted in uploads {
        println!("  {} uploading {}", style("↑").cyan(), wanted.name);
        match client
            .upload_asset(release.id, &wanted.name, &wanted.path)
            .await
        {
            Ok(asset) => {
                // GitHub may sanitize the stored name, so key by the requested one
                if asset.name != wanted.name {
                    tracing::debug!("Release stored {} as {}", wanted.name, asset.name);
                }
                urls.insert(wanted.name.clone(), asset.browser_download_url);
            }
            Err(e) => {
                println!("  {} failed to upload {}", style("✗").red(), wanted.name);
                tracing::error!("Failed to upload {}: {e}", wanted.name);
            }
        }
    }

    if config.prune_orphans {
        for orphan in &plan.orphans {
            println!("  {} deleting orphan {}", style("−").dim(), orphan.name);
            if let Err(e) = client.delete_asset(orphan.id).await {
                tracing::error!("Failed to delete orphaned asset {}: {e}", orphan.name);
            }
        }
    }

    Ok(urls)
}

/// Reads metadata for every audio file, skipping unreadable ones.
fn collect_tracks(albums: &[AlbumSource]) -> (Vec<PendingTrack>, usize) {
    let mut pending = Vec::new();
    let mut skipped = 0;

    for album in albums {
        println!("{} {}", style("▸").bold(), style(&album.name).bold());
        for file in &album.audio_files {
            let path = album.path.join(file);
            match extract_metadata(&path, &album.name) {
                Ok(metadata) => pending.push(PendingTrack {
                    album_dir: album.name.clone(),
                    path,
                    metadata,
                }),
                Err(e) => {
                    skipped += 1;
                    println!("  {} {file}: unreadable, skipped", style("✗").red());
                    tracing::error!("Error reading metadata from {}: {e}", path.display());
                }
            }
        }
    }

    (pending, skipped)
}

fn expected_assets(albums: &[AlbumSource], pending: &[PendingTrack]) -> Vec<ExpectedAsset> {
    let artwork = albums.iter().filter_map(|album| {
        let file = album.artwork.as_ref()?;
        let path = album.path.join(file);
        Some(ExpectedAsset {
            name: asset_name(&album.name, file),
            size: file_size(&path),
            path,
        })
    });
    let audio = pending.iter().map(|t| ExpectedAsset {
        name: asset_name(&t.album_dir, &t.metadata.filename),
        size: file_size(&t.path),
        path: t.path.clone(),
    });
    artwork.chain(audio).collect()
}

/// Builds the release client when release mode is usable.
fn release_client(config: &ManifestConfig) -> Option<GitHubReleases> {
    match GitHubReleases::new(&config.github_repo, &config.github_token) {
        Ok(client) => Some(client),
        Err(e) => {
            println!(
                "{} GitHub credentials not configured, skipping upload ({e})",
                style("!").yellow()
            );
            tracing::warn!("GitHub credentials not configured, skipping upload: {e}");
            None
        }
    }
}

/// Generates the manifest described by `config`.
///
/// # Errors
/// - If the albums directory cannot be read
/// - If the release cannot be looked up, created or listed
/// - If an output file cannot be written
pub async fn generate_manifest(config: &ManifestConfig) -> anyhow::Result<GenerateSummary> {
    let generator = WaveformGenerator::new(
        config.metadata_dir.join("waveforms"),
        config.waveform_samples,
    );
    let client = if config.use_github_releases {
        release_client(config)
    } else {
        None
    };
    generate_with(config, &generator, client.as_ref()).await
}

pub async fn generate_with(
    config: &ManifestConfig,
    generator: &WaveformGenerator,
    client: Option<&GitHubReleases>,
) -> anyhow::Result<GenerateSummary> {
    tracing::info!("Generating manifest from {}", config.albums_dir.display());

    std::fs::create_dir_all(config.metadata_dir.join("waveforms")).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create {}: {e}",
            config.metadata_dir.display()
        )
    })?;

    let albums = scan_albums(&config.albums_dir)?;
    let (pending, mut skipped) = collect_tracks(&albums);

    let release_urls = match (config.use_github_releases, client) {
        (true, Some(client)) => {
            Some(sync_release(config, client, &expected_assets(&albums, &pending)).await?)
        }
        (true, None) => Some(AssetUrls::new()),
        (false, _) => None,
    };

    let artwork_urls: HashMap<&str, Option<String>> = albums
        .iter()
        .map(|album| {
            let url = album.artwork.as_ref().and_then(|file| match &release_urls {
                Some(urls) => urls.get(&asset_name(&album.name, file)).cloned(),
                None => Some(static_url(&config.base_path, &album.name, file)),
            });
            (album.name.as_str(), url)
        })
        .collect();

    let mut tracks: Vec<Track> = Vec::with_capacity(pending.len());
    let mut waveforms = WaveformMap::new();

    for PendingTrack {
        album_dir,
        path,
        metadata,
    } in pending
    {
        let url = match &release_urls {
            Some(urls) => urls
                .get(&asset_name(&album_dir, &metadata.filename))
                .cloned(),
            None => Some(static_url(&config.base_path, &album_dir, &metadata.filename)),
        };
        let Some(url) = url else {
            skipped += 1;
            println!(
                "  {} {}: no release asset, skipped",
                style("✗").red(),
                metadata.filename
            );
            continue;
        };

        let (series, origin) = match generator.waveform_for(&metadata.id, &path).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Waveform for {} not cached: {e}", path.display());
                (
                    fallback_waveform(&metadata.id, config.waveform_samples),
                    WaveformOrigin::Fallback,
                )
            }
        };
        let origin_label = match origin {
            WaveformOrigin::Cached => "cached",
            WaveformOrigin::Tool => "audiowaveform",
            WaveformOrigin::Fallback => "generated",
        };
        println!(
            "  {} {} ({origin_label} waveform)",
            style("✓").green(),
            metadata.filename
        );

        waveforms.insert(metadata.id.clone(), series);
        let artwork = artwork_urls.get(album_dir.as_str()).cloned().flatten();
        let waveform = waveform_url(&config.base_path, &metadata.id);
        tracks.push(metadata.into_track(url, artwork, waveform));
    }

    sort_tracks(&mut tracks);

    let albums_found = tracks
        .iter()
        .map(|t| t.album.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let track_count = tracks.len();

    let manifest = TrackManifest {
        tracks,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let manifest_path = config.metadata_dir.join("tracks.json");
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", manifest_path.display()))?;

    let waveforms_path = config.metadata_dir.join("waveforms.json");
    std::fs::write(&waveforms_path, serde_json::to_string_pretty(&waveforms)?)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", waveforms_path.display()))?;

    tracing::info!(
        "Manifest written: {} tracks, {} albums, {} skipped",
        track_count,
        albums_found,
        skipped
    );

    Ok(GenerateSummary {
        tracks: track_count,
        albums: albums_found,
        skipped,
        manifest_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path as UrlPath, Query};
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::{delete, get};
    use axum::{Json, Router};
    use std::fs;
    use std::sync::{Arc, Mutex};

    fn write_wav(path: &Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(8000 * seconds) {
            writer.write_sample(((i % 64) as i16 - 32) * 200).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn fixture() -> (tempfile::TempDir, ManifestConfig) {
        let root = tempfile::tempdir().unwrap();
        let albums = root.path().join("albums");
        let blue = albums.join("blue");
        let red = albums.join("red");
        fs::create_dir_all(&blue).unwrap();
        fs::create_dir_all(&red).unwrap();
        fs::create_dir_all(albums.join(".cache")).unwrap();

        write_wav(&blue.join("Second Take.wav"), 1);
        write_wav(&blue.join("First Take.wav"), 2);
        fs::write(blue.join("cover.png"), b"png").unwrap();
        write_wav(&red.join("Alone.wav"), 1);
        fs::write(red.join("broken.mp3"), b"not audio").unwrap();

        let config = ManifestConfig {
            albums_dir: albums,
            metadata_dir: root.path().join("metadata"),
            base_path: "/unjazz".to_string(),
            waveform_samples: 16,
            ..ManifestConfig::default()
        };
        (root, config)
    }

    #[tokio::test]
    async fn test_static_manifest() {
        let (_root, config) = fixture();
        let generator =
            WaveformGenerator::with_tool(config.metadata_dir.join("waveforms"), 16, None);

        let summary = generate_with(&config, &generator, None).await.unwrap();
        assert_eq!(summary.tracks, 3);
        assert_eq!(summary.albums, 2);
        assert_eq!(summary.skipped, 1);

        let manifest: TrackManifest =
            serde_json::from_str(&fs::read_to_string(&summary.manifest_path).unwrap()).unwrap();
        let ids: Vec<&str> = manifest.tracks.iter().map(|t| t.id.as_str()).collect();
        // Untagged files all have track number 0, so album order decides and
        // the file order within an album is kept
        assert_eq!(ids, vec!["first-take", "second-take", "alone"]);

        let first = &manifest.tracks[0];
        assert_eq!(first.url, "/unjazz/albums/blue/First Take.wav");
        assert_eq!(first.artwork.as_deref(), Some("/unjazz/albums/blue/cover.png"));
        assert_eq!(first.waveform, "/unjazz/metadata/waveforms/first-take.json");
        assert!((first.duration - 2.0).abs() < 0.01);
        assert_eq!(manifest.tracks[2].artwork, None);
        assert!(manifest.generated_at.ends_with('Z'));

        let waveforms: WaveformMap = serde_json::from_str(
            &fs::read_to_string(config.metadata_dir.join("waveforms.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(waveforms.len(), 3);
        assert!(waveforms.values().all(|w| w.len() == 16));
        assert!(config.metadata_dir.join("waveforms/alone.json").exists());
    }

    #[tokio::test]
    async fn test_regeneration_reproduces_waveforms() {
        let (_root, config) = fixture();
        let generator =
            WaveformGenerator::with_tool(config.metadata_dir.join("waveforms"), 16, None);

        generate_with(&config, &generator, None).await.unwrap();
        let first = fs::read_to_string(config.metadata_dir.join("waveforms.json")).unwrap();
        generate_with(&config, &generator, None).await.unwrap();
        let second = fs::read_to_string(config.metadata_dir.join("waveforms.json")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_release_mode_without_credentials_skips_tracks() {
        let (_root, mut config) = fixture();
        config.use_github_releases = true;
        let generator =
            WaveformGenerator::with_tool(config.metadata_dir.join("waveforms"), 16, None);

        let summary = generate_with(&config, &generator, None).await.unwrap();
        assert_eq!(summary.tracks, 0);
        assert_eq!(summary.skipped, 4);
    }

    /// Requests seen by the stand-in GitHub, e.g. `DELETE 2` or `UPLOAD red-Alone.wav`.
    type Calls = Arc<Mutex<Vec<String>>>;

    fn release_asset(id: u64, name: &str, size: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": name,
            "size": size,
            "browser_download_url": format!("https://example.test/old/{name}"),
        })
    }

    /// Stand-in GitHub with release 7 holding `existing`. Uploads whose name
    /// contains `failing_upload` and all deletes when `deletes_fail` answer 500.
    /// Uploaded assets come back under a sanitized name.
    async fn fake_github(
        existing: Vec<serde_json::Value>,
        failing_upload: &'static str,
        deletes_fail: bool,
    ) -> (GitHubReleases, Calls) {
        let calls: Calls = Arc::default();
        let (upload_calls, delete_calls) = (calls.clone(), calls.clone());

        let app = Router::new()
            .route(
                "/repos/{owner}/{repo}/releases/tags/{tag}",
                get(|UrlPath((_, _, tag)): UrlPath<(String, String, String)>| async move {
                    Json(serde_json::json!({ "id": 7, "tag_name": tag }))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/releases/{id}/assets",
                get(move || {
                    let existing = existing.clone();
                    async move { Json(existing) }
                })
                .post(move |Query(q): Query<HashMap<String, String>>| {
                    let calls = upload_calls.clone();
                    async move {
                        let name = q["name"].clone();
                        calls.lock().unwrap().push(format!("UPLOAD {name}"));
                        if name.contains(failing_upload) {
                            return AxumStatus::INTERNAL_SERVER_ERROR.into_response();
                        }
                        let stored = name.replace('-', ".");
                        (
                            AxumStatus::CREATED,
                            Json(serde_json::json!({
                                "id": 900,
                                "name": stored,
                                "size": 1,
                                "browser_download_url": format!("https://example.test/new/{name}"),
                            })),
                        )
                            .into_response()
                    }
                }),
            )
            .route(
                "/repos/{owner}/{repo}/releases/assets/{id}",
                delete(move |UrlPath((_, _, id)): UrlPath<(String, String, u64)>| {
                    let calls = delete_calls.clone();
                    async move {
                        calls.lock().unwrap().push(format!("DELETE {id}"));
                        if deletes_fail {
                            AxumStatus::INTERNAL_SERVER_ERROR
                        } else {
                            AxumStatus::NO_CONTENT
                        }
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = GitHubReleases::new("someone/tunes", "secret")
            .unwrap()
            .with_endpoints(&base, &base)
            .with_client(reqwest::Client::builder().no_proxy().build().unwrap());
        (client, calls)
    }

    fn read_manifest(config: &ManifestConfig) -> TrackManifest {
        serde_json::from_str(&fs::read_to_string(config.metadata_dir.join("tracks.json")).unwrap())
            .unwrap()
    }

    fn url_of<'a>(manifest: &'a TrackManifest, id: &str) -> Option<&'a str> {
        manifest
            .tracks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.url.as_str())
    }

    #[tokio::test]
    async fn test_release_sync_keeps_replaces_and_uploads() {
        let (_root, mut config) = fixture();
        config.use_github_releases = true;
        config.prune_orphans = false;
        let first_size = fs::metadata(config.albums_dir.join("blue/First Take.wav"))
            .unwrap()
            .len();
        let existing = vec![
            release_asset(1, "blue-First.Take.wav", first_size),
            release_asset(2, "blue-Second.Take.wav", 1),
            release_asset(3, "old-Gone.mp3", 5),
        ];
        let (client, calls) = fake_github(existing, "red-Alone", false).await;
        let generator =
            WaveformGenerator::with_tool(config.metadata_dir.join("waveforms"), 16, None);

        let summary = generate_with(&config, &generator, Some(&client)).await.unwrap();
        // broken.mp3 plus the failed upload
        assert_eq!(summary.tracks, 2);
        assert_eq!(summary.skipped, 2);

        let manifest = read_manifest(&config);
        assert_eq!(
            url_of(&manifest, "first-take"),
            Some("https://example.test/old/blue-First.Take.wav")
        );
        assert_eq!(
            url_of(&manifest, "second-take"),
            Some("https://example.test/new/blue-Second.Take.wav")
        );
        assert_eq!(url_of(&manifest, "alone"), None);
        assert_eq!(
            manifest.tracks[0].artwork.as_deref(),
            Some("https://example.test/new/blue-cover.png")
        );

        let mut calls = calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                "DELETE 2",
                "UPLOAD blue-Second.Take.wav",
                "UPLOAD blue-cover.png",
                "UPLOAD red-Alone.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_release_sync_keeps_old_asset_when_delete_fails() {
        let (_root, mut config) = fixture();
        config.use_github_releases = true;
        config.prune_orphans = true;
        let existing = vec![
            release_asset(2, "blue-Second.Take.wav", 1),
            release_asset(3, "old-Gone.mp3", 5),
        ];
        let (client, calls) = fake_github(existing, "nothing-fails", true).await;
        let generator =
            WaveformGenerator::with_tool(config.metadata_dir.join("waveforms"), 16, None);

        let summary = generate_with(&config, &generator, Some(&client)).await.unwrap();
        assert_eq!(summary.tracks, 3);
        assert_eq!(summary.skipped, 1);

        let manifest = read_manifest(&config);
        assert_eq!(
            url_of(&manifest, "second-take"),
            Some("https://example.test/old/blue-Second.Take.wav")
        );
        assert_eq!(
            url_of(&manifest, "first-take"),
            Some("https://example.test/new/blue-First.Take.wav")
        );

        let calls = calls.lock().unwrap().clone();
        assert!(calls.contains(&"DELETE 2".to_string()));
        assert!(calls.contains(&"DELETE 3".to_string()));
        assert!(!calls.contains(&"UPLOAD blue-Second.Take.wav".to_string()));
    }

    #[tokio::test]
    async fn test_unwritable_waveform_cache_falls_back() {
        let (root, config) = fixture();
        let blocker = root.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();
        let generator = WaveformGenerator::with_tool(blocker.join("waveforms"), 16, None);

        let summary = generate_with(&config, &generator, None).await.unwrap();
        assert_eq!(summary.tracks, 3);

        let waveforms: WaveformMap = serde_json::from_str(
            &fs::read_to_string(config.metadata_dir.join("waveforms.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(waveforms["alone"], fallback_waveform("alone", 16));
    }

    #[tokio::test]
    async fn test_missing_albums_dir_aborts() {
        let root = tempfile::tempdir().unwrap();
        let config = ManifestConfig {
            albums_dir: root.path().join("missing"),
            metadata_dir: root.path().join("metadata"),
            ..ManifestConfig::default()
        };
        let generator = WaveformGenerator::with_tool(root.path().join("wf"), 16, None);
        assert!(generate_with(&config, &generator, None).await.is_err());
    }
}
