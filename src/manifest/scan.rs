//! Discovery of album directories, artwork and audio files.

use std::fs;
use std::path::{Path, PathBuf};

const ARTWORK_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg"];

/// One album directory and the files the generator cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumSource {
    /// Directory name, also the album fallback title
    pub name: String,
    pub path: PathBuf,
    /// File name of the artwork, if any
    pub artwork: Option<String>,
    /// Audio file names, sorted
    pub audio_files: Vec<String>,
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| allowed.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Check if a file is a supported audio format.
pub fn is_supported_audio_file(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

/// Check if a file is usable as album artwork.
pub fn is_artwork_file(path: &Path) -> bool {
    has_extension(path, ARTWORK_EXTENSIONS)
}

fn sorted_file_names(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// Reads one album directory.
pub fn scan_album(path: &Path) -> anyhow::Result<AlbumSource> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("Album path has no name: {}", path.display()))?;

    let files = sorted_file_names(path)?;
    let artwork = files
        .iter()
        .find(|f| is_artwork_file(Path::new(f)))
        .cloned();
    let audio_files = files
        .into_iter()
        .filter(|f| is_supported_audio_file(Path::new(f)))
        .collect();

    Ok(AlbumSource {
        name,
        path: path.to_path_buf(),
        artwork,
        audio_files,
    })
}

/// Lists every non-hidden album directory under `albums_dir`, sorted by name.
///
/// # Errors
/// - If `albums_dir` cannot be read
pub fn scan_albums(albums_dir: &Path) -> anyhow::Result<Vec<AlbumSource>> {
    let entries = fs::read_dir(albums_dir).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read albums directory {}: {e}",
            albums_dir.display()
        )
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            !path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
        })
        .collect();
    dirs.sort();

    let mut albums = Vec::with_capacity(dirs.len());
    for dir in dirs {
        match scan_album(&dir) {
            Ok(album) => albums.push(album),
            Err(e) => tracing::warn!("Skipping album {}: {e}", dir.display()),
        }
    }
    Ok(albums)
}
