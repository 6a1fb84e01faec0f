//! Manifest generation command.

use console::style;
use std::path::PathBuf;

use crate::config::ManifestConfig;
use crate::manifest::generate_manifest;

/// Generates tracks.json and waveforms.json, optionally from directories other
/// than the configured ones.
///
/// # Errors
/// - If the albums directory cannot be read
/// - If the release cannot be prepared in release mode
/// - If the output files cannot be written
pub async fn handle_generate(
    config: &ManifestConfig,
    albums_dir: Option<PathBuf>,
    metadata_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(dir) = albums_dir {
        config.albums_dir = dir;
    }
    if let Some(dir) = metadata_dir {
        config.metadata_dir = dir;
    }

    println!(
        "{} {} → {}",
        style("unjazz generate").bold(),
        config.albums_dir.display(),
        config.metadata_dir.display()
    );
    if config.use_github_releases {
        println!(
            "Release mode: {} @ {}",
            style(&config.github_repo).cyan(),
            config.release_tag
        );
    }
    println!();

    let summary = generate_manifest(&config).await?;

    println!();
    println!(
        "{} {} tracks in {} albums",
        style("Done:").green().bold(),
        summary.tracks,
        summary.albums
    );
    if summary.skipped > 0 {
        println!("{} {} files skipped", style("!").yellow(), summary.skipped);
    }
    println!("Manifest written to {}", summary.manifest_path.display());
    Ok(())
}
