//! Locator for the external `audiowaveform` binary.
//!
//! Checks the usual package-manager install locations before falling back to a
//! PATH search, so the generator also finds the tool when it runs with a
//! minimal PATH (CI runners, cron).

use anyhow::{anyhow, Result};
use std::path::PathBuf;

const BINARY: &str = "audiowaveform";

fn candidates() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/bin/audiowaveform"), // Apple Silicon Homebrew
            PathBuf::from("/usr/local/bin/audiowaveform"),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from("/usr/bin/audiowaveform"),
            PathBuf::from("/usr/local/bin/audiowaveform"),
            PathBuf::from("/snap/bin/audiowaveform"),
        ]
    } else if cfg!(target_os = "windows") {
        vec![PathBuf::from(
            "C:\\Program Files\\audiowaveform\\audiowaveform.exe",
        )]
    } else {
        vec![]
    }
}

/// Locates the audiowaveform binary on the system.
///
/// # Errors
/// - If the binary is neither in a standard location nor on PATH
pub fn find_audiowaveform() -> Result<PathBuf> {
    if let Some(path) = candidates().into_iter().find(|p| p.exists()) {
        tracing::debug!("Found audiowaveform at: {}", path.display());
        return Ok(path);
    }

    let path = find_in_path(BINARY)?;
    tracing::debug!("Found audiowaveform in PATH at: {}", path.display());
    Ok(path)
}

/// Searches for a binary in the system PATH.
///
/// Uses `which` on Unix systems and `where` on Windows.
fn find_in_path(binary_name: &str) -> Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = std::process::Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        // `where` may print several matches, one per line
        if let Some(first) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            return Ok(PathBuf::from(first));
        }
    }

    Err(anyhow!(
        "{binary_name} not found. Install it for real waveforms:\n\
         macOS: brew install audiowaveform\n\
         Linux: apt install audiowaveform (Debian/Ubuntu, via the BBC PPA)\n\
         Otherwise see https://github.com/bbc/audiowaveform"
    ))
}
