//! First-run setup and config version stamping.
//!
//! The config file starts with a `config_version = "X.Y.Z"` line. A missing
//! file is created from the embedded template; a file stamped by an older
//! release gets its stamp refreshed so later migrations know where it came from.

use anyhow::anyhow;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Embedded default configuration template.
const DEFAULT_CONFIG: &str = include_str!("../../environments/unjazz.toml");

/// Current application version from Cargo.toml
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What `ensure_config_file` had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// A fresh file was written from the template
    Created,
    /// The file was stamped by an older (or unknown) version and was restamped
    Migrated { from: String },
    /// Nothing to do
    UpToDate,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
struct Version(u32, u32, u32);

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| anyhow!("Invalid version '{s}'. Expected 'major.minor.patch'"))?;

        match parts.as_slice() {
            [major, minor, patch] => Ok(Version(*major, *minor, *patch)),
            _ => Err(anyhow!("Invalid version '{s}'. Expected 'major.minor.patch'")),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Reads the `config_version` stamp from the first line of a config file.
fn read_stamp(content: &str) -> anyhow::Result<Option<String>> {
    let first_line = content.lines().next().unwrap_or_default();
    let regex = Regex::new(r#"^\s*config_version\s*=\s*"([^"]+)""#)?;
    Ok(regex.captures(first_line).map(|caps| caps[1].to_string()))
}

/// Replaces (or inserts) the version stamp as the first line.
fn restamp(content: &str) -> String {
    let body: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim_start().starts_with("config_version"))
        .collect();
    format!(
        "config_version = \"{CURRENT_VERSION}\"\n{}",
        body.join("\n")
    )
}

/// Makes sure a usable config file exists at `config_path`.
///
/// # Errors
/// - If the file cannot be read or written
/// - If the stamped version or the binary version cannot be parsed
pub fn ensure_config_file(config_path: &Path) -> anyhow::Result<SetupOutcome> {
    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(
            config_path,
            format!("config_version = \"{CURRENT_VERSION}\"\n{DEFAULT_CONFIG}"),
        )?;
        tracing::info!("Wrote default configuration to {}", config_path.display());
        return Ok(SetupOutcome::Created);
    }

    let content = std::fs::read_to_string(config_path)?;
    let current: Version = CURRENT_VERSION.parse()?;

    let from = match read_stamp(&content)? {
        Some(stamp) => {
            let stamped: Version = stamp.parse()?;
            if stamped >= current {
                if stamped > current {
                    tracing::warn!(
                        "Config version {} is newer than app version {}",
                        stamped,
                        current
                    );
                }
                return Ok(SetupOutcome::UpToDate);
            }
            stamp
        }
        None => "unknown (legacy config)".to_string(),
    };

    std::fs::write(config_path, restamp(&content))?;
    tracing::info!("Config migrated from version {} to {}", from, current);
    Ok(SetupOutcome::Migrated { from })
}
