//! Configuration management for unjazz.
//!
//! Settings live in a single TOML file in the user's config directory with one
//! table per subsystem (`[manifest]`, `[relay]`, `[player]`). The manifest
//! generator additionally honours a handful of environment variables so it can
//! run unattended in CI.

pub mod file;
pub mod setup;

pub use file::{get_config_path, ManifestConfig, PlayerConfig, RelayConfig, UnjazzConfig, WaveformConfig};
pub use setup::{ensure_config_file, SetupOutcome};
