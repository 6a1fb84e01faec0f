//! Command handlers for unjazz.
//!
//! # Commands
//! - `play`: Terminal player with waveform seeking (default)
//! - `generate`: Build tracks.json and waveforms.json from an albums directory
//! - `relay`: Serve the CORS relay for release-hosted audio
//! - `config`: Open the configuration file in the user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod generate;
pub mod logs;
pub mod play;
pub mod relay;

pub use config::handle_config;
pub use generate::handle_generate;
pub use logs::handle_logs;
pub use play::handle_play;
pub use relay::handle_relay;
