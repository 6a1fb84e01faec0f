//! Waveform visualization and seek interaction.
//!
//! - `layout`: bar count, widths, down-sampling and progress coloring
//! - `seek`: pointer offset to playback time, with a debounce window
//! - `renderer`: per-surface state that recomputes layouts on change
//! - `widget`: ratatui widget that rasterizes a layout into terminal cells

pub mod layout;
pub mod renderer;
pub mod seek;
pub mod widget;

pub use layout::WaveformStyle;
pub use renderer::WaveformRenderer;
pub use seek::{PointerDown, PointerKind};
pub use widget::{surface_for, WaveformPalette, WaveformView};

use crate::config::WaveformConfig;

impl From<&WaveformConfig> for WaveformStyle {
    fn from(config: &WaveformConfig) -> Self {
        Self {
            min_bar_width: config.min_bar_width,
            bar_gap: config.bar_gap,
            height_scale: config.height_scale,
        }
    }
}
