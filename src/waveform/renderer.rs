//! Per-surface waveform state.
//!
//! A `WaveformRenderer` owns one surface: its amplitude series, the playback
//! position shown on it, the last observed size and the seek debounce window.
//! Any input change marks it dirty and the next `layout()` call recomputes the
//! whole frame from scratch.

use std::time::Duration;

use super::layout::{progress_ratio, BarLayout, SurfaceSize, WaveformStyle};
use super::seek::{PointerDown, PointerResponse, SeekGesture};

#[derive(Debug, Clone)]
pub struct WaveformRenderer {
    style: WaveformStyle,
    series: Vec<f32>,
    progress: f64,
    duration: f64,
    surface: SurfaceSize,
    gesture: SeekGesture,
    cached: Option<BarLayout>,
    dirty: bool,
}

/// Clamps loaded samples into [0, 1]; non-finite values become 0.
fn sanitize(series: &[f32]) -> Vec<f32> {
    series
        .iter()
        .map(|&v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
        .collect()
}

impl WaveformRenderer {
    pub fn new(style: WaveformStyle, seek_debounce: Duration) -> Self {
        Self {
            style,
            series: Vec::new(),
            progress: 0.0,
            duration: 0.0,
            surface: SurfaceSize::default(),
            gesture: SeekGesture::new(seek_debounce),
            cached: None,
            dirty: true,
        }
    }

    pub fn set_series(&mut self, series: &[f32]) {
        self.series = sanitize(series);
        self.dirty = true;
    }

    #[cfg(test)]
    pub fn series(&self) -> &[f32] {
        &self.series
    }

    #[cfg(test)]
    pub fn has_data(&self) -> bool {
        !self.series.is_empty()
    }

    /// Updates the playback position shown on this surface. A duration of 0
    /// means unknown and renders with neutral coloring.
    pub fn set_playback(&mut self, progress: f64, duration: f64) {
        let progress = if progress.is_finite() { progress.max(0.0) } else { 0.0 };
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        if progress != self.progress || duration != self.duration {
            self.progress = progress;
            self.duration = duration;
            self.dirty = true;
        }
    }

    /// Records the surface size observed by the host. Returns true when the
    /// size changed.
    pub fn observe_surface(&mut self, surface: SurfaceSize) -> bool {
        if surface == self.surface {
            return false;
        }
        tracing::trace!(
            "Waveform surface resized to {}x{}",
            surface.width,
            surface.height
        );
        self.surface = surface;
        self.dirty = true;
        true
    }

    /// The current frame, or `None` when there is nothing to draw.
    pub fn layout(&mut self) -> Option<&BarLayout> {
        if self.dirty {
            let ratio = progress_ratio(self.progress, self.duration);
            self.cached = BarLayout::compute(&self.series, self.surface, &self.style, ratio);
            self.dirty = false;
        }
        self.cached.as_ref()
    }

    /// Translates a press on this surface into a seek, honouring the debounce.
    pub fn pointer_down(&mut self, event: PointerDown) -> PointerResponse {
        self.gesture
            .pointer_down(event, self.surface.width, self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::layout::BarTone;
    use crate::waveform::seek::{PointerKind, SeekIntent};
    use std::time::Instant;

    fn renderer() -> WaveformRenderer {
        WaveformRenderer::new(WaveformStyle::default(), Duration::from_millis(300))
    }

    #[test]
    fn test_nothing_drawn_until_surface_is_observed() {
        let mut r = renderer();
        r.set_series(&[0.5; 10]);
        assert!(r.layout().is_none());

        assert!(r.observe_surface(SurfaceSize::new(30.0, 16.0)));
        assert_eq!(r.layout().map(|l| l.bar_count()), Some(10));
        assert!(!r.observe_surface(SurfaceSize::new(30.0, 16.0)));
    }

    #[test]
    fn test_resize_recomputes_layout() {
        let mut r = renderer();
        r.set_series(&[0.5; 200]);
        r.observe_surface(SurfaceSize::new(0.0, 16.0));
        assert!(r.layout().is_none());

        r.observe_surface(SurfaceSize::new(90.0, 16.0));
        assert_eq!(r.layout().map(|l| l.bar_count()), Some(30));

        r.observe_surface(SurfaceSize::new(45.0, 16.0));
        assert_eq!(r.layout().map(|l| l.bar_count()), Some(15));
    }

    #[test]
    fn test_empty_series_draws_nothing() {
        let mut r = renderer();
        r.observe_surface(SurfaceSize::new(100.0, 16.0));
        r.set_playback(1.0, 10.0);
        assert!(r.layout().is_none());
        assert!(!r.has_data());
    }

    #[test]
    fn test_loaded_values_are_sanitized() {
        let mut r = renderer();
        r.set_series(&[-0.5, 1.5, f32::NAN, 0.25]);
        assert_eq!(r.series(), &[0.0, 1.0, 0.0, 0.25]);
    }

    #[test]
    fn test_progress_updates_coloring() {
        let mut r = renderer();
        r.set_series(&[0.2, 0.8, 0.4, 1.0]);
        r.observe_surface(SurfaceSize::new(12.0, 16.0));
        assert_eq!(r.layout().map(|l| l.active_count()), Some(0));

        r.set_playback(2.0, 4.0);
        let tones: Vec<BarTone> = r.layout().unwrap().bars.iter().map(|b| b.tone).collect();
        assert_eq!(
            tones,
            vec![BarTone::Active, BarTone::Active, BarTone::Dimmed, BarTone::Dimmed]
        );
    }

    #[test]
    fn test_unknown_duration_is_neutral_and_unseekable() {
        let mut r = renderer();
        r.set_series(&[0.5; 8]);
        r.observe_surface(SurfaceSize::new(24.0, 16.0));
        r.set_playback(3.0, 0.0);
        assert_eq!(r.layout().map(|l| l.active_count()), Some(0));

        let response = r.pointer_down(PointerDown {
            kind: PointerKind::Mouse,
            offset_x: 12.0,
            at: Instant::now(),
        });
        assert_eq!(response.seek, None);
    }

    #[test]
    fn test_pointer_down_uses_observed_width() {
        let mut r = renderer();
        r.set_series(&[0.5; 8]);
        r.observe_surface(SurfaceSize::new(40.0, 16.0));
        r.set_playback(0.0, 200.0);

        let response = r.pointer_down(PointerDown {
            kind: PointerKind::Mouse,
            offset_x: 10.0,
            at: Instant::now(),
        });
        assert_eq!(response.seek, Some(SeekIntent { time_seconds: 50.0 }));
    }
}
