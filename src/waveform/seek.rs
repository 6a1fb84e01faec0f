//! Pointer-to-time translation for a waveform surface.

use std::time::{Duration, Instant};

/// Default spacing between two accepted seeks on one surface.
pub const DEFAULT_SEEK_DEBOUNCE: Duration = Duration::from_millis(300);

/// Input device that produced a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    // crossterm reports no touch input
    #[cfg_attr(not(test), allow(dead_code))]
    Touch,
}

/// A pointer-down (or touch-start) over a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerDown {
    pub kind: PointerKind,
    /// Horizontal offset from the surface's left edge, in surface units
    pub offset_x: f32,
    pub at: Instant,
}

/// A request to move playback to `time_seconds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekIntent {
    pub time_seconds: f64,
}

/// Outcome of feeding one pointer event to a [`SeekGesture`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerResponse {
    pub seek: Option<SeekIntent>,
    /// The host should not apply its own default handling of the event
    pub prevent_default: bool,
}

/// Maps a horizontal offset on a surface of `width` to a playback time.
///
/// Returns `None` when the duration is unknown or the surface has no width.
pub fn seek_time_for(offset_x: f32, width: f32, duration: f64) -> Option<f64> {
    if !duration.is_finite() || duration <= 0.0 {
        return None;
    }
    if !width.is_finite() || width <= 0.0 || !offset_x.is_finite() {
        return None;
    }
    let ratio = (f64::from(offset_x) / f64::from(width)).clamp(0.0, 1.0);
    Some(ratio * duration)
}

/// Per-surface seek state: remembers when the last seek was accepted.
#[derive(Debug, Clone)]
pub struct SeekGesture {
    debounce: Duration,
    last_accepted: Option<Instant>,
}

impl Default for SeekGesture {
    fn default() -> Self {
        Self::new(DEFAULT_SEEK_DEBOUNCE)
    }
}

impl SeekGesture {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_accepted: None,
        }
    }

    /// Handles a press over a surface of `width` while the track is `duration`
    /// seconds long. At most one seek is produced per event.
    pub fn pointer_down(&mut self, event: PointerDown, width: f32, duration: f64) -> PointerResponse {
        let touch = event.kind == PointerKind::Touch;

        let Some(time_seconds) = seek_time_for(event.offset_x, width, duration) else {
            return PointerResponse {
                seek: None,
                prevent_default: touch,
            };
        };

        if let Some(last) = self.last_accepted {
            if event.at.saturating_duration_since(last) < self.debounce {
                tracing::debug!("Seek suppressed (within {:?} of previous)", self.debounce);
                return PointerResponse {
                    seek: None,
                    prevent_default: true,
                };
            }
        }

        self.last_accepted = Some(event.at);
        PointerResponse {
            seek: Some(SeekIntent { time_seconds }),
            prevent_default: true,
        }
    }
}
