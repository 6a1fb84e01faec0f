//! Bar layout for the waveform visualization.
//!
//! Turns an amplitude series and a surface size into a list of bars: how many
//! fit, how wide each one is, which source sample each bar shows and whether
//! it falls before or after the playback position.

/// Drawing constants shared by every waveform surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformStyle {
    /// Narrowest a bar may become before fewer bars are drawn
    pub min_bar_width: f32,
    /// Fixed space between neighbouring bars
    pub bar_gap: f32,
    /// Fraction of the half-height reached by a full-scale sample
    pub height_scale: f32,
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self {
            min_bar_width: 2.0,
            bar_gap: 1.0,
            height_scale: 0.9,
        }
    }
}

/// Observed logical size of a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A surface with no area (not yet laid out, collapsed) is never drawn on.
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Whether a bar is before or after the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarTone {
    Active,
    Dimmed,
}

/// One vertical bar, mirrored about the surface's horizontal center line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub index: usize,
    /// Index into the source series this bar displays
    pub sample_index: usize,
    /// Left edge
    pub x: f32,
    pub width: f32,
    /// Extent above (and below) the center line
    pub half_height: f32,
    pub tone: BarTone,
}

impl Bar {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// A fully computed frame of the waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct BarLayout {
    pub bars: Vec<Bar>,
    pub bar_width: f32,
    pub bar_gap: f32,
    pub center_y: f32,
    /// Bars with an index below this are drawn active
    pub played_threshold: usize,
    pub surface: SurfaceSize,
}

/// Number of bars a surface of `width` can host at the minimum bar width.
pub fn bar_capacity(width: f32, style: &WaveformStyle) -> usize {
    let pitch = style.min_bar_width + style.bar_gap;
    if !width.is_finite() || width <= 0.0 || pitch <= 0.0 {
        return 0;
    }
    (width / pitch).floor() as usize
}

/// Playback progress as a ratio in [0, 1]. Unknown duration reads as 0.
pub fn progress_ratio(progress: f64, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 || !progress.is_finite() {
        return 0.0;
    }
    (progress / duration).clamp(0.0, 1.0)
}

/// Number of leading bars drawn as played for a given progress ratio.
pub fn played_threshold(ratio: f64, bar_count: usize) -> usize {
    let threshold = (ratio.clamp(0.0, 1.0) * bar_count as f64).floor() as usize;
    threshold.min(bar_count)
}

/// Nearest-neighbour mapping of a bar index onto the source series.
pub fn source_index(bar: usize, sample_count: usize, bar_count: usize) -> usize {
    if bar_count == 0 {
        return 0;
    }
    (bar * sample_count / bar_count).min(sample_count.saturating_sub(1))
}

impl BarLayout {
    /// Lays out `series` on `surface`.
    ///
    /// Returns `None` when there is nothing to draw: an empty series or a
    /// surface too small to host a single bar.
    pub fn compute(
        series: &[f32],
        surface: SurfaceSize,
        style: &WaveformStyle,
        ratio: f64,
    ) -> Option<Self> {
        if series.is_empty() || !surface.is_drawable() {
            return None;
        }

        let bar_count = series.len().min(bar_capacity(surface.width, style));
        if bar_count == 0 {
            return None;
        }

        let gap = style.bar_gap.max(0.0);
        let bar_width = (surface.width - (bar_count - 1) as f32 * gap) / bar_count as f32;
        let center_y = surface.height / 2.0;
        let threshold = played_threshold(ratio, bar_count);

        let bars = (0..bar_count)
            .map(|index| {
                let sample_index = source_index(index, series.len(), bar_count);
                let amplitude = series[sample_index].clamp(0.0, 1.0);
                Bar {
                    index,
                    sample_index,
                    x: index as f32 * (bar_width + gap),
                    width: bar_width,
                    half_height: amplitude * center_y * style.height_scale,
                    tone: if index < threshold {
                        BarTone::Active
                    } else {
                        BarTone::Dimmed
                    },
                }
            })
            .collect();

        Some(Self {
            bars,
            bar_width,
            bar_gap: gap,
            center_y,
            played_threshold: threshold,
            surface,
        })
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.bars.iter().filter(|b| b.tone == BarTone::Active).count()
    }

    /// Right edge of the last bar.
    #[cfg(test)]
    pub fn extent(&self) -> f32 {
        self.bars.last().map(Bar::right).unwrap_or(0.0)
    }

    /// The bar whose horizontal span contains `x`, if `x` is not in a gap.
    pub fn bar_at(&self, x: f32) -> Option<&Bar> {
        if self.bars.is_empty() || x < 0.0 {
            return None;
        }
        let pitch = self.bar_width + self.bar_gap;
        let guess = if pitch > 0.0 { (x / pitch).floor() as usize } else { 0 };
        let candidate = self.bars.get(guess.min(self.bars.len() - 1))?;
        (x >= candidate.x && x < candidate.right()).then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 / n as f32).collect()
    }

    #[test]
    fn test_bar_count_is_min_of_samples_and_capacity() {
        let style = WaveformStyle::default();
        for (n, width) in [(200, 300.0), (200, 900.0), (4, 12.0), (10, 7.0), (1, 3.0), (50, 151.5)] {
            let layout =
                BarLayout::compute(&ramp(n), SurfaceSize::new(width, 40.0), &style, 0.0).unwrap();
            let expected = n.min((width / 3.0).floor() as usize);
            assert_eq!(layout.bar_count(), expected, "n={n} width={width}");
            assert!(layout.extent() <= width + 1e-3, "n={n} width={width}");
            assert!(layout.bar_width >= style.min_bar_width - 1e-4);
        }
    }

    #[test]
    fn test_bars_fill_surface_exactly() {
        let style = WaveformStyle::default();
        let layout =
            BarLayout::compute(&ramp(200), SurfaceSize::new(301.0, 40.0), &style, 0.0).unwrap();
        assert_eq!(layout.bar_count(), 100);
        assert!((layout.extent() - 301.0).abs() < 1e-2);
    }

    #[test]
    fn test_downsampling_is_nearest_index() {
        assert_eq!(source_index(0, 200, 50), 0);
        assert_eq!(source_index(1, 200, 50), 4);
        assert_eq!(source_index(49, 200, 50), 196);
        assert_eq!(source_index(3, 4, 4), 3);

        let series = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        let layout =
            BarLayout::compute(&series, SurfaceSize::new(12.0, 10.0), &WaveformStyle::default(), 0.0)
                .unwrap();
        let picked: Vec<usize> = layout.bars.iter().map(|b| b.sample_index).collect();
        assert_eq!(picked, vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_never_upsamples() {
        let layout = BarLayout::compute(
            &[0.5, 1.0],
            SurfaceSize::new(1000.0, 10.0),
            &WaveformStyle::default(),
            0.0,
        )
        .unwrap();
        assert_eq!(layout.bar_count(), 2);
    }

    #[test]
    fn test_bar_height_is_mirrored_and_scaled() {
        let layout = BarLayout::compute(
            &[1.0, 0.5, 0.0],
            SurfaceSize::new(9.0, 40.0),
            &WaveformStyle::default(),
            0.0,
        )
        .unwrap();
        assert_eq!(layout.center_y, 20.0);
        assert!((layout.bars[0].half_height - 18.0).abs() < 1e-4);
        assert!((layout.bars[1].half_height - 9.0).abs() < 1e-4);
        assert_eq!(layout.bars[2].half_height, 0.0);
    }

    #[test]
    fn test_active_fraction_matches_floor_of_ratio() {
        let style = WaveformStyle::default();
        let mut previous = 0;
        for ratio in [0.0, 0.1, 0.25, 0.5, 0.77, 0.999, 1.0] {
            let layout =
                BarLayout::compute(&ramp(200), SurfaceSize::new(150.0, 20.0), &style, ratio)
                    .unwrap();
            let count = layout.bar_count();
            assert_eq!(layout.active_count(), (ratio * count as f64).floor() as usize);
            assert!(layout.active_count() >= previous);
            previous = layout.active_count();
        }
        assert_eq!(previous, 50);
    }

    #[test]
    fn test_four_bar_scenario_at_half_progress() {
        let series = [0.2, 0.8, 0.4, 1.0];
        let ratio = progress_ratio(2.0, 4.0);
        let layout =
            BarLayout::compute(&series, SurfaceSize::new(12.0, 10.0), &WaveformStyle::default(), ratio)
                .unwrap();

        assert_eq!(layout.bar_count(), 4);
        assert_eq!(layout.played_threshold, 2);
        let tones: Vec<BarTone> = layout.bars.iter().map(|b| b.tone).collect();
        assert_eq!(
            tones,
            vec![BarTone::Active, BarTone::Active, BarTone::Dimmed, BarTone::Dimmed]
        );
    }

    #[test]
    fn test_progress_ratio_guards() {
        assert_eq!(progress_ratio(5.0, 0.0), 0.0);
        assert_eq!(progress_ratio(5.0, f64::NAN), 0.0);
        assert_eq!(progress_ratio(-1.0, 10.0), 0.0);
        assert_eq!(progress_ratio(20.0, 10.0), 1.0);
        assert_eq!(progress_ratio(2.5, 10.0), 0.25);
    }

    #[test]
    fn test_nothing_to_draw() {
        let style = WaveformStyle::default();
        assert!(BarLayout::compute(&[], SurfaceSize::new(100.0, 10.0), &style, 0.0).is_none());
        assert!(BarLayout::compute(&[0.5], SurfaceSize::new(0.0, 10.0), &style, 0.0).is_none());
        assert!(BarLayout::compute(&[0.5], SurfaceSize::new(2.0, 10.0), &style, 0.0).is_none());
        assert!(BarLayout::compute(&[0.5], SurfaceSize::new(10.0, 0.0), &style, 0.0).is_none());
    }

    #[test]
    fn test_bar_at_skips_gaps() {
        let layout = BarLayout::compute(
            &[0.2, 0.8, 0.4, 1.0],
            SurfaceSize::new(12.0, 10.0),
            &WaveformStyle::default(),
            0.0,
        )
        .unwrap();
        // (12 - 3) / 4 = 2.25 wide, 1 gap: bars start at 0, 3.25, 6.5, 9.75
        assert_eq!(layout.bar_at(0.5).map(|b| b.index), Some(0));
        assert_eq!(layout.bar_at(2.5), None);
        assert_eq!(layout.bar_at(3.5).map(|b| b.index), Some(1));
        assert_eq!(layout.bar_at(11.5).map(|b| b.index), Some(3));
        assert_eq!(layout.bar_at(12.5), None);
    }
}
