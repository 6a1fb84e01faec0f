//! Terminal rasterization of a [`BarLayout`].
//!
//! One cell column is one horizontal surface unit and every cell row holds
//! eight vertical units, drawn with the lower eighth-block glyphs. Cells whose
//! upper part is covered reuse the same glyphs inverted: the glyph is drawn in
//! the background color on a cell whose background is the bar color.

use std::str::FromStr;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;

use super::layout::{BarLayout, BarTone, SurfaceSize};
use crate::config::WaveformConfig;

const EIGHTHS: [&str; 9] = [" ", "▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];

/// Vertical surface units per terminal row.
pub const UNITS_PER_ROW: f32 = 8.0;

/// Colors used to draw a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformPalette {
    pub active: Color,
    pub dimmed: Color,
    pub background: Color,
}

impl Default for WaveformPalette {
    fn default() -> Self {
        Self {
            active: Color::Rgb(255, 85, 0),
            dimmed: Color::Rgb(77, 77, 77),
            background: Color::Rgb(0, 0, 0),
        }
    }
}

impl WaveformPalette {
    /// Builds a palette from configured color strings.
    ///
    /// # Errors
    /// - If any color is neither `#rrggbb` nor a known color name
    pub fn from_config(config: &WaveformConfig) -> anyhow::Result<Self> {
        let parse = |field: &str, value: &str| {
            Color::from_str(value)
                .map_err(|_| anyhow::anyhow!("Invalid {field} '{value}' in [player.waveform]"))
        };
        Ok(Self {
            active: parse("active_color", &config.active_color)?,
            dimmed: parse("dimmed_color", &config.dimmed_color)?,
            background: parse("background_color", &config.background_color)?,
        })
    }

    fn bar(&self, tone: BarTone) -> Color {
        match tone {
            BarTone::Active => self.active,
            BarTone::Dimmed => self.dimmed,
        }
    }
}

/// Surface size a waveform occupies when drawn into `area`.
pub fn surface_for(area: Rect) -> SurfaceSize {
    SurfaceSize::new(f32::from(area.width), f32::from(area.height) * UNITS_PER_ROW)
}

/// How one cell is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellFill {
    Empty,
    /// Lower `n` eighths in the bar color
    FromBelow(usize),
    /// Upper `n` eighths in the bar color
    FromAbove(usize),
}

/// Coverage of the cell spanning `[cell_top, cell_top + 8)` by the vertical
/// span `[top, bottom)`.
fn cell_fill(cell_top: f32, top: f32, bottom: f32) -> CellFill {
    let cell_bottom = cell_top + UNITS_PER_ROW;
    let start = top.max(cell_top);
    let end = bottom.min(cell_bottom);
    let covered = ((end - start).max(0.0)).round() as usize;
    if covered == 0 {
        return CellFill::Empty;
    }
    let covered = covered.min(8);
    if end >= cell_bottom {
        CellFill::FromBelow(covered)
    } else if start <= cell_top {
        CellFill::FromAbove(covered)
    } else {
        // Span starts and ends inside the cell; anchor it at the bottom
        CellFill::FromBelow(covered)
    }
}

/// Draws a computed layout. Nothing but the background is drawn when
/// `layout` is `None`.
pub struct WaveformView<'a> {
    layout: Option<&'a BarLayout>,
    palette: WaveformPalette,
}

impl<'a> WaveformView<'a> {
    pub fn new(layout: Option<&'a BarLayout>, palette: WaveformPalette) -> Self {
        Self { layout, palette }
    }
}

impl Widget for WaveformView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let background = self.palette.background;
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_symbol(" ").set_fg(background).set_bg(background);
                }
            }
        }

        let Some(layout) = self.layout else {
            return;
        };

        for col in 0..area.width {
            let Some(bar) = layout.bar_at(f32::from(col) + 0.5) else {
                continue;
            };
            let color = self.palette.bar(bar.tone);
            let top = layout.center_y - bar.half_height;
            let bottom = layout.center_y + bar.half_height;

            for row in 0..area.height {
                let fill = cell_fill(f32::from(row) * UNITS_PER_ROW, top, bottom);
                let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) else {
                    continue;
                };
                match fill {
                    CellFill::Empty => {}
                    CellFill::FromBelow(n) => {
                        cell.set_symbol(EIGHTHS[n]).set_fg(color).set_bg(background);
                    }
                    CellFill::FromAbove(n) => {
                        cell.set_symbol(EIGHTHS[8 - n]).set_fg(background).set_bg(color);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::layout::WaveformStyle;

    #[test]
    fn test_cell_fill() {
        assert_eq!(cell_fill(0.0, 8.0, 16.0), CellFill::Empty);
        assert_eq!(cell_fill(0.0, 0.0, 8.0), CellFill::FromBelow(8));
        assert_eq!(cell_fill(0.0, 2.0, 16.0), CellFill::FromBelow(6));
        assert_eq!(cell_fill(8.0, 0.0, 11.0), CellFill::FromAbove(3));
        assert_eq!(cell_fill(0.0, 3.0, 5.0), CellFill::FromBelow(2));
    }

    #[test]
    fn test_palette_from_config() {
        let palette = WaveformPalette::from_config(&WaveformConfig::default()).unwrap();
        assert_eq!(palette, WaveformPalette::default());

        let bad = WaveformConfig {
            active_color: "not-a-color".to_string(),
            ..WaveformConfig::default()
        };
        assert!(WaveformPalette::from_config(&bad).is_err());
    }

    #[test]
    fn test_renders_mirrored_bars_with_gaps() {
        let area = Rect::new(0, 0, 12, 2);
        let layout = BarLayout::compute(
            &[1.0, 1.0, 1.0, 1.0],
            surface_for(area),
            &WaveformStyle::default(),
            0.5,
        )
        .unwrap();
        let palette = WaveformPalette::default();
        let mut buf = Buffer::empty(area);
        WaveformView::new(Some(&layout), palette).render(area, &mut buf);

        // Half-height 7.2 around center 8: top row filled from below, bottom
        // row filled from above.
        assert_eq!(buf[(0, 0)].symbol(), "▇");
        assert_eq!(buf[(0, 0)].fg, palette.active);
        assert_eq!(buf[(0, 1)].symbol(), "▁");
        assert_eq!(buf[(0, 1)].bg, palette.active);
        assert_eq!(buf[(0, 1)].fg, palette.background);

        // Column 2 falls in the gap after bar 0
        assert_eq!(buf[(2, 0)].symbol(), " ");
        assert_eq!(buf[(2, 0)].bg, palette.background);

        // Bars 2 and 3 are after the playhead
        assert_eq!(buf[(7, 0)].fg, palette.dimmed);
    }

    #[test]
    fn test_no_layout_draws_background_only() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        WaveformView::new(None, WaveformPalette::default()).render(area, &mut buf);
        for x in 0..5 {
            assert_eq!(buf[(x, 0)].symbol(), " ");
            assert_eq!(buf[(x, 0)].bg, Color::Rgb(0, 0, 0));
        }
    }
}
