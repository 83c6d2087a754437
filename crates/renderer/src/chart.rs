//! Probability chart layout: filled exceedance bands over (time, threshold),
//! optional line overlays, axes and a colorbar.

use rayon::prelude::*;
use serde::Deserialize;
use tiny_skia::{LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform};
use tracing::debug;

use ensemble_common::{tick_label, EnsembleError, EnsembleResult, Figure, ProbabilitySurface};

use crate::colormap::{Color, ColorRamp};
use crate::contour::{band_index, linspace_levels, march_squares, SurfaceGrid};
use crate::glyphs::{draw_text, text_width, Anchor};
use crate::png::encode_png;

/// Candidate x tick spacings in hours, smallest first.
const TICK_STEPS: [i64; 6] = [3, 6, 12, 24, 48, 96];
const TICK_LENGTH: f32 = 5.0;

const MEAN_COLOR: Color = Color::rgb(214, 39, 40);
const NOW_COLOR: Color = Color::rgb(128, 128, 128);

/// Chart geometry and styling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub margin_left: u32,
    pub margin_right: u32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub colorbar_width: u32,
    pub colorbar_gap: u32,
    /// Contour levels over 0..=100 percent, both ends included.
    pub levels: usize,
    pub font_size: f32,
    pub line_width: f32,
    pub draw_level_lines: bool,
    pub background: Color,
    pub ramp: ColorRamp,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            margin_left: 70,
            margin_right: 110,
            margin_top: 30,
            margin_bottom: 50,
            colorbar_width: 18,
            colorbar_gap: 20,
            levels: 11,
            font_size: 12.0,
            line_width: 2.0,
            draw_level_lines: true,
            background: Color::WHITE,
            ramp: ColorRamp::blues(),
        }
    }
}

/// Pixel placement of the plot area and its data ranges.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    hours: (f64, f64),
    values: (f64, f64),
}

impl Frame {
    fn right(&self) -> f32 {
        (self.left + self.width) as f32
    }

    fn bottom(&self) -> f32 {
        (self.top + self.height) as f32
    }

    fn x(&self, hour: f64) -> f32 {
        let (lo, hi) = self.hours;
        self.left as f32 + ((hour - lo) / (hi - lo) * self.width as f64) as f32
    }

    fn y(&self, value: f64) -> f32 {
        let (lo, hi) = self.values;
        self.bottom() - ((value - lo) / (hi - lo) * self.height as f64) as f32
    }

    fn hour_at(&self, px: f64) -> f64 {
        let (lo, hi) = self.hours;
        lo + (px - self.left as f64) / self.width as f64 * (hi - lo)
    }

    fn value_at(&self, py: f64) -> f64 {
        let (lo, hi) = self.values;
        lo + (self.bottom() as f64 - py) / self.height as f64 * (hi - lo)
    }
}

/// Fractional position of `hour` along an ascending hour axis, clamped to
/// the axis ends. Uneven spacing is interpolated per segment.
pub fn fractional_index(times: &[i64], hour: f64) -> f64 {
    if times.len() < 2 {
        return 0.0;
    }
    let last = times.len() - 1;
    let upper = times.partition_point(|t| (*t as f64) <= hour);
    if upper == 0 {
        return 0.0;
    }
    if upper > last {
        return last as f64;
    }
    let i = upper - 1;
    let (t0, t1) = (times[i] as f64, times[i + 1] as f64);
    if t1 <= t0 {
        return i as f64;
    }
    i as f64 + (hour - t0) / (t1 - t0)
}

/// Hour at a fractional axis position; the inverse of [`fractional_index`].
pub fn hour_at(times: &[i64], index: f64) -> f64 {
    match times.len() {
        0 => 0.0,
        1 => times[0] as f64,
        n => {
            let index = index.clamp(0.0, (n - 1) as f64);
            let i = (index.floor() as usize).min(n - 2);
            let frac = index - i as f64;
            times[i] as f64 + (times[i + 1] - times[i]) as f64 * frac
        }
    }
}

/// A probability chart with optional overlays.
pub struct ProbabilityChart<'a> {
    surface: &'a ProbabilitySurface,
    config: &'a ChartConfig,
    mean: Option<&'a [f64]>,
    deterministic: Option<&'a [f64]>,
    now: Option<f64>,
}

impl<'a> ProbabilityChart<'a> {
    pub fn new(surface: &'a ProbabilitySurface, config: &'a ChartConfig) -> Self {
        Self {
            surface,
            config,
            mean: None,
            deterministic: None,
            now: None,
        }
    }

    /// Ensemble mean per time offset, drawn as a dashed red line.
    pub fn with_mean(mut self, mean: &'a [f64]) -> Self {
        self.mean = Some(mean);
        self
    }

    /// Deterministic run per time offset, drawn as a dashed black line.
    pub fn with_deterministic(mut self, series: &'a [f64]) -> Self {
        self.deterministic = Some(series);
        self
    }

    /// Vertical marker at `hour`, skipped when outside the time range.
    pub fn with_now_marker(mut self, hour: f64) -> Self {
        self.now = Some(hour);
        self
    }

    pub fn render(&self) -> EnsembleResult<Figure> {
        let surface = self.surface;
        let config = self.config;
        let time_count = surface.times.len();
        let threshold_count = surface.thresholds.len();

        let grid = SurfaceGrid::new(&surface.values, time_count, threshold_count).ok_or_else(|| {
            EnsembleError::RenderError(format!(
                "surface of {} values does not match {} times x {} thresholds",
                surface.values.len(),
                time_count,
                threshold_count
            ))
        })?;
        for (label, series) in [("mean", self.mean), ("deterministic", self.deterministic)] {
            if let Some(series) = series {
                if series.len() != time_count {
                    return Err(EnsembleError::RenderError(format!(
                        "{} overlay has {} points for {} times",
                        label,
                        series.len(),
                        time_count
                    )));
                }
            }
        }
        if config.levels < 2 {
            return Err(EnsembleError::RenderError(format!(
                "need at least 2 contour levels, got {}",
                config.levels
            )));
        }

        let reserved_w = config.margin_left + config.margin_right;
        let reserved_h = config.margin_top + config.margin_bottom;
        if config.width <= reserved_w || config.height <= reserved_h {
            return Err(EnsembleError::RenderError(format!(
                "{}x{} leaves no room for the plot area",
                config.width, config.height
            )));
        }

        let mut pixmap = Pixmap::new(config.width, config.height).ok_or_else(|| {
            EnsembleError::RenderError(format!("cannot allocate {}x{} pixmap", config.width, config.height))
        })?;
        pixmap.fill(config.background.to_skia());

        let (first_hour, last_hour) = surface.time_range();
        let (low, high) = surface.threshold_range();
        let frame = Frame {
            left: config.margin_left,
            top: config.margin_top,
            width: config.width - reserved_w,
            height: config.height - reserved_h,
            hours: padded_range(first_hour as f64, last_hour as f64, 1.0),
            values: padded_range(low, high, 0.5),
        };
        let levels = linspace_levels(0.0, 100.0, config.levels);
        let colors = config.ramp.band_colors(levels.len() - 1);

        self.fill_bands(&mut pixmap, &frame, &grid, &levels, &colors);
        if config.draw_level_lines {
            self.draw_level_lines(&mut pixmap, &frame, &grid, &levels);
        }
        if let Some(mean) = self.mean {
            let stroke = dashed(config.line_width, vec![8.0, 5.0]);
            self.draw_series(&mut pixmap, &frame, mean, MEAN_COLOR, &stroke);
        }
        if let Some(series) = self.deterministic {
            let stroke = dashed(config.line_width, vec![8.0, 5.0]);
            self.draw_series(&mut pixmap, &frame, series, Color::BLACK, &stroke);
        }
        if let Some(hour) = self.now {
            self.draw_now_marker(&mut pixmap, &frame, hour);
        }
        self.draw_axes(&mut pixmap, &frame);
        self.draw_colorbar(&mut pixmap, &frame, &levels, &colors);

        debug!(
            variable = %surface.variable,
            times = time_count,
            width = config.width,
            height = config.height,
            "Rendered probability chart"
        );

        let png = encode_png(pixmap.data(), config.width as usize, config.height as usize)?;
        Ok(Figure {
            width: config.width,
            height: config.height,
            png,
        })
    }

    /// Rasterize bands per pixel, rows in parallel.
    fn fill_bands(
        &self,
        pixmap: &mut Pixmap,
        frame: &Frame,
        grid: &SurfaceGrid<'_>,
        levels: &[f64],
        colors: &[Color],
    ) {
        let times = &self.surface.times;
        let (t_lo, t_hi) = self.surface.threshold_range();
        let last_threshold = (grid.height() - 1) as f64;
        let background = self.config.background;

        let grid_x: Vec<f64> = (0..frame.width)
            .map(|px| fractional_index(times, frame.hour_at((frame.left + px) as f64 + 0.5)))
            .collect();

        let stride = self.config.width as usize * 4;
        let start = frame.left as usize * 4;
        let end = start + frame.width as usize * 4;

        pixmap
            .data_mut()
            .par_chunks_exact_mut(stride)
            .enumerate()
            .skip(frame.top as usize)
            .take(frame.height as usize)
            .for_each(|(row, line)| {
                let value = frame.value_at(row as f64 + 0.5);
                let grid_y = if t_hi > t_lo {
                    (value - t_lo) / (t_hi - t_lo) * last_threshold
                } else {
                    0.0
                };
                for (px, gx) in line[start..end].chunks_exact_mut(4).zip(&grid_x) {
                    let color = band_index(grid.sample(*gx, grid_y), levels)
                        .map(|band| colors[band])
                        .unwrap_or(background);
                    px.copy_from_slice(&[color.r, color.g, color.b, 255]);
                }
            });
    }

    fn draw_level_lines(&self, pixmap: &mut Pixmap, frame: &Frame, grid: &SurfaceGrid<'_>, levels: &[f64]) {
        let times = &self.surface.times;
        let (t_lo, t_hi) = self.surface.threshold_range();
        let last_threshold = (grid.height() - 1).max(1) as f64;
        let to_pixel = |gx: f32, gy: f32| {
            let value = t_lo + gy as f64 / last_threshold * (t_hi - t_lo);
            (frame.x(hour_at(times, gx as f64)), frame.y(value))
        };

        let mut pb = PathBuilder::new();
        // The outer levels bound the whole surface.
        for level in &levels[1..levels.len() - 1] {
            for segment in march_squares(grid, *level) {
                let (x0, y0) = to_pixel(segment.start.x, segment.start.y);
                let (x1, y1) = to_pixel(segment.end.x, segment.end.y);
                pb.move_to(x0, y0);
                pb.line_to(x1, y1);
            }
        }

        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: 0.6,
                ..Stroke::default()
            };
            let paint = solid_paint(Color::rgb(40, 40, 40).with_alpha(110));
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    /// Polyline through `(times[t], series[t])`; NaN values break the line.
    fn draw_series(&self, pixmap: &mut Pixmap, frame: &Frame, series: &[f64], color: Color, stroke: &Stroke) {
        let mut pb = PathBuilder::new();
        let mut pen_down = false;
        for (hour, value) in self.surface.times.iter().zip(series) {
            if value.is_nan() {
                pen_down = false;
                continue;
            }
            let (x, y) = (frame.x(*hour as f64), frame.y(*value));
            if pen_down {
                pb.line_to(x, y);
            } else {
                pb.move_to(x, y);
                pen_down = true;
            }
        }
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &solid_paint(color), stroke, Transform::identity(), None);
        }
    }

    fn draw_now_marker(&self, pixmap: &mut Pixmap, frame: &Frame, hour: f64) {
        let (lo, hi) = self.surface.time_range();
        if hour < lo as f64 || hour > hi as f64 {
            return;
        }
        let x = frame.x(hour);
        let mut pb = PathBuilder::new();
        pb.move_to(x, frame.top as f32);
        pb.line_to(x, frame.bottom());
        if let Some(path) = pb.finish() {
            let stroke = dashed(self.config.line_width, vec![2.0, 4.0]);
            let paint = solid_paint(NOW_COLOR.with_alpha(128));
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    fn draw_axes(&self, pixmap: &mut Pixmap, frame: &Frame) {
        let font = self.config.font_size;
        let black = solid_paint(Color::BLACK);
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };

        let mut pb = PathBuilder::new();
        if let Some(rect) = Rect::from_ltrb(frame.left as f32, frame.top as f32, frame.right(), frame.bottom()) {
            pb.push_rect(rect);
        }

        let (t_lo, t_hi) = self.surface.time_range();
        let step = x_tick_step(t_hi - t_lo, frame.width as f32, text_width("+00d 00h", font));
        let mut hour = -(-t_lo).div_euclid(step) * step;
        while hour <= t_hi {
            let x = frame.x(hour as f64);
            pb.move_to(x, frame.bottom());
            pb.line_to(x, frame.bottom() + TICK_LENGTH);
            draw_text(
                pixmap,
                &tick_label(hour),
                x,
                frame.bottom() + TICK_LENGTH + font,
                font,
                Color::BLACK,
                Anchor::Middle,
            );
            hour += step;
        }

        let (lo, hi) = frame.values;
        let step = nice_step((hi - lo) / 5.0);
        let decimals = if step >= 1.0 { 0 } else { (-step.log10()).ceil() as usize };
        let mut value = (lo / step).ceil() * step;
        while value <= hi + step * 1e-9 {
            let y = frame.y(value);
            pb.move_to(frame.left as f32 - TICK_LENGTH, y);
            pb.line_to(frame.left as f32, y);
            draw_text(
                pixmap,
                &format!("{:.*}", decimals, value),
                frame.left as f32 - TICK_LENGTH - 4.0,
                y,
                font,
                Color::BLACK,
                Anchor::End,
            );
            value += step;
        }

        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &black, &stroke, Transform::identity(), None);
        }
    }

    fn draw_colorbar(&self, pixmap: &mut Pixmap, frame: &Frame, levels: &[f64], colors: &[Color]) {
        let font = self.config.font_size;
        let left = frame.right() + self.config.colorbar_gap as f32;
        let width = self.config.colorbar_width as f32;
        let top = frame.top as f32;
        let height = frame.height as f32;
        let y_of = |level: f64| top + height - (level / 100.0) as f32 * height;

        for (band, color) in colors.iter().enumerate() {
            let (y0, y1) = (y_of(levels[band + 1]), y_of(levels[band]));
            if let Some(rect) = Rect::from_ltrb(left, y0, left + width, y1) {
                pixmap.fill_rect(rect, &solid_paint(*color), Transform::identity(), None);
            }
        }

        let mut pb = PathBuilder::new();
        if let Some(rect) = Rect::from_xywh(left, top, width, height) {
            pb.push_rect(rect);
        }

        // Thin labels out when the bands are too narrow for the font.
        let band_height = height / (levels.len() - 1) as f32;
        let every = ((font * 1.5) / band_height).ceil().max(1.0) as usize;
        for (i, level) in levels.iter().enumerate() {
            let y = y_of(*level);
            pb.move_to(left + width, y);
            pb.line_to(left + width + TICK_LENGTH, y);
            if i % every == 0 || i == levels.len() - 1 {
                draw_text(
                    pixmap,
                    &format!("{:.0}", level),
                    left + width + TICK_LENGTH + 4.0,
                    y,
                    font,
                    Color::BLACK,
                    Anchor::Start,
                );
            }
        }
        draw_text(pixmap, "%", left + width / 2.0, top - font, font, Color::BLACK, Anchor::Middle);

        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: 1.0,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &solid_paint(Color::BLACK), &stroke, Transform::identity(), None);
        }
    }
}

/// Smallest tick step whose labels fit side by side across `plot_width`.
pub fn x_tick_step(span_hours: i64, plot_width: f32, label_width: f32) -> i64 {
    let slot = label_width + 10.0;
    TICK_STEPS
        .iter()
        .copied()
        .find(|step| (span_hours / step + 1) as f32 * slot <= plot_width)
        .unwrap_or(TICK_STEPS[TICK_STEPS.len() - 1])
}

/// Round `raw` up to 1, 2 or 5 times a power of ten.
pub fn nice_step(raw: f64) -> f64 {
    if raw.is_nan() || raw <= 0.0 || raw.is_infinite() {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Widen a degenerate range so it maps to a non-zero span.
fn padded_range(lo: f64, hi: f64, pad: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - pad, hi + pad)
    }
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn dashed(width: f32, pattern: Vec<f32>) -> Stroke {
    Stroke {
        width,
        line_cap: LineCap::Butt,
        dash: StrokeDash::new(pattern, 0.0),
        ..Stroke::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_index_uneven_axis() {
        let times = [0, 1, 2, 5];
        assert_eq!(fractional_index(&times, 1.5), 1.5);
        assert_eq!(fractional_index(&times, 3.5), 2.5);
        assert_eq!(fractional_index(&times, -4.0), 0.0);
        assert_eq!(fractional_index(&times, 9.0), 3.0);
        assert_eq!(fractional_index(&[7], 7.0), 0.0);
    }

    #[test]
    fn test_hour_at_inverts_fractional_index() {
        let times = [-3, 0, 3, 9];
        for hour in [-3.0, -1.5, 0.0, 4.5, 9.0] {
            assert!((hour_at(&times, fractional_index(&times, hour)) - hour).abs() < 1e-9);
        }
    }

    #[test]
    fn test_x_tick_step_grows_with_span() {
        assert_eq!(x_tick_step(24, 800.0, 50.0), 3);
        assert_eq!(x_tick_step(240, 800.0, 50.0), 24);
        assert_eq!(x_tick_step(100_000, 800.0, 50.0), 96);
    }

    #[test]
    fn test_nice_step() {
        assert!((nice_step(0.3) - 0.5).abs() < 1e-12);
        assert_eq!(nice_step(1.0), 1.0);
        assert_eq!(nice_step(3.2), 5.0);
        assert_eq!(nice_step(7.0), 10.0);
        assert_eq!(nice_step(0.0), 1.0);
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range(0.0, 4.0, 1.0), (0.0, 4.0));
        assert_eq!(padded_range(2.0, 2.0, 0.5), (1.5, 2.5));
    }
}
