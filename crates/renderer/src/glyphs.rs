//! Minimal stroke font for axis labels.
//!
//! Each glyph is a list of polylines in a unit cell (x right, y down, both
//! 0..1) stroked with tiny-skia. It covers what tick labels need: digits,
//! sign characters, the `d`/`h` of time labels, and `%`.

use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::colormap::Color;

/// Glyph width relative to font size.
const ASPECT: f32 = 0.55;
/// Gap between glyphs relative to font size.
const TRACKING: f32 = 0.2;

/// Horizontal placement of text relative to the anchor x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

/// Rendered width of `text` at `size` pixels tall.
pub fn text_width(text: &str, size: f32) -> f32 {
    let n = text.chars().count() as f32;
    if n == 0.0 {
        0.0
    } else {
        n * size * ASPECT + (n - 1.0) * size * TRACKING
    }
}

/// Draw `text` with its vertical center at `y`.
pub fn draw_text(
    pixmap: &mut Pixmap,
    text: &str,
    x: f32,
    y: f32,
    size: f32,
    color: Color,
    anchor: Anchor,
) {
    let width = text_width(text, size);
    let left = match anchor {
        Anchor::Start => x,
        Anchor::Middle => x - width / 2.0,
        Anchor::End => x - width,
    };
    let top = y - size / 2.0;
    let glyph_w = size * ASPECT;

    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;

    let stroke = Stroke {
        width: (size * 0.12).max(1.0),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    let mut pb = PathBuilder::new();
    for (i, ch) in text.chars().enumerate() {
        let origin_x = left + i as f32 * (glyph_w + size * TRACKING);
        for line in glyph(ch) {
            let mut points = line.iter().map(|(gx, gy)| (origin_x + gx * glyph_w, top + gy * size));
            if let Some((px, py)) = points.next() {
                pb.move_to(px, py);
                for (px, py) in points {
                    pb.line_to(px, py);
                }
            }
        }
    }

    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

/// Polylines for one glyph; unknown characters draw nothing.
fn glyph(ch: char) -> &'static [&'static [(f32, f32)]] {
    match ch {
        '0' => &[&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)], &[(1.0, 0.0), (0.0, 1.0)]],
        '1' => &[&[(0.2, 0.2), (0.55, 0.0), (0.55, 1.0)], &[(0.2, 1.0), (0.9, 1.0)]],
        '2' => &[&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.5), (0.0, 0.5), (0.0, 1.0), (1.0, 1.0)]],
        '3' => &[&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)], &[(0.2, 0.5), (1.0, 0.5)]],
        '4' => &[&[(0.0, 0.0), (0.0, 0.55), (1.0, 0.55)], &[(0.75, 0.2), (0.75, 1.0)]],
        '5' => &[&[(1.0, 0.0), (0.0, 0.0), (0.0, 0.5), (1.0, 0.5), (1.0, 1.0), (0.0, 1.0)]],
        '6' => &[&[(1.0, 0.0), (0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.5), (0.0, 0.5)]],
        '7' => &[&[(0.0, 0.0), (1.0, 0.0), (0.35, 1.0)]],
        '8' => &[&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)], &[(0.0, 0.5), (1.0, 0.5)]],
        '9' => &[&[(1.0, 0.5), (0.0, 0.5), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]],
        '+' => &[&[(0.0, 0.5), (1.0, 0.5)], &[(0.5, 0.2), (0.5, 0.8)]],
        '-' => &[&[(0.1, 0.5), (0.9, 0.5)]],
        '.' => &[&[(0.45, 0.9), (0.55, 1.0)]],
        'd' => &[&[(1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.45), (1.0, 0.45)]],
        'h' => &[&[(0.0, 0.0), (0.0, 1.0)], &[(0.0, 0.45), (1.0, 0.45), (1.0, 1.0)]],
        '%' => &[&[(0.0, 1.0), (1.0, 0.0)], &[(0.1, 0.1), (0.3, 0.1)], &[(0.7, 0.9), (0.9, 0.9)]],
        _ => &[],
    }
}
