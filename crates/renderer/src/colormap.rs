//! Colors and color ramps for probability charts.

use serde::{Deserialize, Serialize};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Parse `#rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// Linear color interpolation
pub fn interpolate_color(from: Color, to: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color::new(
        mix(from.r, to.r),
        mix(from.g, to.g),
        mix(from.b, to.b),
        mix(from.a, to.a),
    )
}

/// A piecewise-linear ramp over evenly spaced color stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    pub name: String,
    pub stops: Vec<Color>,
}

impl ColorRamp {
    /// Sequential white-to-navy ramp (ColorBrewer "Blues").
    pub fn blues() -> Self {
        let stops = [
            "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5",
            "#08519c", "#08306b",
        ]
        .iter()
        .filter_map(|hex| Color::from_hex(hex))
        .collect();
        Self {
            name: "Blues".to_string(),
            stops,
        }
    }

    /// Color at `t` in [0, 1]; values outside are clamped.
    pub fn sample(&self, t: f32) -> Color {
        match self.stops.len() {
            0 => Color::BLACK,
            1 => self.stops[0],
            n => {
                let pos = t.clamp(0.0, 1.0) * (n - 1) as f32;
                let lower = (pos.floor() as usize).min(n - 2);
                interpolate_color(self.stops[lower], self.stops[lower + 1], pos - lower as f32)
            }
        }
    }

    /// One color per band, lightest band first; the first and last bands
    /// take the ramp ends.
    pub fn band_colors(&self, bands: usize) -> Vec<Color> {
        match bands {
            0 => vec![],
            1 => vec![self.sample(0.5)],
            _ => (0..bands)
                .map(|i| self.sample(i as f32 / (bands - 1) as f32))
                .collect(),
        }
    }
}
