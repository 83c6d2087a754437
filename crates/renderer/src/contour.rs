//! Filled contour bands and level boundaries (marching squares) over a
//! probability surface.
//!
//! Grid coordinates: `x` runs along the time axis, `y` along the threshold
//! axis. A value at `(x, y)` lives at `data[x * height + y]`, matching the
//! row-major-by-time layout of `ProbabilitySurface`.

/// A point in grid or pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A line segment between two points
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// Evenly spaced contour levels over `[min, max]`, both ends included.
pub fn linspace_levels(min: f64, max: f64, count: usize) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![min],
        _ => {
            let step = (max - min) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { max } else { min + step * i as f64 })
                .collect()
        }
    }
}

/// Band containing `value`: band `i` spans `[levels[i], levels[i + 1])`, and
/// the top level belongs to the last band. `None` for NaN or out-of-range.
pub fn band_index(value: f64, levels: &[f64]) -> Option<usize> {
    if levels.len() < 2 || value.is_nan() {
        return None;
    }
    let last = levels.len() - 1;
    if value < levels[0] || value > levels[last] {
        return None;
    }
    if value == levels[last] {
        return Some(last - 1);
    }
    // First level strictly above the value closes the band.
    let upper = levels.partition_point(|l| *l <= value);
    Some(upper - 1)
}

/// Read-only view over a `width x height` grid laid out column-per-x.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceGrid<'a> {
    data: &'a [f64],
    width: usize,
    height: usize,
}

impl<'a> SurfaceGrid<'a> {
    pub fn new(data: &'a [f64], width: usize, height: usize) -> Option<Self> {
        (width > 0 && height > 0 && data.len() == width * height).then_some(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.data[x * self.height + y]
    }

    /// Bilinear sample at fractional grid coordinates, clamped to the grid.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let x = x.clamp(0.0, (self.width - 1) as f64);
        let y = y.clamp(0.0, (self.height - 1) as f64);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let dx = x - x0 as f64;
        let dy = y - y0 as f64;

        let bottom = self.value(x0, y0) * (1.0 - dx) + self.value(x1, y0) * dx;
        let top = self.value(x0, y1) * (1.0 - dx) + self.value(x1, y1) * dx;
        bottom * (1.0 - dy) + top * dy
    }
}

/// Marching squares: segments where the grid crosses `level`, in grid
/// coordinates.
pub fn march_squares(grid: &SurfaceGrid<'_>, level: f64) -> Vec<Segment> {
    let mut segments = Vec::new();
    if grid.width < 2 || grid.height < 2 {
        return segments;
    }

    for x in 0..grid.width - 1 {
        for y in 0..grid.height - 1 {
            // Corners counter-clockwise from (x, y).
            let a = grid.value(x, y);
            let b = grid.value(x + 1, y);
            let c = grid.value(x + 1, y + 1);
            let d = grid.value(x, y + 1);
            if a.is_nan() || b.is_nan() || c.is_nan() || d.is_nan() {
                continue;
            }

            let case = (a >= level) as u8
                | ((b >= level) as u8) << 1
                | ((c >= level) as u8) << 2
                | ((d >= level) as u8) << 3;

            let (fx, fy) = (x as f32, y as f32);
            let south = || Point::new(fx + crossing(a, b, level), fy);
            let east = || Point::new(fx + 1.0, fy + crossing(b, c, level));
            let north = || Point::new(fx + crossing(d, c, level), fy + 1.0);
            let west = || Point::new(fx, fy + crossing(a, d, level));
            let mut push = |start: Point, end: Point| segments.push(Segment { start, end });

            match case {
                0 | 15 => {}
                1 | 14 => push(west(), south()),
                2 | 13 => push(south(), east()),
                3 | 12 => push(west(), east()),
                4 | 11 => push(east(), north()),
                6 | 9 => push(south(), north()),
                7 | 8 => push(west(), north()),
                5 => {
                    push(west(), north());
                    push(south(), east());
                }
                10 => {
                    push(west(), south());
                    push(east(), north());
                }
                _ => unreachable!("four corner bits"),
            }
        }
    }

    segments
}

/// Fraction along an edge from value `v0` to `v1` where `level` is crossed.
fn crossing(v0: f64, v1: f64, level: f64) -> f32 {
    if (v1 - v0).abs() < 1e-12 {
        return 0.5;
    }
    ((level - v0) / (v1 - v0)).clamp(0.0, 1.0) as f32
}
