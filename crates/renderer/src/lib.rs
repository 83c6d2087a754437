//! Chart rendering for ensemble probability surfaces.
//!
//! - Filled exceedance bands with level boundaries (marching squares)
//! - Mean, deterministic and "now" overlays
//! - Axes, tick labels and a colorbar drawn with a small stroke font
//! - PNG output (indexed when the palette fits)

pub mod chart;
pub mod colormap;
pub mod contour;
pub mod glyphs;
pub mod png;

pub use chart::{ChartConfig, ProbabilityChart};
pub use colormap::{Color, ColorRamp};
