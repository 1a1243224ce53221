use serde::{Deserialize, Serialize};

use crate::enums::{BrushShape, Interpolation};
use crate::labels::LabelColor;
use crate::redraw::RedrawPolicy;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    pub brush_shape: BrushShape,
    pub brush_radius: u32,
    pub redraw: RedrawPolicy,
    /// Outline color of the hover preview.
    pub hover_color: LabelColor,
    pub show_overlay: bool,
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            brush_shape: BrushShape::Circle,
            brush_radius: 1,
            redraw: RedrawPolicy::default(),
            hover_color: LabelColor::new(255, 255, 255, 255),
            show_overlay: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background: LabelColor,
    pub interpolation: Interpolation,
    /// Show row 0 at the bottom of the canvas.
    pub flip_rows: bool,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Percentiles of the underlay mapped to black and white.
    pub window_low: f32,
    pub window_high: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            canvas_width: 512,
            canvas_height: 512,
            background: LabelColor::new(0x11, 0x11, 0x11, 255),
            interpolation: Interpolation::Nearest,
            flip_rows: false,
            min_zoom: 0.1,
            max_zoom: 16.0,
            window_low: 1.0,
            window_high: 99.0,
        }
    }
}
