use std::sync::Arc;

use image::{GrayImage, RgbaImage};
use log::debug;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::brush::Brush;
use crate::config::ViewportConfig;
use crate::enums::{BrushShape, Interpolation};
use crate::interpolator::{DisplayWindow, Interpolator};
use crate::labels::LabelColor;

/// Mapping between image indices `(row, col)` and canvas pixels `(x, y)`.
///
/// The image is scaled uniformly to fit the canvas, centered, then zoomed
/// and panned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
    rows: usize,
    cols: usize,
    flip_rows: bool,
}

impl ViewTransform {
    pub fn fit(
        shape: (usize, usize),
        canvas: (u32, u32),
        zoom: f32,
        pan: (f32, f32),
        flip_rows: bool,
    ) -> Option<Self> {
        let (rows, cols) = shape;
        if rows == 0 || cols == 0 || canvas.0 == 0 || canvas.1 == 0 {
            return None;
        }
        let (canvas_w, canvas_h) = (canvas.0 as f32, canvas.1 as f32);
        let scale = (canvas_w / cols as f32).min(canvas_h / rows as f32) * zoom;
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        Some(Self {
            scale,
            offset_x: (canvas_w - cols as f32 * scale) / 2.0 + pan.0,
            offset_y: (canvas_h - rows as f32 * scale) / 2.0 + pan.1,
            rows,
            cols,
            flip_rows,
        })
    }

    /// Canvas pixels per image cell.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Canvas position of the center of cell `(r, c)`, `None` outside the image.
    pub fn image_to_canvas(&self, r: usize, c: usize) -> Option<(f32, f32)> {
        if r >= self.rows || c >= self.cols {
            return None;
        }
        let display_row = if self.flip_rows { self.rows - 1 - r } else { r };
        Some((
            self.offset_x + (c as f32 + 0.5) * self.scale,
            self.offset_y + (display_row as f32 + 0.5) * self.scale,
        ))
    }

    /// Continuous image coordinates `(row, col)` of a canvas point, in display order.
    fn canvas_to_display(&self, x: f32, y: f32) -> (f32, f32) {
        ((y - self.offset_y) / self.scale, (x - self.offset_x) / self.scale)
    }

    /// Cell under a canvas point, `None` outside the image.
    pub fn canvas_to_image(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let (fr, fc) = self.canvas_to_display(x, y);
        if !(fr.is_finite() && fc.is_finite()) || fr < 0.0 || fc < 0.0 {
            return None;
        }
        let (dr, c) = (fr.floor() as usize, fc.floor() as usize);
        if dr >= self.rows || c >= self.cols {
            return None;
        }
        let r = if self.flip_rows { self.rows - 1 - dr } else { dr };
        Some((r, c))
    }
}

/// Handle for a registered pointer binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrushPreview {
    pub center: (usize, usize),
    pub brush: Brush,
    pub color: LabelColor,
}

struct Underlay {
    data: Array2<f32>,
    display: GrayImage,
    window: DisplayWindow,
}

/// Display surface: underlay, label overlay and brush preview composited
/// onto a canvas. It never writes label data.
pub struct ViewportRenderer {
    config: ViewportConfig,
    underlay: Option<Underlay>,
    overlay: Option<Arc<RgbaImage>>,
    preview: Option<BrushPreview>,
    zoom: f32,
    pan: (f32, f32),
    transform: Option<ViewTransform>,
    bindings: Vec<BindingId>,
    next_binding: u64,
    revision: u64,
    frame: Option<RgbaImage>,
}

impl Default for ViewportRenderer {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportRenderer {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            underlay: None,
            overlay: None,
            preview: None,
            zoom: 1.0,
            pan: (0.0, 0.0),
            transform: None,
            bindings: Vec::new(),
            next_binding: 0,
            revision: 0,
            frame: None,
        }
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// Replace the underlay and re-derive the transform from its shape.
    pub fn set_image(&mut self, image: Array2<f32>) {
        let window = Interpolator::percentile_window(
            &image.view(),
            self.config.window_low,
            self.config.window_high,
        );
        let display = Self::image_to_gray(&image.view(), window);
        debug!("Underlay set to {:?}, window {window:?}", image.dim());
        self.underlay = Some(Underlay {
            data: image,
            display,
            window,
        });
        self.invalidate();
    }

    /// Set or clear the label overlay.
    pub fn set_overlay_rgba(&mut self, overlay: Option<Arc<RgbaImage>>) {
        self.overlay = overlay;
        self.invalidate();
    }

    pub fn overlay(&self) -> Option<&RgbaImage> {
        self.overlay.as_deref()
    }

    /// Show or hide the outline of a brush footprint at `(r, c)`.
    pub fn set_brush_preview(
        &mut self,
        r: usize,
        c: usize,
        size: u32,
        shape: BrushShape,
        color: LabelColor,
        show: bool,
    ) {
        let preview = show.then(|| BrushPreview {
            center: (r, c),
            brush: Brush::new(shape, size),
            color,
        });
        if preview != self.preview {
            self.preview = preview;
            self.invalidate();
        }
    }

    pub fn brush_preview(&self) -> Option<&BrushPreview> {
        self.preview.as_ref()
    }

    /// Shape `(rows, cols)` of what is displayed: the underlay, else the overlay.
    pub fn image_shape(&self) -> Option<(usize, usize)> {
        match (&self.underlay, &self.overlay) {
            (Some(underlay), _) => Some(underlay.data.dim()),
            (None, Some(overlay)) => Some((overlay.height() as usize, overlay.width() as usize)),
            (None, None) => None,
        }
    }

    pub fn transform(&self) -> Option<&ViewTransform> {
        self.transform.as_ref()
    }

    pub fn canvas_to_image(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        self.transform?.canvas_to_image(x, y)
    }

    pub fn image_to_canvas(&self, r: usize, c: usize) -> Option<(f32, f32)> {
        self.transform?.image_to_canvas(r, c)
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self.invalidate();
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.config.canvas_width, self.config.canvas_height)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Limits come from the config; a NaN limit is ignored, and with
    /// `min_zoom > max_zoom` the result is `max_zoom`.
    pub fn set_zoom(&mut self, zoom: f32) {
        if !(zoom.is_finite() && zoom > 0.0) {
            return;
        }
        self.zoom = zoom.max(self.config.min_zoom).min(self.config.max_zoom);
        self.invalidate();
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan = (self.pan.0 + dx, self.pan.1 + dy);
        self.invalidate();
    }

    pub fn reset_view(&mut self) {
        self.zoom = 1.0;
        self.pan = (0.0, 0.0);
        self.invalidate();
    }

    pub fn bind_pointer(&mut self) -> BindingId {
        let id = BindingId(self.next_binding);
        self.next_binding += 1;
        self.bindings.push(id);
        id
    }

    /// Returns false if `id` was not bound.
    pub fn unbind_pointer(&mut self, id: BindingId) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| *b != id);
        self.bindings.len() != before
    }

    pub fn is_bound(&self, id: BindingId) -> bool {
        self.bindings.contains(&id)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Incremented by every setter that changes what is displayed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The current frame, re-rendered if anything changed since the last call.
    pub fn frame(&mut self) -> &RgbaImage {
        let frame = match self.frame.take() {
            Some(frame) => frame,
            None => self.render(),
        };
        self.frame.insert(frame)
    }

    /// Render the canvas: background, underlay, overlay, then brush outline.
    pub fn render(&self) -> RgbaImage {
        let (width, height) = self.canvas_size();
        let background = self.config.background.to_array();
        let mut canvas = RgbaImage::from_pixel(width, height, image::Rgba(background));
        let Some(transform) = self.transform else {
            return canvas;
        };
        if width == 0 || height == 0 {
            return canvas;
        }
        let (rows, cols) = transform.shape();
        let outline = self.preview_mask(rows, cols);
        let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut::<u8, [u8; 4]>(&mut canvas);
        pixels
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
                    let Some((r, c)) = transform.canvas_to_image(cx, cy) else {
                        continue;
                    };
                    let mut color = match self.sample_underlay(&transform, cx, cy, (r, c)) {
                        Some(gray) => [gray, gray, gray, 255],
                        None => background,
                    };
                    if let Some(overlay) = self.overlay_pixel(r, c) {
                        color = blend(color, overlay);
                    }
                    if let Some((mask, preview_color)) = &outline
                        && mask[r * cols + c]
                    {
                        color = *preview_color;
                    }
                    *px = color;
                }
            });
        canvas
    }

    fn invalidate(&mut self) {
        self.transform = self.image_shape().and_then(|shape| {
            ViewTransform::fit(
                shape,
                self.canvas_size(),
                self.zoom,
                self.pan,
                self.config.flip_rows,
            )
        });
        self.frame = None;
        self.revision += 1;
    }

    fn image_to_gray(image: &ArrayView2<'_, f32>, window: DisplayWindow) -> GrayImage {
        let (height, width) = image.dim();
        let pixel_data: Vec<u8> = image
            .outer_iter()
            .into_par_iter()
            .flat_map_iter(|row| {
                row.iter()
                    .map(|&v| Interpolator::normalize_to_u8(v, window))
                    .collect::<Vec<u8>>()
            })
            .collect();
        GrayImage::from_raw(width as u32, height as u32, pixel_data)
            .unwrap_or_else(|| GrayImage::new(width as u32, height as u32))
    }

    fn sample_underlay(
        &self,
        transform: &ViewTransform,
        x: f32,
        y: f32,
        (r, c): (usize, usize),
    ) -> Option<u8> {
        let underlay = self.underlay.as_ref()?;
        match self.config.interpolation {
            Interpolation::Nearest => Some(underlay.display.get_pixel(c as u32, r as u32).0[0]),
            Interpolation::Bilinear => {
                let (rows, cols) = underlay.data.dim();
                let (fr, fc) = transform.canvas_to_display(x, y);
                let src_r = (fr - 0.5).clamp(0.0, (rows - 1) as f32);
                let src_c = (fc - 0.5).clamp(0.0, (cols - 1) as f32);
                let src_r = if self.config.flip_rows {
                    (rows - 1) as f32 - src_r
                } else {
                    src_r
                };
                let value = Interpolator::bilinear_interpolate(&underlay.data.view(), src_r, src_c);
                Some(Interpolator::normalize_to_u8(value, underlay.window))
            }
        }
    }

    fn overlay_pixel(&self, r: usize, c: usize) -> Option<[u8; 4]> {
        let overlay = self.overlay.as_ref()?;
        if r < overlay.height() as usize && c < overlay.width() as usize {
            Some(overlay.get_pixel(c as u32, r as u32).0)
        } else {
            None
        }
    }

    fn preview_mask(&self, rows: usize, cols: usize) -> Option<(Vec<bool>, [u8; 4])> {
        let preview = self.preview?;
        let mut mask = vec![false; rows * cols];
        for (r, c) in preview.brush.outline(preview.center, (rows, cols)) {
            mask[r * cols + c] = true;
        }
        Some((mask, preview.color.to_array()))
    }
}

/// Source-over compositing of `top` onto an opaque `base`.
fn blend(base: [u8; 4], top: [u8; 4]) -> [u8; 4] {
    let alpha = top[3] as u32;
    let mix = |b: u8, t: u8| ((t as u32 * alpha + b as u32 * (255 - alpha) + 127) / 255) as u8;
    [mix(base[0], top[0]), mix(base[1], top[1]), mix(base[2], top[2]), 255]
}
