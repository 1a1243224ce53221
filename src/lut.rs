use std::sync::Arc;

use image::RgbaImage;
use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::brush::Region;
use crate::labels::{LabelColor, LabelId, LabelTable};

/// Label → RGBA table.
///
/// Holds explicit colors up to the highest ID with metadata. Background is
/// transparent and values without metadata get their palette color, so
/// unnamed paint stays visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupTable {
    colors: Vec<[u8; 4]>,
}

impl LookupTable {
    pub fn from_labels(labels: &LabelTable) -> Self {
        let len = labels.ids().map(|id| id.get() as usize + 1).max().unwrap_or(1);
        let mut colors: Vec<[u8; 4]> = (0..len).map(|v| Self::fallback(v as u16)).collect();
        for (id, info) in labels.iter() {
            colors[id.get() as usize] = info.color.to_array();
        }
        Self { colors }
    }

    #[inline]
    fn fallback(value: u16) -> [u8; 4] {
        match LabelId::new(value) {
            Some(id) => LabelColor::default_for(id).to_array(),
            None => LabelColor::TRANSPARENT.to_array(),
        }
    }

    #[inline]
    pub fn color(&self, value: u16) -> [u8; 4] {
        match self.colors.get(value as usize) {
            Some(color) => *color,
            None => Self::fallback(value),
        }
    }
}

/// RGBA image of a `(rows, cols)` label slice; one pixel per cell.
pub fn render_overlay(slice: &ArrayView2<'_, u16>, lut: &LookupTable) -> RgbaImage {
    let (height, width) = slice.dim();
    let mut overlay = RgbaImage::new(width as u32, height as u32);
    if width == 0 || height == 0 {
        return overlay;
    }
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut::<u8, [u8; 4]>(&mut overlay);
    pixels
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(r, row)| {
            for (c, px) in row.iter_mut().enumerate() {
                *px = lut.color(slice[[r, c]]);
            }
        });
    overlay
}

/// Recompute the pixels of `region` in place.
pub fn update_overlay(
    overlay: &mut RgbaImage,
    slice: &ArrayView2<'_, u16>,
    lut: &LookupTable,
    region: Region,
) {
    let (height, width) = slice.dim();
    if overlay.dimensions() != (width as u32, height as u32) {
        *overlay = render_overlay(slice, lut);
        return;
    }
    let bottom = region.bottom.min(height);
    let right = region.right.min(width);
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut::<u8, [u8; 4]>(overlay);
    for r in region.top..bottom {
        for c in region.left..right {
            pixels[r * width + c] = lut.color(slice[[r, c]]);
        }
    }
}

/// Overlay shared with the viewport, plus a spare buffer.
///
/// Writes land in whichever buffer the viewport is not holding. The spare is
/// caught up over the cells written since it was last current, so a stroke
/// never copies the whole image once both buffers exist.
#[derive(Debug)]
pub(crate) struct OverlayBuffer {
    front: Arc<RgbaImage>,
    spare: Option<(Arc<RgbaImage>, Region)>,
}

impl OverlayBuffer {
    pub(crate) fn new(image: RgbaImage) -> Self {
        Self {
            front: Arc::new(image),
            spare: None,
        }
    }

    pub(crate) fn image(&self) -> &RgbaImage {
        &self.front
    }

    pub(crate) fn shared(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.front)
    }

    /// Recompute `region` from `slice` in the current image.
    pub(crate) fn update(&mut self, slice: &ArrayView2<'_, u16>, lut: &LookupTable, region: Region) {
        if let Some((_, stale)) = self.spare.as_mut() {
            *stale = stale.union(region);
        }
        if let Some(front) = Arc::get_mut(&mut self.front) {
            update_overlay(front, slice, lut, region);
            return;
        }
        let reused = self.spare.take().and_then(|(mut spare, stale)| {
            let image = Arc::get_mut(&mut spare)?;
            update_overlay(image, slice, lut, stale);
            Some(spare)
        });
        let next = reused.unwrap_or_else(|| {
            let mut copy = RgbaImage::clone(&self.front);
            update_overlay(&mut copy, slice, lut, region);
            Arc::new(copy)
        });
        let previous = std::mem::replace(&mut self.front, next);
        self.spare = Some((previous, region));
    }
}
