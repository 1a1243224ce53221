use image::RgbaImage;
use log::{debug, info, warn};
use ndarray::ArrayView2;
use web_time::Instant;

use crate::brush::{self, Brush, Region};
use crate::command::LabelCommand;
use crate::config::PainterConfig;
use crate::enums::{BrushShape, PointerButton, SliceAxis};
use crate::error::{PaintError, Result};
use crate::labels::{LabelColor, LabelId};
use crate::lut::{self, LookupTable, OverlayBuffer};
use crate::redraw::RedrawScheduler;
use crate::viewport::{BindingId, ViewportRenderer};
use crate::volume::LabelVolumeState;

/// Pointer input in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Press { x: f32, y: f32, button: PointerButton },
    Drag { x: f32, y: f32 },
    Release { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Leave,
}

/// Snapshot of what the painter writes and where.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PainterState {
    pub active_label: Option<LabelId>,
    pub erase_mode: bool,
    pub slice_axis: SliceAxis,
    pub slice_index: usize,
}

#[derive(Clone, Copy, Debug)]
struct Stroke {
    value: u16,
    last: Option<(usize, usize)>,
}

/// Slice-level label editor.
///
/// Borrows the viewport it draws into and, once bound with
/// [`set_label_volume`](Self::set_label_volume), the volume it edits. Strokes
/// write straight into the bound slice of that volume. The RGBA overlay is
/// kept in sync with the slice after every write; pushing it to the viewport
/// follows the configured [`RedrawPolicy`](crate::redraw::RedrawPolicy).
///
/// Dropping the painter detaches it.
pub struct LabelMapPainter<'a> {
    viewport: &'a mut ViewportRenderer,
    volume: Option<&'a mut LabelVolumeState>,
    brush: Brush,
    hover_color: LabelColor,
    active_label: Option<LabelId>,
    erase_mode: bool,
    axis: SliceAxis,
    index: usize,
    lut: Option<LookupTable>,
    overlay: Option<OverlayBuffer>,
    overlay_visible: bool,
    scheduler: RedrawScheduler,
    binding: Option<BindingId>,
    stroke: Option<Stroke>,
}

impl<'a> LabelMapPainter<'a> {
    pub fn new(viewport: &'a mut ViewportRenderer, config: PainterConfig) -> Self {
        Self {
            viewport,
            volume: None,
            brush: Brush::new(config.brush_shape, config.brush_radius),
            hover_color: config.hover_color,
            active_label: None,
            erase_mode: false,
            axis: SliceAxis::Z,
            index: 0,
            lut: None,
            overlay: None,
            overlay_visible: config.show_overlay,
            scheduler: RedrawScheduler::new(config.redraw),
            binding: None,
            stroke: None,
        }
    }

    /// Register for pointer events on the viewport. Returns false if already attached.
    pub fn attach(&mut self) -> bool {
        if self.binding.is_some() {
            return false;
        }
        let id = self.viewport.bind_pointer();
        info!("Painter attached with binding {id:?}");
        self.binding = Some(id);
        true
    }

    /// Drop the pointer binding, hide painter visuals and release the volume.
    pub fn detach(&mut self) -> Option<&'a mut LabelVolumeState> {
        if let Some(id) = self.binding.take() {
            self.viewport.unbind_pointer(id);
            info!("Painter detached from binding {id:?}");
        }
        self.stroke = None;
        self.scheduler.clear();
        self.hide_hover();
        self.overlay = None;
        self.lut = None;
        if self.viewport.overlay().is_some() {
            self.viewport.set_overlay_rgba(None);
        }
        self.volume.take()
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_some()
    }

    /// Bind a volume and select the slice at `index` along `axis`.
    ///
    /// Fails without changing anything if the axis or index is invalid.
    pub fn set_label_volume(
        &mut self,
        volume: &'a mut LabelVolumeState,
        axis: usize,
        index: usize,
    ) -> Result<()> {
        let axis = SliceAxis::try_from(axis)?;
        volume.slice(axis, index)?;
        debug!("Label volume {:?} bound at {axis:?}[{index}]", volume.dim());
        self.volume = Some(volume);
        self.axis = axis;
        self.index = index;
        self.stroke = None;
        self.refresh_overlay_full();
        Ok(())
    }

    /// Move to another slice along the current axis.
    pub fn set_slice_index(&mut self, index: usize) -> Result<()> {
        self.set_slice(self.axis.index(), index)
    }

    pub fn set_slice(&mut self, axis: usize, index: usize) -> Result<()> {
        let axis = SliceAxis::try_from(axis)?;
        let volume = self.volume.as_deref().ok_or(PaintError::NotAttached)?;
        volume.slice(axis, index)?;
        self.axis = axis;
        self.index = index;
        self.stroke = None;
        debug!("Slice changed to {axis:?}[{index}]");
        self.rebuild_overlay();
        self.scheduler.clear();
        self.push_overlay();
        Ok(())
    }

    /// Value written by subsequent strokes. Need not have metadata yet.
    pub fn set_active_label(&mut self, label: Option<LabelId>) {
        self.active_label = label;
    }

    pub fn active_label(&self) -> Option<LabelId> {
        self.active_label
    }

    pub fn set_erase_mode(&mut self, erase: bool) {
        self.erase_mode = erase;
    }

    pub fn erase_mode(&self) -> bool {
        self.erase_mode
    }

    pub fn set_brush(&mut self, radius: u32, shape: BrushShape) {
        self.brush = Brush::new(shape, radius);
    }

    pub fn bump_radius(&mut self, delta: i32) {
        let radius = (self.brush.radius() as i64 + delta as i64).clamp(1, u32::MAX as i64);
        self.brush.set_radius(radius as u32);
    }

    pub fn brush(&self) -> Brush {
        self.brush
    }

    pub fn state(&self) -> PainterState {
        PainterState {
            active_label: self.active_label,
            erase_mode: self.erase_mode,
            slice_axis: self.axis,
            slice_index: self.index,
        }
    }

    pub fn volume(&self) -> Option<&LabelVolumeState> {
        self.volume.as_deref()
    }

    /// The bound slice.
    pub fn slice(&self) -> Option<ArrayView2<'_, u16>> {
        self.volume.as_deref()?.slice(self.axis, self.index).ok()
    }

    /// Overlay derived from the bound slice, current with the last write.
    pub fn overlay(&self) -> Option<&RgbaImage> {
        self.overlay.as_ref().map(OverlayBuffer::image)
    }

    pub fn viewport(&self) -> &ViewportRenderer {
        &*self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportRenderer {
        &mut *self.viewport
    }

    /// Value strokes write: 0 when erasing, else the active label.
    fn stroke_value(&self) -> Option<u16> {
        if self.erase_mode {
            Some(0)
        } else {
            self.active_label.map(LabelId::get)
        }
    }

    /// Stamp the brush at every point of a stroke given in slice indices.
    ///
    /// Returns the region written, `None` if nothing was written.
    pub fn paint_stroke(
        &mut self,
        points: &[(usize, usize)],
        brush_radius: u32,
        brush_shape: BrushShape,
    ) -> Result<Option<Region>> {
        if self.volume.is_none() {
            return Err(PaintError::NotAttached);
        }
        let Some(value) = self.stroke_value() else {
            warn!("Stroke ignored, no active label");
            return Ok(None);
        };
        let region = self.stamp(points, Brush::new(brush_shape, brush_radius), value)?;
        self.flush();
        Ok(region)
    }

    /// [`paint_stroke`](Self::paint_stroke) with the configured brush.
    pub fn paint(&mut self, points: &[(usize, usize)]) -> Result<Option<Region>> {
        self.paint_stroke(points, self.brush.radius(), self.brush.shape)
    }

    fn stamp(&mut self, points: &[(usize, usize)], brush: Brush, value: u16) -> Result<Option<Region>> {
        let (axis, index) = (self.axis, self.index);
        let volume = self.volume.as_deref_mut().ok_or(PaintError::NotAttached)?;
        let mut slice = volume.slice_mut(axis, index)?;
        let shape = slice.dim();

        let mut dirty: Option<Region> = None;
        for &point in points {
            let Some(bounds) = brush.bounds(point, shape) else {
                continue;
            };
            for cell in brush.footprint(point, shape) {
                slice[cell] = value;
            }
            dirty = Some(dirty.map_or(bounds, |d| d.union(bounds)));
        }
        let Some(region) = dirty else {
            return Ok(None);
        };

        let view = slice.view();
        if let Some(lut) = self.lut.as_ref() {
            match self.overlay.as_mut() {
                Some(overlay) => overlay.update(&view, lut, region),
                None => self.overlay = Some(OverlayBuffer::new(lut::render_overlay(&view, lut))),
            }
        }
        debug!("Stamped {} point(s) with {value} in {region:?}", points.len());

        self.scheduler.request(region);
        if self.scheduler.poll(Instant::now()).is_some() {
            self.push_overlay();
        }
        Ok(Some(region))
    }

    /// Push any overlay change still waiting for a redraw pass.
    pub fn flush(&mut self) {
        if self.scheduler.flush(Instant::now()).is_some() {
            self.push_overlay();
        }
    }

    pub fn is_redraw_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// When [`tick`](Self::tick) will next push a pending overlay change.
    pub fn next_redraw_due(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    /// Idle hook for the event loop: push a pending overlay change whose
    /// redraw interval has elapsed at `now`. Returns true if one was pushed.
    ///
    /// Call it at [`next_redraw_due`](Self::next_redraw_due) so a paused
    /// stroke is shown without waiting for the next pointer event.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.scheduler.poll(now).is_some() {
            self.push_overlay();
            true
        } else {
            false
        }
    }

    /// Show or hide the brush outline at `(r, c)`. Never touches the matrix.
    pub fn set_hover_preview(&mut self, r: usize, c: usize, show: bool) {
        self.viewport.set_brush_preview(
            r,
            c,
            self.brush.radius(),
            self.brush.shape,
            self.hover_color,
            show,
        );
    }

    fn hide_hover(&mut self) {
        self.set_hover_preview(0, 0, false);
    }

    /// Change a label's color and redraw; the matrix is untouched.
    pub fn set_label_color(&mut self, label: LabelId, rgb: [u8; 3], alpha: u8) -> Result<()> {
        let volume = self.volume.as_deref_mut().ok_or(PaintError::NotAttached)?;
        volume.set_label_color(label, LabelColor::from_rgb(rgb, alpha))?;
        self.refresh_overlay_full();
        Ok(())
    }

    /// Apply an identity operation to the bound volume, then redraw fully.
    pub fn apply(&mut self, command: LabelCommand) -> Result<()> {
        let volume = self.volume.as_deref_mut().ok_or(PaintError::NotAttached)?;
        volume.apply(command)?;
        self.refresh_overlay_full();
        Ok(())
    }

    /// Set every cell of the bound slice to background.
    pub fn clear_slice(&mut self) -> Result<()> {
        let (axis, index) = (self.axis, self.index);
        let volume = self.volume.as_deref_mut().ok_or(PaintError::NotAttached)?;
        volume.slice_mut(axis, index)?.fill(0);
        info!("Cleared slice {axis:?}[{index}]");
        self.refresh_overlay_full();
        Ok(())
    }

    /// Recompute lookup table and overlay for the bound slice and push it.
    pub fn refresh_overlay_full(&mut self) {
        self.lut = self
            .volume
            .as_deref()
            .map(|volume| LookupTable::from_labels(volume.labels()));
        self.rebuild_overlay();
        self.scheduler.clear();
        self.push_overlay();
        debug!("Overlay refreshed for {:?}[{}]", self.axis, self.index);
    }

    pub fn set_overlay_visible(&mut self, visible: bool) {
        self.overlay_visible = visible;
        if visible {
            self.refresh_overlay_full();
        } else {
            self.viewport.set_overlay_rgba(None);
        }
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    fn rebuild_overlay(&mut self) {
        self.overlay = match (self.volume.as_deref(), self.lut.as_ref()) {
            (Some(volume), Some(lut)) => volume
                .slice(self.axis, self.index)
                .ok()
                .map(|slice| OverlayBuffer::new(lut::render_overlay(&slice, lut))),
            _ => None,
        };
    }

    fn push_overlay(&mut self) {
        let overlay = if self.overlay_visible {
            self.overlay.as_ref().map(OverlayBuffer::shared)
        } else {
            None
        };
        self.viewport.set_overlay_rgba(overlay);
    }

    /// Route a pointer event. Returns true if label data changed.
    ///
    /// Ignored while detached or without a bound volume. A press with the
    /// secondary button starts an erasing stroke.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        if self.binding.is_none() || self.volume.is_none() {
            return false;
        }
        match event {
            PointerEvent::Press { x, y, button } => {
                let value = match button {
                    PointerButton::Secondary => Some(0),
                    PointerButton::Primary => self.stroke_value(),
                };
                let Some(value) = value else {
                    warn!("Stroke ignored, no active label");
                    return false;
                };
                let point = self.viewport.canvas_to_image(x, y);
                self.stroke = Some(Stroke { value, last: point });
                self.follow_hover(point);
                point.is_some_and(|p| self.stamp_logged(&[p], value))
            }
            PointerEvent::Drag { x, y } => {
                let point = self.viewport.canvas_to_image(x, y);
                self.follow_hover(point);
                let Some(stroke) = self.stroke.as_mut() else {
                    return false;
                };
                let last = std::mem::replace(&mut stroke.last, point);
                let value = stroke.value;
                match (last, point) {
                    (Some(from), Some(to)) => self.stamp_logged(&brush::line(from, to), value),
                    (None, Some(to)) => self.stamp_logged(&[to], value),
                    (_, None) => false,
                }
            }
            PointerEvent::Release { x, y } => {
                let changed = match self.stroke.take() {
                    Some(Stroke { value, last: Some(from) }) => {
                        match self.viewport.canvas_to_image(x, y) {
                            Some(to) if to != from => self.stamp_logged(&brush::line(from, to), value),
                            _ => false,
                        }
                    }
                    _ => false,
                };
                self.flush();
                changed
            }
            PointerEvent::Move { x, y } => {
                let point = self.viewport.canvas_to_image(x, y);
                self.follow_hover(point);
                false
            }
            PointerEvent::Leave => {
                self.hide_hover();
                false
            }
        }
    }

    fn follow_hover(&mut self, point: Option<(usize, usize)>) {
        match point {
            Some((r, c)) => self.set_hover_preview(r, c, true),
            None => self.hide_hover(),
        }
    }

    fn stamp_logged(&mut self, points: &[(usize, usize)], value: u16) -> bool {
        match self.stamp(points, self.brush, value) {
            Ok(region) => region.is_some(),
            Err(err) => {
                warn!("Stroke failed: {err}");
                false
            }
        }
    }
}

impl Drop for LabelMapPainter<'_> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewportConfig;
    use crate::enums::ConflictResolution;
    use crate::redraw::RedrawPolicy;
    use ndarray::Array2;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn id(v: u16) -> LabelId {
        LabelId::new(v).unwrap()
    }

    fn immediate() -> PainterConfig {
        PainterConfig {
            redraw: RedrawPolicy::Immediate,
            ..PainterConfig::default()
        }
    }

    /// 9x9 canvas showing a 9x9 slice, one pixel per cell.
    fn viewport() -> ViewportRenderer {
        let mut viewport = ViewportRenderer::new(ViewportConfig {
            canvas_width: 9,
            canvas_height: 9,
            ..ViewportConfig::default()
        });
        viewport.set_image(Array2::zeros((9, 9)));
        viewport
    }

    fn state() -> LabelVolumeState {
        let mut state = LabelVolumeState::with_dim((9, 9, 3)).unwrap();
        state
            .add_label(id(1), "Label 1", LabelColor::new(255, 0, 0, 255))
            .unwrap();
        state
            .add_label(id(7), "Tumor", LabelColor::new(0, 0, 255, 255))
            .unwrap();
        state
    }

    fn assert_consistent(painter: &LabelMapPainter<'_>) {
        let volume = painter.volume().unwrap();
        assert!(volume.validate().is_ok());
        let slice = painter.slice().unwrap();
        let lut = LookupTable::from_labels(volume.labels());
        assert_eq!(painter.overlay().unwrap(), &lut::render_overlay(&slice, &lut));
    }

    #[test]
    fn invalid_binding_changes_nothing() {
        let mut viewport = viewport();
        let mut first = state();
        let mut second = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut first, 2, 1).unwrap();
        assert_eq!(
            painter.set_label_volume(&mut second, 3, 0),
            Err(PaintError::InvalidAxis(3))
        );
        assert_eq!(painter.state().slice_index, 1);
        assert_eq!(
            painter.set_slice_index(3),
            Err(PaintError::IndexOutOfRange {
                axis: SliceAxis::Z,
                index: 3,
                len: 3
            })
        );
        assert_eq!(painter.state().slice_axis, SliceAxis::Z);
        assert_eq!(painter.state().slice_index, 1);
    }

    #[test]
    fn operations_need_a_volume() {
        let mut viewport = viewport();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        assert_eq!(painter.set_slice_index(0), Err(PaintError::NotAttached));
        assert_eq!(
            painter.paint_stroke(&[(0, 0)], 1, BrushShape::Circle),
            Err(PaintError::NotAttached)
        );
        assert_eq!(
            painter.apply(LabelCommand::Delete { label: id(1) }),
            Err(PaintError::NotAttached)
        );
        assert!(painter.overlay().is_none());
    }

    #[test]
    fn circle_stroke_writes_exact_footprint() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(1)));
        painter.paint_stroke(&[(4, 4)], 2, BrushShape::Circle).unwrap();

        let slice = painter.slice().unwrap();
        for ((r, c), &v) in slice.indexed_iter() {
            let (dr, dc) = (r as i64 - 4, c as i64 - 4);
            let expected = if dr * dr + dc * dc <= 4 { 1 } else { 0 };
            assert_eq!(v, expected, "cell ({r}, {c})");
        }
        assert_consistent(&painter);
        drop(painter);
        assert_eq!(state.volume().data()[[4, 4, 0]], 1);
        assert_eq!(state.volume().count(1), 13);
    }

    #[test]
    fn stroke_near_edge_is_clamped() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 0, 8).unwrap();
        painter.set_active_label(Some(id(7)));
        let region = painter
            .paint_stroke(&[(0, 0)], 1, BrushShape::Square)
            .unwrap()
            .unwrap();
        assert_eq!(region, Region { top: 0, left: 0, bottom: 2, right: 2 });
        assert_eq!(painter.volume().unwrap().volume().count(7), 4);
        assert_consistent(&painter);
    }

    #[test]
    fn erase_mode_writes_background() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(7)));
        painter.paint_stroke(&[(4, 4)], 3, BrushShape::Square).unwrap();
        painter.set_erase_mode(true);
        painter.paint_stroke(&[(4, 4)], 1, BrushShape::Square).unwrap();
        let slice = painter.slice().unwrap();
        assert_eq!(slice[[4, 4]], 0);
        assert_eq!(slice[[3, 3]], 0);
        assert_eq!(slice[[2, 2]], 7);

        painter.set_active_label(None);
        painter.paint_stroke(&[(1, 1)], 1, BrushShape::Circle).unwrap();
        assert_eq!(painter.slice().unwrap()[[1, 1]], 0);
        assert_consistent(&painter);
    }

    #[test]
    fn stroke_without_label_is_ignored() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        assert_eq!(painter.paint(&[(4, 4)]).unwrap(), None);
        assert_eq!(painter.volume().unwrap().volume().count(0), 9 * 9 * 3);
    }

    #[test]
    fn unnamed_label_paints_but_fails_validation() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(4)));
        painter.paint(&[(2, 2)]).unwrap();
        let expected = LabelColor::default_for(id(4)).to_array();
        assert_eq!(painter.overlay().unwrap().get_pixel(2, 2).0, expected);
        assert_eq!(
            painter.volume().unwrap().validate(),
            Err(PaintError::Unlabeled { labels: vec![4] })
        );
    }

    #[test]
    fn slice_change_rederives_overlay() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(1)));
        painter.paint(&[(0, 0)]).unwrap();
        assert_eq!(painter.overlay().unwrap().get_pixel(0, 0).0, [255, 0, 0, 255]);

        painter.set_slice_index(1).unwrap();
        assert_eq!(painter.overlay().unwrap().get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(painter.viewport().overlay(), painter.overlay());

        painter.set_slice_index(0).unwrap();
        assert_eq!(painter.overlay().unwrap().get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_consistent(&painter);
    }

    #[test]
    fn label_color_change_keeps_matrix() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(1)));
        painter.paint(&[(3, 3)]).unwrap();
        let before = painter.slice().unwrap().to_owned();

        painter.set_label_color(id(1), [0, 200, 0], 128).unwrap();
        assert_eq!(painter.slice().unwrap(), before);
        assert_eq!(painter.overlay().unwrap().get_pixel(3, 3).0, [0, 200, 0, 128]);
        assert_eq!(
            painter.set_label_color(id(5), [1, 1, 1], 255),
            Err(PaintError::UnknownLabel(5))
        );
        assert_consistent(&painter);
    }

    #[test]
    fn full_refresh_is_idempotent() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(7)));
        painter.paint(&[(1, 1), (5, 6)]).unwrap();
        painter.refresh_overlay_full();
        let first = painter.overlay().unwrap().clone();
        painter.refresh_overlay_full();
        assert_eq!(painter.overlay().unwrap().as_raw(), first.as_raw());
    }

    #[test]
    fn identity_commands_refresh_overlay() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(1)));
        painter.paint_stroke(&[(1, 1), (2, 2)], 1, BrushShape::Square).unwrap();
        painter.set_active_label(Some(id(7)));
        painter.paint_stroke(&[(7, 7)], 1, BrushShape::Square).unwrap();

        assert_eq!(
            painter.apply(LabelCommand::change_id(id(1), id(7))),
            Err(PaintError::IdConflict { old: 1, new: 7 })
        );
        assert_consistent(&painter);

        painter
            .apply(LabelCommand::ChangeId {
                old: id(1),
                new: id(7),
                resolution: Some(ConflictResolution::Replace),
            })
            .unwrap();
        let slice = painter.slice().unwrap();
        assert_eq!(slice[[1, 1]], 7);
        assert_eq!(slice[[7, 7]], 0);
        assert_eq!(painter.overlay().unwrap().get_pixel(1, 1).0, [0, 0, 255, 255]);
        assert_eq!(painter.viewport().overlay(), painter.overlay());
        assert_consistent(&painter);
    }

    #[test]
    fn clear_slice_only_touches_current_slice() {
        let mut viewport = viewport();
        let mut state = state();
        state.slice_mut(SliceAxis::Z, 1).unwrap()[[0, 0]] = 1;
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(1)));
        painter.paint_stroke(&[(4, 4)], 4, BrushShape::Square).unwrap();
        painter.clear_slice().unwrap();
        assert_eq!(painter.volume().unwrap().volume().count(1), 1);
        assert_consistent(&painter);
    }

    #[test]
    fn pointer_drag_paints_connected_line() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(1)));

        assert!(!painter.handle_pointer(PointerEvent::Press {
            x: 0.5,
            y: 0.5,
            button: PointerButton::Primary,
        }));
        assert!(painter.attach());
        assert!(!painter.attach());

        painter.set_brush(1, BrushShape::Circle);
        assert!(painter.handle_pointer(PointerEvent::Press {
            x: 1.5,
            y: 4.5,
            button: PointerButton::Primary,
        }));
        assert!(painter.handle_pointer(PointerEvent::Drag { x: 7.5, y: 4.5 }));
        painter.handle_pointer(PointerEvent::Release { x: 7.5, y: 4.5 });

        let slice = painter.slice().unwrap();
        for c in 1..=7 {
            assert_eq!(slice[[4, c]], 1, "gap at column {c}");
        }
        assert_eq!(slice[[4, 0]], 1);
        assert_eq!(slice[[4, 8]], 1);
        assert_eq!(slice[[2, 4]], 0);
        assert_consistent(&painter);
    }

    #[test]
    fn secondary_button_erases() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.attach();
        painter.set_active_label(Some(id(7)));
        painter.paint_stroke(&[(4, 4)], 2, BrushShape::Square).unwrap();
        painter.set_brush(1, BrushShape::Square);
        assert!(painter.handle_pointer(PointerEvent::Press {
            x: 4.5,
            y: 4.5,
            button: PointerButton::Secondary,
        }));
        painter.handle_pointer(PointerEvent::Release { x: 4.5, y: 4.5 });
        let slice = painter.slice().unwrap();
        assert_eq!(slice[[4, 4]], 0);
        assert_eq!(slice[[2, 2]], 7);
        assert!(!painter.erase_mode());
    }

    #[test]
    fn hover_preview_never_touches_matrix() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.attach();
        painter.set_active_label(Some(id(1)));
        painter.set_brush(3, BrushShape::Square);

        assert!(!painter.handle_pointer(PointerEvent::Move { x: 2.5, y: 3.5 }));
        let preview = *painter.viewport().brush_preview().unwrap();
        assert_eq!(preview.center, (3, 2));
        assert_eq!(preview.brush, Brush::new(BrushShape::Square, 3));

        painter.handle_pointer(PointerEvent::Move { x: 50.0, y: 3.5 });
        assert!(painter.viewport().brush_preview().is_none());
        painter.handle_pointer(PointerEvent::Move { x: 2.5, y: 3.5 });
        painter.handle_pointer(PointerEvent::Leave);
        assert!(painter.viewport().brush_preview().is_none());
        assert_eq!(painter.volume().unwrap().volume().count(0), 9 * 9 * 3);
    }

    #[test]
    fn coalesced_redraws_flush_on_release() {
        let mut viewport = viewport();
        let mut state = state();
        let config = PainterConfig {
            redraw: RedrawPolicy::Coalesce { interval_ms: 3_600_000 },
            ..PainterConfig::default()
        };
        let mut painter = LabelMapPainter::new(&mut viewport, config);
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.attach();
        painter.set_active_label(Some(id(1)));
        painter.handle_pointer(PointerEvent::Press {
            x: 0.5,
            y: 0.5,
            button: PointerButton::Primary,
        });
        painter.handle_pointer(PointerEvent::Drag { x: 8.5, y: 8.5 });
        assert!(painter.is_redraw_pending());
        assert_ne!(painter.viewport().overlay(), painter.overlay());
        assert_eq!(painter.overlay().unwrap().get_pixel(8, 8).0, [255, 0, 0, 255]);

        painter.handle_pointer(PointerEvent::Release { x: 8.5, y: 8.5 });
        assert!(!painter.is_redraw_pending());
        assert_eq!(painter.viewport().overlay(), painter.overlay());
    }

    #[test]
    fn tick_pushes_paused_stroke() {
        let mut viewport = viewport();
        let mut state = state();
        let config = PainterConfig {
            redraw: RedrawPolicy::Coalesce { interval_ms: 3_600_000 },
            ..PainterConfig::default()
        };
        let mut painter = LabelMapPainter::new(&mut viewport, config);
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.attach();
        painter.set_active_label(Some(id(1)));
        assert_eq!(painter.next_redraw_due(), None);
        painter.handle_pointer(PointerEvent::Press {
            x: 0.5,
            y: 0.5,
            button: PointerButton::Primary,
        });
        painter.handle_pointer(PointerEvent::Drag { x: 8.5, y: 0.5 });
        assert_ne!(painter.viewport().overlay(), painter.overlay());

        let due = painter.next_redraw_due().unwrap();
        assert!(!painter.tick(due - Duration::from_millis(1)));
        assert!(painter.is_redraw_pending());
        assert!(painter.tick(due));
        assert!(!painter.is_redraw_pending());
        assert_eq!(painter.viewport().overlay(), painter.overlay());
        assert_eq!(painter.viewport().overlay().unwrap().get_pixel(8, 0).0, [255, 0, 0, 255]);
        assert!(!painter.tick(due));
    }

    #[test]
    fn huge_brush_fills_slice() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_active_label(Some(id(7)));
        let region = painter
            .paint_stroke(&[(4, 4)], u32::MAX, BrushShape::Circle)
            .unwrap();
        assert_eq!(region, Some(Region::full((9, 9))));
        assert_eq!(painter.volume().unwrap().volume().count(7), 81);
        painter.set_brush(u32::MAX - 1, BrushShape::Circle);
        painter.bump_radius(i32::MAX);
        assert_eq!(painter.brush().radius(), u32::MAX);
        painter.set_erase_mode(true);
        painter.paint(&[(0, 0)]).unwrap();
        assert_eq!(painter.volume().unwrap().volume().count(7), 0);
        assert_consistent(&painter);
    }

    #[test]
    fn overlay_visibility_toggle() {
        let mut viewport = viewport();
        let mut state = state();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.set_label_volume(&mut state, 2, 0).unwrap();
        painter.set_overlay_visible(false);
        assert!(painter.viewport().overlay().is_none());
        painter.set_active_label(Some(id(1)));
        painter.paint(&[(1, 1)]).unwrap();
        assert!(painter.viewport().overlay().is_none());
        assert!(painter.overlay().is_some());
        painter.set_overlay_visible(true);
        assert_eq!(painter.viewport().overlay(), painter.overlay());
    }

    #[test]
    fn detach_releases_bindings_and_volume() {
        let mut viewport = viewport();
        let mut state = state();
        {
            let mut painter = LabelMapPainter::new(&mut viewport, immediate());
            painter.set_label_volume(&mut state, 2, 0).unwrap();
            painter.attach();
            painter.handle_pointer(PointerEvent::Move { x: 4.5, y: 4.5 });
            assert_eq!(painter.viewport().binding_count(), 1);

            let released = painter.detach().unwrap();
            released.add_next_label();
            assert!(!painter.is_attached());
            assert!(painter.volume().is_none());
            assert_eq!(painter.viewport().binding_count(), 0);
            assert!(painter.viewport().brush_preview().is_none());
            assert!(painter.viewport().overlay().is_none());
            assert!(!painter.handle_pointer(PointerEvent::Press {
                x: 4.5,
                y: 4.5,
                button: PointerButton::Primary,
            }));
        }
        assert_eq!(viewport.binding_count(), 0);
        assert_eq!(state.labels().len(), 3);
    }

    #[test]
    fn drop_detaches() {
        let mut viewport = viewport();
        {
            let mut painter = LabelMapPainter::new(&mut viewport, immediate());
            painter.attach();
            painter.set_hover_preview(1, 1, true);
        }
        assert_eq!(viewport.binding_count(), 0);
        assert!(viewport.brush_preview().is_none());
    }

    #[test]
    fn radius_bumps_stay_positive() {
        let mut viewport = viewport();
        let mut painter = LabelMapPainter::new(&mut viewport, immediate());
        painter.bump_radius(3);
        assert_eq!(painter.brush().radius(), 4);
        painter.bump_radius(-10);
        assert_eq!(painter.brush().radius(), 1);
        let cells: BTreeSet<_> = painter.brush().footprint((0, 0), (3, 3)).collect();
        assert_eq!(cells.len(), 3);
    }
}
