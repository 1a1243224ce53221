//! # label-paint
//!
//! Slice-based raster label editing for 3D segmentation volumes.
//!
//! A [`LabelVolumeState`] owns a 3D matrix of `u16` labels together with the
//! metadata (name and color) of every label ID. Value 0 is background and
//! never has metadata.
//!
//! A [`LabelMapPainter`] borrows that state and one [`ViewportRenderer`]. It
//! writes brush strokes into the currently bound 2D slice, keeps an RGBA
//! overlay of that slice in sync with every write and drives the brush hover
//! preview. Identity operations (rename, change ID, merge, replace, delete)
//! are expressed as [`LabelCommand`]s and always rewrite the whole volume.
//!
//! The viewport composites the grayscale underlay, the overlay and the brush
//! outline onto a canvas and maps between canvas pixels and slice indices.
//! It never writes label data.
//!
//! Per-row work (overlay rendering, frame compositing, whole-volume value
//! rewrites) runs in parallel using rayon.
//!
//! # Examples
//!
//! ## Painting a stroke and merging two labels
//!
//! ```
//! # use label_paint::{
//! #     BrushShape, ConflictResolution, LabelColor, LabelCommand, LabelId, LabelMapPainter,
//! #     LabelVolumeState, PainterConfig, ViewportRenderer,
//! # };
//! let mut state = LabelVolumeState::with_dim((64, 64, 8)).unwrap();
//! let liver = LabelId::new(1).unwrap();
//! let lesion = LabelId::new(2).unwrap();
//! state.add_label(liver, "Liver", LabelColor::new(255, 0, 0, 160)).unwrap();
//! state.add_label(lesion, "Lesion", LabelColor::new(0, 255, 0, 160)).unwrap();
//!
//! let mut viewport = ViewportRenderer::default();
//! let mut painter = LabelMapPainter::new(&mut viewport, PainterConfig::default());
//! painter.set_label_volume(&mut state, 2, 4).unwrap();
//! painter.set_active_label(Some(lesion));
//! painter.paint_stroke(&[(10, 10), (10, 11)], 2, BrushShape::Circle).unwrap();
//! painter
//!     .apply(LabelCommand::ChangeId {
//!         old: lesion,
//!         new: liver,
//!         resolution: Some(ConflictResolution::Merge),
//!     })
//!     .unwrap();
//! drop(painter);
//!
//! assert!(state.validate().is_ok());
//! assert_eq!(state.volume().count(2), 0);
//! ```

pub mod brush;
pub mod command;
pub mod config;
pub mod enums;
pub mod error;
mod interpolator;
pub mod labels;
pub mod lut;
pub mod painter;
pub mod redraw;
pub mod viewport;
pub mod volume;

pub use brush::{Brush, Region};
pub use command::LabelCommand;
pub use config::{PainterConfig, ViewportConfig};
pub use enums::{BrushShape, ConflictResolution, Interpolation, PointerButton, SliceAxis};
pub use error::{PaintError, Result};
pub use labels::{LabelColor, LabelId, LabelInfo, LabelTable};
pub use painter::{LabelMapPainter, PainterState, PointerEvent};
pub use redraw::{RedrawPolicy, RedrawScheduler};
pub use viewport::{BindingId, BrushPreview, ViewTransform, ViewportRenderer};
pub use volume::{LabelVolume, LabelVolumeState};
