use serde::{Deserialize, Serialize};

use crate::error::PaintError;

/// Axis of the label volume a slice is taken along.
///
/// The discriminant is the array axis, so `SliceAxis::Y as usize == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SliceAxis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl SliceAxis {
    pub const ALL: [SliceAxis; 3] = [SliceAxis::X, SliceAxis::Y, SliceAxis::Z];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for SliceAxis {
    type Error = PaintError;

    fn try_from(axis: usize) -> Result<Self, Self::Error> {
        match axis {
            0 => Ok(SliceAxis::X),
            1 => Ok(SliceAxis::Y),
            2 => Ok(SliceAxis::Z),
            other => Err(PaintError::InvalidAxis(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushShape {
    #[default]
    Circle,
    Square,
}

/// Sampling used when the underlay is scaled onto the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
}

/// How a Change-ID into an occupied ID is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Unify the old voxels under the existing label.
    Merge,
    /// Erase the existing label's voxels, then move the old voxels into its ID.
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}
