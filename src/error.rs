use thiserror::Error;

use crate::enums::SliceAxis;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaintError {
    #[error("Invalid slice axis {0}, expected 0, 1 or 2")]
    InvalidAxis(usize),

    #[error("Slice index {index} out of range for axis {axis:?} of length {len}")]
    IndexOutOfRange {
        axis: SliceAxis,
        index: usize,
        len: usize,
    },

    #[error("Unknown label {0}")]
    UnknownLabel(u16),

    #[error("Label {new} already exists, choose merge or replace to move label {old} into it")]
    IdConflict { old: u16, new: u16 },

    #[error("Label {0} already exists")]
    LabelExists(u16),

    #[error("Label 0 is reserved for background")]
    ReservedLabel,

    #[error("No label volume attached")]
    NotAttached,

    #[error("Painted labels without metadata: {labels:?}")]
    Unlabeled { labels: Vec<u16> },

    #[error("Label volume has an empty dimension")]
    EmptyVolume,
}

pub type Result<T> = std::result::Result<T, PaintError>;
