use std::collections::BTreeSet;

use log::{debug, info};
use ndarray::{Array3, ArrayView2, ArrayViewMut2, s};
use rayon::prelude::*;

use crate::command::{LabelCommand, Plan};
use crate::enums::SliceAxis;
use crate::error::{PaintError, Result};
use crate::labels::{LabelColor, LabelId, LabelInfo, LabelTable};

/// Dense 3D array of label values, 0 being background.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelVolume {
    data: Array3<u16>,
}

impl LabelVolume {
    pub fn new(data: Array3<u16>) -> Result<Self> {
        let (x, y, z) = data.dim();
        if x == 0 || y == 0 || z == 0 {
            return Err(PaintError::EmptyVolume);
        }
        Ok(Self { data })
    }

    /// All-background volume of the given `(x, y, z)` shape.
    pub fn zeros(dim: (usize, usize, usize)) -> Result<Self> {
        Self::new(Array3::zeros(dim))
    }

    /// Get the dimensions of the volume (x, y, z)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    pub fn len_of(&self, axis: SliceAxis) -> usize {
        let dim = self.data.dim();
        match axis {
            SliceAxis::X => dim.0,
            SliceAxis::Y => dim.1,
            SliceAxis::Z => dim.2,
        }
    }

    fn check_index(&self, axis: SliceAxis, index: usize) -> Result<()> {
        let len = self.len_of(axis);
        if index < len {
            Ok(())
        } else {
            Err(PaintError::IndexOutOfRange { axis, index, len })
        }
    }

    /// Read-only cross-section at `index` along `axis`.
    pub fn slice(&self, axis: SliceAxis, index: usize) -> Result<ArrayView2<'_, u16>> {
        self.check_index(axis, index)?;
        Ok(match axis {
            SliceAxis::X => self.data.slice(s![index, .., ..]),
            SliceAxis::Y => self.data.slice(s![.., index, ..]),
            SliceAxis::Z => self.data.slice(s![.., .., index]),
        })
    }

    /// Mutable cross-section aliasing the volume; writes land in the volume.
    pub fn slice_mut(&mut self, axis: SliceAxis, index: usize) -> Result<ArrayViewMut2<'_, u16>> {
        self.check_index(axis, index)?;
        Ok(match axis {
            SliceAxis::X => self.data.slice_mut(s![index, .., ..]),
            SliceAxis::Y => self.data.slice_mut(s![.., index, ..]),
            SliceAxis::Z => self.data.slice_mut(s![.., .., index]),
        })
    }

    /// Volume-wide rewrite of `from` to `to`.
    pub(crate) fn replace_value(&mut self, from: u16, to: u16) {
        self.data
            .par_mapv_inplace(|v| if v == from { to } else { v });
    }

    /// Sorted set of the non-zero values present.
    pub fn labels_present(&self) -> BTreeSet<u16> {
        self.data
            .par_iter()
            .filter(|&&v| v != 0)
            .fold(BTreeSet::new, |mut set, &v| {
                set.insert(v);
                set
            })
            .reduce(BTreeSet::new, |mut a, b| {
                a.extend(b);
                a
            })
    }

    pub fn count(&self, value: u16) -> usize {
        self.data.par_iter().filter(|&&v| v == value).count()
    }
}

/// Owner of a label volume and its label metadata.
#[derive(Clone, Debug)]
pub struct LabelVolumeState {
    volume: LabelVolume,
    labels: LabelTable,
}

impl LabelVolumeState {
    pub fn new(volume: LabelVolume, labels: LabelTable) -> Self {
        Self { volume, labels }
    }

    /// Empty volume of the given shape with no labels.
    pub fn with_dim(dim: (usize, usize, usize)) -> Result<Self> {
        Ok(Self::new(LabelVolume::zeros(dim)?, LabelTable::new()))
    }

    pub fn volume(&self) -> &LabelVolume {
        &self.volume
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.volume.dim()
    }

    pub fn slice(&self, axis: SliceAxis, index: usize) -> Result<ArrayView2<'_, u16>> {
        self.volume.slice(axis, index)
    }

    pub fn slice_mut(&mut self, axis: SliceAxis, index: usize) -> Result<ArrayViewMut2<'_, u16>> {
        self.volume.slice_mut(axis, index)
    }

    pub fn add_label(&mut self, id: LabelId, name: impl Into<String>, color: LabelColor) -> Result<()> {
        self.labels.insert(id, LabelInfo::new(name, color))?;
        info!("Added label {id}");
        Ok(())
    }

    /// Add the lowest free ID with its default name and palette color.
    pub fn add_next_label(&mut self) -> Option<LabelId> {
        let id = self.labels.next_free_id()?;
        self.labels.insert(id, LabelInfo::default_for(id)).ok()?;
        info!("Added label {id}");
        Some(id)
    }

    pub fn set_label_color(&mut self, id: LabelId, color: LabelColor) -> Result<()> {
        self.labels.set_color(id, color)
    }

    /// Apply an identity operation to the whole volume.
    ///
    /// Validation happens first, so an error leaves matrix and metadata untouched.
    pub fn apply(&mut self, command: LabelCommand) -> Result<()> {
        let plan = command.resolve(&self.labels)?;
        info!("Applying {plan:?}");
        match plan {
            Plan::Rename { label, name } => self.labels.rename(label, name)?,
            Plan::Move { old, new } => {
                let info = self.labels.remove(old)?;
                self.labels.insert(new, info)?;
                self.volume.replace_value(old.get(), new.get());
            }
            Plan::Merge { old, new } => {
                self.labels.remove(old)?;
                self.volume.replace_value(old.get(), new.get());
            }
            Plan::Replace { old, new } => {
                self.labels.remove(old)?;
                let (old, new) = (old.get(), new.get());
                self.volume.data.par_mapv_inplace(|v| {
                    if v == new {
                        0
                    } else if v == old {
                        new
                    } else {
                        v
                    }
                });
            }
            Plan::Delete { label } => {
                self.labels.remove(label)?;
                self.volume.replace_value(label.get(), 0);
            }
            Plan::Noop => debug!("Label command was a no-op"),
        }
        Ok(())
    }

    /// Painted values that have no metadata entry.
    pub fn unlabeled(&self) -> Vec<u16> {
        self.volume
            .labels_present()
            .into_iter()
            .filter(|&v| LabelId::new(v).is_some_and(|id| !self.labels.contains(id)))
            .collect()
    }

    /// Check that every painted value has metadata.
    pub fn validate(&self) -> Result<()> {
        let labels = self.unlabeled();
        if labels.is_empty() {
            Ok(())
        } else {
            Err(PaintError::Unlabeled { labels })
        }
    }

    /// Hand out volume and metadata, e.g. for export, after a consistency check.
    pub fn into_parts(self) -> Result<(LabelVolume, LabelTable)> {
        self.validate()?;
        Ok((self.volume, self.labels))
    }
}
