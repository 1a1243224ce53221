use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU16;

use serde::{Deserialize, Serialize};

use crate::error::{PaintError, Result};

/// Palette for labels without an explicit color, indexed by `id % 7`.
const DEFAULT_PALETTE: [[u8; 3]; 7] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 128, 255],
    [255, 128, 0],
    [255, 0, 255],
    [0, 255, 255],
    [255, 255, 0],
];

/// A non-background label value. Background (0) is not representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(NonZeroU16);

impl LabelId {
    pub fn new(value: u16) -> Option<Self> {
        NonZeroU16::new(value).map(Self)
    }

    pub fn get(self) -> u16 {
        self.0.get()
    }
}

impl TryFrom<u16> for LabelId {
    type Error = PaintError;

    fn try_from(value: u16) -> Result<Self> {
        Self::new(value).ok_or(PaintError::ReservedLabel)
    }
}

impl From<LabelId> for u16 {
    fn from(id: LabelId) -> u16 {
        id.get()
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl LabelColor {
    pub const TRANSPARENT: LabelColor = LabelColor::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_rgb(rgb: [u8; 3], alpha: u8) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2], alpha)
    }

    /// Build a color from channels in `[0, 1]`; out-of-range values are clamped.
    pub fn from_unit(r: f32, g: f32, b: f32, a: f32) -> Self {
        #[inline]
        fn channel(v: f32) -> u8 {
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        Self::new(channel(r), channel(g), channel(b), channel(a))
    }

    /// Palette color used for `id` when no color was chosen.
    pub fn default_for(id: LabelId) -> Self {
        Self::from_rgb(DEFAULT_PALETTE[id.get() as usize % DEFAULT_PALETTE.len()], 255)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub name: String,
    pub color: LabelColor,
}

impl LabelInfo {
    pub fn new(name: impl Into<String>, color: LabelColor) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    /// `"Label <id>"` with the palette color.
    pub fn default_for(id: LabelId) -> Self {
        Self::new(format!("Label {id}"), LabelColor::default_for(id))
    }
}

/// Metadata for every label present in a volume, keyed by ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    entries: BTreeMap<LabelId, LabelInfo>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: LabelId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: LabelId) -> Option<&LabelInfo> {
        self.entries.get(&id)
    }

    /// Like [`get`](Self::get) but fails with `UnknownLabel`.
    pub fn require(&self, id: LabelId) -> Result<&LabelInfo> {
        self.entries
            .get(&id)
            .ok_or(PaintError::UnknownLabel(id.get()))
    }

    pub fn ids(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &LabelInfo)> + '_ {
        self.entries.iter().map(|(id, info)| (*id, info))
    }

    pub fn insert(&mut self, id: LabelId, info: LabelInfo) -> Result<()> {
        if self.contains(id) {
            return Err(PaintError::LabelExists(id.get()));
        }
        self.entries.insert(id, info);
        Ok(())
    }

    pub fn remove(&mut self, id: LabelId) -> Result<LabelInfo> {
        self.entries
            .remove(&id)
            .ok_or(PaintError::UnknownLabel(id.get()))
    }

    pub fn rename(&mut self, id: LabelId, name: impl Into<String>) -> Result<()> {
        let info = self
            .entries
            .get_mut(&id)
            .ok_or(PaintError::UnknownLabel(id.get()))?;
        info.name = name.into();
        Ok(())
    }

    pub fn set_color(&mut self, id: LabelId, color: LabelColor) -> Result<()> {
        let info = self
            .entries
            .get_mut(&id)
            .ok_or(PaintError::UnknownLabel(id.get()))?;
        info.color = color;
        Ok(())
    }

    /// Smallest positive ID without metadata.
    pub fn next_free_id(&self) -> Option<LabelId> {
        (1..=u16::MAX)
            .filter_map(LabelId::new)
            .find(|id| !self.contains(*id))
    }
}
