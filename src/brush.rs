use crate::enums::BrushShape;

/// Half-open rectangle of slice cells, `top..bottom` rows and `left..right` columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl Region {
    /// The whole of a `(rows, cols)` slice.
    pub fn full(shape: (usize, usize)) -> Self {
        Self {
            top: 0,
            left: 0,
            bottom: shape.0,
            right: shape.1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top >= self.bottom || self.left >= self.right
    }

    pub fn contains(&self, (r, c): (usize, usize)) -> bool {
        (self.top..self.bottom).contains(&r) && (self.left..self.right).contains(&c)
    }

    /// Smallest region covering both.
    pub fn union(self, other: Region) -> Region {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Region {
            top: self.top.min(other.top),
            left: self.left.min(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.max(other.right),
        }
    }

    pub fn cells(self) -> impl Iterator<Item = (usize, usize)> {
        (self.top..self.bottom).flat_map(move |r| (self.left..self.right).map(move |c| (r, c)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Brush {
    pub shape: BrushShape,
    radius: u32,
}

impl Default for Brush {
    fn default() -> Self {
        Self::new(BrushShape::Circle, 1)
    }
}

impl Brush {
    /// Radius below 1 is raised to 1.
    pub fn new(shape: BrushShape, radius: u32) -> Self {
        Self {
            shape,
            radius: radius.max(1),
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: u32) {
        self.radius = radius.max(1);
    }

    /// Whether a cell at `(dr, dc)` from the center is covered.
    pub fn covers(&self, dr: i64, dc: i64) -> bool {
        let r = self.radius as i128;
        let (dr, dc) = (dr as i128, dc as i128);
        match self.shape {
            BrushShape::Circle => dr * dr + dc * dc <= r * r,
            BrushShape::Square => dr.abs() <= r && dc.abs() <= r,
        }
    }

    /// Bounding box of the footprint at `center`, clipped to a `(rows, cols)` slice.
    pub fn bounds(&self, center: (usize, usize), shape: (usize, usize)) -> Option<Region> {
        let r = self.radius as usize;
        let region = Region {
            top: center.0.saturating_sub(r),
            left: center.1.saturating_sub(r),
            bottom: center.0.saturating_add(r).saturating_add(1).min(shape.0),
            right: center.1.saturating_add(r).saturating_add(1).min(shape.1),
        };
        (!region.is_empty()).then_some(region)
    }

    /// Covered cells at `center`, clipped to the slice.
    pub fn footprint(
        &self,
        center: (usize, usize),
        shape: (usize, usize),
    ) -> impl Iterator<Item = (usize, usize)> + use<> {
        let brush = *self;
        self.bounds(center, shape)
            .into_iter()
            .flat_map(Region::cells)
            .filter(move |&cell| brush.covers_cell(center, cell))
    }

    /// Footprint cells with an uncovered 4-neighbour or on the slice edge.
    pub fn outline(
        &self,
        center: (usize, usize),
        shape: (usize, usize),
    ) -> impl Iterator<Item = (usize, usize)> + use<> {
        let brush = *self;
        self.footprint(center, shape).filter(move |&(r, c)| {
            if r == 0 || c == 0 || r + 1 >= shape.0 || c + 1 >= shape.1 {
                return true;
            }
            [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)]
                .into_iter()
                .any(|n| !brush.covers_cell(center, n))
        })
    }

    fn covers_cell(&self, center: (usize, usize), cell: (usize, usize)) -> bool {
        self.covers(
            cell.0 as i64 - center.0 as i64,
            cell.1 as i64 - center.1 as i64,
        )
    }
}

/// Cells on the straight line from `from` to `to`, both ends included.
pub fn line(from: (usize, usize), to: (usize, usize)) -> Vec<(usize, usize)> {
    let (mut r, mut c) = (from.0 as i64, from.1 as i64);
    let (r1, c1) = (to.0 as i64, to.1 as i64);
    let dr = (r1 - r).abs();
    let dc = -(c1 - c).abs();
    let sr = if r < r1 { 1 } else { -1 };
    let sc = if c < c1 { 1 } else { -1 };
    let mut err = dr + dc;
    let mut cells = Vec::with_capacity((dr.max(-dc) + 1) as usize);
    loop {
        cells.push((r as usize, c as usize));
        if r == r1 && c == c1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dc {
            err += dc;
            r += sr;
        }
        if e2 <= dr {
            err += dr;
            c += sc;
        }
    }
    cells
}
