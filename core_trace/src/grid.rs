//! Integer grid coordinates shared by every stage of the tracer.
//!
//! Rows grow southwards and columns grow eastwards, matching the layout of the
//! underlying raster. Coordinates are signed so that the neighbours of a cell on
//! the raster's top or left edge can be represented (and then rejected by
//! [`GridExtent::contains`]).

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Elevation of a single raster cell.
pub type Height = i32;

/// A single cell of the global raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub row: i64,
    pub col: i64,
}

impl GridPoint {
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Step one cell towards `side`. Only single-flag values are meaningful.
    pub fn step(self, side: Sides) -> Self {
        let (dr, dc) = side.offset();
        Self::new(self.row + dr, self.col + dc)
    }

    /// The four axis-aligned neighbours in `Sides::CARDINALS` order.
    pub fn neighbors(self) -> [GridPoint; 4] {
        Sides::CARDINALS.map(|side| self.step(side))
    }

    pub fn manhattan_to(self, other: GridPoint) -> u64 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    pub fn is_adjacent(self, other: GridPoint) -> bool {
        self.manhattan_to(other) == 1
    }

    /// Segment owning this cell for tiles of edge length `grid_size`.
    pub fn segment(self, grid_size: i64) -> SegmentId {
        SegmentId {
            row: self.row.div_euclid(grid_size),
            col: self.col.div_euclid(grid_size),
        }
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

bitflags! {
    /// Axis-aligned directions, used both as single steps and as masks of
    /// open (unloaded) sides around a cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Sides: u8 {
        const NORTH = 1;
        const SOUTH = 1 << 1;
        const WEST = 1 << 2;
        const EAST = 1 << 3;
    }
}

impl Sides {
    pub const CARDINALS: [Sides; 4] = [Sides::NORTH, Sides::SOUTH, Sides::WEST, Sides::EAST];

    /// Row/column offset of a single direction. Combined masks yield the sum.
    pub fn offset(self) -> (i64, i64) {
        let mut dr = 0;
        let mut dc = 0;
        if self.contains(Sides::NORTH) {
            dr -= 1;
        }
        if self.contains(Sides::SOUTH) {
            dr += 1;
        }
        if self.contains(Sides::WEST) {
            dc -= 1;
        }
        if self.contains(Sides::EAST) {
            dc += 1;
        }
        (dr, dc)
    }
}

/// Tile identifier: the tile covers rows `row * grid_size .. (row + 1) * grid_size`
/// and the equivalent column range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId {
    pub row: i64,
    pub col: i64,
}

impl SegmentId {
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Unclipped window covered by this segment.
    pub fn window(self, grid_size: i64) -> RasterWindow {
        RasterWindow {
            row_off: self.row * grid_size,
            col_off: self.col * grid_size,
            width: grid_size,
            height: grid_size,
        }
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

/// Rectangular block of cells requested from a raster source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterWindow {
    pub row_off: i64,
    pub col_off: i64,
    pub width: i64,
    pub height: i64,
}

impl RasterWindow {
    pub fn cells(&self) -> usize {
        (self.width.max(0) * self.height.max(0)) as usize
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        point.row >= self.row_off
            && point.row < self.row_off + self.height
            && point.col >= self.col_off
            && point.col < self.col_off + self.width
    }

    /// Row-major offset of `point` inside the window.
    pub fn index_of(&self, point: GridPoint) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        let local_row = point.row - self.row_off;
        let local_col = point.col - self.col_off;
        Some((local_row * self.width + local_col) as usize)
    }

    /// Cells of the window in row-major order.
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        (self.row_off..self.row_off + self.height).flat_map(move |row| {
            (self.col_off..self.col_off + self.width).map(move |col| GridPoint::new(row, col))
        })
    }

    /// The window grown by `margin` cells on every side.
    pub fn grow(&self, margin: i64) -> RasterWindow {
        RasterWindow {
            row_off: self.row_off - margin,
            col_off: self.col_off - margin,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }
}

/// Size of the whole raster, anchored at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridExtent {
    pub rows: i64,
    pub cols: i64,
}

impl GridExtent {
    pub const fn new(rows: i64, cols: i64) -> Self {
        Self { rows, cols }
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        point.row >= 0 && point.col >= 0 && point.row < self.rows && point.col < self.cols
    }

    /// Intersection of `window` with the raster, `None` when they do not overlap.
    pub fn clip(&self, window: RasterWindow) -> Option<RasterWindow> {
        let row_start = window.row_off.max(0);
        let col_start = window.col_off.max(0);
        let row_end = (window.row_off + window.height).min(self.rows);
        let col_end = (window.col_off + window.width).min(self.cols);
        if row_start >= row_end || col_start >= col_end {
            return None;
        }
        Some(RasterWindow {
            row_off: row_start,
            col_off: col_start,
            width: col_end - col_start,
            height: row_end - row_start,
        })
    }
}

impl fmt::Display for GridExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_of_negative_cells_rounds_down() {
        assert_eq!(GridPoint::new(-1, 0).segment(4), SegmentId::new(-1, 0));
        assert_eq!(GridPoint::new(3, 4).segment(4), SegmentId::new(0, 1));
        assert_eq!(GridPoint::new(8, 7).segment(4), SegmentId::new(2, 1));
    }

    #[test]
    fn neighbors_follow_cardinal_order() {
        let p = GridPoint::new(5, 5);
        assert_eq!(
            p.neighbors(),
            [
                GridPoint::new(4, 5),
                GridPoint::new(6, 5),
                GridPoint::new(5, 4),
                GridPoint::new(5, 6)
            ]
        );
        assert!(p.neighbors().iter().all(|n| n.is_adjacent(p)));
    }

    #[test]
    fn clip_trims_partial_edge_tiles() {
        let extent = GridExtent::new(10, 7);
        let clipped = extent.clip(SegmentId::new(1, 1).window(4)).unwrap();
        assert_eq!(
            clipped,
            RasterWindow {
                row_off: 4,
                col_off: 4,
                width: 3,
                height: 4
            }
        );
        assert!(extent.clip(SegmentId::new(0, 2).window(4)).is_none());
        assert!(extent.clip(SegmentId::new(-1, 0).window(4)).is_none());
    }

    #[test]
    fn window_points_are_row_major() {
        let window = RasterWindow {
            row_off: 2,
            col_off: 3,
            width: 2,
            height: 2,
        };
        let points: Vec<_> = window.points().collect();
        assert_eq!(
            points,
            vec![
                GridPoint::new(2, 3),
                GridPoint::new(2, 4),
                GridPoint::new(3, 3),
                GridPoint::new(3, 4)
            ]
        );
        assert_eq!(window.index_of(GridPoint::new(3, 3)), Some(2));
        assert_eq!(window.index_of(GridPoint::new(4, 3)), None);
    }
}
