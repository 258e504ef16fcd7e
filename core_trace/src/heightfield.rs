use std::collections::BTreeMap;

use crate::grid::{GridExtent, GridPoint, Height, RasterWindow, SegmentId, Sides};

/// Elevations of every loaded segment, keyed by segment.
///
/// This is the single mutable height buffer threaded through ingestion,
/// flooding and tracing. Segments are only ever added; once a segment is
/// active its cells stay loaded for the lifetime of the field.
#[derive(Debug, Clone)]
pub struct HeightField {
    grid_size: i64,
    extent: GridExtent,
    tiles: BTreeMap<SegmentId, Tile>,
    cells: usize,
}

#[derive(Debug, Clone)]
struct Tile {
    window: RasterWindow,
    values: Vec<Height>,
}

impl HeightField {
    pub fn new(grid_size: u32, extent: GridExtent) -> Self {
        assert!(grid_size > 0, "grid size must be positive");
        Self {
            grid_size: grid_size as i64,
            extent,
            tiles: BTreeMap::new(),
            cells: 0,
        }
    }

    pub fn grid_size(&self) -> i64 {
        self.grid_size
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn segment_of(&self, point: GridPoint) -> SegmentId {
        point.segment(self.grid_size)
    }

    pub fn is_active(&self, segment: SegmentId) -> bool {
        self.tiles.contains_key(&segment)
    }

    pub fn active_segments(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.tiles.keys().copied()
    }

    pub fn segment_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of loaded cells across all active segments.
    pub fn cell_count(&self) -> usize {
        self.cells
    }

    /// Window a segment occupies once clipped to the raster, `None` when the
    /// segment lies wholly outside it.
    pub fn segment_window(&self, segment: SegmentId) -> Option<RasterWindow> {
        self.extent.clip(segment.window(self.grid_size))
    }

    /// Loaded window of an active segment.
    pub fn loaded_window(&self, segment: SegmentId) -> Option<RasterWindow> {
        self.tiles.get(&segment).map(|tile| tile.window)
    }

    /// Install the elevations of a freshly read segment.
    ///
    /// Panics when the segment is already active or the value count does not
    /// match the clipped window.
    pub fn insert_tile(&mut self, segment: SegmentId, values: Vec<Height>) -> RasterWindow {
        assert!(
            !self.is_active(segment),
            "segment {segment} is already loaded"
        );
        let window = self
            .segment_window(segment)
            .unwrap_or_else(|| panic!("segment {segment} lies outside raster {}", self.extent));
        assert_eq!(
            values.len(),
            window.cells(),
            "segment {segment} expects {} cells",
            window.cells()
        );
        self.cells += values.len();
        self.tiles.insert(segment, Tile { window, values });
        window
    }

    /// Loaded cells of an active segment in row-major order.
    pub fn points_in(&self, segment: SegmentId) -> Vec<GridPoint> {
        self.tiles
            .get(&segment)
            .map(|tile| tile.window.points().collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn is_loaded(&self, point: GridPoint) -> bool {
        self.get(point).is_some()
    }

    #[inline]
    pub fn get(&self, point: GridPoint) -> Option<Height> {
        let tile = self.tiles.get(&self.segment_of(point))?;
        let idx = tile.window.index_of(point)?;
        Some(tile.values[idx])
    }

    /// Height of a loaded cell. Panics when the cell is not loaded.
    #[inline]
    pub fn height(&self, point: GridPoint) -> Height {
        self.get(point)
            .unwrap_or_else(|| panic!("height requested for unloaded cell {point}"))
    }

    /// Overwrite the height of a loaded cell, returning the previous value.
    pub fn set(&mut self, point: GridPoint, height: Height) -> Height {
        let segment = self.segment_of(point);
        let tile = self
            .tiles
            .get_mut(&segment)
            .unwrap_or_else(|| panic!("height written for unloaded cell {point}"));
        let idx = tile
            .window
            .index_of(point)
            .unwrap_or_else(|| panic!("cell {point} lies outside the loaded part of {segment}"));
        std::mem::replace(&mut tile.values[idx], height)
    }

    /// Sides of `point` whose neighbour is not loaded.
    pub fn open_sides(&self, point: GridPoint) -> Sides {
        let mut open = Sides::empty();
        for side in Sides::CARDINALS {
            if !self.is_loaded(point.step(side)) {
                open |= side;
            }
        }
        open
    }

    /// Whether `point` touches the edge of the loaded region.
    pub fn touches_boundary(&self, point: GridPoint) -> bool {
        !self.open_sides(point).is_empty()
    }

    /// Inactive segments inside the raster that border `point`.
    pub fn missing_segments(&self, point: GridPoint) -> impl Iterator<Item = SegmentId> + '_ {
        self.open_sides(point)
            .iter()
            .map(move |side| point.step(side))
            .filter(|neighbor| self.extent.contains(*neighbor))
            .map(|neighbor| self.segment_of(neighbor))
            .filter(|segment| !self.is_active(*segment))
    }
}
