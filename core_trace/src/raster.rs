//! Windowed elevation sources.
//!
//! The tracer never sees the whole raster; it asks a [`RasterSource`] for one
//! segment-sized window at a time. Reads are blocking and are not retried: a
//! failed read aborts the trace.

use std::{fs, io, path::Path};

use thiserror::Error;

use crate::grid::{GridExtent, GridPoint, Height, RasterWindow};

/// Random-access reader over a (potentially huge) elevation raster.
pub trait RasterSource {
    /// Size of the raster; cells outside it are never requested.
    fn extent(&self) -> GridExtent;

    /// Read `window` in row-major order. The window always lies inside
    /// [`RasterSource::extent`].
    fn read_window(&mut self, window: RasterWindow) -> Result<Vec<Height>, RasterError>;
}

impl<S: RasterSource + ?Sized> RasterSource for Box<S> {
    fn extent(&self) -> GridExtent {
        (**self).extent()
    }

    fn read_window(&mut self, window: RasterWindow) -> Result<Vec<Height>, RasterError> {
        (**self).read_window(window)
    }
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("window {window:?} lies outside raster extent {extent}")]
    OutOfBounds {
        window: RasterWindow,
        extent: GridExtent,
    },
    #[error("raster returned {actual} cells for window {window:?}, expected {expected}")]
    ShortRead {
        window: RasterWindow,
        expected: usize,
        actual: usize,
    },
    #[error("raster grid row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("failed to read raster source: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse raster grid: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fully materialised raster, used for tests and small JSON grids.
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    extent: GridExtent,
    values: Vec<Height>,
    reads: usize,
}

impl InMemoryRaster {
    pub fn new(rows: usize, cols: usize, values: Vec<Height>) -> Result<Self, RasterError> {
        let expected = rows * cols;
        if values.len() != expected {
            return Err(RasterError::ShortRead {
                window: RasterWindow {
                    row_off: 0,
                    col_off: 0,
                    width: cols as i64,
                    height: rows as i64,
                },
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            extent: GridExtent::new(rows as i64, cols as i64),
            values,
            reads: 0,
        })
    }

    /// Build from nested rows; every row must have the same width.
    pub fn from_rows(rows: Vec<Vec<Height>>) -> Result<Self, RasterError> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let height = rows.len();
        let mut values = Vec::with_capacity(width * height);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(RasterError::Ragged {
                    row: idx,
                    found: row.len(),
                    expected: width,
                });
            }
            values.extend(row);
        }
        Self::new(height, width, values)
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(GridPoint) -> Height) -> Self {
        let mut values = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                values.push(f(GridPoint::new(row as i64, col as i64)));
            }
        }
        Self {
            extent: GridExtent::new(rows as i64, cols as i64),
            values,
            reads: 0,
        }
    }

    /// Parse a JSON array of rows, e.g. `[[3, 2], [2, 1]]`.
    pub fn from_json_str(json: &str) -> Result<Self, RasterError> {
        let rows: Vec<Vec<Height>> = serde_json::from_str(json)?;
        Self::from_rows(rows)
    }

    pub fn from_file(path: &Path) -> Result<Self, RasterError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Number of windows served so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn sample(&self, point: GridPoint) -> Option<Height> {
        if !self.extent.contains(point) {
            return None;
        }
        let idx = (point.row * self.extent.cols + point.col) as usize;
        Some(self.values[idx])
    }
}

impl RasterSource for InMemoryRaster {
    fn extent(&self) -> GridExtent {
        self.extent
    }

    fn read_window(&mut self, window: RasterWindow) -> Result<Vec<Height>, RasterError> {
        if self.extent.clip(window) != Some(window) {
            return Err(RasterError::OutOfBounds {
                window,
                extent: self.extent,
            });
        }
        self.reads += 1;
        let mut out = Vec::with_capacity(window.cells());
        for row in window.row_off..window.row_off + window.height {
            let start = (row * self.extent.cols + window.col_off) as usize;
            out.extend_from_slice(&self.values[start..start + window.width as usize]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_row_major_windows() {
        let mut raster = InMemoryRaster::from_fn(4, 5, |p| (p.row * 10 + p.col) as Height);
        let window = RasterWindow {
            row_off: 1,
            col_off: 2,
            width: 3,
            height: 2,
        };
        assert_eq!(raster.read_window(window).unwrap(), vec![12, 13, 14, 22, 23, 24]);
        assert_eq!(raster.reads(), 1);
    }

    #[test]
    fn rejects_windows_outside_extent() {
        let mut raster = InMemoryRaster::from_fn(2, 2, |_| 0);
        let window = RasterWindow {
            row_off: 1,
            col_off: 1,
            width: 2,
            height: 2,
        };
        assert!(matches!(
            raster.read_window(window),
            Err(RasterError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn json_grids_must_be_rectangular() {
        let raster = InMemoryRaster::from_json_str("[[3, 2], [2, 1]]").unwrap();
        assert_eq!(raster.extent(), GridExtent::new(2, 2));
        assert_eq!(raster.sample(GridPoint::new(1, 0)), Some(2));

        let err = InMemoryRaster::from_json_str("[[3, 2], [2]]").unwrap_err();
        assert!(matches!(
            err,
            RasterError::Ragged {
                row: 1,
                found: 1,
                expected: 2
            }
        ));
    }
}
