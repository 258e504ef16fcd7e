//! Geographic to grid coordinate transforms.

use serde::{Deserialize, Serialize};

use crate::grid::GridPoint;

/// Forward transform from latitude/longitude (degrees) to a raster cell.
pub trait GridProjection {
    fn to_grid(&self, lat: f64, lon: f64) -> GridPoint;
}

/// North-up raster with a fixed cell size in degrees.
///
/// `origin_lat`/`origin_lon` name the centre of cell (0, 0); rows advance
/// southwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineProjection {
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub degrees_per_cell: f64,
}

impl AffineProjection {
    pub fn new(origin_lat: f64, origin_lon: f64, degrees_per_cell: f64) -> Self {
        assert!(
            degrees_per_cell.is_finite() && degrees_per_cell > 0.0,
            "cell size must be a positive number of degrees"
        );
        Self {
            origin_lat,
            origin_lon,
            degrees_per_cell,
        }
    }
}

impl GridProjection for AffineProjection {
    fn to_grid(&self, lat: f64, lon: f64) -> GridPoint {
        let row = ((self.origin_lat - lat) / self.degrees_per_cell).round() as i64;
        let col = ((lon - self.origin_lon) / self.degrees_per_cell).round() as i64;
        GridPoint::new(row, col)
    }
}

impl<P: GridProjection + ?Sized> GridProjection for &P {
    fn to_grid(&self, lat: f64, lon: f64) -> GridPoint {
        (**self).to_grid(lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_grow_southwards() {
        let projection = AffineProjection::new(50.0, 10.0, 0.5);
        assert_eq!(projection.to_grid(50.0, 10.0), GridPoint::new(0, 0));
        assert_eq!(projection.to_grid(49.0, 11.5), GridPoint::new(2, 3));
        // Snaps to the nearest cell centre.
        assert_eq!(projection.to_grid(49.8, 10.3), GridPoint::new(0, 1));
    }
}
