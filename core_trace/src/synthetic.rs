//! Deterministic fractal terrain served window by window.
//!
//! Heights are generated on demand from value-noise fBm, so arbitrarily large
//! rasters can be traced without materialising them. Quantising to integer
//! heights produces the plateaus and pits the flooding stage exists for.

use crate::{
    grid::{GridExtent, GridPoint, Height, RasterWindow},
    raster::{RasterError, RasterSource},
};

#[derive(Debug, Clone)]
pub struct SyntheticTerrain {
    extent: GridExtent,
    seed: u64,
    /// Cells per noise period of the lowest octave.
    feature_size: f32,
    /// Height of the tallest peak.
    relief: f32,
    /// Height lost per column, tilting the terrain towards the east edge.
    tilt: f32,
}

impl SyntheticTerrain {
    pub fn new(extent: GridExtent, seed: u64) -> Self {
        Self {
            extent,
            seed,
            feature_size: 64.0,
            relief: 400.0,
            tilt: 0.05,
        }
    }

    pub fn with_feature_size(mut self, feature_size: f32) -> Self {
        self.feature_size = feature_size.max(1.0);
        self
    }

    pub fn with_relief(mut self, relief: f32) -> Self {
        self.relief = relief.max(1.0);
        self
    }

    pub fn with_tilt(mut self, tilt: f32) -> Self {
        self.tilt = tilt;
        self
    }

    pub fn sample(&self, point: GridPoint) -> Height {
        let nx = point.col as f32 / self.feature_size;
        let ny = point.row as f32 / self.feature_size;
        let base_seed = mix_seed(0x9E37_0001, self.seed, 0);
        let ridge_seed = mix_seed(0xC0F3_0001, self.seed, 0x85EB);

        let base = fbm_noise(nx, ny, 4, 2.0, 0.5, base_seed);
        let ridge_source = fbm_noise(nx * 2.5, ny * 2.5, 3, 2.1, 0.45, ridge_seed);
        let ridged = (1.0 - (ridge_source - 0.5).abs() * 2.0)
            .clamp(0.0, 1.0)
            .powf(1.6);

        let value = (base * 0.75 + ridged * 0.25) * self.relief - point.col as f32 * self.tilt;
        value.round() as Height
    }
}

impl RasterSource for SyntheticTerrain {
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
        Ok(window.points().map(|point| self.sample(point)).collect())
    }
}

fn fbm_noise(x: f32, y: f32, octaves: u32, lacunarity: f32, gain: f32, seed: u32) -> f32 {
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut sum = 0.0;
    let mut normaliser = 0.0;
    for i in 0..octaves {
        let s = seed.wrapping_add(i);
        sum += value_noise(x * frequency, y * frequency, s) * amplitude;
        normaliser += amplitude;
        frequency *= lacunarity;
        amplitude *= gain;
    }
    (sum / normaliser).clamp(0.0, 1.0)
}

fn value_noise(x: f32, y: f32, seed: u32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let xf = x - x0 as f32;
    let yf = y - y0 as f32;

    let v00 = hash2(x0, y0, seed);
    let v10 = hash2(x0 + 1, y0, seed);
    let v01 = hash2(x0, y0 + 1, seed);
    let v11 = hash2(x0 + 1, y0 + 1, seed);

    let top = lerp(v00, v10, smooth_step(xf));
    let bottom = lerp(v01, v11, smooth_step(xf));
    lerp(top, bottom, smooth_step(yf))
}

fn smooth_step(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn hash2(x: i32, y: i32, seed: u32) -> f32 {
    let mut n = x as u32;
    n = n.wrapping_mul(0x6C8E_9CF5) ^ (y as u32).wrapping_mul(0xB529_7A4D) ^ seed;
    n ^= n >> 13;
    n = n.wrapping_mul(0x1B56_C4E9);
    n ^= n >> 11;
    ((n >> 8) & 0xFFFF) as f32 / 65535.0
}

fn mix_seed(base: u32, seed: u64, salt: u32) -> u32 {
    let seed_low = seed as u32;
    let seed_high = (seed >> 32) as u32;
    base ^ seed_low.rotate_left(7) ^ seed_high.rotate_left(11) ^ salt
}
