//! Distance and elevation summary of a routed path.

use serde::Serialize;

use crate::{grid::Height, router::TracedPoint};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfileSample {
    /// Ground distance from the start of the path, in metres.
    pub distance_m: f64,
    pub height: Height,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathProfile {
    pub length_m: f64,
    pub samples: Vec<ProfileSample>,
    /// Sum of every drop along the path; rises are not subtracted.
    pub total_descent: i64,
    /// Net height lost per kilometre travelled.
    pub average_gradient_m_per_km: f64,
}

impl PathProfile {
    pub fn from_points(points: &[TracedPoint], cell_size_m: f64) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let mut samples = Vec::with_capacity(points.len());
        samples.push(ProfileSample {
            distance_m: 0.0,
            height: first.height,
        });
        let mut length_m = 0.0;
        let mut total_descent = 0i64;
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let dr = (a.point.row - b.point.row) as f64;
            let dc = (a.point.col - b.point.col) as f64;
            length_m += (dr * dr + dc * dc).sqrt() * cell_size_m;
            total_descent += i64::from(a.height - b.height).max(0);
            samples.push(ProfileSample {
                distance_m: length_m,
                height: b.height,
            });
        }

        let net_drop = points
            .last()
            .map(|last| f64::from(first.height - last.height))
            .unwrap_or(0.0);
        let average_gradient_m_per_km = if length_m > 0.0 {
            net_drop / (length_m / 1000.0)
        } else {
            0.0
        };

        Self {
            length_m,
            samples,
            total_descent,
            average_gradient_m_per_km,
        }
    }
}
