use std::hash::{Hash, Hasher};

use crate::grid::GridPoint;

/// A deterministic FNV-1a 64-bit hasher.
///
/// `DefaultHasher` is randomly keyed per process, so it cannot be used for
/// fingerprints that must match across runs.
#[derive(Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Fingerprint of a routed path: cells and their heights, in order.
pub fn fingerprint_path<'a, I>(points: I) -> u64
where
    I: IntoIterator<Item = (&'a GridPoint, i32)>,
{
    let mut hasher = FnvHasher::new();
    let mut count = 0u64;
    for (point, height) in points {
        point.hash(&mut hasher);
        height.hash(&mut hasher);
        count += 1;
    }
    count.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_vector() {
        let mut hasher = FnvHasher::new();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn path_fingerprint_depends_on_order() {
        let a = GridPoint::new(0, 0);
        let b = GridPoint::new(0, 1);
        let forward = fingerprint_path([(&a, 3), (&b, 2)]);
        let backward = fingerprint_path([(&b, 2), (&a, 3)]);
        assert_ne!(forward, backward);
        assert_eq!(forward, fingerprint_path([(&a, 3), (&b, 2)]));
    }
}
