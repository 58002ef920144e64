//! Continuous axis-aligned boxes.

use crate::reduce_error::ReduceError;
use serde::{Deserialize, Serialize};

/// Per-dimension `[min, max]` box over a continuous domain.
///
/// Invariant: `min.len() == max.len()` and `min[d] <= max[d]` for every `d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl Bounds {
    /// Build a box, rejecting mismatched dimensions, NaNs and inverted extents.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Result<Self, ReduceError> {
        let b = Self { min, max };
        b.check()?;
        Ok(b)
    }

    /// `[lo, hi]^dim`.
    pub fn cube(dim: usize, lo: f64, hi: f64) -> Result<Self, ReduceError> {
        Self::new(vec![lo; dim], vec![hi; dim])
    }

    pub(crate) fn check(&self) -> Result<(), ReduceError> {
        if self.min.len() != self.max.len() {
            return Err(ReduceError::InvalidBounds(format!(
                "min has {} dimensions but max has {}",
                self.min.len(),
                self.max.len()
            )));
        }
        for (d, (lo, hi)) in self.min.iter().zip(&self.max).enumerate() {
            // also rejects NaN
            if !(lo <= hi) {
                return Err(ReduceError::InvalidBounds(format!(
                    "axis {d}: min {lo} is not <= max {hi}"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.min.len()
    }

    #[inline]
    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    pub fn volume(&self) -> f64 {
        (0..self.dim()).map(|d| self.extent(d)).product()
    }

    /// Closed containment test for a point given by its coordinate accessor.
    pub fn contains_with(&self, coord: impl Fn(usize) -> f64) -> bool {
        (0..self.dim()).all(|d| {
            let x = coord(d);
            self.min[d] <= x && x <= self.max[d]
        })
    }

    /// Cut the box at `at` along `axis`, returning `(lower, upper)`.
    ///
    /// `at` is clamped into the box so both halves stay valid.
    pub fn split(&self, axis: usize, at: f64) -> (Bounds, Bounds) {
        let at = at.clamp(self.min[axis], self.max[axis]);
        let mut lower = self.clone();
        let mut upper = self.clone();
        lower.max[axis] = at;
        upper.min[axis] = at;
        (lower, upper)
    }

    /// Closed-interval overlap along one axis (touching counts).
    #[inline]
    pub fn touches_or_overlaps(&self, other: &Bounds, axis: usize) -> bool {
        self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis]
    }

    /// Volume of the intersection with `other`; zero when they only touch.
    pub fn intersection_volume(&self, other: &Bounds) -> f64 {
        (0..self.dim())
            .map(|d| {
                let lo = self.min[d].max(other.min[d]);
                let hi = self.max[d].min(other.max[d]);
                (hi - lo).max(0.0)
            })
            .product()
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} - {:?}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_axis() {
        let err = Bounds::new(vec![0.0, 2.0], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidBounds(_)));
    }

    #[test]
    fn rejects_dimension_mismatch() {
        assert!(Bounds::new(vec![0.0], vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn split_shares_the_cut_plane() {
        let b = Bounds::cube(3, 0.0, 10.0).unwrap();
        let (lo, hi) = b.split(1, 4.0);
        assert_eq!(lo.max[1], 4.0);
        assert_eq!(hi.min[1], 4.0);
        assert_eq!(lo.min, b.min);
        assert_eq!(hi.max, b.max);
        assert_eq!(lo.intersection_volume(&hi), 0.0);
        assert!((lo.volume() + hi.volume() - b.volume()).abs() < 1e-9);
    }

    #[test]
    fn split_clamps_outside_cut() {
        let b = Bounds::cube(1, 0.0, 1.0).unwrap();
        let (lo, hi) = b.split(0, 5.0);
        assert_eq!(lo, b);
        assert_eq!(hi.min[0], 1.0);
    }
}
