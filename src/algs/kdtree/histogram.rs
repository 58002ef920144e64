//! Fixed-width bin counts along one axis of a box.

use serde::{Deserialize, Serialize};

/// Counts over `[min, max]` in `counts.len()` equal-width bins.
///
/// Bin `i` covers `[min + i*w, min + (i+1)*w)`; the last bin is closed on the
/// right. Values outside the range land in the nearest edge bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub counts: Vec<u64>,
    pub min: f64,
    pub max: f64,
}

impl Histogram {
    pub fn empty(bins: usize, min: f64, max: f64) -> Self {
        Self {
            counts: vec![0; bins.max(1)],
            min,
            max,
        }
    }

    pub fn from_counts(counts: Vec<u64>, min: f64, max: f64) -> Self {
        Self { counts, min, max }
    }

    pub fn from_points(bins: usize, min: f64, max: f64, coords: impl IntoIterator<Item = f64>) -> Self {
        let mut h = Self::empty(bins, min, max);
        for x in coords {
            let b = h.bin_of(x);
            h.counts[b] += 1;
        }
        h
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_of(&self, x: f64) -> usize {
        let width = self.max - self.min;
        if !(width > 0.0) || x <= self.min {
            return 0;
        }
        let b = ((x - self.min) / width * self.bins() as f64).floor();
        (b as usize).min(self.bins() - 1)
    }

    /// Left edge of bin `i`; `boundary(bins())` is `max`.
    pub fn boundary(&self, i: usize) -> f64 {
        if i >= self.bins() {
            return self.max;
        }
        self.min + (self.max - self.min) * i as f64 / self.bins() as f64
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Add `other`'s counts bin by bin. Both must cover the same range.
    pub fn merge(&mut self, other: &Histogram) {
        debug_assert_eq!(self.bins(), other.bins());
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
    }

    /// Bin boundary closest to an even split of the total count.
    ///
    /// Walks to the first bin `i` at which the running count reaches half of
    /// the total, then picks the lower edge of `i` if that leaves a smaller
    /// imbalance and the upper edge otherwise. An empty histogram splits at
    /// the midpoint.
    pub fn split_coordinate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.5 * (self.min + self.max);
        }
        let mut cum = 0u64;
        for (i, &c) in self.counts.iter().enumerate() {
            let next = cum + c;
            if 2 * next >= total {
                let below = total - 2 * cum;
                let above = 2 * next - total;
                return if below < above {
                    self.boundary(i)
                } else {
                    self.boundary(i + 1)
                };
            }
            cum = next;
        }
        self.max
    }
}
