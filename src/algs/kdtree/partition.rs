//! The per-round k-d tree callback.
//!
//! Each driver round first consumes what the previous round sent (partial
//! histograms or migrated points), then produces this round's output.

use super::SpatialPoint;
use super::histogram::Histogram;
use super::partners::{KdRound, KdTreePartners};
use crate::master::proxy::Proxy;
use crate::reduce_error::ReduceError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct KdTreePartition<'a, F> {
    partners: &'a KdTreePartners,
    dim: usize,
    bins: usize,
    points: &'a F,
    pub(crate) split_invocations: AtomicUsize,
    pub(crate) points_sent: AtomicUsize,
}

impl<'a, F> KdTreePartition<'a, F> {
    pub(crate) fn new(partners: &'a KdTreePartners, dim: usize, bins: usize, points: &'a F) -> Self {
        Self {
            partners,
            dim,
            bins,
            points,
            split_invocations: AtomicUsize::new(0),
            points_sent: AtomicUsize::new(0),
        }
    }

    pub(crate) fn run<B, P>(&self, block: &mut B, proxy: &mut Proxy<'_>) -> Result<(), ReduceError>
    where
        F: Fn(&mut B) -> &mut Vec<P>,
        P: SpatialPoint + Serialize + DeserializeOwned + Send + 'static,
    {
        let round = proxy.round();
        let sources: Vec<_> = proxy.in_link().iter().map(|t| t.gid).collect();

        let mut summed: Option<Histogram> = None;
        match round.checked_sub(1).and_then(|r| self.partners.kind(r)) {
            Some(KdRound::Histogram { .. }) => {
                for source in sources {
                    let h: Histogram = proxy.dequeue(source)?;
                    match summed.as_mut() {
                        Some(sum) => sum.merge(&h),
                        None => summed = Some(h),
                    }
                }
            }
            Some(KdRound::Split { .. }) => {
                let points = (self.points)(block);
                for source in sources {
                    while proxy.has_incoming(source) {
                        points.extend(proxy.dequeue::<Vec<P>>(source)?);
                    }
                }
            }
            None => {}
        }

        match self.partners.kind(round) {
            Some(KdRound::Histogram { level, first, .. }) => {
                let histogram = if first {
                    let axis = level % self.dim;
                    let bounds = proxy.link().bounds();
                    let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
                    let points = (self.points)(block);
                    Histogram::from_points(self.bins, lo, hi, points.iter().map(|p| p.coord(axis)))
                } else {
                    summed.ok_or_else(|| missing_histogram(round))?
                };
                for target in proxy.out_link().to_vec() {
                    proxy.enqueue(target.gid, histogram.clone())?;
                }
            }
            Some(KdRound::Split { level }) => {
                let total = summed.ok_or_else(|| missing_histogram(round))?;
                self.split(block, proxy, level, &total)?;
            }
            None => {}
        }
        Ok(())
    }

    /// Cut the shared box, keep this block's half and send the other half's
    /// points to the partner.
    fn split<B, P>(
        &self,
        block: &mut B,
        proxy: &mut Proxy<'_>,
        level: usize,
        total: &Histogram,
    ) -> Result<(), ReduceError>
    where
        F: Fn(&mut B) -> &mut Vec<P>,
        P: SpatialPoint + Serialize + DeserializeOwned + Send + 'static,
    {
        let gid = proxy.gid();
        let axis = level % self.dim;
        let cut = total.split_coordinate();
        let (lower, upper) = proxy.link().bounds().split(axis, cut);
        let keep_lower = self.partners.keeps_lower(level, gid);
        let partner = self.partners.partner(level, gid);

        let points = (self.points)(block);
        let (mine, theirs): (Vec<P>, Vec<P>) = std::mem::take(points)
            .into_iter()
            .partition(|p| (p.coord(axis) < cut) == keep_lower);
        *points = mine;

        proxy
            .link_mut()
            .set_bounds(if keep_lower { lower } else { upper });
        self.points_sent.fetch_add(theirs.len(), Ordering::Relaxed);
        self.split_invocations.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "block {gid} level {level}: cut axis {axis} at {cut}, {} points to block {partner}",
            theirs.len()
        );
        proxy.enqueue(partner, theirs)
    }
}

fn missing_histogram(round: usize) -> ReduceError {
    ReduceError::InvalidConfig(format!(
        "k-d tree round {round} has no histogram from the previous round"
    ))
}
