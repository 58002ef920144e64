//! Runtime knobs shared by the master, the reduce driver and the k-d tree.

use crate::reduce_error::ReduceError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    /// Total number of blocks across all processes.
    pub nblocks: usize,
    /// Worker threads used to run per-block callbacks.
    pub threads: usize,
    /// Histogram multiplier; the k-d tree uses `2 * hist` bins.
    pub hist: usize,
    /// Periodic boundary in every dimension.
    pub wrap: bool,
    /// Path prefix for spilled blocks.
    pub storage_prefix: Option<PathBuf>,
    /// Maximum number of blocks resident at once; `None` keeps all in memory.
    pub mem_blocks: Option<usize>,
    /// Group size `k` for swap, merge and all-to-all schedules.
    pub fan_out: usize,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            nblocks: 8,
            threads: 1,
            hist: 32,
            wrap: false,
            storage_prefix: None,
            mem_blocks: None,
            fan_out: 2,
        }
    }
}

impl ReduceConfig {
    /// Number of histogram bins used by the k-d tree.
    pub fn bins(&self) -> usize {
        2 * self.hist
    }

    pub fn validate(&self) -> Result<(), ReduceError> {
        if self.nblocks == 0 {
            return Err(ReduceError::InvalidConfig("nblocks must be positive".into()));
        }
        if self.threads == 0 {
            return Err(ReduceError::InvalidConfig("threads must be positive".into()));
        }
        if self.hist == 0 {
            return Err(ReduceError::InvalidConfig(
                "histogram multiplier must be positive".into(),
            ));
        }
        if self.fan_out < 2 {
            return Err(ReduceError::InvalidConfig(format!(
                "fan_out must be at least 2, got {}",
                self.fan_out
            )));
        }
        if self.mem_blocks == Some(0) {
            return Err(ReduceError::InvalidConfig(
                "mem_blocks must allow at least one resident block".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = ReduceConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.bins(), 64);
    }

    #[test]
    fn fan_out_one_is_rejected() {
        let cfg = ReduceConfig {
            fan_out: 1,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ReduceError::InvalidConfig(_))));
    }
}
