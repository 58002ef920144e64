use crate::reduce_error::ReduceError;
use crate::topology::bounds::Bounds;
use crate::topology::link::Link;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), ReduceError>;
}

/// Helper macro to run a fallible check and panic on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(debug_assertions)]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

impl DebugInvariants for Bounds {
    fn debug_assert_invariants(&self) {
        debug_invariants!(self.validate_invariants(), "Bounds");
    }

    fn validate_invariants(&self) -> Result<(), ReduceError> {
        self.check()
    }
}

impl DebugInvariants for Link {
    fn debug_assert_invariants(&self) {
        debug_invariants!(self.validate_invariants(), "Link");
    }

    /// Own bounds are valid and every neighbor box has the link's dimension.
    fn validate_invariants(&self) -> Result<(), ReduceError> {
        self.bounds().validate_invariants()?;
        for (i, n) in self.neighbors().iter().enumerate() {
            if n.bounds.dim() != self.dim() {
                return Err(ReduceError::InvalidBounds(format!(
                    "neighbor entry {i} (block {}) has {} dimensions, link has {}",
                    n.target.gid,
                    n.bounds.dim(),
                    self.dim()
                )));
            }
            n.bounds.validate_invariants()?;
            if n.wrap.bits() & !n.direction.bits() != 0 {
                return Err(ReduceError::InvalidBounds(format!(
                    "neighbor entry {i} (block {}) wraps along a direction it does not point in",
                    n.target.gid
                )));
            }
        }
        Ok(())
    }
}
