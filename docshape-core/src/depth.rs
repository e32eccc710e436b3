//! Recursion ceiling for nested conversions.
//!
//! A [`Depth`] is threaded by value down a single conversion call chain. Every
//! recursive conversion function calls [`Depth::enter`] first, so array nesting and
//! document nesting count against the same ceiling.

use crate::error::{ConversionError, ConversionResult};

/// Default maximum recursion depth of one conversion call.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Current recursion depth of a conversion call chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Depth(usize);

impl Depth {
    /// Depth of a fresh top-level conversion call.
    pub const ROOT: Depth = Depth(0);

    /// Returns the number of recursive conversion functions entered so far.
    pub fn get(self) -> usize {
        self.0
    }

    /// Enters one more level of recursion.
    ///
    /// Fails with [`ConversionError::DepthExceeded`] once the incremented depth is
    /// above `max_depth`.
    pub fn enter(self, max_depth: usize) -> ConversionResult<Depth> {
        let next = self.0 + 1;
        if next > max_depth {
            return Err(ConversionError::DepthExceeded(max_depth));
        }
        Ok(Depth(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_up_to_max() {
        let mut depth = Depth::ROOT;
        for _ in 0..3 {
            depth = depth.enter(3).unwrap();
        }
        assert_eq!(depth.get(), 3);
    }

    #[test]
    fn test_enter_past_max() {
        let depth = Depth::ROOT.enter(1).unwrap();
        assert_eq!(depth.enter(1), Err(ConversionError::DepthExceeded(1)));
    }

    #[test]
    fn test_zero_ceiling_rejects_first_level() {
        assert!(Depth::ROOT.enter(0).is_err());
    }
}
