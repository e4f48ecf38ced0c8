// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! View and batch identity types.

use std::fmt;

/// A process-unique identifier for a view.
///
/// Tags are allocated by the embedder (typically the script runtime driving
/// the [`Reconciler`](crate::reconciler::Reconciler)) and name the same
/// logical view in the shadow tree, the operation queue, and the mounted
/// hierarchy. Umbra never invents tags; it only validates them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub i32);

impl Tag {
    /// Returns the raw tag value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identifier for a sealed operation batch.
///
/// Batch ids are assigned by the reconciler at
/// [`on_batch_complete`](crate::reconciler::Reconciler::on_batch_complete)
/// time and travel with the sealed batch through the queue, so flush-side
/// diagnostics can name the commit they belong to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(pub u64);

impl fmt::Debug for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_debug_is_compact() {
        assert_eq!(format!("{:?}", Tag(42)), "Tag(42)");
        assert_eq!(format!("{}", Tag(-7)), "-7");
    }

    #[test]
    fn batch_id_orders_monotonically() {
        assert!(BatchId(1) < BatchId(2));
        assert_eq!(format!("{:?}", BatchId(9)), "BatchId(9)");
    }
}
