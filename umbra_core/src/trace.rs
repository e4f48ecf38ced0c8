// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the reconciliation pipeline.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! pipeline instrumentation calls at each stage. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) — gates the per-operation
//!   [`OpApplyEvent`] and optimizer [`PromoteEvent`] plus the corresponding
//!   `TraceSink` methods.

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which kind of mount operation an event refers to.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// View creation.
    Create,
    /// Property update.
    UpdateProps,
    /// Frame assignment.
    UpdateLayout,
    /// Child list surgery (removes, adds, deletes).
    ManageChildren,
    /// Initial child attachment.
    SetChildren,
    /// Root view teardown.
    RemoveRootView,
    /// Asynchronous measurement.
    Measure,
    /// Window-relative measurement.
    MeasureInWindow,
    /// View command dispatch.
    Command,
    /// Touch responder lock or release.
    Responder,
    /// Accessibility event.
    Accessibility,
    /// Host-supplied closure.
    UiBlock,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the reconciler seals a batch into the queue.
#[derive(Clone, Copy, Debug)]
pub struct BatchSealEvent {
    /// Monotonic batch counter.
    pub batch: u64,
    /// Number of batched operations sealed.
    pub batched_ops: u32,
    /// Number of non-batched (create) operations snapshotted into the batch.
    pub non_batched_ops: u32,
    /// Sealed batches waiting for a flush, including this one.
    pub queue_depth: u32,
}

/// Emitted after the layout pass for a batch completes.
#[derive(Clone, Copy, Debug)]
pub struct LayoutPassEvent {
    /// Batch counter.
    pub batch: u64,
    /// Number of roots laid out.
    pub roots: u32,
    /// Wall-clock duration of the pass in nanoseconds.
    pub duration_ns: u64,
}

/// Marks the beginning of a flush on the mount thread.
#[derive(Clone, Copy, Debug)]
pub struct FlushBeginEvent {
    /// Sealed batches about to be applied.
    pub batches: u32,
    /// Total operations across those batches.
    pub ops: u32,
}

/// Marks the end of a flush on the mount thread.
#[derive(Clone, Copy, Debug)]
pub struct FlushEndEvent {
    /// Operations applied successfully.
    pub applied: u32,
    /// Operations that failed and were skipped.
    pub failed: u32,
    /// Wall-clock duration of the flush in nanoseconds.
    pub duration_ns: u64,
}

/// Emitted after a budgeted drain of the non-batched create lane.
#[derive(Clone, Copy, Debug)]
pub struct NonBatchedDrainEvent {
    /// Operations executed in this drain.
    pub executed: u32,
    /// Operations left for the next frame.
    pub remaining: u32,
}

/// A single mount operation being applied (requires `trace-rich`).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct OpApplyEvent {
    /// Batch the operation belongs to, if batched.
    pub batch: Option<u64>,
    /// Operation kind.
    pub kind: OpKind,
    /// Primary tag the operation targets.
    pub tag: i32,
}

/// A layout-only node being promoted to a real view (requires `trace-rich`).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct PromoteEvent {
    /// The promoted node.
    pub tag: i32,
    /// Native children re-attached as part of the promotion.
    pub reattached: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the reconciliation pipeline.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a batch is sealed into the queue.
    fn on_batch_seal(&mut self, e: &BatchSealEvent) {
        _ = e;
    }

    /// Called after the layout pass for a batch.
    fn on_layout_pass(&mut self, e: &LayoutPassEvent) {
        _ = e;
    }

    /// Called at the beginning of a mount-thread flush.
    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        _ = e;
    }

    /// Called at the end of a mount-thread flush.
    fn on_flush_end(&mut self, e: &FlushEndEvent) {
        _ = e;
    }

    /// Called after a budgeted non-batched drain.
    fn on_non_batched_drain(&mut self, e: &NonBatchedDrainEvent) {
        _ = e;
    }

    /// Called per applied operation (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_op_apply(&mut self, e: &OpApplyEvent) {
        _ = e;
    }

    /// Called when a layout-only node is promoted (requires `trace-rich`
    /// feature).
    #[cfg(feature = "trace-rich")]
    fn on_promote(&mut self, e: &PromoteEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: std::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl std::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: std::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: std::marker::PhantomData,
            }
        }
    }

    /// Emits a [`BatchSealEvent`].
    #[inline]
    pub fn batch_seal(&mut self, e: &BatchSealEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_batch_seal(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LayoutPassEvent`].
    #[inline]
    pub fn layout_pass(&mut self, e: &LayoutPassEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_layout_pass(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FlushBeginEvent`].
    #[inline]
    pub fn flush_begin(&mut self, e: &FlushBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_flush_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FlushEndEvent`].
    #[inline]
    pub fn flush_end(&mut self, e: &FlushEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_flush_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`NonBatchedDrainEvent`].
    #[inline]
    pub fn non_batched_drain(&mut self, e: &NonBatchedDrainEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_non_batched_drain(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`OpApplyEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn op_apply(&mut self, e: &OpApplyEvent) {
        if let Some(s) = &mut self.sink {
            s.on_op_apply(e);
        }
    }

    /// Emits a [`PromoteEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn promote(&mut self, e: &PromoteEvent) {
        if let Some(s) = &mut self.sink {
            s.on_promote(e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_seal() -> BatchSealEvent {
        BatchSealEvent {
            batch: 7,
            batched_ops: 12,
            non_batched_ops: 3,
            queue_depth: 1,
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_batch_seal(&sample_seal());
        sink.on_layout_pass(&LayoutPassEvent {
            batch: 7,
            roots: 1,
            duration_ns: 500,
        });
        sink.on_flush_begin(&FlushBeginEvent { batches: 1, ops: 15 });
        sink.on_flush_end(&FlushEndEvent {
            applied: 15,
            failed: 0,
            duration_ns: 2_000,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.batch_seal(&sample_seal());
        tracer.non_batched_drain(&NonBatchedDrainEvent {
            executed: 2,
            remaining: 0,
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        struct RecordingSink {
            batches: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_batch_seal(&mut self, e: &BatchSealEvent) {
                self.batches.push(e.batch);
            }
        }

        let mut sink = RecordingSink {
            batches: Vec::new(),
        };
        let mut tracer = Tracer::new(&mut sink);
        tracer.batch_seal(&sample_seal());
        drop(tracer);
        assert_eq!(sink.batches, &[7]);
    }
}
