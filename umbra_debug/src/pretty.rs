// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Each line is
//! prefixed with the microseconds elapsed since the sink was created.

use std::io::Write;
use std::time::Instant;

use umbra_core::trace::{
    BatchSealEvent, FlushBeginEvent, FlushEndEvent, LayoutPassEvent, NonBatchedDrainEvent,
    OpApplyEvent, OpKind, PromoteEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write)
/// destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    epoch: Instant,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            epoch: Instant::now(),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            epoch: Instant::now(),
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            epoch: Instant::now(),
        }
    }

    fn elapsed_us(&self) -> u128 {
        self.epoch.elapsed().as_micros()
    }
}

fn ns_to_us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

fn op_name(kind: OpKind) -> &'static str {
    match kind {
        OpKind::Create => "create",
        OpKind::UpdateProps => "update-props",
        OpKind::UpdateLayout => "update-layout",
        OpKind::ManageChildren => "manage-children",
        OpKind::SetChildren => "set-children",
        OpKind::RemoveRootView => "remove-root",
        OpKind::Measure => "measure",
        OpKind::MeasureInWindow => "measure-in-window",
        OpKind::Command => "command",
        OpKind::Responder => "responder",
        OpKind::Accessibility => "accessibility",
        OpKind::UiBlock => "ui-block",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_batch_seal(&mut self, e: &BatchSealEvent) {
        let _ = writeln!(
            self.writer,
            "[seal] +{}µs batch={} ops={}+{} depth={}",
            self.elapsed_us(),
            e.batch,
            e.batched_ops,
            e.non_batched_ops,
            e.queue_depth,
        );
    }

    fn on_layout_pass(&mut self, e: &LayoutPassEvent) {
        let _ = writeln!(
            self.writer,
            "[layout] +{}µs batch={} roots={} took={:.1}µs",
            self.elapsed_us(),
            e.batch,
            e.roots,
            ns_to_us(e.duration_ns),
        );
    }

    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[flush:begin] +{}µs batches={} ops={}",
            self.elapsed_us(),
            e.batches,
            e.ops,
        );
    }

    fn on_flush_end(&mut self, e: &FlushEndEvent) {
        let failed = if e.failed == 0 { "ok" } else { "FAILED" };
        let _ = writeln!(
            self.writer,
            "[flush:end] +{}µs applied={} failed={} took={:.1}µs {failed}",
            self.elapsed_us(),
            e.applied,
            e.failed,
            ns_to_us(e.duration_ns),
        );
    }

    fn on_non_batched_drain(&mut self, e: &NonBatchedDrainEvent) {
        let _ = writeln!(
            self.writer,
            "[drain] +{}µs executed={} remaining={}",
            self.elapsed_us(),
            e.executed,
            e.remaining,
        );
    }

    fn on_op_apply(&mut self, e: &OpApplyEvent) {
        let batch = e
            .batch
            .map_or_else(|| "-".to_string(), |b| b.to_string());
        let _ = writeln!(
            self.writer,
            "[op] +{}µs batch={batch} {} tag={}",
            self.elapsed_us(),
            op_name(e.kind),
            e.tag,
        );
    }

    fn on_promote(&mut self, e: &PromoteEvent) {
        let _ = writeln!(
            self.writer,
            "[promote] +{}µs tag={} reattached={}",
            self.elapsed_us(),
            e.tag,
            e.reattached,
        );
    }
}
