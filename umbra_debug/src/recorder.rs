// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, each stamped with the
//! microseconds elapsed since the recorder was created. [`decode`] reads them
//! back as an iterator of [`RecordedEvent`].

use std::time::Instant;

use umbra_core::trace::{
    BatchSealEvent, FlushBeginEvent, FlushEndEvent, LayoutPassEvent, NonBatchedDrainEvent,
    OpApplyEvent, OpKind, PromoteEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_BATCH_SEAL: u8 = 1;
const TAG_LAYOUT_PASS: u8 = 2;
const TAG_FLUSH_BEGIN: u8 = 3;
const TAG_FLUSH_END: u8 = 4;
const TAG_NON_BATCHED_DRAIN: u8 = 5;
const TAG_OP_APPLY: u8 = 6;
const TAG_PROMOTE: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
///
/// Timestamps are taken when each event arrives, relative to the moment the
/// recorder was created, so recordings from the shadow and UI threads share
/// one timeline as long as they share one recorder.
#[derive(Debug)]
pub struct RecorderSink {
    buf: Vec<u8>,
    epoch: Instant,
}

impl Default for RecorderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderSink {
    /// Creates an empty recorder whose timeline starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            epoch: Instant::now(),
        }
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn stamp(&mut self) {
        let us = u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.write_u64(us);
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_option_u64(&mut self, v: Option<u64>) {
        match v {
            Some(val) => {
                self.write_u8(1);
                self.write_u64(val);
            }
            None => {
                self.write_u8(0);
                self.write_u64(0);
            }
        }
    }

    fn write_op_kind(&mut self, k: OpKind) {
        self.write_u8(match k {
            OpKind::Create => 0,
            OpKind::UpdateProps => 1,
            OpKind::UpdateLayout => 2,
            OpKind::ManageChildren => 3,
            OpKind::SetChildren => 4,
            OpKind::RemoveRootView => 5,
            OpKind::Measure => 6,
            OpKind::MeasureInWindow => 7,
            OpKind::Command => 8,
            OpKind::Responder => 9,
            OpKind::Accessibility => 10,
            OpKind::UiBlock => 11,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_batch_seal(&mut self, e: &BatchSealEvent) {
        self.write_u8(TAG_BATCH_SEAL);
        self.stamp();
        self.write_u64(e.batch);
        self.write_u32(e.batched_ops);
        self.write_u32(e.non_batched_ops);
        self.write_u32(e.queue_depth);
    }

    fn on_layout_pass(&mut self, e: &LayoutPassEvent) {
        self.write_u8(TAG_LAYOUT_PASS);
        self.stamp();
        self.write_u64(e.batch);
        self.write_u32(e.roots);
        self.write_u64(e.duration_ns);
    }

    fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
        self.write_u8(TAG_FLUSH_BEGIN);
        self.stamp();
        self.write_u32(e.batches);
        self.write_u32(e.ops);
    }

    fn on_flush_end(&mut self, e: &FlushEndEvent) {
        self.write_u8(TAG_FLUSH_END);
        self.stamp();
        self.write_u32(e.applied);
        self.write_u32(e.failed);
        self.write_u64(e.duration_ns);
    }

    fn on_non_batched_drain(&mut self, e: &NonBatchedDrainEvent) {
        self.write_u8(TAG_NON_BATCHED_DRAIN);
        self.stamp();
        self.write_u32(e.executed);
        self.write_u32(e.remaining);
    }

    fn on_op_apply(&mut self, e: &OpApplyEvent) {
        self.write_u8(TAG_OP_APPLY);
        self.stamp();
        self.write_option_u64(e.batch);
        self.write_op_kind(e.kind);
        self.write_i32(e.tag);
    }

    fn on_promote(&mut self, e: &PromoteEvent) {
        self.write_u8(TAG_PROMOTE);
        self.stamp();
        self.write_i32(e.tag);
        self.write_u32(e.reattached);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded record: the recorder-relative timestamp plus the event.
#[derive(Clone, Copy, Debug)]
pub struct RecordedEvent {
    /// Microseconds since the recorder was created.
    pub ts_us: u64,
    /// The recorded pipeline event.
    pub event: EventPayload,
}

/// The event half of a [`RecordedEvent`].
#[derive(Clone, Copy, Debug)]
pub enum EventPayload {
    /// A [`BatchSealEvent`].
    BatchSeal(BatchSealEvent),
    /// A [`LayoutPassEvent`].
    LayoutPass(LayoutPassEvent),
    /// A [`FlushBeginEvent`].
    FlushBegin(FlushBeginEvent),
    /// A [`FlushEndEvent`].
    FlushEnd(FlushEndEvent),
    /// A [`NonBatchedDrainEvent`].
    NonBatchedDrain(NonBatchedDrainEvent),
    /// An [`OpApplyEvent`].
    OpApply(OpApplyEvent),
    /// A [`PromoteEvent`].
    Promote(PromoteEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_i32(&mut self) -> Option<i32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = i32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_option_u64(&mut self) -> Option<Option<u64>> {
        let present = self.read_u8()?;
        let val = self.read_u64()?;
        Some(if present != 0 { Some(val) } else { None })
    }

    fn read_op_kind(&mut self) -> Option<OpKind> {
        Some(match self.read_u8()? {
            0 => OpKind::Create,
            1 => OpKind::UpdateProps,
            2 => OpKind::UpdateLayout,
            3 => OpKind::ManageChildren,
            4 => OpKind::SetChildren,
            5 => OpKind::RemoveRootView,
            6 => OpKind::Measure,
            7 => OpKind::MeasureInWindow,
            8 => OpKind::Command,
            9 => OpKind::Responder,
            10 => OpKind::Accessibility,
            _ => OpKind::UiBlock,
        })
    }

    fn decode_batch_seal(&mut self) -> Option<EventPayload> {
        Some(EventPayload::BatchSeal(BatchSealEvent {
            batch: self.read_u64()?,
            batched_ops: self.read_u32()?,
            non_batched_ops: self.read_u32()?,
            queue_depth: self.read_u32()?,
        }))
    }

    fn decode_layout_pass(&mut self) -> Option<EventPayload> {
        Some(EventPayload::LayoutPass(LayoutPassEvent {
            batch: self.read_u64()?,
            roots: self.read_u32()?,
            duration_ns: self.read_u64()?,
        }))
    }

    fn decode_flush_begin(&mut self) -> Option<EventPayload> {
        Some(EventPayload::FlushBegin(FlushBeginEvent {
            batches: self.read_u32()?,
            ops: self.read_u32()?,
        }))
    }

    fn decode_flush_end(&mut self) -> Option<EventPayload> {
        Some(EventPayload::FlushEnd(FlushEndEvent {
            applied: self.read_u32()?,
            failed: self.read_u32()?,
            duration_ns: self.read_u64()?,
        }))
    }

    fn decode_non_batched_drain(&mut self) -> Option<EventPayload> {
        Some(EventPayload::NonBatchedDrain(NonBatchedDrainEvent {
            executed: self.read_u32()?,
            remaining: self.read_u32()?,
        }))
    }

    fn decode_op_apply(&mut self) -> Option<EventPayload> {
        Some(EventPayload::OpApply(OpApplyEvent {
            batch: self.read_option_u64()?,
            kind: self.read_op_kind()?,
            tag: self.read_i32()?,
        }))
    }

    fn decode_promote(&mut self) -> Option<EventPayload> {
        Some(EventPayload::Promote(PromoteEvent {
            tag: self.read_i32()?,
            reattached: self.read_u32()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        let ts_us = self.read_u64()?;
        let event = match tag {
            TAG_BATCH_SEAL => self.decode_batch_seal(),
            TAG_LAYOUT_PASS => self.decode_layout_pass(),
            TAG_FLUSH_BEGIN => self.decode_flush_begin(),
            TAG_FLUSH_END => self.decode_flush_end(),
            TAG_NON_BATCHED_DRAIN => self.decode_non_batched_drain(),
            TAG_OP_APPLY => self.decode_op_apply(),
            TAG_PROMOTE => self.decode_promote(),
            _ => None, // unknown tag, stop iterating
        }?;
        Some(RecordedEvent { ts_us, event })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
