// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Shadow-thread events (batch seals, layout passes) land on `tid` 0 and
//! UI-thread events (flushes, drains, applied ops) on `tid` 1, so the two
//! halves of the pipeline show up as separate tracks.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{EventPayload, decode};

const TID_SHADOW: u32 = 0;
const TID_UI: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are the recorder-relative microseconds stamped on each record.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        let ts = recorded.ts_us;
        match recorded.event {
            EventPayload::BatchSeal(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "BatchSeal",
                    "cat": "Queue",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_SHADOW,
                    "s": "t",
                    "args": {
                        "batch": e.batch,
                        "batched_ops": e.batched_ops,
                        "non_batched_ops": e.non_batched_ops,
                        "queue_depth": e.queue_depth,
                    }
                }));
            }
            EventPayload::LayoutPass(e) => {
                let dur_us = e.duration_ns / 1000;
                events.push(json!({
                    "ph": "X",
                    "name": "LayoutPass",
                    "cat": "Layout",
                    "ts": ts.saturating_sub(dur_us),
                    "dur": dur_us,
                    "pid": 0,
                    "tid": TID_SHADOW,
                    "args": {
                        "batch": e.batch,
                        "roots": e.roots,
                    }
                }));
            }
            EventPayload::FlushBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": "Flush",
                    "cat": "Mount",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_UI,
                    "args": {
                        "batches": e.batches,
                        "ops": e.ops,
                    }
                }));
            }
            EventPayload::FlushEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Flush",
                    "cat": "Mount",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_UI,
                    "args": {
                        "applied": e.applied,
                        "failed": e.failed,
                    }
                }));
            }
            EventPayload::NonBatchedDrain(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "NonBatchedDrain",
                    "cat": "Mount",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_UI,
                    "s": "t",
                    "args": {
                        "executed": e.executed,
                        "remaining": e.remaining,
                    }
                }));
            }
            EventPayload::OpApply(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Op",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_UI,
                    "s": "t",
                    "args": {
                        "kind": format!("{:?}", e.kind),
                        "tag": e.tag,
                        "batch": e.batch,
                    }
                }));
            }
            EventPayload::Promote(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Promote",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": 0,
                    "tid": TID_SHADOW,
                    "s": "t",
                    "args": {
                        "tag": e.tag,
                        "reattached": e.reattached,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use umbra_core::trace::{
        BatchSealEvent, FlushBeginEvent, FlushEndEvent, LayoutPassEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_batch_seal(&BatchSealEvent {
            batch: 0,
            batched_ops: 4,
            non_batched_ops: 1,
            queue_depth: 1,
        });
        rec.on_layout_pass(&LayoutPassEvent {
            batch: 0,
            roots: 1,
            duration_ns: 12_000,
        });
        rec.on_flush_begin(&FlushBeginEvent { batches: 1, ops: 5 });
        rec.on_flush_end(&FlushEndEvent {
            applied: 5,
            failed: 0,
            duration_ns: 8_000,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 4);

        // First event is an instant BatchSeal on the shadow track.
        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "BatchSeal");
        assert_eq!(parsed[0]["tid"], 0);

        // Second is a complete LayoutPass with a duration.
        assert_eq!(parsed[1]["ph"], "X");
        assert_eq!(parsed[1]["dur"], 12);

        // Then a flush begin/end pair on the UI track.
        assert_eq!(parsed[2]["ph"], "B");
        assert_eq!(parsed[2]["tid"], 1);
        assert_eq!(parsed[3]["ph"], "E");
        assert_eq!(parsed[3]["args"]["applied"], 5);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
