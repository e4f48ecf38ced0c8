// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-pipeline tests: script-shaped mutations in, host-view calls out.

use std::sync::Arc;
use std::sync::mpsc;

use parking_lot::Mutex;
use serde_json::json;

use umbra_core::error::TreeError;
use umbra_core::host::PixelRect;
use umbra_core::scheduler::FrameClass;
use umbra_core::tag::Tag;
use umbra_core::trace::{BatchSealEvent, TraceSink};
use umbra_harness::SyncHost;

const ROOT: Tag = Tag(1);

fn host() -> SyncHost {
    let mut host = SyncHost::new();
    host.attach_root(ROOT, 400.0, 400.0).expect("fresh root");
    host
}

/// Builds the collapsing fixture: a margins-only `View` 2 under the root
/// with an `Image` 3 inside, batched and flushed.
fn host_with_collapsed_view() -> SyncHost {
    let mut host = host();
    host.reconciler_mut()
        .create_view(
            Tag(2),
            "View",
            ROOT,
            json!({ "marginLeft": 10, "marginTop": 20 }),
        )
        .unwrap();
    host.reconciler_mut()
        .create_view(Tag(3), "Image", ROOT, json!({ "width": 50, "height": 40 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(Tag(2), &[], &[], &[Tag(3)], &[0], &[])
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host
}

#[test]
fn layout_only_container_never_reaches_the_host() {
    let mut host = host_with_collapsed_view();
    let calls = host.run_batch();
    // The margins-only container is collapsed: the image mounts directly
    // under the root, at the folded offset.
    assert_eq!(calls, ["create 3", "add 3 -> 1 at 0", "frame 3 10,20 50x40"]);
    assert!(host.reconciler().tree().get(Tag(2)).unwrap().is_layout_only());
    assert!(host.with_mount(|mount| !mount.contains(Tag(2))));
}

#[test]
fn non_layout_prop_promotes_a_collapsed_view() {
    let mut host = host_with_collapsed_view();
    host.run_batch();

    host.reconciler_mut()
        .update_view(Tag(2), "View", json!({ "shade": "plum" }))
        .unwrap();
    let calls = host.run_batch();
    assert_eq!(
        calls,
        [
            "create 2",
            "shade \"plum\"",
            "remove 3 from 1",
            "add 2 -> 1 at 0",
            "add 3 -> 2 at 0",
            "frame 2 10,20 390x40",
            "frame 3 0,0 50x40",
        ]
    );
    assert!(!host.reconciler().tree().get(Tag(2)).unwrap().is_layout_only());
}

#[test]
fn removing_a_collapsed_view_detaches_its_hoisted_children() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "View", ROOT, json!({ "flexDirection": "row" }))
        .unwrap();
    for (tag, width) in [(Tag(3), 50), (Tag(4), 60)] {
        host.reconciler_mut()
            .create_view(tag, "Image", ROOT, json!({ "width": width, "height": 40 }))
            .unwrap();
    }
    host.reconciler_mut()
        .manage_children(Tag(2), &[], &[], &[Tag(3), Tag(4)], &[0, 1], &[])
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();

    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[], &[], &[0])
        .unwrap();
    let calls = host.run_batch();
    // Both images were mounted on the root; removing their collapsed parent
    // removes them one by one, each at the then-current index.
    assert_eq!(
        calls,
        [
            "remove 3 from 1",
            "teardown 3",
            "remove 4 from 1",
            "teardown 4",
        ]
    );
    assert!(host.reconciler().tree().get(Tag(2)).is_err(), "subtree deleted");
    assert!(host.with_mount(|mount| mount.view_count() == 1));
}

#[test]
fn one_frame_flushes_every_sealed_batch_in_order() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "Image", ROOT, json!({ "width": 50, "height": 40 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.complete_batch();

    host.reconciler_mut()
        .create_view(Tag(3), "Image", ROOT, json!({ "width": 60, "height": 30 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(3)], &[1], &[])
        .unwrap();
    host.complete_batch();

    assert_eq!(host.frame_requests(), 1, "second batch rides the armed frame");
    assert!(host.calls().is_empty(), "nothing mounts before the frame");

    host.run_frame();
    assert_eq!(
        host.calls(),
        [
            "create 2",
            "add 2 -> 1 at 0",
            "frame 2 0,0 50x40",
            "create 3",
            "add 3 -> 1 at 1",
            "frame 3 0,40 60x30",
        ]
    );
    assert!(!host.scheduler().is_armed(), "drained scheduler disarms");
}

#[test]
fn unchanged_views_get_no_frames_on_later_batches() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "Image", ROOT, json!({ "width": 50, "height": 40 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();

    host.reconciler_mut()
        .create_view(Tag(3), "Image", ROOT, json!({ "width": 60, "height": 30 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(3)], &[1], &[])
        .unwrap();
    let calls = host.run_batch();
    assert!(
        !calls.iter().any(|call| call.starts_with("frame 2")),
        "view 2 did not move, got: {calls:?}"
    );
}

#[test]
fn label_text_measures_through_the_layout_pass() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "Label", ROOT, json!({ "text": "hi" }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    let calls = host.run_batch();
    // Two characters at eight pixels each, one sixteen-pixel line.
    assert_eq!(
        calls,
        ["create 2", "text \"hi\"", "add 2 -> 1 at 0", "frame 2 0,0 16x16"]
    );
}

#[test]
fn animated_delete_waits_for_finish_delete() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "Cell", ROOT, json!({ "shade": "mist" }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();

    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[], &[], &[0])
        .unwrap();
    let calls = host.run_batch();
    assert_eq!(calls, ["begin-delete 2"], "still mounted while animating");
    assert!(host.with_mount(|mount| mount.contains(Tag(2))));

    host.with_mount(|mount| mount.finish_delete(ROOT, Tag(2)));
    assert_eq!(host.calls(), ["remove 2 from 1", "teardown 2"]);
    assert!(host.with_mount(|mount| !mount.contains(Tag(2))));
}

#[test]
fn measure_resolves_folded_offsets_after_layout() {
    let mut host = host_with_collapsed_view();
    host.run_batch();

    let (tx, rx) = mpsc::channel();
    host.reconciler_mut().measure(
        Tag(3),
        Box::new(move |frame| tx.send(frame).expect("receiver alive")),
    );
    host.run_batch();
    assert_eq!(
        rx.try_recv().expect("reply delivered on flush"),
        Some(PixelRect::new(10, 20, 50, 40))
    );
}

#[test]
fn layout_events_fire_once_per_change() {
    let mut host = host();
    let events = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&events);
    host.reconciler_mut()
        .set_layout_event_listener(Some(Box::new(move |tag, frame| {
            seen.lock().push((tag, frame));
        })));

    host.reconciler_mut()
        .create_view(
            Tag(2),
            "Image",
            ROOT,
            json!({ "width": 100, "height": 50, "onLayout": true }),
        )
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();
    assert_eq!(*events.lock(), [(Tag(2), PixelRect::new(0, 0, 100, 50))]);

    // A batch that does not move the view stays silent.
    host.reconciler_mut()
        .create_view(Tag(3), "Image", ROOT, json!({ "width": 10, "height": 10 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(3)], &[1], &[])
        .unwrap();
    host.run_batch();
    assert_eq!(events.lock().len(), 1);
}

#[test]
fn commands_flush_ahead_of_the_batch() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "View", ROOT, json!({ "shade": "teal" }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();

    host.reconciler_mut()
        .dispatch_command(Tag(2), "focus", json!(null))
        .unwrap();
    host.reconciler_mut()
        .update_view(Tag(2), "View", json!({ "shade": "moss" }))
        .unwrap();
    let calls = host.run_batch();
    assert_eq!(calls, ["cmd 2 focus null", "shade \"moss\""]);
}

#[test]
fn over_removal_is_tolerated_only_on_empty_roots() {
    let mut host = host();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[], &[], &[0])
        .unwrap();
    assert!(host.run_batch().is_empty());

    host.reconciler_mut()
        .create_view(Tag(2), "View", ROOT, json!({ "shade": "teal" }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();

    let err = host
        .reconciler_mut()
        .manage_children(Tag(2), &[], &[], &[], &[], &[5])
        .unwrap_err();
    assert!(
        matches!(
            err,
            TreeError::ChildIndexOutOfRange {
                parent: Tag(2),
                index: 5,
                ..
            }
        ),
        "got: {err}"
    );
}

#[test]
fn dispatch_runs_before_later_frame_classes() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "Image", ROOT, json!({ "width": 50, "height": 40 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.complete_batch();

    let log = host.log().clone();
    host.scheduler().post_frame_callback(
        FrameClass::Animation,
        Box::new(move |_| log.record("animation step".to_owned())),
    );
    host.run_frame();
    assert_eq!(
        host.calls(),
        [
            "create 2",
            "add 2 -> 1 at 0",
            "frame 2 0,0 50x40",
            "animation step",
        ]
    );
}

#[test]
fn trace_sink_sees_each_sealed_batch() {
    struct SealProbe {
        seals: Arc<Mutex<Vec<(u64, u32)>>>,
    }

    impl TraceSink for SealProbe {
        fn on_batch_seal(&mut self, e: &BatchSealEvent) {
            self.seals.lock().push((e.batch, e.non_batched_ops));
        }
    }

    let mut host = host();
    let seals = Arc::new(Mutex::new(Vec::new()));
    host.reconciler_mut().set_trace_sink(Some(Box::new(SealProbe {
        seals: Arc::clone(&seals),
    })));

    host.reconciler_mut()
        .create_view(Tag(2), "Image", ROOT, json!({ "width": 50, "height": 40 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();
    host.reconciler_mut()
        .update_view(Tag(2), "Image", json!({ "width": 80 }))
        .unwrap();
    host.run_batch();

    let seals = seals.lock();
    assert_eq!(seals.len(), 2);
    assert_eq!(seals[0], (1, 1), "first batch carries the create");
    assert_eq!(seals[1].0, 2);
    assert_eq!(seals[1].1, 0, "no creates in the second batch");
}

#[test]
fn root_teardown_drops_the_mounted_subtree() {
    let mut host = host();
    host.reconciler_mut()
        .create_view(Tag(2), "View", ROOT, json!({ "shade": "teal" }))
        .unwrap();
    host.reconciler_mut()
        .create_view(Tag(3), "Image", ROOT, json!({ "width": 50, "height": 40 }))
        .unwrap();
    host.reconciler_mut()
        .manage_children(Tag(2), &[], &[], &[Tag(3)], &[0], &[])
        .unwrap();
    host.reconciler_mut()
        .manage_children(ROOT, &[], &[], &[Tag(2)], &[0], &[])
        .unwrap();
    host.run_batch();

    host.reconciler_mut().remove_root(ROOT).unwrap();
    let calls = host.run_batch();
    assert_eq!(calls, ["teardown 3", "teardown 2"]);
    assert!(host.with_mount(|mount| mount.view_count() == 0));
    assert!(host.reconciler().tree().get(Tag(2)).is_err());
}
