// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronous mock host for exercising umbra reconciliation end to end.
//!
//! [`SyncHost`] wires a [`Reconciler`], a [`MountManager`] full of recording
//! [`MockView`]s, and a [`FrameScheduler`] over a [`ManualDriver`] into one
//! single-threaded pipeline. Everything a real embedding spreads across the
//! shadow and UI threads happens inline, in order, which makes whole-pipeline
//! assertions trivial:
//!
//! ```
//! use serde_json::json;
//! use umbra_core::tag::Tag;
//! use umbra_harness::SyncHost;
//!
//! let mut host = SyncHost::new();
//! host.attach_root(Tag(1), 320.0, 480.0).unwrap();
//! host.reconciler_mut()
//!     .create_view(Tag(2), "Image", Tag(1), json!({ "width": 100, "height": 50 }))
//!     .unwrap();
//! host.reconciler_mut()
//!     .manage_children(Tag(1), &[], &[], &[Tag(2)], &[0], &[])
//!     .unwrap();
//! host.complete_batch();
//! host.run_frame();
//! assert_eq!(
//!     host.calls(),
//!     ["create 2", "add 2 -> 1 at 0", "frame 2 0,0 100x50"]
//! );
//! ```
//!
//! Mounted views report every call into a shared [`CallLog`], one formatted
//! line per host mutation, so tests assert on exact operation order.

use std::any::Any;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;

use umbra_core::error::TreeError;
use umbra_core::host::{
    HostContainer, HostView, MeasureInput, MeasureSize, PixelRect, ViewCaps, ViewKind,
    ViewRegistry,
};
use umbra_core::mount::MountManager;
use umbra_core::ops::{FlushBudget, OpQueue};
use umbra_core::props::PropMap;
use umbra_core::reconciler::{Reconciler, ReconcilerConfig};
use umbra_core::scheduler::{FrameClass, FrameDriver, FrameScheduler};
use umbra_core::tag::Tag;
use umbra_core::trace::Tracer;

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// Shared, cloneable log of host-side calls, one formatted line each.
///
/// View factories are plain function pointers and cannot capture a log, so
/// the log a [`MockView`] writes to is the thread's *installed* log. Creating
/// a [`SyncHost`] installs its own; standalone uses call [`CallLog::install`]
/// first.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

thread_local! {
    static ACTIVE_LOG: RefCell<CallLog> = RefCell::new(CallLog::default());
}

impl CallLog {
    /// Makes this log the one mock views created on this thread write to.
    pub fn install(&self) {
        ACTIVE_LOG.with(|active| *active.borrow_mut() = self.clone());
    }

    /// The log currently installed on this thread.
    #[must_use]
    pub fn active() -> Self {
        ACTIVE_LOG.with(|active| active.borrow().clone())
    }

    /// Appends one line.
    pub fn record(&self, line: String) {
        self.calls.lock().push(line);
    }

    /// Drains and returns everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        self.calls.lock().drain(..).collect()
    }

    /// Copies the recorded lines without draining them.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Discards everything recorded so far.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

// ---------------------------------------------------------------------------
// MockView
// ---------------------------------------------------------------------------

/// A recording host view.
///
/// Every mutation is appended to the installed [`CallLog`]:
///
/// - `create 2` on creation
/// - `frame 2 0,0 100x50` on [`HostView::set_frame`]
/// - `add 2 -> 1 at 0` / `remove 2 from 1` on child surgery
/// - `shade "teal"` on a prop setter
/// - `begin-delete 2` / `teardown 2` on the delete path
/// - `cmd 2 focus null` on a command
pub struct MockView {
    tag: Tag,
    container: bool,
    frame: PixelRect,
    children: Vec<Tag>,
    props: serde_json::Map<String, Value>,
    log: CallLog,
}

impl std::fmt::Debug for MockView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockView")
            .field("tag", &self.tag)
            .field("container", &self.container)
            .field("frame", &self.frame)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

impl MockView {
    fn boxed(tag: Tag, container: bool) -> Box<dyn HostView> {
        Box::new(Self {
            tag,
            container,
            frame: PixelRect::ZERO,
            children: Vec::new(),
            props: serde_json::Map::new(),
            log: CallLog::active(),
        })
    }

    /// The last value a setter stored for `key`.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Tags of the attached children, in native order.
    #[must_use]
    pub fn children(&self) -> &[Tag] {
        &self.children
    }

    fn set_prop(&mut self, key: &str, value: &Value) {
        self.log.record(format!("{key} {value}"));
        self.props.insert(key.to_owned(), value.clone());
    }
}

impl HostView for MockView {
    fn set_frame(&mut self, frame: PixelRect) {
        self.frame = frame;
        self.log.record(format!(
            "frame {} {},{} {}x{}",
            self.tag, frame.x, frame.y, frame.width, frame.height
        ));
    }

    fn frame(&self) -> PixelRect {
        self.frame
    }

    fn as_container(&mut self) -> Option<&mut dyn HostContainer> {
        if self.container { Some(self) } else { None }
    }

    fn as_any(&mut self) -> &mut dyn Any {
        self
    }

    fn accessibility_event(&mut self, event: i32) {
        self.log.record(format!("a11y {} {event}", self.tag));
    }

    fn begin_delete_transition(&mut self) {
        self.log.record(format!("begin-delete {}", self.tag));
    }

    fn on_teardown(&mut self) {
        self.log.record(format!("teardown {}", self.tag));
    }
}

impl HostContainer for MockView {
    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child_tag_at(&self, index: usize) -> Option<Tag> {
        self.children.get(index).copied()
    }

    fn add_child_at(&mut self, index: usize, child_tag: Tag, _child: &mut dyn HostView) {
        self.children.insert(index, child_tag);
        self.log
            .record(format!("add {child_tag} -> {} at {index}", self.tag));
    }

    fn remove_child_at(&mut self, index: usize) {
        let removed = self.children.remove(index);
        self.log.record(format!("remove {removed} from {}", self.tag));
    }

    fn remove_all_children(&mut self) {
        self.children.clear();
        self.log.record(format!("clear {}", self.tag));
    }
}

// ---------------------------------------------------------------------------
// Mock view kinds
// ---------------------------------------------------------------------------

fn create_container(tag: Tag) -> Box<dyn HostView> {
    CallLog::active().record(format!("create {tag}"));
    MockView::boxed(tag, true)
}

fn create_leaf(tag: Tag) -> Box<dyn HostView> {
    CallLog::active().record(format!("create {tag}"));
    MockView::boxed(tag, false)
}

fn mock_view(view: &mut dyn HostView) -> &mut MockView {
    view.as_any()
        .downcast_mut::<MockView>()
        .expect("setter registered for a mock kind")
}

fn set_shade(view: &mut dyn HostView, value: &Value) {
    mock_view(view).set_prop("shade", value);
}

fn set_source(view: &mut dyn HostView, value: &Value) {
    mock_view(view).set_prop("source", value);
}

fn set_text(view: &mut dyn HostView, value: &Value) {
    mock_view(view).set_prop("text", value);
}

fn run_command(view: &mut dyn HostView, command: &str, args: &Value) {
    let view = mock_view(view);
    view.log.record(format!("cmd {} {command} {args}", view.tag));
}

/// Eight pixels per character, one line of sixteen.
fn measure_label(props: &PropMap, input: &MeasureInput) -> MeasureSize {
    let chars = props.get_str("text").map_or(0, |t| t.chars().count());
    let natural = chars as f32 * 8.0;
    MeasureSize {
        width: input.max_width.map_or(natural, |max| natural.min(max)),
        height: 16.0,
    }
}

/// The collapsible generic container.
pub static VIEW: ViewKind = ViewKind {
    name: "View",
    caps: ViewCaps::CONTAINER,
    create: create_container,
    setters: &[("shade", set_shade)],
    command: Some(run_command),
    measure: None,
};

/// A self-measuring text leaf (eight pixels per character).
pub static LABEL: ViewKind = ViewKind {
    name: "Label",
    caps: ViewCaps::empty(),
    create: create_leaf,
    setters: &[("text", set_text)],
    command: None,
    measure: Some(measure_label),
};

/// A plain leaf with a `source` prop.
pub static IMAGE: ViewKind = ViewKind {
    name: "Image",
    caps: ViewCaps::empty(),
    create: create_leaf,
    setters: &[("source", set_source)],
    command: None,
    measure: None,
};

/// A container whose deletes animate out.
pub static CELL: ViewKind = ViewKind {
    name: "Cell",
    caps: ViewCaps::CONTAINER.union(ViewCaps::DELETE_TRANSITION),
    create: create_container,
    setters: &[("shade", set_shade)],
    command: None,
    measure: None,
};

/// A registry of the mock kinds, with `"View"` as the generic container.
#[must_use]
pub fn mock_registry() -> ViewRegistry {
    ViewRegistry::new([&VIEW, &LABEL, &IMAGE, &CELL], "View")
}

// ---------------------------------------------------------------------------
// ManualDriver
// ---------------------------------------------------------------------------

/// A [`FrameDriver`] that only counts requests; the test decides when the
/// frame actually happens by calling [`SyncHost::run_frame`].
#[derive(Debug, Default)]
pub struct ManualDriver {
    requests: AtomicU32,
}

impl ManualDriver {
    /// Total frames requested so far.
    #[must_use]
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl FrameDriver for ManualDriver {
    fn request_frame(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// SyncHost
// ---------------------------------------------------------------------------

/// The full pipeline on one thread: reconciler, queue, scheduler, mount.
///
/// [`complete_batch`](Self::complete_batch) seals the current batch and posts
/// the dispatch-class flush callback, exactly as an embedding's bridge would;
/// [`run_frame`](Self::run_frame) plays the role of the platform vsync and
/// actually applies the batch to the mock views.
pub struct SyncHost {
    reconciler: Reconciler,
    mount: Rc<RefCell<MountManager>>,
    scheduler: Rc<FrameScheduler>,
    driver: Arc<ManualDriver>,
    log: CallLog,
}

impl std::fmt::Debug for SyncHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHost")
            .field("batches", &self.reconciler.batch_count())
            .field("frame_requests", &self.driver.requests())
            .finish_non_exhaustive()
    }
}

impl Default for SyncHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncHost {
    /// Builds a host around [`mock_registry`] and installs a fresh
    /// [`CallLog`] on the current thread.
    #[must_use]
    pub fn new() -> Self {
        let log = CallLog::default();
        log.install();
        let registry = Arc::new(mock_registry());
        let queue = Arc::new(OpQueue::new(FlushBudget::default()));
        let reconciler = Reconciler::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            ReconcilerConfig::new(),
        );
        let driver = Arc::new(ManualDriver::default());
        let scheduler = Rc::new(FrameScheduler::new(
            Arc::clone(&driver) as Arc<dyn FrameDriver>
        ));
        Self {
            reconciler,
            mount: Rc::new(RefCell::new(MountManager::new(registry))),
            scheduler,
            driver,
            log,
        }
    }

    /// The shadow-side reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Mutable access to the reconciler, for driving mutations.
    pub fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    /// The frame scheduler, for posting extra callbacks.
    #[must_use]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// The log mounted views record into.
    #[must_use]
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Frames the scheduler has asked the driver for.
    #[must_use]
    pub fn frame_requests(&self) -> u32 {
        self.driver.requests()
    }

    /// Runs `f` against the mount manager, as UI-thread embedder code would.
    pub fn with_mount<R>(&self, f: impl FnOnce(&mut MountManager) -> R) -> R {
        f(&mut self.mount.borrow_mut())
    }

    /// Direct mutable access to the mount manager.
    pub fn mount_mut(&self) -> RefMut<'_, MountManager> {
        self.mount.borrow_mut()
    }

    /// Registers a root with the reconciler and mounts its host container.
    ///
    /// `width` and `height` are layout units; the mounted root container gets
    /// the equivalent pixel frame.
    pub fn attach_root(&mut self, tag: Tag, width: f32, height: f32) -> Result<(), TreeError> {
        self.reconciler.register_root(tag, width, height)?;
        let mut view = MockView::boxed(tag, true);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "root sizes in tests are small integers"
        )]
        view.set_frame(PixelRect::new(0, 0, width as i32, height as i32));
        self.mount.borrow_mut().add_root_view(tag, view)?;
        self.log.clear();
        Ok(())
    }

    /// Seals the pending batch and posts the dispatch-class flush, like the
    /// bridge does at the end of a script transaction.
    pub fn complete_batch(&mut self) {
        self.reconciler.on_batch_complete();
        let mount = Rc::clone(&self.mount);
        let queue = Arc::clone(self.reconciler.queue());
        self.scheduler.post_frame_callback(
            FrameClass::Dispatch,
            Box::new(move |_| {
                queue.flush(&mut mount.borrow_mut(), &mut Tracer::none());
            }),
        );
    }

    /// Ticks the scheduler once, standing in for the platform vsync.
    pub fn run_frame(&mut self) {
        self.scheduler.run_frame(Instant::now());
    }

    /// Seals, flushes, and returns everything the views recorded.
    pub fn run_batch(&mut self) -> Vec<String> {
        self.complete_batch();
        self.run_frame();
        self.calls()
    }

    /// Drains the call log.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.log.take()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registry_exposes_the_mock_kinds() {
        let registry = mock_registry();
        assert!(registry.is_generic_container("View"));
        assert!(registry.get("Label").unwrap().measure.is_some());
        assert!(
            registry
                .get("Cell")
                .unwrap()
                .caps
                .contains(ViewCaps::DELETE_TRANSITION)
        );
        assert!(registry.get("Window").is_none());
    }

    #[test]
    fn label_measure_clamps_to_available_width() {
        let props = PropMap::from_value(json!({ "text": "hello world" }));
        let free = measure_label(&props, &MeasureInput::default());
        assert_eq!(free.width, 88.0);
        assert_eq!(free.height, 16.0);

        let clamped = measure_label(
            &props,
            &MeasureInput {
                max_width: Some(40.0),
                ..MeasureInput::default()
            },
        );
        assert_eq!(clamped.width, 40.0);
    }

    #[test]
    fn mock_views_record_into_the_installed_log() {
        let log = CallLog::default();
        log.install();
        let mut view = (VIEW.create)(Tag(5));
        view.set_frame(PixelRect::new(1, 2, 3, 4));
        (VIEW.setters[0].1)(view.as_mut(), &json!("teal"));
        assert_eq!(log.take(), ["create 5", "frame 5 1,2 3x4", "shade \"teal\""]);
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn manual_driver_counts_requests() {
        let driver = ManualDriver::default();
        driver.request_frame();
        driver.request_frame();
        assert_eq!(driver.requests(), 2);
    }

    #[test]
    fn sync_host_round_trip() {
        let mut host = SyncHost::new();
        host.attach_root(Tag(1), 200.0, 100.0).unwrap();
        host.reconciler_mut()
            .create_view(Tag(2), "Image", Tag(1), json!({ "width": 50, "height": 40 }))
            .unwrap();
        host.reconciler_mut()
            .manage_children(Tag(1), &[], &[], &[Tag(2)], &[0], &[])
            .unwrap();

        assert_eq!(host.frame_requests(), 0, "nothing posted yet");
        let calls = host.run_batch();
        assert_eq!(calls, ["create 2", "add 2 -> 1 at 0", "frame 2 0,0 50x40"]);
        assert_eq!(host.frame_requests(), 1);
    }
}
