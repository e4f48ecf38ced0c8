// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The operation queue between the shadow side and the mount side.
//!
//! Reconciliation produces [`MountOp`]s on the shadow thread; the mount
//! thread consumes them. Operations carry only owned data (tags, prop maps,
//! frames), never references into the shadow tree, so a sealed batch can
//! cross threads after the shadow tree has moved on.
//!
//! The queue keeps three live lanes:
//!
//! - *non-batched*: view creations. A creation has no ordering dependency on
//!   anything mounted earlier, so the mount thread may run pending creations
//!   ahead of their batch whenever a frame has budget left
//!   ([`OpQueue::drain_non_batched_until`]).
//! - *batched*: everything else, in enqueue order.
//! - *commands*: view commands. They run before the rest of their batch and
//!   get one retry on failure, because scripts may address a view whose
//!   creation is still in flight.
//!
//! [`OpQueue::seal_batch`] swaps all three lanes out under their locks and
//! appends them as one [`SealedBatch`]; [`OpQueue::flush`] applies sealed
//! batches in seal order on the mount thread. An operation that fails is
//! logged and skipped; the rest of its batch still applies.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::host::{PixelRect, ViewKind};
use crate::mount::MountManager;
use crate::props::PropMap;
use crate::tag::{BatchId, Tag};
#[cfg(feature = "trace-rich")]
use crate::trace::{OpApplyEvent, OpKind};
use crate::trace::{
    BatchSealEvent, FlushBeginEvent, FlushEndEvent, NonBatchedDrainEvent, Tracer,
};

/// Receives the outcome of an asynchronous measurement: the measured frame,
/// or `None` when the view does not exist or is not attached to a root.
pub type MeasureReply = Box<dyn FnOnce(Option<PixelRect>) + Send>;

/// An embedder closure that runs on the mount thread in queue position.
pub type UiBlockFn = Box<dyn FnOnce(&mut MountManager) + Send>;

/// A child tag paired with the native index it should land at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewAtIndex {
    /// The child view.
    pub tag: Tag,
    /// Destination index in the parent's native child list.
    pub index: usize,
}

impl ViewAtIndex {
    /// Pairs a tag with its destination index.
    #[must_use]
    pub const fn new(tag: Tag, index: usize) -> Self {
        Self { tag, index }
    }
}

/// One primitive mutation of the mounted hierarchy.
pub(crate) enum MountOp {
    /// Instantiate the host view for `tag`.
    CreateView {
        tag: Tag,
        kind: &'static ViewKind,
        initial_props: PropMap,
    },
    /// Apply changed props to a mounted view.
    UpdateProps { tag: Tag, props: PropMap },
    /// Assign a frame to `tag`, a native child of `parent`.
    UpdateLayout {
        parent: Tag,
        tag: Tag,
        frame: PixelRect,
    },
    /// Attach the initial children of a fresh container.
    SetChildren { tag: Tag, children: Vec<Tag> },
    /// Remove, add, and delete children of one container.
    ManageChildren {
        tag: Tag,
        remove_indices: Vec<usize>,
        add: Vec<ViewAtIndex>,
        delete_tags: Vec<Tag>,
    },
    /// Tear down a root view and its whole mounted subtree.
    RemoveRootView { tag: Tag },
    /// Measure a view relative to its root.
    Measure { tag: Tag, reply: MeasureReply },
    /// Measure a view in window coordinates.
    MeasureInWindow { tag: Tag, reply: MeasureReply },
    /// Give the touch responder lock to a view.
    SetJsResponder {
        tag: Tag,
        initial_tag: Tag,
        block_native: bool,
    },
    /// Release the touch responder lock.
    ClearJsResponder,
    /// Deliver a platform accessibility event code.
    SendAccessibilityEvent { tag: Tag, event: i32 },
    /// Run an embedder closure against the mount manager.
    UiBlock { block: UiBlockFn },
}

impl MountOp {
    /// Short label for failure logs.
    fn label(&self) -> &'static str {
        match self {
            Self::CreateView { .. } => "create view",
            Self::UpdateProps { .. } => "update props",
            Self::UpdateLayout { .. } => "update layout",
            Self::SetChildren { .. } => "set children",
            Self::ManageChildren { .. } => "manage children",
            Self::RemoveRootView { .. } => "remove root view",
            Self::Measure { .. } => "measure",
            Self::MeasureInWindow { .. } => "measure in window",
            Self::SetJsResponder { .. } => "set responder",
            Self::ClearJsResponder => "clear responder",
            Self::SendAccessibilityEvent { .. } => "accessibility event",
            Self::UiBlock { .. } => "ui block",
        }
    }

    /// The tag the operation targets; `Tag(0)` for untargeted operations.
    fn primary_tag(&self) -> Tag {
        match self {
            Self::CreateView { tag, .. }
            | Self::UpdateProps { tag, .. }
            | Self::UpdateLayout { tag, .. }
            | Self::SetChildren { tag, .. }
            | Self::ManageChildren { tag, .. }
            | Self::RemoveRootView { tag }
            | Self::Measure { tag, .. }
            | Self::MeasureInWindow { tag, .. }
            | Self::SetJsResponder { tag, .. }
            | Self::SendAccessibilityEvent { tag, .. } => *tag,
            Self::ClearJsResponder | Self::UiBlock { .. } => Tag(0),
        }
    }

    #[cfg(feature = "trace-rich")]
    fn trace_kind(&self) -> OpKind {
        match self {
            Self::CreateView { .. } => OpKind::Create,
            Self::UpdateProps { .. } => OpKind::UpdateProps,
            Self::UpdateLayout { .. } => OpKind::UpdateLayout,
            Self::SetChildren { .. } => OpKind::SetChildren,
            Self::ManageChildren { .. } => OpKind::ManageChildren,
            Self::RemoveRootView { .. } => OpKind::RemoveRootView,
            Self::Measure { .. } => OpKind::Measure,
            Self::MeasureInWindow { .. } => OpKind::MeasureInWindow,
            Self::SetJsResponder { .. } | Self::ClearJsResponder => OpKind::Responder,
            Self::SendAccessibilityEvent { .. } => OpKind::Accessibility,
            Self::UiBlock { .. } => OpKind::UiBlock,
        }
    }
}

/// A view command waiting on the command lane.
struct ViewCommand {
    tag: Tag,
    command: String,
    args: Value,
    retried: bool,
}

/// The three lanes of one batch, swapped out at seal time.
struct SealedBatch {
    batch: BatchId,
    commands: Vec<ViewCommand>,
    non_batched: Vec<MountOp>,
    batched: Vec<MountOp>,
}

impl SealedBatch {
    fn len(&self) -> usize {
        self.commands.len() + self.non_batched.len() + self.batched.len()
    }
}

/// Budget for running non-batched creations inside a frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlushBudget {
    /// Nominal frame interval.
    pub frame_interval: Duration,
    /// The drain stops once less than this much of the frame remains.
    pub min_remaining: Duration,
}

impl FlushBudget {
    /// The 60 Hz default: stop draining once half the frame is spent.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            min_remaining: Duration::from_millis(8),
        }
    }

    /// Latest instant at which a drain that began its frame at `frame_start`
    /// may still pull another operation.
    #[must_use]
    pub fn deadline(self, frame_start: Instant) -> Instant {
        frame_start + self.frame_interval.saturating_sub(self.min_remaining)
    }
}

impl Default for FlushBudget {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared operation queue.
///
/// The shadow side enqueues and seals; the mount side flushes. All methods
/// take `&self`, so the queue lives behind an `Arc` shared by both sides. No
/// lane lock is held while an operation runs, so operations and embedder
/// blocks may themselves enqueue.
///
/// While the host is paused the frame driver is parked, so the embedder
/// flushes directly after each seal instead of from its frame hook.
pub struct OpQueue {
    commands: Mutex<Vec<ViewCommand>>,
    batched: Mutex<Vec<MountOp>>,
    non_batched: Mutex<VecDeque<MountOp>>,
    sealed: Mutex<VecDeque<SealedBatch>>,
    paused: AtomicBool,
    budget: FlushBudget,
}

impl std::fmt::Debug for OpQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpQueue")
            .field("commands", &self.commands.lock().len())
            .field("batched", &self.batched.lock().len())
            .field("non_batched", &self.non_batched.lock().len())
            .field("sealed", &self.sealed.lock().len())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

impl Default for OpQueue {
    fn default() -> Self {
        Self::new(FlushBudget::new())
    }
}

impl OpQueue {
    /// Creates an empty queue with the given drain budget.
    #[must_use]
    pub fn new(budget: FlushBudget) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            batched: Mutex::new(Vec::new()),
            non_batched: Mutex::new(VecDeque::new()),
            sealed: Mutex::new(VecDeque::new()),
            paused: AtomicBool::new(false),
            budget,
        }
    }

    /// The configured drain budget.
    #[must_use]
    pub fn budget(&self) -> FlushBudget {
        self.budget
    }

    // -- Enqueueing (shadow side) --

    /// Queues a view creation on the non-batched lane.
    pub fn enqueue_create_view(&self, tag: Tag, kind: &'static ViewKind, initial_props: PropMap) {
        self.non_batched.lock().push_back(MountOp::CreateView {
            tag,
            kind,
            initial_props,
        });
    }

    /// Queues a prop update.
    pub fn enqueue_update_props(&self, tag: Tag, props: PropMap) {
        self.batched.lock().push(MountOp::UpdateProps { tag, props });
    }

    /// Queues a frame assignment for `tag` under its native parent.
    pub fn enqueue_update_layout(&self, parent: Tag, tag: Tag, frame: PixelRect) {
        self.batched
            .lock()
            .push(MountOp::UpdateLayout { parent, tag, frame });
    }

    /// Queues the initial child attachment of a fresh container.
    pub fn enqueue_set_children(&self, tag: Tag, children: Vec<Tag>) {
        self.batched
            .lock()
            .push(MountOp::SetChildren { tag, children });
    }

    /// Queues child list surgery on one container.
    pub fn enqueue_manage_children(
        &self,
        tag: Tag,
        remove_indices: Vec<usize>,
        add: Vec<ViewAtIndex>,
        delete_tags: Vec<Tag>,
    ) {
        self.batched.lock().push(MountOp::ManageChildren {
            tag,
            remove_indices,
            add,
            delete_tags,
        });
    }

    /// Queues the teardown of a root view.
    pub fn enqueue_remove_root_view(&self, tag: Tag) {
        self.batched.lock().push(MountOp::RemoveRootView { tag });
    }

    /// Queues a measurement relative to the view's root.
    pub fn enqueue_measure(&self, tag: Tag, reply: MeasureReply) {
        self.batched.lock().push(MountOp::Measure { tag, reply });
    }

    /// Queues a measurement in window coordinates.
    pub fn enqueue_measure_in_window(&self, tag: Tag, reply: MeasureReply) {
        self.batched
            .lock()
            .push(MountOp::MeasureInWindow { tag, reply });
    }

    /// Queues a touch responder grant.
    pub fn enqueue_set_js_responder(&self, tag: Tag, initial_tag: Tag, block_native: bool) {
        self.batched.lock().push(MountOp::SetJsResponder {
            tag,
            initial_tag,
            block_native,
        });
    }

    /// Queues a touch responder release.
    pub fn enqueue_clear_js_responder(&self) {
        self.batched.lock().push(MountOp::ClearJsResponder);
    }

    /// Queues an accessibility event for a view.
    pub fn enqueue_send_accessibility_event(&self, tag: Tag, event: i32) {
        self.batched
            .lock()
            .push(MountOp::SendAccessibilityEvent { tag, event });
    }

    /// Queues a view command on the command lane.
    pub fn enqueue_command(&self, tag: Tag, command: impl Into<String>, args: Value) {
        self.commands.lock().push(ViewCommand {
            tag,
            command: command.into(),
            args,
            retried: false,
        });
    }

    /// Appends an embedder block to the batched lane.
    pub fn add_ui_block(&self, block: UiBlockFn) {
        self.batched.lock().push(MountOp::UiBlock { block });
    }

    /// Inserts an embedder block ahead of everything batched so far.
    pub fn prepend_ui_block(&self, block: UiBlockFn) {
        self.batched.lock().insert(0, MountOp::UiBlock { block });
    }

    // -- Sealing and flushing --

    /// Whether the batched and command lanes are both empty.
    ///
    /// Pending creations do not count; they have no ordering dependency and
    /// ride whichever batch seals next.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batched.lock().is_empty() && self.commands.lock().is_empty()
    }

    /// Whether sealed batches are waiting for a flush.
    #[must_use]
    pub fn has_sealed_batches(&self) -> bool {
        !self.sealed.lock().is_empty()
    }

    /// Swaps all three live lanes out and appends them as one sealed batch.
    ///
    /// Creations still pending at seal time are snapshotted into the batch,
    /// so a creation enqueued after a later seal can never apply before the
    /// batched operations of an earlier one.
    pub fn seal_batch(&self, batch: BatchId, tracer: &mut Tracer<'_>) {
        let commands = mem::take(&mut *self.commands.lock());
        let non_batched: Vec<MountOp> = self.non_batched.lock().drain(..).collect();
        let batched = mem::take(&mut *self.batched.lock());

        let batched_ops = count(batched.len() + commands.len());
        let non_batched_ops = count(non_batched.len());
        let depth = {
            let mut sealed = self.sealed.lock();
            sealed.push_back(SealedBatch {
                batch,
                commands,
                non_batched,
                batched,
            });
            sealed.len()
        };
        tracer.batch_seal(&BatchSealEvent {
            batch: batch.0,
            batched_ops,
            non_batched_ops,
            queue_depth: count(depth),
        });
    }

    /// Applies every sealed batch, in seal order, to the mounted hierarchy.
    ///
    /// Within a batch: commands first, then snapshotted creations, then the
    /// batched lane. A failed operation is logged and skipped. A command
    /// failure re-queues the command once; the retry rides the next batch.
    pub fn flush(&self, mount: &mut MountManager, tracer: &mut Tracer<'_>) {
        let batches: Vec<SealedBatch> = self.sealed.lock().drain(..).collect();
        if batches.is_empty() {
            return;
        }
        let total: usize = batches.iter().map(SealedBatch::len).sum();
        tracer.flush_begin(&FlushBeginEvent {
            batches: count(batches.len()),
            ops: count(total),
        });

        let start = Instant::now();
        let mut applied = 0_u32;
        let mut failed = 0_u32;
        for sealed in batches {
            let SealedBatch {
                batch,
                commands,
                non_batched,
                batched,
            } = sealed;
            self.run_commands(commands, Some(batch), mount, tracer, &mut applied, &mut failed);
            for op in non_batched.into_iter().chain(batched) {
                if self.apply_op(op, Some(batch), mount, tracer) {
                    applied += 1;
                } else {
                    failed += 1;
                }
            }
        }
        tracer.flush_end(&FlushEndEvent {
            applied,
            failed,
            duration_ns: nanos_since(start),
        });
    }

    /// Runs pending creations from the live non-batched lane until `deadline`
    /// passes or the lane is empty.
    ///
    /// Only creations enqueued since the last seal live here; they belong to
    /// a batch that has not sealed yet and are safe to mount early.
    pub fn drain_non_batched_until(
        &self,
        mount: &mut MountManager,
        deadline: Instant,
        tracer: &mut Tracer<'_>,
    ) {
        let mut executed = 0_u32;
        loop {
            if Instant::now() >= deadline {
                break;
            }
            let Some(op) = self.non_batched.lock().pop_front() else {
                break;
            };
            _ = self.apply_op(op, None, mount, tracer);
            executed += 1;
        }
        let remaining = count(self.non_batched.lock().len());
        tracer.non_batched_drain(&NonBatchedDrainEvent { executed, remaining });
    }

    // -- Pause state --

    /// Parks frame-driven dispatch while the host is in the background.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Re-enables frame-driven dispatch.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Whether frame-driven dispatch is parked.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    // -- Application --

    fn run_commands(
        &self,
        commands: Vec<ViewCommand>,
        batch: Option<BatchId>,
        mount: &mut MountManager,
        tracer: &mut Tracer<'_>,
        applied: &mut u32,
        failed: &mut u32,
    ) {
        for mut command in commands {
            #[cfg(feature = "trace-rich")]
            tracer.op_apply(&OpApplyEvent {
                batch: batch.map(|b| b.0),
                kind: OpKind::Command,
                tag: command.tag.raw(),
            });
            #[cfg(not(feature = "trace-rich"))]
            {
                _ = batch;
                _ = &mut *tracer;
            }
            match mount.dispatch_command(command.tag, &command.command, &command.args) {
                Ok(()) => *applied += 1,
                Err(_) if !command.retried => {
                    command.retried = true;
                    self.commands.lock().push(command);
                }
                Err(err) => {
                    log::warn!(
                        "dropping command {:?} for view {:?} after retry: {err}",
                        command.command,
                        command.tag,
                    );
                    *failed += 1;
                }
            }
        }
    }

    /// Applies one operation; returns whether it applied cleanly.
    fn apply_op(
        &self,
        op: MountOp,
        batch: Option<BatchId>,
        mount: &mut MountManager,
        tracer: &mut Tracer<'_>,
    ) -> bool {
        #[cfg(feature = "trace-rich")]
        tracer.op_apply(&OpApplyEvent {
            batch: batch.map(|b| b.0),
            kind: op.trace_kind(),
            tag: op.primary_tag().raw(),
        });
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = batch;
            _ = &mut *tracer;
        }
        let label = op.label();
        let target = op.primary_tag();
        let result = match op {
            MountOp::CreateView {
                tag,
                kind,
                initial_props,
            } => mount.create_view(tag, kind, &initial_props),
            MountOp::UpdateProps { tag, props } => mount.update_props(tag, &props),
            MountOp::UpdateLayout { parent, tag, frame } => mount.update_layout(parent, tag, frame),
            MountOp::SetChildren { tag, children } => mount.set_children(tag, &children),
            MountOp::ManageChildren {
                tag,
                remove_indices,
                add,
                delete_tags,
            } => mount.manage_children(tag, &remove_indices, &add, &delete_tags),
            MountOp::RemoveRootView { tag } => mount.remove_root_view(tag),
            MountOp::Measure { tag, reply } => {
                reply(mount.measure(tag));
                Ok(())
            }
            MountOp::MeasureInWindow { tag, reply } => {
                reply(mount.measure_in_window(tag));
                Ok(())
            }
            MountOp::SetJsResponder {
                tag,
                initial_tag,
                block_native,
            } => mount.set_js_responder(tag, initial_tag, block_native),
            MountOp::ClearJsResponder => {
                mount.clear_js_responder();
                Ok(())
            }
            MountOp::SendAccessibilityEvent { tag, event } => {
                mount.send_accessibility_event(tag, event)
            }
            MountOp::UiBlock { block } => {
                block(mount);
                Ok(())
            }
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                log::error!("skipping {label} for view {target:?}: {err}");
                false
            }
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn nanos_since(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::RefCell;
    use std::sync::Arc;
    use std::sync::mpsc;

    use serde_json::json;

    use super::*;
    use crate::host::{HostContainer, HostView, ViewCaps, ViewRegistry};

    const ROOT: Tag = Tag(1);

    thread_local! {
        static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record(call: String) {
        CALLS.with(|calls| calls.borrow_mut().push(call));
    }

    fn take_calls() -> Vec<String> {
        CALLS.with(|calls| calls.borrow_mut().drain(..).collect())
    }

    struct Probe {
        tag: Tag,
        frame: PixelRect,
        window: (i32, i32),
        children: Vec<Tag>,
    }

    impl Probe {
        fn boxed(tag: Tag) -> Box<dyn HostView> {
            Box::new(Self {
                tag,
                frame: PixelRect::ZERO,
                window: (0, 0),
                children: Vec::new(),
            })
        }
    }

    impl HostView for Probe {
        fn set_frame(&mut self, frame: PixelRect) {
            self.frame = frame;
            record(format!("frame {} {frame:?}", self.tag));
        }

        fn frame(&self) -> PixelRect {
            self.frame
        }

        fn as_container(&mut self) -> Option<&mut dyn HostContainer> {
            Some(self)
        }

        fn as_any(&mut self) -> &mut dyn Any {
            self
        }

        fn window_origin(&self) -> (i32, i32) {
            self.window
        }
    }

    impl HostContainer for Probe {
        fn child_count(&self) -> usize {
            self.children.len()
        }

        fn child_tag_at(&self, index: usize) -> Option<Tag> {
            self.children.get(index).copied()
        }

        fn add_child_at(&mut self, index: usize, child_tag: Tag, _child: &mut dyn HostView) {
            self.children.insert(index, child_tag);
            record(format!("add {child_tag} -> {} at {index}", self.tag));
        }

        fn remove_child_at(&mut self, index: usize) {
            let removed = self.children.remove(index);
            record(format!("remove {removed} from {}", self.tag));
        }

        fn remove_all_children(&mut self) {
            self.children.clear();
        }
    }

    fn new_probe(tag: Tag) -> Box<dyn HostView> {
        record(format!("create {tag}"));
        Probe::boxed(tag)
    }

    fn set_shade(_view: &mut dyn HostView, value: &Value) {
        record(format!("shade {value}"));
    }

    fn run_probe_command(_view: &mut dyn HostView, command: &str, args: &Value) {
        record(format!("command {command} {args}"));
    }

    static VIEW: ViewKind = ViewKind {
        name: "View",
        caps: ViewCaps::CONTAINER,
        create: new_probe,
        setters: &[("shade", set_shade)],
        command: Some(run_probe_command),
        measure: None,
    };

    fn mount() -> MountManager {
        let registry = Arc::new(ViewRegistry::new([&VIEW], "View"));
        let mut mount = MountManager::new(registry);
        mount
            .add_root_view(ROOT, Probe::boxed(ROOT))
            .expect("fresh root");
        _ = take_calls();
        mount
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn creations_apply_before_batched_ops_of_their_batch() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_set_children(ROOT, vec![Tag(2)]);
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(take_calls(), ["create 2", "add 2 -> 1 at 0"]);
    }

    #[test]
    fn batches_flush_in_seal_order() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.enqueue_set_children(ROOT, vec![Tag(2)]);
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.enqueue_create_view(Tag(3), &VIEW, PropMap::default());
        queue.seal_batch(BatchId(2), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(take_calls(), ["create 2", "add 2 -> 1 at 0", "create 3"]);
    }

    #[test]
    fn early_drain_mounts_pending_creations_once() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.enqueue_create_view(Tag(3), &VIEW, PropMap::default());
        queue.drain_non_batched_until(&mut mount, far_deadline(), &mut Tracer::none());
        assert_eq!(take_calls(), ["create 2", "create 3"]);

        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(take_calls(), Vec::<String>::new(), "drained creations must not re-run");
    }

    #[test]
    fn expired_deadline_drains_nothing() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.drain_non_batched_until(&mut mount, Instant::now(), &mut Tracer::none());
        assert_eq!(take_calls(), Vec::<String>::new());

        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(take_calls(), ["create 2"], "the creation rides the seal instead");
    }

    #[test]
    fn commands_run_before_the_rest_of_their_batch() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.enqueue_set_children(ROOT, vec![Tag(2)]);
        queue.enqueue_command(ROOT, "blink", json!([]));
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(
            take_calls(),
            ["command blink []", "create 2", "add 2 -> 1 at 0"],
        );
    }

    #[test]
    fn a_failed_command_retries_on_the_next_flush() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_command(Tag(2), "focus", json!([]));
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(take_calls(), Vec::<String>::new());
        assert!(!queue.is_empty(), "the retry waits on the command lane");

        // The target view mounts through the frame drain, the way late
        // commands catch up with in-flight creations.
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.drain_non_batched_until(&mut mount, far_deadline(), &mut Tracer::none());
        queue.seal_batch(BatchId(2), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(take_calls(), ["create 2", "command focus []"]);
    }

    #[test]
    fn a_command_is_dropped_after_its_retry_fails() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_command(Tag(9), "focus", json!([]));
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        queue.seal_batch(BatchId(2), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert!(queue.is_empty());
        assert_eq!(take_calls(), Vec::<String>::new());
    }

    #[test]
    fn a_failed_op_does_not_stop_its_batch() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_set_children(Tag(42), vec![Tag(43)]);
        queue.add_ui_block(Box::new(|_| record("block".to_owned())));
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(take_calls(), ["block"]);
    }

    #[test]
    fn prepended_blocks_run_ahead_of_earlier_ops() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.enqueue_set_children(ROOT, vec![Tag(2)]);
        queue.add_ui_block(Box::new(|_| record("tail".to_owned())));
        queue.prepend_ui_block(Box::new(|_| record("head".to_owned())));
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(
            take_calls(),
            ["create 2", "head", "add 2 -> 1 at 0", "tail"],
        );
    }

    #[test]
    fn measure_replies_none_for_unknown_views() {
        let queue = OpQueue::default();
        let mut mount = mount();
        let (tx, rx) = mpsc::channel();
        queue.enqueue_measure(Tag(99), Box::new(move |frame| tx.send(frame).unwrap()));
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[test]
    fn measure_replies_with_root_relative_frames() {
        let queue = OpQueue::default();
        let mut mount = mount();
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.enqueue_set_children(ROOT, vec![Tag(2)]);
        queue.enqueue_update_layout(ROOT, Tag(2), PixelRect::new(10, 20, 30, 40));
        let (tx, rx) = mpsc::channel();
        queue.enqueue_measure(Tag(2), Box::new(move |frame| tx.send(frame).unwrap()));
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        queue.flush(&mut mount, &mut Tracer::none());
        assert_eq!(rx.try_recv().unwrap(), Some(PixelRect::new(10, 20, 30, 40)));
    }

    #[test]
    fn is_empty_ignores_pending_creations() {
        let queue = OpQueue::default();
        assert!(queue.is_empty());
        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        assert!(queue.is_empty());
        queue.enqueue_update_props(Tag(2), PropMap::default());
        assert!(!queue.is_empty());
        queue.seal_batch(BatchId(1), &mut Tracer::none());
        assert!(queue.is_empty());
        assert!(queue.has_sealed_batches());
    }

    #[test]
    fn pause_state_round_trips() {
        let queue = OpQueue::default();
        assert!(!queue.is_paused());
        queue.pause();
        assert!(queue.is_paused());
        queue.resume();
        assert!(!queue.is_paused());
    }

    #[test]
    fn queue_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OpQueue>();
    }

    #[cfg(feature = "trace")]
    #[test]
    fn seal_and_flush_emit_batch_events() {
        use crate::trace::TraceSink;

        #[derive(Default)]
        struct Recorder {
            seals: Vec<(u64, u32, u32, u32)>,
            flushes: Vec<(u32, u32)>,
            outcomes: Vec<(u32, u32)>,
        }
        impl TraceSink for Recorder {
            fn on_batch_seal(&mut self, e: &BatchSealEvent) {
                self.seals
                    .push((e.batch, e.batched_ops, e.non_batched_ops, e.queue_depth));
            }
            fn on_flush_begin(&mut self, e: &FlushBeginEvent) {
                self.flushes.push((e.batches, e.ops));
            }
            fn on_flush_end(&mut self, e: &FlushEndEvent) {
                self.outcomes.push((e.applied, e.failed));
            }
        }

        let queue = OpQueue::default();
        let mut mount = mount();
        let mut recorder = Recorder::default();

        queue.enqueue_create_view(Tag(2), &VIEW, PropMap::default());
        queue.enqueue_set_children(ROOT, vec![Tag(2)]);
        queue.enqueue_update_props(Tag(7), PropMap::default());
        {
            let mut tracer = Tracer::new(&mut recorder);
            queue.seal_batch(BatchId(5), &mut tracer);
            queue.flush(&mut mount, &mut tracer);
        }

        assert_eq!(recorder.seals, [(5, 2, 1, 1)]);
        assert_eq!(recorder.flushes, [(1, 3)]);
        assert_eq!(recorder.outcomes, [(2, 1)], "the orphan prop update fails");
    }
}
