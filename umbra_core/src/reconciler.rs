// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reconciler: the scripting side's single entry point.
//!
//! [`Reconciler`] owns the shadow tree and the hierarchy optimizer and turns
//! the declarative mutation interface (create, update, manage children) into
//! queued mount operations. It lives on the shadow thread; the only thing
//! that crosses to the UI thread is the [`OpQueue`] it seals batches into.
//!
//! Mutations accumulate until [`on_batch_complete`](Reconciler::on_batch_complete),
//! which runs the flexbox pass for every sized root, commits changed frames
//! top-down (so descendants fold in fresh collapsed-ancestor offsets), seals
//! the batch, and delivers layout events to the registered listener. The
//! mounted hierarchy only ever observes whole batches.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::error::TreeError;
use crate::host::{PixelRect, ViewRegistry};
use crate::ops::{MeasureReply, OpQueue, UiBlockFn, ViewAtIndex};
use crate::optimizer::HierarchyOptimizer;
use crate::props::PropMap;
use crate::shadow::{NativeKind, ShadowTree};
use crate::tag::{BatchId, Tag};
use crate::trace::{LayoutPassEvent, TraceSink, Tracer};

/// Called after a batch for every node that asked for layout events and
/// moved or resized, with its new frame.
pub type LayoutListener = Box<dyn FnMut(Tag, PixelRect) + Send>;

/// Construction parameters for a [`Reconciler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// How many released layout-engine nodes to keep pooled for reuse.
    pub layout_pool_capacity: usize,
}

impl ReconcilerConfig {
    /// The default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            layout_pool_capacity: 1024,
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shadow-thread coordinator for one registry worth of surfaces.
pub struct Reconciler {
    tree: ShadowTree,
    optimizer: HierarchyOptimizer,
    queue: Arc<OpQueue>,
    batch_count: u64,
    in_batch: bool,
    layout_listener: Option<LayoutListener>,
    trace_sink: Option<Box<dyn TraceSink + Send>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("nodes", &self.tree.node_count())
            .field("batch_count", &self.batch_count)
            .field("in_batch", &self.in_batch)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler over a shared registry and operation queue.
    #[must_use]
    pub fn new(registry: Arc<ViewRegistry>, queue: Arc<OpQueue>, config: ReconcilerConfig) -> Self {
        Self {
            tree: ShadowTree::new(registry, config.layout_pool_capacity),
            optimizer: HierarchyOptimizer::new(),
            queue,
            batch_count: 0,
            in_batch: false,
            layout_listener: None,
            trace_sink: None,
        }
    }

    /// Read access to the shadow tree, for inspection and tests.
    #[must_use]
    pub fn tree(&self) -> &ShadowTree {
        &self.tree
    }

    /// The shared operation queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<OpQueue> {
        &self.queue
    }

    /// Batches sealed so far.
    #[must_use]
    pub fn batch_count(&self) -> u64 {
        self.batch_count
    }

    /// Registers the sink receiving pipeline trace events.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink + Send>>) {
        self.trace_sink = sink;
    }

    /// Registers the listener for per-node layout events.
    pub fn set_layout_event_listener(&mut self, listener: Option<LayoutListener>) {
        self.layout_listener = listener;
    }

    // -- Roots --

    /// Registers a root surface with its initial size in layout units.
    ///
    /// The embedder mounts the matching host container on the UI thread
    /// through [`MountManager::add_root_view`](crate::mount::MountManager::add_root_view).
    pub fn register_root(&mut self, tag: Tag, width: f32, height: f32) -> Result<(), TreeError> {
        self.tree.register_root(tag)?;
        self.tree.set_root_size(tag, width, height);
        Ok(())
    }

    /// Unregisters a root and queues the teardown of its mounted subtree.
    pub fn remove_root(&mut self, tag: Tag) -> Result<(), TreeError> {
        self.tree.unregister_root(tag)?;
        self.queue.enqueue_remove_root_view(tag);
        Ok(())
    }

    /// Updates a root's size, e.g. on rotation or window resize.
    ///
    /// Outside a batch this re-lays-out immediately as a mini-batch of its
    /// own; inside one it rides along with the mutations in flight.
    pub fn set_root_size(&mut self, tag: Tag, width: f32, height: f32) {
        if !self.tree.is_root(tag) {
            log::warn!("ignoring size for unknown root {tag:?}");
            return;
        }
        self.tree.set_root_size(tag, width, height);
        self.tree.mark_updated(tag);
        if !self.in_batch {
            self.on_batch_complete();
        }
    }

    // -- Node mutations --

    /// Creates a detached node of the named view type under `root_tag`.
    ///
    /// `props` must be a JSON object (or null for none). Collapse analysis
    /// runs here: a generic container with layout-only props gets no host
    /// view.
    pub fn create_view(
        &mut self,
        tag: Tag,
        class_name: &str,
        root_tag: Tag,
        props: Value,
    ) -> Result<(), TreeError> {
        self.in_batch = true;
        self.tree
            .create_node(tag, class_name, root_tag, PropMap::from_value(props))?;
        self.optimizer
            .handle_create_view(&mut self.tree, &self.queue, tag);
        Ok(())
    }

    /// Merges a prop diff into a node, promoting it out of collapse if the
    /// diff requires a host view.
    pub fn update_view(&mut self, tag: Tag, class_name: &str, props: Value) -> Result<(), TreeError> {
        self.in_batch = true;
        self.tree.get(tag)?;
        self.tree.registry().resolve(class_name)?;
        let diff = PropMap::from_value(props);
        self.tree.update_props(tag, &diff);
        let Self {
            tree,
            optimizer,
            queue,
            trace_sink,
            ..
        } = self;
        optimizer.handle_update_view(tree, queue, tag, &diff, &mut tracer_for(trace_sink));
        Ok(())
    }

    /// Removes, moves, and adds children of one node.
    ///
    /// `move_from`/`move_to` relocate existing children; `add_tags` at
    /// `add_indices` attach detached ones; `remove_indices` detach and
    /// delete. All source indices refer to the child list before any change.
    /// Everything is validated before the first mutation, except that
    /// removals past the end of an *empty* root's child list are tolerated
    /// as a benign teardown race.
    pub fn manage_children(
        &mut self,
        tag: Tag,
        move_from: &[usize],
        move_to: &[usize],
        add_tags: &[Tag],
        add_indices: &[usize],
        remove_indices: &[usize],
    ) -> Result<(), TreeError> {
        self.in_batch = true;
        if move_from.len() != move_to.len() {
            return Err(TreeError::MismatchedArrays {
                left: "moveFrom",
                left_len: move_from.len(),
                right: "moveTo",
                right_len: move_to.len(),
            });
        }
        if add_tags.len() != add_indices.len() {
            return Err(TreeError::MismatchedArrays {
                left: "addChildTags",
                left_len: add_tags.len(),
                right: "addAtIndices",
                right_len: add_indices.len(),
            });
        }
        let child_count = self.tree.get(tag)?.child_count();
        let is_root = self.tree.is_root(tag);
        for &add in add_tags {
            self.tree.get(add)?;
        }

        // Moves detach and come back; removals detach and delete.
        let mut detach: Vec<(usize, bool)> = Vec::with_capacity(move_from.len() + remove_indices.len());
        for &index in move_from {
            if index >= child_count {
                return Err(TreeError::ChildIndexOutOfRange {
                    parent: tag,
                    index,
                    len: child_count,
                });
            }
            detach.push((index, false));
        }
        for &index in remove_indices {
            if index >= child_count {
                if is_root && child_count == 0 {
                    log::debug!("ignoring removal at index {index} on already-empty root {tag:?}");
                    continue;
                }
                return Err(TreeError::ChildIndexOutOfRange {
                    parent: tag,
                    index,
                    len: child_count,
                });
            }
            detach.push((index, true));
        }
        detach.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for pair in detach.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(TreeError::RepeatedRemoveIndex {
                    parent: tag,
                    index: pair[0].0,
                });
            }
        }

        // Capture moved tags before removals shift the indices.
        let mut attach: Vec<ViewAtIndex> = Vec::with_capacity(move_from.len() + add_tags.len());
        for (position, &from) in move_from.iter().enumerate() {
            attach.push(ViewAtIndex::new(self.tree.child_at(tag, from), move_to[position]));
        }
        for (position, &add) in add_tags.iter().enumerate() {
            attach.push(ViewAtIndex::new(add, add_indices[position]));
        }

        for &(index, delete) in &detach {
            let child = self.tree.child_at(tag, index);
            self.optimizer
                .handle_remove_view(&mut self.tree, &self.queue, child, delete);
            let removed = self.tree.remove_child_at(tag, index)?;
            debug_assert_eq!(removed, child, "shadow child list out of sync");
            if delete {
                self.optimizer.handle_remove_node(&self.tree, child);
                self.tree.remove_subtree(child);
            }
        }

        attach.sort_by_key(|entry| entry.index);
        for entry in attach {
            self.tree.add_child_at(tag, entry.tag, entry.index)?;
            self.optimizer
                .handle_add_view(&mut self.tree, &self.queue, tag, entry.tag);
        }
        Ok(())
    }

    /// Attaches the given detached nodes as the initial children of `tag`,
    /// in order.
    pub fn set_children(&mut self, tag: Tag, children: &[Tag]) -> Result<(), TreeError> {
        self.in_batch = true;
        self.tree.get(tag)?;
        for &child in children {
            self.tree.get(child)?;
        }
        for (index, &child) in children.iter().enumerate() {
            self.tree.add_child_at(tag, child, index)?;
            self.optimizer
                .handle_add_view(&mut self.tree, &self.queue, tag, child);
        }
        Ok(())
    }

    /// Swaps a non-root node for a detached replacement at the same
    /// position, deleting the old subtree.
    pub fn replace_existing_non_root_view(
        &mut self,
        old_tag: Tag,
        new_tag: Tag,
    ) -> Result<(), TreeError> {
        if self.tree.is_root(old_tag) {
            return Err(TreeError::RootForbidden(old_tag));
        }
        if self.tree.is_root(new_tag) {
            return Err(TreeError::RootForbidden(new_tag));
        }
        let parent = self
            .tree
            .get(old_tag)?
            .parent()
            .ok_or(TreeError::Detached(old_tag))?;
        let index = self
            .tree
            .get(parent)?
            .index_of(old_tag)
            .unwrap_or_else(|| panic!("parent link of {old_tag:?} out of sync"));
        self.manage_children(parent, &[], &[], &[new_tag], &[index], &[index])
    }

    /// Detaches and deletes every child of `tag`.
    pub fn remove_subviews_from_container(&mut self, tag: Tag) -> Result<(), TreeError> {
        let count = self.tree.get(tag)?.child_count();
        let indices: Vec<usize> = (0..count).collect();
        self.manage_children(tag, &[], &[], &[], &[], &indices)
    }

    // -- Queries --

    /// Queues a measurement of `tag` relative to its root view. The reply
    /// runs on the UI thread when the batch flushes.
    pub fn measure(&mut self, tag: Tag, reply: MeasureReply) {
        self.in_batch = true;
        self.queue.enqueue_measure(tag, reply);
    }

    /// Queues a measurement of `tag` in window coordinates.
    pub fn measure_in_window(&mut self, tag: Tag, reply: MeasureReply) {
        self.in_batch = true;
        self.queue.enqueue_measure_in_window(tag, reply);
    }

    /// Synchronously measures `tag` relative to `ancestor` from the shadow
    /// tree's last committed layout.
    pub fn measure_layout(&self, tag: Tag, ancestor: Tag) -> Result<PixelRect, TreeError> {
        self.tree.measure_layout(tag, ancestor)
    }

    /// Synchronously measures `tag` relative to its parent node.
    pub fn measure_layout_relative_to_parent(&self, tag: Tag) -> Result<PixelRect, TreeError> {
        self.tree.measure_layout_relative_to_parent(tag)
    }

    /// Whether `ancestor` is on `tag`'s parent chain.
    #[must_use]
    pub fn view_is_descendant_of(&self, tag: Tag, ancestor: Tag) -> bool {
        self.tree.is_descendant_of(tag, ancestor)
    }

    /// The root tag of the surface `tag` belongs to, if attached.
    #[must_use]
    pub fn resolve_root_tag(&self, tag: Tag) -> Option<Tag> {
        self.tree.resolve_root_tag(tag)
    }

    // -- Commands and host services --

    /// Queues a view command. Unknown targets fail here, synchronously;
    /// known targets that disappear before the flush get one retry on the
    /// UI thread.
    pub fn dispatch_command(
        &mut self,
        tag: Tag,
        command: impl Into<String>,
        args: Value,
    ) -> Result<(), TreeError> {
        self.in_batch = true;
        self.tree.get(tag)?;
        self.queue.enqueue_command(tag, command, args);
        Ok(())
    }

    /// Queues the touch responder lock for `tag`, resolved through collapsed
    /// nodes to the nearest node with a host view.
    pub fn set_js_responder(&mut self, tag: Tag, block_native: bool) -> Result<(), TreeError> {
        self.in_batch = true;
        let mut resolved = tag;
        loop {
            let node = self.tree.get(resolved)?;
            if node.native_kind() != NativeKind::None {
                break;
            }
            resolved = node.parent().ok_or(TreeError::Detached(tag))?;
        }
        self.queue.enqueue_set_js_responder(resolved, tag, block_native);
        Ok(())
    }

    /// Queues the release of the touch responder lock.
    pub fn clear_js_responder(&mut self) {
        self.in_batch = true;
        self.queue.enqueue_clear_js_responder();
    }

    /// Queues a platform accessibility event for a view.
    pub fn send_accessibility_event(&mut self, tag: Tag, event: i32) -> Result<(), TreeError> {
        self.in_batch = true;
        self.tree.get(tag)?;
        self.queue.enqueue_send_accessibility_event(tag, event);
        Ok(())
    }

    /// Queues an embedder closure in batch position.
    pub fn add_ui_block(&mut self, block: UiBlockFn) {
        self.in_batch = true;
        self.queue.add_ui_block(block);
    }

    /// Queues an embedder closure ahead of the batch's operations.
    pub fn prepend_ui_block(&mut self, block: UiBlockFn) {
        self.in_batch = true;
        self.queue.prepend_ui_block(block);
    }

    /// Parks the flush pipeline while the host is backgrounded.
    pub fn host_pause(&self) {
        self.queue.pause();
    }

    /// Resumes the flush pipeline.
    pub fn host_resume(&self) {
        self.queue.resume();
    }

    // -- Batch boundary --

    /// Closes the current batch: layout, frame dispatch, seal, layout
    /// events.
    pub fn on_batch_complete(&mut self) {
        self.batch_count += 1;
        let batch = BatchId(self.batch_count);
        let roots: Vec<Tag> = self.tree.roots().to_vec();
        let started = Instant::now();
        let mut laid_out = 0_u32;

        for &root in &roots {
            if !self.tree.root_has_size(root) {
                continue;
            }
            self.tree.run_before_layout(root);
            self.tree.calculate_root_layout(root);
            laid_out += 1;
        }

        let mut events: Vec<(Tag, PixelRect)> = Vec::new();
        for &root in &roots {
            if !self.tree.root_has_size(root) {
                continue;
            }
            let Self {
                tree, optimizer, queue, ..
            } = self;
            apply_updates(tree, optimizer, queue, root, 0.0, 0.0, &mut events);
        }
        let duration_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        self.optimizer.on_batch_complete();
        {
            let mut tracer = tracer_for(&mut self.trace_sink);
            tracer.layout_pass(&LayoutPassEvent {
                batch: batch.0,
                roots: laid_out,
                duration_ns,
            });
            self.queue.seal_batch(batch, &mut tracer);
        }
        if let Some(listener) = self.layout_listener.as_mut() {
            for (tag, frame) in events {
                listener(tag, frame);
            }
        }
        self.in_batch = false;
    }
}

fn tracer_for(sink: &mut Option<Box<dyn TraceSink + Send>>) -> Tracer<'_> {
    match sink {
        Some(sink) => Tracer::new(sink.as_mut()),
        None => Tracer::none(),
    }
}

/// Commits changed frames for one updated subtree, parents before children
/// so that collapsed-ancestor offsets read fresh when the optimizer folds
/// them in.
fn apply_updates(
    tree: &mut ShadowTree,
    optimizer: &mut HierarchyOptimizer,
    queue: &OpQueue,
    tag: Tag,
    absolute_x: f32,
    absolute_y: f32,
    events: &mut Vec<(Tag, PixelRect)>,
) {
    if !tree.has_updates(tag) {
        return;
    }
    if tree.is_root(tag) {
        // The root's frame belongs to the embedder; just record it.
        let _ = tree.dispatch_updates(tag, absolute_x, absolute_y);
    } else if tree.dispatch_updates(tag, absolute_x, absolute_y) {
        optimizer.handle_update_layout(tree, queue, tag);
        let node = tree.expect(tag);
        if node.wants_layout_events() {
            events.push((tag, node.screen_frame()));
        }
    }
    let children = tree.expect(tag).children().to_vec();
    let child_x = absolute_x + tree.layout_x(tag);
    let child_y = absolute_y + tree.layout_y(tag);
    for child in children {
        apply_updates(tree, optimizer, queue, child, child_x, child_y, events);
    }
    tree.mark_update_seen(tag);
}
