// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collapses layout-only containers out of the mounted hierarchy.
//!
//! Scripts lean on plain containers for flexbox structure. Most of those
//! containers draw nothing and handle nothing; mounting a host view for each
//! would triple the depth of the platform view tree for no visible result.
//! [`HierarchyOptimizer`] sits between the shadow tree and the operation
//! queue and rewrites topology operations so that such nodes are *collapsed*:
//! they keep their shadow node (the layout engine still needs it) but no host
//! view is created, and their materialized descendants are spliced into the
//! nearest materialized ancestor at the right offsets.
//!
//! Collapsing is one-way. A collapsed node that later receives a prop a host
//! view must render is *promoted*: detached, materialized, and re-assembled
//! in place. Nothing is ever collapsed after the fact; the savings are not
//! worth re-running the analysis on every update.
//!
//! Frames follow the same rewrite. A materialized node whose shadow parent
//! chain passes through collapsed nodes is positioned relative to its native
//! host, so the collapsed ancestors' offsets are folded into the frame
//! before it is queued.

use hashbrown::HashSet;

use crate::host::PixelRect;
use crate::ops::{OpQueue, ViewAtIndex};
use crate::props::PropMap;
use crate::shadow::{NativeKind, ShadowNode, ShadowTree};
use crate::tag::Tag;
use crate::trace::Tracer;

/// Rewrites shadow-tree operations into mounted-hierarchy operations.
///
/// One instance per shadow tree, driven by the reconciler. The `visited` set
/// dedupes frame ops within a batch and is cleared when the batch completes.
#[derive(Debug, Default)]
pub struct HierarchyOptimizer {
    visited: HashSet<Tag>,
}

impl HierarchyOptimizer {
    /// Creates an optimizer with no per-batch state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a freshly created node materializes.
    ///
    /// An instance of the registry's generic container whose props are all
    /// layout-only is collapsed; no create operation is queued for it.
    /// Virtual kinds never materialize. Everything else queues a create.
    pub fn handle_create_view(&mut self, tree: &mut ShadowTree, queue: &OpQueue, tag: Tag) {
        let node = tree.expect(tag);
        if node.is_virtual() {
            return;
        }
        let collapsible = tree.registry().is_generic_container(node.kind().name)
            && node.props().is_layout_only()
            && !tree.is_root(tag);
        if collapsible {
            tree.set_layout_only(tag, true);
        } else {
            let node = tree.expect(tag);
            queue.enqueue_create_view(tag, node.kind(), node.props().clone());
        }
    }

    /// Routes a prop diff, promoting the node first if the diff disqualifies
    /// it from staying collapsed.
    ///
    /// The shadow tree has already merged `diff` into the node's props.
    pub fn handle_update_view(
        &mut self,
        tree: &mut ShadowTree,
        queue: &OpQueue,
        tag: Tag,
        diff: &PropMap,
        tracer: &mut Tracer<'_>,
    ) {
        let node = tree.expect(tag);
        if node.is_layout_only() {
            if !node.props().is_layout_only() {
                self.promote(tree, queue, tag, tracer);
            }
            // Still collapsed: the diff was layout-only and the layout
            // engine already has it.
        } else if !node.is_virtual() {
            queue.enqueue_update_props(tag, diff.clone());
        }
    }

    /// Splices `child` (just attached to `parent` in the shadow tree) into
    /// the mounted hierarchy.
    ///
    /// Walks up from `parent` to the nearest node that hosts native
    /// children, summing pass-through offsets on the way. If the walk runs
    /// out of ancestors the subtree is detached; it will be spliced when its
    /// top attaches.
    pub fn handle_add_view(&mut self, tree: &mut ShadowTree, queue: &OpQueue, parent: Tag, child: Tag) {
        if tree.expect(child).is_virtual() {
            return;
        }
        let mut index = tree.native_offset_for_child(parent, child);
        let mut host = parent;
        loop {
            let host_node = tree.expect(host);
            match host_node.native_kind() {
                NativeKind::Parent => break,
                NativeKind::Leaf => {
                    // Hoisted children land right after the leaf's own slot.
                    index += 1;
                }
                NativeKind::None => {}
            }
            let Some(up) = host_node.parent() else {
                return;
            };
            index += tree.native_offset_for_child(up, host);
            host = up;
        }
        self.attach_native(tree, queue, host, child, index);
    }

    /// Pulls `child` (about to be detached from the shadow tree) out of the
    /// mounted hierarchy. With `delete` the detached views are also dropped
    /// on the mount side.
    pub fn handle_remove_view(
        &mut self,
        tree: &mut ShadowTree,
        queue: &OpQueue,
        child: Tag,
        delete: bool,
    ) {
        self.detach_native(tree, queue, child, delete);
    }

    /// Queues the frame for `tag` after its layout changed.
    ///
    /// Collapsed ancestor offsets are folded into the frame so it is
    /// relative to the node's native host. A collapsed node routes the
    /// change to its materialized descendants instead. Deduped per batch.
    pub fn handle_update_layout(&mut self, tree: &ShadowTree, queue: &OpQueue, tag: Tag) {
        if tree.is_root(tag) {
            return;
        }
        let node = tree.expect(tag);
        let frame = node.screen_frame();
        let (mut x, mut y) = (frame.x, frame.y);
        let mut ancestor = node.parent();
        while let Some(current) = ancestor {
            let ancestor_node = tree.expect(current);
            if ancestor_node.native_kind() == NativeKind::Parent {
                break;
            }
            let ancestor_frame = ancestor_node.screen_frame();
            x += ancestor_frame.x;
            y += ancestor_frame.y;
            ancestor = ancestor_node.parent();
        }
        self.apply_layout(tree, queue, tag, x, y);
    }

    /// Forgets per-batch state for a node leaving the tree.
    pub fn handle_remove_node(&mut self, tree: &ShadowTree, tag: Tag) {
        self.visited.remove(&tag);
        for &child in tree.expect(tag).children() {
            self.handle_remove_node(tree, child);
        }
    }

    /// Clears per-batch state once the batch's frames are all queued.
    pub fn on_batch_complete(&mut self) {
        self.visited.clear();
    }

    /// Mounts `child` under `host` starting at native index `index`.
    /// Returns how many native slots the child's subtree consumed.
    fn attach_native(
        &mut self,
        tree: &mut ShadowTree,
        queue: &OpQueue,
        host: Tag,
        child: Tag,
        index: usize,
    ) -> usize {
        let child_node = tree.expect(child);
        match child_node.native_kind() {
            NativeKind::None => {
                if child_node.is_virtual() {
                    return 0;
                }
                // Collapsed: splice the grandchildren in directly.
                let grandchildren = child_node.children().to_vec();
                let mut consumed = 0;
                for grandchild in grandchildren {
                    consumed += self.attach_native(tree, queue, host, grandchild, index + consumed);
                }
                consumed
            }
            NativeKind::Leaf => {
                tree.add_native_child_at(host, child, index);
                queue.enqueue_manage_children(
                    host,
                    Vec::new(),
                    vec![ViewAtIndex::new(child, index)],
                    Vec::new(),
                );
                let mut consumed = 1;
                let hoisted = tree.expect(child).children().to_vec();
                for grandchild in hoisted {
                    consumed += self.attach_native(tree, queue, host, grandchild, index + consumed);
                }
                consumed
            }
            NativeKind::Parent => {
                tree.add_native_child_at(host, child, index);
                queue.enqueue_manage_children(
                    host,
                    Vec::new(),
                    vec![ViewAtIndex::new(child, index)],
                    Vec::new(),
                );
                1
            }
        }
    }

    fn detach_native(&mut self, tree: &mut ShadowTree, queue: &OpQueue, child: Tag, delete: bool) {
        let node = tree.expect(child);
        let kind = node.native_kind();
        if kind != NativeKind::None {
            if let Some(host) = node.native_parent() {
                let index = tree
                    .expect(host)
                    .index_of_native_child(child)
                    .unwrap_or_else(|| {
                        panic!("node {child:?} missing from its native parent {host:?}")
                    });
                let removed = tree.remove_native_child_at(host, index);
                debug_assert_eq!(removed, child, "native child list out of sync");
                queue.enqueue_manage_children(
                    host,
                    vec![index],
                    Vec::new(),
                    if delete { vec![child] } else { Vec::new() },
                );
            }
        }
        if kind != NativeKind::Parent {
            // Collapsed, virtual, and hoisting nodes leave their mounted
            // children with an ancestor; pull those out too.
            let children = tree.expect(child).children().to_vec();
            for grandchild in children {
                self.detach_native(tree, queue, grandchild, delete);
            }
        }
    }

    /// Materializes a collapsed node in place.
    ///
    /// The node's spliced descendants are pulled out of their host, the node
    /// gets its create operation, and node plus descendants are re-attached
    /// under their new coordinates. One-way: promoted nodes never collapse
    /// again.
    fn promote(&mut self, tree: &mut ShadowTree, queue: &OpQueue, tag: Tag, tracer: &mut Tracer<'_>) {
        let Some(parent) = tree.expect(tag).parent() else {
            // Detached: nothing is spliced anywhere yet.
            tree.set_layout_only(tag, false);
            let node = tree.expect(tag);
            queue.enqueue_create_view(tag, node.kind(), node.props().clone());
            return;
        };
        let index = tree
            .expect(parent)
            .index_of(tag)
            .unwrap_or_else(|| panic!("promoting {tag:?}: not a child of its parent {parent:?}"));

        self.detach_native(tree, queue, tag, false);
        let removed = tree
            .remove_child_at(parent, index)
            .unwrap_or_else(|err| panic!("promoting {tag:?}: detach failed: {err}"));
        debug_assert_eq!(removed, tag, "shadow child list out of sync");

        tree.set_layout_only(tag, false);
        let node = tree.expect(tag);
        queue.enqueue_create_view(tag, node.kind(), node.props().clone());

        tree.add_child_at(parent, tag, index)
            .unwrap_or_else(|err| panic!("promoting {tag:?}: reattach failed: {err}"));
        self.handle_add_view(tree, queue, parent, tag);
        let children = tree.expect(tag).children().to_vec();
        for &child in &children {
            self.handle_add_view(tree, queue, tag, child);
        }

        // The whole subtree's host-relative coordinates changed; reissue
        // frames outside the batch's dedupe set.
        self.visited.clear();
        self.handle_update_layout(tree, queue, tag);
        for &child in &children {
            self.handle_update_layout(tree, queue, child);
        }
        self.visited.clear();

        #[cfg(feature = "trace-rich")]
        tracer.promote(&crate::trace::PromoteEvent {
            tag: tag.raw(),
            reattached: u32::try_from(children.len()).unwrap_or(u32::MAX),
        });
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = tracer;
        }
    }

    fn apply_layout(&mut self, tree: &ShadowTree, queue: &OpQueue, tag: Tag, x: i32, y: i32) {
        if !self.visited.insert(tag) {
            return;
        }
        let node = tree.expect(tag);
        let frame = node.screen_frame();
        match node.native_kind() {
            NativeKind::Parent => {
                if let Some(host) = node.native_parent() {
                    queue.enqueue_update_layout(
                        host,
                        tag,
                        PixelRect::new(x, y, frame.width, frame.height),
                    );
                }
            }
            NativeKind::Leaf => {
                if let Some(host) = node.native_parent() {
                    queue.enqueue_update_layout(
                        host,
                        tag,
                        PixelRect::new(x, y, frame.width, frame.height),
                    );
                }
                // Hoisted children share the leaf's host, so they move with
                // it.
                self.route_to_children(tree, queue, node, x, y);
            }
            NativeKind::None => {
                if node.is_virtual() {
                    return;
                }
                self.route_to_children(tree, queue, node, x, y);
            }
        }
    }

    /// Re-issues the frames of a moved node's descendants.
    ///
    /// Only frames the shadow tree has already committed are forwarded. A
    /// child whose engine layout is newer than its committed frame is left
    /// for its own dispatch, which folds the (by then committed) ancestor
    /// offsets back in through [`handle_update_layout`]. Forwarding the
    /// stale frame here would both queue wrong geometry and mark the child
    /// visited, suppressing the correct frame later in the batch.
    ///
    /// [`handle_update_layout`]: Self::handle_update_layout
    fn route_to_children(
        &mut self,
        tree: &ShadowTree,
        queue: &OpQueue,
        node: &ShadowNode,
        x: i32,
        y: i32,
    ) {
        for &child in node.children() {
            if tree.frame_out_of_date(child) {
                continue;
            }
            let child_frame = tree.expect(child).screen_frame();
            self.apply_layout(tree, queue, child, x + child_frame.x, y + child_frame.y);
        }
    }
}
