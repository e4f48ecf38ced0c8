// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree storage, topology surgery, and the per-batch layout pass.

use std::sync::Arc;

use hashbrown::HashMap;
use taffy::style_helpers::length;
use taffy::{AlignSelf, AvailableSpace, NodeId, Size, Style};

use crate::error::TreeError;
use crate::host::{PixelRect, ViewCaps, ViewKind, ViewRegistry};
use crate::layout::{LayoutTree, MeasureCtx, round_to_pixel};
use crate::props::PropMap;
use crate::style::style_from_props;
use crate::tag::Tag;

use super::node::{NativeKind, SeenLayout, ShadowNode};

/// The script-side tree of all shadow nodes across all registered roots.
///
/// Owns the layout engine and keeps the native-child accounting consistent
/// through every attach and detach. Structural misuse by the embedder comes
/// back as [`TreeError`]; violations of internal invariants panic.
#[derive(Debug)]
pub struct ShadowTree {
    nodes: HashMap<Tag, ShadowNode>,
    roots: Vec<Tag>,
    root_sizes: HashMap<Tag, (f32, f32)>,
    layout: LayoutTree,
    registry: Arc<ViewRegistry>,
}

impl ShadowTree {
    /// Creates an empty tree over the given kind registry.
    ///
    /// `layout_pool_capacity` bounds how many freed engine nodes are parked
    /// for reuse instead of deallocated.
    #[must_use]
    pub fn new(registry: Arc<ViewRegistry>, layout_pool_capacity: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            root_sizes: HashMap::new(),
            layout: LayoutTree::new(layout_pool_capacity),
            registry,
        }
    }

    /// The kind registry this tree resolves view types against.
    #[must_use]
    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    // -- Roots --

    /// Registers `tag` as a root. Roots are generic containers that can
    /// never collapse.
    pub fn register_root(&mut self, tag: Tag) -> Result<(), TreeError> {
        if self.nodes.contains_key(&tag) {
            return Err(TreeError::TagInUse(tag));
        }
        let kind = self.registry.generic_kind();
        let props = PropMap::new();
        let layout_node = self.layout.acquire(style_from_props(&props), None);
        self.nodes
            .insert(tag, ShadowNode::new(tag, kind, tag, props, Some(layout_node)));
        self.roots.push(tag);
        Ok(())
    }

    /// Unregisters a root and disposes its entire subtree.
    pub fn unregister_root(&mut self, tag: Tag) -> Result<(), TreeError> {
        if !self.is_root(tag) {
            return Err(TreeError::UnknownRoot(tag));
        }
        self.roots.retain(|&root| root != tag);
        self.root_sizes.remove(&tag);
        self.remove_subtree(tag);
        Ok(())
    }

    /// Whether `tag` is a registered root.
    #[must_use]
    pub fn is_root(&self, tag: Tag) -> bool {
        self.roots.contains(&tag)
    }

    /// The registered roots, in registration order.
    #[must_use]
    pub fn roots(&self) -> &[Tag] {
        &self.roots
    }

    /// Sets the fixed size a root lays out against.
    ///
    /// Unknown roots are logged and ignored; a stale resize racing a dropped
    /// surface is expected, not an error.
    pub fn set_root_size(&mut self, tag: Tag, width: f32, height: f32) {
        if !self.is_root(tag) {
            log::warn!("trying to resize unregistered root {tag:?}");
            return;
        }
        let Self { nodes, layout, .. } = self;
        let node = nodes
            .get_mut(&tag)
            .unwrap_or_else(|| panic!("no shadow node for {tag:?}"));
        let mut style = style_from_props(&node.props);
        style.size = Size {
            width: length(width),
            height: length(height),
        };
        let layout_node = node
            .layout_node
            .unwrap_or_else(|| panic!("root {tag:?} has no layout node"));
        layout.set_style(layout_node, style);
        self.root_sizes.insert(tag, (width, height));
    }

    /// Whether the root has been given a size yet. Roots without a size are
    /// skipped by the layout pass.
    #[must_use]
    pub fn root_has_size(&self, tag: Tag) -> bool {
        self.root_sizes.contains_key(&tag)
    }

    // -- Node lifecycle --

    /// Creates a detached node of the named kind under `root_tag`.
    ///
    /// Returns the resolved kind so callers can branch on its capabilities
    /// without a second lookup.
    pub fn create_node(
        &mut self,
        tag: Tag,
        class_name: &str,
        root_tag: Tag,
        props: PropMap,
    ) -> Result<&'static ViewKind, TreeError> {
        if self.nodes.contains_key(&tag) {
            return Err(TreeError::TagInUse(tag));
        }
        let kind = self.registry.resolve(class_name)?;
        if !self.is_root(root_tag) {
            return Err(TreeError::UnknownRoot(root_tag));
        }
        let layout_node = if kind.caps.contains(ViewCaps::VIRTUAL) {
            None
        } else {
            let ctx = kind.measure.map(|measure| MeasureCtx { tag, measure });
            Some(self.layout.acquire(node_style(kind, &props), ctx))
        };
        self.nodes
            .insert(tag, ShadowNode::new(tag, kind, root_tag, props, layout_node));
        Ok(kind)
    }

    /// Whether a live node exists for `tag`.
    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        self.nodes.contains_key(&tag)
    }

    /// Looks up a node, if it exists.
    #[must_use]
    pub fn node(&self, tag: Tag) -> Option<&ShadowNode> {
        self.nodes.get(&tag)
    }

    /// Looks up a node, erroring on unknown tags.
    pub fn get(&self, tag: Tag) -> Result<&ShadowNode, TreeError> {
        self.nodes.get(&tag).ok_or(TreeError::UnknownTag(tag))
    }

    /// All live tags, in no particular order.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of live nodes, roots included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn expect(&self, tag: Tag) -> &ShadowNode {
        self.nodes
            .get(&tag)
            .unwrap_or_else(|| panic!("no shadow node for {tag:?}"))
    }

    pub(crate) fn expect_mut(&mut self, tag: Tag) -> &mut ShadowNode {
        self.nodes
            .get_mut(&tag)
            .unwrap_or_else(|| panic!("no shadow node for {tag:?}"))
    }

    /// Merges a prop diff into the node and refreshes its style.
    ///
    /// Virtual nodes have no engine node of their own, so their dirtiness
    /// propagates to the nearest measured ancestor instead.
    pub(crate) fn update_props(&mut self, tag: Tag, diff: &PropMap) {
        let Self { nodes, layout, .. } = self;
        let node = nodes
            .get_mut(&tag)
            .unwrap_or_else(|| panic!("no shadow node for {tag:?}"));
        node.props.merge_from(diff);
        if let Some(layout_node) = node.layout_node {
            layout.set_style(layout_node, node_style(node.kind, &node.props));
        } else {
            self.propagate_dirty(tag);
        }
        self.mark_updated(tag);
    }

    fn propagate_dirty(&mut self, tag: Tag) {
        let mut current = Some(tag);
        while let Some(tag) = current {
            let node = self.expect(tag);
            if let Some(layout_node) = node.layout_node {
                self.layout.mark_dirty(layout_node);
                break;
            }
            current = node.parent;
        }
    }

    // -- Topology --

    /// Attaches `child` under `parent` at `index` in the script-visible
    /// child list, updating native accounting up the ancestor chain.
    ///
    /// # Panics
    ///
    /// Panics if `child` is virtual and `parent` is neither virtual nor a
    /// measured leaf; a kind registry wired that way is a configuration
    /// bug, not a runtime condition.
    pub fn add_child_at(&mut self, parent: Tag, child: Tag, index: usize) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::UnknownTag(parent));
        }
        let child_node = self.nodes.get(&child).ok_or(TreeError::UnknownTag(child))?;
        if let Some(existing) = child_node.parent {
            return Err(TreeError::AlreadyAttached {
                child,
                parent,
                existing,
            });
        }
        let child_engine = child_node.layout_node;
        let child_name = child_node.kind.name;
        let increase = child_node.native_contribution();

        let parent_node = self.expect(parent);
        if index > parent_node.children.len() {
            return Err(TreeError::ChildIndexOutOfRange {
                parent,
                index,
                len: parent_node.children.len(),
            });
        }
        if let Some(parent_engine) = engine_children_node(parent_node) {
            let Some(child_engine) = child_engine else {
                panic!(
                    "cannot attach a node without a layout node under a parent \
                     without a measure function (adding {child_name:?} under {:?})",
                    parent_node.kind.name
                );
            };
            self.layout.insert_child_at(parent_engine, index, child_engine);
        }

        let parent_node = self.expect_mut(parent);
        parent_node.children.insert(index, child);
        parent_node.total_native_children =
            add_signed(parent_node.total_native_children, increase.cast_signed(), parent);
        self.expect_mut(child).parent = Some(parent);
        self.mark_updated(parent);
        self.bubble_native_count(parent, increase.cast_signed());
        Ok(())
    }

    /// Detaches and returns the child at `index`, updating native accounting
    /// up the ancestor chain.
    pub fn remove_child_at(&mut self, parent: Tag, index: usize) -> Result<Tag, TreeError> {
        let parent_node = self.nodes.get(&parent).ok_or(TreeError::UnknownTag(parent))?;
        if index >= parent_node.children.len() {
            return Err(TreeError::ChildIndexOutOfRange {
                parent,
                index,
                len: parent_node.children.len(),
            });
        }
        let child = parent_node.children[index];
        if let Some(parent_engine) = engine_children_node(parent_node) {
            self.layout.remove_child_at(parent_engine, index);
        }

        let decrease = self.expect(child).native_contribution();
        let parent_node = self.expect_mut(parent);
        parent_node.children.remove(index);
        parent_node.total_native_children = add_signed(
            parent_node.total_native_children,
            -decrease.cast_signed(),
            parent,
        );
        self.expect_mut(child).parent = None;
        self.mark_updated(parent);
        self.bubble_native_count(parent, -decrease.cast_signed());
        Ok(child)
    }

    /// The child tag at `index`.
    ///
    /// # Panics
    ///
    /// Panics when out of range; callers validate indices at the interface
    /// boundary.
    #[must_use]
    pub(crate) fn child_at(&self, parent: Tag, index: usize) -> Tag {
        let node = self.expect(parent);
        *node
            .children
            .get(index)
            .unwrap_or_else(|| panic!("child index {index} out of bounds for {parent:?}"))
    }

    /// Applies a native-count delta along the ancestor chain, stopping after
    /// the first ancestor that hosts its own native children.
    fn bubble_native_count(&mut self, from: Tag, delta: isize) {
        if self.expect(from).native_kind() == NativeKind::Parent {
            return;
        }
        let mut current = self.expect(from).parent;
        while let Some(tag) = current {
            let node = self.expect_mut(tag);
            node.total_native_children =
                add_signed(node.total_native_children, delta, tag);
            if node.native_kind() == NativeKind::Parent {
                break;
            }
            current = node.parent;
        }
    }

    // -- Native topology --

    /// Records that `child`'s host view sits at `index` inside `parent`'s
    /// host view.
    pub(crate) fn add_native_child_at(&mut self, parent: Tag, child: Tag, index: usize) {
        assert_eq!(
            self.expect(parent).native_kind(),
            NativeKind::Parent,
            "native children can only attach under a native parent"
        );
        assert_ne!(
            self.expect(child).native_kind(),
            NativeKind::None,
            "a node without a host view cannot be a native child"
        );
        self.expect_mut(parent).native_children.insert(index, child);
        self.expect_mut(child).native_parent = Some(parent);
    }

    /// Forgets the native child at `index` and returns it.
    pub(crate) fn remove_native_child_at(&mut self, parent: Tag, index: usize) -> Tag {
        let child = self.expect_mut(parent).native_children.remove(index);
        self.expect_mut(child).native_parent = None;
        child
    }

    /// Clears all native parent/child pointers below `tag`.
    ///
    /// Deliberately leaves `total_native_children` alone: the totals describe
    /// what the subtree *would* contribute, and survive re-attachment.
    pub(crate) fn remove_all_native_children(&mut self, tag: Tag) {
        let children = std::mem::take(&mut self.expect_mut(tag).native_children);
        for &child in children.iter().rev() {
            self.expect_mut(child).native_parent = None;
        }
    }

    /// Number of host views contributed by the children preceding `child`.
    ///
    /// This is the native insertion index for `child`'s subtree inside the
    /// nearest native parent, before `child`'s own offset is added.
    ///
    /// # Panics
    ///
    /// Panics if `child` is not a child of `parent`.
    #[must_use]
    pub(crate) fn native_offset_for_child(&self, parent: Tag, child: Tag) -> usize {
        let parent_node = self.expect(parent);
        let mut offset = 0;
        for &current in &parent_node.children {
            if current == child {
                return offset;
            }
            offset += self.expect(current).native_contribution();
        }
        panic!("child {child:?} was not a child of {parent:?}");
    }

    /// Flips the collapse flag.
    ///
    /// # Panics
    ///
    /// Panics unless the node is fully detached; flipping the flag changes
    /// the node's native contribution, which must never happen while any
    /// accounting references it.
    pub(crate) fn set_layout_only(&mut self, tag: Tag, layout_only: bool) {
        let node = self.expect_mut(tag);
        assert!(
            node.parent.is_none(),
            "must detach from the parent before changing collapse state"
        );
        assert!(
            node.native_parent.is_none(),
            "must detach from the native parent before changing collapse state"
        );
        assert!(
            node.native_children.is_empty(),
            "must remove native children before changing collapse state"
        );
        node.is_layout_only = layout_only;
    }

    // -- Update tracking --

    /// Marks `tag` and all its ancestors as having unseen updates.
    pub(crate) fn mark_updated(&mut self, tag: Tag) {
        let mut current = Some(tag);
        while let Some(tag) = current {
            let node = self.expect_mut(tag);
            if node.node_updated {
                break;
            }
            node.node_updated = true;
            current = node.parent;
        }
    }

    /// Whether the batch pipeline needs to visit this node: it was mutated,
    /// needs layout, or its engine layout differs from what was last seen.
    #[must_use]
    pub(crate) fn has_updates(&self, tag: Tag) -> bool {
        let node = self.expect(tag);
        if node.node_updated {
            return true;
        }
        match node.layout_node {
            Some(layout_node) => self.layout.dirty(layout_node) || self.has_new_layout(node),
            None => false,
        }
    }

    /// Whether the committed screen frame lags the node's current engine
    /// layout. A lagging frame must not be re-issued; the node's own
    /// dispatch commits and queues the fresh one.
    #[must_use]
    pub(crate) fn frame_out_of_date(&self, tag: Tag) -> bool {
        self.has_new_layout(self.expect(tag))
    }

    fn has_new_layout(&self, node: &ShadowNode) -> bool {
        node.layout_node
            .is_some_and(|layout_node| node.seen_layout != Some(self.current_layout(layout_node)))
    }

    fn current_layout(&self, layout_node: NodeId) -> SeenLayout {
        let layout = self.layout.layout(layout_node);
        SeenLayout {
            x: layout.location.x,
            y: layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
        }
    }

    /// Acknowledges this node's updates. Idempotent.
    pub(crate) fn mark_update_seen(&mut self, tag: Tag) {
        let Self { nodes, layout, .. } = self;
        let node = nodes
            .get_mut(&tag)
            .unwrap_or_else(|| panic!("no shadow node for {tag:?}"));
        node.node_updated = false;
        if let Some(layout_node) = node.layout_node {
            let current = layout.layout(layout_node);
            node.seen_layout = Some(SeenLayout {
                x: current.location.x,
                y: current.location.y,
                width: current.size.width,
                height: current.size.height,
            });
        }
    }

    // -- Layout pass --

    /// Gives measured leaves in updated subtrees a chance to re-measure by
    /// invalidating their cached content size. Children run before parents,
    /// and subtrees without updates are skipped entirely.
    pub(crate) fn run_before_layout(&mut self, tag: Tag) {
        if !self.has_updates(tag) {
            return;
        }
        let children = self.expect(tag).children.clone();
        for &child in &children {
            self.run_before_layout(child);
        }
        let node = self.expect(tag);
        if node.is_measured_leaf() {
            if let Some(layout_node) = node.layout_node {
                self.layout.mark_dirty(layout_node);
            }
        }
    }

    /// Runs the flexbox pass for one root against its registered size.
    ///
    /// # Panics
    ///
    /// Panics if the root has no size; callers gate on
    /// [`root_has_size`](Self::root_has_size).
    pub(crate) fn calculate_root_layout(&mut self, root: Tag) {
        let (width, height) = *self
            .root_sizes
            .get(&root)
            .unwrap_or_else(|| panic!("root {root:?} has no size"));
        let Self { nodes, layout, .. } = self;
        let root_engine = nodes
            .get(&root)
            .unwrap_or_else(|| panic!("no shadow node for {root:?}"))
            .layout_node
            .unwrap_or_else(|| panic!("root {root:?} has no layout node"));
        layout.compute_layout(
            root_engine,
            Size {
                width: AvailableSpace::Definite(width),
                height: AvailableSpace::Definite(height),
            },
            |tag| nodes.get(&tag).map(|node| &node.props),
        );
    }

    /// Engine-relative x position, or zero for nodes outside the engine.
    #[must_use]
    pub(crate) fn layout_x(&self, tag: Tag) -> f32 {
        self.expect(tag)
            .layout_node
            .map_or(0.0, |layout_node| self.layout.layout(layout_node).location.x)
    }

    /// Engine-relative y position, or zero for nodes outside the engine.
    #[must_use]
    pub(crate) fn layout_y(&self, tag: Tag) -> f32 {
        self.expect(tag)
            .layout_node
            .map_or(0.0, |layout_node| self.layout.layout(layout_node).location.y)
    }

    /// Whether committing this node's layout would change its rounded
    /// screen frame. Pure query; [`dispatch_updates`](Self::dispatch_updates)
    /// is the committing twin.
    #[must_use]
    pub(crate) fn dispatch_updates_will_change_layout(
        &self,
        tag: Tag,
        absolute_x: f32,
        absolute_y: f32,
    ) -> bool {
        let node = self.expect(tag);
        if !self.has_new_layout(node) {
            return false;
        }
        let Some(layout_node) = node.layout_node else {
            return false;
        };
        let current = self.current_layout(layout_node);
        let (screen_x, screen_y, screen_width, screen_height) =
            snap_frame(&current, absolute_x, absolute_y);
        screen_x != node.screen_x
            || screen_y != node.screen_y
            || screen_width != node.screen_width
            || screen_height != node.screen_height
    }

    /// Commits this node's engine layout to its rounded screen frame.
    ///
    /// The frame is snapped by rounding the absolute edges, so a view's
    /// rounded width depends on where it sits, and adjacent views keep
    /// shared edges. Returns whether the stored frame changed.
    pub(crate) fn dispatch_updates(&mut self, tag: Tag, absolute_x: f32, absolute_y: f32) -> bool {
        let node = self.expect(tag);
        let Some(layout_node) = node.layout_node else {
            return false;
        };
        if !self.has_new_layout(node) {
            return false;
        }
        let current = self.current_layout(layout_node);
        let (screen_x, screen_y, screen_width, screen_height) =
            snap_frame(&current, absolute_x, absolute_y);

        let node = self.expect_mut(tag);
        let changed = screen_x != node.screen_x
            || screen_y != node.screen_y
            || screen_width != node.screen_width
            || screen_height != node.screen_height;
        node.screen_x = screen_x;
        node.screen_y = screen_y;
        node.screen_width = screen_width;
        node.screen_height = screen_height;
        changed
    }

    // -- Queries --

    /// Whether `ancestor` appears on `tag`'s parent chain. Unknown tags are
    /// simply not descendants.
    #[must_use]
    pub fn is_descendant_of(&self, tag: Tag, ancestor: Tag) -> bool {
        let Some(node) = self.nodes.get(&tag) else {
            return false;
        };
        let mut parent = node.parent;
        while let Some(current) = parent {
            if current == ancestor {
                return true;
            }
            parent = self.nodes.get(&current).and_then(|node| node.parent);
        }
        false
    }

    /// The root a node belongs to, or `None` for unknown tags.
    #[must_use]
    pub fn resolve_root_tag(&self, tag: Tag) -> Option<Tag> {
        if self.is_root(tag) {
            return Some(tag);
        }
        self.nodes.get(&tag).map(|node| node.root_tag)
    }

    /// Measures `tag` relative to `ancestor`: rounded x/y offsets plus the
    /// node's screen size.
    pub fn measure_layout(&self, tag: Tag, ancestor: Tag) -> Result<PixelRect, TreeError> {
        let node = self.get(tag)?;
        let ancestor_node = self.get(ancestor)?;
        if tag != ancestor {
            let mut current = node.parent;
            loop {
                match current {
                    Some(hit) if hit == ancestor => break,
                    Some(hit) => current = self.expect(hit).parent,
                    None => return Err(TreeError::NotAnAncestor { ancestor, tag }),
                }
            }
        }
        self.measure_relative_to_verified_ancestor(node, ancestor_node)
    }

    /// Measures `tag` relative to its direct parent.
    pub fn measure_layout_relative_to_parent(&self, tag: Tag) -> Result<PixelRect, TreeError> {
        let node = self.get(tag)?;
        let parent = node.parent.ok_or(TreeError::Detached(tag))?;
        self.measure_relative_to_verified_ancestor(node, self.expect(parent))
    }

    fn measure_relative_to_verified_ancestor(
        &self,
        node: &ShadowNode,
        ancestor: &ShadowNode,
    ) -> Result<PixelRect, TreeError> {
        let mut offset_x = 0;
        let mut offset_y = 0;
        if node.tag != ancestor.tag && !node.is_virtual() {
            offset_x = round_to_pixel(self.layout_x(node.tag));
            offset_y = round_to_pixel(self.layout_y(node.tag));
            let mut current = node.parent;
            while current != Some(ancestor.tag) {
                let tag = current
                    .unwrap_or_else(|| panic!("verified ancestry walk escaped the tree"));
                self.check_measurable(tag, ancestor.tag)?;
                offset_x += round_to_pixel(self.layout_x(tag));
                offset_y += round_to_pixel(self.layout_y(tag));
                current = self.expect(tag).parent;
            }
            self.check_measurable(ancestor.tag, ancestor.tag)?;
        }
        Ok(PixelRect::new(
            offset_x,
            offset_y,
            node.screen_width,
            node.screen_height,
        ))
    }

    /// Offsets are only trustworthy through nodes whose children the engine
    /// positions. Kinds that lay out their own children break the walk.
    fn check_measurable(&self, tag: Tag, ancestor: Tag) -> Result<(), TreeError> {
        let kind = self.expect(tag).kind;
        if !kind.caps.contains(ViewCaps::CONTAINER) {
            return Err(TreeError::NotAContainer {
                parent: tag,
                kind: kind.name,
            });
        }
        if kind.caps.contains(ViewCaps::CUSTOM_CHILD_LAYOUT) {
            return Err(TreeError::CustomLayoutInPath { ancestor, tag });
        }
        Ok(())
    }

    // -- Disposal --

    /// Disposes `tag` and every descendant, releasing their engine nodes.
    ///
    /// The subtree must already be detached from its parent; batch-level
    /// code removes children before deleting them.
    pub(crate) fn remove_subtree(&mut self, tag: Tag) {
        debug_assert!(
            self.expect(tag).parent.is_none(),
            "removing a subtree that is still attached"
        );
        self.remove_subtree_recursive(tag);
    }

    fn remove_subtree_recursive(&mut self, tag: Tag) {
        self.remove_all_native_children(tag);
        let node = self.expect(tag);
        let parent_engine = engine_children_node(node);
        let children = node.children.clone();
        for (index, &child) in children.iter().enumerate().rev() {
            if let Some(parent_engine) = parent_engine {
                self.layout.remove_child_at(parent_engine, index);
            }
            self.remove_subtree_recursive(child);
        }
        let node = self
            .nodes
            .remove(&tag)
            .unwrap_or_else(|| panic!("no shadow node for {tag:?}"));
        if let Some(layout_node) = node.layout_node {
            self.layout.release(layout_node);
        }
    }
}

/// The engine node under which this node's children are attached, if the
/// engine positions them at all. Measured leaves and virtual nodes keep
/// their children out of the engine.
/// Builds the engine style for a node of the given kind.
///
/// Measured leaves default to shrink-wrapping their content: a stretched
/// cross size would be imposed by the container and the measure function
/// would never decide it. An explicit `alignSelf` prop still wins.
fn node_style(kind: &'static ViewKind, props: &PropMap) -> Style {
    let mut style = style_from_props(props);
    if kind.measure.is_some() && style.align_self.is_none() {
        style.align_self = Some(AlignSelf::FlexStart);
    }
    style
}

fn engine_children_node(node: &ShadowNode) -> Option<NodeId> {
    if node.is_measured_leaf() {
        return None;
    }
    node.layout_node
}

fn add_signed(value: usize, delta: isize, tag: Tag) -> usize {
    value
        .checked_add_signed(delta)
        .unwrap_or_else(|| panic!("native child accounting underflow at {tag:?}"))
}

/// Rounds the absolute edges of a layout rectangle, then expresses the
/// result relative to the parent again. Sizes come from edge differences,
/// so rounding never accumulates across siblings.
fn snap_frame(current: &SeenLayout, absolute_x: f32, absolute_y: f32) -> (i32, i32, i32, i32) {
    let left = round_to_pixel(absolute_x + current.x);
    let top = round_to_pixel(absolute_y + current.y);
    let right = round_to_pixel(absolute_x + current.x + current.width);
    let bottom = round_to_pixel(absolute_y + current.y + current.height);
    (
        round_to_pixel(current.x),
        round_to_pixel(current.y),
        right - left,
        bottom - top,
    )
}
