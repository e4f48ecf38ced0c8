// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node state: identity, topology, props, and layout bookkeeping.

use taffy::NodeId;

use crate::host::{PixelRect, ViewCaps, ViewKind};
use crate::props::PropMap;
use crate::tag::Tag;

/// How a shadow node participates in the mounted hierarchy.
///
/// Derived from the node's kind and its collapse state, never stored:
///
/// - Virtual or collapsed layout-only nodes are [`None`](Self::None); they
///   have no host view and their native children belong to an ancestor.
/// - Kinds with [`ViewCaps::HOISTS_CHILDREN`] are [`Leaf`](Self::Leaf);
///   they get a host view but cannot host children themselves, so their
///   native children are also hoisted to an ancestor.
/// - Everything else is [`Parent`](Self::Parent) and hosts its own native
///   children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeKind {
    /// Gets a host view and hosts its native children.
    Parent,
    /// Gets a host view; native children are hoisted to an ancestor.
    Leaf,
    /// Gets no host view at all.
    None,
}

/// The layout values the batch pipeline saw at the last `mark_update_seen`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SeenLayout {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
}

/// One node of the shadow tree.
///
/// Nodes are owned by the [`ShadowTree`](super::ShadowTree) and addressed by
/// tag. All topology mutation goes through the tree so that native-child
/// accounting stays consistent; the node itself only exposes queries.
#[derive(Debug)]
pub struct ShadowNode {
    pub(crate) tag: Tag,
    pub(crate) kind: &'static ViewKind,
    pub(crate) root_tag: Tag,

    // Script-visible topology.
    pub(crate) parent: Option<Tag>,
    pub(crate) children: Vec<Tag>,

    // Mounted topology, valid only between nodes whose kind materializes.
    pub(crate) native_parent: Option<Tag>,
    pub(crate) native_children: Vec<Tag>,
    /// Number of host views this subtree contributes to the nearest
    /// native-parent ancestor, excluding this node's own view.
    pub(crate) total_native_children: usize,

    pub(crate) is_layout_only: bool,
    pub(crate) node_updated: bool,
    pub(crate) props: PropMap,

    // Layout engine state. `None` for virtual kinds.
    pub(crate) layout_node: Option<NodeId>,
    pub(crate) seen_layout: Option<SeenLayout>,

    // Rounded frame relative to the parent node, written by the dispatch
    // walk.
    pub(crate) screen_x: i32,
    pub(crate) screen_y: i32,
    pub(crate) screen_width: i32,
    pub(crate) screen_height: i32,
}

impl ShadowNode {
    pub(crate) fn new(
        tag: Tag,
        kind: &'static ViewKind,
        root_tag: Tag,
        props: PropMap,
        layout_node: Option<NodeId>,
    ) -> Self {
        Self {
            tag,
            kind,
            root_tag,
            parent: None,
            children: Vec::new(),
            native_parent: None,
            native_children: Vec::new(),
            total_native_children: 0,
            is_layout_only: false,
            // Fresh nodes count as updated so the first batch visits them.
            node_updated: true,
            props,
            layout_node,
            seen_layout: None,
            screen_x: 0,
            screen_y: 0,
            screen_width: 0,
            screen_height: 0,
        }
    }

    /// The embedder-assigned tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The registered kind this node was created as.
    #[must_use]
    pub fn kind(&self) -> &'static ViewKind {
        self.kind
    }

    /// Tag of the root this node lives under.
    #[must_use]
    pub fn root_tag(&self) -> Tag {
        self.root_tag
    }

    /// The script-visible parent, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<Tag> {
        self.parent
    }

    /// The script-visible children, in order.
    #[must_use]
    pub fn children(&self) -> &[Tag] {
        &self.children
    }

    /// The native parent, if this node is mounted under one.
    #[must_use]
    pub fn native_parent(&self) -> Option<Tag> {
        self.native_parent
    }

    /// The native children mounted directly under this node's host view.
    #[must_use]
    pub fn native_children(&self) -> &[Tag] {
        &self.native_children
    }

    /// Host views this subtree contributes to the nearest native parent,
    /// excluding this node's own view.
    #[must_use]
    pub fn total_native_children(&self) -> usize {
        self.total_native_children
    }

    /// Whether the optimizer has collapsed this node away.
    #[must_use]
    pub fn is_layout_only(&self) -> bool {
        self.is_layout_only
    }

    /// The merged props, as of the last update.
    #[must_use]
    pub fn props(&self) -> &PropMap {
        &self.props
    }

    /// Whether this node has mutations the batch pipeline has not seen.
    #[must_use]
    pub fn has_unseen_updates(&self) -> bool {
        self.node_updated
    }

    /// The rounded frame relative to the parent node, as of the last
    /// completed batch.
    #[must_use]
    pub fn screen_frame(&self) -> PixelRect {
        PixelRect::new(
            self.screen_x,
            self.screen_y,
            self.screen_width,
            self.screen_height,
        )
    }

    /// How this node currently participates in the mounted hierarchy.
    #[must_use]
    pub fn native_kind(&self) -> NativeKind {
        if self.kind.caps.contains(ViewCaps::VIRTUAL) || self.is_layout_only {
            NativeKind::None
        } else if self.kind.caps.contains(ViewCaps::HOISTS_CHILDREN) {
            NativeKind::Leaf
        } else {
            NativeKind::Parent
        }
    }

    /// Host views this node adds to its parent's native accounting.
    ///
    /// A native parent contributes exactly its own view; its subtree is
    /// hidden behind it. A hoisting leaf contributes its own view plus all
    /// the hoisted ones. A collapsed or virtual node contributes only what
    /// passes through it.
    #[must_use]
    pub fn native_contribution(&self) -> usize {
        match self.native_kind() {
            NativeKind::Parent => 1,
            NativeKind::Leaf => 1 + self.total_native_children,
            NativeKind::None => self.total_native_children,
        }
    }

    /// Whether this kind never materializes a host view or an engine node.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.kind.caps.contains(ViewCaps::VIRTUAL)
    }

    /// Whether the layout engine treats this node as a self-measuring leaf
    /// and therefore never visits its children.
    pub(crate) fn is_measured_leaf(&self) -> bool {
        self.kind.measure.is_some()
    }

    /// Number of script-visible children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Position of `child` in the script-visible child list.
    #[must_use]
    pub fn index_of(&self, child: Tag) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Position of `child` in the native child list.
    #[must_use]
    pub fn index_of_native_child(&self, child: Tag) -> Option<usize> {
        self.native_children.iter().position(|&c| c == child)
    }

    /// Whether the embedder asked for layout-change notifications.
    #[must_use]
    pub fn wants_layout_events(&self) -> bool {
        self.props.wants_layout_events()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::host::{HostView, MeasureInput, MeasureSize};

    struct Null;

    impl HostView for Null {
        fn set_frame(&mut self, _frame: PixelRect) {}

        fn frame(&self) -> PixelRect {
            PixelRect::ZERO
        }

        fn as_any(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn make_null(_tag: Tag) -> Box<dyn HostView> {
        Box::new(Null)
    }

    fn measure_nothing(_props: &PropMap, _input: &MeasureInput) -> MeasureSize {
        MeasureSize::ZERO
    }

    static PLAIN: ViewKind = ViewKind {
        name: "Plain",
        caps: ViewCaps::CONTAINER,
        create: make_null,
        setters: &[],
        command: None,
        measure: None,
    };

    static HOISTER: ViewKind = ViewKind {
        name: "Hoister",
        caps: ViewCaps::HOISTS_CHILDREN,
        create: make_null,
        setters: &[],
        command: None,
        measure: Some(measure_nothing),
    };

    static SPAN: ViewKind = ViewKind {
        name: "Span",
        caps: ViewCaps::VIRTUAL,
        create: make_null,
        setters: &[],
        command: None,
        measure: None,
    };

    fn node(kind: &'static ViewKind) -> ShadowNode {
        ShadowNode::new(Tag(1), kind, Tag(1), PropMap::new(), None)
    }

    #[test]
    fn native_kind_follows_caps_and_collapse() {
        let mut plain = node(&PLAIN);
        assert_eq!(plain.native_kind(), NativeKind::Parent);
        plain.is_layout_only = true;
        assert_eq!(plain.native_kind(), NativeKind::None);

        assert_eq!(node(&HOISTER).native_kind(), NativeKind::Leaf);
        assert_eq!(node(&SPAN).native_kind(), NativeKind::None);
    }

    #[test]
    fn native_parent_contributes_exactly_one() {
        let mut plain = node(&PLAIN);
        plain.total_native_children = 7;
        assert_eq!(plain.native_contribution(), 1);
    }

    #[test]
    fn collapsed_node_contributes_what_passes_through() {
        let mut plain = node(&PLAIN);
        plain.is_layout_only = true;
        plain.total_native_children = 3;
        assert_eq!(plain.native_contribution(), 3);
    }

    #[test]
    fn hoisting_leaf_contributes_itself_plus_hoisted() {
        let mut leaf = node(&HOISTER);
        leaf.total_native_children = 2;
        assert_eq!(leaf.native_contribution(), 3);
    }

    #[test]
    fn fresh_nodes_count_as_updated() {
        assert!(node(&PLAIN).has_unseen_updates());
    }
}
