// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wrapper around the flexbox engine.
//!
//! Owns the [`TaffyTree`] holding one engine node per non-virtual shadow
//! node, recycles released engine nodes through a bounded free list, and runs
//! the layout pass with measure-function support. Engine rounding is disabled
//! so the tree reports raw floats; screen geometry is rounded once, at
//! dispatch time, with [`round_to_pixel`].

use taffy::{AvailableSpace, Layout, NodeId, Size, Style, TaffyTree, TraversePartialTree as _};

use crate::host::{MeasureFn, MeasureInput, MeasureSize};
use crate::props::PropMap;
use crate::tag::Tag;

/// Per-node context for measured leaves (text-like kinds).
///
/// The measure callback needs the node's props at layout time; the context
/// carries the owning tag so the layout pass can look them up without
/// holding references into the shadow tree.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MeasureCtx {
    pub(crate) tag: Tag,
    pub(crate) measure: MeasureFn,
}

/// The engine-node arena.
///
/// `acquire`/`release` are the only ways nodes enter and leave; released
/// nodes are parked on a free list up to `pool_capacity` and reused by later
/// acquires, so steady-state churn does not grow the underlying slot map.
pub(crate) struct LayoutTree {
    tree: TaffyTree<MeasureCtx>,
    free: Vec<NodeId>,
    pool_capacity: usize,
}

impl std::fmt::Debug for LayoutTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutTree")
            .field("live_nodes", &(self.tree.total_node_count() - self.free.len()))
            .field("parked_nodes", &self.free.len())
            .field("pool_capacity", &self.pool_capacity)
            .finish()
    }
}

impl LayoutTree {
    pub(crate) fn new(pool_capacity: usize) -> Self {
        let mut tree = TaffyTree::new();
        tree.disable_rounding();
        Self {
            tree,
            free: Vec::new(),
            pool_capacity,
        }
    }

    /// Takes an engine node out of the pool, or grows the tree by one.
    pub(crate) fn acquire(&mut self, style: Style, ctx: Option<MeasureCtx>) -> NodeId {
        if let Some(node) = self.free.pop() {
            self.tree
                .set_node_context(node, ctx)
                .unwrap_or_else(|err| panic!("failed to reset recycled layout node: {err}"));
            self.tree
                .set_style(node, style)
                .unwrap_or_else(|err| panic!("failed to restyle recycled layout node: {err}"));
            return node;
        }
        let created = match ctx {
            Some(ctx) => self.tree.new_leaf_with_context(style, ctx),
            None => self.tree.new_leaf(style),
        };
        created.unwrap_or_else(|err| panic!("failed to create layout node: {err}"))
    }

    /// Returns a detached engine node to the pool.
    ///
    /// The caller must have removed the node from its parent and released all
    /// of its children first. Nodes past the pool capacity are freed outright.
    pub(crate) fn release(&mut self, node: NodeId) {
        debug_assert_eq!(
            self.tree.child_count(node),
            0,
            "released layout node still has children"
        );
        if self.free.len() < self.pool_capacity {
            self.free.push(node);
        } else {
            self.tree
                .remove(node)
                .unwrap_or_else(|err| panic!("failed to free layout node: {err}"));
        }
    }

    /// Attaches `child` under `parent` at `index` in engine order.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is a measured leaf; the engine never visits the
    /// children of a node that measures itself.
    pub(crate) fn insert_child_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        assert!(
            self.tree.get_node_context(parent).is_none(),
            "cannot attach children under a measured leaf node"
        );
        self.tree
            .insert_child_at_index(parent, index, child)
            .unwrap_or_else(|err| panic!("failed to attach layout child at {index}: {err}"));
    }

    pub(crate) fn remove_child_at(&mut self, parent: NodeId, index: usize) {
        self.tree
            .remove_child_at_index(parent, index)
            .unwrap_or_else(|err| panic!("failed to detach layout child at {index}: {err}"));
    }

    pub(crate) fn set_style(&mut self, node: NodeId, style: Style) {
        self.tree
            .set_style(node, style)
            .unwrap_or_else(|err| panic!("failed to set layout style: {err}"));
    }

    /// Invalidates cached measurements for a measured leaf.
    pub(crate) fn mark_dirty(&mut self, node: NodeId) {
        self.tree
            .mark_dirty(node)
            .unwrap_or_else(|err| panic!("failed to dirty layout node: {err}"));
    }

    /// Whether `node` needs a layout pass.
    pub(crate) fn dirty(&self, node: NodeId) -> bool {
        self.tree
            .dirty(node)
            .unwrap_or_else(|err| panic!("failed to read layout dirtiness: {err}"))
    }

    /// The engine's current (unrounded) layout for `node`.
    pub(crate) fn layout(&self, node: NodeId) -> &Layout {
        self.tree
            .layout(node)
            .unwrap_or_else(|err| panic!("failed to read layout: {err}"))
    }

    /// Runs the flexbox pass for one root.
    ///
    /// `props_of` resolves the current props of a measured leaf so its
    /// measure function can see them; it is only called for nodes created
    /// with a [`MeasureCtx`].
    pub(crate) fn compute_layout<'p>(
        &mut self,
        root: NodeId,
        available: Size<AvailableSpace>,
        props_of: impl Fn(Tag) -> Option<&'p PropMap>,
    ) {
        self.tree
            .compute_layout_with_measure(
                root,
                available,
                |known, available_space, _node, ctx, _style| match ctx {
                    Some(ctx) => {
                        let input = MeasureInput {
                            known_width: known.width,
                            known_height: known.height,
                            max_width: definite(available_space.width),
                            max_height: definite(available_space.height),
                        };
                        let measured = match props_of(ctx.tag) {
                            Some(props) => (ctx.measure)(props, &input),
                            None => MeasureSize::ZERO,
                        };
                        Size {
                            width: known.width.unwrap_or(measured.width),
                            height: known.height.unwrap_or(measured.height),
                        }
                    }
                    None => Size::ZERO,
                },
            )
            .unwrap_or_else(|err| panic!("layout pass failed: {err}"));
    }
}

fn definite(space: AvailableSpace) -> Option<f32> {
    match space {
        AvailableSpace::Definite(v) => Some(v),
        AvailableSpace::MinContent | AvailableSpace::MaxContent => None,
    }
}

/// Rounds a layout float to device pixels, halves toward positive infinity.
///
/// Screen widths are computed as `round(right edge) - round(left edge)` by
/// the dispatch walk, so two boxes sharing an edge can never overlap or gap
/// by a rounding pixel.
pub(crate) fn round_to_pixel(value: f32) -> i32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "screen coordinates fit comfortably in i32"
    )]
    let pixel = (value + 0.5).floor() as i32;
    pixel
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::style::style_from_props;

    // Styles come through the prop parser so the engine sees the same
    // defaults production does (column direction, no shrink).
    fn plain_style(width: f32, height: f32) -> Style {
        style_from_props(&PropMap::from_value(json!({
            "width": width,
            "height": height,
        })))
    }

    fn definite_space(width: f32, height: f32) -> Size<AvailableSpace> {
        Size {
            width: AvailableSpace::Definite(width),
            height: AvailableSpace::Definite(height),
        }
    }

    #[test]
    fn rounding_matches_half_up() {
        assert_eq!(round_to_pixel(2.5), 3);
        assert_eq!(round_to_pixel(2.4), 2);
        assert_eq!(round_to_pixel(-2.5), -2);
        assert_eq!(round_to_pixel(-2.6), -3);
        assert_eq!(round_to_pixel(0.0), 0);
    }

    #[test]
    fn released_nodes_are_reused() {
        let mut tree = LayoutTree::new(8);
        let a = tree.acquire(plain_style(10.0, 10.0), None);
        tree.release(a);
        let b = tree.acquire(plain_style(20.0, 20.0), None);
        assert_eq!(a, b, "the parked node must be handed back out");
        assert_eq!(tree.tree.total_node_count(), 1);
    }

    #[test]
    fn pool_capacity_bounds_parked_nodes() {
        let mut tree = LayoutTree::new(1);
        let a = tree.acquire(plain_style(1.0, 1.0), None);
        let b = tree.acquire(plain_style(2.0, 2.0), None);
        tree.release(a);
        tree.release(b);
        assert_eq!(tree.free.len(), 1, "second release must not grow the pool");
        assert_eq!(tree.tree.total_node_count(), 1);
    }

    #[test]
    fn children_lay_out_in_a_column() {
        let mut tree = LayoutTree::new(8);
        let child_a = tree.acquire(plain_style(50.0, 20.0), None);
        let child_b = tree.acquire(plain_style(50.0, 30.0), None);
        let root = tree.acquire(plain_style(100.0, 100.0), None);
        tree.insert_child_at(root, 0, child_a);
        tree.insert_child_at(root, 1, child_b);

        tree.compute_layout(root, definite_space(100.0, 100.0), |_| None);

        assert_eq!(tree.layout(child_a).location.y, 0.0);
        assert_eq!(tree.layout(child_b).location.y, 20.0, "column stacks below");
    }

    #[test]
    fn measured_leaf_uses_its_measure_function() {
        fn fixed_measure(_props: &PropMap, _input: &MeasureInput) -> MeasureSize {
            MeasureSize {
                width: 42.0,
                height: 17.0,
            }
        }

        let props = PropMap::new();
        let mut tree = LayoutTree::new(8);
        // Shrink-wrap the leaf; a stretched cross size would override the
        // measured width.
        let leaf = tree.acquire(
            style_from_props(&PropMap::from_value(json!({ "alignSelf": "flex-start" }))),
            Some(MeasureCtx {
                tag: Tag(3),
                measure: fixed_measure,
            }),
        );
        let root = tree.acquire(plain_style(100.0, 100.0), None);
        tree.insert_child_at(root, 0, leaf);

        tree.compute_layout(root, definite_space(100.0, 100.0), |_| Some(&props));

        assert_eq!(tree.layout(leaf).size.width, 42.0);
        assert_eq!(tree.layout(leaf).size.height, 17.0);
    }

    #[test]
    #[should_panic(expected = "cannot attach children under a measured leaf node")]
    fn attaching_under_a_measured_leaf_panics() {
        fn zero_measure(_props: &PropMap, _input: &MeasureInput) -> MeasureSize {
            MeasureSize::ZERO
        }

        let mut tree = LayoutTree::new(8);
        let leaf = tree.acquire(
            Style::default(),
            Some(MeasureCtx {
                tag: Tag(1),
                measure: zero_measure,
            }),
        );
        let child = tree.acquire(plain_style(5.0, 5.0), None);
        tree.insert_child_at(leaf, 0, child);
    }
}
