// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shadow tree data model.
//!
//! The *shadow tree* is the script-side mirror of the mounted view
//! hierarchy. Every view the embedder creates gets a [`ShadowNode`]
//! holding:
//!
//! - Identity: the embedder-assigned [`Tag`](crate::tag::Tag) and the root
//!   it lives under.
//! - Topology: the script-visible parent/child lists, plus separate
//!   *native* parent/child lists describing what is actually mounted once
//!   layout-only views are collapsed away.
//! - Props: the merged [`PropMap`](crate::props::PropMap), which also
//!   drives the node's flexbox style.
//! - Layout state: a pooled engine node (absent for virtual kinds), the
//!   last layout the batch pipeline has seen, and the rounded screen
//!   rectangle.
//!
//! [`ShadowTree`] owns the nodes, the root list, and the layout engine.
//! It maintains the accounting that makes collapsing possible: a node's
//! `total_native_children` always equals the sum of its children's native
//! contributions (see [`ShadowNode::native_contribution`]), updated
//! incrementally on every attach and detach.
//!
//! Mutations mark nodes updated, and updated flags propagate to ancestors.
//! The batch pipeline later walks only updated subtrees, compares freshly
//! computed layout against what was last seen, and emits mount operations
//! for the difference.

mod node;
mod tree;

pub use node::{NativeKind, ShadowNode};
pub use tree::ShadowTree;
