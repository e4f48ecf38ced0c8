// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy for structural tree violations.
//!
//! Umbra distinguishes three failure classes:
//!
//! - **Structural errors** ([`TreeError`]) — the embedder referenced a tag,
//!   index, or type that does not exist or is not legal for the operation.
//!   These are returned as `Result`s from the inbound interface and always
//!   name the offending identity.
//! - **Benign races** — operations that arrive after the thing they target
//!   is already gone in an expected way (e.g. dropping an already-dropped
//!   view). These are logged at debug level and become no-ops.
//! - **Internal invariant violations** — bugs in Umbra itself. These panic,
//!   in the same spirit as a failed assertion.

use thiserror::Error;

use crate::tag::Tag;

/// A structural error raised by the shadow tree, reconciler, or mount layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TreeError {
    /// `create_view` or `register_root` was given a tag that is already live.
    #[error("view tag {0} is already in use")]
    TagInUse(Tag),

    /// An operation referenced a tag with no live view or shadow node.
    #[error("trying to use unknown view tag: {0}")]
    UnknownTag(Tag),

    /// An operation referenced a tag that was recently dropped.
    ///
    /// Functionally identical to [`UnknownTag`](Self::UnknownTag), but the
    /// mount layer remembers a window of recently dropped tags so that late
    /// operations produce a more useful diagnostic than "unknown".
    #[error("trying to use view tag {0} which was recently dropped")]
    RecentlyDropped(Tag),

    /// An operation that requires a registered root was given something else.
    #[error("root tag {0} is not registered")]
    UnknownRoot(Tag),

    /// An operation that forbids roots was given one.
    #[error("trying to add or replace a root tag: {0}")]
    RootForbidden(Tag),

    /// `create_view` named a view type with no registered kind.
    #[error("got unknown view type: {0:?}")]
    UnknownViewType(String),

    /// An attach would give a node a second parent.
    #[error("trying to attach child {child} to {parent}, but it already has parent {existing}")]
    AlreadyAttached {
        /// The child being attached.
        child: Tag,
        /// The requested new parent.
        parent: Tag,
        /// The parent the child is currently attached to.
        existing: Tag,
    },

    /// `replace_existing_view` was given a node with no parent.
    #[error("node is not attached to a parent: {0}")]
    Detached(Tag),

    /// A child index was outside the container's current child list.
    #[error("child index {index} out of range for {parent} ({len} children)")]
    ChildIndexOutOfRange {
        /// The container whose children were indexed.
        parent: Tag,
        /// The offending index.
        index: usize,
        /// The container's child count at the time of the operation.
        len: usize,
    },

    /// The same removal index appeared more than once in one call.
    #[error("repeated index {index} in removal list for view tag {parent}")]
    RepeatedRemoveIndex {
        /// The container being mutated.
        parent: Tag,
        /// The duplicated index.
        index: usize,
    },

    /// Two parallel argument arrays had different lengths.
    #[error("size of {left} ({left_len}) does not match size of {right} ({right_len})")]
    MismatchedArrays {
        /// Name of the first array.
        left: &'static str,
        /// Length of the first array.
        left_len: usize,
        /// Name of the second array.
        right: &'static str,
        /// Length of the second array.
        right_len: usize,
    },

    /// A child operation targeted a view whose kind cannot host children.
    #[error("view tag {parent} of type {kind:?} does not accept children")]
    NotAContainer {
        /// The would-be container.
        parent: Tag,
        /// Its registered view type.
        kind: &'static str,
    },

    /// `measure_layout` was given an ancestor that is not one.
    #[error("tag {ancestor} is not an ancestor of tag {tag}")]
    NotAnAncestor {
        /// The claimed ancestor.
        ancestor: Tag,
        /// The node being measured.
        tag: Tag,
    },

    /// A measurement walk crossed a node whose kind lays out its own
    /// children, so shadow-tree coordinates are not authoritative there.
    #[error("cannot measure relative to {ancestor}: {tag} lays out its children natively")]
    CustomLayoutInPath {
        /// The measurement ancestor.
        ancestor: Tag,
        /// The node with custom child layout.
        tag: Tag,
    },
}

impl TreeError {
    /// Returns the primary tag this error is about, if it has one.
    #[must_use]
    pub fn tag(&self) -> Option<Tag> {
        match self {
            Self::TagInUse(t)
            | Self::UnknownTag(t)
            | Self::RecentlyDropped(t)
            | Self::UnknownRoot(t)
            | Self::RootForbidden(t)
            | Self::Detached(t) => Some(*t),
            Self::AlreadyAttached { child, .. } => Some(*child),
            Self::ChildIndexOutOfRange { parent, .. } | Self::RepeatedRemoveIndex { parent, .. } => {
                Some(*parent)
            }
            Self::NotAContainer { parent, .. } => Some(*parent),
            Self::NotAnAncestor { tag, .. } | Self::CustomLayoutInPath { tag, .. } => Some(*tag),
            Self::UnknownViewType(_) | Self::MismatchedArrays { .. } => None,
        }
    }
}
