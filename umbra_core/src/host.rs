// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host view contract.
//!
//! The mount side talks to platform views exclusively through the traits and
//! records here. A platform embedding provides:
//!
//! - one [`HostView`] implementation per native widget family, with
//!   [`HostContainer`] as an opt-in capability for widgets that parent
//!   children;
//! - one [`ViewKind`] record per scriptable view type, carrying the factory,
//!   capability flags, and a static prop-setter table (an explicit
//!   `(prop name, fn)` list, resolved at registration rather than through any
//!   runtime reflection);
//! - a [`ViewRegistry`] built once at startup and shared by the shadow and
//!   mount sides.
//!
//! Nothing in this module depends on the layout engine; measure functions see
//! plain [`MeasureInput`]/[`MeasureSize`] values.

use std::any::Any;

use serde_json::Value;

use crate::error::TreeError;
use crate::props::PropMap;
use crate::tag::Tag;

/// An integer frame in device pixels, relative to the parent view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width; never negative.
    pub width: i32,
    /// Height; never negative.
    pub height: i32,
}

impl PixelRect {
    /// The empty frame at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Creates a frame from its parts.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Constraints handed to a measure function during the layout pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeasureInput {
    /// Width already fixed by styles, if any.
    pub known_width: Option<f32>,
    /// Height already fixed by styles, if any.
    pub known_height: Option<f32>,
    /// Available width, `None` when unconstrained.
    pub max_width: Option<f32>,
    /// Available height, `None` when unconstrained.
    pub max_height: Option<f32>,
}

/// Content size reported by a measure function.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeasureSize {
    /// Measured width in pixels.
    pub width: f32,
    /// Measured height in pixels.
    pub height: f32,
}

impl MeasureSize {
    /// Zero in both dimensions.
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };
}

/// Measures the content of a self-sizing leaf (text-like kinds) from its
/// current props. The layout engine will not visit children of such a node.
pub type MeasureFn = fn(props: &PropMap, input: &MeasureInput) -> MeasureSize;

/// Applies one prop value to a host view.
pub type PropSetter = fn(view: &mut dyn HostView, value: &Value);

/// Handles a scripted command (`"focus"`, `"scrollTo"`, ...) on a host view.
pub type CommandFn = fn(view: &mut dyn HostView, command: &str, args: &Value);

/// Creates the host view instance for a tag.
pub type CreateFn = fn(tag: Tag) -> Box<dyn HostView>;

bitflags::bitflags! {
    /// Per-view-kind capability flags.
    ///
    /// These replace subclass checks: the pipeline never asks what a view
    /// *is*, only what it *can do*.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ViewCaps: u8 {
        /// Instances parent other host views ([`HostView::as_container`]
        /// must return `Some`).
        const CONTAINER = 1 << 0;
        /// The kind positions its own children; the pipeline must not send
        /// it layout frames for them.
        const CUSTOM_CHILD_LAYOUT = 1 << 1;
        /// Instances exist in the native hierarchy but their native children
        /// are attached to an ancestor (inline content inside text).
        const HOISTS_CHILDREN = 1 << 2;
        /// Instances never get a host view at all; they only feed the
        /// measure function of an enclosing leaf.
        const VIRTUAL = 1 << 3;
        /// Deletes animate out; the mount manager defers the actual drop
        /// until the host reports the transition finished.
        const DELETE_TRANSITION = 1 << 4;
    }
}

/// One native view instance, owned by the mount manager.
pub trait HostView {
    /// Applies the rounded frame, relative to the parent view.
    fn set_frame(&mut self, frame: PixelRect);

    /// The last applied frame.
    fn frame(&self) -> PixelRect;

    /// Child-management capability; `Some` for kinds with
    /// [`ViewCaps::CONTAINER`].
    fn as_container(&mut self) -> Option<&mut dyn HostContainer> {
        None
    }

    /// Downcast hook for embedder code.
    fn as_any(&mut self) -> &mut dyn Any;

    /// Delivers a platform accessibility event code.
    fn accessibility_event(&mut self, event: i32) {
        _ = event;
    }

    /// Starts the delete transition for kinds with
    /// [`ViewCaps::DELETE_TRANSITION`]. The embedder reports completion
    /// through [`MountManager::finish_delete`](crate::mount::MountManager::finish_delete),
    /// which detaches and drops the view.
    fn begin_delete_transition(&mut self) {}

    /// Called right before the mount manager forgets this view's tag.
    fn on_teardown(&mut self) {}

    /// Offset of this view's origin in window coordinates.
    ///
    /// Only consulted on root views during window measurement; the default
    /// places the root at the window origin.
    fn window_origin(&self) -> (i32, i32) {
        (0, 0)
    }
}

/// Child management for container views.
///
/// Indices are native indices: positions in the container's own child list,
/// which the pipeline keeps consistent with its bookkeeping.
pub trait HostContainer {
    /// Number of attached children.
    fn child_count(&self) -> usize;

    /// Tag of the child at `index`, if in range.
    fn child_tag_at(&self, index: usize) -> Option<Tag>;

    /// Attaches `child` at `index`, shifting later children right.
    fn add_child_at(&mut self, index: usize, child_tag: Tag, child: &mut dyn HostView);

    /// Detaches the child at `index`, shifting later children left.
    fn remove_child_at(&mut self, index: usize);

    /// Detaches all children.
    fn remove_all_children(&mut self);
}

/// Static configuration for one view type.
#[derive(Clone, Copy)]
pub struct ViewKind {
    /// Type name the scripting side creates instances by.
    pub name: &'static str,
    /// Capability flags.
    pub caps: ViewCaps,
    /// Host view factory. Never called for [`ViewCaps::VIRTUAL`] kinds.
    pub create: CreateFn,
    /// The prop-setter table. Keys missing here are skipped, which is how
    /// layout-only props (consumed by the shadow tree) fall through.
    pub setters: &'static [(&'static str, PropSetter)],
    /// Command receiver, if the kind accepts commands.
    pub command: Option<CommandFn>,
    /// Content measure function; its presence makes shadow nodes of this
    /// kind leaves of the layout engine.
    pub measure: Option<MeasureFn>,
}

impl std::fmt::Debug for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewKind")
            .field("name", &self.name)
            .field("caps", &self.caps)
            .field("setters", &self.setters.len())
            .field("command", &self.command.is_some())
            .field("measure", &self.measure.is_some())
            .finish_non_exhaustive()
    }
}

impl ViewKind {
    /// Looks up the setter for `key` in the static table.
    #[must_use]
    pub fn setter(&self, key: &str) -> Option<PropSetter> {
        self.setters
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, setter)| *setter)
    }

    /// Applies every prop with a registered setter to `view`.
    pub fn apply_props(&self, view: &mut dyn HostView, props: &PropMap) {
        for (key, value) in props.iter() {
            if let Some(setter) = self.setter(key) {
                setter(view, value);
            }
        }
    }
}

/// All view kinds known to one surface, keyed by type name.
///
/// Built once at startup and shared (behind an `Arc`) by the shadow and
/// mount sides. The *generic container* is the kind whose instances the
/// optimizer may collapse when their props are layout-only.
#[derive(Debug)]
pub struct ViewRegistry {
    kinds: hashbrown::HashMap<&'static str, &'static ViewKind>,
    generic_container: &'static str,
}

impl ViewRegistry {
    /// Builds a registry from static kind records.
    ///
    /// # Panics
    ///
    /// Panics on duplicate kind names, on an unknown `generic_container`
    /// name, or if the generic container is not a plain container kind.
    /// These are startup configuration mistakes, not runtime conditions.
    #[must_use]
    pub fn new(
        kinds: impl IntoIterator<Item = &'static ViewKind>,
        generic_container: &'static str,
    ) -> Self {
        let mut map = hashbrown::HashMap::new();
        for kind in kinds {
            if map.insert(kind.name, kind).is_some() {
                panic!("duplicate view kind registered: {:?}", kind.name);
            }
        }
        let generic = map
            .get(generic_container)
            .unwrap_or_else(|| panic!("generic container kind {generic_container:?} not registered"));
        assert!(
            generic.caps.contains(ViewCaps::CONTAINER),
            "generic container kind {generic_container:?} must have the CONTAINER capability"
        );
        Self {
            kinds: map,
            generic_container,
        }
    }

    /// Looks up a kind by type name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static ViewKind> {
        self.kinds.get(name).copied()
    }

    /// Looks up a kind by type name, erroring on unknown names.
    pub fn resolve(&self, name: &str) -> Result<&'static ViewKind, TreeError> {
        self.get(name)
            .ok_or_else(|| TreeError::UnknownViewType(name.to_owned()))
    }

    /// Type name of the collapsible generic container.
    #[must_use]
    pub fn generic_container(&self) -> &'static str {
        self.generic_container
    }

    /// The kind record of the collapsible generic container.
    #[must_use]
    pub fn generic_kind(&self) -> &'static ViewKind {
        self.kinds[self.generic_container]
    }

    /// Whether `name` is the collapsible generic container.
    #[must_use]
    pub fn is_generic_container(&self, name: &str) -> bool {
        name == self.generic_container
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        frame: PixelRect,
        shade: Option<String>,
    }

    impl HostView for Plain {
        fn set_frame(&mut self, frame: PixelRect) {
            self.frame = frame;
        }

        fn frame(&self) -> PixelRect {
            self.frame
        }

        fn as_any(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn make_plain(_tag: Tag) -> Box<dyn HostView> {
        Box::new(Plain {
            frame: PixelRect::ZERO,
            shade: None,
        })
    }

    fn set_shade(view: &mut dyn HostView, value: &Value) {
        let plain = view
            .as_any()
            .downcast_mut::<Plain>()
            .expect("setter registered for a different kind");
        plain.shade = value.as_str().map(str::to_owned);
    }

    static PLAIN: ViewKind = ViewKind {
        name: "Plain",
        caps: ViewCaps::CONTAINER,
        create: make_plain,
        setters: &[("shade", set_shade)],
        command: None,
        measure: None,
    };

    #[test]
    fn registry_resolves_registered_kinds() {
        let registry = ViewRegistry::new([&PLAIN], "Plain");
        assert_eq!(registry.resolve("Plain").unwrap().name, "Plain");
        assert!(registry.is_generic_container("Plain"));
        assert!(matches!(
            registry.resolve("Exotic"),
            Err(TreeError::UnknownViewType(_))
        ));
    }

    #[test]
    #[should_panic(expected = "generic container kind \"Ghost\" not registered")]
    fn registry_requires_the_generic_container() {
        let _ = ViewRegistry::new([&PLAIN], "Ghost");
    }

    #[test]
    fn setter_table_applies_matching_props() {
        let mut view = (PLAIN.create)(Tag(9));
        let props = PropMap::from_value(serde_json::json!({
            "shade": "umber",
            "width": 100,
        }));
        PLAIN.apply_props(view.as_mut(), &props);
        let plain = view.as_any().downcast_mut::<Plain>().unwrap();
        assert_eq!(plain.shade.as_deref(), Some("umber"));
    }
}
