// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mount manager: sole owner of the mounted view hierarchy.
//!
//! [`MountManager`] holds the authoritative tag→view map and applies queued
//! operations to host views. Everything here runs on one thread — the thread
//! the manager was created on — because platform view toolkits are
//! single-threaded. That affinity is enforced by assertion, not locking:
//! contention would be a bug in the embedding, not a case to serialize.
//!
//! Deletes can animate. A child whose kind carries
//! [`ViewCaps::DELETE_TRANSITION`] is not detached when its batch removes it;
//! it is marked *pending* under its container and stays mounted until the
//! host reports the transition finished through
//! [`MountManager::finish_delete`]. While a delete is pending, every
//! index-based operation on that container skips the pending children when
//! resolving indices, so later batches keep addressing the children the
//! shadow tree knows about.
//!
//! Dropped tags are remembered in a small ring buffer. Operations racing a
//! teardown are expected (script execution is asynchronous), so touching a
//! recently dropped tag is either a logged no-op (drops) or an error that
//! says "recently dropped" instead of "unknown" (everything else).

use std::sync::Arc;
use std::thread::{self, ThreadId};

use hashbrown::HashMap;
use serde_json::Value;

use crate::error::TreeError;
use crate::host::{HostContainer, HostView, PixelRect, ViewCaps, ViewKind, ViewRegistry};
use crate::ops::ViewAtIndex;
use crate::props::PropMap;
use crate::tag::Tag;

/// Tuning knobs for the mount manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MountConfig {
    /// How many recently dropped tags to remember for diagnostics.
    pub dropped_history: usize,
}

impl MountConfig {
    /// The default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dropped_history: 32,
        }
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Remembers the last `capacity` dropped tags, oldest overwritten first.
#[derive(Debug)]
struct DroppedRing {
    tags: Vec<Tag>,
    capacity: usize,
    cursor: usize,
}

impl DroppedRing {
    fn new(capacity: usize) -> Self {
        Self {
            tags: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    fn push(&mut self, tag: Tag) {
        if self.capacity == 0 {
            return;
        }
        if self.tags.len() < self.capacity {
            self.tags.push(tag);
        } else {
            self.tags[self.cursor] = tag;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
    }

    fn contains(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// The view currently holding the script-side touch responder lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsResponder {
    /// The materialized view holding the lock.
    pub tag: Tag,
    /// The tag the script asked for, before collapsed nodes were resolved.
    pub initial_tag: Tag,
    /// Whether native gesture recognition is suppressed while locked.
    pub block_native: bool,
}

struct ViewRecord {
    view: Box<dyn HostView>,
    kind: &'static ViewKind,
    parent: Option<Tag>,
    is_root: bool,
}

/// Owner of all mounted host views for one surface set.
///
/// Construct it on the UI thread; every mutation asserts it is still there.
pub struct MountManager {
    registry: Arc<ViewRegistry>,
    views: HashMap<Tag, ViewRecord>,
    /// Per container: children marked for removal whose delete transition
    /// has not finished yet. They are still attached to the container.
    pending_deletes: HashMap<Tag, Vec<Tag>>,
    dropped: DroppedRing,
    responder: Option<JsResponder>,
    ui_thread: ThreadId,
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("views", &self.views.len())
            .field("pending_deletes", &self.pending_deletes)
            .field("responder", &self.responder)
            .finish_non_exhaustive()
    }
}

impl MountManager {
    /// Creates an empty manager bound to the calling thread.
    #[must_use]
    pub fn new(registry: Arc<ViewRegistry>) -> Self {
        Self::with_config(registry, MountConfig::new())
    }

    /// Creates an empty manager with explicit tuning.
    #[must_use]
    pub fn with_config(registry: Arc<ViewRegistry>, config: MountConfig) -> Self {
        Self {
            registry,
            views: HashMap::new(),
            pending_deletes: HashMap::new(),
            dropped: DroppedRing::new(config.dropped_history),
            responder: None,
            ui_thread: thread::current().id(),
        }
    }

    fn assert_ui_thread(&self) {
        assert_eq!(
            thread::current().id(),
            self.ui_thread,
            "mount mutations must run on the thread the manager was created on"
        );
    }

    // -- Queries --

    /// Whether a view is mounted for `tag`.
    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        self.views.contains_key(&tag)
    }

    /// Number of mounted views, roots included.
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Whether `tag` is a registered root view.
    #[must_use]
    pub fn is_root(&self, tag: Tag) -> bool {
        self.views.get(&tag).is_some_and(|record| record.is_root)
    }

    /// Whether `tag` was dropped within the remembered history window.
    #[must_use]
    pub fn recently_dropped(&self, tag: Tag) -> bool {
        self.dropped.contains(tag)
    }

    /// Read access to a mounted view.
    #[must_use]
    pub fn view(&self, tag: Tag) -> Option<&dyn HostView> {
        self.views.get(&tag).map(|record| record.view.as_ref())
    }

    /// Mutable access to a mounted view, for embedder code.
    #[must_use]
    pub fn view_mut(&mut self, tag: Tag) -> Option<&mut (dyn HostView + '_)> {
        match self.views.get_mut(&tag) {
            Some(record) => Some(record.view.as_mut()),
            None => None,
        }
    }

    /// The registered kind of a mounted view.
    #[must_use]
    pub fn kind_of(&self, tag: Tag) -> Option<&'static ViewKind> {
        self.views.get(&tag).map(|record| record.kind)
    }

    /// The current touch responder lock, if held.
    #[must_use]
    pub fn js_responder(&self) -> Option<JsResponder> {
        self.responder
    }

    /// Tags pending an unfinished delete transition under `container`.
    #[must_use]
    pub fn pending_deletes(&self, container: Tag) -> &[Tag] {
        self.pending_deletes
            .get(&container)
            .map_or(&[], Vec::as_slice)
    }

    // -- Roots --

    /// Registers a pre-existing host container as a root view.
    ///
    /// Root views are supplied by the embedder, never created from a kind
    /// factory, and never get kind teardown when dropped.
    pub fn add_root_view(&mut self, tag: Tag, view: Box<dyn HostView>) -> Result<(), TreeError> {
        self.assert_ui_thread();
        if self.views.contains_key(&tag) {
            return Err(TreeError::TagInUse(tag));
        }
        self.views.insert(
            tag,
            ViewRecord {
                view,
                kind: self.registry.generic_kind(),
                parent: None,
                is_root: true,
            },
        );
        Ok(())
    }

    /// Tears down a root view and its whole mounted subtree.
    ///
    /// A root that is already gone is a benign race with surface teardown
    /// and is ignored; a live non-root tag is a structural error.
    pub fn remove_root_view(&mut self, tag: Tag) -> Result<(), TreeError> {
        self.assert_ui_thread();
        match self.views.get(&tag) {
            None => {
                log::debug!("ignoring removal of unregistered root view {tag:?}");
                Ok(())
            }
            Some(record) if !record.is_root => Err(TreeError::UnknownRoot(tag)),
            Some(_) => {
                self.drop_view(tag);
                Ok(())
            }
        }
    }

    // -- Mutations --

    /// Instantiates the host view for `tag` and applies its initial props.
    pub fn create_view(
        &mut self,
        tag: Tag,
        kind: &'static ViewKind,
        initial_props: &PropMap,
    ) -> Result<(), TreeError> {
        self.assert_ui_thread();
        if self.views.contains_key(&tag) {
            return Err(TreeError::TagInUse(tag));
        }
        debug_assert!(
            !kind.caps.contains(ViewCaps::VIRTUAL),
            "virtual kinds never reach the mount layer"
        );
        let mut view = (kind.create)(tag);
        kind.apply_props(view.as_mut(), initial_props);
        self.views.insert(
            tag,
            ViewRecord {
                view,
                kind,
                parent: None,
                is_root: false,
            },
        );
        Ok(())
    }

    /// Applies a prop diff through the kind's registered setters.
    pub fn update_props(&mut self, tag: Tag, props: &PropMap) -> Result<(), TreeError> {
        self.assert_ui_thread();
        let Self { views, dropped, .. } = self;
        let record = views.get_mut(&tag).ok_or_else(|| unknown(dropped, tag))?;
        record.kind.apply_props(record.view.as_mut(), props);
        Ok(())
    }

    /// Assigns a frame to `tag`, a native child of `parent`.
    ///
    /// When the parent's kind lays out its own children the frame is
    /// discarded; that kind is the authority for its children's geometry.
    pub fn update_layout(&mut self, parent: Tag, tag: Tag, frame: PixelRect) -> Result<(), TreeError> {
        self.assert_ui_thread();
        let Self { views, dropped, .. } = self;
        let parent_caps = views
            .get(&parent)
            .ok_or_else(|| unknown(dropped, parent))?
            .kind
            .caps;
        let record = views.get_mut(&tag).ok_or_else(|| unknown(dropped, tag))?;
        if parent_caps.contains(ViewCaps::CUSTOM_CHILD_LAYOUT) {
            return Ok(());
        }
        record.view.set_frame(frame);
        Ok(())
    }

    /// Attaches the initial children of a freshly created container, in order.
    pub fn set_children(&mut self, tag: Tag, children: &[Tag]) -> Result<(), TreeError> {
        self.assert_ui_thread();
        if !self.views.contains_key(&tag) {
            return Err(unknown(&self.dropped, tag));
        }
        for &child in children {
            if !self.views.contains_key(&child) {
                return Err(unknown(&self.dropped, child));
            }
            let [parent_record, child_record] = self.views.get_disjoint_mut([&tag, &child]);
            let parent_record = parent_record.unwrap_or_else(|| panic!("container {tag:?} vanished"));
            let child_record = child_record.unwrap_or_else(|| panic!("child {child:?} vanished"));
            let kind_name = parent_record.kind.name;
            let Some(container) = parent_record.view.as_container() else {
                return Err(TreeError::NotAContainer {
                    parent: tag,
                    kind: kind_name,
                });
            };
            let end = container.child_count();
            container.add_child_at(end, child, child_record.view.as_mut());
            child_record.parent = Some(tag);
        }
        Ok(())
    }

    /// Removes, adds, and deletes children of one container.
    ///
    /// `remove_indices` and the indices in `add` are positions among the
    /// container's *visible* children — children pending a delete transition
    /// are skipped when resolving them. A removal resolving to a child named
    /// in `delete_tags` whose kind animates deletes starts the transition
    /// instead of detaching; everything else in `delete_tags` is dropped
    /// recursively after the adds.
    pub fn manage_children(
        &mut self,
        tag: Tag,
        remove_indices: &[usize],
        add: &[ViewAtIndex],
        delete_tags: &[Tag],
    ) -> Result<(), TreeError> {
        self.assert_ui_thread();

        // Kinds are static data, so resolve the animated subset up front,
        // before the container borrow pins the view map.
        let transition_tags: Vec<Tag> = delete_tags
            .iter()
            .copied()
            .filter(|t| {
                self.views
                    .get(t)
                    .is_some_and(|r| r.kind.caps.contains(ViewCaps::DELETE_TRANSITION))
            })
            .collect();

        let mut pending = self.pending_deletes.remove(&tag).unwrap_or_default();
        let mut detached: Vec<Tag> = Vec::new();
        let mut newly_pending: Vec<Tag> = Vec::new();

        let removal_result = (|| {
            let Self { views, dropped, .. } = &mut *self;
            let record = views.get_mut(&tag).ok_or_else(|| unknown(dropped, tag))?;
            let is_root = record.is_root;
            let kind_name = record.kind.name;
            let Some(container) = record.view.as_container() else {
                return Err(TreeError::NotAContainer {
                    parent: tag,
                    kind: kind_name,
                });
            };

            let mut order = remove_indices.to_vec();
            order.sort_unstable_by(|a, b| b.cmp(a));
            for pair in order.windows(2) {
                if pair[0] == pair[1] {
                    return Err(TreeError::RepeatedRemoveIndex {
                        parent: tag,
                        index: pair[0],
                    });
                }
            }

            for &logical in &order {
                let visible = visible_count(container, &pending);
                if logical >= visible {
                    if is_root && visible == 0 {
                        log::debug!(
                            "ignoring removal at index {logical} on already-empty root {tag:?}"
                        );
                        continue;
                    }
                    return Err(TreeError::ChildIndexOutOfRange {
                        parent: tag,
                        index: logical,
                        len: visible,
                    });
                }
                let actual = resolve_index(container, &pending, logical);
                let child = container
                    .child_tag_at(actual)
                    .unwrap_or_else(|| panic!("resolved child index {actual} out of bounds"));
                if transition_tags.contains(&child) {
                    // The transition owns this slot until finish_delete.
                    pending.push(child);
                    newly_pending.push(child);
                } else {
                    container.remove_child_at(actual);
                    detached.push(child);
                }
            }
            Ok(())
        })();
        if let Err(err) = removal_result {
            if !pending.is_empty() {
                self.pending_deletes.insert(tag, pending);
            }
            return Err(err);
        }

        for &child in &detached {
            if let Some(record) = self.views.get_mut(&child) {
                record.parent = None;
            }
        }
        for &child in &newly_pending {
            if let Some(record) = self.views.get_mut(&child) {
                record.view.begin_delete_transition();
            }
        }

        let mut adds = add.to_vec();
        adds.sort_by_key(|entry| entry.index);
        for entry in adds {
            if !self.views.contains_key(&entry.tag) {
                if !pending.is_empty() {
                    self.pending_deletes.insert(tag, pending);
                }
                return Err(unknown(&self.dropped, entry.tag));
            }
            debug_assert_ne!(entry.tag, tag, "a container cannot be its own child");
            let [parent_record, child_record] = self.views.get_disjoint_mut([&tag, &entry.tag]);
            let parent_record = parent_record.unwrap_or_else(|| panic!("container {tag:?} vanished"));
            let child_record =
                child_record.unwrap_or_else(|| panic!("child {:?} vanished", entry.tag));
            let container = parent_record
                .view
                .as_container()
                .unwrap_or_else(|| panic!("container capability vanished on {tag:?}"));
            let actual = resolve_index(container, &pending, entry.index);
            container.add_child_at(actual, entry.tag, child_record.view.as_mut());
            child_record.parent = Some(tag);
        }

        if !pending.is_empty() {
            self.pending_deletes.insert(tag, pending);
        }

        for &delete in delete_tags {
            if newly_pending.contains(&delete) {
                continue;
            }
            self.drop_view(delete);
        }
        Ok(())
    }

    /// Completes a delete transition: detaches `tag` from `container` and
    /// drops it.
    ///
    /// Called by the embedder when the host-side animation ends. Unknown
    /// pairs are logged and ignored; a second completion racing a container
    /// teardown is expected.
    pub fn finish_delete(&mut self, container: Tag, tag: Tag) {
        self.assert_ui_thread();
        let Some(pending) = self.pending_deletes.get_mut(&container) else {
            log::debug!("ignoring finish_delete for {tag:?}: no deletes pending on {container:?}");
            return;
        };
        let Some(position) = pending.iter().position(|&t| t == tag) else {
            log::debug!("ignoring finish_delete for {tag:?}: not pending on {container:?}");
            return;
        };
        pending.remove(position);
        if pending.is_empty() {
            self.pending_deletes.remove(&container);
        }
        self.drop_view(tag);
    }

    /// Drops `tag` and every view mounted beneath it.
    ///
    /// The view is detached from its surviving parent, then the subtree is
    /// torn down in place: children first, highest index first, each non-root
    /// view getting its teardown hook before its tag is forgotten. Views
    /// inside the dying subtree are not detached one by one. Dropping a tag
    /// that is already gone is a logged no-op.
    pub fn drop_view(&mut self, tag: Tag) {
        self.assert_ui_thread();
        if !self.views.contains_key(&tag) {
            if self.dropped.contains(tag) {
                log::debug!("ignoring drop of recently dropped view {tag:?}");
            } else {
                log::warn!("trying to drop unknown view {tag:?}");
            }
            return;
        }
        self.detach_from_parent(tag);
        self.drop_recursive(tag);
    }

    fn detach_from_parent(&mut self, tag: Tag) {
        let Some(parent) = self.views.get(&tag).and_then(|record| record.parent) else {
            return;
        };
        if let Some(parent_record) = self.views.get_mut(&parent) {
            if let Some(container) = parent_record.view.as_container() {
                for index in 0..container.child_count() {
                    if container.child_tag_at(index) == Some(tag) {
                        container.remove_child_at(index);
                        break;
                    }
                }
            }
        }
        if let Some(pending) = self.pending_deletes.get_mut(&parent) {
            pending.retain(|&t| t != tag);
            if pending.is_empty() {
                self.pending_deletes.remove(&parent);
            }
        }
    }

    fn drop_recursive(&mut self, tag: Tag) {
        let Some(mut record) = self.views.remove(&tag) else {
            return;
        };
        self.pending_deletes.remove(&tag);
        if self
            .responder
            .is_some_and(|r| r.tag == tag || r.initial_tag == tag)
        {
            self.responder = None;
        }
        let children: Vec<Tag> = match record.view.as_container() {
            Some(container) => (0..container.child_count())
                .rev()
                .filter_map(|index| container.child_tag_at(index))
                .collect(),
            None => Vec::new(),
        };
        for child in children {
            self.drop_recursive(child);
        }
        if !record.is_root {
            record.view.on_teardown();
        }
        self.dropped.push(tag);
    }

    // -- Measurement --

    /// Measures `tag` relative to its root view: summed child offsets up the
    /// mounted parent chain, plus the view's own size.
    ///
    /// Returns `None` for unknown or unattached views; a measurement racing
    /// a teardown is benign.
    #[must_use]
    pub fn measure(&self, tag: Tag) -> Option<PixelRect> {
        let record = self.views.get(&tag)?;
        let frame = record.view.frame();
        if record.is_root {
            return Some(PixelRect::new(0, 0, frame.width, frame.height));
        }
        let (mut x, mut y) = (frame.x, frame.y);
        let mut current = record.parent;
        loop {
            let parent = current?;
            let parent_record = self.views.get(&parent)?;
            if parent_record.is_root {
                break;
            }
            let parent_frame = parent_record.view.frame();
            x += parent_frame.x;
            y += parent_frame.y;
            current = parent_record.parent;
        }
        Some(PixelRect::new(x, y, frame.width, frame.height))
    }

    /// Measures `tag` in window coordinates: the root-relative frame offset
    /// by the root view's position and reported window origin.
    #[must_use]
    pub fn measure_in_window(&self, tag: Tag) -> Option<PixelRect> {
        let record = self.views.get(&tag)?;
        let frame = record.view.frame();
        let (mut x, mut y) = if record.is_root {
            (0, 0)
        } else {
            (frame.x, frame.y)
        };
        let mut current = if record.is_root { Some(tag) } else { record.parent };
        loop {
            let parent = current?;
            let parent_record = self.views.get(&parent)?;
            let parent_frame = parent_record.view.frame();
            if parent_record.is_root {
                let (origin_x, origin_y) = parent_record.view.window_origin();
                if parent != tag {
                    x += parent_frame.x;
                    y += parent_frame.y;
                }
                x += origin_x;
                y += origin_y;
                break;
            }
            x += parent_frame.x;
            y += parent_frame.y;
            current = parent_record.parent;
        }
        Some(PixelRect::new(x, y, frame.width, frame.height))
    }

    // -- Commands, responder, accessibility --

    /// Routes a scripted command to the view's kind.
    ///
    /// Kinds without a command receiver log and succeed; an unknown target
    /// is an error so the queue's command lane can retry once.
    pub fn dispatch_command(&mut self, tag: Tag, command: &str, args: &Value) -> Result<(), TreeError> {
        self.assert_ui_thread();
        let Self { views, dropped, .. } = self;
        let record = views.get_mut(&tag).ok_or_else(|| unknown(dropped, tag))?;
        match record.kind.command {
            Some(receive) => {
                receive(record.view.as_mut(), command, args);
                Ok(())
            }
            None => {
                log::warn!(
                    "view kind {:?} takes no commands; dropping {command:?} for {tag:?}",
                    record.kind.name,
                );
                Ok(())
            }
        }
    }

    /// Grants the touch responder lock to `tag`.
    pub fn set_js_responder(
        &mut self,
        tag: Tag,
        initial_tag: Tag,
        block_native: bool,
    ) -> Result<(), TreeError> {
        self.assert_ui_thread();
        if !self.views.contains_key(&tag) {
            return Err(unknown(&self.dropped, tag));
        }
        self.responder = Some(JsResponder {
            tag,
            initial_tag,
            block_native,
        });
        Ok(())
    }

    /// Releases the touch responder lock, if held.
    pub fn clear_js_responder(&mut self) {
        self.assert_ui_thread();
        self.responder = None;
    }

    /// Delivers a platform accessibility event code to a view.
    pub fn send_accessibility_event(&mut self, tag: Tag, event: i32) -> Result<(), TreeError> {
        self.assert_ui_thread();
        let Self { views, dropped, .. } = self;
        let record = views.get_mut(&tag).ok_or_else(|| unknown(dropped, tag))?;
        record.view.accessibility_event(event);
        Ok(())
    }
}

fn unknown(dropped: &DroppedRing, tag: Tag) -> TreeError {
    if dropped.contains(tag) {
        TreeError::RecentlyDropped(tag)
    } else {
        TreeError::UnknownTag(tag)
    }
}

/// Children not held by a pending delete transition.
fn visible_count(container: &dyn HostContainer, pending: &[Tag]) -> usize {
    (0..container.child_count())
        .filter(|&i| {
            container
                .child_tag_at(i)
                .is_none_or(|t| !pending.contains(&t))
        })
        .count()
}

/// Actual container index of the `logical`-th visible child; the container's
/// end when `logical` equals the visible count.
fn resolve_index(container: &dyn HostContainer, pending: &[Tag], logical: usize) -> usize {
    let mut seen = 0;
    for index in 0..container.child_count() {
        let held = container
            .child_tag_at(index)
            .is_some_and(|t| pending.contains(&t));
        if !held {
            if seen == logical {
                return index;
            }
            seen += 1;
        }
    }
    container.child_count()
}
