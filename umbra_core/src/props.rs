// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Untyped view properties and the layout-only classification.
//!
//! Props arrive from the scripting side as JSON objects and stay untyped
//! inside the pipeline: the shadow tree keeps the merged map per node to
//! rebuild flexbox styles, and the mount manager feeds individual entries to
//! each view kind's registered setters. The only structural question this
//! module answers is whether a prop map leaves a plain container *layout
//! only*, i.e. with no visual or interactive effect of its own.

use serde_json::{Map, Value};

/// An untyped prop map for one view.
///
/// Thin wrapper over a [`serde_json`] object. Partial updates are merged with
/// [`PropMap::merge_from`]; an explicit JSON `null` deletes the entry, which
/// matches the scripting side's "reset to default" convention.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropMap {
    map: Map<String, Value>,
}

impl PropMap {
    /// Creates an empty prop map.
    #[must_use]
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    /// Wraps a JSON value.
    ///
    /// `null` becomes the empty map, matching an omitted props argument.
    ///
    /// # Panics
    ///
    /// Panics if `value` is anything other than an object or `null`.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self { map },
            Value::Null => Self::new(),
            other => panic!("view props must be a JSON object or null, got: {other}"),
        }
    }

    /// Returns the raw value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Returns `true` if `key` is present (even with a `null` value).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Returns `key` as a number, if present and numeric.
    #[must_use]
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "prop values originate as f32-precision layout numbers"
        )]
        let narrowed = self.map.get(key).and_then(Value::as_f64).map(|v| v as f32);
        narrowed
    }

    /// Returns `key` as a boolean, if present and boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).and_then(Value::as_bool)
    }

    /// Returns `key` as a string slice, if present and a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::as_str)
    }

    /// Iterates over `(key, value)` entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Merges a partial update into this map.
    ///
    /// Entries in `diff` replace existing entries; a `null` value removes the
    /// entry so later style rebuilds see the engine default again.
    pub fn merge_from(&mut self, diff: &Self) {
        for (key, value) in &diff.map {
            if value.is_null() {
                self.map.remove(key);
            } else {
                self.map.insert(key.clone(), value.clone());
            }
        }
    }

    /// Whether every entry is layout-neutral, so a plain container carrying
    /// these props needs no host view of its own.
    ///
    /// An explicit `collapsable: false` disqualifies the whole map regardless
    /// of the remaining entries. The empty map is trivially layout-only.
    #[must_use]
    pub fn is_layout_only(&self) -> bool {
        if self.get_bool("collapsable") == Some(false) {
            return false;
        }
        self.map.iter().all(|(k, v)| prop_is_layout_neutral(k, v))
    }

    /// Whether these props opt the node into layout-change notifications.
    #[must_use]
    pub fn wants_layout_events(&self) -> bool {
        self.get_bool("onLayout").unwrap_or(false)
    }
}

impl From<Map<String, Value>> for PropMap {
    fn from(map: Map<String, Value>) -> Self {
        Self { map }
    }
}

/// Whether a single prop entry has no effect beyond layout.
///
/// The fixed allow-list covers the flexbox container and item props,
/// dimensions, position offsets, margins and paddings (with axis and edge
/// variants), `display`, the `collapsable` flag itself, and the `onLayout`
/// notification opt-in. Two props are neutral only for specific values:
/// `opacity` at its default (`null` or `1.0`) and `pointerEvents` at
/// `"auto"`. Everything else is assumed to need a host view.
#[must_use]
pub fn prop_is_layout_neutral(key: &str, value: &Value) -> bool {
    if is_allow_listed(key) {
        return true;
    }
    match key {
        "opacity" => value.is_null() || value.as_f64() == Some(1.0),
        "pointerEvents" => value.as_str() == Some("auto"),
        _ => false,
    }
}

fn is_allow_listed(key: &str) -> bool {
    matches!(
        key,
        "alignContent"
            | "alignItems"
            | "alignSelf"
            | "collapsable"
            | "columnGap"
            | "display"
            | "flex"
            | "flexBasis"
            | "flexDirection"
            | "flexGrow"
            | "flexShrink"
            | "flexWrap"
            | "gap"
            | "justifyContent"
            | "onLayout"
            | "rowGap"
            // position
            | "position"
            | "left"
            | "right"
            | "top"
            | "bottom"
            | "start"
            | "end"
            // dimensions
            | "width"
            | "height"
            | "minWidth"
            | "maxWidth"
            | "minHeight"
            | "maxHeight"
            // margins
            | "margin"
            | "marginVertical"
            | "marginHorizontal"
            | "marginLeft"
            | "marginRight"
            | "marginTop"
            | "marginBottom"
            | "marginStart"
            | "marginEnd"
            // paddings
            | "padding"
            | "paddingVertical"
            | "paddingHorizontal"
            | "paddingLeft"
            | "paddingRight"
            | "paddingTop"
            | "paddingBottom"
            | "paddingStart"
            | "paddingEnd"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pure_layout_props_are_layout_only() {
        let props = PropMap::from_value(json!({
            "flex": 1,
            "marginStart": 4,
            "paddingHorizontal": 8,
            "position": "absolute",
            "onLayout": true,
        }));
        assert!(props.is_layout_only(), "flex and spacing props need no host view");
    }

    #[test]
    fn empty_and_null_props_are_layout_only() {
        assert!(PropMap::new().is_layout_only());
        assert!(PropMap::from_value(Value::Null).is_layout_only());
    }

    #[test]
    fn explicit_collapsable_false_disqualifies() {
        let props = PropMap::from_value(json!({ "collapsable": false }));
        assert!(!props.is_layout_only());

        let props = PropMap::from_value(json!({ "collapsable": true, "flex": 1 }));
        assert!(props.is_layout_only(), "collapsable true is the default");
    }

    #[test]
    fn visual_props_disqualify() {
        let props = PropMap::from_value(json!({ "flex": 1, "backgroundColor": 0xFF0000 }));
        assert!(!props.is_layout_only());
    }

    #[test]
    fn default_opacity_is_neutral() {
        assert!(PropMap::from_value(json!({ "opacity": 1.0 })).is_layout_only());
        assert!(PropMap::from_value(json!({ "opacity": null })).is_layout_only());
        assert!(!PropMap::from_value(json!({ "opacity": 0.5 })).is_layout_only());
    }

    #[test]
    fn pointer_events_neutral_only_when_auto() {
        assert!(PropMap::from_value(json!({ "pointerEvents": "auto" })).is_layout_only());
        assert!(!PropMap::from_value(json!({ "pointerEvents": "none" })).is_layout_only());
    }

    #[test]
    fn merge_replaces_and_null_deletes() {
        let mut props = PropMap::from_value(json!({ "width": 10, "height": 20 }));
        props.merge_from(&PropMap::from_value(json!({ "width": 15, "height": null })));
        assert_eq!(props.get_f32("width"), Some(15.0));
        assert_eq!(props.get_f32("height"), None);
        assert!(!props.contains("height"));
    }

    #[test]
    fn typed_getters_ignore_mismatched_types() {
        let props = PropMap::from_value(json!({ "width": "stretch", "onLayout": 1 }));
        assert_eq!(props.get_f32("width"), None);
        assert_eq!(props.get_str("width"), Some("stretch"));
        assert_eq!(props.get_bool("onLayout"), None);
        assert!(!props.wants_layout_events());
    }

    #[test]
    #[should_panic(expected = "view props must be a JSON object or null")]
    fn non_object_props_panic() {
        let _ = PropMap::from_value(json!([1, 2, 3]));
    }
}
