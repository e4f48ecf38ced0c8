// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Prop map to flexbox style conversion.
//!
//! The scripting side describes layout with CSS-flavored prop entries
//! (numbers in density-independent pixels, `"50%"` strings, `"auto"`). This
//! module rebuilds a complete [`taffy::Style`] from a node's merged prop map.
//! Defaults follow the mobile convention, not the web one: `flexDirection`
//! defaults to column, `flexShrink` to `0`, and `alignContent` to
//! `flex-start`.

use serde_json::Value;
use taffy::style_helpers::{auto, length, percent, zero};
use taffy::{
    AlignContent, AlignItems, AlignSelf, Dimension, Display, FlexDirection, FlexWrap,
    JustifyContent, LengthPercentage, LengthPercentageAuto, Overflow, Point, Position, Rect, Size,
    Style,
};

use crate::props::PropMap;

/// Builds the flexbox style for a node from its merged props.
///
/// Unknown keys are ignored; unknown enum strings fall back to the default
/// for that prop, matching the tolerant parsing of the scripting bridge.
#[must_use]
pub fn style_from_props(props: &PropMap) -> Style {
    // `flex` expands the same way the mobile engine resolves it: a positive
    // value feeds grow and forces basis to zero, a negative value feeds
    // shrink. Explicit flexGrow/flexShrink/flexBasis entries win.
    let flex = props.get_f32("flex");
    let flex_grow = props
        .get_f32("flexGrow")
        .or(flex.filter(|f| *f > 0.0))
        .unwrap_or(0.0);
    let flex_shrink = props
        .get_f32("flexShrink")
        .or(flex.filter(|f| *f < 0.0).map(|f| -f))
        .unwrap_or(0.0);
    let flex_basis = match props.get("flexBasis").map(parse_dimension) {
        Some(basis) if !matches!(basis, Dimension::Auto) => basis,
        _ if flex.is_some_and(|f| f > 0.0) => length(0.0),
        Some(basis) => basis,
        None => auto(),
    };

    let overflow = props.get_str("overflow").map_or(Overflow::Visible, parse_overflow);

    Style {
        display: match props.get_str("display") {
            Some("none") => Display::None,
            _ => Display::Flex,
        },
        position: match props.get_str("position") {
            Some("absolute") => Position::Absolute,
            _ => Position::Relative,
        },
        overflow: Point {
            x: overflow,
            y: overflow,
        },
        inset: Rect {
            left: edge_lpa(props, &["start", "left"], auto()),
            right: edge_lpa(props, &["end", "right"], auto()),
            top: edge_lpa(props, &["top"], auto()),
            bottom: edge_lpa(props, &["bottom"], auto()),
        },
        size: Size {
            width: dimension(props, "width"),
            height: dimension(props, "height"),
        },
        min_size: Size {
            width: dimension(props, "minWidth"),
            height: dimension(props, "minHeight"),
        },
        max_size: Size {
            width: dimension(props, "maxWidth"),
            height: dimension(props, "maxHeight"),
        },
        aspect_ratio: props.get_f32("aspectRatio"),
        margin: Rect {
            left: edge_lpa(props, &["marginStart", "marginLeft", "marginHorizontal", "margin"], zero()),
            right: edge_lpa(props, &["marginEnd", "marginRight", "marginHorizontal", "margin"], zero()),
            top: edge_lpa(props, &["marginTop", "marginVertical", "margin"], zero()),
            bottom: edge_lpa(props, &["marginBottom", "marginVertical", "margin"], zero()),
        },
        padding: Rect {
            left: edge_lp(props, &["paddingStart", "paddingLeft", "paddingHorizontal", "padding"]),
            right: edge_lp(props, &["paddingEnd", "paddingRight", "paddingHorizontal", "padding"]),
            top: edge_lp(props, &["paddingTop", "paddingVertical", "padding"]),
            bottom: edge_lp(props, &["paddingBottom", "paddingVertical", "padding"]),
        },
        border: Rect {
            left: edge_lp(props, &["borderStartWidth", "borderLeftWidth", "borderWidth"]),
            right: edge_lp(props, &["borderEndWidth", "borderRightWidth", "borderWidth"]),
            top: edge_lp(props, &["borderTopWidth", "borderWidth"]),
            bottom: edge_lp(props, &["borderBottomWidth", "borderWidth"]),
        },
        gap: Size {
            width: edge_lp(props, &["columnGap", "gap"]),
            height: edge_lp(props, &["rowGap", "gap"]),
        },
        align_items: props.get_str("alignItems").map(parse_align_items),
        align_self: props.get_str("alignSelf").and_then(parse_align_self),
        align_content: Some(
            props
                .get_str("alignContent")
                .map_or(AlignContent::FlexStart, parse_align_content),
        ),
        justify_content: Some(
            props
                .get_str("justifyContent")
                .map_or(JustifyContent::FlexStart, parse_justify_content),
        ),
        flex_direction: props
            .get_str("flexDirection")
            .map_or(FlexDirection::Column, parse_flex_direction),
        flex_wrap: props
            .get_str("flexWrap")
            .map_or(FlexWrap::NoWrap, parse_flex_wrap),
        flex_grow,
        flex_shrink,
        flex_basis,
        ..Style::default()
    }
}

/// Parses one dimension value: a number is a pixel length, `"auto"` is auto,
/// `"N%"` is a percentage. Anything else falls back to auto.
fn parse_dimension(value: &Value) -> Dimension {
    if let Some(n) = as_f32(value) {
        return length(n);
    }
    if let Some(s) = value.as_str() {
        if let Some(p) = parse_percent(s) {
            return percent(p);
        }
    }
    auto()
}

fn parse_lpa(value: &Value) -> LengthPercentageAuto {
    if let Some(n) = as_f32(value) {
        return length(n);
    }
    if let Some(s) = value.as_str() {
        if let Some(p) = parse_percent(s) {
            return percent(p);
        }
    }
    auto()
}

fn parse_lp(value: &Value) -> LengthPercentage {
    if let Some(n) = as_f32(value) {
        return length(n);
    }
    if let Some(s) = value.as_str() {
        if let Some(p) = parse_percent(s) {
            return percent(p);
        }
    }
    zero()
}

/// `"37.5%"` → `0.375`.
fn parse_percent(s: &str) -> Option<f32> {
    let digits = s.strip_suffix('%')?;
    digits.trim().parse::<f32>().ok().map(|p| p / 100.0)
}

fn as_f32(value: &Value) -> Option<f32> {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "style values originate as f32-precision layout numbers"
    )]
    let narrowed = value.as_f64().map(|v| v as f32);
    narrowed
}

fn dimension(props: &PropMap, key: &str) -> Dimension {
    props.get(key).map_or_else(auto, parse_dimension)
}

/// Resolves one box edge with the usual precedence: the per-edge prop wins
/// over the axis prop, which wins over the all-edges prop. Start/end keys are
/// listed before left/right and so take precedence (left-to-right layout).
fn edge_lpa(props: &PropMap, keys: &[&str], fallback: LengthPercentageAuto) -> LengthPercentageAuto {
    for key in keys {
        if let Some(value) = props.get(key) {
            return parse_lpa(value);
        }
    }
    fallback
}

fn edge_lp(props: &PropMap, keys: &[&str]) -> LengthPercentage {
    for key in keys {
        if let Some(value) = props.get(key) {
            return parse_lp(value);
        }
    }
    zero()
}

fn parse_flex_direction(s: &str) -> FlexDirection {
    match s {
        "row" => FlexDirection::Row,
        "row-reverse" => FlexDirection::RowReverse,
        "column-reverse" => FlexDirection::ColumnReverse,
        _ => FlexDirection::Column,
    }
}

fn parse_flex_wrap(s: &str) -> FlexWrap {
    match s {
        "wrap" => FlexWrap::Wrap,
        "wrap-reverse" => FlexWrap::WrapReverse,
        _ => FlexWrap::NoWrap,
    }
}

fn parse_justify_content(s: &str) -> JustifyContent {
    match s {
        "flex-end" => JustifyContent::FlexEnd,
        "center" => JustifyContent::Center,
        "space-between" => JustifyContent::SpaceBetween,
        "space-around" => JustifyContent::SpaceAround,
        "space-evenly" => JustifyContent::SpaceEvenly,
        _ => JustifyContent::FlexStart,
    }
}

fn parse_align_items(s: &str) -> AlignItems {
    match s {
        "flex-start" => AlignItems::FlexStart,
        "flex-end" => AlignItems::FlexEnd,
        "center" => AlignItems::Center,
        "baseline" => AlignItems::Baseline,
        _ => AlignItems::Stretch,
    }
}

fn parse_align_self(s: &str) -> Option<AlignSelf> {
    match s {
        "auto" => None,
        other => Some(parse_align_items(other)),
    }
}

fn parse_align_content(s: &str) -> AlignContent {
    match s {
        "flex-end" => AlignContent::FlexEnd,
        "center" => AlignContent::Center,
        "stretch" => AlignContent::Stretch,
        "space-between" => AlignContent::SpaceBetween,
        "space-around" => AlignContent::SpaceAround,
        "space-evenly" => AlignContent::SpaceEvenly,
        _ => AlignContent::FlexStart,
    }
}

fn parse_overflow(s: &str) -> Overflow {
    match s {
        "hidden" => Overflow::Hidden,
        "scroll" => Overflow::Scroll,
        _ => Overflow::Visible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn style(props: Value) -> Style {
        style_from_props(&PropMap::from_value(props))
    }

    #[test]
    fn defaults_are_mobile_not_web() {
        let s = style(json!({}));
        assert_eq!(s.flex_direction, FlexDirection::Column);
        assert_eq!(s.flex_shrink, 0.0, "items must not shrink unless asked");
        assert_eq!(s.align_content, Some(AlignContent::FlexStart));
        assert_eq!(s.justify_content, Some(JustifyContent::FlexStart));
        assert_eq!(s.position, Position::Relative);
    }

    #[test]
    fn dimensions_parse_numbers_percent_and_auto() {
        let s = style(json!({ "width": 120, "height": "37.5%", "minWidth": "auto" }));
        assert_eq!(s.size.width, length(120.0));
        assert_eq!(s.size.height, percent(0.375));
        assert_eq!(s.min_size.width, Dimension::Auto, "string auto must parse as auto");
    }

    #[test]
    fn flex_expands_to_grow_and_zero_basis() {
        let s = style(json!({ "flex": 2 }));
        assert_eq!(s.flex_grow, 2.0);
        assert_eq!(s.flex_shrink, 0.0);
        assert_eq!(s.flex_basis, length(0.0));

        let s = style(json!({ "flex": -1 }));
        assert_eq!(s.flex_grow, 0.0);
        assert_eq!(s.flex_shrink, 1.0);
        assert_eq!(s.flex_basis, Dimension::Auto);
    }

    #[test]
    fn explicit_flex_parts_override_shorthand() {
        let s = style(json!({ "flex": 1, "flexShrink": 3, "flexBasis": 50 }));
        assert_eq!(s.flex_grow, 1.0);
        assert_eq!(s.flex_shrink, 3.0);
        assert_eq!(s.flex_basis, length(50.0));
    }

    #[test]
    fn edge_precedence_specific_beats_axis_beats_all() {
        let s = style(json!({ "margin": 10, "marginHorizontal": 20, "marginLeft": 30 }));
        assert_eq!(s.margin.left, length(30.0));
        assert_eq!(s.margin.right, length(20.0));
        assert_eq!(s.margin.top, length(10.0));
        assert_eq!(s.margin.bottom, length(10.0));
    }

    #[test]
    fn start_and_end_win_over_left_and_right() {
        let s = style(json!({ "left": 5, "start": 9, "right": 6, "end": 12 }));
        assert_eq!(s.inset.left, length(9.0));
        assert_eq!(s.inset.right, length(12.0));
    }

    #[test]
    fn absent_inset_is_auto_but_absent_margin_is_zero() {
        let s = style(json!({}));
        assert!(s.inset.left.is_auto(), "unset offsets must stay auto");
        assert_eq!(s.margin.left, length(0.0));
    }

    #[test]
    fn gap_axis_overrides_shorthand() {
        let s = style(json!({ "gap": 8, "rowGap": 2 }));
        assert_eq!(s.gap.width, length(8.0));
        assert_eq!(s.gap.height, length(2.0));
    }

    #[test]
    fn unknown_enum_strings_fall_back_to_defaults() {
        let s = style(json!({ "justifyContent": "diagonal", "flexDirection": "spiral" }));
        assert_eq!(s.justify_content, Some(JustifyContent::FlexStart));
        assert_eq!(s.flex_direction, FlexDirection::Column);
    }

    #[test]
    fn display_none_and_overflow_parse() {
        let s = style(json!({ "display": "none", "overflow": "hidden" }));
        assert_eq!(s.display, Display::None);
        assert_eq!(s.overflow.x, Overflow::Hidden);
    }
}
