//! Parallel CSS subtree walk.
//!
//! Runs in addition to the linearised element diff: when both sides carry
//! `dom.json`, matching nodes (children paired by index, depth ≤ 20) have
//! their computed-style maps and layout rectangles compared directly. This
//! catches styling changes on elements whose text and signature are
//! identical.

use serde::Serialize;
use snapdiff_store::DomNode;

use super::extract::{COLOR_PROPERTIES, MAX_WALK_DEPTH, SKIP_TAGS};
use crate::color::css_colors_equal;

/// Rough grouping of a CSS property for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CssCategory {
    Color,
    Typography,
    Spacing,
    Position,
    Border,
    Layout,
    Other,
}

/// One property difference at one node.
#[derive(Debug, Clone, Serialize)]
pub struct CssDelta {
    /// Slash path of tag names with sibling indexes, e.g. `body/div[2]/p`.
    pub node_path: String,
    pub property: String,
    pub old: String,
    pub new: String,
    pub category: CssCategory,
}

/// Output of the parallel walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CssWalkDiff {
    pub deltas: Vec<CssDelta>,
    pub nodes_compared: usize,
}

impl CssWalkDiff {
    pub fn has_changes(&self) -> bool {
        !self.deltas.is_empty()
    }

    /// Count of deltas in a category.
    pub fn count(&self, category: CssCategory) -> usize {
        self.deltas.iter().filter(|d| d.category == category).count()
    }
}

/// Compare two DOM trees' computed styles and layout rectangles.
pub fn diff_css_trees(a: &DomNode, b: &DomNode, color_tolerance: u8) -> CssWalkDiff {
    let mut diff = CssWalkDiff::default();
    let mut stack: Vec<(&DomNode, &DomNode, String, usize)> =
        vec![(a, b, a.t.to_lowercase(), 0)];

    while let Some((na, nb, path, depth)) = stack.pop() {
        if depth > MAX_WALK_DEPTH {
            continue;
        }
        let tag = na.t.to_lowercase();
        if na.is_text() || SKIP_TAGS.contains(&tag.as_str()) {
            continue;
        }
        diff.nodes_compared += 1;
        compare_node(&mut diff, na, nb, &path, color_tolerance);

        // Children pair by index; unpaired children belong to the element
        // diff, not the style walk.
        for (index, (ca, cb)) in na.c.iter().zip(nb.c.iter()).enumerate() {
            if ca.is_text() || cb.is_text() {
                continue;
            }
            let child_path = format!("{path}/{}[{index}]", ca.t.to_lowercase());
            stack.push((ca, cb, child_path, depth + 1));
        }
    }
    diff
}

fn compare_node(
    diff: &mut CssWalkDiff,
    a: &DomNode,
    b: &DomNode,
    path: &str,
    color_tolerance: u8,
) {
    for (property, old) in &a.css {
        let Some(new) = b.css.get(property) else {
            continue;
        };
        let property_lower = property.to_lowercase();
        let equal = if COLOR_PROPERTIES.contains(&property_lower.as_str()) {
            css_colors_equal(old, new, color_tolerance)
        } else {
            old == new
        };
        if !equal {
            diff.deltas.push(CssDelta {
                node_path: path.to_string(),
                property: property_lower.clone(),
                old: old.clone(),
                new: new.clone(),
                category: categorize(&property_lower),
            });
        }
    }

    if let (Some(ra), Some(rb)) = (a.rect, b.rect) {
        for (field, old, new, category) in [
            ("rect.x", ra.x, rb.x, CssCategory::Position),
            ("rect.y", ra.y, rb.y, CssCategory::Position),
            ("rect.w", ra.w, rb.w, CssCategory::Layout),
            ("rect.h", ra.h, rb.h, CssCategory::Layout),
        ] {
            if (old - new).abs() > super::POSITION_TOLERANCE_PX {
                diff.deltas.push(CssDelta {
                    node_path: path.to_string(),
                    property: field.to_string(),
                    old: format!("{old}"),
                    new: format!("{new}"),
                    category,
                });
            }
        }
    }
}

/// Category of a CSS property name.
pub fn categorize(property: &str) -> CssCategory {
    if property.contains("color") || property == "fill" || property == "stroke" {
        return CssCategory::Color;
    }
    if property.starts_with("font")
        || property.starts_with("text-")
        || property == "line-height"
        || property == "letter-spacing"
        || property == "word-spacing"
    {
        return CssCategory::Typography;
    }
    if property.starts_with("margin") || property.starts_with("padding") || property == "gap" {
        return CssCategory::Spacing;
    }
    if matches!(property, "top" | "left" | "right" | "bottom" | "position" | "transform") {
        return CssCategory::Position;
    }
    if property.starts_with("border")
        || property.starts_with("outline")
        || property == "box-shadow"
        || property == "border-radius"
    {
        return CssCategory::Border;
    }
    if matches!(
        property,
        "display" | "width" | "height" | "overflow" | "visibility" | "z-index"
    ) || property.starts_with("flex")
        || property.starts_with("grid")
    {
        return CssCategory::Layout;
    }
    CssCategory::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(value: serde_json::Value) -> DomNode {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn identical_trees_no_deltas() {
        let tree = node(serde_json::json!({
            "t": "body",
            "css": {"color": "#333", "margin-top": "8px"},
            "c": [{"t": "div", "css": {"display": "flex"}}]
        }));
        let diff = diff_css_trees(&tree, &tree, 5);
        assert!(!diff.has_changes());
        assert_eq!(diff.nodes_compared, 2);
    }

    #[test]
    fn style_change_on_identical_text_is_caught() {
        let a = node(serde_json::json!({
            "t": "body",
            "c": [{"t": "p", "css": {"font-size": "14px"},
                   "c": [{"t": "#text", "text": "same"}]}]
        }));
        let b = node(serde_json::json!({
            "t": "body",
            "c": [{"t": "p", "css": {"font-size": "16px"},
                   "c": [{"t": "#text", "text": "same"}]}]
        }));
        let diff = diff_css_trees(&a, &b, 5);
        assert_eq!(diff.deltas.len(), 1);
        let delta = &diff.deltas[0];
        assert_eq!(delta.property, "font-size");
        assert_eq!(delta.category, CssCategory::Typography);
        assert_eq!(delta.node_path, "body/p[0]");
    }

    #[test]
    fn color_deltas_respect_tolerance() {
        let a = node(serde_json::json!({"t": "div", "css": {"color": "#646464"}}));
        let near = node(serde_json::json!({"t": "div", "css": {"color": "#666666"}}));
        let far = node(serde_json::json!({"t": "div", "css": {"color": "#000000"}}));
        assert!(!diff_css_trees(&a, &near, 5).has_changes());
        let diff = diff_css_trees(&a, &far, 5);
        assert_eq!(diff.count(CssCategory::Color), 1);
    }

    #[test]
    fn rect_changes_split_position_and_layout() {
        let a = node(serde_json::json!({
            "t": "div", "rect": {"x": 0.0, "y": 0.0, "w": 100.0, "h": 50.0}
        }));
        let b = node(serde_json::json!({
            "t": "div", "rect": {"x": 8.0, "y": 0.0, "w": 140.0, "h": 50.0}
        }));
        let diff = diff_css_trees(&a, &b, 5);
        assert_eq!(diff.count(CssCategory::Position), 1);
        assert_eq!(diff.count(CssCategory::Layout), 1);
    }

    #[test]
    fn categorize_samples() {
        assert_eq!(categorize("background-color"), CssCategory::Color);
        assert_eq!(categorize("font-weight"), CssCategory::Typography);
        assert_eq!(categorize("padding-left"), CssCategory::Spacing);
        assert_eq!(categorize("top"), CssCategory::Position);
        assert_eq!(categorize("border-width"), CssCategory::Border);
        assert_eq!(categorize("display"), CssCategory::Layout);
        assert_eq!(categorize("cursor"), CssCategory::Other);
    }

    #[test]
    fn depth_cap_returns_no_further_differences() {
        let mut a = serde_json::json!({"t": "div", "css": {"display": "block"}});
        let mut b = serde_json::json!({"t": "div", "css": {"display": "flex"}});
        for _ in 0..(MAX_WALK_DEPTH + 3) {
            a = serde_json::json!({"t": "div", "c": [a]});
            b = serde_json::json!({"t": "div", "c": [b]});
        }
        // The differing node sits beyond the depth cap.
        let diff = diff_css_trees(&node(a), &node(b), 5);
        assert!(!diff.has_changes());
    }
}
