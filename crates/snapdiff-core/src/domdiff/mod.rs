//! DOM/CSS diffing.
//!
//! This module provides:
//! - element linearisation and content classification (`extract` submodule)
//! - a tolerant `screen.html` reader (`html` submodule)
//! - signature-based element diffing into five change bags
//! - a parallel CSS subtree walk for styling changes on identical text
//!   (`csswalk` submodule)

pub mod csswalk;
pub mod extract;
pub mod html;

use serde::Serialize;

use crate::color::css_colors_equal;
use crate::textdiff::{changed_words, diff_chars, InlineSpan};

pub use csswalk::{diff_css_trees, CssCategory, CssDelta, CssWalkDiff};
pub use extract::{
    classify, extract_elements, extract_from_dom, signature, ContentType, Element,
    MAX_WALK_DEPTH, SKIP_TAGS,
};

/// Position deltas at or below this many CSS pixels are noise.
pub const POSITION_TOLERANCE_PX: f64 = 1.0;

/// Summary of an element present on only one side.
#[derive(Debug, Clone, Serialize)]
pub struct ElementRef {
    pub signature: String,
    pub text: String,
    pub content_type: ContentType,
}

/// Same signature, different text.
#[derive(Debug, Clone, Serialize)]
pub struct ModifiedElement {
    pub signature: String,
    pub old_text: String,
    pub new_text: String,
    /// Char-level highlight of the text edit.
    pub inline: Vec<InlineSpanOut>,
    pub content_type: ContentType,
}

/// Serializable inline span.
#[derive(Debug, Clone, Serialize)]
pub struct InlineSpanOut {
    pub kind: &'static str,
    pub text: String,
}

impl From<InlineSpan> for InlineSpanOut {
    fn from(span: InlineSpan) -> Self {
        let kind = match span.kind {
            crate::textdiff::SpanKind::Equal => "equal",
            crate::textdiff::SpanKind::Added => "added",
            crate::textdiff::SpanKind::Removed => "removed",
        };
        InlineSpanOut {
            kind,
            text: span.text,
        }
    }
}

/// One moved/resized element.
#[derive(Debug, Clone, Serialize)]
pub struct PositionChange {
    pub signature: String,
    pub text: String,
    pub fields: Vec<PositionDelta>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionDelta {
    /// `x`, `y`, `w` or `h`.
    pub field: &'static str,
    pub old: f64,
    pub new: f64,
}

/// One colour property change on an element.
#[derive(Debug, Clone, Serialize)]
pub struct ColorChange {
    pub signature: String,
    pub property: String,
    pub old: String,
    pub new: String,
}

/// One non-colour style change on an element.
#[derive(Debug, Clone, Serialize)]
pub struct StyleChange {
    pub signature: String,
    pub property: String,
    pub old: String,
    pub new: String,
}

/// Per-content-type change tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

/// Change tallies grouped by what kind of content changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCategories {
    pub numbers: CategoryCounts,
    pub dates: CategoryCounts,
    pub times: CategoryCounts,
    pub labels: CategoryCounts,
    pub texts: CategoryCounts,
}

impl ContentCategories {
    fn bucket_mut(&mut self, content_type: ContentType) -> &mut CategoryCounts {
        match content_type {
            ContentType::Number => &mut self.numbers,
            ContentType::Date => &mut self.dates,
            ContentType::Time => &mut self.times,
            ContentType::Label => &mut self.labels,
            ContentType::Text | ContentType::None => &mut self.texts,
        }
    }
}

/// Full DOM comparison output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DomDiff {
    pub added: Vec<ElementRef>,
    pub removed: Vec<ElementRef>,
    pub modified: Vec<ModifiedElement>,
    pub position_changed: Vec<PositionChange>,
    pub color_changed: Vec<ColorChange>,
    pub style_changed: Vec<StyleChange>,
    pub categories: ContentCategories,
    pub total_a: usize,
    pub total_b: usize,
}

impl DomDiff {
    pub fn has_changes(&self) -> bool {
        self.changed_element_count() > 0
    }

    /// Count of elements touched by any change bag, for DOM scoring.
    pub fn changed_element_count(&self) -> usize {
        self.added.len()
            + self.removed.len()
            + self.modified.len()
            + self.position_changed.len()
            + self.color_changed.len()
            + self.style_changed.len()
    }

    /// Human summary, e.g. `2 added, 1 modified, 3 style`.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            (self.added.len(), "added"),
            (self.removed.len(), "removed"),
            (self.modified.len(), "modified"),
            (self.position_changed.len(), "position"),
            (self.color_changed.len(), "colour"),
            (self.style_changed.len(), "style"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect();
        if parts.is_empty() {
            "no DOM changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Diff two linearised element sequences.
///
/// Elements are grouped by signature; within a group, occurrences pair by
/// index. Text differences become `modified`; otherwise position, colour and
/// style are examined. Signatures on only one side become `added`/`removed`.
pub fn diff_elements(a: &[Element], b: &[Element], color_tolerance: u8) -> DomDiff {
    use std::collections::BTreeMap;

    let mut groups_a: BTreeMap<&str, Vec<&Element>> = BTreeMap::new();
    for element in a {
        groups_a.entry(&element.signature).or_default().push(element);
    }
    let mut groups_b: BTreeMap<&str, Vec<&Element>> = BTreeMap::new();
    for element in b {
        groups_b.entry(&element.signature).or_default().push(element);
    }

    let mut diff = DomDiff {
        total_a: a.len(),
        total_b: b.len(),
        ..Default::default()
    };

    for (signature, list_a) in &groups_a {
        match groups_b.get(signature) {
            None => {
                for element in list_a {
                    diff.categories.bucket_mut(element.content_type).removed += 1;
                    diff.removed.push(element_ref(element));
                }
            }
            Some(list_b) => {
                let pairs = list_a.len().min(list_b.len());
                for i in 0..pairs {
                    compare_pair(&mut diff, list_a[i], list_b[i], color_tolerance);
                }
                for element in &list_a[pairs..] {
                    diff.categories.bucket_mut(element.content_type).removed += 1;
                    diff.removed.push(element_ref(element));
                }
                for element in &list_b[pairs..] {
                    diff.categories.bucket_mut(element.content_type).added += 1;
                    diff.added.push(element_ref(element));
                }
            }
        }
    }
    for (signature, list_b) in &groups_b {
        if !groups_a.contains_key(signature) {
            for element in list_b {
                diff.categories.bucket_mut(element.content_type).added += 1;
                diff.added.push(element_ref(element));
            }
        }
    }

    diff
}

fn element_ref(element: &Element) -> ElementRef {
    ElementRef {
        signature: element.signature.clone(),
        text: element.normalized_text.clone(),
        content_type: element.content_type,
    }
}

fn compare_pair(diff: &mut DomDiff, a: &Element, b: &Element, color_tolerance: u8) {
    if a.normalized_text != b.normalized_text {
        let content_type = classify_change(&a.normalized_text, &b.normalized_text);
        diff.categories.bucket_mut(content_type).changed += 1;
        diff.modified.push(ModifiedElement {
            signature: a.signature.clone(),
            old_text: a.normalized_text.clone(),
            new_text: b.normalized_text.clone(),
            inline: diff_chars(&a.normalized_text, &b.normalized_text)
                .into_iter()
                .map(InlineSpanOut::from)
                .collect(),
            content_type,
        });
        return;
    }

    if let (Some(ra), Some(rb)) = (a.position, b.position) {
        let fields: Vec<PositionDelta> = [
            ("x", ra.x, rb.x),
            ("y", ra.y, rb.y),
            ("w", ra.w, rb.w),
            ("h", ra.h, rb.h),
        ]
        .iter()
        .filter(|(_, old, new)| (old - new).abs() > POSITION_TOLERANCE_PX)
        .map(|&(field, old, new)| PositionDelta { field, old, new })
        .collect();
        if !fields.is_empty() {
            diff.position_changed.push(PositionChange {
                signature: a.signature.clone(),
                text: a.normalized_text.clone(),
                fields,
            });
        }
    }

    let mut color_changes = Vec::new();
    for (property, old) in &a.colors {
        if let Some(new) = b.colors.get(property) {
            if !css_colors_equal(old, new, color_tolerance) {
                color_changes.push(ColorChange {
                    signature: a.signature.clone(),
                    property: property.clone(),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
        }
    }
    diff.color_changed.extend(color_changes);

    for (property, old) in &a.style {
        if let Some(new) = b.style.get(property) {
            if old != new {
                diff.style_changed.push(StyleChange {
                    signature: a.signature.clone(),
                    property: property.clone(),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
        }
    }
}

/// Classify an edit by what actually changed: when every changed token is a
/// number (or date, or time), the edit counts against that bucket even if
/// the surrounding text is prose.
fn classify_change(old_text: &str, new_text: &str) -> ContentType {
    let (removed, added) = changed_words(old_text, new_text);
    let mut kinds = removed.iter().chain(added.iter()).map(|token| classify(token));
    if let Some(first) = kinds.next() {
        if matches!(
            first,
            ContentType::Number | ContentType::Date | ContentType::Time
        ) && kinds.all(|kind| kind == first)
        {
            return first;
        }
    }
    match classify(new_text) {
        ContentType::None => ContentType::Text,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::DEFAULT_CHANNEL_TOLERANCE;
    use snapdiff_store::UiArtifact;

    fn elements(json: serde_json::Value) -> Vec<Element> {
        let node = serde_json::from_value(json).unwrap();
        extract_elements(&UiArtifact::Dom(node))
    }

    fn balance_screen(amount: &str) -> serde_json::Value {
        serde_json::json!({
            "t": "body",
            "c": [
                {"t": "h1", "c": [{"t": "#text", "text": "Account"}]},
                {"t": "div", "a": {"class": "balance"},
                 "c": [{"t": "#text", "text": format!("Balance: {amount}")}]}
            ]
        })
    }

    #[test]
    fn identical_screens_have_no_changes() {
        let a = elements(balance_screen("1,000"));
        let diff = diff_elements(&a, &a, DEFAULT_CHANNEL_TOLERANCE);
        assert!(!diff.has_changes());
        assert_eq!(diff.summary(), "no DOM changes");
    }

    #[test]
    fn numeric_text_change_counts_against_numbers() {
        let a = elements(balance_screen("1,000"));
        let b = elements(balance_screen("1,200"));
        let diff = diff_elements(&a, &b, DEFAULT_CHANNEL_TOLERANCE);
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.categories.numbers.changed, 1);
        assert_eq!(diff.categories.texts.changed, 0);
        assert_eq!(diff.added.len() + diff.removed.len(), 0);
    }

    #[test]
    fn added_and_removed_by_signature() {
        let a = elements(serde_json::json!({
            "t": "body",
            "c": [{"t": "div", "a": {"id": "old"}}]
        }));
        let b = elements(serde_json::json!({
            "t": "body",
            "c": [{"t": "div", "a": {"id": "new"}}]
        }));
        let diff = diff_elements(&a, &b, DEFAULT_CHANNEL_TOLERANCE);
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed[0].signature, "div#old");
        assert_eq!(diff.added[0].signature, "div#new");
    }

    #[test]
    fn duplicate_signatures_pair_by_index() {
        let a = elements(serde_json::json!({
            "t": "ul",
            "c": [
                {"t": "li", "c": [{"t": "#text", "text": "one"}]},
                {"t": "li", "c": [{"t": "#text", "text": "two"}]}
            ]
        }));
        let b = elements(serde_json::json!({
            "t": "ul",
            "c": [
                {"t": "li", "c": [{"t": "#text", "text": "one"}]},
                {"t": "li", "c": [{"t": "#text", "text": "two"}]},
                {"t": "li", "c": [{"t": "#text", "text": "three"}]}
            ]
        }));
        let diff = diff_elements(&a, &b, DEFAULT_CHANNEL_TOLERANCE);
        assert_eq!(diff.modified.len(), 0);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].text, "three");
    }

    #[test]
    fn position_shift_beyond_tolerance() {
        let a = elements(serde_json::json!({
            "t": "div", "a": {"id": "hero"},
            "rect": {"x": 10.0, "y": 20.0, "w": 300.0, "h": 80.0}
        }));
        let b = elements(serde_json::json!({
            "t": "div", "a": {"id": "hero"},
            "rect": {"x": 10.5, "y": 26.0, "w": 300.0, "h": 80.0}
        }));
        let diff = diff_elements(&a, &b, DEFAULT_CHANNEL_TOLERANCE);
        assert_eq!(diff.position_changed.len(), 1);
        let fields = &diff.position_changed[0].fields;
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "y");
    }

    #[test]
    fn colour_change_respects_threshold() {
        let near = elements(serde_json::json!({
            "t": "div", "css": {"color": "#646464"}
        }));
        let same_ish = elements(serde_json::json!({
            "t": "div", "css": {"color": "#676767"}
        }));
        let far = elements(serde_json::json!({
            "t": "div", "css": {"color": "#800000"}
        }));
        let diff = diff_elements(&near, &same_ish, DEFAULT_CHANNEL_TOLERANCE);
        assert!(diff.color_changed.is_empty());
        let diff = diff_elements(&near, &far, DEFAULT_CHANNEL_TOLERANCE);
        assert_eq!(diff.color_changed.len(), 1);
        assert_eq!(diff.color_changed[0].property, "color");
    }

    #[test]
    fn style_change_on_important_property() {
        let a = elements(serde_json::json!({
            "t": "button", "css": {"font-weight": "400", "display": "inline"}
        }));
        let b = elements(serde_json::json!({
            "t": "button", "css": {"font-weight": "700", "display": "inline"}
        }));
        let diff = diff_elements(&a, &b, DEFAULT_CHANNEL_TOLERANCE);
        assert_eq!(diff.style_changed.len(), 1);
        assert_eq!(diff.style_changed[0].property, "font-weight");
    }

    #[test]
    fn changed_element_count_feeds_scoring() {
        let a = elements(balance_screen("1,000"));
        let b = elements(balance_screen("1,200"));
        let diff = diff_elements(&a, &b, DEFAULT_CHANNEL_TOLERANCE);
        assert_eq!(diff.changed_element_count(), 1);
        assert_eq!(diff.total_a, 3);
        assert_eq!(diff.total_b, 3);
    }
}
