//! DOM linearisation and content classification.
//!
//! The differ does not walk trees twice: the UI artefact is flattened once
//! into a sequence of [`Element`]s in document order, each carrying the text,
//! style and identity facts the comparison needs.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use snapdiff_store::{DomNode, Rect, UiArtifact};

use super::html::parse_html;

/// Non-visual tags skipped during extraction, subtrees included.
pub const SKIP_TAGS: [&str; 6] = ["script", "style", "meta", "link", "noscript", "template"];

/// Depth bound for DOM walks. Nodes deeper than this yield no elements; the
/// walk reports what it saw, it does not error.
pub const MAX_WALK_DEPTH: usize = 20;

/// Longest text still considered a label.
const LABEL_MAX_CHARS: usize = 24;

/// CSS properties treated as colours.
pub const COLOR_PROPERTIES: [&str; 11] = [
    "color",
    "background-color",
    "border-color",
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
    "outline-color",
    "text-decoration-color",
    "fill",
    "stroke",
];

/// What kind of content a text value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Number,
    Date,
    Time,
    Label,
    Text,
    #[serde(rename = "null")]
    None,
}

/// One linearised element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub normalized_text: String,
    pub position: Option<Rect>,
    /// Colour-valued CSS properties.
    pub colors: BTreeMap<String, String>,
    /// Non-colour style properties the differ considers important.
    pub style: BTreeMap<String, String>,
    pub signature: String,
    pub class_name: String,
    pub id: String,
    pub data_test_id: String,
    pub content_type: ContentType,
}

/// Flatten a UI artefact into elements in document order.
pub fn extract_elements(ui: &UiArtifact) -> Vec<Element> {
    match ui {
        UiArtifact::Dom(root) => extract_from_dom(root),
        UiArtifact::Html(html) => extract_from_dom(&parse_html(html)),
    }
}

/// Flatten a structured DOM tree.
pub fn extract_from_dom(root: &DomNode) -> Vec<Element> {
    let mut out = Vec::new();
    let mut stack: Vec<(&DomNode, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        if node.is_text() || depth > MAX_WALK_DEPTH {
            continue;
        }
        let tag = node.t.to_lowercase();
        if SKIP_TAGS.contains(&tag.as_str()) {
            continue;
        }
        // Synthetic roots produce no element themselves.
        if tag != "#document" {
            out.push(build_element(node, &tag));
        }
        for child in node.c.iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    out
}

fn build_element(node: &DomNode, tag: &str) -> Element {
    let mut attrs = BTreeMap::new();
    for (key, value) in &node.a {
        let rendered = match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        };
        attrs.insert(key.clone(), rendered);
    }

    let text = direct_text(node);
    let normalized_text = collapse_whitespace(&text);
    let id = attrs.get("id").cloned().unwrap_or_default();
    let class_name = attrs.get("class").cloned().unwrap_or_default();
    let data_test_id = attrs.get("data-testid").cloned().unwrap_or_default();
    let signature = signature(tag, &id, &data_test_id, &class_name);

    let mut colors = BTreeMap::new();
    let mut style = BTreeMap::new();
    for (prop, value) in &node.css {
        let prop_lower = prop.to_lowercase();
        if COLOR_PROPERTIES.contains(&prop_lower.as_str()) {
            colors.insert(prop_lower, value.clone());
        } else if is_important_style(&prop_lower) {
            style.insert(prop_lower, value.clone());
        }
    }

    let content_type = classify(&normalized_text);
    Element {
        tag: tag.to_string(),
        attrs,
        text,
        normalized_text,
        position: node.rect,
        colors,
        style,
        signature,
        class_name,
        id,
        data_test_id,
        content_type,
    }
}

/// Concatenated text of the node's direct `#text` children.
fn direct_text(node: &DomNode) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for child in &node.c {
        if child.is_text() {
            if let Some(text) = child.text.as_deref() {
                parts.push(text);
            }
        }
    }
    parts.join(" ").trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `tag[#id][[data-testid=…]][.firstThreeSortedClasses]`
pub fn signature(tag: &str, id: &str, data_test_id: &str, class_name: &str) -> String {
    let mut sig = tag.to_lowercase();
    if !id.is_empty() {
        sig.push('#');
        sig.push_str(id);
    }
    if !data_test_id.is_empty() {
        sig.push_str("[data-testid=");
        sig.push_str(data_test_id);
        sig.push(']');
    }
    let mut classes: Vec<&str> = class_name.split_whitespace().collect();
    classes.sort_unstable();
    classes.dedup();
    for class in classes.into_iter().take(3) {
        sig.push('.');
        sig.push_str(class);
    }
    sig
}

/// Whether a non-colour property participates in style comparison.
pub fn is_important_style(prop: &str) -> bool {
    prop.starts_with("font-")
        || prop.starts_with("border-")
        || matches!(
            prop,
            "display"
                | "opacity"
                | "z-index"
                | "box-shadow"
                | "transform"
                | "visibility"
                | "text-align"
                | "line-height"
        )
}

/// Classify a text value.
pub fn classify(text: &str) -> ContentType {
    if text.is_empty() {
        return ContentType::None;
    }
    if number_re().is_match(text) {
        return ContentType::Number;
    }
    if date_re().is_match(text) {
        return ContentType::Date;
    }
    if time_re().is_match(text) {
        return ContentType::Time;
    }
    if !text.contains(char::is_whitespace) && text.chars().count() <= LABEL_MAX_CHARS {
        return ContentType::Label;
    }
    ContentType::Text
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?[$€£¥]?\d{1,3}(,\d{3})*(\.\d+)?\s?%?$|^[+-]?[$€£¥]?\d+(\.\d+)?\s?%?$")
            .expect("number regex")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2})?(\.\d+)?Z?)?$|^\d{1,2}[/.]\d{1,2}[/.]\d{2,4}$")
            .expect("date regex")
    })
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?(\s?[APap][Mm])?$").expect("time regex"))
}
