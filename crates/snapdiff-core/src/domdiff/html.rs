//! Tolerant HTML tag scanner for `screen.html` artefacts.
//!
//! Turns serialised markup into the same [`DomNode`] shape `dom.json`
//! carries, so the rest of the differ has a single input. This is a capture
//! reader, not a browser: it recovers from unclosed tags, ignores comments
//! and doctypes, and treats raw-text elements (`script`, `style`) as opaque.
//! Computed CSS and layout rectangles are only available from `dom.json`.

use std::collections::BTreeMap;

use serde_json::Value;
use snapdiff_store::DomNode;

/// Elements that never have children.
const VOID_TAGS: [&str; 12] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_TAGS: [&str; 2] = ["script", "style"];

/// Parse markup into a synthetic `#document` root.
pub fn parse_html(input: &str) -> DomNode {
    let bytes = input.as_bytes();
    let mut pos = 0usize;

    let mut root = DomNode {
        t: "#document".to_string(),
        ..Default::default()
    };
    // Stack of open elements; the finished tree is assembled on close.
    let mut stack: Vec<DomNode> = vec![];

    while pos < bytes.len() {
        if bytes[pos] == b'<' {
            if input[pos..].starts_with("<!--") {
                pos = match input[pos..].find("-->") {
                    Some(end) => pos + end + 3,
                    None => bytes.len(),
                };
            } else if input[pos..].starts_with("</") {
                let end = find_byte(bytes, pos, b'>').unwrap_or(bytes.len());
                let name = input[pos + 2..end.min(input.len())]
                    .trim()
                    .to_lowercase();
                close_element(&mut stack, &mut root, &name);
                pos = end.saturating_add(1);
            } else if input[pos..].starts_with("<!") {
                let end = find_byte(bytes, pos, b'>').unwrap_or(bytes.len());
                pos = end.saturating_add(1);
            } else if bytes
                .get(pos + 1)
                .is_some_and(|b| b.is_ascii_alphabetic())
            {
                pos = open_element(input, pos, &mut stack, &mut root);
            } else {
                // Stray `<`, treat as text.
                append_text(&mut stack, &mut root, "<");
                pos += 1;
            }
        } else {
            let end = find_byte(bytes, pos, b'<').unwrap_or(bytes.len());
            let text = &input[pos..end];
            if !text.trim().is_empty() {
                append_text(&mut stack, &mut root, &decode_entities(text));
            }
            pos = end;
        }
    }

    // Unclosed elements fold into their parents.
    while let Some(node) = stack.pop() {
        attach(&mut stack, &mut root, node);
    }
    root
}

fn open_element(input: &str, start: usize, stack: &mut Vec<DomNode>, root: &mut DomNode) -> usize {
    let bytes = input.as_bytes();
    let mut pos = start + 1;

    let name_start = pos;
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'-') {
        pos += 1;
    }
    let tag = input[name_start..pos].to_lowercase();

    let mut attrs = BTreeMap::new();
    let mut self_closing = false;
    while pos < bytes.len() && bytes[pos] != b'>' {
        if bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'>') {
            self_closing = true;
            pos += 1;
            break;
        }
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        pos = read_attr(input, pos, &mut attrs);
    }
    pos = pos.saturating_add(1); // consume '>'

    let node = DomNode {
        t: tag.clone(),
        a: attrs,
        ..Default::default()
    };

    if self_closing || VOID_TAGS.contains(&tag.as_str()) {
        attach(stack, root, node);
        return pos;
    }

    if RAW_TEXT_TAGS.contains(&tag.as_str()) {
        // Swallow raw content up to the close tag; the differ skips these
        // tags anyway.
        let close = format!("</{tag}");
        let end = (pos..input.len()).find(|&i| {
            input
                .get(i..i + close.len())
                .is_some_and(|s| s.eq_ignore_ascii_case(&close))
        });
        attach(stack, root, node);
        return match end {
            Some(end) => {
                let after = find_byte(bytes, end, b'>').unwrap_or(bytes.len());
                after.saturating_add(1)
            }
            None => bytes.len(),
        };
    }

    stack.push(node);
    pos
}

fn read_attr(input: &str, start: usize, attrs: &mut BTreeMap<String, Value>) -> usize {
    let bytes = input.as_bytes();
    let mut pos = start;

    let name_start = pos;
    while pos < bytes.len()
        && !bytes[pos].is_ascii_whitespace()
        && !matches!(bytes[pos], b'=' | b'>' | b'/')
    {
        pos += 1;
    }
    let name = input[name_start..pos].to_lowercase();
    if name.is_empty() {
        return pos + 1;
    }

    if bytes.get(pos) != Some(&b'=') {
        attrs.insert(name, Value::String(String::new()));
        return pos;
    }
    pos += 1;

    let value = if let Some(&quote) = bytes.get(pos).filter(|b| matches!(b, b'"' | b'\'')) {
        pos += 1;
        let value_start = pos;
        while pos < bytes.len() && bytes[pos] != quote {
            pos += 1;
        }
        let value = &input[value_start..pos];
        pos = pos.saturating_add(1);
        value.to_string()
    } else {
        let value_start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
            pos += 1;
        }
        input[value_start..pos].to_string()
    };

    attrs.insert(name, Value::String(decode_entities(&value)));
    pos
}

fn close_element(stack: &mut Vec<DomNode>, root: &mut DomNode, name: &str) {
    let Some(open_idx) = stack.iter().rposition(|n| n.t == name) else {
        // Close tag with no matching open; ignore.
        return;
    };
    while stack.len() > open_idx {
        let node = stack.pop().expect("stack length checked");
        attach(stack, root, node);
    }
}

fn attach(stack: &mut [DomNode], root: &mut DomNode, node: DomNode) {
    match stack.last_mut() {
        Some(parent) => parent.c.push(node),
        None => root.c.push(node),
    }
}

fn append_text(stack: &mut [DomNode], root: &mut DomNode, text: &str) {
    let node = DomNode {
        t: "#text".to_string(),
        text: Some(text.to_string()),
        ..Default::default()
    };
    attach(stack, root, node);
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == needle).map(|i| from + i)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() {
        let root = parse_html("<div class=\"card\"><p>Hello <b>world</b></p></div>");
        assert_eq!(root.c.len(), 1);
        let div = &root.c[0];
        assert_eq!(div.t, "div");
        assert_eq!(div.attr("class"), Some("card"));
        let p = &div.c[0];
        assert_eq!(p.t, "p");
        assert_eq!(p.c[0].text.as_deref(), Some("Hello "));
        assert_eq!(p.c[1].t, "b");
    }

    #[test]
    fn void_and_self_closing_tags() {
        let root = parse_html("<div><br><img src=\"x.png\"/><span/></div>");
        let div = &root.c[0];
        assert_eq!(div.c[0].t, "br");
        assert_eq!(div.c[1].attr("src"), Some("x.png"));
        assert_eq!(div.c[2].t, "span");
    }

    #[test]
    fn recovers_from_unclosed_tags() {
        let root = parse_html("<div><p>one<p>two</div><footer></footer>");
        assert_eq!(root.c.len(), 2);
        assert_eq!(root.c[1].t, "footer");
    }

    #[test]
    fn skips_comments_and_doctype() {
        let root = parse_html("<!DOCTYPE html><!-- note --><main>x</main>");
        assert_eq!(root.c.len(), 1);
        assert_eq!(root.c[0].t, "main");
    }

    #[test]
    fn script_content_is_opaque() {
        let root = parse_html("<script>if (a < b) { run(); }</script><div></div>");
        assert_eq!(root.c.len(), 2);
        assert_eq!(root.c[0].t, "script");
        assert!(root.c[0].c.is_empty());
        assert_eq!(root.c[1].t, "div");
    }

    #[test]
    fn decodes_common_entities() {
        let root = parse_html("<p>a &amp; b &lt;c&gt;</p>");
        assert_eq!(root.c[0].c[0].text.as_deref(), Some("a & b <c>"));
    }

    #[test]
    fn bare_and_unquoted_attributes() {
        let root = parse_html("<input disabled type=checkbox>");
        let input = &root.c[0];
        assert_eq!(input.attr("disabled"), Some(""));
        assert_eq!(input.attr("type"), Some("checkbox"));
    }
}
