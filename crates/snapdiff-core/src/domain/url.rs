//! Tolerant URL helpers.
//!
//! Capture metadata carries URLs in whatever form the browser reported:
//! absolute, scheme-relative, or already path-only. These helpers never fail;
//! unparsable input degrades to the raw string.

/// Pathname of a URL: everything between the authority and the first `?`/`#`.
///
/// Always returns a leading `/` for non-empty paths.
pub fn pathname(url: &str) -> String {
    let rest = strip_origin(url);
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// First value of a query parameter, percent-decoding not applied.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let rest = strip_origin(url);
    let query_start = rest.find('?')? + 1;
    let query = &rest[query_start..];
    let query = &query[..query.find('#').unwrap_or(query.len())];
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == name {
            return Some(value.to_string());
        }
    }
    None
}

/// Drop `scheme://authority` (or `//authority`) if present.
fn strip_origin(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => match url.strip_prefix("//") {
            Some(rest) => rest,
            None => return url,
        },
    };
    match after_scheme.find('/') {
        Some(idx) => &after_scheme[idx..],
        // Authority only, e.g. `https://x.example`, root path.
        None => "",
    }
}
