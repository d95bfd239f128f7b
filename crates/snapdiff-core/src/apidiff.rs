//! API call diffing.
//!
//! Calls are grouped under an endpoint key (`"<METHOD> <pathname>"`). Keys on
//! only one side are reported as endpoint additions/removals; keys on both
//! sides pair their calls by index and report status and body changes.
//!
//! Body diffs are structural for JSON (depth ≤ 5, array indices collapsed to
//! `*` in the normalised path, values truncated for display) and
//! length-then-content for strings. HTTP bodies never go through the Myers
//! differ.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use snapdiff_store::ApiCall;

use crate::domain::url::pathname;

/// Recursion bound for JSON body diffs. Deeper differences are not reported.
pub const BODY_DIFF_MAX_DEPTH: usize = 5;

/// Rendered body values are cut at this many characters.
pub const BODY_VALUE_MAX_CHARS: usize = 100;

/// Endpoint key of a call.
pub fn endpoint_key(call: &ApiCall) -> String {
    format!("{} {}", call.method.to_uppercase(), pathname(&call.url))
}

/// Kind of one body delta.
///
/// The serialized `type` values are the Vietnamese markers the capture
/// toolchain's consumers already parse: `THÊM` (added), `XOÁ` (removed),
/// `SỬA` (edited).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyChangeKind {
    #[serde(rename = "THÊM")]
    Added,
    #[serde(rename = "XOÁ")]
    Removed,
    #[serde(rename = "SỬA")]
    Changed,
}

/// One difference inside a request/response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyDelta {
    /// Concrete path, e.g. `users[2].name`.
    pub path: String,
    /// Path with array indices collapsed, e.g. `users[*].name`.
    #[serde(rename = "normalizedPath")]
    pub normalized_path: String,
    #[serde(rename = "type")]
    pub kind: BodyChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One change between a pair of calls on the same endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CallChange {
    StatusChanged {
        index: usize,
        old: Option<u16>,
        new: Option<u16>,
    },
    RequestBodyChanged {
        index: usize,
        deltas: Vec<BodyDelta>,
    },
    ResponseBodyChanged {
        index: usize,
        deltas: Vec<BodyDelta>,
    },
}

/// An endpoint present on only one side.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointPresence {
    pub endpoint: String,
    pub count: usize,
    pub statuses: Vec<u16>,
}

/// Changes on an endpoint present on both sides.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointChange {
    pub endpoint: String,
    pub changes: Vec<CallChange>,
}

/// Full API comparison output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiDiff {
    pub added: Vec<EndpointPresence>,
    pub removed: Vec<EndpointPresence>,
    pub changed: Vec<EndpointChange>,
    /// Endpoint keys present on both sides.
    pub matched: usize,
    /// Distinct endpoint keys on each side.
    pub endpoints_a: usize,
    pub endpoints_b: usize,
    /// Call counts on each side.
    pub total_a: usize,
    pub total_b: usize,
}

impl ApiDiff {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.changed.is_empty()
    }

    /// Endpoints present on both sides with no status or body changes.
    pub fn unchanged_matched(&self) -> usize {
        self.matched.saturating_sub(self.changed.len())
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            (self.added.len(), "added"),
            (self.removed.len(), "removed"),
            (self.changed.len(), "changed"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, verb)| {
            let noun = if *count == 1 { "endpoint" } else { "endpoints" };
            format!("{count} {noun} {verb}")
        })
        .collect();
        if parts.is_empty() {
            "no API changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Diff two ordered call lists.
pub fn diff_api_calls(a: &[ApiCall], b: &[ApiCall]) -> ApiDiff {
    let groups_a = group_by_endpoint(a);
    let groups_b = group_by_endpoint(b);

    let mut diff = ApiDiff {
        total_a: a.len(),
        total_b: b.len(),
        endpoints_a: groups_a.len(),
        endpoints_b: groups_b.len(),
        ..Default::default()
    };

    for (endpoint, calls_a) in &groups_a {
        match groups_b.get(endpoint) {
            None => diff.removed.push(presence(endpoint, calls_a)),
            Some(calls_b) => {
                diff.matched += 1;
                let changes = compare_endpoint(calls_a, calls_b);
                if !changes.is_empty() {
                    diff.changed.push(EndpointChange {
                        endpoint: endpoint.clone(),
                        changes,
                    });
                }
            }
        }
    }
    for (endpoint, calls_b) in &groups_b {
        if !groups_a.contains_key(endpoint) {
            diff.added.push(presence(endpoint, calls_b));
        }
    }

    diff
}

fn group_by_endpoint(calls: &[ApiCall]) -> BTreeMap<String, Vec<&ApiCall>> {
    let mut groups: BTreeMap<String, Vec<&ApiCall>> = BTreeMap::new();
    for call in calls {
        groups.entry(endpoint_key(call)).or_default().push(call);
    }
    groups
}

fn presence(endpoint: &str, calls: &[&ApiCall]) -> EndpointPresence {
    let mut statuses: Vec<u16> = calls.iter().filter_map(|c| c.status).collect();
    statuses.sort_unstable();
    statuses.dedup();
    EndpointPresence {
        endpoint: endpoint.to_string(),
        count: calls.len(),
        statuses,
    }
}

/// Pair calls by index and collect per-pair changes.
fn compare_endpoint(calls_a: &[&ApiCall], calls_b: &[&ApiCall]) -> Vec<CallChange> {
    let mut changes = Vec::new();
    for (index, (call_a, call_b)) in calls_a.iter().zip(calls_b.iter()).enumerate() {
        if call_a.status != call_b.status {
            changes.push(CallChange::StatusChanged {
                index,
                old: call_a.status,
                new: call_b.status,
            });
        }
        let request_deltas = body_diff(
            call_a.request_body.as_ref(),
            call_b.request_body.as_ref(),
        );
        if !request_deltas.is_empty() {
            changes.push(CallChange::RequestBodyChanged {
                index,
                deltas: request_deltas,
            });
        }
        let response_deltas = body_diff(
            call_a.response_body.as_ref(),
            call_b.response_body.as_ref(),
        );
        if !response_deltas.is_empty() {
            changes.push(CallChange::ResponseBodyChanged {
                index,
                deltas: response_deltas,
            });
        }
    }
    changes
}

/// Structural diff of two optional bodies.
pub fn body_diff(old: Option<&Value>, new: Option<&Value>) -> Vec<BodyDelta> {
    match (old, new) {
        (None, None) => Vec::new(),
        (Some(old), Some(new)) => {
            let mut deltas = Vec::new();
            walk_body("", "", old, new, 0, &mut deltas);
            deltas
        }
        (Some(old), None) => vec![BodyDelta {
            path: String::new(),
            normalized_path: String::new(),
            kind: BodyChangeKind::Removed,
            old: None,
            new: None,
            value: Some(render(old)),
        }],
        (None, Some(new)) => vec![BodyDelta {
            path: String::new(),
            normalized_path: String::new(),
            kind: BodyChangeKind::Added,
            old: None,
            new: None,
            value: Some(render(new)),
        }],
    }
}

fn walk_body(
    path: &str,
    normalized: &str,
    old: &Value,
    new: &Value,
    depth: usize,
    out: &mut Vec<BodyDelta>,
) {
    if old == new {
        return;
    }
    // Beyond the depth bound there are no further differences, not an error.
    if depth >= BODY_DIFF_MAX_DEPTH {
        return;
    }
    match (old, new) {
        (Value::Object(obj_a), Value::Object(obj_b)) => {
            let mut keys: Vec<&String> = obj_a.keys().chain(obj_b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child_path = join_path(path, key);
                let child_norm = join_path(normalized, key);
                match (obj_a.get(key), obj_b.get(key)) {
                    (Some(va), Some(vb)) => {
                        walk_body(&child_path, &child_norm, va, vb, depth + 1, out)
                    }
                    (Some(va), None) => out.push(BodyDelta {
                        path: child_path,
                        normalized_path: child_norm,
                        kind: BodyChangeKind::Removed,
                        old: None,
                        new: None,
                        value: Some(render(va)),
                    }),
                    (None, Some(vb)) => out.push(BodyDelta {
                        path: child_path,
                        normalized_path: child_norm,
                        kind: BodyChangeKind::Added,
                        old: None,
                        new: None,
                        value: Some(render(vb)),
                    }),
                    (None, None) => unreachable!("key came from one of the maps"),
                }
            }
        }
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            let max_len = arr_a.len().max(arr_b.len());
            for i in 0..max_len {
                let child_path = format!("{path}[{i}]");
                let child_norm = format!("{normalized}[*]");
                match (arr_a.get(i), arr_b.get(i)) {
                    (Some(va), Some(vb)) => {
                        walk_body(&child_path, &child_norm, va, vb, depth + 1, out)
                    }
                    (Some(va), None) => out.push(BodyDelta {
                        path: child_path,
                        normalized_path: child_norm,
                        kind: BodyChangeKind::Removed,
                        old: None,
                        new: None,
                        value: Some(render(va)),
                    }),
                    (None, Some(vb)) => out.push(BodyDelta {
                        path: child_path,
                        normalized_path: child_norm,
                        kind: BodyChangeKind::Added,
                        old: None,
                        new: None,
                        value: Some(render(vb)),
                    }),
                    (None, None) => unreachable!("index below max_len"),
                }
            }
        }
        (Value::String(sa), Value::String(sb)) => {
            // Length first, then content; never a text diff.
            if sa.len() != sb.len() || sa != sb {
                out.push(changed(path, normalized, old, new));
            }
        }
        _ => out.push(changed(path, normalized, old, new)),
    }
}

fn changed(path: &str, normalized: &str, old: &Value, new: &Value) -> BodyDelta {
    BodyDelta {
        path: path.to_string(),
        normalized_path: normalized.to_string(),
        kind: BodyChangeKind::Changed,
        old: Some(render(old)),
        new: Some(render(new)),
        value: None,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Render a value for display, truncated to [`BODY_VALUE_MAX_CHARS`].
fn render(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= BODY_VALUE_MAX_CHARS {
        text
    } else {
        let cut: String = text.chars().take(BODY_VALUE_MAX_CHARS).collect();
        format!("{cut}…")
    }
}
