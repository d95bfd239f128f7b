//! Screen artefact types with reader unions.
//!
//! The capture layer has gone through several on-disk shapes. Each artefact
//! family accepts every historical key set on read and normalises to a single
//! in-memory type; writers always emit the newest shape.
//!
//! Families, new → legacy preference:
//! - meta: `meta.json` → `metadata.json`
//! - UI: `dom.json` → `screen.html` → `UI/snapshot.json`
//! - API: `apis.json` → `API/requests.json`
//! - preview: `screenshot.jpg` → `UI/screenshot.jpg`

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Screen metadata (`meta.json` / `metadata.json`).
///
/// Unknown fields are tolerated; all fields are optional because legacy
/// captures wrote partial records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenMeta {
    pub url: Option<String>,
    /// Screen kind: `page`, `tab`, `modal`, `dialog`, `ui`, ...
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "signatureHash")]
    pub signature_hash: Option<String>,
    pub title: Option<String>,
}

/// Pixel rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// One node of the structured DOM tree (`dom.json`).
///
/// `t` is a tag name or `"#text"`; text nodes carry their content in `text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomNode {
    /// Tag name, or `"#text"` for text nodes.
    pub t: String,
    /// Attribute map.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub a: BTreeMap<String, Value>,
    /// Children.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub c: Vec<DomNode>,
    /// Computed CSS properties.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub css: BTreeMap<String, String>,
    /// Layout rectangle, when the capture recorded one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    /// Text content for `#text` nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl DomNode {
    pub fn is_text(&self) -> bool {
        self.t == "#text"
    }

    /// String value of an attribute, if present and a string.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.a.get(name).and_then(Value::as_str)
    }
}

/// A normalised API call.
///
/// Readers accept the full form (`method`, `url`, `status`, `duration`, ...),
/// the compact form (`m`, `u`, `s`, `d`, `req`, `res`) and the legacy
/// `API/requests.json` keys; writers emit the full form only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawApiCall")]
pub struct ApiCall {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(rename = "reqHeaders", skip_serializing_if = "Option::is_none")]
    pub req_headers: Option<Value>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(rename = "resHeaders", skip_serializing_if = "Option::is_none")]
    pub res_headers: Option<Value>,
    #[serde(rename = "responseBody", skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawApiCall {
    #[serde(alias = "m")]
    method: Option<String>,
    #[serde(alias = "u")]
    url: Option<String>,
    #[serde(alias = "s", alias = "statusCode")]
    status: Option<Value>,
    #[serde(alias = "d", alias = "durationMs")]
    duration: Option<f64>,
    #[serde(rename = "reqHeaders", alias = "requestHeaders")]
    req_headers: Option<Value>,
    #[serde(rename = "requestBody", alias = "req", alias = "request")]
    request_body: Option<Value>,
    #[serde(rename = "resHeaders", alias = "responseHeaders")]
    res_headers: Option<Value>,
    #[serde(rename = "responseBody", alias = "res", alias = "response")]
    response_body: Option<Value>,
}

impl From<RawApiCall> for ApiCall {
    fn from(raw: RawApiCall) -> Self {
        // Legacy captures wrote status as a string.
        let status = raw.status.and_then(|v| match v {
            Value::Number(n) => n.as_u64().map(|n| n as u16),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        ApiCall {
            method: raw.method.unwrap_or_default().to_ascii_uppercase(),
            url: raw.url.unwrap_or_default(),
            status,
            duration_ms: raw.duration,
            req_headers: raw.req_headers,
            request_body: raw.request_body,
            res_headers: raw.res_headers,
            response_body: raw.response_body,
        }
    }
}

/// The UI artefact of a screen, whichever form the capture wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum UiArtifact {
    /// Structured DOM from `dom.json` or `UI/snapshot.json`.
    Dom(DomNode),
    /// Serialised DOM from `screen.html`.
    Html(String),
}

/// A screen directory discovered by the section walk.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenDir {
    /// `/`-separated path relative to the section root.
    pub rel_path: String,
    /// Absolute directory path.
    pub abs_path: PathBuf,
    pub has_ui: bool,
    pub has_api: bool,
    pub has_preview: bool,
}

impl ScreenDir {
    /// Screen retention score used for identity dedup: the richer capture wins.
    pub fn richness(&self) -> u32 {
        2 * u32::from(self.has_ui) + 2 * u32::from(self.has_api) + u32::from(self.has_preview)
    }

    /// Last path component, used as the display name.
    pub fn name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }
}
