//! Stable per-screen identity.
//!
//! Screens are matched across sections by an exact key, never fuzzily:
//!
//! - with a URL: lowercased pathname, plus `?tab=<value>` when the query
//!   carries a tab, plus `::` and the lowercased screen kind;
//! - without one: `folder::<relative-path-lowercased>`.
//!
//! A modal (or dialog) and a non-modal screen are incompatible even when
//! their keys collide; such a pair is reported added + removed, not changed.

use serde::Serialize;
use snapdiff_store::ScreenMeta;

use super::url::{pathname, query_param};

const MODAL_KINDS: [&str; 2] = ["modal", "dialog"];

/// Deterministic screen identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScreenIdentity {
    /// The exact match key.
    pub key: String,
    /// Whether the screen is a modal/dialog overlay.
    #[serde(skip)]
    pub modal: bool,
}

impl ScreenIdentity {
    /// Identity from screen metadata, falling back to the folder path when
    /// the capture recorded no URL.
    pub fn resolve(meta: Option<&ScreenMeta>, rel_path: &str) -> Self {
        let kind = meta
            .and_then(|m| m.kind.as_deref())
            .unwrap_or("")
            .to_lowercase();
        let modal = MODAL_KINDS.contains(&kind.as_str());

        let key = match meta.and_then(|m| m.url.as_deref()) {
            Some(url) => {
                let mut key = pathname(url).to_lowercase();
                if let Some(tab) = query_param(url, "tab") {
                    key.push_str("?tab=");
                    key.push_str(&tab.to_lowercase());
                }
                key.push_str("::");
                key.push_str(&kind);
                key
            }
            None => format!("folder::{}", rel_path.to_lowercase()),
        };

        ScreenIdentity { key, modal }
    }

    /// Whether two screens with equal keys may be compared as the same
    /// screen. Differing modal-ness makes them incompatible.
    pub fn compatible(&self, other: &ScreenIdentity) -> bool {
        self.modal == other.modal
    }
}

impl std::fmt::Display for ScreenIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(url: Option<&str>, kind: Option<&str>) -> ScreenMeta {
        ScreenMeta {
            url: url.map(String::from),
            kind: kind.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn url_identity_lowercases_path_and_kind() {
        let m = meta(Some("https://X.example/App/Home"), Some("Page"));
        let id = ScreenIdentity::resolve(Some(&m), "home");
        assert_eq!(id.key, "/app/home::page");
        assert!(!id.modal);
    }

    #[test]
    fn tab_parameter_is_part_of_identity() {
        let a = meta(Some("https://x/app?tab=Billing"), Some("tab"));
        let b = meta(Some("https://x/app?tab=usage"), Some("tab"));
        let id_a = ScreenIdentity::resolve(Some(&a), "app");
        let id_b = ScreenIdentity::resolve(Some(&b), "app");
        assert_eq!(id_a.key, "/app?tab=billing::tab");
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn folder_fallback_without_url() {
        let id = ScreenIdentity::resolve(None, "Nested/Login");
        assert_eq!(id.key, "folder::nested/login");
        let with_kind = meta(None, Some("modal"));
        let id = ScreenIdentity::resolve(Some(&with_kind), "Nested/Login");
        assert_eq!(id.key, "folder::nested/login");
        assert!(id.modal);
    }

    #[test]
    fn modal_and_page_are_incompatible() {
        let page = ScreenIdentity::resolve(Some(&meta(None, Some("page"))), "login");
        let modal = ScreenIdentity::resolve(Some(&meta(None, Some("modal"))), "login");
        assert_eq!(page.key, modal.key);
        assert!(!page.compatible(&modal));
        assert!(page.compatible(&page));
    }

    #[test]
    fn same_url_different_kind_differs() {
        let page = ScreenIdentity::resolve(Some(&meta(Some("https://x/login"), Some("page"))), "a");
        let modal =
            ScreenIdentity::resolve(Some(&meta(Some("https://x/login"), Some("modal"))), "b");
        assert_ne!(page.key, modal.key);
    }
}
