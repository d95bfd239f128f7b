//! Section comparison engine.
//!
//! Enumerates screens under two section roots (either may be the `main`
//! baseline), resolves stable identities, and reports per-screen status.
//! The top-level compare is *shallow*: artefact sizes plus signature hashes
//! decide changed/unchanged without opening the DOM. A caller drills into a
//! single screen pair with [`CompareEngine::compare_page`], which runs the
//! full DOM/CSS/API differ.
//!
//! Screen pairs are evaluated with a bounded fan-out (cap 5); item order is
//! deterministic regardless of completion order. Single-screen read failures
//! are absorbed; an unreadable artefact makes that screen UI-absent, it
//! never fails the aggregate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use snapdiff_store::{ProjectName, ProjectStore, ScreenDir, ScreenMeta, SectionRef, UiArtifact};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::apidiff::{diff_api_calls, ApiDiff};
use crate::color::DEFAULT_CHANNEL_TOLERANCE;
use crate::domain::{EngineError, Result, ScreenIdentity};
use crate::domdiff::{diff_css_trees, diff_elements, extract_elements, CssWalkDiff, DomDiff};

/// Concurrent screen comparisons per request. Higher only stresses the
/// filesystem.
pub const SCREEN_COMPARE_CONCURRENCY: usize = 5;

/// Status of one screen in a comparison, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenStatus {
    Changed,
    Added,
    Removed,
    Unchanged,
}

/// Facts about one side of a screen pair.
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub has_ui: bool,
    pub has_api: bool,
}

/// One row of a comparison result.
#[derive(Debug, Clone, Serialize)]
pub struct CompareItem {
    pub status: ScreenStatus,
    pub path: String,
    pub name: String,
    pub identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page1: Option<PageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page2: Option<PageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<PageDiff>,
}

/// Aggregate counts of a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompareSummary {
    pub total1: usize,
    pub total2: usize,
    pub matched: usize,
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub unchanged: usize,
}

/// Full comparison of two sections.
#[derive(Debug, Clone, Serialize)]
pub struct CompareResult {
    pub section1: String,
    pub section2: String,
    pub summary: CompareSummary,
    pub items: Vec<CompareItem>,
}

/// Deep diff of a single screen pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageDiff {
    pub has_changes: bool,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom: Option<DomDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<CssWalkDiff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiDiff>,
}

/// A screen with its resolved identity.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedScreen {
    pub dir: ScreenDir,
    pub meta: Option<ScreenMeta>,
    pub identity: ScreenIdentity,
}

/// The comparison engine. Cheap to clone; all state lives in the store.
#[derive(Debug, Clone)]
pub struct CompareEngine {
    store: ProjectStore,
}

impl CompareEngine {
    pub fn new(store: ProjectStore) -> Self {
        CompareEngine { store }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Shallow comparison of two sections (`main` allowed on either side).
    pub async fn compare_sections(
        &self,
        project: &str,
        section1: &str,
        section2: &str,
    ) -> Result<CompareResult> {
        let name = ProjectName::new(project)?;
        let ref1 = SectionRef::parse(section1)?;
        let ref2 = SectionRef::parse(section2)?;
        let root1 = self.store.require_section_root(&name, &ref1)?;
        let root2 = self.store.require_section_root(&name, &ref2)?;

        let screens1 = self.resolve_screens(&root1)?;
        let screens2 = self.resolve_screens(&root2)?;

        let mut items: Vec<CompareItem> = Vec::new();
        let mut pairs: Vec<(String, ResolvedScreen, ResolvedScreen)> = Vec::new();

        for (key, a) in &screens1 {
            match screens2.get(key) {
                Some(b) if a.identity.compatible(&b.identity) => {
                    pairs.push((key.clone(), a.clone(), b.clone()));
                }
                Some(b) => {
                    // Same key, incompatible modal-ness: never "changed".
                    items.push(single_item(a, ScreenStatus::Removed, Some("modal mismatch")));
                    items.push(single_item(b, ScreenStatus::Added, Some("modal mismatch")));
                }
                None => {
                    // A baseline is a superset of any one capture; screens it
                    // carries beyond the capture are not removals.
                    if !ref1.is_main() {
                        items.push(single_item(a, ScreenStatus::Removed, None));
                    }
                }
            }
        }
        for (key, b) in &screens2 {
            if !screens1.contains_key(key) {
                items.push(single_item(b, ScreenStatus::Added, None));
            }
        }

        let matched = pairs.len();
        let statuses = self.shallow_statuses(pairs).await;
        for (a, b, status) in statuses {
            items.push(CompareItem {
                status,
                path: b.dir.rel_path.clone(),
                name: b.dir.name().to_string(),
                identity: b.identity.key.clone(),
                page1: Some(page_info(&a)),
                page2: Some(page_info(&b)),
                match_info: None,
                diff: None,
            });
        }

        items.sort_by(|x, y| x.status.cmp(&y.status).then_with(|| x.path.cmp(&y.path)));

        let summary = CompareSummary {
            total1: screens1.len(),
            total2: screens2.len(),
            matched,
            added: items.iter().filter(|i| i.status == ScreenStatus::Added).count(),
            removed: items.iter().filter(|i| i.status == ScreenStatus::Removed).count(),
            changed: items.iter().filter(|i| i.status == ScreenStatus::Changed).count(),
            unchanged: items
                .iter()
                .filter(|i| i.status == ScreenStatus::Unchanged)
                .count(),
        };

        Ok(CompareResult {
            section1: ref1.to_string(),
            section2: ref2.to_string(),
            summary,
            items,
        })
    }

    /// Deep diff of one screen pair.
    pub async fn compare_page(
        &self,
        project: &str,
        section1: &str,
        section2: &str,
        path1: &str,
        path2: &str,
    ) -> Result<PageDiff> {
        let name = ProjectName::new(project)?;
        let ref1 = SectionRef::parse(section1)?;
        let ref2 = SectionRef::parse(section2)?;
        let root1 = self.store.require_section_root(&name, &ref1)?;
        let root2 = self.store.require_section_root(&name, &ref2)?;
        let dir1 = screen_dir(&root1, path1)?;
        let dir2 = screen_dir(&root2, path2)?;

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || deep_diff(&store, &dir1, &dir2))
            .await
            .map_err(|err| EngineError::Transient(format!("page compare task failed: {err}")))
    }

    /// Resolve every screen under a section root, deduplicating identity
    /// collisions in favour of the richer capture.
    pub(crate) fn resolve_screens(
        &self,
        root: &Path,
    ) -> Result<BTreeMap<String, ResolvedScreen>> {
        let mut map: BTreeMap<String, ResolvedScreen> = BTreeMap::new();
        for dir in self.store.walk_screens(root)? {
            let meta = self.store.read_meta(&dir.abs_path);
            let identity = ScreenIdentity::resolve(meta.as_ref(), &dir.rel_path);
            match map.get(&identity.key) {
                Some(existing) if existing.dir.richness() >= dir.richness() => {}
                _ => {
                    map.insert(identity.key.clone(), ResolvedScreen { dir, meta, identity });
                }
            }
        }
        Ok(map)
    }

    /// Evaluate matched pairs with a bounded fan-out. Completion order does
    /// not matter; the caller re-sorts.
    async fn shallow_statuses(
        &self,
        pairs: Vec<(String, ResolvedScreen, ResolvedScreen)>,
    ) -> Vec<(ResolvedScreen, ResolvedScreen, ScreenStatus)> {
        let semaphore = Arc::new(Semaphore::new(SCREEN_COMPARE_CONCURRENCY));
        let mut join_set = JoinSet::new();

        for (_, a, b) in pairs {
            let semaphore = Arc::clone(&semaphore);
            let store = self.store.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let status = {
                    let (a, b, store) = (a.clone(), b.clone(), store.clone());
                    tokio::task::spawn_blocking(move || shallow_pair(&store, &a, &b))
                        .await
                        .unwrap_or(ScreenStatus::Changed)
                };
                (a, b, status)
            });
        }

        let mut out = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => out.push(entry),
                Err(err) => warn!(%err, "screen comparison task failed"),
            }
        }
        out
    }
}

fn page_info(screen: &ResolvedScreen) -> PageInfo {
    PageInfo {
        path: screen.dir.rel_path.clone(),
        name: screen.dir.name().to_string(),
        url: screen.meta.as_ref().and_then(|m| m.url.clone()),
        kind: screen.meta.as_ref().and_then(|m| m.kind.clone()),
        has_ui: screen.dir.has_ui,
        has_api: screen.dir.has_api,
    }
}

fn single_item(
    screen: &ResolvedScreen,
    status: ScreenStatus,
    match_info: Option<&str>,
) -> CompareItem {
    let info = page_info(screen);
    let (page1, page2) = match status {
        ScreenStatus::Removed => (Some(info), None),
        _ => (None, Some(info)),
    };
    CompareItem {
        status,
        path: screen.dir.rel_path.clone(),
        name: screen.dir.name().to_string(),
        identity: screen.identity.key.clone(),
        page1,
        page2,
        match_info: match_info.map(String::from),
        diff: None,
    }
}

/// Shallow verdict for one matched pair: unchanged iff the UI artefact sizes
/// match and the signature hashes match. Captures without hashes fall back
/// to content fingerprints; screens without UI fall back to the API artefact.
fn shallow_pair(store: &ProjectStore, a: &ResolvedScreen, b: &ResolvedScreen) -> ScreenStatus {
    let len_a = store.ui_artifact_len(&a.dir.abs_path);
    let len_b = store.ui_artifact_len(&b.dir.abs_path);
    if len_a != len_b {
        return ScreenStatus::Changed;
    }

    if len_a.is_some() {
        let hash_a = a.meta.as_ref().and_then(|m| m.signature_hash.clone());
        let hash_b = b.meta.as_ref().and_then(|m| m.signature_hash.clone());
        let ui_equal = match (hash_a, hash_b) {
            (Some(ha), Some(hb)) => ha == hb,
            _ => fingerprint(store.ui_artifact_bytes(&a.dir.abs_path))
                == fingerprint(store.ui_artifact_bytes(&b.dir.abs_path)),
        };
        if !ui_equal {
            return ScreenStatus::Changed;
        }
    }

    // No UI on either side: decide by the API artefact.
    if len_a.is_none() {
        let api_a = store.read_apis(&a.dir.abs_path);
        let api_b = store.read_apis(&b.dir.abs_path);
        let api_equal = match (api_a, api_b) {
            (Some(ca), Some(cb)) => {
                serde_json::to_string(&ca).ok() == serde_json::to_string(&cb).ok()
            }
            (None, None) => true,
            _ => false,
        };
        if !api_equal {
            return ScreenStatus::Changed;
        }
    }

    ScreenStatus::Unchanged
}

fn fingerprint(bytes: Option<Vec<u8>>) -> Option<String> {
    bytes.map(|data| hex::encode(Sha256::digest(&data)))
}

fn screen_dir(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel = rel.trim_matches('/');
    if rel.is_empty() || rel.split('/').any(|part| part == ".." || part.is_empty()) {
        return Err(EngineError::Invalid(format!("bad screen path: {rel:?}")));
    }
    let dir = root.join(rel);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(EngineError::NotFound(format!("screen not found: {rel}")))
    }
}

/// Run the full DOM + CSS + API differ on one screen pair.
fn deep_diff(store: &ProjectStore, dir1: &Path, dir2: &Path) -> PageDiff {
    let ui1 = store.read_ui(dir1);
    let ui2 = store.read_ui(dir2);

    let dom = if ui1.is_some() || ui2.is_some() {
        let empty = Vec::new();
        let elements1 = ui1.as_ref().map(extract_elements).unwrap_or(empty.clone());
        let elements2 = ui2.as_ref().map(extract_elements).unwrap_or(empty);
        Some(diff_elements(
            &elements1,
            &elements2,
            DEFAULT_CHANNEL_TOLERANCE,
        ))
    } else {
        None
    };

    let css = match (&ui1, &ui2) {
        (Some(UiArtifact::Dom(root1)), Some(UiArtifact::Dom(root2))) => {
            Some(diff_css_trees(root1, root2, DEFAULT_CHANNEL_TOLERANCE))
        }
        _ => None,
    };

    let api1 = store.read_apis(dir1);
    let api2 = store.read_apis(dir2);
    let api = if api1.is_some() || api2.is_some() {
        Some(diff_api_calls(
            &api1.unwrap_or_default(),
            &api2.unwrap_or_default(),
        ))
    } else {
        None
    };

    let mut parts = Vec::new();
    if let Some(dom) = &dom {
        parts.push(dom.summary());
    }
    if let Some(css) = &css {
        if css.has_changes() {
            parts.push(format!("{} CSS deltas", css.deltas.len()));
        }
    }
    if let Some(api) = &api {
        parts.push(api.summary());
    }

    let has_changes = dom.as_ref().is_some_and(|d| d.has_changes())
        || css.as_ref().is_some_and(|c| c.has_changes())
        || api.as_ref().is_some_and(|a| a.has_changes());

    PageDiff {
        has_changes,
        summary: if parts.is_empty() {
            "no artefacts to compare".to_string()
        } else {
            parts.join("; ")
        },
        dom,
        css,
        api,
    }
}
