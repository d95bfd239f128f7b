//! Filesystem gateway to the project tree.
//!
//! Layout:
//!
//! ```text
//! <root>/projects/<name>/
//!   flow.json
//!   main/<nestedPath>/
//!   sections/<timestamp>/<nestedPath>/
//!   tests/results.json
//!   .reports/reports.json + report-<uuid>.html [+ .pdf]
//! ```
//!
//! Write policy: sections are write-once by the capture layer; the only
//! mutable targets are `main/`, `flow.json` and the two index files, each
//! written atomically (temp file + rename) so concurrent readers see either
//! the old or the new bytes, never a torn state.
//!
//! Read policy: single-artefact corruption is absorbed: family readers log a
//! warning and return `None`, they never fail a bulk operation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::layout::{ProjectName, SectionId, SectionRef};
use crate::screen::{ApiCall, DomNode, ScreenDir, ScreenMeta, UiArtifact};

/// Environment variable overriding the storage root.
pub const STORAGE_PATH_ENV: &str = "STORAGE_PATH";

const DEFAULT_STORAGE_ROOT: &str = "./storage";

/// Artefact directories that are never themselves screens.
const ARTIFACT_DIRS: [&str; 2] = ["UI", "API"];

/// Files whose presence marks a directory as a screen.
const SCREEN_MARKERS: [&str; 5] = [
    "meta.json",
    "metadata.json",
    "dom.json",
    "screen.html",
    "apis.json",
];

/// One-writer-per-path gateway to a storage root.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectStore { root: root.into() }
    }

    /// Root from `STORAGE_PATH`, defaulting to `./storage`.
    pub fn from_env() -> Self {
        let root = std::env::var(STORAGE_PATH_ENV).unwrap_or_else(|_| DEFAULT_STORAGE_ROOT.into());
        ProjectStore::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── project tree paths ─────────────────────────────────────────────

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    pub fn project_dir(&self, project: &ProjectName) -> PathBuf {
        self.projects_dir().join(project.as_str())
    }

    pub fn flow_path(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join("flow.json")
    }

    pub fn main_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join("main")
    }

    pub fn sections_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join("sections")
    }

    pub fn section_dir(&self, project: &ProjectName, section: &SectionId) -> PathBuf {
        self.sections_dir(project).join(section.as_str())
    }

    /// Root directory of `main` or a section.
    pub fn section_root(&self, project: &ProjectName, section: &SectionRef) -> PathBuf {
        match section {
            SectionRef::Main => self.main_dir(project),
            SectionRef::Section(id) => self.section_dir(project, id),
        }
    }

    /// Per-section flow graph written by the capture layer.
    pub fn section_flow_path(&self, project: &ProjectName, section: &SectionRef) -> PathBuf {
        match section {
            SectionRef::Main => self.flow_path(project),
            SectionRef::Section(id) => self.section_dir(project, id).join("flow.json"),
        }
    }

    pub fn tests_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join("tests")
    }

    pub fn results_path(&self, project: &ProjectName) -> PathBuf {
        self.tests_dir(project).join("results.json")
    }

    pub fn reports_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(".reports")
    }

    pub fn reports_index_path(&self, project: &ProjectName) -> PathBuf {
        self.reports_dir(project).join("reports.json")
    }

    // ── projects ───────────────────────────────────────────────────────

    pub fn project_exists(&self, project: &ProjectName) -> bool {
        self.project_dir(project).is_dir()
    }

    /// Fail with `ProjectNotFound` unless the project directory exists.
    pub fn require_project(&self, project: &ProjectName) -> Result<()> {
        if self.project_exists(project) {
            Ok(())
        } else {
            Err(StoreError::ProjectNotFound(project.to_string()))
        }
    }

    pub fn list_projects(&self) -> Result<Vec<String>> {
        let dir = self.projects_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn delete_project(&self, project: &ProjectName) -> Result<()> {
        self.require_project(project)?;
        fs::remove_dir_all(self.project_dir(project))?;
        Ok(())
    }

    // ── sections ───────────────────────────────────────────────────────

    pub fn section_exists(&self, project: &ProjectName, section: &SectionRef) -> bool {
        self.section_root(project, section).is_dir()
    }

    /// Resolve the root of a section (or `main`), failing with
    /// `SectionNotFound` if the directory is missing.
    pub fn require_section_root(
        &self,
        project: &ProjectName,
        section: &SectionRef,
    ) -> Result<PathBuf> {
        let root = self.section_root(project, section);
        if root.is_dir() {
            Ok(root)
        } else {
            Err(StoreError::SectionNotFound {
                project: project.to_string(),
                section: section.to_string(),
            })
        }
    }

    /// Chronologically sorted section ids. Directories with unparsable names
    /// are skipped with a warning.
    pub fn list_sections(&self, project: &ProjectName) -> Result<Vec<SectionId>> {
        let dir = self.sections_dir(project);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut sections = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match SectionId::parse(&name) {
                Ok(id) => sections.push(id),
                Err(_) => warn!(project = %project, dir = %name, "skipping non-section directory"),
            }
        }
        sections.sort();
        Ok(sections)
    }

    pub fn delete_section(&self, project: &ProjectName, section: &SectionId) -> Result<()> {
        let dir = self.section_dir(project, section);
        if !dir.is_dir() {
            return Err(StoreError::SectionNotFound {
                project: project.to_string(),
                section: section.to_string(),
            });
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    // ── screen enumeration ─────────────────────────────────────────────

    /// Walk every subdirectory of a section root and collect the ones that
    /// are screens (contain `UI/` or any screen marker file). Screens may
    /// nest, so the walk continues below discovered screens. Results are
    /// sorted by relative path.
    pub fn walk_screens(&self, section_root: &Path) -> Result<Vec<ScreenDir>> {
        let mut screens = Vec::new();
        let mut queue: Vec<(PathBuf, String)> = vec![(section_root.to_path_buf(), String::new())];

        while let Some((dir, rel)) = queue.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(dir = %dir.display(), %err, "unreadable directory during screen walk");
                    continue;
                }
            };
            for entry in entries {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || ARTIFACT_DIRS.contains(&name.as_str()) {
                    continue;
                }
                let abs = entry.path();
                let child_rel = if rel.is_empty() {
                    name.clone()
                } else {
                    format!("{rel}/{name}")
                };
                if let Some(screen) = self.inspect_screen_dir(&abs, &child_rel) {
                    screens.push(screen);
                }
                queue.push((abs, child_rel));
            }
        }

        screens.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Ok(screens)
    }

    fn inspect_screen_dir(&self, abs: &Path, rel: &str) -> Option<ScreenDir> {
        let has_marker = SCREEN_MARKERS.iter().any(|m| abs.join(m).is_file());
        let has_ui_dir = abs.join("UI").is_dir();
        if !has_marker && !has_ui_dir {
            return None;
        }
        let has_ui = self.ui_artifact_path(abs).is_some();
        let has_api = self.api_artifact_path(abs).is_some();
        let has_preview = self.preview_path(abs).is_some();
        Some(ScreenDir {
            rel_path: rel.to_string(),
            abs_path: abs.to_path_buf(),
            has_ui,
            has_api,
            has_preview,
        })
    }

    // ── artefact family readers (new → legacy) ─────────────────────────

    pub fn read_meta(&self, screen_dir: &Path) -> Option<ScreenMeta> {
        for name in ["meta.json", "metadata.json"] {
            let path = screen_dir.join(name);
            if path.is_file() {
                if let Some(meta) = read_json_lenient(&path) {
                    return Some(meta);
                }
            }
        }
        None
    }

    /// Path of the UI artefact this screen would be read from, preference
    /// order `dom.json` → `screen.html` → `UI/snapshot.json`.
    pub fn ui_artifact_path(&self, screen_dir: &Path) -> Option<PathBuf> {
        ["dom.json", "screen.html", "UI/snapshot.json"]
            .iter()
            .map(|name| screen_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Size in bytes of the preferred UI artefact.
    pub fn ui_artifact_len(&self, screen_dir: &Path) -> Option<u64> {
        let path = self.ui_artifact_path(screen_dir)?;
        fs::metadata(&path).ok().map(|m| m.len())
    }

    /// Raw bytes of the preferred UI artefact, for fingerprinting.
    pub fn ui_artifact_bytes(&self, screen_dir: &Path) -> Option<Vec<u8>> {
        let path = self.ui_artifact_path(screen_dir)?;
        fs::read(&path).ok()
    }

    pub fn read_ui(&self, screen_dir: &Path) -> Option<UiArtifact> {
        let path = self.ui_artifact_path(screen_dir)?;
        if path.extension().is_some_and(|ext| ext == "html") {
            return fs::read_to_string(&path).ok().map(UiArtifact::Html);
        }
        read_json_lenient::<DomNode>(&path).map(UiArtifact::Dom)
    }

    fn api_artifact_path(&self, screen_dir: &Path) -> Option<PathBuf> {
        ["apis.json", "API/requests.json"]
            .iter()
            .map(|name| screen_dir.join(name))
            .find(|path| path.is_file())
    }

    pub fn read_apis(&self, screen_dir: &Path) -> Option<Vec<ApiCall>> {
        let path = self.api_artifact_path(screen_dir)?;
        read_json_lenient(&path)
    }

    pub fn preview_path(&self, screen_dir: &Path) -> Option<PathBuf> {
        ["screenshot.jpg", "UI/screenshot.jpg"]
            .iter()
            .map(|name| screen_dir.join(name))
            .find(|path| path.is_file())
    }

    // ── generic filesystem helpers ─────────────────────────────────────

    /// Read a JSON file into `T`. Missing file → `Ok(None)`; any other
    /// failure propagates.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write JSON atomically: temp file in the target directory, then rename.
    pub fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        let bytes = serde_json::to_vec_pretty(value)?;
        tmp.write_all(&bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Recursive byte count. Missing path counts as 0. The result is
    /// computed per call; nothing is cached.
    pub fn dir_size(&self, path: &Path) -> Result<u64> {
        if path.is_file() {
            return Ok(fs::metadata(path)?.len());
        }
        if !path.is_dir() {
            return Ok(0);
        }
        let mut total = 0u64;
        let mut queue = vec![path.to_path_buf()];
        while let Some(dir) = queue.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let ty = entry.file_type()?;
                if ty.is_dir() {
                    queue.push(entry.path());
                } else if ty.is_file() {
                    total += entry.metadata()?.len();
                }
            }
        }
        Ok(total)
    }

    /// Copy a directory tree. The destination is created if absent.
    pub fn copy_dir_recursive(&self, src: &Path, dst: &Path) -> Result<()> {
        fs::create_dir_all(dst)?;
        let mut queue = vec![(src.to_path_buf(), dst.to_path_buf())];
        while let Some((from, to)) = queue.pop() {
            for entry in fs::read_dir(&from)? {
                let entry = entry?;
                let target = to.join(entry.file_name());
                let ty = entry.file_type()?;
                if ty.is_dir() {
                    fs::create_dir_all(&target)?;
                    queue.push((entry.path(), target));
                } else if ty.is_file() {
                    fs::copy(entry.path(), &target)?;
                }
            }
        }
        Ok(())
    }

    /// Remove a directory tree if it exists.
    pub fn remove_dir_if_exists(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Read and parse JSON, absorbing every failure into `None` with a warning.
/// Bulk operations treat a corrupt artefact as an absent one.
fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable artefact, treating as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, ProjectStore, ProjectName) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        let project = ProjectName::new("demo").unwrap();
        (dir, store, project)
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn lists_sections_sorted_and_skips_noise() {
        let (_dir, store, project) = store();
        let sections = store.sections_dir(&project);
        fs::create_dir_all(sections.join("2024-02-01T00-00-00-000Z")).unwrap();
        fs::create_dir_all(sections.join("2024-01-01T00-00-00-000Z")).unwrap();
        fs::create_dir_all(sections.join("not-a-section")).unwrap();

        let listed = store.list_sections(&project).unwrap();
        let raw: Vec<&str> = listed.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            raw,
            vec!["2024-01-01T00-00-00-000Z", "2024-02-01T00-00-00-000Z"]
        );
    }

    #[test]
    fn walk_finds_nested_screens() {
        let (_dir, store, project) = store();
        let root = store.main_dir(&project);
        write(&root.join("home/meta.json"), r#"{"url":"https://x/home"}"#);
        write(&root.join("home/dom.json"), r#"{"t":"body"}"#);
        write(
            &root.join("home/settings/meta.json"),
            r#"{"url":"https://x/settings"}"#,
        );
        // Artefact dirs are not screens.
        write(&root.join("home/UI/snapshot.json"), r#"{"t":"body"}"#);
        // A bare directory is not a screen.
        fs::create_dir_all(root.join("empty")).unwrap();

        let screens = store.walk_screens(&root).unwrap();
        let paths: Vec<&str> = screens.iter().map(|s| s.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["home", "home/settings"]);
        assert!(screens[0].has_ui);
        assert!(!screens[1].has_ui);
    }

    #[test]
    fn ui_reader_prefers_dom_json() {
        let (_dir, store, project) = store();
        let screen = store.main_dir(&project).join("home");
        write(&screen.join("screen.html"), "<body></body>");
        write(&screen.join("dom.json"), r#"{"t":"body"}"#);

        match store.read_ui(&screen) {
            Some(UiArtifact::Dom(node)) => assert_eq!(node.t, "body"),
            other => panic!("expected dom artefact, got {other:?}"),
        }
    }

    #[test]
    fn ui_reader_falls_back_to_html_then_snapshot() {
        let (_dir, store, project) = store();
        let screen = store.main_dir(&project).join("home");
        write(&screen.join("UI/snapshot.json"), r#"{"t":"html"}"#);
        match store.read_ui(&screen) {
            Some(UiArtifact::Dom(node)) => assert_eq!(node.t, "html"),
            other => panic!("expected snapshot artefact, got {other:?}"),
        }

        write(&screen.join("screen.html"), "<body>hi</body>");
        match store.read_ui(&screen) {
            Some(UiArtifact::Html(html)) => assert!(html.contains("hi")),
            other => panic!("expected html artefact, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_artefact_is_absorbed() {
        let (_dir, store, project) = store();
        let screen = store.main_dir(&project).join("home");
        write(&screen.join("meta.json"), "{not json");
        assert!(store.read_meta(&screen).is_none());
    }

    #[test]
    fn atomic_write_then_read() {
        let (_dir, store, project) = store();
        let path = store.flow_path(&project);
        store
            .write_json_atomic(&path, &json!({"domain": "x", "nodes": [], "edges": []}))
            .unwrap();
        let value: serde_json::Value = store.read_json(&path).unwrap().unwrap();
        assert_eq!(value["domain"], "x");
    }

    #[test]
    fn dir_size_counts_all_files() {
        let (_dir, store, project) = store();
        let root = store.main_dir(&project);
        write(&root.join("a/one.txt"), "12345");
        write(&root.join("a/b/two.txt"), "123");
        assert_eq!(store.dir_size(&root).unwrap(), 8);
        assert_eq!(store.dir_size(&root.join("missing")).unwrap(), 0);
    }

    #[test]
    fn copy_dir_recursive_copies_tree() {
        let (_dir, store, project) = store();
        let src = store.main_dir(&project).join("home");
        write(&src.join("meta.json"), r#"{"url":"https://x/home"}"#);
        write(&src.join("UI/screenshot.jpg"), "jpegbytes");

        let dst = store.main_dir(&project).join("copy");
        store.copy_dir_recursive(&src, &dst).unwrap();
        assert!(dst.join("meta.json").is_file());
        assert!(dst.join("UI/screenshot.jpg").is_file());
    }
}
