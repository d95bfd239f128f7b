//! Merge engine: promote captured screens from a section into the `main`
//! baseline and reconcile the project flow graph.
//!
//! The merge set is explicit and finite (folder ids from the section's
//! flow) and is never derived by walking edges, which may form cycles.
//! Per-folder copies are transactional (remove target, then copy); the flow
//! graph is rewritten once, after all copies, via rename-from-temp. One
//! merge per project at a time; concurrent attempts are rejected, not
//! queued. A crash between copy and flow write leaves main with new files
//! and the old flow; re-running the merge is idempotent and heals it.

use std::path::PathBuf;

use serde::Serialize;
use snapdiff_store::{
    FlowEdge, FlowGraph, FlowNode, ProjectLocks, ProjectName, ProjectStore, SectionId, SectionRef,
    StoreError,
};
use thiserror::Error;
use tracing::{info, warn};

/// Merge engine errors. Per-folder failures are not errors; they travel
/// inside [`MergeReport`].
#[derive(Debug, Error)]
pub enum MergeError {
    /// Project or section missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Empty merge set, bad folder id, malformed names.
    #[error("invalid merge request: {0}")]
    Invalid(String),

    /// Another merge holds this project's lock.
    #[error("merge already in progress for project {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, MergeError>;

/// What the merge did (or would do) to one folder's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeAction {
    Create,
    Overwrite,
}

/// Outcome for one requested folder.
#[derive(Debug, Clone, Serialize)]
pub struct FolderOutcome {
    pub folder: String,
    /// Relative screen path the folder resolved to.
    pub path: String,
    pub action: MergeAction,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full merge report. `success` is true only when every folder succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub success: bool,
    pub folders: Vec<FolderOutcome>,
    /// Whether the source section was deleted afterwards.
    pub section_deleted: bool,
}

/// One row of a merge preview.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewEntry {
    pub folder: String,
    pub path: String,
    pub action: MergeAction,
    pub source_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_size: Option<u64>,
}

/// The merge engine. Holds the per-project lock registry.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    store: ProjectStore,
    locks: ProjectLocks,
}

impl MergeEngine {
    pub fn new(store: ProjectStore, locks: ProjectLocks) -> Self {
        MergeEngine { store, locks }
    }

    /// Merge the given folders from a section into `main`, then reconcile
    /// the flow graph. With `delete_after`, the source section is deleted
    /// iff every folder succeeded.
    pub async fn merge(
        &self,
        project: &str,
        section_timestamp: &str,
        folders: &[String],
        delete_after: bool,
    ) -> Result<MergeReport> {
        if folders.is_empty() {
            return Err(MergeError::Invalid("empty folder list".to_string()));
        }
        let name = ProjectName::new(project)?;
        let section = SectionId::parse(section_timestamp)?;
        let section_ref = SectionRef::Section(section.clone());
        let section_root = self.store.require_section_root(&name, &section_ref)?;

        // Writes to main/ and flow.json serialise per project; readers are
        // unaffected because the flow is written via rename-from-temp.
        let _guard = self
            .locks
            .try_acquire(name.as_str())
            .map_err(|_| MergeError::Conflict(name.to_string()))?;

        let section_flow = self
            .store
            .read_flow(&self.store.section_flow_path(&name, &section_ref))?;

        let mut outcomes = Vec::new();
        for folder in folders {
            outcomes.push(self.merge_folder(&name, &section_root, section_flow.as_ref(), folder));
        }

        let merged_ids: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.folder.as_str())
            .collect();
        if !merged_ids.is_empty() {
            if let Some(flow) = &section_flow {
                self.reconcile_flow(&name, flow, &merged_ids)?;
            }
        }

        let success = outcomes.iter().all(|o| o.success);
        let mut section_deleted = false;
        if delete_after {
            if success {
                self.store.delete_section(&name, &section)?;
                section_deleted = true;
                info!(project, section = section.as_str(), "merged section deleted");
            } else {
                warn!(
                    project,
                    section = section.as_str(),
                    "delete-after skipped: not all folders merged"
                );
            }
        }

        Ok(MergeReport {
            success,
            folders: outcomes,
            section_deleted,
        })
    }

    /// Merge every folder the section's flow names (the synthetic `start`
    /// node excluded), falling back to the section's top-level directories
    /// for flow-less legacy captures.
    pub async fn merge_all(
        &self,
        project: &str,
        section_timestamp: &str,
        delete_after: bool,
    ) -> Result<MergeReport> {
        let folders = self.derive_folders(project, section_timestamp)?;
        if folders.is_empty() {
            return Err(MergeError::Invalid(format!(
                "section {section_timestamp} has nothing to merge"
            )));
        }
        self.merge(project, section_timestamp, &folders, delete_after)
            .await
    }

    /// Dry run: report per-folder action and sizes without touching disk.
    pub async fn preview(
        &self,
        project: &str,
        section_timestamp: &str,
        folders: &[String],
    ) -> Result<Vec<PreviewEntry>> {
        let name = ProjectName::new(project)?;
        let section_ref = SectionRef::Section(SectionId::parse(section_timestamp)?);
        let section_root = self.store.require_section_root(&name, &section_ref)?;
        let section_flow = self
            .store
            .read_flow(&self.store.section_flow_path(&name, &section_ref))?;

        let mut entries = Vec::new();
        for folder in folders {
            let rel = resolve_folder_path(section_flow.as_ref(), folder);
            let (source, rel) = match existing_source(&section_root, &rel, folder) {
                Some(found) => found,
                None => {
                    return Err(MergeError::Invalid(format!(
                        "folder {folder:?} not found in section"
                    )))
                }
            };
            let dest = self.store.main_dir(&name).join(&rel);
            let action = if dest.is_dir() {
                MergeAction::Overwrite
            } else {
                MergeAction::Create
            };
            entries.push(PreviewEntry {
                folder: folder.clone(),
                path: rel,
                action,
                source_size: self.store.dir_size(&source)?,
                dest_size: match action {
                    MergeAction::Overwrite => Some(self.store.dir_size(&dest)?),
                    MergeAction::Create => None,
                },
            });
        }
        Ok(entries)
    }

    fn derive_folders(&self, project: &str, section_timestamp: &str) -> Result<Vec<String>> {
        let name = ProjectName::new(project)?;
        let section_ref = SectionRef::Section(SectionId::parse(section_timestamp)?);
        let section_root = self.store.require_section_root(&name, &section_ref)?;

        if let Some(flow) = self
            .store
            .read_flow(&self.store.section_flow_path(&name, &section_ref))?
        {
            let ids: Vec<String> = flow
                .nodes
                .iter()
                .filter(|n| !n.is_start())
                .map(|n| n.id.clone())
                .collect();
            if !ids.is_empty() {
                return Ok(ids);
            }
        }

        // Legacy captures without a flow: top-level directories.
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&section_root).map_err(StoreError::from)? {
            let entry = entry.map_err(StoreError::from)?;
            if entry.file_type().map_err(StoreError::from)?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Copy one folder. Failures are absorbed into the outcome.
    fn merge_folder(
        &self,
        name: &ProjectName,
        section_root: &std::path::Path,
        section_flow: Option<&FlowGraph>,
        folder: &str,
    ) -> FolderOutcome {
        let rel = resolve_folder_path(section_flow, folder);
        let Some((source, rel)) = existing_source(section_root, &rel, folder) else {
            return FolderOutcome {
                folder: folder.to_string(),
                path: rel,
                action: MergeAction::Create,
                success: false,
                error: Some("folder not found in section".to_string()),
            };
        };

        let dest = self.store.main_dir(name).join(&rel);
        let action = if dest.is_dir() {
            MergeAction::Overwrite
        } else {
            MergeAction::Create
        };

        // Remove-then-copy so the target is never a mix of old and new.
        let copied = self
            .store
            .remove_dir_if_exists(&dest)
            .and_then(|()| self.store.copy_dir_recursive(&source, &dest));
        match copied {
            Ok(()) => FolderOutcome {
                folder: folder.to_string(),
                path: rel,
                action,
                success: true,
                error: None,
            },
            Err(err) => {
                warn!(folder, %err, "folder merge failed");
                FolderOutcome {
                    folder: folder.to_string(),
                    path: rel,
                    action,
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Upsert merged nodes (plus `start`) into the main flow and add edges
    /// whose endpoints both exist there. Same-endpoint edges are replaced.
    fn reconcile_flow(
        &self,
        name: &ProjectName,
        section_flow: &FlowGraph,
        merged_ids: &[&str],
    ) -> Result<()> {
        let flow_path = self.store.flow_path(name);
        let mut main_flow = self.store.read_flow(&flow_path)?.unwrap_or_default();

        if main_flow.domain.is_empty() {
            main_flow.domain = section_flow.domain.clone();
        }

        for node in &section_flow.nodes {
            if node.is_start() || merged_ids.contains(&node.id.as_str()) {
                upsert_preserving(&mut main_flow, node);
            }
        }

        for edge in &section_flow.edges {
            if main_flow.has_node(&edge.from) && main_flow.has_node(&edge.to) {
                main_flow.upsert_edge(FlowEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    extra: edge.extra.clone(),
                });
            }
        }

        self.store.write_flow(&flow_path, &main_flow)?;
        Ok(())
    }
}

fn upsert_preserving(flow: &mut FlowGraph, node: &FlowNode) {
    flow.upsert_node(FlowNode {
        id: node.id.clone(),
        kind: node.kind.clone(),
        name: node.name.clone(),
        url: node.url.clone(),
        path: node.path.clone(),
        nested_path: node.nested_path.clone(),
        extra: node.extra.clone(),
    });
}

/// Nested path from the flow node, or the id itself for flat captures.
fn resolve_folder_path(flow: Option<&FlowGraph>, folder: &str) -> String {
    flow.and_then(|f| f.find_node(folder))
        .map(|n| n.capture_path().to_string())
        .unwrap_or_else(|| folder.to_string())
}

/// The nested path is authoritative; the flat id path is the fallback for
/// captures that predate nesting.
fn existing_source(
    section_root: &std::path::Path,
    rel: &str,
    folder: &str,
) -> Option<(PathBuf, String)> {
    let nested = section_root.join(rel);
    if nested.is_dir() {
        return Some((nested, rel.to_string()));
    }
    let flat = section_root.join(folder);
    if flat.is_dir() {
        return Some((flat, folder.to_string()));
    }
    None
}
