//! Flow graph persistence (`flow.json`).
//!
//! A flow graph describes navigation between captured screens: one node per
//! screen plus a synthetic `start` entry node, and directed edges. The
//! project root carries the main graph; each section carries its own copy
//! written by the capture layer.
//!
//! Unknown keys on graph, node and edge records are preserved across
//! read-modify-write cycles via flattened maps, so merge never strips data
//! written by newer capture layers.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::gateway::ProjectStore;

/// Node kind of the synthetic entry node. Never captured, never merged.
pub const START_KIND: &str = "start";

/// Per-project (or per-section) navigation graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowGraph {
    pub domain: String,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One screen in the flow graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Directory of the screen under the section root. Absent on legacy
    /// flat captures, where the directory name equals `id`.
    #[serde(rename = "nestedPath", skip_serializing_if = "Option::is_none")]
    pub nested_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowNode {
    pub fn is_start(&self) -> bool {
        self.kind == START_KIND
    }

    /// Relative screen directory for this node.
    pub fn capture_path(&self) -> &str {
        self.nested_path.as_deref().unwrap_or(&self.id)
    }
}

/// A navigation edge between two nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowGraph {
    pub fn find_node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Insert the node, or replace the existing node with the same id.
    pub fn upsert_node(&mut self, node: FlowNode) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    /// Add the edge, replacing any existing edge with the same `(from, to)`.
    pub fn upsert_edge(&mut self, edge: FlowEdge) {
        match self
            .edges
            .iter_mut()
            .find(|e| e.from == edge.from && e.to == edge.to)
        {
            Some(existing) => *existing = edge,
            None => self.edges.push(edge),
        }
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.find_node(id).is_some()
    }
}

impl ProjectStore {
    /// Read a flow graph. Missing or corrupt file → `Ok(None)`.
    pub fn read_flow(&self, path: &Path) -> Result<Option<FlowGraph>> {
        match self.read_json::<FlowGraph>(path) {
            Ok(flow) => Ok(flow),
            Err(crate::StoreError::Serialization(err)) => {
                tracing::warn!(path = %path.display(), %err, "corrupt flow.json, treating as absent");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Write a flow graph via rename-from-temp, so concurrent readers see
    /// either the old or the new graph.
    pub fn write_flow(&self, path: &Path, flow: &FlowGraph) -> Result<()> {
        self.write_json_atomic(path, flow)
    }
}
