//! Test-result history (`tests/results.json`).
//!
//! An ordered, append-only index of regression test runs. The newest result
//! is first in every listing; statistics are a pure fold over the history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::gateway::ProjectStore;
use crate::layout::ProjectName;

/// Pass thresholds for one test run, persisted verbatim with the result so a
/// historical verdict stays reproducible after defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub dom: f64,
    pub api: f64,
    pub visual: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            dom: 95.0,
            api: 100.0,
            visual: 90.0,
        }
    }
}

/// Per-screen scores within a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenScore {
    pub name: String,
    pub path: String,
    pub dom_score: f64,
    pub api_score: f64,
    pub visual_score: f64,
    pub passed: bool,
    /// Explanation when a screen could not be scored normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One persisted regression test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub section_timestamp: String,
    pub section_name: String,
    pub passed: bool,
    pub dom_score: f64,
    pub api_score: f64,
    pub visual_score: f64,
    pub overall_score: f64,
    pub thresholds: Thresholds,
    pub screens: Vec<ScreenScore>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_diff: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_diff: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_diff: Option<serde_json::Value>,
}

/// Folded test history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TestStatistics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl ProjectStore {
    fn load_results(&self, project: &ProjectName) -> Result<Vec<TestResult>> {
        Ok(self
            .read_json(&self.results_path(project))?
            .unwrap_or_default())
    }

    /// Append a result to the per-project history.
    pub fn append_test_result(&self, project: &ProjectName, result: &TestResult) -> Result<()> {
        self.require_project(project)?;
        let mut results = self.load_results(project)?;
        results.push(result.clone());
        self.write_json_atomic(&self.results_path(project), &results)
    }

    /// Page through the history, newest first. Returns the page and the
    /// total count. `page` is 1-based.
    pub fn list_test_results(
        &self,
        project: &ProjectName,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<TestResult>, usize)> {
        self.require_project(project)?;
        let mut results = self.load_results(project)?;
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = results.len();
        let page = page.max(1);
        let limit = limit.max(1);
        let start = (page - 1) * limit;
        let slice = if start >= total {
            Vec::new()
        } else {
            results[start..(start + limit).min(total)].to_vec()
        };
        Ok((slice, total))
    }

    pub fn get_test_result(&self, project: &ProjectName, id: &str) -> Result<TestResult> {
        self.require_project(project)?;
        self.load_results(project)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::ResultNotFound(id.to_string()))
    }

    pub fn delete_test_result(&self, project: &ProjectName, id: &str) -> Result<()> {
        self.require_project(project)?;
        let mut results = self.load_results(project)?;
        let before = results.len();
        results.retain(|r| r.id != id);
        if results.len() == before {
            return Err(StoreError::ResultNotFound(id.to_string()));
        }
        self.write_json_atomic(&self.results_path(project), &results)
    }

    /// `{total, passed, failed}` folded from the full history.
    pub fn test_statistics(&self, project: &ProjectName) -> Result<TestStatistics> {
        self.require_project(project)?;
        let results = self.load_results(project)?;
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Ok(TestStatistics {
            total,
            passed,
            failed: total - passed,
        })
    }
}
