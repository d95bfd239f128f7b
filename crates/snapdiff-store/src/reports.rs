//! Report index (`.reports/reports.json`) and its file siblings.
//!
//! Every record owns an HTML file (and optionally a PDF) stored next to the
//! index; deleting a record removes both sides. Retention: records older
//! than [`REPORT_RETENTION_DAYS`] are collected on the next generation call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::gateway::ProjectStore;
use crate::layout::ProjectName;

/// Records older than this many days are garbage-collected.
pub const REPORT_RETENTION_DAYS: i64 = 30;

/// What a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Comparison,
    TestRun,
    ProjectHealth,
}

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Html,
    Pdf,
}

/// One generated report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub format: ReportFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section2: Option<String>,
    pub created_at: DateTime<Utc>,
    /// File name under `.reports/`.
    pub html_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_file: Option<String>,
    pub options: serde_json::Value,
}

impl ProjectStore {
    fn load_reports(&self, project: &ProjectName) -> Result<Vec<ReportRecord>> {
        Ok(self
            .read_json(&self.reports_index_path(project))?
            .unwrap_or_default())
    }

    fn save_reports(&self, project: &ProjectName, records: &[ReportRecord]) -> Result<()> {
        self.write_json_atomic(&self.reports_index_path(project), &records)
    }

    pub fn append_report_record(&self, project: &ProjectName, record: &ReportRecord) -> Result<()> {
        self.require_project(project)?;
        let mut records = self.load_reports(project)?;
        records.push(record.clone());
        self.save_reports(project, &records)
    }

    /// All records, newest first.
    pub fn list_report_records(&self, project: &ProjectName) -> Result<Vec<ReportRecord>> {
        self.require_project(project)?;
        let mut records = self.load_reports(project)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub fn get_report_record(&self, project: &ProjectName, id: &str) -> Result<ReportRecord> {
        self.require_project(project)?;
        self.load_reports(project)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::ReportNotFound(id.to_string()))
    }

    /// Delete a record and its HTML/PDF siblings.
    pub fn delete_report_record(&self, project: &ProjectName, id: &str) -> Result<()> {
        self.require_project(project)?;
        let mut records = self.load_reports(project)?;
        let Some(pos) = records.iter().position(|r| r.id == id) else {
            return Err(StoreError::ReportNotFound(id.to_string()));
        };
        let record = records.remove(pos);
        self.remove_report_files(project, &record);
        self.save_reports(project, &records)
    }

    /// Drop every record older than [`REPORT_RETENTION_DAYS`], files
    /// included. Returns the number of collected records.
    pub fn collect_expired_reports(&self, project: &ProjectName, now: DateTime<Utc>) -> Result<usize> {
        self.require_project(project)?;
        let cutoff = now - Duration::days(REPORT_RETENTION_DAYS);
        let records = self.load_reports(project)?;
        let (expired, live): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.created_at < cutoff);
        if expired.is_empty() {
            return Ok(0);
        }
        for record in &expired {
            self.remove_report_files(project, record);
        }
        debug!(project = %project, collected = expired.len(), "report retention GC");
        self.save_reports(project, &live)?;
        Ok(expired.len())
    }

    fn remove_report_files(&self, project: &ProjectName, record: &ReportRecord) {
        let dir = self.reports_dir(project);
        let _ = std::fs::remove_file(dir.join(&record.html_file));
        if let Some(pdf) = &record.pdf_file {
            let _ = std::fs::remove_file(dir.join(pdf));
        }
    }
}
