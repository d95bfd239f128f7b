//! Report generation.
//!
//! Three report kinds (comparison, test-run, project-health), all emitted
//! as HTML under `.reports/`, optionally rendered to PDF by a headless
//! browser. Every generation call runs retention GC first, so the index
//! never accumulates records older than the retention window.

pub mod html;
pub mod pdf;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use snapdiff_store::{
    ProjectName, ProjectStore, ReportFormat, ReportKind, ReportRecord, SectionId, SectionRef,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::compare::{CompareEngine, ScreenStatus};
use crate::domain::{EngineError, Result};

pub use pdf::{ChromiumRenderer, PdfRenderer};

/// Sections shown in the health trend.
pub const HEALTH_TREND_SECTIONS: usize = 30;

/// Adjacent section pairs scanned for hotspots.
pub const HOTSPOT_PAIRS: usize = 10;

/// Hotspots reported.
pub const HOTSPOT_TOP: usize = 10;

/// What to generate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(rename = "type")]
    pub kind: ReportKind,
    #[serde(default)]
    pub section1: Option<String>,
    #[serde(default)]
    pub section2: Option<String>,
    pub format: ReportFormat,
    #[serde(default = "default_true", rename = "includeCharts")]
    pub include_charts: bool,
}

fn default_true() -> bool {
    true
}

/// Outcome of one generation call.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub record: ReportRecord,
    pub html_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
    /// Set when the PDF half failed; the HTML half is persisted regardless.
    pub pdf_error: Option<String>,
}

/// One row of the health trend.
#[derive(Debug, Clone, Serialize)]
pub struct SectionTrend {
    pub timestamp: String,
    pub screen_count: usize,
    pub api_count: usize,
    pub size: u64,
}

/// Details of the section a test-run report describes.
#[derive(Debug, Clone, Serialize)]
pub struct SectionDetails {
    pub timestamp: String,
    pub screen_count: usize,
    pub api_count: usize,
    pub size: u64,
}

/// A screen that keeps changing across recent sections.
#[derive(Debug, Clone, Serialize)]
pub struct Hotspot {
    pub path: String,
    pub changed_count: usize,
}

/// The report generator.
#[derive(Clone)]
pub struct ReportGenerator {
    store: ProjectStore,
    engine: CompareEngine,
    renderer: Arc<dyn PdfRenderer>,
}

impl ReportGenerator {
    pub fn new(store: ProjectStore) -> Self {
        Self::with_renderer(store, Arc::new(ChromiumRenderer::new()))
    }

    pub fn with_renderer(store: ProjectStore, renderer: Arc<dyn PdfRenderer>) -> Self {
        let engine = CompareEngine::new(store.clone());
        ReportGenerator {
            store,
            engine,
            renderer,
        }
    }

    /// Generate a report, persist its record, and GC expired records.
    pub async fn generate(&self, project: &str, options: ReportOptions) -> Result<GeneratedReport> {
        let name = ProjectName::new(project)?;
        self.store.require_project(&name)?;

        match self.store.collect_expired_reports(&name, Utc::now()) {
            Ok(0) => {}
            Ok(collected) => info!(project, collected, "expired reports collected"),
            Err(err) => warn!(project, %err, "report retention GC failed"),
        }

        let html = match options.kind {
            ReportKind::Comparison => self.comparison_html(project, &options).await?,
            ReportKind::TestRun => self.test_run_html(project, &name, &options).await?,
            ReportKind::ProjectHealth => self.health_html(project, &name, &options).await?,
        };

        let id = Uuid::new_v4().to_string();
        let html_file = format!("report-{id}.html");
        let reports_dir = self.store.reports_dir(&name);
        std::fs::create_dir_all(&reports_dir).map_err(snapdiff_store::StoreError::from)?;
        let html_path = reports_dir.join(&html_file);
        std::fs::write(&html_path, &html).map_err(snapdiff_store::StoreError::from)?;

        let mut pdf_file = None;
        let mut pdf_path = None;
        let mut pdf_error = None;
        if options.format == ReportFormat::Pdf {
            let file = format!("report-{id}.pdf");
            let path = reports_dir.join(&file);
            match self.renderer.render(&html_path, &path).await {
                Ok(()) => {
                    pdf_file = Some(file);
                    pdf_path = Some(path);
                }
                Err(err) => {
                    warn!(project, %err, "PDF render failed; keeping HTML");
                    pdf_error = Some(err.to_string());
                }
            }
        }

        let record = ReportRecord {
            id,
            kind: options.kind,
            format: options.format,
            section1: options.section1.clone(),
            section2: options.section2.clone(),
            created_at: Utc::now(),
            html_file,
            pdf_file,
            options: serde_json::to_value(&options)?,
        };
        self.store.append_report_record(&name, &record)?;

        Ok(GeneratedReport {
            record,
            html_path,
            pdf_path,
            pdf_error,
        })
    }

    async fn comparison_html(&self, project: &str, options: &ReportOptions) -> Result<String> {
        let section1 = required(&options.section1, "section1")?;
        let section2 = required(&options.section2, "section2")?;
        let result = self
            .engine
            .compare_sections(project, section1, section2)
            .await?;
        let pass_rate = if result.summary.total2 == 0 {
            100.0
        } else {
            100.0 * result.summary.unchanged as f64 / result.summary.total2 as f64
        };
        Ok(html::comparison(
            project,
            &result,
            pass_rate,
            options.include_charts,
        ))
    }

    async fn test_run_html(
        &self,
        project: &str,
        name: &ProjectName,
        options: &ReportOptions,
    ) -> Result<String> {
        let timestamp = required(&options.section1, "section1")?;
        let section = SectionId::parse(timestamp)?;
        let section_ref = SectionRef::Section(section.clone());
        let root = self.store.require_section_root(name, &section_ref)?;
        let details = SectionDetails {
            timestamp: section.as_str().to_string(),
            screen_count: self.screen_count(&root)?,
            api_count: self.api_count(&root)?,
            size: self.store.dir_size(&root)?,
        };

        let baseline = if self.store.section_exists(name, &SectionRef::Main) {
            match self
                .engine
                .compare_sections(project, snapdiff_store::MAIN, section.as_str())
                .await
            {
                Ok(result) => Some(result.summary),
                Err(err) => {
                    warn!(project, %err, "baseline comparison failed for test-run report");
                    None
                }
            }
        } else {
            None
        };

        Ok(html::test_run(
            project,
            &details,
            baseline.as_ref(),
            options.include_charts,
        ))
    }

    async fn health_html(
        &self,
        project: &str,
        name: &ProjectName,
        options: &ReportOptions,
    ) -> Result<String> {
        let sections = self.store.list_sections(name)?;
        let recent: Vec<_> = sections
            .iter()
            .rev()
            .take(HEALTH_TREND_SECTIONS)
            .rev()
            .cloned()
            .collect();

        let mut trend = Vec::new();
        for section in &recent {
            let root = self
                .store
                .section_root(name, &SectionRef::Section(section.clone()));
            // One bad section must not sink the whole report.
            let row = (|| -> Result<SectionTrend> {
                Ok(SectionTrend {
                    timestamp: section.as_str().to_string(),
                    screen_count: self.screen_count(&root)?,
                    api_count: self.api_count(&root)?,
                    size: self.store.dir_size(&root)?,
                })
            })();
            match row {
                Ok(row) => trend.push(row),
                Err(err) => warn!(project, section = section.as_str(), %err, "skipping section in health trend"),
            }
        }

        let hotspots = self.hotspots(project, &recent).await;
        Ok(html::health(
            project,
            &trend,
            &hotspots,
            options.include_charts,
        ))
    }

    /// Count `changed` statuses per screen path across the most recent
    /// adjacent section pairs; the top screens are the hotspots.
    async fn hotspots(&self, project: &str, recent: &[SectionId]) -> Vec<Hotspot> {
        use std::collections::BTreeMap;

        let pair_window = recent
            .iter()
            .rev()
            .take(HOTSPOT_PAIRS + 1)
            .rev()
            .collect::<Vec<_>>();

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for window in pair_window.windows(2) {
            let (older, newer) = (window[0], window[1]);
            match self
                .engine
                .compare_sections(project, older.as_str(), newer.as_str())
                .await
            {
                Ok(result) => {
                    for item in result.items {
                        if item.status == ScreenStatus::Changed {
                            *counts.entry(item.path).or_default() += 1;
                        }
                    }
                }
                Err(err) => {
                    warn!(project, older = older.as_str(), newer = newer.as_str(), %err,
                        "skipping section pair in hotspot scan")
                }
            }
        }

        let mut hotspots: Vec<Hotspot> = counts
            .into_iter()
            .map(|(path, changed_count)| Hotspot {
                path,
                changed_count,
            })
            .collect();
        hotspots.sort_by(|a, b| {
            b.changed_count
                .cmp(&a.changed_count)
                .then_with(|| a.path.cmp(&b.path))
        });
        hotspots.truncate(HOTSPOT_TOP);
        hotspots
    }

    fn screen_count(&self, root: &std::path::Path) -> Result<usize> {
        Ok(self.store.walk_screens(root)?.len())
    }

    fn api_count(&self, root: &std::path::Path) -> Result<usize> {
        let mut total = 0;
        for screen in self.store.walk_screens(root)? {
            total += self
                .store
                .read_apis(&screen.abs_path)
                .map_or(0, |calls| calls.len());
        }
        Ok(total)
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| EngineError::Invalid(format!("{field} is required for this report type")))
}
