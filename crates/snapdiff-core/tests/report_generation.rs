//! Report generation: HTML artefacts, PDF failure isolation, retention GC.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use snapdiff_core::{EngineError, PdfRenderer, ReportGenerator, ReportOptions};
use snapdiff_store::{
    ProjectName, ProjectStore, ReportFormat, ReportKind, ReportRecord, SectionId,
};

const SECTION_A: &str = "2024-01-01T00-00-00-000Z";
const SECTION_B: &str = "2024-01-02T00-00-00-000Z";
const SECTION_C: &str = "2024-01-03T00-00-00-000Z";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn screen(root: &Path, rel: &str, url: &str, text: &str) {
    let dir = root.join(rel);
    write(
        &dir.join("meta.json"),
        &serde_json::json!({"url": url, "type": "page"}).to_string(),
    );
    write(
        &dir.join("dom.json"),
        &serde_json::json!({
            "t": "body",
            "c": [{"t": "div", "c": [{"t": "#text", "text": text}]}]
        })
        .to_string(),
    );
}

fn fixture() -> (tempfile::TempDir, ProjectStore, ProjectName) {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(dir.path());
    let project = ProjectName::new("demo").unwrap();
    fs::create_dir_all(store.project_dir(&project)).unwrap();
    (dir, store, project)
}

fn seed_sections(store: &ProjectStore, project: &ProjectName) {
    for (ts, text) in [
        (SECTION_A, "alpha copy"),
        (SECTION_B, "bravo copy"),
        (SECTION_C, "charlie copy"),
    ] {
        let root = store.section_dir(project, &SectionId::parse(ts).unwrap());
        screen(&root, "home", "https://x/home", text);
        screen(&root, "stable", "https://x/stable", "never changes");
    }
}

/// A renderer that always fails, standing in for a missing browser.
struct FailingRenderer;

#[async_trait]
impl PdfRenderer for FailingRenderer {
    async fn render(&self, _html: &Path, _pdf: &Path) -> snapdiff_core::Result<()> {
        Err(EngineError::Transient("no browser installed".to_string()))
    }
}

fn comparison_options(format: ReportFormat) -> ReportOptions {
    ReportOptions {
        kind: ReportKind::Comparison,
        section1: Some(SECTION_A.to_string()),
        section2: Some(SECTION_B.to_string()),
        format,
        include_charts: true,
    }
}

#[tokio::test]
async fn comparison_report_writes_html_and_record() {
    let (_dir, store, project) = fixture();
    seed_sections(&store, &project);
    let generator = ReportGenerator::with_renderer(store.clone(), Arc::new(FailingRenderer));

    let generated = generator
        .generate("demo", comparison_options(ReportFormat::Html))
        .await
        .unwrap();

    assert!(generated.html_path.is_file());
    let html = fs::read_to_string(&generated.html_path).unwrap();
    assert!(html.contains("Comparison report"));
    assert!(html.contains(SECTION_A));
    assert!(html.contains("data-chart-for"));

    let records = store.list_report_records(&project).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ReportKind::Comparison);
    assert_eq!(records[0].html_file, generated.record.html_file);
}

#[tokio::test]
async fn pdf_failure_keeps_the_html_half() {
    let (_dir, store, project) = fixture();
    seed_sections(&store, &project);
    let generator = ReportGenerator::with_renderer(store.clone(), Arc::new(FailingRenderer));

    let generated = generator
        .generate("demo", comparison_options(ReportFormat::Pdf))
        .await
        .unwrap();

    assert!(generated.pdf_error.is_some());
    assert!(generated.pdf_path.is_none());
    assert!(generated.html_path.is_file());

    let records = store.list_report_records(&project).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].pdf_file.is_none());
    assert_eq!(records[0].format, ReportFormat::Pdf);
}

#[tokio::test]
async fn generation_collects_expired_records() {
    let (_dir, store, project) = fixture();
    seed_sections(&store, &project);
    let generator = ReportGenerator::with_renderer(store.clone(), Arc::new(FailingRenderer));

    let stale = ReportRecord {
        id: "stale".to_string(),
        kind: ReportKind::Comparison,
        format: ReportFormat::Html,
        section1: None,
        section2: None,
        created_at: Utc::now() - Duration::days(40),
        html_file: "report-stale.html".to_string(),
        pdf_file: None,
        options: serde_json::json!({}),
    };
    fs::create_dir_all(store.reports_dir(&project)).unwrap();
    write(
        &store.reports_dir(&project).join("report-stale.html"),
        "<html></html>",
    );
    store.append_report_record(&project, &stale).unwrap();

    generator
        .generate("demo", comparison_options(ReportFormat::Html))
        .await
        .unwrap();

    let records = store.list_report_records(&project).unwrap();
    assert_eq!(records.len(), 1);
    assert_ne!(records[0].id, "stale");
    assert!(!store
        .reports_dir(&project)
        .join("report-stale.html")
        .exists());
}

#[tokio::test]
async fn test_run_report_includes_baseline_summary() {
    let (_dir, store, project) = fixture();
    seed_sections(&store, &project);
    screen(
        &store.main_dir(&project),
        "home",
        "https://x/home",
        "alpha copy",
    );
    let generator = ReportGenerator::with_renderer(store.clone(), Arc::new(FailingRenderer));

    let generated = generator
        .generate(
            "demo",
            ReportOptions {
                kind: ReportKind::TestRun,
                section1: Some(SECTION_B.to_string()),
                section2: None,
                format: ReportFormat::Html,
                include_charts: false,
            },
        )
        .await
        .unwrap();

    let html = fs::read_to_string(&generated.html_path).unwrap();
    assert!(html.contains("Test-run report"));
    assert!(html.contains(SECTION_B));
    assert!(html.contains("Against main"));
}

#[tokio::test]
async fn health_report_surfaces_hotspots() {
    let (_dir, store, project) = fixture();
    seed_sections(&store, &project);
    let generator = ReportGenerator::with_renderer(store.clone(), Arc::new(FailingRenderer));

    let generated = generator
        .generate(
            "demo",
            ReportOptions {
                kind: ReportKind::ProjectHealth,
                section1: None,
                section2: None,
                format: ReportFormat::Html,
                include_charts: false,
            },
        )
        .await
        .unwrap();

    let html = fs::read_to_string(&generated.html_path).unwrap();
    assert!(html.contains("Project health"));
    // `home` changed in both adjacent pairs; `stable` never did.
    assert!(html.contains("home"));
    assert!(html.contains("Hotspots"));
    assert!(html.contains("<td>home</td><td>2</td>"));
}

#[tokio::test]
async fn comparison_report_requires_both_sections() {
    let (_dir, store, _project) = fixture();
    let generator = ReportGenerator::with_renderer(store, Arc::new(FailingRenderer));
    let err = generator
        .generate(
            "demo",
            ReportOptions {
                kind: ReportKind::Comparison,
                section1: Some(SECTION_A.to_string()),
                section2: None,
                format: ReportFormat::Html,
                include_charts: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Invalid(_)));
}
