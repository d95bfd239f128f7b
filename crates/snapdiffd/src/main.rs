//! snapdiffd: the snapdiff HTTP service.
//!
//! Stateless request routing over the engine crates: comparison, merge,
//! test-runner and report endpoints plus screen-preview downloads. All
//! responses are JSON except downloads. The engine owns all semantics; this
//! binary only validates request shapes and maps error kinds to status
//! codes (404 / 400 / 409 / 503).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, Level};

use snapdiff_core::{
    CompareEngine, EngineError, ErrorKind, ReportGenerator, ReportOptions, ScoreWeights,
    TestRunner,
};
use snapdiff_merge::{MergeEngine, MergeError};
use snapdiff_store::{ProjectLocks, ProjectName, ProjectStore, Thresholds};

#[derive(Parser)]
#[command(name = "snapdiffd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "snapdiff capture-diff-merge HTTP service", long_about = None)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:4000")]
    listen: SocketAddr,

    /// Storage root (defaults to $STORAGE_PATH, then ./storage)
    #[arg(long, env = "STORAGE_PATH")]
    storage: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone)]
struct AppState {
    store: ProjectStore,
    engine: CompareEngine,
    runner: TestRunner,
    merger: MergeEngine,
    reports: ReportGenerator,
}

impl AppState {
    fn new(store: ProjectStore) -> Self {
        let locks = ProjectLocks::new();
        AppState {
            engine: CompareEngine::new(store.clone()),
            runner: TestRunner::new(store.clone()),
            merger: MergeEngine::new(store.clone(), locks),
            reports: ReportGenerator::new(store.clone()),
            store,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    snapdiff_core::init_tracing(args.json, level);

    let store = match args.storage {
        Some(root) => ProjectStore::new(root),
        None => ProjectStore::from_env(),
    };
    info!(root = %store.root().display(), "storage root");

    let app = router(AppState::new(store));
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(listen = %args.listen, "snapdiffd listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/compare/:project/page", get(compare_page))
        .route("/api/compare/:project/:s1/:s2", get(compare_sections))
        .route("/api/merge/:project", post(merge))
        .route("/api/merge/:project/preview", post(merge_preview))
        .route("/api/test-runner/run", post(run_test))
        .route("/api/test-runner/:project/results", get(list_results))
        .route("/api/test-runner/:project/statistics", get(statistics))
        .route(
            "/api/test-runner/:project/results/:id",
            get(get_result).delete(delete_result),
        )
        .route("/api/reports/:project/generate", post(generate_report))
        .route("/api/reports/:project", get(list_reports))
        .route("/api/reports/:project/:id/download", get(download_report))
        .route(
            "/api/reports/:project/:id",
            axum::routing::delete(delete_report),
        )
        .route(
            "/api/capture/preview/:project/:section/*screen_path",
            get(capture_preview),
        )
        .with_state(state)
}

// ── error mapping ──────────────────────────────────────────────────────

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16(),
        }));
        (self.status, body).into_response()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::new(status_for(err.kind()), err.to_string())
    }
}

impl From<snapdiff_store::StoreError> for ApiError {
    fn from(err: snapdiff_store::StoreError) -> Self {
        EngineError::from(err).into()
    }
}

impl From<MergeError> for ApiError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Store(inner) => EngineError::from(inner).into(),
            MergeError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            MergeError::Invalid(_) => ApiError::new(StatusCode::BAD_REQUEST, err.to_string()),
            MergeError::Conflict(_) => ApiError::new(StatusCode::CONFLICT, err.to_string()),
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ── compare ────────────────────────────────────────────────────────────

async fn compare_sections(
    State(state): State<AppState>,
    Path((project, s1, s2)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let result = state.engine.compare_sections(&project, &s1, &s2).await?;
    Ok(Json(serde_json::to_value(result).map_err(EngineError::from)?))
}

#[derive(Deserialize)]
struct PageQuery {
    s1: String,
    s2: String,
    p1: String,
    p2: String,
}

async fn compare_page(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let diff = state
        .engine
        .compare_page(&project, &query.s1, &query.s2, &query.p1, &query.p2)
        .await?;
    Ok(Json(serde_json::to_value(diff).map_err(EngineError::from)?))
}

// ── merge ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeBody {
    section_timestamp: String,
    #[serde(default)]
    folders: Option<Vec<String>>,
    #[serde(default)]
    delete_after: bool,
}

async fn merge(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(body): Json<MergeBody>,
) -> ApiResult<Json<Value>> {
    let report = match &body.folders {
        Some(folders) => {
            state
                .merger
                .merge(&project, &body.section_timestamp, folders, body.delete_after)
                .await?
        }
        None => {
            state
                .merger
                .merge_all(&project, &body.section_timestamp, body.delete_after)
                .await?
        }
    };
    // Partial failure is a completed operation: HTTP 200, success:false.
    Ok(Json(serde_json::to_value(report).map_err(EngineError::from)?))
}

async fn merge_preview(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(body): Json<MergeBody>,
) -> ApiResult<Json<Value>> {
    let folders = body.folders.unwrap_or_default();
    let entries = state
        .merger
        .preview(&project, &body.section_timestamp, &folders)
        .await?;
    Ok(Json(json!({ "folders": entries })))
}

// ── test runner ────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunTestBody {
    project_name: String,
    section_timestamp: String,
    #[serde(default)]
    threshold: Option<Thresholds>,
    #[serde(default)]
    weights: Option<ScoreWeights>,
}

async fn run_test(
    State(state): State<AppState>,
    Json(body): Json<RunTestBody>,
) -> ApiResult<Json<Value>> {
    let result = state
        .runner
        .run_test(
            &body.project_name,
            &body.section_timestamp,
            body.threshold.unwrap_or_default(),
            body.weights.unwrap_or_default(),
        )
        .await?;
    Ok(Json(serde_json::to_value(result).map_err(EngineError::from)?))
}

#[derive(Deserialize)]
struct PagingQuery {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

async fn list_results(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(paging): Query<PagingQuery>,
) -> ApiResult<Json<Value>> {
    let name = ProjectName::new(&project)?;
    let (results, total) = state
        .store
        .list_test_results(&name, paging.page, paging.limit)?;
    Ok(Json(json!({
        "results": results,
        "total": total,
        "page": paging.page,
        "limit": paging.limit,
    })))
}

async fn statistics(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> ApiResult<Json<Value>> {
    let name = ProjectName::new(&project)?;
    let stats = state.store.test_statistics(&name)?;
    Ok(Json(serde_json::to_value(stats).map_err(EngineError::from)?))
}

async fn get_result(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let name = ProjectName::new(&project)?;
    let result = state.store.get_test_result(&name, &id)?;
    Ok(Json(serde_json::to_value(result).map_err(EngineError::from)?))
}

async fn delete_result(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let name = ProjectName::new(&project)?;
    state.store.delete_test_result(&name, &id)?;
    Ok(Json(json!({"deleted": id})))
}

// ── reports ────────────────────────────────────────────────────────────

async fn generate_report(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(options): Json<ReportOptions>,
) -> ApiResult<Json<Value>> {
    let generated = state.reports.generate(&project, options).await?;
    Ok(Json(json!({
        "reportId": generated.record.id,
        "htmlPath": generated.record.html_file,
        "pdfPath": generated.record.pdf_file,
        "pdfError": generated.pdf_error,
    })))
}

async fn list_reports(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> ApiResult<Json<Value>> {
    let name = ProjectName::new(&project)?;
    let records = state.store.list_report_records(&name)?;
    Ok(Json(json!({ "reports": records })))
}

async fn download_report(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let name = ProjectName::new(&project)?;
    let record = state.store.get_report_record(&name, &id)?;
    let dir = state.store.reports_dir(&name);
    // Prefer the PDF when the record carries one.
    let (file, content_type) = match &record.pdf_file {
        Some(pdf) => (pdf.clone(), "application/pdf"),
        None => (record.html_file.clone(), "text/html; charset=utf-8"),
    };
    let bytes = std::fs::read(dir.join(&file))
        .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, format!("report file missing: {file}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn delete_report(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let name = ProjectName::new(&project)?;
    state.store.delete_report_record(&name, &id)?;
    Ok(Json(json!({"deleted": id})))
}

// ── capture preview ────────────────────────────────────────────────────

async fn capture_preview(
    State(state): State<AppState>,
    Path((project, section, screen_path)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let name = ProjectName::new(&project)?;
    let section_ref = snapdiff_store::SectionRef::parse(&section)?;
    let root = state.store.require_section_root(&name, &section_ref)?;

    let rel = screen_path.trim_matches('/');
    if rel.is_empty() || rel.split('/').any(|part| part == ".." || part.is_empty()) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("bad screen path: {rel:?}"),
        ));
    }
    let screen_dir = root.join(rel);
    let preview = state.store.preview_path(&screen_dir).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("no preview for {rel}"))
    })?;
    let bytes = std::fs::read(&preview)
        .map_err(|err| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "image/jpeg".to_string())],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(ProjectStore::new(dir.path()));
        let _app = router(state);
    }

    #[test]
    fn error_kinds_map_to_status_codes() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Invalid), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::Transient),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn merge_error_mapping() {
        let err = ApiError::from(MergeError::Conflict("demo".into()));
        assert_eq!(err.status, StatusCode::CONFLICT);
        let err = ApiError::from(MergeError::Invalid("empty".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn engine_error_mapping() {
        let err = ApiError::from(EngineError::NotFound("x".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let store_err =
            snapdiff_store::StoreError::InvalidSectionTimestamp("nope".into());
        let err = ApiError::from(store_err);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
