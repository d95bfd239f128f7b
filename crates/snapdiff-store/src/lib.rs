//! snapdiff storage gateway
//!
//! One-writer-per-path filesystem access to the snapdiff project tree:
//! - validated names ([`ProjectName`], [`SectionId`], the `main` sentinel)
//! - screen artefact reader unions (new → legacy key sets)
//! - atomic JSON writes (temp file + rename)
//! - flow graph persistence
//! - test-result and report indexes with retention GC
//! - per-project merge locks

pub mod error;
pub mod flow;
pub mod gateway;
pub mod layout;
pub mod locks;
pub mod reports;
pub mod results;
pub mod screen;

pub use error::{Result, StoreError};
pub use flow::{FlowEdge, FlowGraph, FlowNode, START_KIND};
pub use gateway::{ProjectStore, STORAGE_PATH_ENV};
pub use layout::{ProjectName, SectionId, SectionRef, MAIN, REPLAY_SUFFIX};
pub use locks::ProjectLocks;
pub use reports::{ReportFormat, ReportKind, ReportRecord, REPORT_RETENTION_DAYS};
pub use results::{ScreenScore, TestResult, TestStatistics, Thresholds};
pub use screen::{ApiCall, DomNode, Rect, ScreenDir, ScreenMeta, UiArtifact};
