//! snapdiff core library
//!
//! The capture-diff-merge engine of a web-application regression tool:
//! - Myers-based text diffing with a hard length guard (`textdiff`)
//! - CSS colour parsing and perceptual equality (`color`)
//! - DOM linearisation, signature matching and CSS tree walks (`domdiff`)
//! - API call diffing with structural body diffs (`apidiff`)
//! - the section comparison engine (`compare`)
//! - the regression test runner (`testrun`)
//! - HTML/PDF report generation with retention GC (`report`)

pub mod apidiff;
pub mod color;
pub mod compare;
pub mod domain;
pub mod domdiff;
pub mod report;
pub mod telemetry;
pub mod testrun;
pub mod textdiff;

pub use apidiff::{
    body_diff, diff_api_calls, endpoint_key, ApiDiff, BodyChangeKind, BodyDelta, CallChange,
    EndpointChange, EndpointPresence, BODY_DIFF_MAX_DEPTH, BODY_VALUE_MAX_CHARS,
};
pub use color::{
    colors_equal, css_colors_equal, parse_color, Rgba, DEFAULT_CHANNEL_TOLERANCE,
};
pub use compare::{
    CompareEngine, CompareItem, CompareResult, CompareSummary, PageDiff, PageInfo, ScreenStatus,
    SCREEN_COMPARE_CONCURRENCY,
};
pub use domain::{EngineError, ErrorKind, Result, ScreenIdentity};
pub use domdiff::{
    classify, diff_css_trees, diff_elements, extract_elements, CategoryCounts, ColorChange,
    ContentCategories, ContentType, CssCategory, CssDelta, CssWalkDiff, DomDiff, Element,
    ElementRef, ModifiedElement, PositionChange, StyleChange, MAX_WALK_DEPTH,
    POSITION_TOLERANCE_PX,
};
pub use report::{
    ChromiumRenderer, GeneratedReport, Hotspot, PdfRenderer, ReportGenerator, ReportOptions,
    SectionDetails, SectionTrend, HEALTH_TREND_SECTIONS, HOTSPOT_PAIRS, HOTSPOT_TOP,
};
pub use telemetry::{init_tracing, LOG_ENV};
pub use testrun::{ScoreWeights, TestRunner};
pub use textdiff::{
    changed_words, diff_chars, diff_lines, diff_words, similarity, DiffOptions, InlineSpan,
    LineOp, SpanKind, TextDiff, MYERS_MAX_ITEMS,
};

/// snapdiff version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
