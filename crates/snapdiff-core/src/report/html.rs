//! HTML rendering for reports.
//!
//! Plain string building over a shared page shell. Charts are emitted as
//! Chart.js config blocks (`<script type="application/json">`) that a small
//! bootstrap script feeds to the library in the browser; the engine itself
//! never draws.

use serde_json::json;

use crate::compare::{CompareResult, CompareSummary, ScreenStatus};

use super::{Hotspot, SectionDetails, SectionTrend};

/// One chart on a page.
pub struct ChartBlock {
    pub canvas_id: String,
    pub config: serde_json::Value,
}

/// Escape text for HTML body and attribute positions.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const PAGE_CSS: &str = "\
body{font-family:system-ui,sans-serif;margin:2rem;color:#1a1a2e}\
h1{font-size:1.4rem}h2{font-size:1.1rem;margin-top:2rem}\
table{border-collapse:collapse;width:100%;margin-top:.75rem}\
th,td{border:1px solid #d8d8e4;padding:.4rem .6rem;text-align:left;font-size:.9rem}\
th{background:#f3f3fa}\
.tiles{display:flex;gap:1rem;margin-top:1rem;flex-wrap:wrap}\
.tile{border:1px solid #d8d8e4;border-radius:6px;padding:.6rem 1rem;min-width:7rem}\
.tile .num{font-size:1.5rem;font-weight:600}\
.badge{display:inline-block;border-radius:4px;padding:.1rem .5rem;font-size:.8rem;color:#fff}\
.badge.changed{background:#d97706}.badge.added{background:#2563eb}\
.badge.removed{background:#dc2626}.badge.unchanged{background:#16a34a}\
.pass{color:#16a34a;font-weight:600}.fail{color:#dc2626;font-weight:600}\
canvas{max-width:640px;margin-top:1rem}\
footer{margin-top:3rem;font-size:.8rem;color:#777}";

/// Wrap a body in the report shell.
pub fn page(title: &str, body: &str, charts: &[ChartBlock], include_charts: bool) -> String {
    let mut html = String::with_capacity(body.len() + 2048);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(title)));
    html.push_str(&format!("<style>{PAGE_CSS}</style>\n"));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape(title)));
    html.push_str(body);

    if include_charts && !charts.is_empty() {
        html.push_str(
            "<script src=\"https://cdn.jsdelivr.net/npm/chart.js@4\"></script>\n",
        );
        for chart in charts {
            html.push_str(&format!(
                "<canvas id=\"{id}\"></canvas>\n<script type=\"application/json\" data-chart-for=\"{id}\">{config}</script>\n",
                id = escape(&chart.canvas_id),
                config = chart.config,
            ));
        }
        html.push_str(
            "<script>document.querySelectorAll('script[data-chart-for]').forEach(function(node){\
var canvas=document.getElementById(node.dataset.chartFor);\
new Chart(canvas,JSON.parse(node.textContent));});</script>\n",
        );
    }

    html.push_str("<footer>generated by snapdiff</footer>\n</body>\n</html>\n");
    html
}

fn summary_tiles(summary: &CompareSummary) -> String {
    let tiles = [
        ("screens (baseline)", summary.total1),
        ("screens (capture)", summary.total2),
        ("matched", summary.matched),
        ("changed", summary.changed),
        ("added", summary.added),
        ("removed", summary.removed),
        ("unchanged", summary.unchanged),
    ];
    let mut html = String::from("<div class=\"tiles\">");
    for (label, value) in tiles {
        html.push_str(&format!(
            "<div class=\"tile\"><div class=\"num\">{value}</div><div>{label}</div></div>"
        ));
    }
    html.push_str("</div>");
    html
}

fn status_badge(status: ScreenStatus) -> &'static str {
    match status {
        ScreenStatus::Changed => "<span class=\"badge changed\">changed</span>",
        ScreenStatus::Added => "<span class=\"badge added\">added</span>",
        ScreenStatus::Removed => "<span class=\"badge removed\">removed</span>",
        ScreenStatus::Unchanged => "<span class=\"badge unchanged\">unchanged</span>",
    }
}

/// Comparison report page.
pub fn comparison(
    project: &str,
    result: &CompareResult,
    pass_rate: f64,
    include_charts: bool,
) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<p>{}: <code>{}</code> vs <code>{}</code>, pass rate <strong>{pass_rate:.1}%</strong></p>",
        escape(project),
        escape(&result.section1),
        escape(&result.section2),
    ));
    body.push_str(&summary_tiles(&result.summary));

    body.push_str("<h2>Screens</h2><table><tr><th>Status</th><th>Path</th><th>Name</th><th>Identity</th><th>Notes</th></tr>");
    for item in &result.items {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td><td>{}</td></tr>",
            status_badge(item.status),
            escape(&item.path),
            escape(&item.name),
            escape(&item.identity),
            escape(item.match_info.as_deref().unwrap_or("")),
        ));
    }
    body.push_str("</table>");

    let charts = vec![ChartBlock {
        canvas_id: "summary-chart".to_string(),
        config: json!({
            "type": "doughnut",
            "data": {
                "labels": ["changed", "added", "removed", "unchanged"],
                "datasets": [{
                    "data": [
                        result.summary.changed,
                        result.summary.added,
                        result.summary.removed,
                        result.summary.unchanged
                    ],
                    "backgroundColor": ["#d97706", "#2563eb", "#dc2626", "#16a34a"]
                }]
            },
            "options": {"plugins": {"legend": {"position": "bottom"}}}
        }),
    }];

    page(
        &format!("Comparison report: {project}"),
        &body,
        &charts,
        include_charts,
    )
}

/// Test-run report page.
pub fn test_run(
    project: &str,
    details: &SectionDetails,
    baseline: Option<&CompareSummary>,
    include_charts: bool,
) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<p>{}: section <code>{}</code></p>",
        escape(project),
        escape(&details.timestamp),
    ));
    body.push_str(&format!(
        "<div class=\"tiles\">\
<div class=\"tile\"><div class=\"num\">{}</div><div>screens</div></div>\
<div class=\"tile\"><div class=\"num\">{}</div><div>API calls</div></div>\
<div class=\"tile\"><div class=\"num\">{}</div><div>bytes on disk</div></div>\
</div>",
        details.screen_count, details.api_count, details.size,
    ));

    let mut charts = Vec::new();
    if let Some(summary) = baseline {
        body.push_str("<h2>Against main</h2>");
        body.push_str(&summary_tiles(summary));
        charts.push(ChartBlock {
            canvas_id: "baseline-chart".to_string(),
            config: json!({
                "type": "bar",
                "data": {
                    "labels": ["changed", "added", "removed", "unchanged"],
                    "datasets": [{
                        "label": "screens",
                        "data": [summary.changed, summary.added, summary.removed, summary.unchanged],
                        "backgroundColor": ["#d97706", "#2563eb", "#dc2626", "#16a34a"]
                    }]
                },
                "options": {"plugins": {"legend": {"display": false}}}
            }),
        });
    }

    page(
        &format!("Test-run report: {project}"),
        &body,
        &charts,
        include_charts,
    )
}

/// Project-health report page.
pub fn health(
    project: &str,
    trend: &[SectionTrend],
    hotspots: &[Hotspot],
    include_charts: bool,
) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<p>{}: {} recent sections</p>",
        escape(project),
        trend.len(),
    ));

    body.push_str("<h2>Trend</h2><table><tr><th>Section</th><th>Screens</th><th>API calls</th><th>Size (bytes)</th></tr>");
    for row in trend {
        body.push_str(&format!(
            "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&row.timestamp),
            row.screen_count,
            row.api_count,
            row.size,
        ));
    }
    body.push_str("</table>");

    body.push_str("<h2>Hotspots</h2>");
    if hotspots.is_empty() {
        body.push_str("<p>No screen changed across the recent section pairs.</p>");
    } else {
        body.push_str("<table><tr><th>Screen</th><th>Changed in N comparisons</th></tr>");
        for hotspot in hotspots {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape(&hotspot.path),
                hotspot.changed_count,
            ));
        }
        body.push_str("</table>");
    }

    let charts = vec![ChartBlock {
        canvas_id: "trend-chart".to_string(),
        config: json!({
            "type": "line",
            "data": {
                "labels": trend.iter().map(|t| t.timestamp.clone()).collect::<Vec<_>>(),
                "datasets": [{
                    "label": "screens",
                    "data": trend.iter().map(|t| t.screen_count).collect::<Vec<_>>(),
                    "borderColor": "#2563eb"
                }, {
                    "label": "API calls",
                    "data": trend.iter().map(|t| t.api_count).collect::<Vec<_>>(),
                    "borderColor": "#d97706"
                }]
            },
            "options": {"plugins": {"legend": {"position": "bottom"}}}
        }),
    }];

    page(
        &format!("Project health: {project}"),
        &body,
        &charts,
        include_charts,
    )
}
