//! Deep per-page diffing: DOM categories, CSS walk, API changes.

use std::fs;
use std::path::Path;

use snapdiff_core::{CompareEngine, EngineError};
use snapdiff_store::{ProjectName, ProjectStore, SectionId};

const SECTION_A: &str = "2024-01-01T00-00-00-000Z";
const SECTION_B: &str = "2024-01-02T00-00-00-000Z";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn fixture() -> (tempfile::TempDir, ProjectStore, CompareEngine) {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(dir.path());
    let engine = CompareEngine::new(store.clone());
    let project = ProjectName::new("demo").unwrap();
    fs::create_dir_all(store.project_dir(&project)).unwrap();
    (dir, store, engine)
}

fn screen_dir(store: &ProjectStore, ts: &str, rel: &str) -> std::path::PathBuf {
    let project = ProjectName::new("demo").unwrap();
    store
        .section_dir(&project, &SectionId::parse(ts).unwrap())
        .join(rel)
}

fn balance_dom(amount: &str) -> String {
    serde_json::json!({
        "t": "body",
        "c": [
            {"t": "h1", "c": [{"t": "#text", "text": "Account"}]},
            {"t": "div", "a": {"class": "balance"},
             "c": [{"t": "#text", "text": format!("Balance: {amount}")}]}
        ]
    })
    .to_string()
}

#[tokio::test]
async fn single_numeric_text_change() {
    let (_dir, store, engine) = fixture();
    write(
        &screen_dir(&store, SECTION_A, "home").join("dom.json"),
        &balance_dom("1,000"),
    );
    write(
        &screen_dir(&store, SECTION_B, "home").join("dom.json"),
        &balance_dom("1,200"),
    );

    let diff = engine
        .compare_page("demo", SECTION_A, SECTION_B, "home", "home")
        .await
        .unwrap();

    assert!(diff.has_changes);
    let dom = diff.dom.expect("dom diff present");
    assert_eq!(dom.categories.numbers.changed, 1);
    assert_eq!(dom.categories.texts.changed, 0);
    assert_eq!(dom.categories.labels.changed, 0);
    assert_eq!(dom.modified.len(), 1);
    assert_eq!(dom.added.len() + dom.removed.len(), 0);
}

#[tokio::test]
async fn css_walk_catches_style_only_changes() {
    let (_dir, store, engine) = fixture();
    let dom_a = serde_json::json!({
        "t": "body",
        "c": [{"t": "p", "css": {"color": "#1a1a1a", "font-size": "14px"},
               "rect": {"x": 0.0, "y": 0.0, "w": 200.0, "h": 20.0},
               "c": [{"t": "#text", "text": "unchanged copy"}]}]
    });
    let dom_b = serde_json::json!({
        "t": "body",
        "c": [{"t": "p", "css": {"color": "#c02020", "font-size": "14px"},
               "rect": {"x": 0.0, "y": 0.0, "w": 200.0, "h": 20.0},
               "c": [{"t": "#text", "text": "unchanged copy"}]}]
    });
    write(
        &screen_dir(&store, SECTION_A, "home").join("dom.json"),
        &dom_a.to_string(),
    );
    write(
        &screen_dir(&store, SECTION_B, "home").join("dom.json"),
        &dom_b.to_string(),
    );

    let diff = engine
        .compare_page("demo", SECTION_A, SECTION_B, "home", "home")
        .await
        .unwrap();

    let css = diff.css.expect("css walk ran: both sides are dom.json");
    assert!(css.has_changes());
    assert_eq!(css.count(snapdiff_core::CssCategory::Color), 1);
}

#[tokio::test]
async fn api_status_change_in_page_diff() {
    let (_dir, store, engine) = fixture();
    for (ts, status) in [(SECTION_A, 200), (SECTION_B, 500)] {
        let dir = screen_dir(&store, ts, "home");
        write(&dir.join("dom.json"), &balance_dom("1,000"));
        write(
            &dir.join("apis.json"),
            &serde_json::json!([
                {"method": "GET", "url": "https://x/api/users", "status": status}
            ])
            .to_string(),
        );
    }

    let diff = engine
        .compare_page("demo", SECTION_A, SECTION_B, "home", "home")
        .await
        .unwrap();

    let api = diff.api.expect("api diff present");
    assert!(api.has_changes());
    assert_eq!(api.changed.len(), 1);
    assert_eq!(api.changed[0].endpoint, "GET /api/users");
}

#[tokio::test]
async fn html_artefact_feeds_the_same_differ() {
    let (_dir, store, engine) = fixture();
    write(
        &screen_dir(&store, SECTION_A, "home").join("screen.html"),
        "<body><div class=\"balance\">Balance: 1,000</div></body>",
    );
    write(
        &screen_dir(&store, SECTION_B, "home").join("screen.html"),
        "<body><div class=\"balance\">Balance: 1,200</div></body>",
    );

    let diff = engine
        .compare_page("demo", SECTION_A, SECTION_B, "home", "home")
        .await
        .unwrap();

    let dom = diff.dom.expect("dom diff from html");
    assert_eq!(dom.modified.len(), 1);
    // No structured styles in HTML input, so no CSS walk.
    assert!(diff.css.is_none());
}

#[tokio::test]
async fn ui_on_one_side_only() {
    let (_dir, store, engine) = fixture();
    write(
        &screen_dir(&store, SECTION_A, "home").join("dom.json"),
        &balance_dom("1,000"),
    );
    // Section B: screen exists (meta only), UI artefact absent.
    write(
        &screen_dir(&store, SECTION_B, "home").join("meta.json"),
        r#"{"url":"https://x/home","type":"page"}"#,
    );

    let diff = engine
        .compare_page("demo", SECTION_A, SECTION_B, "home", "home")
        .await
        .unwrap();

    let dom = diff.dom.expect("one-sided dom diff");
    assert!(dom.added.is_empty());
    assert_eq!(dom.removed.len(), dom.total_a);
}

#[tokio::test]
async fn unknown_screen_path_is_not_found() {
    let (_dir, store, engine) = fixture();
    write(
        &screen_dir(&store, SECTION_A, "home").join("dom.json"),
        &balance_dom("1,000"),
    );
    write(
        &screen_dir(&store, SECTION_B, "home").join("dom.json"),
        &balance_dom("1,000"),
    );

    let err = engine
        .compare_page("demo", SECTION_A, SECTION_B, "home", "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = engine
        .compare_page("demo", SECTION_A, SECTION_B, "../etc", "home")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Invalid(_)));
}
