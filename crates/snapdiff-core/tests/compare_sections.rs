//! End-to-end comparison scenarios over real project trees.

use std::fs;
use std::path::Path;

use snapdiff_core::{CompareEngine, EngineError, ScreenStatus};
use snapdiff_store::{ProjectName, ProjectStore, SectionId, SectionRef};

const SECTION_A: &str = "2024-01-01T00-00-00-000Z";
const SECTION_B: &str = "2024-01-02T00-00-00-000Z";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn dom_with_text(text: &str) -> String {
    serde_json::json!({
        "t": "body",
        "c": [
            {"t": "h1", "c": [{"t": "#text", "text": "Account"}]},
            {"t": "div", "a": {"class": "balance"},
             "c": [{"t": "#text", "text": text}]}
        ]
    })
    .to_string()
}

fn screen(section_root: &Path, rel: &str, url: &str, kind: &str, text: &str) {
    let dir = section_root.join(rel);
    write(
        &dir.join("meta.json"),
        &serde_json::json!({"url": url, "type": kind}).to_string(),
    );
    write(&dir.join("dom.json"), &dom_with_text(text));
}

fn fixture() -> (tempfile::TempDir, ProjectStore, CompareEngine, ProjectName) {
    let dir = tempfile::tempdir().unwrap();
    let store = ProjectStore::new(dir.path());
    let engine = CompareEngine::new(store.clone());
    let project = ProjectName::new("demo").unwrap();
    fs::create_dir_all(store.project_dir(&project)).unwrap();
    (dir, store, engine, project)
}

fn section_root(store: &ProjectStore, project: &ProjectName, ts: &str) -> std::path::PathBuf {
    store.section_dir(project, &SectionId::parse(ts).unwrap())
}

#[tokio::test]
async fn identical_sections_are_fully_unchanged() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    for root in [&root_a, &root_b] {
        screen(root, "login", "https://x/login", "page", "Balance: 1,000");
        screen(root, "home", "https://x/home", "page", "Balance: 1,000");
        screen(root, "settings", "https://x/settings", "page", "Balance: 1,000");
    }

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();

    assert_eq!(result.summary.total1, 3);
    assert_eq!(result.summary.total2, 3);
    assert_eq!(result.summary.matched, 3);
    assert_eq!(result.summary.unchanged, 3);
    assert_eq!(result.summary.changed, 0);
    assert_eq!(result.summary.added, 0);
    assert_eq!(result.summary.removed, 0);
    assert!(result.items.iter().all(|i| i.status == ScreenStatus::Unchanged));
}

#[tokio::test]
async fn changed_content_is_reported_without_diff_body() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    screen(&root_a, "home", "https://x/home", "page", "Balance: 1,000");
    screen(&root_b, "home", "https://x/home", "page", "Balance: 1,200");

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();

    assert_eq!(result.summary.changed, 1);
    let item = &result.items[0];
    assert_eq!(item.status, ScreenStatus::Changed);
    // Shallow mode carries no diff body; the per-page endpoint does.
    assert!(item.diff.is_none());
}

#[tokio::test]
async fn equal_sizes_with_equal_signature_hashes_are_unchanged() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    // Same byte length, different content, equal capture hashes: the
    // shallow compare trusts the capture layer.
    for (root, text) in [(&root_a, "Balance: 1,000"), (&root_b, "Balance: 1,200")] {
        let dir = root.join("home");
        write(
            &dir.join("meta.json"),
            &serde_json::json!({
                "url": "https://x/home", "type": "page", "signatureHash": "h1"
            })
            .to_string(),
        );
        write(&dir.join("dom.json"), &dom_with_text(text));
    }

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();
    assert_eq!(result.summary.unchanged, 1);
}

#[tokio::test]
async fn added_screen_is_reported_once() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    screen(&root_a, "home", "https://x/home", "page", "hello");
    screen(&root_b, "home", "https://x/home", "page", "hello");
    screen(&root_b, "settings", "https://x/settings", "page", "prefs");

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();

    assert_eq!(result.summary.added, 1);
    assert_eq!(result.summary.removed, 0);
    let added: Vec<_> = result
        .items
        .iter()
        .filter(|i| i.status == ScreenStatus::Added)
        .collect();
    assert_eq!(added.len(), 1);
    assert!(added[0].path.ends_with("settings"));
}

#[tokio::test]
async fn modal_and_page_at_same_url_never_match() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    screen(&root_a, "confirm", "https://x/confirm", "page", "Are you sure?");
    screen(&root_b, "confirm", "https://x/confirm", "modal", "Are you sure?");

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();

    assert_eq!(result.summary.added, 1);
    assert_eq!(result.summary.removed, 1);
    assert_eq!(result.summary.changed, 0);
    assert_eq!(result.summary.matched, 0);
}

#[tokio::test]
async fn baseline_side_never_reports_removed() {
    let (_dir, store, engine, project) = fixture();
    let main_root = store.main_dir(&project);
    let root_b = section_root(&store, &project, SECTION_B);
    screen(&main_root, "home", "https://x/home", "page", "hello");
    screen(&main_root, "archive", "https://x/archive", "page", "old");
    screen(&root_b, "home", "https://x/home", "page", "hello");
    screen(&root_b, "fresh", "https://x/fresh", "page", "new");

    let result = engine
        .compare_sections("demo", "main", SECTION_B)
        .await
        .unwrap();

    // `archive` exists only in main, but main is a superset by design.
    assert_eq!(result.summary.removed, 0);
    assert_eq!(result.summary.added, 1);
    assert_eq!(result.summary.matched, 1);
}

#[tokio::test]
async fn items_are_sorted_by_status_then_path() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    screen(&root_a, "zeta", "https://x/zeta", "page", "same");
    screen(&root_a, "gone", "https://x/gone", "page", "bye");
    screen(&root_a, "alpha", "https://x/alpha", "page", "one");
    screen(&root_b, "zeta", "https://x/zeta", "page", "same");
    screen(&root_b, "alpha", "https://x/alpha", "page", "two");
    screen(&root_b, "beta", "https://x/beta", "page", "new");

    let first = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();
    let second = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();

    let order: Vec<(ScreenStatus, String)> = first
        .items
        .iter()
        .map(|i| (i.status, i.path.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            (ScreenStatus::Changed, "alpha".to_string()),
            (ScreenStatus::Added, "beta".to_string()),
            (ScreenStatus::Removed, "gone".to_string()),
            (ScreenStatus::Unchanged, "zeta".to_string()),
        ]
    );
    // Re-execution is stable.
    let again: Vec<(ScreenStatus, String)> = second
        .items
        .iter()
        .map(|i| (i.status, i.path.clone()))
        .collect();
    assert_eq!(order, again);
}

#[tokio::test]
async fn duplicate_identities_keep_the_richer_screen() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    // Two sibling dirs resolve to the same identity; one also has APIs.
    screen(&root_a, "home", "https://x/home", "page", "hello");
    screen(&root_a, "home-copy", "https://x/home", "page", "hello");
    write(
        &root_a.join("home-copy/apis.json"),
        r#"[{"method":"GET","url":"/api/ping","status":200}]"#,
    );
    screen(&root_b, "home", "https://x/home", "page", "hello");

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();

    assert_eq!(result.summary.total1, 1);
    let item = &result.items[0];
    assert_eq!(item.page1.as_ref().unwrap().path, "home-copy");
}

#[tokio::test]
async fn missing_section_is_not_found() {
    let (_dir, _store, engine, _project) = fixture();
    let err = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Store(snapdiff_store::StoreError::SectionNotFound { .. })
    ));
}

#[tokio::test]
async fn corrupt_artefact_is_absorbed_not_fatal() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    screen(&root_a, "home", "https://x/home", "page", "hello");
    let dir_b = root_b.join("home");
    write(
        &dir_b.join("meta.json"),
        &serde_json::json!({"url": "https://x/home", "type": "page"}).to_string(),
    );
    write(&dir_b.join("dom.json"), "{corrupt json");

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();
    // The unreadable side compares as changed, the aggregate succeeds.
    assert_eq!(result.summary.total2, 1);
    assert_eq!(result.summary.changed, 1);
}

#[tokio::test]
async fn nested_screens_are_enumerated() {
    let (_dir, store, engine, project) = fixture();
    let root_a = section_root(&store, &project, SECTION_A);
    let root_b = section_root(&store, &project, SECTION_B);
    for root in [&root_a, &root_b] {
        screen(root, "app", "https://x/app", "page", "shell");
        screen(root, "app/settings", "https://x/app/settings", "page", "prefs");
        screen(
            root,
            "app/settings/billing",
            "https://x/app/settings?tab=billing",
            "tab",
            "cards",
        );
    }

    let result = engine
        .compare_sections("demo", SECTION_A, SECTION_B)
        .await
        .unwrap();
    assert_eq!(result.summary.total1, 3);
    assert_eq!(result.summary.unchanged, 3);
}

#[test]
fn section_ref_round_trips_main() {
    assert!(SectionRef::parse("main").unwrap().is_main());
    assert_eq!(SectionRef::parse(SECTION_A).unwrap().as_str(), SECTION_A);
}
