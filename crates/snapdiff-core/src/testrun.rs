//! Regression test runner.
//!
//! Scores a section against the `main` baseline along three axes (DOM
//! similarity, API match, visual similarity), applies pass thresholds, and
//! appends the verdict to the per-project history. Batch runs walk every
//! non-replay section sequentially; screen comparisons are disk-heavy and
//! doubling them up buys nothing.

use serde::{Deserialize, Serialize};
use snapdiff_store::{
    ProjectName, ProjectStore, ScreenScore, SectionId, TestResult, Thresholds,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::apidiff::diff_api_calls;
use crate::color::DEFAULT_CHANNEL_TOLERANCE;
use crate::compare::{CompareEngine, ResolvedScreen};
use crate::domain::{EngineError, Result};
use crate::domdiff::{diff_elements, extract_elements};

/// Weights for the overall score. Equal by default; exposed as configuration
/// because no consumer has ever pinned them down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub dom: f64,
    pub api: f64,
    pub visual: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            dom: 1.0,
            api: 1.0,
            visual: 1.0,
        }
    }
}

/// Externally produced visual similarity artefact (`visual.json`). The
/// engine never computes pixel similarity itself; absent artefacts score 100.
#[derive(Debug, Clone, Copy, Deserialize)]
struct VisualScore {
    score: f64,
}

/// The regression test runner.
#[derive(Debug, Clone)]
pub struct TestRunner {
    store: ProjectStore,
    engine: CompareEngine,
}

impl TestRunner {
    pub fn new(store: ProjectStore) -> Self {
        let engine = CompareEngine::new(store.clone());
        TestRunner { store, engine }
    }

    /// Score one section against `main` and persist the result.
    pub async fn run_test(
        &self,
        project: &str,
        section_timestamp: &str,
        thresholds: Thresholds,
        weights: ScoreWeights,
    ) -> Result<TestResult> {
        validate_thresholds(&thresholds)?;
        let name = ProjectName::new(project)?;
        let section = SectionId::parse(section_timestamp)?;

        let main_root = self
            .store
            .require_section_root(&name, &snapdiff_store::SectionRef::Main)?;
        let section_root = self.store.require_section_root(
            &name,
            &snapdiff_store::SectionRef::Section(section.clone()),
        )?;

        let main_screens = self.engine.resolve_screens(&main_root)?;
        let section_screens = self.engine.resolve_screens(&section_root)?;

        let mut screens: Vec<ScreenScore> = Vec::new();
        for (key, section_screen) in &section_screens {
            let Some(main_screen) = main_screens.get(key) else {
                // Screens absent from the baseline carry no expectation.
                continue;
            };
            if !main_screen.identity.compatible(&section_screen.identity) {
                continue;
            }
            screens.push(self.score_screen(main_screen, section_screen, &thresholds));
        }
        screens.sort_by(|a, b| a.path.cmp(&b.path));

        let passed = screens.iter().all(|s| s.passed);
        let mean = |extract: fn(&ScreenScore) -> f64| -> f64 {
            if screens.is_empty() {
                100.0
            } else {
                round2(screens.iter().map(extract).sum::<f64>() / screens.len() as f64)
            }
        };
        let dom_score = mean(|s| s.dom_score);
        let api_score = mean(|s| s.api_score);
        let visual_score = mean(|s| s.visual_score);
        let overall_score = round2(weighted_overall(dom_score, api_score, visual_score, &weights));

        let result = TestResult {
            id: Uuid::new_v4().to_string(),
            section_timestamp: section.as_str().to_string(),
            section_name: section.as_str().to_string(),
            passed,
            dom_score,
            api_score,
            visual_score,
            overall_score,
            thresholds,
            screens,
            created_at: chrono::Utc::now(),
            dom_diff: None,
            api_diff: None,
            visual_diff: None,
        };

        self.store.append_test_result(&name, &result)?;
        info!(
            project,
            section = section.as_str(),
            passed = result.passed,
            overall = result.overall_score,
            "test run recorded"
        );
        Ok(result)
    }

    /// Run every non-replay section sequentially. Per-section failures are
    /// absorbed; the batch reports what it managed to run.
    pub async fn run_all(
        &self,
        project: &str,
        thresholds: Thresholds,
        weights: ScoreWeights,
    ) -> Result<Vec<TestResult>> {
        let name = ProjectName::new(project)?;
        self.store.require_project(&name)?;

        let mut results = Vec::new();
        for section in self.store.list_sections(&name)? {
            if section.is_replay() {
                continue;
            }
            match self
                .run_test(project, section.as_str(), thresholds, weights)
                .await
            {
                Ok(result) => results.push(result),
                Err(err) => {
                    warn!(project, section = section.as_str(), %err, "section test failed")
                }
            }
        }
        Ok(results)
    }

    /// Score one screen pair. Main is the expectation side.
    fn score_screen(
        &self,
        main: &ResolvedScreen,
        section: &ResolvedScreen,
        thresholds: &Thresholds,
    ) -> ScreenScore {
        let path = section.dir.rel_path.clone();
        let name = section.dir.name().to_string();

        // A screen that advertises UI but whose artefact is unreadable is a
        // failure, not a silent 100.
        let ui_main = self.store.read_ui(&main.dir.abs_path);
        let ui_section = self.store.read_ui(&section.dir.abs_path);
        if (main.dir.has_ui && ui_main.is_none()) || (section.dir.has_ui && ui_section.is_none()) {
            return ScreenScore {
                name,
                path,
                dom_score: 0.0,
                api_score: 0.0,
                visual_score: 0.0,
                passed: false,
                note: Some("UI artefact unreadable".to_string()),
            };
        }

        let dom_score = match (&ui_main, &ui_section) {
            (Some(main_ui), Some(section_ui)) => {
                let elements_main = extract_elements(main_ui);
                let elements_section = extract_elements(section_ui);
                let diff = diff_elements(
                    &elements_main,
                    &elements_section,
                    DEFAULT_CHANNEL_TOLERANCE,
                );
                let total_main = diff.total_a;
                let changed = diff.changed_element_count();
                if total_main == 0 {
                    if changed == 0 {
                        100.0
                    } else {
                        0.0
                    }
                } else {
                    (100.0 - 100.0 * changed as f64 / total_main as f64).max(0.0)
                }
            }
            (None, None) => 100.0,
            // UI exists on one side only.
            _ => 0.0,
        };

        let api_main = self.store.read_apis(&main.dir.abs_path).unwrap_or_default();
        let api_section = self
            .store
            .read_apis(&section.dir.abs_path)
            .unwrap_or_default();
        let api_score = if api_main.is_empty() {
            100.0
        } else {
            // An endpoint with a status or body regression is not a match.
            let diff = diff_api_calls(&api_main, &api_section);
            100.0 * diff.unchanged_matched() as f64 / diff.endpoints_a as f64
        };

        let visual_score = self.read_visual_score(section);

        let dom_score = round2(dom_score);
        let api_score = round2(api_score);
        let visual_score = round2(visual_score);
        let passed = dom_score >= thresholds.dom
            && api_score >= thresholds.api
            && visual_score >= thresholds.visual;

        ScreenScore {
            name,
            path,
            dom_score,
            api_score,
            visual_score,
            passed,
            note: None,
        }
    }

    fn read_visual_score(&self, screen: &ResolvedScreen) -> f64 {
        let path = screen.dir.abs_path.join("visual.json");
        match self.store.read_json::<VisualScore>(&path) {
            Ok(Some(visual)) => visual.score.clamp(0.0, 100.0),
            Ok(None) => 100.0,
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable visual.json, defaulting to 100");
                100.0
            }
        }
    }
}

fn weighted_overall(dom: f64, api: f64, visual: f64, weights: &ScoreWeights) -> f64 {
    let total = weights.dom + weights.api + weights.visual;
    if total <= 0.0 {
        return 0.0;
    }
    (dom * weights.dom + api * weights.api + visual * weights.visual) / total
}

fn validate_thresholds(thresholds: &Thresholds) -> Result<()> {
    for (label, value) in [
        ("dom", thresholds.dom),
        ("api", thresholds.api),
        ("visual", thresholds.visual),
    ] {
        if !(0.0..=100.0).contains(&value) || value.is_nan() {
            return Err(EngineError::Invalid(format!(
                "threshold {label} out of range: {value}"
            )));
        }
    }
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
