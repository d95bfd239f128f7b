//! Validated names for the on-disk project tree.
//!
//! Two newtypes guard every path the gateway builds:
//! - [`ProjectName`]: `[A-Za-z0-9 _-]+`, so a name can never smuggle a path
//!   separator into `projects/<name>/`.
//! - [`SectionId`]: basic-format ISO-8601 with colons replaced
//!   (`YYYY-MM-DDTHH-MM-SS-sssZ`), optional `_replay` suffix.
//!
//! [`SectionRef`] adds the `main` sentinel accepted wherever a section
//! timestamp is expected.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// The sentinel accepted in place of a section timestamp.
pub const MAIN: &str = "main";

/// Suffix marking a replay capture.
pub const REPLAY_SUFFIX: &str = "_replay";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// A validated project name.
///
/// The inner field is private so the string is always one that passed
/// [`ProjectName::new`], so it never contains path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    /// Validate and wrap a project name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'));
        if valid {
            Ok(ProjectName(name))
        } else {
            Err(StoreError::InvalidProjectName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectName {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self> {
        ProjectName::new(s)
    }
}

impl From<ProjectName> for String {
    fn from(name: ProjectName) -> String {
        name.0
    }
}

impl std::fmt::Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, immutable section timestamp.
///
/// Ordering follows the embedded instant, so a sorted `Vec<SectionId>` is in
/// capture order regardless of replay suffixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionId {
    raw: String,
    instant: DateTime<Utc>,
    replay: bool,
}

impl SectionId {
    /// Parse `YYYY-MM-DDTHH-MM-SS-sssZ` with an optional `_replay` suffix.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let (base, replay) = match raw.strip_suffix(REPLAY_SUFFIX) {
            Some(base) => (base, true),
            None => (raw.as_str(), false),
        };
        let naive = NaiveDateTime::parse_from_str(base, TIMESTAMP_FORMAT)
            .map_err(|_| StoreError::InvalidSectionTimestamp(raw.clone()))?;
        let instant = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
        Ok(SectionId {
            raw,
            instant,
            replay,
        })
    }

    /// Render an instant as a section timestamp string.
    pub fn format_instant(instant: DateTime<Utc>) -> String {
        instant.format(TIMESTAMP_FORMAT).to_string()
    }

    /// The directory name, suffix included.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The capture instant.
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Whether this section is a replay capture.
    pub fn is_replay(&self) -> bool {
        self.replay
    }
}

impl TryFrom<String> for SectionId {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self> {
        SectionId::parse(s)
    }
}

impl From<SectionId> for String {
    fn from(id: SectionId) -> String {
        id.raw
    }
}

impl PartialEq for SectionId {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for SectionId {}

impl PartialOrd for SectionId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SectionId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.instant
            .cmp(&other.instant)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Either the `main` baseline or a timestamped section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionRef {
    Main,
    Section(SectionId),
}

impl SectionRef {
    /// Parse `main` or a section timestamp.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == MAIN {
            Ok(SectionRef::Main)
        } else {
            Ok(SectionRef::Section(SectionId::parse(raw)?))
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, SectionRef::Main)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SectionRef::Main => MAIN,
            SectionRef::Section(id) => id.as_str(),
        }
    }
}

impl std::fmt::Display for SectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["demo", "My Project", "a_b-c 1"] {
            assert!(ProjectName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_path_separators() {
        for name in ["", "../up", "a/b", "a\\b", "dot.dot"] {
            assert!(ProjectName::new(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn parses_section_timestamp() {
        let id = SectionId::parse("2024-01-01T00-00-00-000Z").unwrap();
        assert!(!id.is_replay());
        assert_eq!(id.as_str(), "2024-01-01T00-00-00-000Z");
        assert_eq!(
            SectionId::format_instant(id.instant()),
            "2024-01-01T00-00-00-000Z"
        );
    }

    #[test]
    fn parses_replay_suffix() {
        let id = SectionId::parse("2024-06-15T10-30-45-123Z_replay").unwrap();
        assert!(id.is_replay());
        assert_eq!(id.as_str(), "2024-06-15T10-30-45-123Z_replay");
    }

    #[test]
    fn rejects_malformed_timestamps() {
        for raw in ["", "main", "2024-01-01", "2024-01-01T00:00:00.000Z", "yesterday"] {
            assert!(SectionId::parse(raw).is_err(), "{raw} should be invalid");
        }
    }

    #[test]
    fn section_ids_sort_chronologically() {
        let mut ids = vec![
            SectionId::parse("2024-03-01T00-00-00-000Z").unwrap(),
            SectionId::parse("2024-01-01T00-00-00-000Z").unwrap(),
            SectionId::parse("2024-02-01T00-00-00-000Z_replay").unwrap(),
        ];
        ids.sort();
        let raw: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(
            raw,
            vec![
                "2024-01-01T00-00-00-000Z",
                "2024-02-01T00-00-00-000Z_replay",
                "2024-03-01T00-00-00-000Z",
            ]
        );
    }

    #[test]
    fn main_sentinel() {
        assert!(SectionRef::parse("main").unwrap().is_main());
        let section = SectionRef::parse("2024-01-01T00-00-00-000Z").unwrap();
        assert!(!section.is_main());
        assert_eq!(section.as_str(), "2024-01-01T00-00-00-000Z");
    }
}
