//! Test outcomes handed to the publisher.
//!
//! Outcomes are produced upstream (by a test runner or a report file) and
//! are read-only from the publisher's point of view. Two input formats are
//! supported: a JSON outcome file and JUnit XML (see [`junit`]).

pub mod junit;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Result status as the service classifies it.
///
/// `id` is the numeric status code submitted with a result; `label` is the
/// display text that leads the result comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StatusRepr")]
pub struct Status {
    pub id: u32,
    pub label: String,
}

impl Status {
    pub const PASSED: u32 = 1;
    pub const BLOCKED: u32 = 2;
    pub const UNTESTED: u32 = 3;
    pub const RETEST: u32 = 4;
    pub const FAILED: u32 = 5;

    pub fn new(id: u32, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    pub fn passed() -> Self {
        Self::new(Self::PASSED, "Passed")
    }

    pub fn blocked() -> Self {
        Self::new(Self::BLOCKED, "Blocked")
    }

    pub fn untested() -> Self {
        Self::new(Self::UNTESTED, "Untested")
    }

    pub fn retest() -> Self {
        Self::new(Self::RETEST, "Retest")
    }

    pub fn failed() -> Self {
        Self::new(Self::FAILED, "Failed")
    }

    /// Looks up one of the built-in statuses by keyword (case-insensitive).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "passed" | "pass" => Some(Self::passed()),
            "blocked" => Some(Self::blocked()),
            "untested" => Some(Self::untested()),
            "retest" => Some(Self::retest()),
            "failed" | "fail" => Some(Self::failed()),
            _ => None,
        }
    }
}

/// Accepted spellings of a status in outcome files.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Full { id: u32, label: String },
    Keyword(String),
}

impl From<StatusRepr> for Status {
    fn from(repr: StatusRepr) -> Self {
        match repr {
            StatusRepr::Full { id, label } => Status::new(id, label),
            // Unknown keywords keep their text; the service treats them as untested.
            StatusRepr::Keyword(keyword) => Status::from_keyword(&keyword)
                .unwrap_or_else(|| Status::new(Status::UNTESTED, keyword)),
        }
    }
}

/// The result of one executed test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Test name as reported by the runner.
    pub name: String,

    /// Case the test maps to. Zero or negative means "not mapped".
    #[serde(default)]
    pub case_id: i64,

    pub status: Status,

    /// Failure and error messages captured for the test.
    #[serde(default)]
    pub errors: Vec<String>,

    /// Screenshot files captured while the test ran.
    #[serde(default)]
    pub screenshots: Vec<PathBuf>,
}

impl Outcome {
    pub fn new(name: impl Into<String>, case_id: i64, status: Status) -> Self {
        Self {
            name: name.into(),
            case_id,
            status,
            errors: Vec::new(),
            screenshots: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshots.push(path.into());
        self
    }

    /// The mapped case id, if the outcome has one.
    pub fn mapped_case(&self) -> Option<u64> {
        u64::try_from(self.case_id).ok().filter(|id| *id > 0)
    }
}

/// A batch of outcomes together with the agents that produced them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeSet {
    /// Labels describing the execution environment (browsers, devices, ...).
    #[serde(default)]
    pub agents: Vec<String>,

    pub outcomes: Vec<Outcome>,
}

/// Input format of an outcome file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutcomeFormat {
    /// Format picked from the file extension (`.xml` is JUnit, anything else JSON).
    #[default]
    Auto,
    Json,
    Junit,
}

/// Loads an outcome set from a file in the given format.
pub fn load_outcomes(path: &Path, format: OutcomeFormat) -> Result<OutcomeSet> {
    let format = match format {
        OutcomeFormat::Auto if path.extension().is_some_and(|ext| ext == "xml") => {
            OutcomeFormat::Junit
        }
        OutcomeFormat::Auto => OutcomeFormat::Json,
        other => other,
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;

    match format {
        OutcomeFormat::Junit => {
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            let outcomes = junit::parse_junit(&content, base_dir)
                .with_context(|| format!("Failed to parse JUnit report: {}", path.display()))?;
            Ok(OutcomeSet {
                agents: Vec::new(),
                outcomes,
            })
        }
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse results file: {}", path.display())),
    }
}
