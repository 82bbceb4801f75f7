//! Shared result records produced by the codec and consumed by the
//! operation modules and the report layer.

use serde::{Deserialize, Serialize};

/// Status of an asynchronous server-side run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run was accepted but has not reported progress yet.
    #[default]
    Created,
    Running,
    Finished,
    Failed,
    // abapGit pull vocabulary
    Succeeded,
    Conflict,
    Error,
}

impl RunStatus {
    /// Terminal states for AUnit and ATC runs.
    pub fn is_check_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Terminal states for abapGit pulls.
    pub fn is_pull_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Conflict | Self::Error)
    }
}

/// Severity of a finding, mapped from ATC priorities 1..5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// ATC reports numeric priorities; 1 and 2 are errors, 3 and 4
    /// warnings, everything else informational.
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            1 | 2 => Self::Error,
            3 | 4 => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Checkstyle severity literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Source location of a finding, extracted from an ADT position URI
/// fragment such as `#start=12,4`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub line: u32,
    pub column: u32,
}

/// A single finding reported by a test or check run.
///
/// Findings keep the order in which the server listed them; the order
/// reflects server-side priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Object the finding belongs to (e.g. class or program name).
    pub object: String,
    pub severity: Severity,
    /// ATC priority (1 = highest) where the service reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    /// Check or test title.
    pub check_title: String,
    pub message: String,
    pub location: Location,
}

/// Result of an asynchronous AUnit or ATC run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Server-issued run handle (worklist id or run URI tail).
    pub handle: String,
    pub status: RunStatus,
    pub findings: Vec<Finding>,
    /// True when the decoder could not recover every expected field.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub incomplete: bool,
}

impl RunResult {
    /// Count findings at or above the given priority threshold.
    /// Findings without a priority never count against the threshold.
    pub fn verdicts_at_or_above(&self, error_level: u8) -> usize {
        self.findings
            .iter()
            .filter(|f| f.priority.map(|p| p <= error_level).unwrap_or(false))
            .count()
    }
}

/// Outcome of a single object within a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectOutcome {
    pub name: String,
    pub ok: bool,
    /// Messages reported by the server for this object (checks,
    /// activation errors, syntax errors).
    pub messages: Vec<String>,
}

impl ObjectOutcome {
    pub fn succeeded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            messages: Vec::new(),
        }
    }

    pub fn failed(name: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            messages,
        }
    }
}

/// Aggregate report of a batch operation, in submission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<ObjectOutcome>,
}

impl BatchReport {
    /// The aggregate succeeds only if every object succeeded.
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.ok)
    }

    pub fn push(&mut self, outcome: ObjectOutcome) {
        self.outcomes.push(outcome);
    }
}

/// abapGit repository as listed by the repos endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoInfo {
    pub key: String,
    pub package: String,
    pub url: String,
    pub branch: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

/// Result of an abapGit pull.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullResult {
    pub package: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Per-object sync log lines where the server reports them.
    pub log: Vec<String>,
}

/// ATC customizing as returned by the customizing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtcCustomizing {
    pub system_check_variant: String,
}
