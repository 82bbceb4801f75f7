//! Rendering of run results for the console: human text, JSON, and
//! checkstyle XML for CI consumption of ATC findings.

use serde::Serialize;

use crate::error::Result;
use crate::ops::atc::AtcRunReport;
use crate::types::{BatchReport, PullResult, RepoInfo, RunResult};

const CHECKSTYLE_VERSION: &str = "8.36";

/// Serialize any report as pretty JSON.
pub fn json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Human-readable AUnit findings, one line per alert.
pub fn aunit_human(result: &RunResult) -> String {
    let mut out = String::new();
    if result.findings.is_empty() {
        out.push_str("All tests passed\n");
    }
    for finding in &result.findings {
        out.push_str(&format!(
            "{} [{}] {} :: {}\n",
            finding.object,
            finding.severity.as_str(),
            finding.check_title,
            finding.message,
        ));
    }
    if result.incomplete {
        out.push_str("(result partially decoded)\n");
    }
    out
}

/// Human-readable ATC worklists: object header lines followed by
/// indented findings, in server order.
pub fn atc_human(report: &AtcRunReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        out.push_str(&format!("{}\n", outcome.object));
        if let Some(error) = &outcome.error {
            out.push_str(&format!("* failed: {}\n", error));
        }
        if let Some(run) = &outcome.run {
            for finding in &run.findings {
                out.push_str(&format!(
                    "* {} :: {} :: {}\n",
                    finding.priority.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                    finding.check_title,
                    finding.message,
                ));
            }
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The CheckStyle Jenkins plugin treats `/` as a path separator; ABAP
/// namespaces use the division slash instead.
fn replace_slash(name: &str) -> String {
    name.replace('/', "\u{2215}")
}

/// ATC findings as checkstyle XML, one `<file>` per object.
pub fn atc_checkstyle(report: &AtcRunReport) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<checkstyle version=\"{}\">\n", CHECKSTYLE_VERSION));

    for outcome in &report.outcomes {
        out.push_str(&format!(
            "<file name=\"{}\">\n",
            escape_attr(&replace_slash(&outcome.object))
        ));
        if let Some(run) = &outcome.run {
            for finding in &run.findings {
                out.push_str(&format!(
                    "<error line=\"{}\" column=\"{}\" severity=\"{}\" message=\"{}\" source=\"{}\"/>\n",
                    finding.location.line,
                    finding.location.column,
                    finding.severity.as_str(),
                    escape_attr(&finding.message),
                    escape_attr(&finding.check_title),
                ));
            }
        }
        out.push_str("</file>\n");
    }

    out.push_str("</checkstyle>\n");
    out
}

/// Activation batch report, submission order.
pub fn activation_human(report: &BatchReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let verdict = if outcome.ok { "OK" } else { "FAILED" };
        out.push_str(&format!("{} {}\n", outcome.name, verdict));
        for message in &outcome.messages {
            out.push_str(&format!("  {}\n", message));
        }
    }
    out
}

/// Repository listing, one line per repository.
pub fn repos_human(repos: &[RepoInfo]) -> String {
    let mut out = String::new();
    for repo in repos {
        out.push_str(&format!(
            "{} {} {} {}\n",
            repo.package, repo.branch, repo.url, repo.key
        ));
    }
    out
}

/// Pull outcome with sync log lines.
pub fn pull_human(result: &PullResult) -> String {
    let mut out = format!(
        "{}: {:?}{}\n",
        result.package,
        result.status,
        result
            .status_text
            .as_deref()
            .map(|t| format!(" ({})", t))
            .unwrap_or_default(),
    );
    for line in &result.log {
        out.push_str(&format!("  {}\n", line));
    }
    out
}
