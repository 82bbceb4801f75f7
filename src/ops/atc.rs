//! ATC check runs: customizing lookup, worklist creation, run
//! submission and polling, worklist retrieval.

use std::cell::RefCell;

use serde::Serialize;
use tracing::debug;

use crate::codec;
use crate::error::{Error, Result};
use crate::ops::RunFailure;
use crate::poll::{self, PollConfig};
use crate::resource::ObjectRef;
use crate::session::{RequestEnvelope, SessionClient};
use crate::types::{AtcCustomizing, RunResult, RunStatus};

const CUSTOMIZING_PATH: &str = "atc/customizing";
const CUSTOMIZING_ACCEPT: &str = "application/vnd.sap.atc.customizing-v1+xml";
const WORKLISTS_PATH: &str = "atc/worklists";
const WORKLIST_ACCEPT: &str = "application/atc.worklist.v1+xml";
const RUNS_PATH: &str = "atc/runs";

/// Per-object outcome of an ATC batch run.
#[derive(Debug, Serialize)]
pub struct ObjectRunOutcome {
    pub object: String,
    /// Final (or partial, on failure) run result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ObjectRunOutcome {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate ATC report, in submission order.
#[derive(Debug, Default, Serialize)]
pub struct AtcRunReport {
    pub outcomes: Vec<ObjectRunOutcome>,
}

impl AtcRunReport {
    /// True when every object ran to completion.
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.ok())
    }

    /// Findings at or above the error-level threshold across all runs.
    pub fn verdicts_at_or_above(&self, error_level: u8) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.run.as_ref())
            .map(|r| r.verdicts_at_or_above(error_level))
            .sum()
    }
}

/// Fetch ATC customizing; the system check variant is the default
/// variant for runs.
pub async fn customizing(session: &mut SessionClient) -> Result<AtcCustomizing> {
    let envelope = RequestEnvelope::get(CUSTOMIZING_PATH).accept(CUSTOMIZING_ACCEPT);
    let response = session.execute(&envelope).await?;
    let decoded = codec::decode_atc_customizing(&response.bytes().await?)?;

    if decoded.incomplete {
        return Err(Error::Protocol(
            "ATC customizing carried no system check variant".to_string(),
        ));
    }
    Ok(decoded.value)
}

/// Run ATC checks for each object, one worklist per object. A failure
/// of one object is recorded and never aborts the remaining objects;
/// fatal authentication errors abort the whole batch.
pub async fn run(
    session: &mut SessionClient,
    config: &PollConfig,
    objects: &[ObjectRef],
    variant: &str,
    max_verdicts: u32,
) -> Result<AtcRunReport> {
    let mut report = AtcRunReport::default();

    for obj in objects {
        match run_one(session, config, obj, variant, max_verdicts).await {
            Ok(run) => report.outcomes.push(ObjectRunOutcome {
                object: obj.name.clone(),
                run: Some(run),
                error: None,
            }),
            Err(failure) => {
                if failure.source.is_fatal_auth() {
                    return Err(failure.source);
                }
                report.outcomes.push(ObjectRunOutcome {
                    object: obj.name.clone(),
                    run: failure.partial,
                    error: Some(failure.source.to_string()),
                });
            }
        }
    }

    Ok(report)
}

async fn run_one(
    session: &mut SessionClient,
    config: &PollConfig,
    obj: &ObjectRef,
    variant: &str,
    max_verdicts: u32,
) -> std::result::Result<RunResult, RunFailure<RunResult>> {
    // 1. Create a worklist for the check variant.
    let envelope = RequestEnvelope::post(WORKLISTS_PATH)
        .query("checkVariant", variant)
        .accept("text/plain");
    let response = session.execute(&envelope).await?;
    let worklist_id = response.text().await.map_err(Error::from)?.trim().to_string();
    if worklist_id.is_empty() {
        return Err(Error::Protocol("worklist creation returned no id".to_string()).into());
    }
    debug!(object = %obj.name, worklist = %worklist_id, "ATC worklist created");

    // 2. Start the run against the worklist.
    let body = codec::encode_atc_run(std::slice::from_ref(obj), max_verdicts);
    let envelope = RequestEnvelope::post(RUNS_PATH)
        .query("worklistId", worklist_id.clone())
        .content_type("application/xml")
        .accept("application/xml")
        .body(body);
    let response = session.execute(&envelope).await?;
    let initial = codec::decode_atc_run_status(&response.bytes().await.map_err(Error::from)?)?;

    // 3. Poll the run status until it reaches a terminal state.
    let mut terminal = initial.value;
    if !terminal.status.is_check_terminal() {
        let poll_config = PollConfig {
            immediate_first: false,
            ..config.clone()
        };
        let status_path = format!("{}/{}", RUNS_PATH, worklist_id);

        let cell = RefCell::new(&mut *session);
        let fetch = || {
            let path = status_path.clone();
            let cell = &cell;
            async move {
                let envelope = RequestEnvelope::get(path).accept("application/xml");
                let response = cell.borrow_mut().execute(&envelope).await?;
                let bytes = response.bytes().await?;
                Ok(codec::decode_atc_run_status(&bytes)?.value)
            }
        };

        terminal = poll::poll(
            &poll_config,
            fetch,
            |r: &RunResult| r.status.is_check_terminal(),
            poll::interrupted,
        )
        .await?;
    }

    // A run that ends in the failed state has no worklist worth
    // fetching; report it against the object it was started for.
    if terminal.status == RunStatus::Failed {
        return Err(RunFailure {
            partial: Some(terminal),
            source: Error::Protocol(format!(
                "ATC run for worklist {} ended with status failed",
                worklist_id
            )),
        });
    }

    // 4. Fetch the worklist carrying the findings.
    let envelope = RequestEnvelope::get(format!("{}/{}", WORKLISTS_PATH, worklist_id))
        .query("includeExemptedFindings", "false")
        .accept(WORKLIST_ACCEPT);
    let response = session.execute(&envelope).await?;
    let decoded = codec::decode_atc_worklist(&response.bytes().await.map_err(Error::from)?)?;

    let mut result = decoded.value;
    if result.handle.is_empty() {
        result.handle = worklist_id;
    }
    Ok(result)
}
