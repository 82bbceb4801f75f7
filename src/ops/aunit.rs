//! ABAP Unit run orchestration: submit a run configuration, poll the
//! run until it finishes, report alert findings.

use std::cell::RefCell;

use crate::codec;
use crate::error::Error;
use crate::ops::RunFailure;
use crate::poll::{self, PollConfig};
use crate::resource::ObjectRef;
use crate::session::{consts, RequestEnvelope, SessionClient};
use crate::types::RunResult;

/// Collection resource for AUnit runs.
pub const RUNS_PATH: &str = "api/abapunit/runs";
const CONFIG_CONTENT_TYPE: &str = "application/vnd.sap.adt.api.abapunit.run.config.v1+xml";
const RUN_ACCEPT: &str = "application/vnd.sap.adt.api.abapunit.run.v1+xml";

/// Run ABAP Unit tests covering the given object.
pub async fn run(
    session: &mut SessionClient,
    config: &PollConfig,
    obj: &ObjectRef,
) -> Result<RunResult, RunFailure<RunResult>> {
    let body = codec::encode_aunit_config(std::slice::from_ref(obj));
    let envelope = RequestEnvelope::post(RUNS_PATH)
        .content_type(CONFIG_CONTENT_TYPE)
        .accept(RUN_ACCEPT)
        .body(body);

    let response = session.execute(&envelope).await?;
    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await.map_err(Error::from)?;

    let initial = codec::decode_aunit_run(&bytes)?;
    if initial.value.status.is_check_terminal() {
        return Ok(initial.value);
    }

    let status_path = match (location, initial.value.handle.as_str()) {
        (Some(location), _) => strip_adt_root(&location),
        (None, handle) if !handle.is_empty() => format!("{}/{}", RUNS_PATH, handle),
        (None, _) => {
            return Err(Error::Protocol(
                "run submission returned neither a Location header nor a run id".to_string(),
            )
            .into());
        }
    };

    // The submit response itself is the first record; subsequent
    // status fetches wait for the configured interval.
    let config = PollConfig {
        immediate_first: false,
        ..config.clone()
    };

    let session = RefCell::new(session);
    let fetch = || {
        let path = status_path.clone();
        let session = &session;
        async move {
            let envelope = RequestEnvelope::get(path).accept(RUN_ACCEPT);
            let response = session.borrow_mut().execute(&envelope).await?;
            let bytes = response.bytes().await?;
            Ok(codec::decode_aunit_run(&bytes)?.value)
        }
    };

    poll::poll(
        &config,
        fetch,
        |r: &RunResult| r.status.is_check_terminal(),
        poll::interrupted,
    )
    .await
    .map_err(RunFailure::from)
}

/// Location headers carry absolute ADT URIs; the session layer expects
/// paths relative to the ADT root.
fn strip_adt_root(uri: &str) -> String {
    let path = uri
        .strip_prefix(consts::ADT_ROOT)
        .or_else(|| {
            uri.find(consts::ADT_ROOT)
                .map(|i| &uri[i + consts::ADT_ROOT.len()..])
        })
        .unwrap_or(uri);
    path.trim_start_matches('/').to_string()
}
