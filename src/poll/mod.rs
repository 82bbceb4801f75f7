//! Generic poll-until-terminal driver for long-running ADT operations.
//!
//! AUnit runs, ATC runs and abapGit pulls all follow the same contract:
//! submit once, then re-fetch a status document until a terminal
//! predicate holds or the configured deadline passes. The driver keeps
//! the last decoded non-terminal record so a timeout, interrupt or hard
//! transport failure can surface partial results instead of dropping
//! them.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{Error, Result};

/// Scheduling contract of one polled operation.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between status fetches.
    pub interval: Duration,
    /// Total deadline across all fetches.
    pub timeout: Duration,
    /// Issue the first status fetch without an initial delay.
    pub immediate_first: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
            immediate_first: true,
        }
    }
}

/// Non-success outcomes of a poll, each carrying the last decoded
/// non-terminal record when one exists.
#[derive(Debug)]
pub enum PollError<T> {
    Timeout { last: Option<T>, elapsed: Duration },
    Failed { last: Option<T>, source: Error },
    Cancelled { last: Option<T> },
}

impl<T> PollError<T> {
    /// Split into the partial record and the crate-level error.
    pub fn into_parts(self) -> (Option<T>, Error) {
        match self {
            Self::Timeout { last, elapsed } => (
                last,
                Error::Timeout {
                    seconds: elapsed.as_secs(),
                },
            ),
            Self::Failed { last, source } => (last, source),
            Self::Cancelled { last } => (last, Error::Cancelled),
        }
    }
}

/// Never resolves; used when the caller has no interrupt source.
pub async fn never() {
    std::future::pending::<()>().await
}

/// Resolves on Ctrl-C so an interactive run stops polling before the
/// next scheduled request.
pub async fn interrupted() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Repeatedly fetch and decode a status record until `is_terminal`
/// holds. Returns the first terminal record; the fetch error, deadline
/// or cancellation otherwise. The fetch closure goes through the
/// session layer, so CSRF/session recovery happens below this driver;
/// the driver itself never retries a failed fetch.
pub async fn poll<T, F, Fut, P, C, CFut>(
    config: &PollConfig,
    mut fetch: F,
    is_terminal: P,
    cancel: C,
) -> std::result::Result<T, PollError<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
    C: Fn() -> CFut,
    CFut: Future<Output = ()>,
{
    let started = Instant::now();
    let mut last: Option<T> = None;
    let mut first = true;

    loop {
        if !(first && config.immediate_first) {
            let elapsed = started.elapsed();
            if elapsed + config.interval > config.timeout {
                debug!(?elapsed, "Poll deadline reached before next request");
                return Err(PollError::Timeout { last, elapsed });
            }
            tokio::select! {
                _ = sleep(config.interval) => {}
                _ = cancel() => {
                    debug!("Poll cancelled before next request");
                    return Err(PollError::Cancelled { last });
                }
            }
        }
        first = false;

        match fetch().await {
            Ok(record) => {
                if is_terminal(&record) {
                    return Ok(record);
                }
                last = Some(record);
            }
            Err(source) => return Err(PollError::Failed { last, source }),
        }
    }
}
