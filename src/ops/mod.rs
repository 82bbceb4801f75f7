//! Operation modules: thin orchestration of resource model, session
//! and codec, one module per capability.

pub mod abapgit;
pub mod atc;
pub mod aunit;
pub mod object;

use crate::error::Error;
use crate::poll::PollError;

/// Failure of a polled operation, keeping whatever partial record was
/// decoded before the failure so callers can report it.
#[derive(Debug)]
pub struct RunFailure<T> {
    pub partial: Option<T>,
    pub source: Error,
}

impl<T> From<Error> for RunFailure<T> {
    fn from(source: Error) -> Self {
        Self {
            partial: None,
            source,
        }
    }
}

impl<T> From<PollError<T>> for RunFailure<T> {
    fn from(err: PollError<T>) -> Self {
        let (partial, source) = err.into_parts();
        Self { partial, source }
    }
}
