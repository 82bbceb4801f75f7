//! abapGit repository management: list, link, pull-with-poll.

use std::cell::RefCell;

use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::ops::RunFailure;
use crate::poll::{self, PollConfig};
use crate::session::{RequestEnvelope, SessionClient};
use crate::types::{PullResult, RepoInfo};

const REPOS_PATH: &str = "abapgit/repos";
const REPOS_ACCEPT: &str = "application/abapgit.adt.repos.v1+xml";
const REPO_CONTENT_TYPE: &str = "application/abapgit.adt.repo.v1+xml";

/// List the repositories linked on the system.
pub async fn repos(session: &mut SessionClient) -> Result<Vec<RepoInfo>> {
    let envelope = RequestEnvelope::get(REPOS_PATH).accept(REPOS_ACCEPT);
    let response = session.execute(&envelope).await?;
    let decoded = codec::decode_abapgit_repos(&response.bytes().await?)?;

    if decoded.incomplete {
        warn!("Repository list was partially decoded; some entries may lack fields");
    }
    Ok(decoded.value)
}

/// Link a repository to a development package.
pub async fn link(
    session: &mut SessionClient,
    url: &str,
    package: &str,
    branch: &str,
) -> Result<()> {
    let body = codec::encode_abapgit_link(url, package, branch);
    let envelope = RequestEnvelope::post(REPOS_PATH)
        .content_type(REPO_CONTENT_TYPE)
        .body(body);

    session.execute(&envelope).await?;
    debug!(package, url, "Repository linked");
    Ok(())
}

/// Pull the repository linked to the given package and poll the
/// repository status until the pull succeeded, hit a conflict or
/// failed.
pub async fn pull(
    session: &mut SessionClient,
    config: &PollConfig,
    package: &str,
) -> std::result::Result<PullResult, RunFailure<PullResult>> {
    let package = package.to_uppercase();
    let repo = repos(session)
        .await?
        .into_iter()
        .find(|r| r.package.eq_ignore_ascii_case(&package))
        .ok_or_else(|| Error::RepoNotFound(package.clone()))?;

    let envelope = RequestEnvelope::post(format!("{}/{}/pull", REPOS_PATH, repo.key))
        .content_type(REPO_CONTENT_TYPE)
        .body(codec::encode_abapgit_pull(Some(&repo.branch)));
    session.execute(&envelope).await?;
    debug!(package = %package, key = %repo.key, "Pull submitted");

    let status_path = format!("{}/{}", REPOS_PATH, repo.key);
    let poll_config = PollConfig {
        immediate_first: false,
        ..config.clone()
    };

    let cell = RefCell::new(session);
    let fetch = || {
        let path = status_path.clone();
        let cell = &cell;
        async move {
            let envelope = RequestEnvelope::get(path).accept(REPOS_ACCEPT);
            let response = cell.borrow_mut().execute(&envelope).await?;
            let bytes = response.bytes().await?;
            Ok(codec::decode_abapgit_pull_status(&bytes)?.value)
        }
    };

    poll::poll(
        &poll_config,
        fetch,
        |r: &PullResult| r.status.is_pull_terminal(),
        poll::interrupted,
    )
    .await
    .map_err(RunFailure::from)
}
