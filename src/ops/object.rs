//! Object lifecycle operations: create, read/write source, activate.

use tracing::{debug, warn};

use crate::codec;
use crate::error::Result;
use crate::resource::{self, ObjectRef, ResourceOp, ACTIVATION_PATH};
use crate::session::{RequestEnvelope, SessionClient};
use crate::types::{BatchReport, ObjectOutcome};

/// Create an object in its development package. The logged-in user
/// becomes the responsible user.
pub async fn create(
    session: &mut SessionClient,
    obj: &ObjectRef,
    description: &str,
) -> Result<()> {
    let resource = resource::resolve(obj, ResourceOp::Create)?;
    let body = codec::encode_object_metadata(obj, description, session.user(), "EN");

    let envelope = RequestEnvelope::post(resource.path)
        .content_type(resource.content_type)
        .body(body);

    session.execute(&envelope).await?;
    debug!(name = %obj.name, kind = %obj.kind, "Object created");
    Ok(())
}

/// Download the main source of an object as plain text.
pub async fn read_source(session: &mut SessionClient, obj: &ObjectRef) -> Result<String> {
    let resource = resource::resolve(obj, ResourceOp::Source)?;
    let envelope = RequestEnvelope::get(resource.path).accept(resource.accept);

    let response = session.execute(&envelope).await?;
    Ok(response.text().await?)
}

/// Upload the main source of an object. The object is locked for the
/// duration of the upload and unlocked afterwards, also on failure.
pub async fn write_source(
    session: &mut SessionClient,
    obj: &ObjectRef,
    text: &str,
) -> Result<()> {
    let lock_resource = resource::resolve(obj, ResourceOp::Lock)?;
    let source_resource = resource::resolve(obj, ResourceOp::Source)?;

    let lock_envelope = RequestEnvelope::post(lock_resource.path.clone())
        .query("_action", "LOCK")
        .query("accessMode", "MODIFY")
        .accept(lock_resource.accept)
        .stateful();
    let response = session.execute(&lock_envelope).await?;
    let handle = codec::decode_lock_handle(&response.bytes().await?)?;
    debug!(name = %obj.name, "Object locked");

    let put_envelope = RequestEnvelope::put(source_resource.path)
        .query("lockHandle", handle.clone())
        .content_type(source_resource.content_type)
        .stateful()
        .body(text);
    let write_result = session.execute(&put_envelope).await.map(|_| ());

    let unlock_envelope = RequestEnvelope::post(lock_resource.path)
        .query("_action", "UNLOCK")
        .query("lockHandle", handle)
        .stateful();
    if let Err(e) = session.execute(&unlock_envelope).await {
        // The lock dies with the stateful session; losing the unlock
        // must not mask a write failure.
        warn!(name = %obj.name, error = %e, "Failed to unlock object");
    }

    write_result
}

/// Activate objects one by one, in submission order. A failure of one
/// object never aborts the rest; the aggregate report succeeds only if
/// every object succeeded. Fatal authentication errors abort the whole
/// batch since no further request can succeed.
pub async fn activate(
    session: &mut SessionClient,
    objects: &[ObjectRef],
) -> Result<BatchReport> {
    let mut report = BatchReport::default();

    for obj in objects {
        match activate_one(session, obj).await {
            Ok(outcome) => report.push(outcome),
            Err(e) if e.is_fatal_auth() => return Err(e),
            Err(e) => report.push(ObjectOutcome::failed(&obj.name, vec![e.to_string()])),
        }
    }

    Ok(report)
}

async fn activate_one(session: &mut SessionClient, obj: &ObjectRef) -> Result<ObjectOutcome> {
    let body = codec::encode_activation_request(std::slice::from_ref(obj));
    let envelope = RequestEnvelope::post(ACTIVATION_PATH)
        .query("method", "activate")
        .query("preauditRequested", "true")
        .content_type("application/xml")
        .accept("application/xml")
        .body(body);

    let response = session.execute(&envelope).await?;
    let bytes = response.bytes().await?;

    if bytes.is_empty() {
        return Ok(ObjectOutcome::succeeded(&obj.name));
    }

    let decoded = codec::decode_activation_messages(&bytes)?;
    let mut messages: Vec<String> = decoded
        .value
        .iter()
        .map(|m| format!("{}: {}", m.typ, m.text))
        .collect();
    if decoded.incomplete {
        messages.push("(activation response partially decoded)".to_string());
    }

    let failed = decoded.value.iter().any(|m| m.is_error());
    if failed {
        Ok(ObjectOutcome::failed(&obj.name, messages))
    } else {
        let mut outcome = ObjectOutcome::succeeded(&obj.name);
        outcome.messages = messages;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::resource::ObjectKind;

    #[test]
    fn test_write_source_rejects_packages_before_any_network_call() {
        // resolve() fails locally; no session is ever touched. Verified
        // here through the same resolution the operation performs first.
        let package = ObjectRef::new(ObjectKind::Package, "ZDEMO");
        assert!(matches!(
            resource::resolve(&package, ResourceOp::Lock),
            Err(Error::UnsupportedObjectKind { .. })
        ));
    }
}
