//! Session resolution (§4.6, C6 session half).

use super::entity::{Session, SessionStatus};
use super::repository::SessionRepository;
use crate::error::Result;
use crate::flow::repository::FlowRepository;
use bson::oid::ObjectId;

/// `ensureActiveSessionForFlow` (§4.6): create an Active session if none
/// exists for `(contact_id, flow_id)`; reset a Completed/Errored session
/// back to Active; leave a Paused session as-is for the executor to
/// resume.
pub async fn ensure_active_session_for_flow(
    repo: &SessionRepository,
    contact_id: ObjectId,
    flow_id: ObjectId,
) -> Result<Session> {
    match repo.find_by_contact_and_flow(&contact_id, &flow_id).await? {
        None => {
            let session = Session::new_active(contact_id, flow_id);
            let id = repo.insert(&session).await?;
            Ok(Session { id: Some(id), ..session })
        }
        Some(mut session) => {
            if matches!(session.status, SessionStatus::Completed | SessionStatus::Errored) {
                let id = session.id.expect("persisted session has an id");
                repo.reset_to_active(&id).await?;
                session.reset_to_active();
            }
            Ok(session)
        }
    }
}

/// For an inbound webhook message: prefer the contact's existing
/// Active/Paused session over starting a new one. If that session's flow
/// is no longer `Active`, it is dropped (not returned) so the caller
/// reselects a flow via trigger matching (§4.3) instead.
pub async fn resolve_open_session_for_webhook(
    session_repo: &SessionRepository,
    flow_repo: &FlowRepository,
    contact_id: &ObjectId,
) -> Result<Option<Session>> {
    let Some(session) = session_repo.find_latest_open_by_contact(contact_id).await? else {
        return Ok(None);
    };
    if flow_repo.is_active_whatsapp(&session.flow_id).await? {
        Ok(Some(session))
    } else {
        Ok(None)
    }
}
