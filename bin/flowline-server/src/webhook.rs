//! Meta webhook verification and inbound dispatch (C7, §4.7, §6).
//!
//! The pure parsing/projection half of C7 lives in
//! `flowline_engine::webhook`; this module holds the side-effecting half
//! that needs live repository handles: tenant resolution, the
//! statuses-vs-messages branch, contact/session resolution (C6), flow
//! selection (C3) for a fresh walk, and the executor invocation (C5).
//! Grounded on `fc-platform/src/role/api.rs`'s handler/router composition.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use flowline_engine::broadcast::reconciler::reconcile_one;
use flowline_engine::contact::{get_or_create_contact, GetOrCreateContactInput};
use flowline_engine::error::{EngineError, Result};
use flowline_engine::flow::executor::{self, ExecutionInput};
use flowline_engine::flow::trigger::{self, FlowTriggerInput};
use flowline_engine::session::resolver::{ensure_active_session_for_flow, resolve_open_session_for_webhook};
use flowline_engine::webhook::{extract_change_values, profile_name_for, trigger_match_fields, ChangeValue, InboundMessage};
use flowline_whatsapp::client::Credentials;

use crate::state::EngineState;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// `GET /meta/webhook` subscription handshake (§4.7 "Verification", §6).
#[utoipa::path(
    get,
    path = "",
    tag = "webhook",
    params(
        ("hub.mode" = Option<String>, Query, description = "Always \"subscribe\" for Meta's handshake"),
        ("hub.verify_token" = Option<String>, Query, description = "Token to compare against the configured secret"),
        ("hub.challenge" = Option<String>, Query, description = "Opaque value echoed back on a match"),
    ),
    responses(
        (status = 200, description = "Verification succeeded, challenge echoed back"),
        (status = 400, description = "Missing mode or challenge"),
        (status = 403, description = "Verify token mismatch"),
    ),
)]
pub async fn verify(State(state): State<EngineState>, Query(query): Query<VerifyQuery>) -> Response {
    let (Some(mode), Some(challenge)) = (query.mode.as_deref(), query.challenge.as_deref()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let token_matches = query.verify_token.as_deref() == Some(state.verify_token.as_str());
    if mode == "subscribe" && token_matches {
        challenge.to_string().into_response()
    } else {
        StatusCode::FORBIDDEN.into_response()
    }
}

/// `POST /meta/webhook` inbound dispatch (§4.7, §6). Always answers 200
/// once the body parses, even if every change value inside it is dropped
/// or every message it contains errors — one tenant's bad session must
/// never hold up Meta's delivery of the rest of the batch.
#[utoipa::path(
    post,
    path = "",
    tag = "webhook",
    request_body = Value,
    responses(
        (status = 200, description = "Batch accepted"),
        (status = 400, description = "Malformed payload"),
    ),
)]
pub async fn receive(State(state): State<EngineState>, Json(body): Json<Value>) -> Response {
    for change in extract_change_values(&body) {
        if let Err(err) = dispatch_change(&state, &change).await {
            warn!(error = %err, "webhook change value processing failed");
        }
    }

    StatusCode::OK.into_response()
}

async fn dispatch_change(state: &EngineState, change: &ChangeValue) -> Result<()> {
    let Some(metadata) = &change.metadata else {
        return Ok(());
    };
    if metadata.phone_number_id.is_empty() {
        return Ok(());
    }
    let Some(user) = state.user_repo.find_by_phone_number_id(&metadata.phone_number_id).await? else {
        warn!(phone_number_id = %metadata.phone_number_id, "webhook: no tenant for phone number id");
        return Ok(());
    };
    let user_id = user.id_string();

    for status in &change.statuses {
        if let Err(err) = reconcile_one(&state.broadcast_repo, &user_id, status).await {
            warn!(error = %err, message_id = %status.id, "broadcast reconciliation failed");
        }
    }

    for message in &change.messages {
        let contact_name = profile_name_for(&change.contacts, &message.from);
        if let Err(err) = dispatch_message(state, &user_id, &user, message, contact_name).await {
            warn!(error = %err, from = %message.from, "inbound message processing failed");
        }
    }

    Ok(())
}

async fn dispatch_message(
    state: &EngineState,
    user_id: &str,
    user: &flowline_engine::user::User,
    message: &InboundMessage,
    contact_name: Option<&str>,
) -> Result<()> {
    if message.from.is_empty() {
        return Ok(());
    }

    let contact = get_or_create_contact(
        &state.contact_repo,
        GetOrCreateContactInput { user_id, phone: &message.from, name: contact_name, alternate_phones: &[] },
    )
    .await?;
    let contact_id = contact.id.expect("persisted contact has an id");

    let existing = resolve_open_session_for_webhook(&state.session_repo, &state.flow_repo, &contact_id).await?;
    let (flow, session) = match existing {
        Some(session) => {
            let flow = state
                .flow_repo
                .find_by_id(&session.flow_id)
                .await?
                .ok_or_else(|| EngineError::not_found("flow", session.flow_id.to_hex()))?;
            (flow, session)
        }
        None => {
            let fields = trigger_match_fields(message);
            let candidates = state.flow_repo.find_active_whatsapp_by_user(user_id).await?;
            let ids: Vec<String> = candidates.iter().map(|f| f.id_string()).collect();
            let inputs: Vec<FlowTriggerInput> = candidates
                .iter()
                .zip(ids.iter())
                .map(|(f, id)| FlowTriggerInput { id, trigger: &f.trigger, updated_at: f.updated_at })
                .collect();
            let selected =
                trigger::select_flow(&inputs, &fields.full_text, &fields.interactive_title, &fields.interactive_id);
            let Some(selected_id) = selected.map(|f| f.id.to_string()) else {
                info!(%user_id, from = %message.from, "no flow matched inbound message, dropping");
                return Ok(());
            };
            let flow_id = ObjectId::parse_str(&selected_id)
                .map_err(|_| EngineError::validation("selected flow id is not a valid object id"))?;
            let flow = state
                .flow_repo
                .find_by_id(&flow_id)
                .await?
                .ok_or_else(|| EngineError::not_found("flow", selected_id))?;
            let session = ensure_active_session_for_flow(&state.session_repo, contact_id, flow_id).await?;
            (flow, session)
        }
    };

    let inbound = flowline_engine::webhook::message_to_inbound_event(message);
    let credentials = Credentials { access_token: &user.access_token, phone_number_id: &user.meta_phone_number_id };
    let input = ExecutionInput {
        flow: &flow,
        credentials,
        whatsapp: &state.whatsapp,
        recipient_phone: &message.from,
    };

    executor::run(session, &input, Some(inbound), &state.session_repo, &state.log_repo)
        .await
        .map_err(EngineError::from)?;
    Ok(())
}

pub fn router(state: EngineState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(verify, receive))
        .with_state(state)
}
