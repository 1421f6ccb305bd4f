//! Manual trigger endpoint (§6): `POST /flows/:flowId/trigger`. Bypasses
//! C3's flow-selection and C7's webhook envelope entirely, driving C6
//! (contact/session resolution) straight into C5 (the executor) for a
//! caller-specified flow — the path a testing tool or an external
//! integration uses to kick off a conversation without an inbound Meta
//! event.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use flowline_engine::context::set_path;
use flowline_engine::contact::{get_or_create_contact, GetOrCreateContactInput};
use flowline_engine::error::{EngineError, Result};
use flowline_engine::flow::executor::{self, ExecutionInput, InboundEvent};
use flowline_engine::session::resolver::ensure_active_session_for_flow;
use flowline_whatsapp::client::Credentials;

use crate::state::EngineState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub from: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default)]
    pub incoming_meta: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl TriggerResponse {
    fn failure(err: EngineError) -> Self {
        let status = err.status_code().as_u16();
        Self { success: false, flow_id: None, contact_id: None, session_id: None, error: Some(err.to_string()), status: Some(status) }
    }
}

fn validate(request: &TriggerRequest) -> Result<()> {
    if request.from.trim().is_empty() {
        return Err(EngineError::validation("from must be a non-empty string"));
    }
    if let Some(variables) = &request.variables {
        if !variables.is_object() {
            return Err(EngineError::validation("variables must be an object"));
        }
    }
    Ok(())
}

/// `POST /flows/{flow_id}/trigger` (§6).
#[utoipa::path(
    post,
    path = "/{flow_id}/trigger",
    tag = "flows",
    params(("flow_id" = String, Path, description = "Flow id to drive")),
    request_body = TriggerRequest,
    responses(
        (status = 200, description = "Flow triggered successfully", body = TriggerResponse),
        (status = 400, description = "Invalid request or flow data", body = TriggerResponse),
        (status = 404, description = "Flow, user, or referenced node not found", body = TriggerResponse),
        (status = 502, description = "Outbound WhatsApp send failed", body = TriggerResponse),
        (status = 500, description = "Internal error (database, guard, or serialization failure)", body = TriggerResponse),
    ),
)]
pub async fn trigger_flow(
    State(state): State<EngineState>,
    Path(flow_id): Path<String>,
    Json(request): Json<TriggerRequest>,
) -> (StatusCode, Json<TriggerResponse>) {
    match run_trigger(&state, &flow_id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(err) => {
            let status = err.status_code();
            (status, Json(TriggerResponse::failure(err)))
        }
    }
}

async fn run_trigger(state: &EngineState, flow_id: &str, request: TriggerRequest) -> Result<TriggerResponse> {
    validate(&request)?;

    let flow_object_id =
        ObjectId::parse_str(flow_id).map_err(|_| EngineError::validation("flowId is not a valid object id"))?;
    let flow = state
        .flow_repo
        .find_by_id(&flow_object_id)
        .await?
        .ok_or_else(|| EngineError::not_found("flow", flow_id.to_string()))?;
    let user = state
        .user_repo
        .find_by_id(&ObjectId::parse_str(&flow.user_id).map_err(|_| EngineError::validation("flow has an invalid user id"))?)
        .await?
        .ok_or_else(|| EngineError::not_found("user", flow.user_id.clone()))?;

    let contact = get_or_create_contact(
        &state.contact_repo,
        GetOrCreateContactInput {
            user_id: &flow.user_id,
            phone: &request.from,
            name: request.name.as_deref(),
            alternate_phones: &[],
        },
    )
    .await?;
    let contact_id = contact.id.expect("persisted contact has an id");

    let mut session = ensure_active_session_for_flow(&state.session_repo, contact_id, flow_object_id).await?;

    if let Some(Value::Object(variables)) = &request.variables {
        for (key, value) in variables {
            set_path(&mut session.context, key, value.clone());
        }
    }

    let inbound = InboundEvent {
        text: request.message,
        interactive_title: None,
        interactive_reply_id: None,
        media: request.incoming_meta,
    };

    let credentials = Credentials { access_token: &user.access_token, phone_number_id: &user.meta_phone_number_id };
    let input = ExecutionInput { flow: &flow, credentials, whatsapp: &state.whatsapp, recipient_phone: &request.from };

    let session = executor::run(session, &input, Some(inbound), &state.session_repo, &state.log_repo)
        .await
        .map_err(EngineError::from)?;

    Ok(TriggerResponse {
        success: true,
        flow_id: Some(flow.id_string()),
        contact_id: Some(contact.id_string()),
        session_id: Some(session.id_string()),
        error: None,
        status: None,
    })
}

pub fn router(state: EngineState) -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(trigger_flow)).with_state(state)
}
