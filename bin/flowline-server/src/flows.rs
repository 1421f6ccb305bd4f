//! Minimal flow authoring slice (§6): "Flow CRUD endpoints (create/get/
//! update) are external collaborators; the core consumes only their
//! sanitized output through C1 and their persistence through the Flow
//! entity." Only `POST /flows` and `GET /flows/:id` are provided here, the
//! smallest surface that lets the webhook and manual-trigger paths have a
//! flow to operate on end to end; full flow-authoring UX is out of scope.

use axum::extract::{Path, State};
use axum::Json;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use flowline_engine::error::{EngineError, Result};
use flowline_engine::flow::entity::{Channel, Flow, FlowStatus, MetaFlowInfo};
use flowline_engine::flow::sanitize::sanitize;

use crate::state::EngineState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlowRequest {
    pub user_id: String,
    pub name: String,
    pub trigger: String,
    #[serde(default)]
    pub definition: Value,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub trigger: String,
    pub status: String,
    pub definition: Value,
}

fn to_response(flow: &Flow) -> Result<FlowResponse> {
    Ok(FlowResponse {
        id: flow.id_string(),
        user_id: flow.user_id.clone(),
        name: flow.name.clone(),
        trigger: flow.trigger.clone(),
        status: format!("{:?}", flow.status),
        definition: serde_json::to_value(&flow.definition)?,
    })
}

/// `POST /flows` (§6). The definition is run through C1 before it is ever
/// persisted, the same sanitization the update path applies.
#[utoipa::path(
    post,
    path = "",
    tag = "flows",
    request_body = CreateFlowRequest,
    responses(
        (status = 200, description = "Flow created", body = FlowResponse),
        (status = 400, description = "Validation error"),
    ),
)]
pub async fn create_flow(
    State(state): State<EngineState>,
    Json(request): Json<CreateFlowRequest>,
) -> Result<Json<FlowResponse>> {
    if request.name.trim().is_empty() {
        return Err(EngineError::validation("name must be a non-empty string"));
    }
    if request.trigger.trim().is_empty() {
        return Err(EngineError::validation("trigger must be a non-empty string"));
    }

    let definition = sanitize(&request.definition)?;
    let flow = Flow {
        id: None,
        user_id: request.user_id,
        name: request.name,
        trigger: request.trigger,
        status: FlowStatus::Draft,
        channel: Channel::Whatsapp,
        definition,
        meta_flow: MetaFlowInfo::default(),
        updated_at: chrono::Utc::now(),
    };
    let id = state.flow_repo.insert(&flow).await?;
    let flow = Flow { id: Some(id), ..flow };
    Ok(Json(to_response(&flow)?))
}

/// `GET /flows/{flow_id}` (§6).
#[utoipa::path(
    get,
    path = "/{flow_id}",
    tag = "flows",
    params(("flow_id" = String, Path, description = "Flow id")),
    responses(
        (status = 200, description = "Flow found", body = FlowResponse),
        (status = 404, description = "Flow not found"),
    ),
)]
pub async fn get_flow(State(state): State<EngineState>, Path(flow_id): Path<String>) -> Result<Json<FlowResponse>> {
    let object_id =
        ObjectId::parse_str(&flow_id).map_err(|_| EngineError::validation("flowId is not a valid object id"))?;
    let flow = state
        .flow_repo
        .find_by_id(&object_id)
        .await?
        .ok_or_else(|| EngineError::not_found("flow", flow_id))?;
    Ok(Json(to_response(&flow)?))
}

pub fn router(state: EngineState) -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(create_flow, get_flow)).with_state(state)
}
