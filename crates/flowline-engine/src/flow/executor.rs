//! Flow executor (C5, §4.5). Drives a single session forward from a
//! starting node to a paused, terminal, or errored state. Invoked once per
//! inbound event; never blocks the caller beyond the cumulative node
//! side-effects it performs.

use super::condition;
use super::entity::{Edge, Flow, FlowDefinition, Node, NodeType};
use super::node_data::{self, MessageData, NodeData};
use super::template::interpolate;
use crate::context::{get_path, set_path};
use crate::error::ExecutorError;
use crate::log::entity::SessionLog;
use crate::log::repository::LogRepository;
use crate::session::entity::{Session, SessionStatus};
use crate::session::repository::SessionRepository;
use flowline_common::{now_iso8601, push_capped};
use flowline_whatsapp::{client::Credentials, payload::TemplateComponentInput, MediaType, SendRequest, WhatsAppClient};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::warn;

const MAX_STEPS: usize = 500;
const MAX_DELAY_MS: u64 = 60_000;
const HISTORY_CAP: usize = 50;
const API_TIMEOUT: Duration = Duration::from_secs(15);

type Result<T> = std::result::Result<T, ExecutorError>;

fn missing(what: impl Into<String>) -> ExecutorError {
    ExecutorError::MissingReference(what.into())
}

/// What the inbound event that triggered this invocation carries.
#[derive(Debug, Clone, Default)]
pub struct InboundEvent {
    pub text: Option<String>,
    pub interactive_title: Option<String>,
    pub interactive_reply_id: Option<String>,
    pub media: Option<Value>,
}

impl InboundEvent {
    fn effective_text(&self) -> String {
        self.text.clone().or_else(|| self.interactive_title.clone()).unwrap_or_default()
    }
}

/// Everything the executor needs about the owning flow and outbound
/// credentials; assembled by the caller (webhook dispatcher or manual
/// trigger endpoint) from repository lookups.
pub struct ExecutionInput<'a> {
    pub flow: &'a Flow,
    pub credentials: Credentials<'a>,
    pub whatsapp: &'a WhatsAppClient,
    pub recipient_phone: &'a str,
}

/// Run the executor for one inbound event against `session`, persisting
/// state between steps via `session_repo` and a completion `Log` via
/// `log_repo`. Returns the final, persisted session.
pub async fn run(
    session: Session,
    input: &ExecutionInput<'_>,
    inbound: Option<InboundEvent>,
    session_repo: &SessionRepository,
    log_repo: &LogRepository,
) -> Result<Session> {
    let definition = &input.flow.definition;
    let inbound_for_bookkeeping = inbound.clone();

    let Some((mut current_node_id, mut session)) = resolve_start(session, definition, inbound, session_repo).await?
    else {
        // No trigger matched a new walk; inbound silently dropped (§4.5).
        return Ok(session_noop(session));
    };

    if let Some(inbound) = &inbound_for_bookkeeping {
        record_inbound(&mut session, inbound);
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut steps = 0usize;
    let mut final_status = SessionStatus::Active;

    loop {
        steps += 1;
        if steps > MAX_STEPS {
            let err = ExecutorError::RuntimeGuard("step limit of 500 exceeded".to_string());
            return fail(session, session_repo, log_repo, current_node_id, err).await;
        }
        if !visited.insert(current_node_id.clone()) {
            let err = ExecutorError::RuntimeGuard(format!("node {current_node_id} visited twice in one invocation"));
            return fail(session, session_repo, log_repo, current_node_id, err).await;
        }

        let Some(node) = definition.find_node(&current_node_id) else {
            let err = missing(&current_node_id);
            return fail(session, session_repo, log_repo, current_node_id, err).await;
        };

        let data = match node_data::validate(node.node_type, &node.data) {
            Ok(data) => data,
            Err(err) => {
                return fail(session, session_repo, log_repo, current_node_id, err).await;
            }
        };

        let outcome = execute_node(node, &data, &mut session, input, definition).await;
        let next = match outcome {
            Ok(next) => next,
            Err(err) => {
                return fail(session, session_repo, log_repo, current_node_id, err).await;
            }
        };

        match next {
            StepOutcome::Advance(next_id) => {
                current_node_id = next_id;
                session_repo
                    .update_state(
                        session.id.as_ref().expect("persisted session"),
                        SessionStatus::Active,
                        Some(&current_node_id),
                        &session.context,
                    )
                    .await?;
            }
            StepOutcome::Pause => {
                final_status = SessionStatus::Paused;
                break;
            }
            StepOutcome::Complete => {
                final_status = SessionStatus::Completed;
                break;
            }
        }
    }

    let node_id_for_final = if final_status == SessionStatus::Paused { Some(current_node_id) } else { None };
    finish(session, session_repo, log_repo, final_status, node_id_for_final).await
}

fn session_noop(session: Session) -> Session {
    session
}

/// Persist `session` in its final `status` (with a completion `Log`
/// snapshot) and return it successfully. Used for the Paused/Completed
/// exits from the main loop.
async fn finish(
    mut session: Session,
    session_repo: &SessionRepository,
    log_repo: &LogRepository,
    status: SessionStatus,
    current_node_id: Option<String>,
) -> Result<Session> {
    persist_final(&mut session, session_repo, log_repo, status, current_node_id).await?;
    Ok(session)
}

/// Persist `session` as `Errored` (with a completion `Log` snapshot) and
/// re-raise `error` rather than swallowing it (§7: a node/send failure
/// must propagate so the manual-trigger path can surface an HTTP status;
/// the webhook path logs it and still answers 200).
async fn fail(
    mut session: Session,
    session_repo: &SessionRepository,
    log_repo: &LogRepository,
    current_node_id: String,
    error: ExecutorError,
) -> Result<Session> {
    persist_final(&mut session, session_repo, log_repo, SessionStatus::Errored, Some(current_node_id)).await?;
    Err(error)
}

async fn persist_final(
    session: &mut Session,
    session_repo: &SessionRepository,
    log_repo: &LogRepository,
    status: SessionStatus,
    current_node_id: Option<String>,
) -> Result<()> {
    session.status = status;
    session.current_node_id = current_node_id.clone();
    session_repo
        .update_state(session.id.as_ref().expect("persisted session"), status, current_node_id.as_deref(), &session.context)
        .await?;
    let log = SessionLog::snapshot(session.id.expect("persisted session"), status, session.context.clone());
    log_repo.insert(&log).await?;
    Ok(())
}

enum StepOutcome {
    Advance(String),
    Pause,
    Complete,
}

/// Resolve the node to start/resume execution at, per §4.5's three cases.
/// `session` is always handed back; a `None` first element means no new
/// walk should start (inbound dropped).
async fn resolve_start(
    mut session: Session,
    definition: &FlowDefinition,
    inbound: Option<InboundEvent>,
    session_repo: &SessionRepository,
) -> Result<(Option<String>, Session)> {
    if session.status == SessionStatus::Paused {
        if let Some(current_id) = session.current_node_id.clone() {
            let node = definition.find_node(&current_id);
            let is_options = node.map(|n| n.node_type == NodeType::Options).unwrap_or(false);
            if is_options {
                let Some(node) = node else { return Ok((None, session)) };
                let data = node_data::validate(node.node_type, &node.data).map_err(|_| missing(&current_id))?;
                let NodeData::Options { options } = data else { unreachable!() };
                let inbound = inbound.clone().unwrap_or_default();
                let selection = resolve_option_selection(&options, &inbound);
                record_option_selection(&mut session, &selection, &options);
                let handle = match selection {
                    Some(idx) => format!("opt-{idx}"),
                    None => "no-match".to_string(),
                };
                let edge = definition.edge_with_handle(&current_id, &handle).ok_or_else(|| missing(&handle))?;
                if definition.find_node(&edge.target).is_none() {
                    return Err(missing(&edge.target));
                }
                let target = edge.target.clone();
                session_repo
                    .update_state(session.id.as_ref().expect("persisted session"), SessionStatus::Active, Some(&target), &session.context)
                    .await?;
                return Ok((Some(target), session));
            }
            // Paused at a non-options node: resume there directly.
            return Ok((Some(current_id), session));
        }
        // Paused with no current node: nothing to resume.
        return Ok((None, session));
    }

    // New walk: select a trigger node from the inbound text.
    let Some(inbound) = inbound else { return Ok((None, session)) };
    let text = inbound.effective_text();
    let trigger_nodes = definition.trigger_nodes();
    select_trigger_and_start(definition, &trigger_nodes, &text, session).await
}

/// Keywords are validated into owned `String`s first so the
/// `TriggerNodeInput` borrows passed to `select_trigger_node` outlive the
/// short-lived `NodeData` values `node_data::validate` returns.
async fn select_trigger_and_start(
    definition: &FlowDefinition,
    trigger_nodes: &[&Node],
    text: &str,
    mut session: Session,
) -> Result<(Option<String>, Session)> {
    let keywords: Vec<(String, String)> = trigger_nodes
        .iter()
        .filter_map(|n| match node_data::validate(n.node_type, &n.data) {
            Ok(NodeData::Trigger { keyword }) => Some((n.id.clone(), keyword)),
            _ => None,
        })
        .collect();
    let inputs: Vec<super::trigger::TriggerNodeInput> = keywords
        .iter()
        .map(|(id, keyword)| super::trigger::TriggerNodeInput { node_id: id, keyword })
        .collect();
    let Some(chosen) = super::trigger::select_trigger_node(&inputs, text) else {
        return Ok((None, session));
    };
    let node_id = chosen.node_id.to_string();
    if definition.find_node(&node_id).is_none() {
        return Ok((None, session));
    }
    set_path(&mut session.context, "triggerMessage", json!(text));
    Ok((Some(node_id), session))
}

/// Resolve the user's options selection against an inbound event, per
/// §4.5 step 1-2: interactive reply id first (matched against derived
/// button id or `opt-<i>` form), else case/whitespace-insensitive text
/// match. Returns the matched option's index, or `None`.
fn resolve_option_selection(options: &[String], inbound: &InboundEvent) -> Option<usize> {
    if let Some(reply_id) = &inbound.interactive_reply_id {
        for (idx, option) in options.iter().enumerate() {
            if flowline_whatsapp::payload::option_button_id(option) == *reply_id {
                return Some(idx);
            }
        }
        if let Some(stripped) = reply_id.strip_prefix("opt-") {
            if let Ok(idx) = stripped.parse::<usize>() {
                if idx < options.len() {
                    return Some(idx);
                }
            }
        }
    }
    let text = inbound.text.as_deref().unwrap_or("").trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    options.iter().position(|o| o.trim().to_lowercase() == text)
}

fn record_option_selection(session: &mut Session, selection: &Option<usize>, options: &[String]) {
    let entry = json!({
        "type": "option-selection",
        "optionIndex": selection,
        "matchedOption": selection.map(|i| options[i].clone()),
        "timestamp": now_iso8601(),
    });
    append_history(session, entry);
}

fn meta_history_path() -> &'static str {
    "_meta.history"
}

fn append_history(session: &mut Session, entry: Value) {
    let mut history = get_path(&session.context, meta_history_path()).cloned().unwrap_or(json!([]));
    push_capped(&mut history, entry, HISTORY_CAP);
    set_path(&mut session.context, meta_history_path(), history);
}

fn record_inbound(session: &mut Session, inbound: &InboundEvent) {
    session.context["messageCount"] = json!(session.context.get("messageCount").and_then(Value::as_i64).unwrap_or(0) + 1);
    if let Some(text) = &inbound.text {
        session.context["lastUserMessage"] = json!(text);
        session.context["lastUserMessageAt"] = json!(now_iso8601());
        session.context["lastInput"] = json!(text);
        session.context["lastInputAt"] = json!(now_iso8601());
        let mut input_history = get_path(&session.context, "inputHistory").cloned().unwrap_or(json!([]));
        push_capped(&mut input_history, json!(text), HISTORY_CAP);
        set_path(&mut session.context, "inputHistory", input_history);
    }
    if let Some(title) = &inbound.interactive_title {
        session.context["lastInteractiveTitle"] = json!(title);
    }
    if let Some(reply_id) = &inbound.interactive_reply_id {
        session.context["lastInteractiveReplyId"] = json!(reply_id);
    }
    if let Some(media) = &inbound.media {
        session.context["lastUserMedia"] = media.clone();
    }
    append_history(
        session,
        json!({"type": "in", "text": inbound.text, "timestamp": now_iso8601()}),
    );
}

/// Execute a single node, mutating `session.context` and performing any
/// outbound side effects, and return how the walk should continue.
async fn execute_node(
    node: &Node,
    data: &NodeData,
    session: &mut Session,
    input: &ExecutionInput<'_>,
    definition: &FlowDefinition,
) -> Result<StepOutcome> {
    match data {
        NodeData::Trigger { .. } => advance_default(node, definition),
        NodeData::Message(message_data) => {
            match message_data {
                MessageData::Template { template_name, template_language, template_parameters } => {
                    let components = build_template_components(template_parameters, &session.context);
                    let request = SendRequest::Template {
                        name: template_name.clone(),
                        language: template_language.clone(),
                        components,
                    };
                    send(input, &request).await?;
                    record_outbound(session, "out:template", json!({"templateName": template_name}));
                }
                MessageData::Text { text } => {
                    let rendered = interpolate(text, &session.context);
                    let request = SendRequest::Text { body: rendered.clone() };
                    send(input, &request).await?;
                    record_outbound(session, "out:text", json!({"text": rendered}));
                }
            }
            advance_default(node, definition)
        }
        NodeData::Options { options } => {
            let text_source = node.data.get("text").and_then(Value::as_str).unwrap_or("");
            let rendered_text = interpolate(text_source, &session.context);
            let request = SendRequest::Options { body_text: rendered_text, options: options.clone() };
            send(input, &request).await?;
            record_outbound(session, "out:options", json!({"options": options}));
            Ok(StepOutcome::Pause)
        }
        NodeData::Delay { seconds } => {
            let ms = (*seconds).saturating_mul(1000).min(MAX_DELAY_MS);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            advance_default(node, definition)
        }
        NodeData::Condition { expression } => {
            let result = condition::evaluate(expression, &session.context);
            let handle = if result { "true" } else { "false" };
            let edge = definition.edge_with_handle(&node.id, handle).ok_or_else(|| missing(handle))?;
            if definition.find_node(&edge.target).is_none() {
                return Err(missing(&edge.target));
            }
            Ok(StepOutcome::Advance(edge.target.clone()))
        }
        NodeData::Api { url, method, headers, body, assign_to } => {
            let result = call_api(url, method, headers, body, &session.context).await;
            set_path(&mut session.context, assign_to, result);
            advance_default(node, definition)
        }
        NodeData::Assign { key, value } => {
            let rendered = interpolate(value, &session.context);
            set_path(&mut session.context, key, json!(rendered));
            advance_default(node, definition)
        }
        NodeData::Media { media_type, id, url, caption } => {
            let media_type = match media_type.as_str() {
                "image" => MediaType::Image,
                "video" => MediaType::Video,
                "audio" => MediaType::Audio,
                _ => MediaType::Document,
            };
            let rendered_id = id.as_deref().map(|s| interpolate(s, &session.context));
            let rendered_url = url.as_deref().map(|s| interpolate(s, &session.context));
            let rendered_caption = caption.as_deref().map(|s| interpolate(s, &session.context));
            let request = SendRequest::Media { media_type, id: rendered_id, url: rendered_url, caption: rendered_caption.clone() };
            send(input, &request).await?;
            record_outbound(session, "out:media", json!({"caption": rendered_caption}));
            advance_default(node, definition)
        }
        NodeData::WhatsappFlow { body, header, footer, cta } => {
            let flow_id = input.flow.meta_flow.id.clone().ok_or_else(|| ExecutorError::NodeValidation("flow has no metaFlowId".to_string()))?;
            let flow_token = input.flow.meta_flow.token.clone().ok_or_else(|| ExecutorError::NodeValidation("flow has no metaFlowToken".to_string()))?;
            let rendered_body = interpolate(body, &session.context);
            if rendered_body.is_empty() {
                return Err(ExecutorError::NodeValidation("whatsapp_flow body rendered empty".to_string()));
            }
            let request = SendRequest::Flow {
                flow_id,
                flow_token,
                version: input.flow.meta_flow.version.clone(),
                header: header.as_deref().map(|s| interpolate(s, &session.context)),
                footer: footer.as_deref().map(|s| interpolate(s, &session.context)),
                cta: cta.as_deref().map(|s| interpolate(s, &session.context)),
                body: rendered_body,
            };
            send(input, &request).await?;
            record_outbound(session, "out:whatsapp_flow", json!({}));
            advance_default(node, definition)
        }
        NodeData::Handoff { queue, note } => {
            set_path(&mut session.context, "handoffQueue", json!(queue));
            if let Some(note) = note {
                set_path(&mut session.context, "handoffNote", json!(note));
            }
            Ok(StepOutcome::Pause)
        }
        NodeData::Goto { target_node_id } => {
            if definition.find_node(target_node_id).is_none() {
                return Err(missing(target_node_id));
            }
            Ok(StepOutcome::Advance(target_node_id.clone()))
        }
        NodeData::End { reason } => {
            set_path(&mut session.context, "endReason", json!(reason));
            Ok(StepOutcome::Complete)
        }
    }
}

fn advance_default(node: &Node, definition: &FlowDefinition) -> Result<StepOutcome> {
    match definition.first_outgoing_edge(&node.id) {
        Some(edge) => {
            if definition.find_node(&edge.target).is_none() {
                return Err(missing(&edge.target));
            }
            Ok(StepOutcome::Advance(edge.target.clone()))
        }
        None => Ok(StepOutcome::Complete),
    }
}

async fn send(input: &ExecutionInput<'_>, request: &SendRequest) -> Result<()> {
    input
        .whatsapp
        .send(input.credentials, input.recipient_phone, request)
        .await
        .map_err(|err| ExecutorError::SendFailed { status: err.status_code(), message: err.to_string() })?;
    Ok(())
}

fn record_outbound(session: &mut Session, kind: &str, detail: Value) {
    let mut entry = json!({"type": kind, "timestamp": now_iso8601()});
    if let (Some(entry_map), Value::Object(detail_map)) = (entry.as_object_mut(), &detail) {
        for (k, v) in detail_map {
            entry_map.insert(k.clone(), v.clone());
        }
    }
    append_history(session, entry);
    match kind {
        "out:text" => session.context["lastBotMessage"] = detail.get("text").cloned().unwrap_or(Value::Null),
        "out:options" => session.context["lastBotOptions"] = detail.get("options").cloned().unwrap_or(Value::Null),
        "out:media" => session.context["lastBotMedia"] = detail,
        _ => {}
    }
}

fn build_template_components(parameters: &[Value], context: &Value) -> Vec<TemplateComponentInput> {
    let mut groups: HashMap<(String, String, String), Vec<(String, String)>> = HashMap::new();
    let mut order: Vec<(String, String, String)> = Vec::new();
    for param in parameters {
        let component_type = param.get("type").and_then(Value::as_str).unwrap_or("body").to_string();
        let sub_type = param.get("subType").and_then(Value::as_str).unwrap_or("").to_string();
        let index = param
            .get("index")
            .and_then(Value::as_f64)
            .map(|n| n.to_string())
            .unwrap_or_default();
        let key = (component_type.clone(), sub_type.clone(), index.clone());
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        let param_type = param.get("parameterType").and_then(Value::as_str).unwrap_or("text").to_string();
        let raw_text = param.get("text").and_then(Value::as_str).unwrap_or("");
        let rendered = interpolate(raw_text, context);
        groups.entry(key).or_default().push((param_type, rendered));
    }
    order
        .into_iter()
        .map(|(component_type, sub_type, index)| {
            let parameters = groups.remove(&(component_type.clone(), sub_type.clone(), index.clone())).unwrap_or_default();
            TemplateComponentInput {
                component_type,
                sub_type: if sub_type.is_empty() { None } else { Some(sub_type) },
                index: if index.is_empty() { None } else { index.parse().ok() },
                parameters,
            }
        })
        .collect()
}

async fn call_api(url: &str, method: &str, headers: &HashMap<String, String>, body: &str, context: &Value) -> Value {
    let rendered_url = interpolate(url, context);
    let rendered_body = interpolate(body, context);
    let client = reqwest::Client::new();
    let mut builder = client.request(
        method.parse().unwrap_or(reqwest::Method::GET),
        &rendered_url,
    );
    for (key, value) in headers {
        builder = builder.header(key, interpolate(value, context));
    }
    let no_body = matches!(method, "GET" | "HEAD");
    if !no_body && !rendered_body.is_empty() {
        builder = builder.body(rendered_body);
    }
    let result = tokio::time::timeout(API_TIMEOUT, builder.send()).await;
    match result {
        Ok(Ok(response)) => match response.text().await {
            Ok(text) => serde_json::from_str::<Value>(&text).unwrap_or(json!(text)),
            Err(_) => json!({"error": "API call failed"}),
        },
        Ok(Err(err)) => {
            warn!(error = %err, "api node call failed");
            json!({"error": "API call failed"})
        }
        Err(_) => {
            warn!("api node call timed out");
            json!({"error": "API call failed"})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_option_selection_matches_derived_button_id() {
        let options = vec!["Yes please".to_string(), "No".to_string()];
        let inbound = InboundEvent { interactive_reply_id: Some("yes_please".to_string()), ..Default::default() };
        assert_eq!(resolve_option_selection(&options, &inbound), Some(0));
    }

    #[test]
    fn resolve_option_selection_matches_opt_index_fallback() {
        let options = vec!["Yes".to_string(), "No".to_string()];
        let inbound = InboundEvent { interactive_reply_id: Some("opt-1".to_string()), ..Default::default() };
        assert_eq!(resolve_option_selection(&options, &inbound), Some(1));
    }

    #[test]
    fn resolve_option_selection_falls_back_to_text_match() {
        let options = vec!["Yes".to_string(), "No".to_string()];
        let inbound = InboundEvent { text: Some(" no ".to_string()), ..Default::default() };
        assert_eq!(resolve_option_selection(&options, &inbound), Some(1));
    }

    #[test]
    fn resolve_option_selection_no_match_returns_none() {
        let options = vec!["Yes".to_string()];
        let inbound = InboundEvent { text: Some("maybe".to_string()), ..Default::default() };
        assert_eq!(resolve_option_selection(&options, &inbound), None);
    }

    #[test]
    fn history_push_caps_at_fifty() {
        let mut session = Session::new_active(bson::oid::ObjectId::new(), bson::oid::ObjectId::new());
        for i in 0..60 {
            append_history(&mut session, json!({"i": i}));
        }
        let history = get_path(&session.context, "_meta.history").unwrap().as_array().unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0]["i"], json!(10));
    }

    #[test]
    fn build_template_components_groups_by_type_subtype_index() {
        let params = vec![
            json!({"type": "body", "text": "hi {{name}}"}),
            json!({"type": "header", "subType": "text", "index": 0, "text": "hdr"}),
        ];
        let ctx = json!({"name": "Ana"});
        let components = build_template_components(&params, &ctx);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].parameters[0].1, "hi Ana");
    }
}
