//! Inbound webhook payload shapes and dispatch fan-out (C7, §4.7).
//!
//! This module only covers the pure, side-effect-free half of C7: parsing
//! the two accepted envelope shapes into a flat list of `ChangeValue`s and
//! projecting an `InboundMessage` into the executor's `InboundEvent` and
//! the trigger matcher's flat-text inputs. Tenant resolution, session
//! lookup, and the statuses-vs-messages branch that actually calls C3/C5/C8
//! live in the HTTP binary, where the repository handles are available
//! (grounded on `fc-platform/src/role/api.rs`'s handler/router composition
//! style).

use crate::flow::executor::InboundEvent;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookProfile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<WebhookProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundText {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundReply {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundInteractive {
    #[serde(default, rename = "type")]
    pub interactive_type: String,
    #[serde(default)]
    pub button_reply: Option<InboundReply>,
    #[serde(default)]
    pub list_reply: Option<InboundReply>,
}

impl InboundInteractive {
    fn reply(&self) -> Option<&InboundReply> {
        self.button_reply.as_ref().or(self.list_reply.as_ref())
    }
}

/// One `messages[]` entry. Media blobs (`image`/`video`/`audio`/
/// `document`/`sticker`) are kept as opaque JSON — per §9's open question,
/// neither this engine nor the source it was distilled from validates
/// their contents, so they pass through as `Value`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default, rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<InboundText>,
    #[serde(default)]
    pub interactive: Option<InboundInteractive>,
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default)]
    pub video: Option<Value>,
    #[serde(default)]
    pub audio: Option<Value>,
    #[serde(default)]
    pub document: Option<Value>,
    #[serde(default)]
    pub sticker: Option<Value>,
}

impl InboundMessage {
    fn media(&self) -> Option<Value> {
        [&self.image, &self.video, &self.audio, &self.document, &self.sticker]
            .into_iter()
            .find_map(Clone::clone)
    }
}

/// One `entry[].changes[].value` object (or the standalone `{field,
/// value}` form's `value`), §4.7.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<crate::broadcast::reconciler::InboundStatus>,
}

/// Extract the flat list of change values from a raw webhook POST body,
/// accepting either the batched `entry[].changes[].value` envelope or the
/// standalone `{field?, value}` form (§4.7). Entries that fail to parse
/// into a `ChangeValue` shape are skipped rather than aborting the whole
/// batch — one malformed change must not stop its siblings.
pub fn extract_change_values(body: &Value) -> Vec<ChangeValue> {
    if let Some(entries) = body.get("entry").and_then(Value::as_array) {
        let mut out = Vec::new();
        for entry in entries {
            let Some(changes) = entry.get("changes").and_then(Value::as_array) else { continue };
            for change in changes {
                let Some(value) = change.get("value") else { continue };
                if let Ok(change_value) = serde_json::from_value::<ChangeValue>(value.clone()) {
                    out.push(change_value);
                }
            }
        }
        return out;
    }

    body.get("value")
        .and_then(|value| serde_json::from_value::<ChangeValue>(value.clone()).ok())
        .into_iter()
        .collect()
}

/// Resolve a profile name for `wa_id` from a change value's `contacts[]`
/// (§4.7 step 3: "index `contacts[]` by `wa_id` for profile-name lookup").
pub fn profile_name_for<'a>(contacts: &'a [WebhookContact], wa_id: &str) -> Option<&'a str> {
    contacts
        .iter()
        .find(|c| c.wa_id == wa_id)
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.as_deref())
}

/// Project an inbound message into the executor's `InboundEvent` (§4.5).
pub fn message_to_inbound_event(message: &InboundMessage) -> InboundEvent {
    let text = message.text.as_ref().map(|t| t.body.clone());
    let reply = message.interactive.as_ref().and_then(InboundInteractive::reply);
    InboundEvent {
        text,
        interactive_title: reply.map(|r| r.title.clone()),
        interactive_reply_id: reply.map(|r| r.id.clone()),
        media: message.media(),
    }
}

/// The three text fields the flow-selection half of the trigger matcher
/// (§4.3) scores against: full text, interactive title, interactive id.
pub struct TriggerMatchFields {
    pub full_text: String,
    pub interactive_title: String,
    pub interactive_id: String,
}

pub fn trigger_match_fields(message: &InboundMessage) -> TriggerMatchFields {
    let reply = message.interactive.as_ref().and_then(InboundInteractive::reply);
    TriggerMatchFields {
        full_text: message.text.as_ref().map(|t| t.body.clone()).unwrap_or_default(),
        interactive_title: reply.map(|r| r.title.clone()).unwrap_or_default(),
        interactive_id: reply.map(|r| r.id.clone()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_batched_envelope() {
        let body = json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "metadata": {"phone_number_id": "123"},
                        "messages": [{"from": "54911", "type": "text", "text": {"body": "hola"}}],
                    }
                }]
            }]
        });
        let values = extract_change_values(&body);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].metadata.as_ref().unwrap().phone_number_id, "123");
        assert_eq!(values[0].messages[0].from, "54911");
    }

    #[test]
    fn extracts_from_standalone_envelope() {
        let body = json!({
            "field": "messages",
            "value": {
                "metadata": {"phone_number_id": "123"},
                "statuses": [{"id": "wamid.1", "status": "sent"}],
            }
        });
        let values = extract_change_values(&body);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].statuses.len(), 1);
    }

    #[test]
    fn malformed_change_is_skipped_not_fatal() {
        let body = json!({
            "entry": [{"changes": [{"value": "not an object"}]}]
        });
        assert_eq!(extract_change_values(&body).len(), 0);
    }

    #[test]
    fn message_to_inbound_event_prefers_interactive_button_reply() {
        let message: InboundMessage = serde_json::from_value(json!({
            "from": "1",
            "type": "interactive",
            "interactive": {"type": "button_reply", "button_reply": {"id": "opt-0", "title": "Yes"}},
        }))
        .unwrap();
        let event = message_to_inbound_event(&message);
        assert_eq!(event.interactive_reply_id.as_deref(), Some("opt-0"));
        assert_eq!(event.interactive_title.as_deref(), Some("Yes"));
    }

    #[test]
    fn media_blob_passes_through_opaque() {
        let message: InboundMessage = serde_json::from_value(json!({
            "from": "1",
            "type": "image",
            "image": {"id": "media-1", "mime_type": "image/jpeg"},
        }))
        .unwrap();
        let event = message_to_inbound_event(&message);
        assert_eq!(event.media.unwrap()["id"], "media-1");
    }

    #[test]
    fn profile_name_lookup_by_wa_id() {
        let contacts = vec![WebhookContact {
            wa_id: "54911".to_string(),
            profile: Some(WebhookProfile { name: Some("Ana".to_string()) }),
        }];
        assert_eq!(profile_name_for(&contacts, "54911"), Some("Ana"));
        assert_eq!(profile_name_for(&contacts, "other"), None);
    }
}
