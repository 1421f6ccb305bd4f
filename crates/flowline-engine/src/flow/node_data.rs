//! Per-node-type data contracts (§4.1 table) and their validation,
//! performed lazily at node-execution time rather than at sanitize time
//! (§4.1: "used at node execution rather than at sanitize time").

use super::entity::NodeType;
use crate::error::ExecutorError;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum NodeData {
    Trigger { keyword: String },
    Message(MessageData),
    Options { options: Vec<String> },
    Delay { seconds: u64 },
    Condition { expression: String },
    Api {
        url: String,
        method: String,
        headers: HashMap<String, String>,
        body: String,
        assign_to: String,
    },
    Assign { key: String, value: String },
    Media {
        media_type: String,
        id: Option<String>,
        url: Option<String>,
        caption: Option<String>,
    },
    WhatsappFlow {
        body: String,
        header: Option<String>,
        footer: Option<String>,
        cta: Option<String>,
    },
    Handoff { queue: String, note: Option<String> },
    Goto { target_node_id: String },
    End { reason: String },
}

#[derive(Debug, Clone)]
pub enum MessageData {
    Template {
        template_name: String,
        template_language: String,
        template_parameters: Vec<Value>,
    },
    Text { text: String },
}

fn str_field(data: &Value, field: &str) -> Option<&str> {
    data.get(field).and_then(Value::as_str)
}

fn fail(message: impl Into<String>) -> ExecutorError {
    ExecutorError::NodeValidation(message.into())
}

/// Validate `data` against the contract for `node_type`, per §4.1's table.
pub fn validate(node_type: NodeType, data: &Value) -> Result<NodeData, ExecutorError> {
    match node_type {
        NodeType::Trigger => {
            let keyword = str_field(data, "keyword").unwrap_or("");
            if keyword.is_empty() || keyword.chars().count() > 64 {
                return Err(fail("trigger.keyword must be 1-64 chars"));
            }
            Ok(NodeData::Trigger { keyword: keyword.to_string() })
        }
        NodeType::Message => {
            let use_template = data.get("useTemplate").and_then(Value::as_bool).unwrap_or(false);
            if use_template {
                let name = str_field(data, "templateName").unwrap_or("");
                let language = str_field(data, "templateLanguage").unwrap_or("");
                if name.is_empty() || language.is_empty() {
                    return Err(fail("message.templateName/templateLanguage required when useTemplate"));
                }
                let parameters = data
                    .get("templateParameters")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                Ok(NodeData::Message(MessageData::Template {
                    template_name: name.to_string(),
                    template_language: language.to_string(),
                    template_parameters: parameters,
                }))
            } else {
                let text = str_field(data, "text").unwrap_or("");
                if text.is_empty() || text.chars().count() > 4096 {
                    return Err(fail("message.text must be 1-4096 chars"));
                }
                Ok(NodeData::Message(MessageData::Text { text: text.to_string() }))
            }
        }
        NodeType::Options => {
            let options: Vec<String> = data
                .get("options")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if options.len() < 2 || options.len() > 10 {
                return Err(fail("options.options must have 2-10 entries"));
            }
            if options.iter().any(|o| o.is_empty() || o.chars().count() > 30) {
                return Err(fail("each option must be 1-30 chars"));
            }
            Ok(NodeData::Options { options })
        }
        NodeType::Delay => {
            let seconds = data.get("seconds").and_then(Value::as_u64).unwrap_or(0);
            if !(1..=3600).contains(&seconds) {
                return Err(fail("delay.seconds must be 1-3600"));
            }
            Ok(NodeData::Delay { seconds })
        }
        NodeType::Condition => {
            let expression = str_field(data, "expression").unwrap_or("");
            if expression.is_empty() || expression.chars().count() > 500 {
                return Err(fail("condition.expression must be 1-500 chars"));
            }
            Ok(NodeData::Condition { expression: expression.to_string() })
        }
        NodeType::Api => {
            let url = str_field(data, "url").unwrap_or("");
            if url::Url::parse(url).is_err() {
                return Err(fail("api.url must be a valid URL"));
            }
            let method = str_field(data, "method").unwrap_or("GET").to_uppercase();
            if !["GET", "POST", "PUT", "PATCH", "DELETE"].contains(&method.as_str()) {
                return Err(fail("api.method must be GET/POST/PUT/PATCH/DELETE"));
            }
            let headers = data
                .get("headers")
                .and_then(Value::as_object)
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();
            let body = str_field(data, "body").unwrap_or("").to_string();
            let assign_to = str_field(data, "assignTo").unwrap_or("apiResult").to_string();
            Ok(NodeData::Api { url: url.to_string(), method, headers, body, assign_to })
        }
        NodeType::Assign => {
            let key = str_field(data, "key").unwrap_or("");
            if key.is_empty() || key.chars().count() > 50 {
                return Err(fail("assign.key must be 1-50 chars"));
            }
            let value = str_field(data, "value").unwrap_or("");
            if value.chars().count() > 500 {
                return Err(fail("assign.value must be <=500 chars"));
            }
            Ok(NodeData::Assign { key: key.to_string(), value: value.to_string() })
        }
        NodeType::Media => {
            let media_type = str_field(data, "mediaType").unwrap_or("");
            if !["image", "video", "audio", "document"].contains(&media_type) {
                return Err(fail("media.mediaType must be image/video/audio/document"));
            }
            let id = str_field(data, "id").map(str::to_string);
            let url = str_field(data, "url").map(str::to_string);
            if id.is_none() && url.is_none() {
                return Err(fail("media requires either id or url"));
            }
            let caption = str_field(data, "caption").map(str::to_string);
            Ok(NodeData::Media { media_type: media_type.to_string(), id, url, caption })
        }
        NodeType::WhatsappFlow => {
            let body = str_field(data, "body").unwrap_or("");
            if body.is_empty() || body.chars().count() > 1024 {
                return Err(fail("whatsapp_flow.body must be 1-1024 chars"));
            }
            let header = str_field(data, "header").filter(|s| s.chars().count() <= 60).map(str::to_string);
            let footer = str_field(data, "footer").filter(|s| s.chars().count() <= 60).map(str::to_string);
            let cta = str_field(data, "cta").filter(|s| s.chars().count() <= 40).map(str::to_string);
            Ok(NodeData::WhatsappFlow { body: body.to_string(), header, footer, cta })
        }
        NodeType::Handoff => {
            let queue = str_field(data, "queue").unwrap_or("");
            if queue.is_empty() {
                return Err(fail("handoff.queue is required"));
            }
            let note = str_field(data, "note").filter(|s| s.chars().count() <= 500).map(str::to_string);
            Ok(NodeData::Handoff { queue: queue.to_string(), note })
        }
        NodeType::Goto => {
            let target = str_field(data, "targetNodeId").unwrap_or("");
            if target.is_empty() {
                return Err(fail("goto.targetNodeId is required"));
            }
            Ok(NodeData::Goto { target_node_id: target.to_string() })
        }
        NodeType::End => {
            let reason = str_field(data, "reason").unwrap_or("end").to_string();
            Ok(NodeData::End { reason })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_two_entries_accepted_one_rejected() {
        let two = json!({"options": ["Yes", "No"]});
        assert!(validate(NodeType::Options, &two).is_ok());
        let one = json!({"options": ["Yes"]});
        assert!(validate(NodeType::Options, &one).is_err());
    }

    #[test]
    fn media_requires_id_or_url() {
        let neither = json!({"mediaType": "image"});
        assert!(validate(NodeType::Media, &neither).is_err());
        let with_url = json!({"mediaType": "image", "url": "https://example.com/a.png"});
        assert!(validate(NodeType::Media, &with_url).is_ok());
    }

    #[test]
    fn delay_seconds_bounds() {
        assert!(validate(NodeType::Delay, &json!({"seconds": 0})).is_err());
        assert!(validate(NodeType::Delay, &json!({"seconds": 3600})).is_ok());
        assert!(validate(NodeType::Delay, &json!({"seconds": 3601})).is_err());
    }

    #[test]
    fn message_template_mode_requires_name_and_language() {
        let missing = json!({"useTemplate": true});
        assert!(validate(NodeType::Message, &missing).is_err());
        let ok = json!({"useTemplate": true, "templateName": "n", "templateLanguage": "en_US"});
        assert!(validate(NodeType::Message, &ok).is_ok());
    }

    #[test]
    fn api_validates_url_and_method() {
        let bad_url = json!({"url": "not a url", "method": "GET"});
        assert!(validate(NodeType::Api, &bad_url).is_err());
        let bad_method = json!({"url": "https://example.com", "method": "TRACE"});
        assert!(validate(NodeType::Api, &bad_method).is_err());
        let ok = json!({"url": "https://example.com", "method": "post"});
        assert!(validate(NodeType::Api, &ok).is_ok());
    }

    #[test]
    fn end_defaults_reason() {
        let data = validate(NodeType::End, &json!({})).unwrap();
        match data {
            NodeData::End { reason } => assert_eq!(reason, "end"),
            _ => panic!("wrong variant"),
        }
    }
}
