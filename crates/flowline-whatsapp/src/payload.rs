//! Outbound Meta `/messages` payload construction (C4, §4.4). Pure:
//! building a payload never touches the network, so every variant is
//! exercised by a direct unit test with no HTTP fixture.

use serde_json::{json, Value};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("recipient phone has no digits after normalization")]
    InvalidPhone,
    #[error("media requires either id or url")]
    MediaMissingIdOrUrl,
    #[error("flow send requires a Meta flow id and token")]
    FlowMissingIdOrToken,
    #[error("flow send requires a non-empty body")]
    FlowMissingBody,
    #[error("template send requires a name and language")]
    TemplateMissingNameOrLanguage,
}

/// Strip everything but ASCII digits (§4.4: "Phone numbers are
/// canonicalized to digits-only; invalid phones fail with status 400
/// without contacting Meta").
pub fn canonicalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Debug, Clone)]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateComponentInput {
    pub component_type: String,
    pub sub_type: Option<String>,
    pub index: Option<f64>,
    /// Parameters as `(type, text)` pairs; only `type == "text"` survives
    /// the filter applied in `build_template` (§4.4).
    pub parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum SendRequest {
    Text {
        body: String,
    },
    Media {
        media_type: MediaType,
        id: Option<String>,
        url: Option<String>,
        caption: Option<String>,
    },
    Options {
        body_text: String,
        options: Vec<String>,
    },
    List {
        body_text: String,
        button: String,
        sections: Vec<ListSection>,
    },
    Flow {
        flow_id: String,
        flow_token: String,
        version: Option<String>,
        header: Option<String>,
        footer: Option<String>,
        cta: Option<String>,
        body: String,
    },
    Template {
        name: String,
        language: String,
        components: Vec<TemplateComponentInput>,
    },
}

/// `lower(trim(option)).replace(/\s+/g,"_")`, or `"opt"` for an
/// all-whitespace option (§4.4 "options" variant).
pub fn option_button_id(option: &str) -> String {
    let normalized: String = option
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    if normalized.is_empty() {
        "opt".to_string()
    } else {
        normalized
    }
}

/// Build the full Meta `/messages` request body for `request` addressed
/// to `to` (not yet canonicalized — canonicalization happens in `client`,
/// which owns the "fail before contacting Meta" behavior).
pub fn build_payload(to: &str, request: &SendRequest) -> Result<Value, PayloadError> {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "to": to,
    });
    let content = match request {
        SendRequest::Text { body: text } => json!({
            "type": "text",
            "text": { "body": text, "preview_url": false },
        }),
        SendRequest::Media { media_type, id, url, caption } => {
            if id.is_none() && url.is_none() {
                return Err(PayloadError::MediaMissingIdOrUrl);
            }
            let mut media = json!({});
            if let Some(id) = id {
                media["id"] = json!(id);
            } else if let Some(url) = url {
                media["link"] = json!(url);
            }
            if let Some(caption) = caption {
                media["caption"] = json!(caption);
            }
            json!({ "type": media_type.as_str(), media_type.as_str(): media })
        }
        SendRequest::Options { body_text, options } => {
            let buttons: Vec<Value> = options
                .iter()
                .take(3)
                .map(|option| {
                    json!({
                        "type": "reply",
                        "reply": { "id": option_button_id(option), "title": option },
                    })
                })
                .collect();
            json!({
                "type": "interactive",
                "interactive": {
                    "type": "button",
                    "body": { "text": body_text },
                    "action": { "buttons": buttons },
                },
            })
        }
        SendRequest::List { body_text, button, sections } => {
            let sections_json: Vec<Value> = sections
                .iter()
                .map(|section| {
                    let rows: Vec<Value> = section
                        .rows
                        .iter()
                        .map(|row| {
                            let mut row_json = json!({ "id": row.id, "title": row.title });
                            if let Some(description) = &row.description {
                                row_json["description"] = json!(description);
                            }
                            row_json
                        })
                        .collect();
                    json!({ "title": section.title, "rows": rows })
                })
                .collect();
            json!({
                "type": "interactive",
                "interactive": {
                    "type": "list",
                    "body": { "text": body_text },
                    "action": { "button": button, "sections": sections_json },
                },
            })
        }
        SendRequest::Flow { flow_id, flow_token, version, header, footer, cta, body: flow_body } => {
            if flow_id.is_empty() || flow_token.is_empty() {
                return Err(PayloadError::FlowMissingIdOrToken);
            }
            if flow_body.is_empty() {
                return Err(PayloadError::FlowMissingBody);
            }
            let mut action_parameters = json!({
                "flow_message_version": version.clone().unwrap_or_else(|| "3".to_string()),
                "flow_token": flow_token,
                "flow_id": flow_id,
            });
            if let Some(cta) = cta {
                action_parameters["flow_cta"] = json!(cta);
            }
            let mut interactive = json!({
                "type": "flow",
                "body": { "text": flow_body },
                "action": {
                    "name": "flow",
                    "parameters": action_parameters,
                },
            });
            if let Some(header) = header {
                interactive["header"] = json!({ "type": "text", "text": header });
            }
            if let Some(footer) = footer {
                interactive["footer"] = json!({ "text": footer });
            }
            json!({ "type": "interactive", "interactive": interactive })
        }
        SendRequest::Template { name, language, components } => {
            if name.is_empty() || language.is_empty() {
                return Err(PayloadError::TemplateMissingNameOrLanguage);
            }
            let components_json = build_template_components(components);
            json!({
                "type": "template",
                "template": {
                    "name": name,
                    "language": { "code": language },
                    "components": components_json,
                },
            })
        }
    };
    if let Value::Object(content_map) = content {
        body.as_object_mut().expect("body is an object").extend(content_map);
    }
    Ok(body)
}

fn build_template_components(inputs: &[TemplateComponentInput]) -> Vec<Value> {
    inputs
        .iter()
        .map(|input| {
            let mut component = json!({ "type": input.component_type.to_lowercase() });
            if let Some(sub_type) = &input.sub_type {
                component["sub_type"] = json!(sub_type.to_lowercase());
            }
            if let Some(index) = input.index {
                if index.is_finite() {
                    component["index"] = json!(index);
                }
            }
            let parameters: Vec<Value> = input
                .parameters
                .iter()
                .filter(|(t, _)| t == "text")
                .map(|(_, text)| json!({ "type": "text", "text": text }))
                .collect();
            component["parameters"] = json!(parameters);
            component
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_shape() {
        let payload = build_payload("5491122223333", &SendRequest::Text { body: "hi".into() }).unwrap();
        assert_eq!(payload["type"], "text");
        assert_eq!(payload["text"]["body"], "hi");
        assert_eq!(payload["text"]["preview_url"], false);
    }

    #[test]
    fn media_requires_id_or_url() {
        let err = build_payload(
            "1",
            &SendRequest::Media { media_type: MediaType::Image, id: None, url: None, caption: None },
        )
        .unwrap_err();
        assert_eq!(err, PayloadError::MediaMissingIdOrUrl);
    }

    #[test]
    fn options_truncates_to_three_and_derives_ids() {
        let options = vec!["Yes please".into(), "No".into(), "Maybe".into(), "Never".into()];
        let payload = build_payload("1", &SendRequest::Options { body_text: "Pick".into(), options }).unwrap();
        let buttons = payload["interactive"]["action"]["buttons"].as_array().unwrap();
        assert_eq!(buttons.len(), 3);
        assert_eq!(buttons[0]["reply"]["id"], "yes_please");
    }

    #[test]
    fn empty_option_falls_back_to_opt() {
        let id = option_button_id("   ");
        assert_eq!(id, "opt");
    }

    #[test]
    fn flow_requires_id_token_and_body() {
        let err = build_payload(
            "1",
            &SendRequest::Flow {
                flow_id: "".into(),
                flow_token: "tok".into(),
                version: None,
                header: None,
                footer: None,
                cta: None,
                body: "hi".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, PayloadError::FlowMissingIdOrToken);
    }

    #[test]
    fn template_components_filter_non_text_parameters_and_lowercase_fields() {
        let components = vec![TemplateComponentInput {
            component_type: "HEADER".into(),
            sub_type: Some("URL".into()),
            index: Some(0.0),
            parameters: vec![("text".into(), "hi".into()), ("image".into(), "ignored".into())],
        }];
        let payload = build_payload(
            "1",
            &SendRequest::Template { name: "greet".into(), language: "en_US".into(), components },
        )
        .unwrap();
        let built = payload["template"]["components"][0].clone();
        assert_eq!(built["type"], "header");
        assert_eq!(built["sub_type"], "url");
        assert_eq!(built["parameters"].as_array().unwrap().len(), 1);
        assert_eq!(built["parameters"][0]["text"], "hi");
    }

    #[test]
    fn canonicalize_phone_strips_non_digits() {
        assert_eq!(canonicalize_phone("+54 9 11 2222-3333"), "5491122223333");
    }
}
