//! Outbound message builder / Meta Graph API client (C4, §4.4). Request
//! building, timeout, and response-classification structure grounded on
//! `fc-router/src/mediator.rs`'s `HttpMediator`; the circuit-breaker and
//! webhook-HMAC-signing portions of that file are not needed here (no
//! inbound-signature verification or failure-rate tripping in this
//! system's scope).

use crate::error::SendError;
use crate::payload::{build_payload, canonicalize_phone, SendRequest};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-tenant Meta credentials for one send (§3: each `User` owns its own
/// `accessToken`/`phoneNumberId`).
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub access_token: &'a str,
    pub phone_number_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct WhatsAppClientConfig {
    pub base_url: String,
    pub api_version: String,
    /// Outbound HTTP deadline (§4.4, §5: 15s, hard cancellation).
    pub timeout: Duration,
}

impl Default for WhatsAppClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v23.0".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendMessageResult {
    pub message_id: String,
    pub conversation_id: Option<String>,
}

pub struct WhatsAppClient {
    http: reqwest::Client,
    config: WhatsAppClientConfig,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build Meta Graph API HTTP client");
        Self { http, config }
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!("{}/{}/{}/messages", self.config.base_url, self.config.api_version, phone_number_id)
    }

    fn allow_list_url(&self, phone_number_id: &str, path: &str) -> String {
        format!("{}/{}/{}/{}", self.config.base_url, self.config.api_version, phone_number_id, path)
    }

    /// Send `request` to `to` using `credentials` (§4.4). Invalid phones
    /// fail before any network call. A single allow-list auto-enrollment
    /// retry is attempted transparently on Meta error code 131030.
    pub async fn send(
        &self,
        credentials: Credentials<'_>,
        to: &str,
        request: &SendRequest,
    ) -> Result<SendMessageResult, SendError> {
        let canonical_to = canonicalize_phone(to);
        if canonical_to.is_empty() {
            return Err(SendError::InvalidPhone);
        }
        let payload = build_payload(&canonical_to, request)?;

        let mut allow_list_attempted = false;
        loop {
            match self.send_once(credentials, &payload).await {
                Ok(result) => return Ok(result),
                Err(SendFailure::RecipientNotAllowed) if !allow_list_attempted => {
                    self.enroll_allow_list(credentials, &canonical_to).await?;
                    allow_list_attempted = true;
                    continue;
                }
                Err(SendFailure::Classified(error)) => return Err(error),
                Err(SendFailure::RecipientNotAllowed) => {
                    // Already retried once; surface the original classification.
                    return Err(SendError::Http { status: 400, message: "recipient not in allow-list".to_string() });
                }
            }
        }
    }

    async fn send_once(&self, credentials: Credentials<'_>, payload: &Value) -> Result<SendMessageResult, SendFailure> {
        let response = self
            .http
            .post(self.messages_url(credentials.phone_number_id))
            .bearer_auth(credentials.access_token)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SendFailure::Classified(SendError::Timeout)
                } else {
                    SendFailure::Classified(SendError::Transport(err.to_string()))
                }
            })?;

        let status = response.status();
        let status_code = status.as_u16();
        let body_text = response.text().await.unwrap_or_default();

        if status.is_success() {
            let body: Value = serde_json::from_str(&body_text).unwrap_or(Value::Null);
            let message_id = body
                .get("messages")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(|m| m.get("id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let conversation_id = body
                .get("contacts")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(|c| c.get("wa_id"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    body.get("conversation")
                        .and_then(|c| c.get("id"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
            info!(status = status_code, "outbound WhatsApp message sent");
            return Ok(SendMessageResult { message_id, conversation_id });
        }

        let error_body: Value = serde_json::from_str(&body_text).unwrap_or(Value::Null);
        let message = extract_error_message(&error_body, status_code, &body_text);
        let error_code = error_body.get("error").and_then(|e| e.get("code")).and_then(Value::as_i64);

        if is_access_token_expired(status_code, &message) {
            warn!(status = status_code, "Meta access token expired");
            return Err(SendFailure::Classified(SendError::AccessTokenExpired));
        }

        if status_code == 400 && error_code == Some(131030) {
            debug!("recipient not in allow-list, will attempt auto-enrollment");
            return Err(SendFailure::RecipientNotAllowed);
        }

        Err(SendFailure::Classified(SendError::Http { status: status_code, message }))
    }

    /// Enroll `to` in Meta's dev-mode allow-list (§4.4). Tries
    /// `/recipients` first, falling back to
    /// `/registered_whatsapp_users` when Meta reports that path as
    /// unsupported.
    async fn enroll_allow_list(&self, credentials: Credentials<'_>, to: &str) -> Result<(), SendError> {
        match self.enroll_once(credentials, to, "recipients").await {
            Ok(()) => Ok(()),
            Err((status, message)) if status == 400 || status == 404 => {
                let lower = message.to_lowercase();
                if lower.contains("unknown path components") || lower.contains("unsupported post request") {
                    self.enroll_once(credentials, to, "registered_whatsapp_users")
                        .await
                        .map_err(|(_, reason)| SendError::AllowListEnrollmentFailed { reason })
                } else {
                    Err(SendError::AllowListEnrollmentFailed { reason: message })
                }
            }
            Err((_, message)) => Err(SendError::AllowListEnrollmentFailed { reason: message }),
        }
    }

    async fn enroll_once(&self, credentials: Credentials<'_>, to: &str, path: &str) -> Result<(), (u16, String)> {
        let response = self
            .http
            .post(self.allow_list_url(credentials.phone_number_id, path))
            .bearer_auth(credentials.access_token)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "messaging_product": "whatsapp", "to": to }))
            .send()
            .await
            .map_err(|err| (0, err.to_string()))?;

        let status = response.status();
        let status_code = status.as_u16();
        let body_text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(());
        }
        let error_body: Value = serde_json::from_str(&body_text).unwrap_or(Value::Null);
        let message = extract_error_message(&error_body, status_code, &body_text);
        Err((status_code, message))
    }
}

enum SendFailure {
    RecipientNotAllowed,
    Classified(SendError),
}

impl From<crate::payload::PayloadError> for SendFailure {
    fn from(err: crate::payload::PayloadError) -> Self {
        SendFailure::Classified(SendError::Validation(err))
    }
}

/// `error.error_user_msg` → `error.message` → `statusText` → raw body
/// (§4.4).
fn extract_error_message(error_body: &Value, status_code: u16, raw_body: &str) -> String {
    if let Some(msg) = error_body.get("error").and_then(|e| e.get("error_user_msg")).and_then(Value::as_str) {
        if !msg.is_empty() {
            return msg.to_string();
        }
    }
    if let Some(msg) = error_body.get("error").and_then(|e| e.get("message")).and_then(Value::as_str) {
        if !msg.is_empty() {
            return msg.to_string();
        }
    }
    if let Some(reason) = reqwest::StatusCode::from_u16(status_code).ok().and_then(|s| s.canonical_reason()) {
        return reason.to_string();
    }
    raw_body.to_string()
}

/// 401 always; 400/403 only when the message itself names an access-token
/// problem (§4.4).
fn is_access_token_expired(status_code: u16, message: &str) -> bool {
    if status_code == 401 {
        return true;
    }
    if status_code == 400 || status_code == 403 {
        let lower = message.to_lowercase();
        return lower.contains("access token") || lower.contains("session has expired");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn access_token_expired_classification() {
        assert!(is_access_token_expired(401, "anything"));
        assert!(is_access_token_expired(400, "Error validating access token"));
        assert!(is_access_token_expired(403, "Session has expired"));
        assert!(!is_access_token_expired(400, "invalid parameter"));
        assert!(!is_access_token_expired(500, "access token"));
    }

    #[test]
    fn error_message_prefers_error_user_msg() {
        let body = json!({"error": {"error_user_msg": "human readable", "message": "raw"}});
        assert_eq!(extract_error_message(&body, 400, ""), "human readable");
    }

    #[test]
    fn error_message_falls_back_to_message_then_status_then_raw() {
        let with_message = json!({"error": {"message": "raw message"}});
        assert_eq!(extract_error_message(&with_message, 400, ""), "raw message");

        let empty = json!({});
        assert_eq!(extract_error_message(&empty, 404, "ignored since 404 has canonical reason"), "Not Found");
    }
}
