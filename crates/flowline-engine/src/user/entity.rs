//! Tenant entity (§3). Owns Meta Graph API credentials; everything else
//! about a user (auth, settings) is out of scope (§1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,

    /// Meta Graph API bearer token used for every outbound call (C4).
    pub access_token: String,

    /// Meta WhatsApp Business Account id, used for flow-lifecycle calls
    /// (`/<wabaId>/flows`, §6).
    pub meta_business_account_id: String,

    /// Meta phone number id; both the outbound sender identity and the
    /// lookup key for inbound webhook tenant resolution (§4.7).
    pub meta_phone_number_id: String,

    /// Per-tenant webhook verification token. The process-wide
    /// `META_VERIFY_TOKEN` (§6) is the fallback when this is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,
}

impl User {
    pub fn id_string(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}
