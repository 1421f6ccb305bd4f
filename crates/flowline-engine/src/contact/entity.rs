//! Contact entity (§3). Uniqueness: `(userId, phone)`. `phone` is kept in
//! canonical digits-only form; it is renormalized in place whenever an
//! inbound message reveals a non-canonical stored value (§4.6 step 4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub user_id: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Contact {
    pub fn id_string(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

/// Strip everything but ASCII digits, the canonicalization rule used
/// throughout §4.6 for both lookup and storage.
pub fn canonicalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_non_digits() {
        assert_eq!(canonicalize_phone("+54 9 11 2222-3333"), "5491122223333");
    }

    #[test]
    fn canonicalize_empty_input_is_empty() {
        assert_eq!(canonicalize_phone("+() -"), "");
    }
}
