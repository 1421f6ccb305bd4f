//! Ambient primitives shared across the flowline workspace: structured
//! logging setup and small time/JSON helpers used by more than one crate.
//!
//! Domain types (Contact, Flow, Session, ...) live in `flowline-engine`;
//! this crate only holds cross-cutting plumbing, mirroring the split the
//! teacher codebase draws between `fc-common` and its domain crates.

pub mod logging;

use serde_json::Value;

/// Current time as an ISO-8601 UTC string, the timestamp format used
/// throughout session context bookkeeping (§4.5).
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Append `entry` to the array at `value`, truncating from the front so the
/// array never exceeds `cap` entries. Used for `context._meta.history` and
/// `context.inputHistory` (both capped at 50).
pub fn push_capped(value: &mut Value, entry: Value, cap: usize) {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    let arr = value.as_array_mut().expect("checked above");
    arr.push(entry);
    while arr.len() > cap {
        arr.remove(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_capped_truncates_oldest() {
        let mut v = Value::Array(Vec::new());
        for i in 0..5 {
            push_capped(&mut v, Value::from(i), 3);
        }
        assert_eq!(v.as_array().unwrap().len(), 3);
        assert_eq!(v.as_array().unwrap()[0], Value::from(2));
        assert_eq!(v.as_array().unwrap()[2], Value::from(4));
    }

    #[test]
    fn now_iso8601_is_rfc3339() {
        let s = now_iso8601();
        assert!(chrono::DateTime::parse_from_rfc3339(&s).is_ok());
    }
}
