//! Template interpolator (C2, §4.2). Substitutes `{{ path }}` occurrences
//! in a string with the value at `path` inside the session context.
//!
//! Implemented as a single linear scanner over the input characters per
//! the design note in §9 — no regex, no external templating crate.

use crate::context::get_path;
use serde_json::Value;

/// Render `value` at `path` the way it appears in interpolated output:
/// strings pass through unescaped, other scalars use their JSON display
/// form, missing/compound values render as empty.
fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => String::new(),
    }
}

/// Interpolate every `{{ path }}` occurrence in `input` against `context`.
/// Whitespace around the path is tolerated; unterminated `{{` is copied
/// through literally.
pub fn interpolate(input: &str, context: &Value) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(close) = find_close(input, i + 2) {
                let path = input[i + 2..close].trim();
                out.push_str(&render(get_path(context, path)));
                i = close + 2;
                continue;
            }
        }
        // Push one char (not just one byte) to stay UTF-8 safe.
        let ch = input[i..].chars().next().expect("i < bytes.len()");
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Find the index of the `}}` that closes a `{{` opened at `start`.
fn find_close(input: &str, start: usize) -> Option<usize> {
    input[start..].find("}}").map(|offset| start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_simple_path() {
        let ctx = json!({"lastUserMessage": "Hola"});
        assert_eq!(interpolate("Hi, {{lastUserMessage}}!", &ctx), "Hi, Hola!");
    }

    #[test]
    fn tolerates_whitespace_around_path() {
        let ctx = json!({"a": "x"});
        assert_eq!(interpolate("{{  a  }}", &ctx), "x");
    }

    #[test]
    fn missing_path_renders_empty() {
        let ctx = json!({});
        assert_eq!(interpolate("[{{missing}}]", &ctx), "[]");
    }

    #[test]
    fn traverses_arrays_by_index() {
        let ctx = json!({"apiResult": {"items": [{"name": "first"}]}});
        assert_eq!(
            interpolate("{{apiResult.items.0.name}}", &ctx),
            "first"
        );
    }

    #[test]
    fn unterminated_braces_pass_through() {
        let ctx = json!({});
        assert_eq!(interpolate("literal {{ open", &ctx), "literal {{ open");
    }

    #[test]
    fn multiple_substitutions_in_one_string() {
        let ctx = json!({"a": "X", "b": "Y"});
        assert_eq!(interpolate("{{a}}-{{b}}", &ctx), "X-Y");
    }

    #[test]
    fn handles_multibyte_text_around_placeholder() {
        let ctx = json!({"name": "Müller"});
        assert_eq!(interpolate("héllo {{name}} 😀", &ctx), "héllo Müller 😀");
    }
}
