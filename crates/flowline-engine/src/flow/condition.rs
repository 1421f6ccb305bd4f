//! Restricted boolean expression evaluator for `condition` nodes (§4.5,
//! design note §9). The source this system was distilled from evaluates
//! arbitrary host-language expressions behind a token blocklist; per the
//! REDESIGN FLAGS this crate instead implements a small hand-written
//! grammar with no arbitrary-code-execution hazard: comparisons, `&&`,
//! `||`, `!`, numeric/string literals, and dotted-identifier dereference
//! against a single parameter named `context`.
//!
//! The blocklist is still enforced up front (`;`, `{`, `}`, `process`,
//! `global`, `window`, `document`, `require`, `import`, the identifier
//! `eval`) so a malformed or adversarial expression never even reaches the
//! parser: it is simply treated as `false`, matching §4.5's "reject →
//! treat as error → false" contract.

use crate::context::get_path;
use serde_json::Value;

const BLOCKED_TOKENS: &[&str] = &[
    ";", "{", "}", "process", "global", "window", "document", "require", "import", "eval",
];

/// Evaluate `expression` against `context`. Any parse failure, blocklisted
/// token, or type mismatch in a comparison yields `false` rather than
/// propagating an error — the executor follows the `false` edge in all of
/// these cases (§4.5).
pub fn evaluate(expression: &str, context: &Value) -> bool {
    if is_blocked(expression) {
        return false;
    }
    match parse(expression).and_then(|ast| eval(&ast, context)) {
        Ok(value) => truthy(&value),
        Err(_) => false,
    }
}

fn is_blocked(expression: &str) -> bool {
    BLOCKED_TOKENS.iter().any(|token| {
        if token.chars().next().map_or(false, |c| c.is_alphabetic()) {
            // Word-boundary match for identifier-shaped blocked tokens so
            // "processed" (containing "process") isn't falsely rejected.
            contains_word(expression, token)
        } else {
            expression.contains(token)
        }
    })
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    let wlen = word.len();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(word) {
        let idx = start + pos;
        let before_ok = idx == 0 || !is_ident_char(bytes[idx - 1]);
        let after_idx = idx + wlen;
        let after_ok = after_idx >= bytes.len() || !is_ident_char(bytes[after_idx]);
        if before_ok && after_ok {
            return true;
        }
        start = idx + wlen.max(1);
    }
    false
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[derive(Debug, Clone)]
enum EvalValue {
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
}

fn truthy(value: &EvalValue) -> bool {
    match value {
        EvalValue::Bool(b) => *b,
        EvalValue::Num(n) => *n != 0.0,
        EvalValue::Str(s) => !s.is_empty(),
        EvalValue::Null => false,
    }
}

fn from_json(value: Option<&Value>) -> EvalValue {
    match value {
        None | Some(Value::Null) => EvalValue::Null,
        Some(Value::Bool(b)) => EvalValue::Bool(*b),
        Some(Value::Number(n)) => EvalValue::Num(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) => EvalValue::Str(s.clone()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => EvalValue::Null,
    }
}

// --- Grammar ---
// expr      := or
// or        := and ( "||" and )*
// and       := cmp ( "&&" cmp )*
// cmp       := unary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") unary )?
// unary     := "!" unary | primary
// primary   := NUMBER | STRING | IDENT_PATH | "(" expr ")"

#[derive(Debug, Clone)]
enum Ast {
    Num(f64),
    Str(String),
    Bool(bool),
    Path(String),
    Not(Box<Ast>),
    Cmp(Box<Ast>, CmpOp, Box<Ast>),
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
}

#[derive(Debug, Clone, Copy)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

type ParseResult<T> = Result<T, String>;

fn parse(expression: &str) -> ParseResult<Ast> {
    let mut parser = Parser { input: expression, pos: 0 };
    let ast = parser.parse_or()?;
    parser.skip_ws();
    if parser.pos != parser.input.len() {
        return Err(format!("unexpected trailing input at byte {}", parser.pos));
    }
    Ok(ast)
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.input.len() && self.input.as_bytes()[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn consume_op(&mut self, op: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(op) {
            self.pos += op.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> ParseResult<Ast> {
        let mut left = self.parse_and()?;
        loop {
            if self.consume_op("||") {
                let right = self.parse_and()?;
                left = Ast::Or(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Ast> {
        let mut left = self.parse_cmp()?;
        loop {
            if self.consume_op("&&") {
                let right = self.parse_cmp()?;
                left = Ast::And(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> ParseResult<Ast> {
        let left = self.parse_unary()?;
        // Longer operators first so "<=" isn't swallowed by "<".
        let ops: &[(&str, CmpOp)] = &[
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ];
        for (token, op) in ops {
            if self.consume_op(token) {
                let right = self.parse_unary()?;
                return Ok(Ast::Cmp(Box::new(left), *op, Box::new(right)));
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Ast> {
        self.skip_ws();
        if self.rest().starts_with('!') && !self.rest().starts_with("!=") {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Ast::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Ast> {
        self.skip_ws();
        if self.rest().starts_with('(') {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.rest().starts_with(')') {
                return Err("expected closing parenthesis".to_string());
            }
            self.pos += 1;
            return Ok(inner);
        }
        if self.rest().starts_with('"') || self.rest().starts_with('\'') {
            return self.parse_string();
        }
        let first = self.rest().chars().next().ok_or("unexpected end of expression")?;
        if first.is_ascii_digit() || (first == '-' && self.rest().len() > 1) {
            return self.parse_number();
        }
        if first.is_alphabetic() || first == '_' {
            return self.parse_path();
        }
        Err(format!("unexpected character '{first}'"))
    }

    fn parse_string(&mut self) -> ParseResult<Ast> {
        let quote = self.rest().chars().next().unwrap();
        self.pos += 1;
        let start = self.pos;
        let end = self.rest().find(quote).ok_or("unterminated string literal")?;
        let literal = self.input[start..start + end].to_string();
        self.pos = start + end + 1;
        Ok(Ast::Str(literal))
    }

    fn parse_number(&mut self) -> ParseResult<Ast> {
        let start = self.pos;
        if self.rest().starts_with('-') {
            self.pos += 1;
        }
        while self.pos < self.input.len()
            && (self.input.as_bytes()[self.pos].is_ascii_digit() || self.input.as_bytes()[self.pos] == b'.')
        {
            self.pos += 1;
        }
        self.input[start..self.pos]
            .parse::<f64>()
            .map(Ast::Num)
            .map_err(|_| "invalid number literal".to_string())
    }

    fn parse_path(&mut self) -> ParseResult<Ast> {
        let start = self.pos;
        while self.pos < self.input.len() {
            let b = self.input.as_bytes()[self.pos];
            if is_ident_char(b) || b == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let ident = &self.input[start..self.pos];
        match ident {
            "true" => Ok(Ast::Bool(true)),
            "false" => Ok(Ast::Bool(false)),
            "null" => Ok(Ast::Path(String::new())),
            _ => Ok(Ast::Path(ident.to_string())),
        }
    }
}

fn eval(ast: &Ast, context: &Value) -> Result<EvalValue, String> {
    match ast {
        Ast::Num(n) => Ok(EvalValue::Num(*n)),
        Ast::Str(s) => Ok(EvalValue::Str(s.clone())),
        Ast::Bool(b) => Ok(EvalValue::Bool(*b)),
        Ast::Path(path) => {
            if path.is_empty() {
                return Ok(EvalValue::Null);
            }
            if path == "context" {
                return Ok(from_json(Some(context)));
            }
            let stripped = path.strip_prefix("context.").unwrap_or(path.as_str());
            Ok(from_json(get_path(context, stripped)))
        }
        Ast::Not(inner) => Ok(EvalValue::Bool(!truthy(&eval(inner, context)?))),
        Ast::And(l, r) => {
            let lv = eval(l, context)?;
            if !truthy(&lv) {
                return Ok(EvalValue::Bool(false));
            }
            Ok(EvalValue::Bool(truthy(&eval(r, context)?)))
        }
        Ast::Or(l, r) => {
            let lv = eval(l, context)?;
            if truthy(&lv) {
                return Ok(EvalValue::Bool(true));
            }
            Ok(EvalValue::Bool(truthy(&eval(r, context)?)))
        }
        Ast::Cmp(l, op, r) => {
            let lv = eval(l, context)?;
            let rv = eval(r, context)?;
            Ok(EvalValue::Bool(compare(&lv, *op, &rv)))
        }
    }
}

fn compare(l: &EvalValue, op: CmpOp, r: &EvalValue) -> bool {
    match (l, r) {
        (EvalValue::Num(a), EvalValue::Num(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (EvalValue::Str(a), EvalValue::Str(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (EvalValue::Bool(a), EvalValue::Bool(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            _ => false,
        },
        (EvalValue::Null, EvalValue::Null) => matches!(op, CmpOp::Eq),
        _ => matches!(op, CmpOp::Ne),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_comparison_true_branch() {
        let ctx = json!({"score": 5});
        assert!(evaluate("context.score > 3", &ctx));
        assert!(!evaluate("context.score > 30", &ctx));
    }

    #[test]
    fn string_equality() {
        let ctx = json!({"status": "ok"});
        assert!(evaluate("context.status == \"ok\"", &ctx));
        assert!(evaluate("context.status != 'bad'", &ctx));
    }

    #[test]
    fn logical_operators_and_negation() {
        let ctx = json!({"a": 1, "b": 0});
        assert!(evaluate("context.a > 0 && !(context.b > 0)", &ctx));
        assert!(evaluate("context.a > 5 || context.b == 0", &ctx));
    }

    #[test]
    fn blocked_tokens_force_false() {
        let ctx = json!({});
        assert!(!evaluate("process.exit()", &ctx));
        assert!(!evaluate("eval('1')", &ctx));
        assert!(!evaluate("1; 2", &ctx));
        assert!(!evaluate("{}", &ctx));
    }

    #[test]
    fn blocklist_uses_word_boundaries() {
        // "processed" contains "process" as a substring but is not the
        // blocked identifier, so it must be allowed through to the parser
        // (where it then fails as an unknown path equality, still false).
        let ctx = json!({"processed": true});
        assert!(evaluate("context.processed == true", &ctx));
    }

    #[test]
    fn missing_path_is_null_and_comparisons_with_mismatched_types_are_false() {
        let ctx = json!({});
        assert!(!evaluate("context.missing > 0", &ctx));
        assert!(evaluate("context.missing != 0", &ctx));
    }

    #[test]
    fn malformed_expression_is_false() {
        let ctx = json!({});
        assert!(!evaluate("context.a >", &ctx));
        assert!(!evaluate("((unbalanced", &ctx));
    }
}
