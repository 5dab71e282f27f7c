//! Line parser for wire-format directives.
//!
//! A directive occupies an entire line: `{MODULE|STATUS}`,
//! `{MODULE|ACTION|STATUS}` or `{MODULE|ACTION|STATUS|PAYLOAD}`. Anything
//! that fails to decode is ordinary prose, never an error; the caller
//! renders it verbatim. A directive embedded mid-sentence is not
//! recognized; that is deliberate.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::message::SlavkoMessage;

/// Attempt to decode one line of text into a protocol message.
///
/// Leading and trailing whitespace is trimmed before decoding. Returns
/// `None` on malformed syntax or on a candidate that fails message
/// validation; the caller treats `None` as prose.
pub fn parse_line(line: &str) -> Option<SlavkoMessage> {
    let trimmed = line.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return None;
    }

    let inner = &trimmed[1..trimmed.len() - 1];
    let segments = split_top_level(inner)?;

    let (module, action, status, payload) = match segments.as_slice() {
        [module, status] => (module, None, status, None),
        [module, action, status] => (module, Some(action.as_str()), status, None),
        [module, action, status, payload] => {
            (module, Some(action.as_str()), status, Some(payload.as_str()))
        }
        _ => return None,
    };

    let mut candidate = Map::new();
    candidate.insert("module".to_string(), Value::String(module.trim().to_string()));
    if let Some(action) = action {
        candidate.insert("action".to_string(), Value::String(action.trim().to_string()));
    }
    candidate.insert("status".to_string(), Value::String(status.trim().to_string()));
    if let Some(payload) = payload {
        if let Some(decoded) = decode_payload(payload) {
            candidate.insert("payload".to_string(), decoded);
        }
    }

    match SlavkoMessage::validate(Value::Object(candidate)) {
        Ok(message) => Some(message),
        Err(err) => {
            tracing::debug!("line looked like a directive but failed validation: {err}");
            None
        }
    }
}

/// Split on `|` at nesting depth zero only. Pipes inside a payload object,
/// array or quoted string do not split. Unbalanced nesting or an
/// unterminated string rejects the whole line.
fn split_top_level(input: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for ch in input.chars() {
        if in_string {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            '{' | '[' => {
                depth += 1;
                current.push(ch);
            }
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                current.push(ch);
            }
            '|' if depth == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }

    if in_string || depth != 0 {
        return None;
    }
    segments.push(current);
    Some(segments)
}

/// Decode a payload segment.
///
/// Strict JSON first; then a bare-key object literal (`{provider:"vercel"}`)
/// with keys quoted leniently; anything else becomes an opaque payload
/// string. An empty segment means no payload at all.
fn decode_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(&quote_bare_keys(trimmed)) {
            return Some(value);
        }
    }
    Some(Value::String(trimmed.to_string()))
}

fn quote_bare_keys(input: &str) -> String {
    static BARE_KEY: OnceLock<Regex> = OnceLock::new();
    let re = BARE_KEY
        .get_or_init(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).expect("valid regex"));
    re.replace_all(input, "$1\"$2\":").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Module, Status};
    use serde_json::json;

    #[test]
    fn test_parses_full_directive() {
        let msg = parse_line(r#"{DEPLOY|INIT|READY|{provider:"vercel"}}"#).unwrap();
        assert_eq!(msg.module, Module::Deploy);
        assert_eq!(msg.action.as_deref(), Some("INIT"));
        assert_eq!(msg.status, Status::Ready);
        assert_eq!(msg.payload, Some(json!({"provider": "vercel"})));
    }

    #[test]
    fn test_parses_without_action() {
        let msg = parse_line("{SESSION|DONE}").unwrap();
        assert_eq!(msg.module, Module::Session);
        assert_eq!(msg.action, None);
        assert_eq!(msg.status, Status::Done);
        assert_eq!(msg.payload, None);
    }

    #[test]
    fn test_parses_three_segments() {
        let msg = parse_line("{CLEANUP|PURGE|DONE}").unwrap();
        assert_eq!(msg.action.as_deref(), Some("PURGE"));
        assert_eq!(msg.status, Status::Done);
    }

    #[test]
    fn test_empty_action_segment() {
        let msg = parse_line("{DEPLOY||DONE}").unwrap();
        assert_eq!(msg.action, Some(String::new()));
    }

    #[test]
    fn test_string_payload() {
        let msg = parse_line("{SESSION|CLEAR|DONE|Chat history cleared.}").unwrap();
        assert_eq!(
            msg.payload,
            Some(Value::String("Chat history cleared.".to_string()))
        );
    }

    #[test]
    fn test_strict_json_payload() {
        let msg = parse_line(r#"{DEPLOY|REPORT|DONE|{"project":"site","durationSec":12}}"#)
            .unwrap();
        assert_eq!(msg.payload, Some(json!({"project": "site", "durationSec": 12})));
    }

    #[test]
    fn test_pipe_inside_quoted_payload_does_not_split() {
        let msg = parse_line(r#"{KERNEL|LOG|DONE|{"text":"a|b"}}"#).unwrap();
        assert_eq!(msg.payload, Some(json!({"text": "a|b"})));
    }

    #[test]
    fn test_whole_line_rule() {
        assert!(parse_line("prefix {DEPLOY|INIT|READY} suffix").is_none());
        assert!(parse_line("{DEPLOY|INIT|READY} trailing").is_none());
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert!(parse_line("  {SESSION|DONE}  ").is_some());
        assert!(parse_line("\t{SESSION|DONE}\r").is_some());
    }

    #[test]
    fn test_rejects_non_directives() {
        assert!(parse_line("Hello world").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("{}").is_none());
        assert!(parse_line("{just a note}").is_none());
        assert!(parse_line("{DEPLOY}").is_none());
        // Too many segments.
        assert!(parse_line("{A|B|C|D|E}").is_none());
        // Bad status.
        assert!(parse_line("{DEPLOY|INIT|RUNNING}").is_none());
        // Lowercase status is not a status.
        assert!(parse_line("{DEPLOY|done}").is_none());
        // Unbalanced payload braces.
        assert!(parse_line(r#"{DEPLOY|INIT|READY|{provider:"x"}"#).is_none());
    }

    #[test]
    fn test_unknown_module_accepted() {
        let msg = parse_line("{TELEMETRY|FLUSH|DONE}").unwrap();
        assert_eq!(msg.module, Module::Other("TELEMETRY".to_string()));
    }

    #[test]
    fn test_quote_bare_keys() {
        assert_eq!(
            quote_bare_keys(r#"{provider:"vercel",healthCheck:true}"#),
            r#"{"provider":"vercel","healthCheck":true}"#
        );
        // Already-quoted keys are untouched.
        assert_eq!(quote_bare_keys(r#"{"a":1}"#), r#"{"a":1}"#);
    }
}
