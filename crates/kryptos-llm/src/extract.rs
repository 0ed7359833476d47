//! Balanced-JSON extraction from completion text
//!
//! Planner-grade backends frequently wrap their JSON in prose ("Here is the
//! plan: {...}"). This module scans a completion for the first balanced
//! top-level JSON object instead of requiring the whole response to parse.

/// Find the first balanced top-level JSON object in `raw`.
///
/// Returns the object as a sub-slice of the input, or `None` when no
/// decodable object exists. String literals and escapes are honored while
/// balancing braces.
#[must_use]
pub fn first_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Common case: the whole response is the object.
    if trimmed.starts_with('{') && parses_as_object(trimmed) {
        return Some(trimmed);
    }

    let bytes = trimmed.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = trimmed[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            let candidate = &trimmed[start..=end];
            if parses_as_object(candidate) {
                return Some(candidate);
            }
        }
        search_from = start + 1;
    }
    None
}

fn parses_as_object(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate)
        .map(|v| v.is_object())
        .unwrap_or(false)
}

/// Walk from the opening brace at `start` to its matching close, skipping
/// braces inside string literals.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_response_is_object() {
        let raw = r#"{"reasoning": "direct", "steps": []}"#;
        assert_eq!(first_json_object(raw), Some(raw));
    }

    #[test]
    fn test_object_wrapped_in_prose() {
        let raw = r#"Here is the plan: {"steps": [{"agent": "prime_checker"}]} hope that helps."#;
        assert_eq!(
            first_json_object(raw),
            Some(r#"{"steps": [{"agent": "prime_checker"}]}"#)
        );
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = r#"note {"reasoning": "use {curly} braces", "ok": true} end"#;
        assert_eq!(
            first_json_object(raw),
            Some(r#"{"reasoning": "use {curly} braces", "ok": true}"#)
        );
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let raw = r#"{"text": "she said \"hi\" {plan}"}"#;
        assert_eq!(first_json_object(raw), Some(raw));
    }

    #[test]
    fn test_nested_objects() {
        let raw = r#"{"a": {"b": {"c": 1}}}"#;
        assert_eq!(first_json_object(raw), Some(raw));
    }

    #[test]
    fn test_skips_invalid_candidate() {
        let raw = r#"{not json} but then {"valid": 1}"#;
        assert_eq!(first_json_object(raw), Some(r#"{"valid": 1}"#));
    }

    #[test]
    fn test_no_object() {
        assert_eq!(first_json_object("no braces here"), None);
        assert_eq!(first_json_object(""), None);
        assert_eq!(first_json_object("   "), None);
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(first_json_object(r#"{"open": true"#), None);
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert_eq!(first_json_object(r#"[1, 2, 3]"#), None);
    }
}
