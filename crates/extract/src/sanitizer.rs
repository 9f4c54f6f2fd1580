//! Best-effort repair of extraction-service responses into parseable JSON.
//!
//! The repair strategies form an ordered chain; each one is a plain function
//! from string to string that is safe to apply to already-valid input, and
//! the driver re-attempts a parse after every stage. Exhausting the chain is
//! not an error here: the caller degrades the affected window to an empty
//! result instead.

use regex::Regex;

/// Turn a raw model response into a string that parses as JSON.
/// Returns `None` when every repair strategy is exhausted.
pub fn sanitize(raw: &str) -> Option<String> {
    let text = strip_bom(&strip_code_fences(raw));
    if parses(&text) {
        return Some(text);
    }

    let text = trim_to_structure(&text).unwrap_or(text);
    if parses(&text) {
        return Some(text);
    }

    let text = apply_heuristics(&text);
    if parses(&text) {
        return Some(text);
    }

    // The response may simply have been cut off mid-structure.
    let closed = close_open_structures(&text);
    if parses(&closed) {
        return Some(closed);
    }

    longest_parseable_prefix(&text)
}

fn parses(text: &str) -> bool {
    !text.is_empty() && serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Remove markdown code-fence markers the model wraps its output in.
pub fn strip_code_fences(text: &str) -> String {
    let re = Regex::new(r"```(?:json)?").unwrap();
    re.replace_all(text, "").trim().to_string()
}

pub fn strip_bom(text: &str) -> String {
    text.strip_prefix('\u{feff}').unwrap_or(text).to_string()
}

/// Trim to the substring between the first top-level `{`/`[` and the last
/// position where the bracket depth returns to zero. Brackets inside string
/// literals are ignored.
pub fn trim_to_structure(text: &str) -> Option<String> {
    let mut depth: i64 = 0;
    let mut start = None;
    let mut end = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => {
                if depth == 0 && start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i + c.len_utf8());
                } else if depth < 0 {
                    // stray closer before any opener
                    depth = 0;
                }
            }
            _ => {}
        }
    }

    match (start, end) {
        (Some(s), Some(e)) if e > s => Some(text[s..e].to_string()),
        _ => None,
    }
}

pub fn apply_heuristics(text: &str) -> String {
    let text = normalize_quotes(text);
    let text = remove_trailing_commas(&text);
    let text = insert_missing_commas(&text);
    let text = quote_bare_keys(&text);
    let text = strip_comments(&text);
    strip_control_chars(&text)
}

/// The model occasionally emits single-quoted keys and strings.
pub fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

pub fn remove_trailing_commas(text: &str) -> String {
    let re = Regex::new(r",\s*([}\]])").unwrap();
    re.replace_all(text, "$1").to_string()
}

/// Adjacent object/array literals with the separator dropped: `}{`, `]["`.
pub fn insert_missing_commas(text: &str) -> String {
    let re = Regex::new(r"([}\]])\s*([{\[])").unwrap();
    re.replace_all(text, "$1,$2").to_string()
}

pub fn quote_bare_keys(text: &str) -> String {
    let re = Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).unwrap();
    re.replace_all(text, "$1\"$2\":").to_string()
}

pub fn strip_comments(text: &str) -> String {
    let block = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    let line = Regex::new(r"//[^\n]*").unwrap();
    let text = block.replace_all(text, "");
    line.replace_all(&text, "").to_string()
}

pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Append closers for every bracket left open by a truncated response,
/// innermost first. A response cut off inside a string literal gets its
/// closing quote as well.
pub fn close_open_structures(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    while out.ends_with(',') || out.ends_with(':') {
        out.pop();
        while out.ends_with(char::is_whitespace) {
            out.pop();
        }
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Binary-search backward, line by line, for the longest prefix that parses
/// once synthesized closers are appended.
pub fn longest_parseable_prefix(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let mut lo = 1;
    let mut hi = lines.len();
    let mut best = None;

    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let candidate = close_open_structures(&lines[..mid].join("\n"));
        if parses(&candidate) {
            best = Some(candidate);
            lo = mid + 1;
        } else {
            if mid == 1 {
                break;
            }
            hi = mid - 1;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_json_passes_through() {
        let raw = r#"{"entities": [], "relationships": []}"#;
        assert_eq!(sanitize(raw).unwrap(), raw);
    }

    #[test]
    fn test_strip_code_fences() {
        let raw = "```json\n{\"entities\": []}\n```";
        assert_eq!(strip_code_fences(raw), "{\"entities\": []}");
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}{}"), "{}");
        assert_eq!(strip_bom("{}"), "{}");
    }

    #[test]
    fn test_trim_to_structure_drops_prose() {
        let raw = "好的，以下是提取结果：{\"entities\": [{\"id\": \"d1\"}]} 希望对你有帮助";
        assert_eq!(
            trim_to_structure(raw).unwrap(),
            "{\"entities\": [{\"id\": \"d1\"}]}"
        );
    }

    #[test]
    fn test_trim_to_structure_ignores_brackets_in_strings() {
        let raw = "note {\"name\": \"体征 [收缩压]\"} tail";
        assert_eq!(
            trim_to_structure(raw).unwrap(),
            "{\"name\": \"体征 [收缩压]\"}"
        );
    }

    #[test]
    fn test_normalize_quotes() {
        let fixed = normalize_quotes("{'id': 'd1'}");
        assert!(parses(&fixed));
    }

    #[test]
    fn test_remove_trailing_commas() {
        let fixed = remove_trailing_commas(r#"{"entities": [1, 2,], }"#);
        assert!(parses(&fixed));
    }

    #[test]
    fn test_insert_missing_commas() {
        let fixed = insert_missing_commas(r#"[{"id": "d1"} {"id": "d2"}]"#);
        assert!(parses(&fixed));
    }

    #[test]
    fn test_quote_bare_keys() {
        let fixed = quote_bare_keys(r#"{id: "d1", name: "室颤"}"#);
        assert!(parses(&fixed));
    }

    #[test]
    fn test_strip_comments() {
        let raw = "{\n  \"id\": \"d1\" // local id\n  /* block */\n}";
        assert!(parses(&strip_comments(raw)));
    }

    #[test]
    fn test_close_open_structures_on_truncation() {
        let raw = r#"{"entities": [{"id": "d1", "name": "心脏骤停"#;
        assert!(parses(&close_open_structures(raw)));
    }

    #[test]
    fn test_close_open_structures_drops_dangling_comma() {
        let raw = r#"{"entities": [{"id": "d1"},"#;
        assert!(parses(&close_open_structures(raw)));
    }

    #[test]
    fn test_fenced_response_with_missing_brace() {
        let raw = "```json\n{\"entities\": [{\"id\": \"d1\", \"type\": \"Disease\", \"name\": \"心脏骤停\"}]\n```";
        let fixed = sanitize(raw).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["entities"][0]["id"], "d1");
    }

    #[test]
    fn test_longest_prefix_salvages_damaged_tail() {
        let raw = "{\"entities\": [\n{\"id\": \"d1\"},\n{\"id\": \"d2\"},\n{\"id\": !!!garbage";
        let fixed = sanitize(raw).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert!(value["entities"].as_array().unwrap().len() >= 1);
    }

    #[test]
    fn test_hopeless_input_returns_none() {
        assert_eq!(sanitize("没有任何结构化内容"), None);
        assert_eq!(sanitize(""), None);
    }
}
