//! Shared parsing helpers for adapter output.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A `path:line[:col]: rest` location prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<'a> {
    pub file: &'a str,
    pub line: u32,
    pub column: Option<u32>,
    pub rest: &'a str,
}

/// Split `path:line[:col]: rest` into its parts.
///
/// Returns `None` for lines that do not start with a location, which is how
/// headers, summaries and most context lines fall out of text parsers.
pub fn split_location(line: &str) -> Option<Located<'_>> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let mut parts = line.splitn(4, ':');
    let file = parts.next()?.trim();
    if file.is_empty() || file.contains(char::is_whitespace) {
        return None;
    }
    let line_no: u32 = parts.next()?.trim().parse().ok()?;
    let third = parts.next();
    let fourth = parts.next();

    let (column, rest) = match (third, fourth) {
        (Some(t), rest) if t.trim().parse::<u32>().is_ok() => (t.trim().parse().ok(), rest.unwrap_or("")),
        (Some(t), Some(f)) => {
            // Third segment is part of the message: re-join it with the remainder.
            let start = line.len() - f.len() - t.len() - 1;
            (None, &line[start..])
        }
        (Some(t), None) => (None, t),
        (None, _) => (None, ""),
    };

    Some(Located {
        file,
        line: line_no,
        column,
        rest: rest.trim(),
    })
}

/// Continuation lines that elaborate on a previous defect rather than report one.
pub fn is_continuation(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return false;
    }
    if line.starts_with(char::is_whitespace) {
        return true;
    }
    const PREFIXES: [&str; 8] = ["note:", "help:", "= note", "= help", "|", "-->", "^", "~"];
    PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Summary and header lines common across tools.
pub fn is_summary(line: &str) -> bool {
    let trimmed = line.trim();
    const PREFIXES: [&str; 9] = [
        "Found ",
        "All checks passed",
        "Success:",
        "Checked ",
        "[*] ",
        "No fixes available",
        "===",
        "---",
        "Summary",
    ];
    PREFIXES.iter().any(|p| trimmed.starts_with(p))
        || trimmed.ends_with("already formatted")
        || trimmed.ends_with("would be reformatted")
}

/// Lines a text parser should never turn into an issue.
pub fn is_noise(line: &str) -> bool {
    line.trim().is_empty() || is_continuation(line) || is_summary(line)
}

/// Locate and parse the JSON document embedded in tool output.
///
/// Tools frequently print a free-text preamble before their JSON. Candidate
/// start positions are tried in order of appearance, whichever of `{` or `[`
/// opens first, so a preamble can never make an array be read as its first
/// element object.
pub fn extract_json(text: &str) -> Option<Value> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(['{', '[']) {
        let start = offset + pos;
        if let Some(end) = balanced_end(&text[start..]) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..start + end]) {
                return Some(value);
            }
        }
        offset = start + 1;
    }
    None
}

/// Byte length of the balanced bracket expression at the start of `s`.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Deserialize each entry independently, skipping malformed ones.
pub fn parse_entries<T: DeserializeOwned>(tool: &str, values: &[Value]) -> Vec<T> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<T>(value.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("{}: skipping malformed entry {}: {}", tool, i, e);
                None
            }
        })
        .collect()
}

/// Whether a structured entry names a file. Entries without one are
/// malformed and are dropped here, before anything counts them.
pub fn has_path(tool: &str, path: &str) -> bool {
    if path.trim().is_empty() {
        log::warn!("{}: skipping entry without a file path", tool);
        return false;
    }
    true
}

/// Fetch `key` from a JSON object as an array, or treat a bare array as the list.
pub fn entries<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]),
        _ => &[],
    }
}

/// Take the first line of a possibly multi-line message.
pub fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("").trim()
}
