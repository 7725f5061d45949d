//! Small text helpers shared by the formats and the resolver.

/// Split `text` at `separator`, ignoring separators inside double quotes
/// and inside `()`, `[]` or `{}` pairs.
///
/// Parts are trimmed. Returns `None` when quotes or brackets are
/// unbalanced. An empty input yields no parts.
pub fn split_nested(text: &str, separator: char) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: Vec<char> = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_quotes {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth.push(c);
                current.push(c);
            }
            ')' | ']' | '}' => {
                let open = depth.pop()?;
                if matching_close(open) != c {
                    return None;
                }
                current.push(c);
            }
            _ if c == separator && depth.is_empty() => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if in_quotes || !depth.is_empty() {
        return None;
    }
    let last = current.trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last.to_string());
    }
    Some(parts)
}

/// Byte offset of the first `terminator` outside quotes and brackets.
pub fn find_unnested(text: &str, terminator: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if c == terminator && depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

fn matching_close(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Remove surrounding double quotes and resolve `\"` and `\\` escapes.
///
/// Returns `None` if `text` is not a quoted string.
pub fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Quote `text`, escaping embedded quotes and backslashes.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn simplify(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
