//! Dependency specifier scanner.
//!
//! Scans a transformed module body for `import`/`export ... from`/`require`/
//! dynamic `import()` specifiers without full parsing. Comments and string
//! literals are skipped; keywords are matched at identifier boundaries only.

/// Scan a module body for dependency specifiers.
///
/// Returns specifiers in first-appearance order, deduplicated.
#[must_use]
pub fn scan_dependencies(source: &str) -> Vec<String> {
    let bytes = source.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        // Comments
        if b == b'/' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'/' {
                i = skip_line_comment(bytes, i);
                continue;
            }
            if bytes[i + 1] == b'*' {
                i = skip_block_comment(bytes, i);
                continue;
            }
        }

        // Stray string literals (not part of a recognized statement)
        if is_quote(b) {
            i = skip_string(bytes, i);
            continue;
        }

        if keyword_at(bytes, i, b"import") {
            if let Some((spec, end)) = scan_import(bytes, i + 6) {
                push_unique(&mut found, spec);
                i = end;
                continue;
            }
            i += 6;
            continue;
        }

        if keyword_at(bytes, i, b"export") {
            if let Some((spec, end)) = scan_from_clause(bytes, i + 6) {
                push_unique(&mut found, spec);
                i = end;
                continue;
            }
            i += 6;
            continue;
        }

        if keyword_at(bytes, i, b"require") {
            if let Some((spec, end)) = scan_call_argument(bytes, i + 7) {
                push_unique(&mut found, spec);
                i = end;
                continue;
            }
            i += 7;
            continue;
        }

        i += 1;
    }

    found
}

fn push_unique(found: &mut Vec<String>, spec: String) {
    if !spec.is_empty() && !found.iter().any(|s| s == &spec) {
        found.push(spec);
    }
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

pub(crate) fn is_quote(b: u8) -> bool {
    b == b'"' || b == b'\'' || b == b'`'
}

/// Keyword match with identifier-boundary checks on both sides.
fn keyword_at(bytes: &[u8], pos: usize, keyword: &[u8]) -> bool {
    if pos + keyword.len() > bytes.len() || !bytes[pos..].starts_with(keyword) {
        return false;
    }
    if pos > 0 && is_ident_byte(bytes[pos - 1]) {
        return false;
    }
    let after = pos + keyword.len();
    after == bytes.len() || !is_ident_byte(bytes[after])
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

pub(crate) fn skip_line_comment(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

pub(crate) fn skip_block_comment(bytes: &[u8], mut i: usize) -> usize {
    i += 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Skip a string literal starting at the opening quote. Returns the position
/// after the closing quote, or the end of input if unterminated.
pub(crate) fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Read a quoted specifier starting at the opening quote.
fn read_quoted(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    if start >= bytes.len() || !is_quote(bytes[start]) {
        return None;
    }
    let end = skip_string(bytes, start);
    if end <= start + 1 || bytes.get(end - 1) != Some(&bytes[start]) {
        return None;
    }
    let spec = String::from_utf8_lossy(&bytes[start + 1..end - 1]).into_owned();
    Some((spec, end))
}

/// After the `import` keyword: handles `import("x")`, `import "x"`, and
/// `import ... from "x"`. `import.meta` is ignored.
fn scan_import(bytes: &[u8], after_keyword: usize) -> Option<(String, usize)> {
    let i = skip_whitespace(bytes, after_keyword);
    if i < bytes.len() && bytes[i] == b'.' {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'(' {
        return scan_call_argument(bytes, after_keyword);
    }
    if i < bytes.len() && is_quote(bytes[i]) {
        return read_quoted(bytes, i);
    }
    scan_from_clause(bytes, after_keyword)
}

/// Scan forward (bounded by `;`) for a `from "x"` clause.
fn scan_from_clause(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b';' {
        if is_quote(bytes[i]) {
            // A string before `from` means this is not an import/export-from
            // statement (e.g. `export const x = "y"` cannot occur, but a
            // quoted brace member can).
            i = skip_string(bytes, i);
            continue;
        }
        if keyword_at(bytes, i, b"from") {
            let at = skip_whitespace(bytes, i + 4);
            return read_quoted(bytes, at);
        }
        i += 1;
    }
    None
}

/// Scan `("x")` after `require` or `import`.
fn scan_call_argument(bytes: &[u8], after_keyword: usize) -> Option<(String, usize)> {
    let mut i = skip_whitespace(bytes, after_keyword);
    if i >= bytes.len() || bytes[i] != b'(' {
        return None;
    }
    i = skip_whitespace(bytes, i + 1);
    read_quoted(bytes, i)
}
