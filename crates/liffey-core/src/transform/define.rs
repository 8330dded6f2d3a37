//! Compile-time constant substitution.

use serde_json::Value;

use super::scan::{is_ident_byte, is_quote, skip_block_comment, skip_line_comment, skip_string};

/// Table of token to code-fragment replacements applied to a module body
/// after its transform chain runs.
///
/// Tokens are matched at identifier boundaries in code positions only, never
/// inside string literals or comments, and never as a member access on some
/// other object (`foo.ENV` does not match the token `ENV`). Entries are kept
/// sorted longest-first so the longest token wins at any position.
#[derive(Debug, Default, Clone)]
pub struct SubstitutionTable {
    entries: Vec<(String, String)>,
}

impl SubstitutionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a token with a literal replacement fragment. Re-inserting a
    /// token overwrites the previous replacement.
    pub fn insert(&mut self, token: &str, replacement: &str) {
        let probe = self.entries.binary_search_by(|(existing, _)| {
            existing
                .len()
                .cmp(&token.len())
                .reverse()
                .then_with(|| existing.as_str().cmp(token))
        });
        match probe {
            Ok(pos) => self.entries[pos].1 = replacement.to_owned(),
            Err(pos) => self
                .entries
                .insert(pos, (token.to_owned(), replacement.to_owned())),
        }
    }

    /// Insert a token with a configured value.
    ///
    /// A string value is inserted verbatim as a code fragment. An object
    /// expands to one entry per nested key, joined with dots. Any other value
    /// is inserted as its JSON text.
    pub fn insert_value(&mut self, token: &str, value: &Value) {
        match value {
            Value::String(code) => self.insert(token, code),
            Value::Object(map) => {
                for (key, nested) in map {
                    self.insert_value(&format!("{token}.{key}"), nested);
                }
            }
            other => self.insert(token, &other.to_string()),
        }
    }

    /// Apply all substitutions to `input` in a single pass.
    #[must_use]
    pub fn apply(&self, input: &str) -> String {
        if self.entries.is_empty() {
            return input.to_owned();
        }
        let bytes = input.as_bytes();
        let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'/' && i + 1 < bytes.len() {
                if bytes[i + 1] == b'/' {
                    let end = skip_line_comment(bytes, i);
                    out.extend_from_slice(&bytes[i..end]);
                    i = end;
                    continue;
                }
                if bytes[i + 1] == b'*' {
                    let end = skip_block_comment(bytes, i);
                    out.extend_from_slice(&bytes[i..end]);
                    i = end;
                    continue;
                }
            }
            if is_quote(b) {
                let end = skip_string(bytes, i);
                out.extend_from_slice(&bytes[i..end]);
                i = end;
                continue;
            }
            if let Some((token, replacement)) = self.match_at(bytes, i) {
                out.extend_from_slice(replacement.as_bytes());
                i += token.len();
                continue;
            }
            out.push(b);
            i += 1;
        }
        // Splices happen at ASCII boundaries, so the result stays valid UTF-8.
        String::from_utf8(out)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
    }

    fn match_at(&self, bytes: &[u8], i: usize) -> Option<(&str, &str)> {
        if i > 0 {
            let prev = bytes[i - 1];
            if is_ident_byte(prev) || prev == b'.' {
                return None;
            }
        }
        for (token, replacement) in &self.entries {
            if bytes[i..].starts_with(token.as_bytes()) {
                let after = i + token.len();
                if after == bytes.len() || !is_ident_byte(bytes[after]) {
                    return Some((token, replacement));
                }
            }
        }
        None
    }
}

/// True when `token` occurs at an identifier boundary in a code position of
/// `input`, outside string literals and comments.
pub(crate) fn contains_token(input: &str, token: &str) -> bool {
    let bytes = input.as_bytes();
    let t = token.as_bytes();
    if t.is_empty() {
        return false;
    }
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
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
        if is_quote(b) {
            i = skip_string(bytes, i);
            continue;
        }
        if bytes[i..].starts_with(t) {
            let left_ok = i == 0 || (!is_ident_byte(bytes[i - 1]) && bytes[i - 1] != b'.');
            let after = i + t.len();
            let right_ok = after == bytes.len() || !is_ident_byte(bytes[after]);
            if left_ok && right_ok {
                return true;
            }
        }
        i += 1;
    }
    false
}
