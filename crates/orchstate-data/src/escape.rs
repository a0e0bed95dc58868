//! Reversible escaping of mapping keys.
//!
//! The store forbids `.`, `$` and `\` in keys. Keys are percent-escaped on write:
//! `%` itself becomes `%25`, so any string (including one that already looks
//! escaped) survives `unescape_key(escape_key(k)) == k`.

use std::collections::BTreeMap;

use orchstate_core::Value;

const ESCAPES: [(char, &str); 4] = [('%', "%25"), ('.', "%2E"), ('$', "%24"), ('\\', "%5C")];

/// Escape one key.
#[must_use]
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match ESCAPES.iter().find(|(raw, _)| *raw == c) {
            Some((_, token)) => out.push_str(token),
            None => out.push(c),
        }
    }
    out
}

/// Undo [`escape_key`]. Sequences that are not escape tokens are kept verbatim.
#[must_use]
pub fn unescape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut rest = key;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ESCAPES.iter().find(|(_, token)| tail.starts_with(token)) {
            Some((raw, token)) => {
                out.push(*raw);
                rest = &tail[token.len()..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape every map key in `value`, at every depth.
#[must_use]
pub fn escape_value(value: Value) -> Value {
    walk(value, escape_key)
}

/// Unescape every map key in `value`, at every depth.
#[must_use]
pub fn unescape_value(value: Value) -> Value {
    walk(value, unescape_key)
}

fn walk(value: Value, rewrite: fn(&str) -> String) -> Value {
    match value {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (rewrite(&k), walk(v, rewrite)))
                .collect::<BTreeMap<_, _>>(),
        ),
        Value::List(items) => Value::List(items.into_iter().map(|v| walk(v, rewrite)).collect()),
        other => other,
    }
}
