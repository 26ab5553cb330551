//! Canonical forms for comparing local and remote representations.
//!
//! The remote sanitizes HTML, assigns ids, and drops empty config objects, so
//! byte equality says nothing useful. Everything here is pure and infallible:
//! input it cannot make sense of simply compares as different.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Named entities the remote sanitizer emits for characters we keep literal.
/// `&amp;` is last so `&amp;mdash;` decodes one level per pass.
const ENTITIES: &[(&str, &str)] = &[
    ("&ldquo;", "\u{201C}"),
    ("&rdquo;", "\u{201D}"),
    ("&lsquo;", "\u{2018}"),
    ("&rsquo;", "\u{2019}"),
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
    ("&amp;", "&"),
];

/// `<name attrs />`, with quoted attribute values consumed whole so a `/>`
/// in text or inside a value is never taken for a tag end.
fn self_closing() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<([A-Za-z][A-Za-z0-9:-]*)((?:[^<>"']|"[^"]*"|'[^']*')*?)\s*/>"#)
            .expect("self-closing pattern")
    })
}

fn empty_element() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<([A-Za-z][A-Za-z0-9:-]*)((?:[^<>"']|"[^"]*"|'[^']*')*)></([A-Za-z][A-Za-z0-9:-]*)\s*>"#)
            .expect("empty-element pattern")
    })
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Canonicalize a template so sanitizer round-trips compare equal.
///
/// Repeats a single pass until nothing changes. Every step either shrinks the
/// string or leaves it alone, so the loop terminates, and the result is a
/// fixpoint: `normalize_template(normalize_template(s)) == normalize_template(s)`.
pub fn normalize_template(template: &str) -> String {
    let mut current = normalize_pass(template);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_pass(input: &str) -> String {
    let unix = input.replace("\r\n", "\n");
    let trimmed_lines = unix
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    let collapsed = self_closing().replace_all(&trimmed_lines, "<$1$2>");
    let collapsed = empty_element().replace_all(&collapsed, |caps: &Captures| {
        if caps[1].eq_ignore_ascii_case(&caps[3]) {
            format!("<{}{}>", &caps[1], &caps[2])
        } else {
            caps[0].to_string()
        }
    });

    let mut decoded = collapsed.into_owned();
    for (entity, literal) in ENTITIES {
        if decoded.contains(entity) {
            decoded = decoded.replace(entity, literal);
        }
    }

    decoded.trim().to_string()
}

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

/// Drop what the remote regenerates or omits from a list of field descriptors.
///
/// - `id` / `_id` on each descriptor
/// - `id` / `_id` on each record of an `items` field's `value`
/// - `config` when it is an empty object
///
/// Recurses into `config.fields`. Non-object entries pass through untouched.
pub fn strip_field_volatile(fields: &[Value]) -> Vec<Value> {
    fields.iter().map(strip_descriptor).collect()
}

fn strip_descriptor(field: &Value) -> Value {
    let Value::Object(map) = field else {
        return field.clone();
    };
    let mut out = map.clone();
    remove_ids(&mut out);

    if out.get("type").and_then(Value::as_str) == Some("items") {
        if let Some(Value::Array(records)) = out.get_mut("value") {
            for record in records.iter_mut() {
                if let Value::Object(record) = record {
                    remove_ids(record);
                }
            }
        }
    }

    let empty_config = matches!(out.get("config"), Some(Value::Object(c)) if c.is_empty());
    if empty_config {
        out.remove("config");
    } else if let Some(Value::Object(config)) = out.get_mut("config") {
        if let Some(Value::Array(nested)) = config.get_mut("fields") {
            *nested = strip_field_volatile(nested);
        }
    }

    Value::Object(out)
}

fn remove_ids(map: &mut Map<String, Value>) {
    map.remove("id");
    map.remove("_id");
}

// ---------------------------------------------------------------------------
// Generic difference
// ---------------------------------------------------------------------------

/// `true` when `a` and `b` should be reported as different.
///
/// Primitives compare by value; values of different JSON kinds always differ;
/// arrays and objects compare by their serialization. `serde_json::Map` is
/// key-ordered, so object keys come out sorted while array order is kept
/// (reordering repeatable items is a real change). A value that fails to
/// serialize compares as different.
pub fn is_different(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => false,
        (Value::Bool(x), Value::Bool(y)) => x != y,
        (Value::Number(x), Value::Number(y)) => x != y,
        (Value::String(x), Value::String(y)) => x != y,
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            match (serde_json::to_string(a), serde_json::to_string(b)) {
                (Ok(x), Ok(y)) => x != y,
                _ => true,
            }
        }
        _ => true,
    }
}
