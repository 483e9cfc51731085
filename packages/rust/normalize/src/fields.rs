//! Lenient field readers over raw JSON records.
//!
//! Every reader returns a default (`None`, empty vec, empty map) when the key
//! is missing or has an unexpected shape; raw records never fail to project.

use serde_json::Value;

use supportbridge_shared::{AttachmentRef, Attributes, MessageAuthor, RecordId, SourceTimestamp};

/// A non-blank string field, trimmed. Numbers and booleans are stringified.
pub(crate) fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(as_text)
}

/// First non-blank string among `keys`.
pub(crate) fn first_str(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| str_field(raw, key))
}

pub(crate) fn id_field(raw: &Value, key: &str) -> Option<RecordId> {
    raw.get(key).and_then(RecordId::from_json)
}

pub(crate) fn ts_field(raw: &Value, key: &str) -> Option<SourceTimestamp> {
    raw.get(key).and_then(SourceTimestamp::from_json)
}

pub(crate) fn bool_field(raw: &Value, key: &str) -> Option<bool> {
    raw.get(key).and_then(Value::as_bool)
}

static NULL: Value = Value::Null;

/// The value under `key`, or `null` so nested reads fall through to defaults.
pub(crate) fn field_or_null<'a>(raw: &'a Value, key: &str) -> &'a Value {
    raw.get(key).unwrap_or(&NULL)
}

/// The object under `key`, or an empty map.
pub(crate) fn object_field(raw: &Value, key: &str) -> Attributes {
    raw.get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// The array under `key`, or an empty slice.
pub(crate) fn list_field<'a>(raw: &'a Value, key: &str) -> &'a [Value] {
    raw.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Copy each present, non-null scalar under `keys` into `extra`.
pub(crate) fn copy_scalars(raw: &Value, keys: &[&str], extra: &mut Attributes) {
    for key in keys {
        match raw.get(*key) {
            None | Some(Value::Null) => {}
            Some(value) => {
                extra.insert((*key).to_string(), value.clone());
            }
        }
    }
}

/// Flatten any tag representation into plain tag names.
///
/// Accepts string arrays, arrays of `{name}` / `{id}` objects, and the
/// `{tags: [...]}` / `{data: [...]}` envelopes both sources wrap them in.
pub(crate) fn tags_field(raw: &Value, key: &str) -> Vec<String> {
    raw.get(key).map(flatten_tags).unwrap_or_default()
}

fn flatten_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(tag_name).collect(),
        Value::Object(map) => map
            .get("tags")
            .or_else(|| map.get("data"))
            .map(flatten_tags)
            .unwrap_or_default(),
        other => as_text(other).into_iter().collect(),
    }
}

fn tag_name(item: &Value) -> Option<String> {
    match item {
        Value::Object(_) => str_field(item, "name").or_else(|| str_field(item, "id")),
        other => as_text(other),
    }
}

/// Message author from an `author` object, falling back to flat
/// `author_id` / `author_type` / `author_name` / `author_email` keys.
pub(crate) fn author_field(raw: &Value) -> MessageAuthor {
    match raw.get("author").filter(|a| a.is_object()) {
        Some(author) => MessageAuthor {
            id: id_field(author, "id"),
            kind: str_field(author, "type"),
            name: str_field(author, "name"),
            email: str_field(author, "email"),
        },
        None => MessageAuthor {
            id: id_field(raw, "author_id"),
            kind: str_field(raw, "author_type"),
            name: str_field(raw, "author_name"),
            email: str_field(raw, "author_email"),
        },
    }
}

/// Attachment reference from either source's attachment shape.
pub(crate) fn attachment(raw: &Value) -> AttachmentRef {
    AttachmentRef {
        url: first_str(raw, &["content_url", "mapped_content_url", "url"]),
        file_name: first_str(raw, &["file_name", "name"]),
        content_type: str_field(raw, "content_type"),
        size: raw
            .get("size")
            .or_else(|| raw.get("filesize"))
            .and_then(Value::as_u64),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
