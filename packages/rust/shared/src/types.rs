//! Primitive domain types shared by every stage: sources, entities,
//! source identifiers and source timestamps.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Domain every migrated email address is remapped to.
pub const TARGET_EMAIL_DOMAIN: &str = "alphorm.com";

/// Title used when a conversation has none.
pub const DEFAULT_TITLE: &str = "Sans titre";

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// An originating help-desk platform.
///
/// Zendesk is processed first during merges; Intercom is the priority
/// source whose scalar contact fields win on collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Zendesk,
    Intercom,
}

impl Source {
    /// All sources in processing order.
    pub const ALL: [Source; 2] = [Source::Zendesk, Source::Intercom];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zendesk => "zendesk",
            Self::Intercom => "intercom",
        }
    }

    /// Two-letter code used in placeholder emails.
    pub fn short_code(self) -> &'static str {
        match self {
            Self::Zendesk => "zd",
            Self::Intercom => "ic",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zendesk" | "zd" => Ok(Self::Zendesk),
            "intercom" | "ic" => Ok(Self::Intercom),
            other => Err(format!(
                "unknown source '{other}': expected 'zendesk' or 'intercom'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A record family exported from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Conversations,
    Contacts,
    Articles,
    Macros,
}

impl Entity {
    /// The envelope key (and file stem) a source uses for this entity.
    pub fn plural_key(self, source: Source) -> &'static str {
        match (self, source) {
            (Self::Conversations, Source::Zendesk) => "tickets",
            (Self::Conversations, Source::Intercom) => "conversations",
            (Self::Contacts, Source::Zendesk) => "users",
            (Self::Contacts, Source::Intercom) => "contacts",
            (Self::Articles, _) => "articles",
            (Self::Macros, _) => "macros",
        }
    }
}

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// A source-system identifier.
///
/// Zendesk ids are integers, Intercom ids are strings; both round-trip
/// through JSON in their original form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Read an identifier from a raw JSON value. Blank strings, nulls and
    /// non-scalar values yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Self::Number),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.trim().to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// SourceTimestamp
// ---------------------------------------------------------------------------

/// A timestamp exactly as the source reported it.
///
/// Intercom reports epoch seconds, Zendesk reports ISO-8601 text. The raw
/// value is kept so an unparseable timestamp can still be shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceTimestamp {
    Epoch(i64),
    Text(String),
}

impl SourceTimestamp {
    /// Read a timestamp from a raw JSON value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Self::Epoch),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.trim().to_string())),
            _ => None,
        }
    }

    /// Wall-clock date and time of this timestamp, if it can be resolved.
    ///
    /// Epoch values resolve in UTC. RFC 3339 text keeps its own offset's
    /// wall-clock time. Naive ISO text is taken as-is, and purely numeric
    /// text is treated as epoch seconds.
    pub fn to_wall_clock(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Epoch(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
            Self::Text(text) => parse_text_timestamp(text),
        }
    }

    /// The value as the source reported it.
    pub fn raw(&self) -> String {
        match self {
            Self::Epoch(secs) => secs.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

fn parse_text_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }

    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = text.parse().ok()?;
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_parsing_and_display() {
        assert_eq!("Zendesk".parse::<Source>().unwrap(), Source::Zendesk);
        assert_eq!("ic".parse::<Source>().unwrap(), Source::Intercom);
        assert!("freshdesk".parse::<Source>().is_err());
        assert_eq!(Source::Intercom.to_string(), "intercom");
    }

    #[test]
    fn entity_plural_keys_follow_each_source() {
        assert_eq!(Entity::Conversations.plural_key(Source::Zendesk), "tickets");
        assert_eq!(Entity::Contacts.plural_key(Source::Zendesk), "users");
        assert_eq!(Entity::Contacts.plural_key(Source::Intercom), "contacts");
        assert_eq!(Entity::Articles.plural_key(Source::Intercom), "articles");
    }

    #[test]
    fn record_id_keeps_original_json_shape() {
        let numeric = RecordId::from_json(&json!(381)).unwrap();
        let text = RecordId::from_json(&json!("5f1a2b")).unwrap();
        assert_eq!(serde_json::to_value(&numeric).unwrap(), json!(381));
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("5f1a2b"));
        assert_eq!(RecordId::from_json(&json!("  ")), None);
        assert_eq!(RecordId::from_json(&json!(null)), None);
    }

    #[test]
    fn epoch_timestamp_resolves_in_utc() {
        let ts = SourceTimestamp::from_json(&json!(1_700_000_000)).unwrap();
        let dt = ts.to_wall_clock().unwrap();
        assert_eq!(dt.format("%d/%m/%Y %H:%M").to_string(), "14/11/2023 22:13");
    }

    #[test]
    fn rfc3339_timestamp_keeps_its_offset() {
        let ts = SourceTimestamp::Text("2024-03-05T09:07:00+02:00".into());
        let dt = ts.to_wall_clock().unwrap();
        assert_eq!(dt.format("%d/%m/%Y %H:%M").to_string(), "05/03/2024 09:07");
    }

    #[test]
    fn numeric_text_is_epoch_and_garbage_is_unresolved() {
        let ts = SourceTimestamp::Text("1700000000".into());
        assert!(ts.to_wall_clock().is_some());

        let ts = SourceTimestamp::Text("last tuesday".into());
        assert!(ts.to_wall_clock().is_none());
        assert_eq!(ts.raw(), "last tuesday");
    }
}
