//! Entity records flowing through the pipeline: normalized records from
//! each source, transformed conversations, and the canonical documents
//! handed to the loader.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{RecordId, Source, SourceTimestamp};

/// Open-ended attribute map for source-specific data.
pub type Attributes = Map<String, Value>;

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// Geographic location of a contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// A contact projected from one source's user/contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedContact {
    pub source: Source,
    #[serde(default)]
    pub source_id: Option<RecordId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<SourceTimestamp>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub custom_attributes: Attributes,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source-specific scalars (time zone, locale, browser, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Attributes,
}

impl NormalizedContact {
    /// An empty contact for `source`; every field at its default.
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            source_id: None,
            email: None,
            name: None,
            phone: None,
            avatar_url: None,
            created_at: None,
            location: Location::default(),
            custom_attributes: Attributes::new(),
            tags: Vec::new(),
            extra: Attributes::new(),
        }
    }
}

/// A deduplicated contact ready for the target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalContact {
    /// Mangled email, unique across the collection.
    pub email: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub zendesk_id: Option<RecordId>,
    pub intercom_id: Option<RecordId>,
    #[serde(rename = "imported_from_zd_at")]
    pub imported_from_zendesk_at: Option<String>,
    pub imported_from_intercom_at: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub additional_attributes: Attributes,
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// Body of a message as the source delivered it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "text", rename_all = "lowercase")]
pub enum MessageBody {
    Html(String),
    Plain(String),
    #[default]
    Empty,
}

impl MessageBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Html(text) | Self::Plain(text) => text.trim().is_empty(),
            Self::Empty => true,
        }
    }
}

/// Who wrote a message, as far as the source tells us.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageAuthor {
    #[serde(default)]
    pub id: Option<RecordId>,
    /// Author type tag (`admin`, `user`, `bot`, ...). Intercom only.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A file attached to a message. Only the reference is kept; bytes are
/// re-uploaded by the loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One message (Zendesk comment or Intercom conversation part).
///
/// Generic over the body so the same shape carries raw bodies after
/// normalization and rendered markdown after transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<B> {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub author: MessageAuthor,
    pub content: B,
    #[serde(default)]
    pub created_at: Option<SourceTimestamp>,
    #[serde(default)]
    pub public: Option<bool>,
    /// Intercom part type (`comment`, `note`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_type: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// A ticket (Zendesk) or conversation (Intercom).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation<B> {
    pub source: Source,
    #[serde(default)]
    pub source_id: Option<RecordId>,
    #[serde(default)]
    pub title: Option<String>,
    /// HTML subject of the opening message (Intercom). Takes precedence
    /// over `title` once flattened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<SourceTimestamp>,
    #[serde(default)]
    pub updated_at: Option<SourceTimestamp>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Foreign key into the source's contacts (requester / contact id).
    #[serde(default)]
    pub requester_id: Option<RecordId>,
    /// Author of the opening source message, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<MessageAuthor>,
    /// Ticket description or opening message body.
    pub description: B,
    #[serde(default)]
    pub messages: Vec<Message<B>>,
    /// Source-specific scalars (priority, assignees, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Attributes,
}

/// A conversation straight out of the normalizer.
pub type NormalizedConversation = Conversation<MessageBody>;

/// A conversation whose bodies are rendered markdown with date headers.
pub type TransformedConversation = Conversation<String>;

/// Direction of a message on the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Incoming,
    Outgoing,
}

/// A message ready for the target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub content: String,
    pub message_type: MessageType,
    pub author_name: String,
    pub created_at: Option<SourceTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_type: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// A conversation attached to its canonical contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalConversation {
    pub contact_email: String,
    pub title: String,
    pub status: Option<String>,
    pub zendesk_ticket_id: Option<RecordId>,
    pub intercom_conversation_id: Option<RecordId>,
    pub created_at: Option<SourceTimestamp>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub additional_attributes: Attributes,
    pub messages: Vec<CanonicalMessage>,
}

// ---------------------------------------------------------------------------
// Help-center content
// ---------------------------------------------------------------------------

/// A help-center article from either source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    pub source: Source,
    pub source_id: Option<RecordId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub author_id: Option<RecordId>,
    pub state: Option<String>,
    pub locale: Option<String>,
    /// Zendesk section or Intercom parent collection.
    pub category_id: Option<RecordId>,
    pub parent_type: Option<String>,
    pub created_at: Option<SourceTimestamp>,
    pub updated_at: Option<SourceTimestamp>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub url: Option<String>,
}

/// One `field = value` step of a macro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroAction {
    pub field: String,
    pub value: Value,
}

/// A canned-response macro (Zendesk only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMacro {
    pub source: Source,
    pub source_id: Option<RecordId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub actions: Vec<MacroAction>,
    pub restriction: Option<Value>,
    pub created_at: Option<SourceTimestamp>,
    pub updated_at: Option<SourceTimestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_body_serializes_with_format_tag() {
        let body = MessageBody::Html("<p>Hi</p>".into());
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"format": "html", "text": "<p>Hi</p>"}));

        let parsed: MessageBody = serde_json::from_value(json!({"format": "empty"})).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn canonical_contact_uses_loader_field_names() {
        let contact = CanonicalContact {
            email: "jane_example.com@alphorm.com".into(),
            name: Some("Jane".into()),
            phone_number: None,
            zendesk_id: Some(RecordId::Number(7)),
            intercom_id: None,
            imported_from_zendesk_at: Some("20240101_120000".into()),
            imported_from_intercom_at: None,
            avatar_url: None,
            additional_attributes: Attributes::new(),
        };
        let value = serde_json::to_value(&contact).unwrap();
        assert_eq!(value["imported_from_zd_at"], "20240101_120000");
        assert_eq!(value["zendesk_id"], 7);
        assert!(value["intercom_id"].is_null());
    }

    #[test]
    fn transformed_conversation_roundtrip() {
        let conv: TransformedConversation = Conversation {
            source: Source::Intercom,
            source_id: Some("123".into()),
            title: Some("Billing".into()),
            subject: Some("<p>Billing</p>".into()),
            status: Some("open".into()),
            created_at: Some(SourceTimestamp::Epoch(1_700_000_000)),
            updated_at: None,
            tags: vec!["vip".into()],
            requester_id: Some("abc".into()),
            initiator: None,
            description: String::new(),
            messages: vec![Message {
                id: None,
                author: MessageAuthor::default(),
                content: "Date originale: inconnue".into(),
                created_at: None,
                public: None,
                part_type: Some("note".into()),
                attachments: vec![],
            }],
            extra: Attributes::new(),
        };

        let json = serde_json::to_string(&conv).unwrap();
        let parsed: TransformedConversation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, conv);
    }
}
