//! Intercom adapter: conversations with their parts, contacts and
//! help-center articles. Intercom has no macros.

use serde_json::Value;

use supportbridge_shared::{
    Attributes, Entity, Location, Message, MessageBody, NormalizedArticle, NormalizedContact,
    NormalizedConversation, RecordId, Source,
};

use super::SourceAdapter;
use crate::fields::{
    attachment, author_field, bool_field, copy_scalars, field_or_null, first_str, id_field,
    list_field, object_field, str_field, tags_field, ts_field,
};

pub struct IntercomAdapter;

impl SourceAdapter for IntercomAdapter {
    fn source(&self) -> Source {
        Source::Intercom
    }

    fn entities(&self) -> &'static [Entity] {
        &[Entity::Conversations, Entity::Contacts, Entity::Articles]
    }

    fn normalize_contact(&self, raw: &Value) -> NormalizedContact {
        let location = field_or_null(raw, "location");

        let mut contact = NormalizedContact::empty(Source::Intercom);
        contact.source_id = id_field(raw, "id");
        contact.email = str_field(raw, "email");
        contact.name = str_field(raw, "name");
        contact.phone = str_field(raw, "phone");
        contact.avatar_url = avatar_url(raw);
        contact.created_at = ts_field(raw, "created_at");
        contact.location = Location {
            country: str_field(location, "country"),
            city: str_field(location, "city"),
        };
        contact.custom_attributes = object_field(raw, "custom_attributes");
        contact.tags = tags_field(raw, "tags");
        copy_scalars(raw, &["external_id", "browser", "os"], &mut contact.extra);
        contact
    }

    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation {
        let opening = field_or_null(raw, "source");

        let description = match str_field(opening, "body") {
            Some(html) => MessageBody::Html(html),
            None => MessageBody::Empty,
        };
        let initiator = opening
            .get("author")
            .filter(|a| a.is_object())
            .map(|_| author_field(opening));

        let status = str_field(raw, "state").or_else(|| {
            bool_field(raw, "open").map(|open| if open { "open" } else { "closed" }.to_string())
        });

        let mut extra = Attributes::new();
        copy_scalars(
            raw,
            &["priority", "admin_assignee_id", "team_assignee_id", "waiting_since"],
            &mut extra,
        );

        NormalizedConversation {
            source: Source::Intercom,
            source_id: id_field(raw, "id"),
            title: str_field(raw, "title"),
            subject: str_field(opening, "subject"),
            status,
            created_at: ts_field(raw, "created_at"),
            updated_at: ts_field(raw, "updated_at"),
            tags: tags_field(raw, "tags"),
            requester_id: requester_id(raw),
            initiator,
            description,
            messages: conversation_parts(raw)
                .iter()
                .filter_map(part)
                .collect(),
            extra,
        }
    }

    fn normalize_article(&self, raw: &Value) -> NormalizedArticle {
        NormalizedArticle {
            source: Source::Intercom,
            source_id: id_field(raw, "id"),
            title: str_field(raw, "title"),
            description: str_field(raw, "description"),
            body: str_field(raw, "body"),
            author_id: id_field(raw, "author_id"),
            state: str_field(raw, "state"),
            locale: first_str(raw, &["locale", "default_locale"]),
            category_id: id_field(raw, "parent_id"),
            parent_type: str_field(raw, "parent_type"),
            created_at: ts_field(raw, "created_at"),
            updated_at: ts_field(raw, "updated_at"),
            tags: tags_field(raw, "tags"),
            url: str_field(raw, "url"),
        }
    }
}

/// `avatar` is either a URL string or an `{image_url}` object.
fn avatar_url(raw: &Value) -> Option<String> {
    match raw.get("avatar") {
        Some(avatar @ Value::Object(_)) => str_field(avatar, "image_url"),
        _ => str_field(raw, "avatar"),
    }
}

/// `contact_id`, else the first entry of `contacts` (bare list or
/// `{contacts: [...]}` envelope).
fn requester_id(raw: &Value) -> Option<RecordId> {
    id_field(raw, "contact_id").or_else(|| {
        ["/contacts/contacts/0/id", "/contacts/0/id"]
            .iter()
            .find_map(|pointer| raw.pointer(pointer).and_then(RecordId::from_json))
    })
}

/// Parts arrive as `messages`, a bare `conversation_parts` list, or the API's
/// `{conversation_parts: [...]}` envelope.
fn conversation_parts(raw: &Value) -> &[Value] {
    let messages = list_field(raw, "messages");
    if !messages.is_empty() {
        return messages;
    }

    match raw.get("conversation_parts") {
        Some(Value::Array(parts)) => parts.as_slice(),
        Some(envelope @ Value::Object(_)) => list_field(envelope, "conversation_parts"),
        _ => &[],
    }
}

/// A conversation part, or `None` for bodiless system events (assignments,
/// state changes) that carry nothing to migrate.
fn part(raw: &Value) -> Option<Message<MessageBody>> {
    let content = match str_field(raw, "body") {
        Some(html) => MessageBody::Html(html),
        None => MessageBody::Empty,
    };
    let attachments: Vec<_> = list_field(raw, "attachments")
        .iter()
        .map(attachment)
        .collect();

    if content.is_empty() && attachments.is_empty() {
        return None;
    }

    Some(Message {
        id: id_field(raw, "id"),
        author: author_field(raw),
        content,
        created_at: ts_field(raw, "created_at"),
        public: None,
        part_type: first_str(raw, &["part_type", "message_type"]),
        attachments,
    })
}
