//! Zendesk adapter: tickets with comments, end-user accounts, help-center
//! articles and macros.

use serde_json::Value;

use supportbridge_shared::{
    Attributes, Entity, MacroAction, Message, MessageBody, NormalizedArticle, NormalizedContact,
    NormalizedConversation, NormalizedMacro, Source,
};

use super::SourceAdapter;
use crate::fields::{
    attachment, author_field, bool_field, copy_scalars, first_str, id_field, list_field,
    object_field, str_field, tags_field, ts_field,
};

/// Only accounts with this role are customers.
const END_USER_ROLE: &str = "end-user";

pub struct ZendeskAdapter;

impl SourceAdapter for ZendeskAdapter {
    fn source(&self) -> Source {
        Source::Zendesk
    }

    fn entities(&self) -> &'static [Entity] {
        &[
            Entity::Conversations,
            Entity::Contacts,
            Entity::Articles,
            Entity::Macros,
        ]
    }

    /// Agents, admins, suspended accounts and accounts without an
    /// `active` flag are not migrated.
    fn accepts_contact(&self, raw: &Value) -> bool {
        str_field(raw, "role").as_deref() == Some(END_USER_ROLE)
            && bool_field(raw, "active").unwrap_or(false)
    }

    fn normalize_contact(&self, raw: &Value) -> NormalizedContact {
        let mut contact = NormalizedContact::empty(Source::Zendesk);
        contact.source_id = id_field(raw, "id");
        contact.email = str_field(raw, "email");
        contact.name = str_field(raw, "name");
        contact.phone = str_field(raw, "phone");
        contact.created_at = ts_field(raw, "created_at");
        contact.tags = tags_field(raw, "tags");
        contact.custom_attributes = object_field(raw, "user_fields");
        copy_scalars(
            raw,
            &["time_zone", "locale", "organization_id"],
            &mut contact.extra,
        );
        contact
    }

    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation {
        let description = match str_field(raw, "description") {
            Some(text) => MessageBody::Plain(text),
            None => MessageBody::Empty,
        };

        let mut extra = Attributes::new();
        copy_scalars(
            raw,
            &["priority", "type", "assignee_id", "group_id", "organization_id"],
            &mut extra,
        );

        NormalizedConversation {
            source: Source::Zendesk,
            source_id: id_field(raw, "id"),
            title: first_str(raw, &["subject", "raw_subject"]),
            subject: None,
            status: str_field(raw, "status"),
            created_at: ts_field(raw, "created_at"),
            updated_at: ts_field(raw, "updated_at"),
            tags: tags_field(raw, "tags"),
            requester_id: id_field(raw, "requester_id"),
            initiator: None,
            description,
            messages: list_field(raw, "comments").iter().map(comment).collect(),
            extra,
        }
    }

    fn normalize_article(&self, raw: &Value) -> NormalizedArticle {
        let state = bool_field(raw, "draft").map(|draft| {
            if draft { "draft" } else { "published" }.to_string()
        });

        NormalizedArticle {
            source: Source::Zendesk,
            source_id: id_field(raw, "id"),
            title: str_field(raw, "title"),
            description: None,
            body: str_field(raw, "body"),
            author_id: id_field(raw, "author_id"),
            state,
            locale: str_field(raw, "locale"),
            category_id: id_field(raw, "section_id"),
            parent_type: None,
            created_at: ts_field(raw, "created_at"),
            updated_at: ts_field(raw, "updated_at"),
            tags: tags_field(raw, "label_names"),
            url: first_str(raw, &["html_url", "url"]),
        }
    }

    fn normalize_macro(&self, raw: &Value) -> Option<NormalizedMacro> {
        let actions = list_field(raw, "actions")
            .iter()
            .filter_map(|action| {
                Some(MacroAction {
                    field: str_field(action, "field")?,
                    value: action.get("value").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        Some(NormalizedMacro {
            source: Source::Zendesk,
            source_id: id_field(raw, "id"),
            title: str_field(raw, "title"),
            description: str_field(raw, "description"),
            active: bool_field(raw, "active").unwrap_or(true),
            actions,
            restriction: raw.get("restriction").filter(|r| !r.is_null()).cloned(),
            created_at: ts_field(raw, "created_at"),
            updated_at: ts_field(raw, "updated_at"),
        })
    }
}

/// Ticket comments prefer the HTML body; `body` / `plain_body` are plain text.
fn comment(raw: &Value) -> Message<MessageBody> {
    let content = if let Some(html) = str_field(raw, "html_body") {
        MessageBody::Html(html)
    } else if let Some(text) = first_str(raw, &["body", "plain_body"]) {
        MessageBody::Plain(text)
    } else {
        MessageBody::Empty
    };

    Message {
        id: id_field(raw, "id"),
        author: author_field(raw),
        content,
        created_at: ts_field(raw, "created_at"),
        public: bool_field(raw, "public"),
        part_type: None,
        attachments: list_field(raw, "attachments")
            .iter()
            .map(attachment)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use supportbridge_shared::{RecordId, SourceTimestamp};

    #[test]
    fn only_active_end_users_are_accepted() {
        let adapter = ZendeskAdapter;
        assert!(adapter.accepts_contact(&json!({"role": "end-user", "active": true})));
        assert!(!adapter.accepts_contact(&json!({"role": "agent", "active": true})));
        assert!(!adapter.accepts_contact(&json!({"role": "end-user", "active": false})));
        assert!(!adapter.accepts_contact(&json!({"active": true})));
        assert!(!adapter.accepts_contact(&json!({"role": "end-user"})));
        assert!(!adapter.accepts_contact(&json!({"role": "end-user", "active": null})));
    }

    #[test]
    fn contact_keeps_zendesk_scalars_in_extra() {
        let raw = json!({
            "id": 381,
            "email": "jane@example.com",
            "name": "Jane",
            "phone": null,
            "time_zone": "Paris",
            "locale": "fr",
            "organization_id": 12,
            "created_at": "2023-01-02T10:00:00Z",
            "tags": ["vip"],
            "role": "end-user"
        });

        let contact = ZendeskAdapter.normalize_contact(&raw);
        assert_eq!(contact.source_id, Some(RecordId::Number(381)));
        assert_eq!(contact.email.as_deref(), Some("jane@example.com"));
        assert_eq!(contact.phone, None);
        assert_eq!(contact.extra["time_zone"], "Paris");
        assert_eq!(contact.extra["organization_id"], 12);
        assert!(!contact.extra.contains_key("role"));
        assert_eq!(contact.tags, vec!["vip"]);
    }

    #[test]
    fn ticket_comments_prefer_html_body() {
        let raw = json!({
            "id": 42,
            "subject": "Refund",
            "status": "solved",
            "requester_id": 381,
            "description": "Hello\nI need help",
            "priority": "high",
            "comments": [
                {"id": 1, "author_id": 381, "html_body": "<p>Hi</p>", "body": "Hi", "public": true},
                {"id": 2, "author_id": 7, "body": "Plain answer"},
                {"id": 3, "author_id": 7, "html_body": " ", "attachments": [{"content_url": "https://z/f", "file_name": "f.pdf"}]}
            ]
        });

        let ticket = ZendeskAdapter.normalize_conversation(&raw);
        assert_eq!(ticket.title.as_deref(), Some("Refund"));
        assert_eq!(ticket.requester_id, Some(RecordId::Number(381)));
        assert_eq!(ticket.description, MessageBody::Plain("Hello\nI need help".into()));
        assert_eq!(ticket.extra["priority"], "high");
        assert_eq!(ticket.messages.len(), 3);
        assert_eq!(ticket.messages[0].content, MessageBody::Html("<p>Hi</p>".into()));
        assert_eq!(ticket.messages[0].author.id, Some(RecordId::Number(381)));
        assert_eq!(ticket.messages[1].content, MessageBody::Plain("Plain answer".into()));
        assert_eq!(ticket.messages[2].content, MessageBody::Empty);
        assert_eq!(ticket.messages[2].attachments.len(), 1);
    }

    #[test]
    fn missing_keys_never_fail() {
        let ticket = ZendeskAdapter.normalize_conversation(&json!({}));
        assert_eq!(ticket.source_id, None);
        assert_eq!(ticket.description, MessageBody::Empty);
        assert!(ticket.messages.is_empty());

        let contact = ZendeskAdapter.normalize_contact(&json!(null));
        assert_eq!(contact.email, None);
    }

    #[test]
    fn article_section_becomes_category() {
        let raw = json!({
            "id": 5,
            "title": "Reset password",
            "body": "<p>Steps</p>",
            "section_id": 900,
            "draft": false,
            "label_names": ["account"],
            "html_url": "https://help.example.com/a/5",
            "created_at": "2022-05-01T08:00:00Z"
        });

        let article = ZendeskAdapter.normalize_article(&raw);
        assert_eq!(article.category_id, Some(RecordId::Number(900)));
        assert_eq!(article.state.as_deref(), Some("published"));
        assert_eq!(article.tags, vec!["account"]);
        assert_eq!(
            article.created_at,
            Some(SourceTimestamp::Text("2022-05-01T08:00:00Z".into()))
        );
    }

    #[test]
    fn macro_actions_are_kept_in_order() {
        let raw = json!({
            "id": 77,
            "title": "Close and thank",
            "active": true,
            "actions": [
                {"field": "status", "value": "solved"},
                {"value": "orphan value"},
                {"field": "comment_value", "value": ["channel:all", "Thanks!"]}
            ],
            "restriction": null
        });

        let normalized = ZendeskAdapter.normalize_macro(&raw).unwrap();
        assert_eq!(normalized.actions.len(), 2);
        assert_eq!(normalized.actions[0].field, "status");
        assert_eq!(normalized.actions[1].value, json!(["channel:all", "Thanks!"]));
        assert_eq!(normalized.restriction, None);
    }
}
