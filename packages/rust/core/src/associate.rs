//! Conversation association: attach each transformed conversation to its
//! canonical contact and classify its messages as incoming or outgoing.
//!
//! Conversations whose requester cannot be resolved are orphans: they are
//! counted and dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use supportbridge_markdown::LINE_BREAK;
use supportbridge_shared::{
    Attributes, CanonicalConversation, CanonicalMessage, DEFAULT_TITLE, MessageType, RecordId,
    Source, TransformedConversation,
};

use crate::merge::ContactIndex;

/// Author name of Zendesk comments written by the requester.
const CLIENT_AUTHOR: &str = "Client";
/// Author name of every other Zendesk comment.
const AGENT_AUTHOR: &str = "Agent";
/// Author name of Intercom parts with no named author.
const UNKNOWN_AUTHOR: &str = "Unknown";

/// Settings for one association run.
#[derive(Debug, Clone)]
pub struct AssociateOptions {
    /// Title given to conversations that have none.
    pub default_title: String,
}

impl Default for AssociateOptions {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// Counters reported with the prepared conversations document.
///
/// `zendesk + intercom + orphans` always equals the number of input
/// conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociateStats {
    pub zendesk: usize,
    pub intercom: usize,
    pub orphans: usize,
}

// ---------------------------------------------------------------------------
// Status and role mapping
// ---------------------------------------------------------------------------

/// Zendesk: `solved` and `closed` become `resolved`; other statuses pass
/// through unchanged.
pub fn map_zendesk_status(status: Option<&str>) -> Option<String> {
    match status {
        Some("solved" | "closed") => Some("resolved".to_string()),
        other => other.map(str::to_string),
    }
}

/// Intercom: `closed` → `resolved`, every other state (including `snoozed`
/// and a missing one) is `open`.
pub fn map_intercom_status(state: Option<&str>) -> String {
    match state {
        Some("closed") => "resolved",
        _ => "open",
    }
    .to_string()
}

/// Intercom parts from `user` authors are incoming; admins, bots and
/// unknown authors are outgoing.
pub fn classify_intercom_author(kind: Option<&str>) -> MessageType {
    match kind {
        Some("user") => MessageType::Incoming,
        _ => MessageType::Outgoing,
    }
}

fn same_id(a: Option<&RecordId>, b: Option<&RecordId>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.to_string() == b.to_string(),
        _ => false,
    }
}

/// The target API takes real line feeds.
fn to_target_content(markdown: &str) -> String {
    markdown.replace(LINE_BREAK, "\n")
}

fn pick_attributes(extra: &Attributes, keys: &[&str]) -> Attributes {
    keys.iter()
        .map(|key| {
            let value = extra.get(*key).cloned().unwrap_or(Value::Null);
            ((*key).to_string(), value)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Per-source formatting
// ---------------------------------------------------------------------------

fn format_zendesk(
    ticket: &TransformedConversation,
    contact_email: &str,
    options: &AssociateOptions,
) -> CanonicalConversation {
    let messages = ticket
        .messages
        .iter()
        .map(|comment| {
            let from_requester = same_id(comment.author.id.as_ref(), ticket.requester_id.as_ref());
            let (message_type, author) = if from_requester {
                (MessageType::Incoming, CLIENT_AUTHOR)
            } else {
                (MessageType::Outgoing, AGENT_AUTHOR)
            };

            CanonicalMessage {
                content: to_target_content(&comment.content),
                message_type,
                author_name: author.to_string(),
                created_at: comment.created_at.clone(),
                part_type: None,
                attachments: comment.attachments.clone(),
            }
        })
        .collect();

    CanonicalConversation {
        contact_email: contact_email.to_string(),
        title: ticket
            .title
            .clone()
            .unwrap_or_else(|| options.default_title.clone()),
        status: map_zendesk_status(ticket.status.as_deref()),
        zendesk_ticket_id: ticket.source_id.clone(),
        intercom_conversation_id: None,
        created_at: ticket.created_at.clone(),
        tags: ticket.tags.clone(),
        additional_attributes: pick_attributes(
            &ticket.extra,
            &["priority", "type", "assignee_id", "group_id"],
        ),
        messages,
    }
}

fn format_intercom(
    conversation: &TransformedConversation,
    contact_email: &str,
    options: &AssociateOptions,
) -> CanonicalConversation {
    let mut messages = Vec::with_capacity(conversation.messages.len() + 1);

    if !conversation.description.is_empty() {
        let author = conversation
            .initiator
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| CLIENT_AUTHOR.to_string());

        messages.push(CanonicalMessage {
            content: to_target_content(&conversation.description),
            message_type: MessageType::Incoming,
            author_name: author,
            created_at: conversation.created_at.clone(),
            part_type: None,
            attachments: Vec::new(),
        });
    }

    messages.extend(conversation.messages.iter().map(|part| CanonicalMessage {
        content: to_target_content(&part.content),
        message_type: classify_intercom_author(part.author.kind.as_deref()),
        author_name: part
            .author
            .name
            .clone()
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        created_at: part.created_at.clone(),
        part_type: part.part_type.clone(),
        attachments: part.attachments.clone(),
    }));

    CanonicalConversation {
        contact_email: contact_email.to_string(),
        title: conversation
            .title
            .clone()
            .unwrap_or_else(|| options.default_title.clone()),
        status: Some(map_intercom_status(conversation.status.as_deref())),
        zendesk_ticket_id: None,
        intercom_conversation_id: conversation.source_id.clone(),
        created_at: conversation.created_at.clone(),
        tags: conversation.tags.clone(),
        additional_attributes: pick_attributes(
            &conversation.extra,
            &["priority", "admin_assignee_id", "team_assignee_id"],
        ),
        messages,
    }
}

// ---------------------------------------------------------------------------
// Association
// ---------------------------------------------------------------------------

/// Attach every conversation to its canonical contact.
///
/// Output holds all resolved Zendesk tickets, then all resolved Intercom
/// conversations, each in input order.
#[instrument(skip_all, fields(zendesk = zendesk.len(), intercom = intercom.len()))]
pub fn associate_conversations(
    zendesk: &[TransformedConversation],
    intercom: &[TransformedConversation],
    index: &ContactIndex,
    options: &AssociateOptions,
) -> (Vec<CanonicalConversation>, AssociateStats) {
    let mut stats = AssociateStats::default();
    let mut out = Vec::with_capacity(zendesk.len() + intercom.len());

    for (source, conversations) in [(Source::Zendesk, zendesk), (Source::Intercom, intercom)] {
        for conversation in conversations {
            let email = conversation
                .requester_id
                .as_ref()
                .and_then(|id| index.lookup(source, id));

            let Some(email) = email else {
                debug!(
                    %source,
                    id = ?conversation.source_id,
                    requester = ?conversation.requester_id,
                    "orphan conversation dropped"
                );
                stats.orphans += 1;
                continue;
            };

            match source {
                Source::Zendesk => {
                    out.push(format_zendesk(conversation, email, options));
                    stats.zendesk += 1;
                }
                Source::Intercom => {
                    out.push(format_intercom(conversation, email, options));
                    stats.intercom += 1;
                }
            }
        }
    }

    info!(
        total = out.len(),
        zendesk = stats.zendesk,
        intercom = stats.intercom,
        orphans = stats.orphans,
        "conversations associated"
    );

    (out, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use supportbridge_shared::{
        CanonicalContact, Conversation, Message, MessageAuthor, SourceTimestamp,
    };

    fn contact(email: &str, zendesk_id: Option<RecordId>, intercom_id: Option<RecordId>) -> CanonicalContact {
        CanonicalContact {
            email: email.into(),
            name: None,
            phone_number: None,
            zendesk_id,
            intercom_id,
            imported_from_zendesk_at: None,
            imported_from_intercom_at: None,
            avatar_url: None,
            additional_attributes: Attributes::new(),
        }
    }

    fn message(author: MessageAuthor, content: &str) -> Message<String> {
        Message {
            id: None,
            author,
            content: content.into(),
            created_at: Some(SourceTimestamp::Epoch(1_700_000_000)),
            public: None,
            part_type: None,
            attachments: vec![],
        }
    }

    fn conversation(
        source: Source,
        id: RecordId,
        requester: Option<RecordId>,
        messages: Vec<Message<String>>,
    ) -> TransformedConversation {
        Conversation {
            source,
            source_id: Some(id),
            title: None,
            subject: None,
            status: None,
            created_at: Some(SourceTimestamp::Epoch(1_700_000_000)),
            updated_at: None,
            tags: vec![],
            requester_id: requester,
            initiator: None,
            description: String::new(),
            messages,
            extra: Attributes::new(),
        }
    }

    fn author(id: Option<RecordId>, kind: Option<&str>, name: Option<&str>) -> MessageAuthor {
        MessageAuthor {
            id,
            kind: kind.map(str::to_string),
            name: name.map(str::to_string),
            email: None,
        }
    }

    fn index() -> ContactIndex {
        ContactIndex::build(&[
            contact("a_x.com@alphorm.com", Some(RecordId::Number(7)), None),
            contact("b_x.com@alphorm.com", None, Some(RecordId::Text("u1".into()))),
        ])
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_zendesk_status(Some("solved")).as_deref(), Some("resolved"));
        assert_eq!(map_zendesk_status(Some("closed")).as_deref(), Some("resolved"));
        assert_eq!(map_zendesk_status(Some("pending")).as_deref(), Some("pending"));
        assert_eq!(map_zendesk_status(None), None);

        assert_eq!(map_intercom_status(Some("closed")), "resolved");
        assert_eq!(map_intercom_status(Some("snoozed")), "open");
        assert_eq!(map_intercom_status(Some("open")), "open");
        assert_eq!(map_intercom_status(None), "open");
    }

    #[test]
    fn author_type_classification() {
        assert_eq!(classify_intercom_author(Some("user")), MessageType::Incoming);
        assert_eq!(classify_intercom_author(Some("admin")), MessageType::Outgoing);
        assert_eq!(classify_intercom_author(Some("bot")), MessageType::Outgoing);
        assert_eq!(classify_intercom_author(None), MessageType::Outgoing);
    }

    #[test]
    fn zendesk_roles_follow_requester() {
        let mut ticket = conversation(
            Source::Zendesk,
            RecordId::Number(42),
            Some(RecordId::Number(7)),
            vec![
                message(author(Some(RecordId::Number(7)), None, None), "Date originale: x<br><br>Help"),
                message(author(Some(RecordId::Number(99)), None, None), "On it"),
            ],
        );
        ticket.status = Some("solved".into());
        ticket.extra.insert("priority".into(), Value::from("high"));

        let (out, stats) = associate_conversations(&[ticket], &[], &index(), &AssociateOptions::default());

        assert_eq!(stats, AssociateStats { zendesk: 1, intercom: 0, orphans: 0 });
        let conv = &out[0];
        assert_eq!(conv.contact_email, "a_x.com@alphorm.com");
        assert_eq!(conv.title, "Sans titre");
        assert_eq!(conv.status.as_deref(), Some("resolved"));
        assert_eq!(conv.zendesk_ticket_id, Some(RecordId::Number(42)));
        assert_eq!(conv.intercom_conversation_id, None);
        assert_eq!(conv.additional_attributes["priority"], "high");
        assert!(conv.additional_attributes["group_id"].is_null());

        assert_eq!(conv.messages[0].message_type, MessageType::Incoming);
        assert_eq!(conv.messages[0].author_name, "Client");
        assert_eq!(conv.messages[0].content, "Date originale: x\n\nHelp");
        assert_eq!(conv.messages[1].message_type, MessageType::Outgoing);
        assert_eq!(conv.messages[1].author_name, "Agent");
    }

    #[test]
    fn intercom_opening_message_comes_first() {
        let mut conv = conversation(
            Source::Intercom,
            RecordId::Text("998".into()),
            Some(RecordId::Text("u1".into())),
            vec![
                message(author(None, Some("admin"), Some("Sam")), "Reply"),
                message(author(None, Some("user"), None), "Thanks"),
            ],
        );
        conv.description = "Date originale: 14/11/2023 22:13<br><br>Card charged twice".into();
        conv.status = Some("closed".into());
        conv.title = Some("Billing".into());
        conv.messages[0].part_type = Some("note".into());

        let (out, stats) = associate_conversations(&[], &[conv], &index(), &AssociateOptions::default());

        assert_eq!(stats.intercom, 1);
        let canonical = &out[0];
        assert_eq!(canonical.status.as_deref(), Some("resolved"));
        assert_eq!(canonical.title, "Billing");
        assert_eq!(canonical.messages.len(), 3);

        let opening = &canonical.messages[0];
        assert_eq!(opening.message_type, MessageType::Incoming);
        assert_eq!(opening.author_name, "Client");
        assert_eq!(opening.created_at, Some(SourceTimestamp::Epoch(1_700_000_000)));

        assert_eq!(canonical.messages[1].author_name, "Sam");
        assert_eq!(canonical.messages[1].part_type.as_deref(), Some("note"));
        assert_eq!(canonical.messages[2].message_type, MessageType::Incoming);
        assert_eq!(canonical.messages[2].author_name, "Unknown");
    }

    #[test]
    fn unresolved_requesters_are_orphans_and_counts_are_conserved() {
        let zendesk = vec![
            conversation(Source::Zendesk, RecordId::Number(1), Some(RecordId::Number(7)), vec![]),
            conversation(Source::Zendesk, RecordId::Number(2), Some(RecordId::Number(8)), vec![]),
            conversation(Source::Zendesk, RecordId::Number(3), None, vec![]),
        ];
        let intercom = vec![
            conversation(Source::Intercom, "c1".into(), Some("u1".into()), vec![]),
            conversation(Source::Intercom, "c2".into(), Some("u9".into()), vec![]),
            // A Zendesk id never resolves against the Intercom index.
            conversation(Source::Intercom, "c3".into(), Some(RecordId::Number(7)), vec![]),
        ];

        let (out, stats) = associate_conversations(&zendesk, &intercom, &index(), &AssociateOptions::default());

        assert_eq!(out.len(), 2);
        assert_eq!(stats, AssociateStats { zendesk: 1, intercom: 1, orphans: 4 });
        assert_eq!(stats.zendesk + stats.intercom + stats.orphans, zendesk.len() + intercom.len());
        assert_eq!(out[0].zendesk_ticket_id, Some(RecordId::Number(1)));
        assert_eq!(out[1].intercom_conversation_id, Some(RecordId::Text("c1".into())));
    }

    #[test]
    fn requester_without_id_is_never_client() {
        let ticket = conversation(
            Source::Zendesk,
            RecordId::Number(5),
            Some(RecordId::Number(7)),
            vec![message(author(None, None, None), "anonymous")],
        );
        let (out, _) = associate_conversations(&[ticket], &[], &index(), &AssociateOptions::default());
        assert_eq!(out[0].messages[0].message_type, MessageType::Outgoing);
    }
}
