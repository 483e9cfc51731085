//! Content transformation: render every body to markdown and prefix it with
//! the date it was originally written.

use tracing::{debug, instrument};

use supportbridge_markdown::{LINE_BREAK, plain_text_to_markdown, render_html, render_inline};
use supportbridge_shared::{
    Message, MessageBody, NormalizedConversation, SourceTimestamp, TransformedConversation,
};

/// Header prefix shown before every migrated body.
const HEADER_PREFIX: &str = "Date originale";

/// Header used when a record carries no timestamp.
pub const UNKNOWN_DATE_HEADER: &str = "Date originale: inconnue";

/// `Date originale: DD/MM/YYYY HH:MM` for a resolvable timestamp, the raw
/// value for one that cannot be parsed, and [`UNKNOWN_DATE_HEADER`] when
/// there is none.
pub fn format_date_header(timestamp: Option<&SourceTimestamp>) -> String {
    let Some(timestamp) = timestamp else {
        return UNKNOWN_DATE_HEADER.to_string();
    };

    match timestamp.to_wall_clock() {
        Some(dt) => format!("{HEADER_PREFIX}: {}", dt.format("%d/%m/%Y %H:%M")),
        None => {
            debug!(raw = %timestamp.raw(), "unparseable timestamp kept verbatim");
            format!("{HEADER_PREFIX}: {}", timestamp.raw())
        }
    }
}

/// Render a body to markdown according to its source format.
pub fn render_body(body: &MessageBody) -> String {
    match body {
        MessageBody::Html(html) => render_html(html),
        MessageBody::Plain(text) => plain_text_to_markdown(text),
        MessageBody::Empty => String::new(),
    }
}

/// `header<br><br>body`, or the header alone when the body is empty.
pub fn with_date_header(header: &str, markdown: &str) -> String {
    if markdown.is_empty() {
        header.to_string()
    } else {
        format!("{header}{LINE_BREAK}{LINE_BREAK}{markdown}")
    }
}

fn transform_message(message: &Message<MessageBody>) -> Message<String> {
    let header = format_date_header(message.created_at.as_ref());
    Message {
        id: message.id.clone(),
        author: message.author.clone(),
        content: with_date_header(&header, &render_body(&message.content)),
        created_at: message.created_at.clone(),
        public: message.public,
        part_type: message.part_type.clone(),
        attachments: message.attachments.clone(),
    }
}

/// Transform one conversation: every message and the description get a
/// date header and a markdown body. An empty description stays empty. An
/// HTML subject is flattened to a single-line title; a plain `title` is
/// kept verbatim.
pub fn transform_conversation(conversation: &NormalizedConversation) -> TransformedConversation {
    let description = if conversation.description.is_empty() {
        String::new()
    } else {
        let header = format_date_header(conversation.created_at.as_ref());
        with_date_header(&header, &render_body(&conversation.description))
    };

    let title = conversation
        .subject
        .as_deref()
        .map(render_inline)
        .filter(|t| !t.is_empty())
        .or_else(|| conversation.title.clone());

    TransformedConversation {
        source: conversation.source,
        source_id: conversation.source_id.clone(),
        title,
        subject: conversation.subject.clone(),
        status: conversation.status.clone(),
        created_at: conversation.created_at.clone(),
        updated_at: conversation.updated_at.clone(),
        tags: conversation.tags.clone(),
        requester_id: conversation.requester_id.clone(),
        initiator: conversation.initiator.clone(),
        description,
        messages: conversation.messages.iter().map(transform_message).collect(),
        extra: conversation.extra.clone(),
    }
}

#[instrument(skip_all, fields(count = conversations.len()))]
pub fn transform_conversations(
    conversations: &[NormalizedConversation],
) -> Vec<TransformedConversation> {
    conversations.iter().map(transform_conversation).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use supportbridge_shared::{Attributes, MessageAuthor, RecordId, Source};

    fn message(content: MessageBody, created_at: Option<SourceTimestamp>) -> Message<MessageBody> {
        Message {
            id: Some(RecordId::Number(1)),
            author: MessageAuthor::default(),
            content,
            created_at,
            public: Some(true),
            part_type: None,
            attachments: vec![],
        }
    }

    fn conversation(source: Source, messages: Vec<Message<MessageBody>>) -> NormalizedConversation {
        NormalizedConversation {
            source,
            source_id: Some(RecordId::Number(42)),
            title: Some("Refund".into()),
            subject: None,
            status: Some("open".into()),
            created_at: Some(SourceTimestamp::Text("2024-03-05T09:07:00Z".into())),
            updated_at: None,
            tags: vec![],
            requester_id: Some(RecordId::Number(7)),
            initiator: None,
            description: MessageBody::Empty,
            messages,
            extra: Attributes::new(),
        }
    }

    #[test]
    fn date_header_formats() {
        let iso = SourceTimestamp::Text("2024-03-05T09:07:00Z".into());
        assert_eq!(format_date_header(Some(&iso)), "Date originale: 05/03/2024 09:07");

        let epoch = SourceTimestamp::Epoch(1_700_000_000);
        assert_eq!(format_date_header(Some(&epoch)), "Date originale: 14/11/2023 22:13");

        let garbage = SourceTimestamp::Text("yesterday-ish".into());
        assert_eq!(format_date_header(Some(&garbage)), "Date originale: yesterday-ish");

        assert_eq!(format_date_header(None), UNKNOWN_DATE_HEADER);
    }

    #[test]
    fn message_gets_header_and_markdown() {
        let conv = conversation(
            Source::Zendesk,
            vec![message(
                MessageBody::Html("<p><b>Hello</b></p>".into()),
                Some(SourceTimestamp::Text("2024-01-15T10:30:00Z".into())),
            )],
        );

        let out = transform_conversation(&conv);
        assert_eq!(
            out.messages[0].content,
            "Date originale: 15/01/2024 10:30<br><br><br>**Hello**<br>"
        );
    }

    #[test]
    fn empty_body_yields_header_only() {
        let conv = conversation(Source::Intercom, vec![message(MessageBody::Empty, None)]);
        let out = transform_conversation(&conv);
        assert_eq!(out.messages[0].content, UNKNOWN_DATE_HEADER);
    }

    #[test]
    fn plain_description_uses_conversation_date() {
        let mut conv = conversation(Source::Zendesk, vec![]);
        conv.description = MessageBody::Plain("Line one\nLine two".into());

        let out = transform_conversation(&conv);
        assert_eq!(
            out.description,
            "Date originale: 05/03/2024 09:07<br><br>Line one<br>Line two"
        );
    }

    #[test]
    fn empty_description_stays_empty() {
        let out = transform_conversation(&conversation(Source::Zendesk, vec![]));
        assert_eq!(out.description, "");
    }

    #[test]
    fn intercom_subject_becomes_single_line_title() {
        let mut conv = conversation(Source::Intercom, vec![]);
        conv.title = None;
        conv.subject = Some("<p>Billing <b>issue</b></p><p>again</p>".into());
        assert_eq!(
            transform_conversation(&conv).title.as_deref(),
            Some("Billing **issue** again")
        );

        conv.subject = Some("<p></p>".into());
        assert_eq!(transform_conversation(&conv).title, None);
    }

    #[test]
    fn intercom_fallback_title_is_kept_verbatim() {
        let mut conv = conversation(Source::Intercom, vec![]);
        conv.title = Some("Order <urgent>".into());
        assert_eq!(transform_conversation(&conv).title.as_deref(), Some("Order <urgent>"));

        conv.subject = Some("<p></p>".into());
        assert_eq!(transform_conversation(&conv).title.as_deref(), Some("Order <urgent>"));
    }

    #[test]
    fn zendesk_title_is_untouched() {
        let mut conv = conversation(Source::Zendesk, vec![]);
        conv.title = Some("Order <urgent>".into());
        assert_eq!(transform_conversation(&conv).title.as_deref(), Some("Order <urgent>"));
    }
}
