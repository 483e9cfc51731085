//! Record normalization for SupportBridge.
//!
//! Projects raw Zendesk and Intercom export records onto the shared
//! normalized model through one [`SourceAdapter`] per platform. This is
//! the "clean" stage of the pipeline.

pub mod adapters;
mod fields;

use serde_json::Value;
use tracing::{debug, instrument};

use supportbridge_shared::{
    NormalizedArticle, NormalizedContact, NormalizedConversation, NormalizedMacro, RecordId,
};

pub use adapters::{IntercomAdapter, SourceAdapter, ZendeskAdapter, adapter_for};

// ---------------------------------------------------------------------------
// Collection-level normalization
// ---------------------------------------------------------------------------

/// Normalize a raw contact collection: rejected accounts are dropped and
/// duplicates collapse by source id.
#[instrument(skip_all, fields(source = adapter.name(), raw = raw.len()))]
pub fn normalize_contacts(adapter: &dyn SourceAdapter, raw: &[Value]) -> Vec<NormalizedContact> {
    let accepted: Vec<_> = raw
        .iter()
        .filter(|record| adapter.accepts_contact(record))
        .map(|record| adapter.normalize_contact(record))
        .collect();

    let rejected = raw.len() - accepted.len();
    let contacts = dedupe_by_id(accepted, |c| c.source_id.as_ref());
    debug!(rejected, kept = contacts.len(), "contacts normalized");
    contacts
}

/// Normalize a raw ticket/conversation collection, collapsing duplicates.
#[instrument(skip_all, fields(source = adapter.name(), raw = raw.len()))]
pub fn normalize_conversations(
    adapter: &dyn SourceAdapter,
    raw: &[Value],
) -> Vec<NormalizedConversation> {
    let conversations = raw
        .iter()
        .map(|record| adapter.normalize_conversation(record))
        .collect();
    dedupe_by_id(conversations, |c| c.source_id.as_ref())
}

pub fn normalize_articles(adapter: &dyn SourceAdapter, raw: &[Value]) -> Vec<NormalizedArticle> {
    raw.iter()
        .map(|record| adapter.normalize_article(record))
        .collect()
}

pub fn normalize_macros(adapter: &dyn SourceAdapter, raw: &[Value]) -> Vec<NormalizedMacro> {
    raw.iter()
        .filter_map(|record| adapter.normalize_macro(record))
        .collect()
}

/// Collapse records sharing a source id. The last record wins but keeps
/// the position of the first; records without an id are all kept.
pub fn dedupe_by_id<T, F>(records: Vec<T>, id: F) -> Vec<T>
where
    F: Fn(&T) -> Option<&RecordId>,
{
    let mut positions: std::collections::HashMap<RecordId, usize> =
        std::collections::HashMap::new();
    let mut out: Vec<T> = Vec::with_capacity(records.len());

    for record in records {
        match id(&record).cloned() {
            Some(key) => match positions.get(&key) {
                Some(&index) => out[index] = record,
                None => {
                    positions.insert(key, out.len());
                    out.push(record);
                }
            },
            None => out.push(record),
        }
    }

    out
}
