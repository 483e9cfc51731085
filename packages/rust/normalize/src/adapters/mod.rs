//! Source adapter trait and the two built-in adapters.
//!
//! Each adapter projects one platform's raw export records onto the shared
//! normalized structs. Projection never fails: missing or oddly shaped keys
//! degrade to `None` / empty values.

mod intercom;
mod zendesk;

use serde_json::Value;

use supportbridge_shared::{
    Entity, NormalizedArticle, NormalizedContact, NormalizedConversation, NormalizedMacro, Source,
};

pub use intercom::IntercomAdapter;
pub use zendesk::ZendeskAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for platform-specific record projection.
pub trait SourceAdapter: Send + Sync {
    /// The platform this adapter reads.
    fn source(&self) -> Source;

    /// Entities this platform exports, in processing order.
    fn entities(&self) -> &'static [Entity];

    /// Whether a raw contact record should be migrated at all.
    fn accepts_contact(&self, _raw: &Value) -> bool {
        true
    }

    /// Project a raw user/contact record.
    fn normalize_contact(&self, raw: &Value) -> NormalizedContact;

    /// Project a raw ticket/conversation record.
    fn normalize_conversation(&self, raw: &Value) -> NormalizedConversation;

    /// Project a raw help-center article.
    fn normalize_article(&self, raw: &Value) -> NormalizedArticle;

    /// Project a raw macro. Platforms without macros return `None`.
    fn normalize_macro(&self, _raw: &Value) -> Option<NormalizedMacro> {
        None
    }

    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str {
        self.source().as_str()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

static ZENDESK: ZendeskAdapter = ZendeskAdapter;
static INTERCOM: IntercomAdapter = IntercomAdapter;

/// The adapter for `source`.
pub fn adapter_for(source: Source) -> &'static dyn SourceAdapter {
    match source {
        Source::Zendesk => &ZENDESK,
        Source::Intercom => &INTERCOM,
    }
}
