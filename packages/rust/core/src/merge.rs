//! Contact merging: one canonical contact per mangled email address.
//!
//! Zendesk contacts are inserted first, then Intercom contacts. When both
//! sources produce the same key, the Intercom record wins every scalar field
//! while the Zendesk id and Zendesk import stamp are carried over.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use supportbridge_shared::{
    Attributes, CanonicalContact, NormalizedContact, RecordId, Source, SourceTimestamp,
    TARGET_EMAIL_DOMAIN,
};

/// `strftime` format of import stamps.
pub const IMPORT_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Settings for one merge run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Domain every email is remapped to.
    pub target_domain: String,
    /// Import stamp written on every contact of this run.
    pub imported_at: String,
}

impl MergeOptions {
    /// Options stamped with the current local time.
    pub fn new(target_domain: impl Into<String>) -> Self {
        Self {
            target_domain: target_domain.into(),
            imported_at: chrono::Local::now().format(IMPORT_STAMP_FORMAT).to_string(),
        }
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new(TARGET_EMAIL_DOMAIN)
    }
}

/// Counters reported with the prepared contacts document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Zendesk records inserted.
    pub zendesk: usize,
    /// Intercom records inserted under a new key.
    pub intercom: usize,
    /// Intercom records merged into an existing key.
    pub merged: usize,
    /// Records given a placeholder email.
    pub no_email: usize,
}

// ---------------------------------------------------------------------------
// Email keys
// ---------------------------------------------------------------------------

/// `local@domain` → `local_domain@<target>`, splitting at the first `@`.
/// Addresses without `@` are returned unchanged.
///
/// The mapping is not injective (`a_b@c` and `a@b_c` collide); this is the
/// key the target system already uses, so it is kept as is.
pub fn mangle_email(email: &str, target_domain: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{local}_{domain}@{target_domain}"),
        None => email.to_string(),
    }
}

/// Placeholder address for a contact without email, before mangling.
pub fn placeholder_email(source: Source, id: Option<&RecordId>, target_domain: &str) -> String {
    let id = id.map_or_else(|| "unknown".to_string(), RecordId::to_string);
    format!("no-email-{}-{id}@{target_domain}", source.short_code())
}

fn contact_key(contact: &NormalizedContact, options: &MergeOptions, stats: &mut MergeStats) -> String {
    let email = match contact.email.as_deref() {
        Some(email) => email.to_string(),
        None => {
            stats.no_email += 1;
            placeholder_email(
                contact.source,
                contact.source_id.as_ref(),
                &options.target_domain,
            )
        }
    };
    mangle_email(&email, &options.target_domain)
}

// ---------------------------------------------------------------------------
// Canonical projection
// ---------------------------------------------------------------------------

fn extra_value(contact: &NormalizedContact, key: &str) -> Value {
    contact.extra.get(key).cloned().unwrap_or(Value::Null)
}

fn created_at_value(contact: &NormalizedContact) -> Value {
    contact
        .created_at
        .as_ref()
        .map_or(Value::Null, |ts| match ts {
            SourceTimestamp::Epoch(secs) => Value::from(*secs),
            SourceTimestamp::Text(text) => Value::from(text.as_str()),
        })
}

fn from_zendesk(contact: &NormalizedContact, email: String, options: &MergeOptions) -> CanonicalContact {
    let mut attributes = Attributes::new();
    attributes.insert("time_zone".into(), extra_value(contact, "time_zone"));
    attributes.insert("locale".into(), extra_value(contact, "locale"));
    attributes.insert("organization_id".into(), extra_value(contact, "organization_id"));
    attributes.insert("created_at".into(), created_at_value(contact));
    attributes.insert("tags".into(), Value::from(contact.tags.clone()));

    CanonicalContact {
        email,
        name: contact.name.clone(),
        phone_number: contact.phone.clone(),
        zendesk_id: contact.source_id.clone(),
        intercom_id: None,
        imported_from_zendesk_at: Some(options.imported_at.clone()),
        imported_from_intercom_at: None,
        avatar_url: None,
        additional_attributes: attributes,
    }
}

fn from_intercom(contact: &NormalizedContact, email: String, options: &MergeOptions) -> CanonicalContact {
    let optional = |value: &Option<String>| value.clone().map_or(Value::Null, Value::from);

    let mut attributes = Attributes::new();
    attributes.insert("external_id".into(), extra_value(contact, "external_id"));
    attributes.insert("location_country".into(), optional(&contact.location.country));
    attributes.insert("location_city".into(), optional(&contact.location.city));
    attributes.insert("browser".into(), extra_value(contact, "browser"));
    attributes.insert("os".into(), extra_value(contact, "os"));
    attributes.insert("created_at".into(), created_at_value(contact));
    attributes.insert(
        "custom_attributes".into(),
        Value::Object(contact.custom_attributes.clone()),
    );
    attributes.insert("tags".into(), Value::from(contact.tags.clone()));

    CanonicalContact {
        email,
        name: contact.name.clone(),
        phone_number: contact.phone.clone(),
        zendesk_id: None,
        intercom_id: contact.source_id.clone(),
        imported_from_zendesk_at: None,
        imported_from_intercom_at: Some(options.imported_at.clone()),
        avatar_url: contact.avatar_url.clone(),
        additional_attributes: attributes,
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge both sources' contacts into one canonical contact per mangled email.
///
/// Output order is the order in which each key was first inserted.
#[instrument(skip_all, fields(zendesk = zendesk.len(), intercom = intercom.len()))]
pub fn merge_contacts(
    zendesk: &[NormalizedContact],
    intercom: &[NormalizedContact],
    options: &MergeOptions,
) -> (Vec<CanonicalContact>, MergeStats) {
    let mut stats = MergeStats::default();
    let mut contacts: Vec<CanonicalContact> = Vec::with_capacity(zendesk.len() + intercom.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for contact in zendesk {
        let key = contact_key(contact, options, &mut stats);
        let canonical = from_zendesk(contact, key.clone(), options);
        match positions.get(&key) {
            Some(&index) => contacts[index] = canonical,
            None => {
                positions.insert(key, contacts.len());
                contacts.push(canonical);
            }
        }
        stats.zendesk += 1;
    }

    for contact in intercom {
        let key = contact_key(contact, options, &mut stats);
        let mut canonical = from_intercom(contact, key.clone(), options);
        match positions.get(&key) {
            Some(&index) => {
                let existing = &contacts[index];
                canonical.zendesk_id = existing.zendesk_id.clone();
                canonical.imported_from_zendesk_at = existing.imported_from_zendesk_at.clone();
                debug!(email = %key, "merged intercom contact into existing entry");
                contacts[index] = canonical;
                stats.merged += 1;
            }
            None => {
                positions.insert(key, contacts.len());
                contacts.push(canonical);
                stats.intercom += 1;
            }
        }
    }

    info!(
        total = contacts.len(),
        zendesk = stats.zendesk,
        intercom = stats.intercom,
        merged = stats.merged,
        no_email = stats.no_email,
        "contacts merged"
    );

    (contacts, stats)
}

// ---------------------------------------------------------------------------
// Contact index
// ---------------------------------------------------------------------------

/// Lookup from each source's contact id to the canonical email.
///
/// Ids are keyed by their text form so numeric and string encodings of the
/// same id resolve alike.
#[derive(Debug, Clone, Default)]
pub struct ContactIndex {
    zendesk: HashMap<String, String>,
    intercom: HashMap<String, String>,
}

impl ContactIndex {
    pub fn build(contacts: &[CanonicalContact]) -> Self {
        let mut index = Self::default();
        for contact in contacts {
            if let Some(id) = &contact.zendesk_id {
                index.zendesk.insert(id.to_string(), contact.email.clone());
            }
            if let Some(id) = &contact.intercom_id {
                index.intercom.insert(id.to_string(), contact.email.clone());
            }
        }
        debug!(
            zendesk = index.zendesk.len(),
            intercom = index.intercom.len(),
            "contact index built"
        );
        index
    }

    /// Canonical email of the contact `id` refers to in `source`.
    pub fn lookup(&self, source: Source, id: &RecordId) -> Option<&str> {
        let map = match source {
            Source::Zendesk => &self.zendesk,
            Source::Intercom => &self.intercom,
        };
        map.get(&id.to_string()).map(String::as_str)
    }
}
