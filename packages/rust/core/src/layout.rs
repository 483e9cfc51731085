//! On-disk layout of one dated pipeline run.
//!
//! ```text
//! <root>/<source>/origin_export/<source>_<entity>_<date>.json
//! <root>/<source>/clean_export_data/<source>_<entity>_clean_<date>.json
//! <root>/<source>/transformed_data/<source>_<entity>_transformed_<date>.json
//! <root>/chatwoot/chatwoot_{contacts,conversations}_prepared_<date>.json
//! <root>/run_manifest_<date>.json
//! ```

use std::path::PathBuf;

use supportbridge_shared::{Entity, Source};

/// Directory of the target platform's prepared documents.
const TARGET_DIR: &str = "chatwoot";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    date: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, date: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            date: date.into(),
        }
    }

    /// Raw export written by the extractor.
    pub fn raw_export(&self, source: Source, entity: Entity) -> PathBuf {
        self.root
            .join(source.as_str())
            .join("origin_export")
            .join(format!("{source}_{}_{}.json", entity.plural_key(source), self.date))
    }

    /// Output of the clean stage.
    pub fn clean(&self, source: Source, entity: Entity) -> PathBuf {
        self.root
            .join(source.as_str())
            .join("clean_export_data")
            .join(format!("{source}_{}_clean_{}.json", entity.plural_key(source), self.date))
    }

    /// Output of the transform stage.
    pub fn transformed(&self, source: Source, entity: Entity) -> PathBuf {
        self.root
            .join(source.as_str())
            .join("transformed_data")
            .join(format!(
                "{source}_{}_transformed_{}.json",
                entity.plural_key(source),
                self.date
            ))
    }

    pub fn prepared_contacts(&self) -> PathBuf {
        self.root
            .join(TARGET_DIR)
            .join(format!("{TARGET_DIR}_contacts_prepared_{}.json", self.date))
    }

    pub fn prepared_conversations(&self) -> PathBuf {
        self.root
            .join(TARGET_DIR)
            .join(format!("{TARGET_DIR}_conversations_prepared_{}.json", self.date))
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(format!("run_manifest_{}.json", self.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_paths_follow_source_naming() {
        let layout = Layout::new("out", "20240115");

        assert_eq!(
            layout.raw_export(Source::Zendesk, Entity::Conversations),
            PathBuf::from("out/zendesk/origin_export/zendesk_tickets_20240115.json")
        );
        assert_eq!(
            layout.clean(Source::Zendesk, Entity::Contacts),
            PathBuf::from("out/zendesk/clean_export_data/zendesk_users_clean_20240115.json")
        );
        assert_eq!(
            layout.transformed(Source::Intercom, Entity::Conversations),
            PathBuf::from(
                "out/intercom/transformed_data/intercom_conversations_transformed_20240115.json"
            )
        );
    }

    #[test]
    fn prepared_documents_live_under_target_dir() {
        let layout = Layout::new("out", "20240115");
        assert_eq!(
            layout.prepared_contacts(),
            PathBuf::from("out/chatwoot/chatwoot_contacts_prepared_20240115.json")
        );
        assert_eq!(
            layout.prepared_conversations(),
            PathBuf::from("out/chatwoot/chatwoot_conversations_prepared_20240115.json")
        );
        assert_eq!(layout.manifest(), PathBuf::from("out/run_manifest_20240115.json"));
    }
}
