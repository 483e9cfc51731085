//! Stage driver: raw exports → clean → transform → prepared contacts →
//! prepared conversations, each stage persisting its output for the next.

use std::path::Path;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use supportbridge_normalize::{
    adapter_for, normalize_articles, normalize_contacts, normalize_conversations, normalize_macros,
};
use supportbridge_shared::{
    Entity, NormalizedContact, NormalizedConversation, Result, RunConfig, Source,
    SupportBridgeError, TransformedConversation,
};

use crate::associate::{AssociateOptions, AssociateStats, associate_conversations};
use crate::layout::Layout;
use crate::merge::{ContactIndex, IMPORT_STAMP_FORMAT, MergeOptions, MergeStats, merge_contacts};
use crate::store::{OutputFile, read_collection, write_collection, write_json};
use crate::transform::transform_conversations;

// ---------------------------------------------------------------------------
// Stages and reports
// ---------------------------------------------------------------------------

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Clean,
    Transform,
    PrepareContacts,
    PrepareConversations,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Clean,
        Stage::Transform,
        Stage::PrepareContacts,
        Stage::PrepareConversations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Transform => "transform",
            Self::PrepareContacts => "prepare-contacts",
            Self::PrepareConversations => "prepare-conversations",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one stage wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outputs: Vec<OutputFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_stats: Option<MergeStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associate_stats: Option<AssociateStats>,
    pub elapsed_ms: u64,
}

impl StageReport {
    fn new(stage: Stage, outputs: Vec<OutputFile>, start: Instant) -> Self {
        Self {
            stage,
            outputs,
            merge_stats: None,
            associate_stats: None,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Run manifest written by [`run_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub date: String,
    pub sources: Vec<Source>,
    pub started_at: String,
    pub finished_at: String,
    pub stages: Vec<StageReport>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage starts.
    fn stage(&self, stage: Stage);
    /// Called after each output file is written.
    fn file_written(&self, output: &OutputFile);
    /// Called when a full run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn file_written(&self, _output: &OutputFile) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_stamp() -> String {
    chrono::Local::now().format(IMPORT_STAMP_FORMAT).to_string()
}

fn layout_for(config: &RunConfig) -> Result<Layout> {
    supportbridge_shared::validate_run_date(&config.date)?;
    if config.sources.is_empty() {
        return Err(SupportBridgeError::validation("no source enabled for this run"));
    }
    Ok(Layout::new(&config.output_root, &config.date))
}

/// Read a stage input for `source`; a disabled source reads as empty.
fn read_enabled<T: DeserializeOwned>(
    config: &RunConfig,
    source: Source,
    path: &Path,
    key: &str,
) -> Result<Vec<T>> {
    if !config.is_enabled(source) {
        return Ok(Vec::new());
    }
    read_collection(path, key)
}

fn enabled_sources(config: &RunConfig) -> impl Iterator<Item = Source> + '_ {
    Source::ALL.into_iter().filter(|s| config.is_enabled(*s))
}

/// Articles and macros are optional exports; conversations and contacts
/// are required.
fn is_optional(entity: Entity) -> bool {
    matches!(entity, Entity::Articles | Entity::Macros)
}

fn transformations(source: Source) -> [&'static str; 4] {
    match source {
        Source::Zendesk => [
            "html_to_markdown",
            "date_headers_added",
            "newlines_to_br",
            "markdown_cleaned",
        ],
        Source::Intercom => [
            "html_to_markdown",
            "date_headers_added",
            "unix_timestamps_converted",
            "markdown_cleaned",
        ],
    }
}

// ---------------------------------------------------------------------------
// Stage 1: Clean
// ---------------------------------------------------------------------------

fn write_clean<T: Serialize>(
    path: &Path,
    source: Source,
    key: &str,
    items: &[T],
) -> Result<OutputFile> {
    let metadata = json!({
        "cleaned_at": now_stamp(),
        "count": items.len(),
        "source": format!("{source}_{key}"),
    });
    write_collection(path, key, &metadata, items)
}

/// Normalize every raw export of every enabled source.
#[instrument(skip_all, fields(date = %config.date))]
pub fn clean(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<StageReport> {
    let start = Instant::now();
    let layout = layout_for(config)?;
    progress.stage(Stage::Clean);

    let mut outputs = Vec::new();

    for source in enabled_sources(config) {
        let adapter = adapter_for(source);

        for &entity in adapter.entities() {
            let key = entity.plural_key(source);
            let raw_path = layout.raw_export(source, entity);

            let raw: Vec<Value> = match read_collection(&raw_path, key) {
                Ok(raw) => raw,
                Err(SupportBridgeError::MissingInput { path }) if is_optional(entity) => {
                    warn!(%source, path = %path.display(), "optional export missing, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let out_path = layout.clean(source, entity);
            let output = match entity {
                Entity::Conversations => {
                    write_clean(&out_path, source, key, &normalize_conversations(adapter, &raw))?
                }
                Entity::Contacts => {
                    write_clean(&out_path, source, key, &normalize_contacts(adapter, &raw))?
                }
                Entity::Articles => {
                    write_clean(&out_path, source, key, &normalize_articles(adapter, &raw))?
                }
                Entity::Macros => {
                    write_clean(&out_path, source, key, &normalize_macros(adapter, &raw))?
                }
            };

            info!(%source, entity = key, raw = raw.len(), kept = output.count, "cleaned");
            progress.file_written(&output);
            outputs.push(output);
        }
    }

    Ok(StageReport::new(Stage::Clean, outputs, start))
}

// ---------------------------------------------------------------------------
// Stage 2: Transform
// ---------------------------------------------------------------------------

/// Render every cleaned conversation of every enabled source.
#[instrument(skip_all, fields(date = %config.date))]
pub fn transform(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<StageReport> {
    let start = Instant::now();
    let layout = layout_for(config)?;
    progress.stage(Stage::Transform);

    let mut outputs = Vec::new();

    for source in enabled_sources(config) {
        let key = Entity::Conversations.plural_key(source);
        let cleaned: Vec<NormalizedConversation> =
            read_collection(&layout.clean(source, Entity::Conversations), key)?;

        let transformed = transform_conversations(&cleaned);

        let metadata = json!({
            "transformed_at": now_stamp(),
            "count": transformed.len(),
            "source": format!("{source}_{key}_cleaned"),
            "transformations": transformations(source),
        });
        let output = write_collection(
            &layout.transformed(source, Entity::Conversations),
            key,
            &metadata,
            &transformed,
        )?;

        info!(%source, count = output.count, "transformed");
        progress.file_written(&output);
        outputs.push(output);
    }

    Ok(StageReport::new(Stage::Transform, outputs, start))
}

// ---------------------------------------------------------------------------
// Stage 3: Prepare contacts
// ---------------------------------------------------------------------------

/// Merge both sources' cleaned contacts into the prepared contacts document.
#[instrument(skip_all, fields(date = %config.date))]
pub fn prepare_contacts(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<StageReport> {
    let start = Instant::now();
    let layout = layout_for(config)?;
    progress.stage(Stage::PrepareContacts);

    let zendesk: Vec<NormalizedContact> = read_enabled(
        config,
        Source::Zendesk,
        &layout.clean(Source::Zendesk, Entity::Contacts),
        Entity::Contacts.plural_key(Source::Zendesk),
    )?;
    let intercom: Vec<NormalizedContact> = read_enabled(
        config,
        Source::Intercom,
        &layout.clean(Source::Intercom, Entity::Contacts),
        Entity::Contacts.plural_key(Source::Intercom),
    )?;

    let options = MergeOptions {
        target_domain: config.target_domain.clone(),
        imported_at: now_stamp(),
    };
    let (contacts, stats) = merge_contacts(&zendesk, &intercom, &options);

    let metadata = json!({
        "prepared_at": now_stamp(),
        "total_contacts": contacts.len(),
        "stats": stats,
    });
    let output = write_collection(&layout.prepared_contacts(), "contacts", &metadata, &contacts)?;
    progress.file_written(&output);

    let mut report = StageReport::new(Stage::PrepareContacts, vec![output], start);
    report.merge_stats = Some(stats);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Stage 4: Prepare conversations
// ---------------------------------------------------------------------------

/// Attach transformed conversations to the prepared contacts.
#[instrument(skip_all, fields(date = %config.date))]
pub fn prepare_conversations(
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<StageReport> {
    let start = Instant::now();
    let layout = layout_for(config)?;
    progress.stage(Stage::PrepareConversations);

    let zendesk: Vec<TransformedConversation> = read_enabled(
        config,
        Source::Zendesk,
        &layout.transformed(Source::Zendesk, Entity::Conversations),
        Entity::Conversations.plural_key(Source::Zendesk),
    )?;
    let intercom: Vec<TransformedConversation> = read_enabled(
        config,
        Source::Intercom,
        &layout.transformed(Source::Intercom, Entity::Conversations),
        Entity::Conversations.plural_key(Source::Intercom),
    )?;

    let contacts = read_collection(&layout.prepared_contacts(), "contacts")?;
    let index = ContactIndex::build(&contacts);

    let options = AssociateOptions {
        default_title: config.default_title.clone(),
    };
    let (conversations, stats) = associate_conversations(&zendesk, &intercom, &index, &options);

    let metadata = json!({
        "prepared_at": now_stamp(),
        "total_conversations": conversations.len(),
        "stats": stats,
    });
    let output = write_collection(
        &layout.prepared_conversations(),
        "conversations",
        &metadata,
        &conversations,
    )?;
    progress.file_written(&output);

    let mut report = StageReport::new(Stage::PrepareConversations, vec![output], start);
    report.associate_stats = Some(stats);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

/// Run a single stage.
pub fn run_stage(
    stage: Stage,
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<StageReport> {
    match stage {
        Stage::Clean => clean(config, progress),
        Stage::Transform => transform(config, progress),
        Stage::PrepareContacts => prepare_contacts(config, progress),
        Stage::PrepareConversations => prepare_conversations(config, progress),
    }
}

/// Run every stage in order and write the run manifest.
#[instrument(skip_all, fields(date = %config.date, root = %config.output_root.display()))]
pub fn run_all(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<RunSummary> {
    let layout = layout_for(config)?;
    let run_id = Uuid::now_v7();
    let started_at = chrono::Utc::now().to_rfc3339();

    info!(%run_id, "starting migration run");

    let stages = Stage::ALL
        .into_iter()
        .map(|stage| run_stage(stage, config, progress))
        .collect::<Result<Vec<_>>>()?;

    let summary = RunSummary {
        run_id,
        date: config.date.clone(),
        sources: config.sources.clone(),
        started_at,
        finished_at: chrono::Utc::now().to_rfc3339(),
        stages,
    };
    write_json(&layout.manifest(), &summary)?;

    info!(%run_id, manifest = %layout.manifest().display(), "migration run complete");
    progress.done(&summary);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use supportbridge_shared::{
        CanonicalContact, CanonicalConversation, MessageType, NormalizedArticle, NormalizedMacro,
        RecordId,
    };

    const DATE: &str = "20240115";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sb-pipeline-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/json")
    }

    fn config(root: &Path, sources: &[Source]) -> RunConfig {
        RunConfig {
            output_root: root.to_path_buf(),
            date: DATE.into(),
            sources: sources.to_vec(),
            target_domain: "alphorm.com".into(),
            default_title: "Sans titre".into(),
        }
    }

    /// Copy every raw export fixture into the run layout under `root`.
    fn stage_fixtures(root: &Path) {
        let layout = Layout::new(root, DATE);
        for source in Source::ALL {
            for entity in [Entity::Conversations, Entity::Contacts, Entity::Articles, Entity::Macros] {
                let fixture = fixtures_dir().join(format!("{source}_{}.json", entity.plural_key(source)));
                if fixture.exists() {
                    let target = layout.raw_export(source, entity);
                    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
                    std::fs::copy(&fixture, &target).unwrap();
                }
            }
        }
    }

    #[test]
    fn full_run_over_fixtures() {
        let tmp = temp_dir();
        stage_fixtures(&tmp);
        let config = config(&tmp, &Source::ALL);
        let layout = Layout::new(&tmp, DATE);

        let summary = run_all(&config, &SilentProgress).unwrap();
        let stages: Vec<Stage> = summary.stages.iter().map(|r| r.stage).collect();
        assert_eq!(stages, Stage::ALL);
        assert!(layout.manifest().exists());

        // Clean: intercom has no article export, which is skipped.
        assert_eq!(summary.stages[0].outputs.len(), 6);
        let users: Vec<NormalizedContact> =
            read_collection(&layout.clean(Source::Zendesk, Entity::Contacts), "users").unwrap();
        assert_eq!(users.len(), 3);
        let articles: Vec<NormalizedArticle> =
            read_collection(&layout.clean(Source::Zendesk, Entity::Articles), "articles").unwrap();
        assert_eq!(articles[0].category_id, Some(RecordId::Number(360001)));
        let macros: Vec<NormalizedMacro> =
            read_collection(&layout.clean(Source::Zendesk, Entity::Macros), "macros").unwrap();
        assert_eq!(macros[0].actions.len(), 2);

        // Contacts: bob@corp.io exists in both sources.
        let merge = summary.stages[2].merge_stats.unwrap();
        assert_eq!(merge, MergeStats { zendesk: 3, intercom: 2, merged: 1, no_email: 2 });
        let contacts: Vec<CanonicalContact> =
            read_collection(&layout.prepared_contacts(), "contacts").unwrap();
        assert_eq!(contacts.len(), 5);
        let bob = contacts
            .iter()
            .find(|c| c.email == "bob_corp.io@alphorm.com")
            .unwrap();
        assert_eq!(bob.name.as_deref(), Some("Bob Intercom"));
        assert_eq!(bob.zendesk_id, Some(RecordId::Number(384)));
        assert_eq!(bob.intercom_id, Some(RecordId::Text("6543abc".into())));

        // Conversations: one orphan per source.
        let assoc = summary.stages[3].associate_stats.unwrap();
        assert_eq!(assoc, AssociateStats { zendesk: 2, intercom: 2, orphans: 2 });
        let conversations: Vec<CanonicalConversation> =
            read_collection(&layout.prepared_conversations(), "conversations").unwrap();
        assert_eq!(conversations.len(), 4);

        let refund = &conversations[0];
        assert_eq!(refund.contact_email, "jane_example.com@alphorm.com");
        assert_eq!(refund.status.as_deref(), Some("resolved"));
        assert_eq!(refund.messages[0].message_type, MessageType::Incoming);
        assert!(refund.messages[0].content.starts_with("Date originale: 10/01/2024 08:15\n\n"));
        assert!(refund.messages[0].content.contains("I want a **refund**."));
        assert_eq!(refund.messages[0].attachments.len(), 1);
        assert!(refund.messages[1].content.contains("[our policy](https://help.example.com/refunds)"));

        let untitled = &conversations[1];
        assert_eq!(untitled.title, "Sans titre");
        assert_eq!(untitled.messages[0].content, "Date originale: 12/01/2024 14:00\n\nAny news?\nThanks");

        let billing = &conversations[2];
        assert_eq!(billing.title, "Billing **issue**");
        assert_eq!(billing.status.as_deref(), Some("open"));
        assert_eq!(billing.messages.len(), 3);
        assert_eq!(billing.messages[0].author_name, "Bob Intercom");
        assert_eq!(billing.messages[2].part_type.as_deref(), Some("note"));

        let question = &conversations[3];
        assert_eq!(question.title, "Question");
        assert_eq!(question.status.as_deref(), Some("resolved"));
        assert!(question.messages.is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_required_export_is_fatal() {
        let tmp = temp_dir();
        let err = clean(&config(&tmp, &[Source::Zendesk]), &SilentProgress).unwrap_err();
        assert!(matches!(err, SupportBridgeError::MissingInput { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn disabled_source_reads_as_empty() {
        let tmp = temp_dir();
        stage_fixtures(&tmp);
        let config = config(&tmp, &[Source::Zendesk]);

        clean(&config, &SilentProgress).unwrap();
        transform(&config, &SilentProgress).unwrap();
        let report = prepare_contacts(&config, &SilentProgress).unwrap();
        assert_eq!(
            report.merge_stats,
            Some(MergeStats { zendesk: 3, intercom: 0, merged: 0, no_email: 1 })
        );

        let report = prepare_conversations(&config, &SilentProgress).unwrap();
        assert_eq!(
            report.associate_stats,
            Some(AssociateStats { zendesk: 2, intercom: 0, orphans: 1 })
        );
        assert!(!Layout::new(&tmp, DATE)
            .clean(Source::Intercom, Entity::Contacts)
            .exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn prepare_conversations_needs_prepared_contacts() {
        let tmp = temp_dir();
        stage_fixtures(&tmp);
        let config = config(&tmp, &Source::ALL);
        clean(&config, &SilentProgress).unwrap();
        transform(&config, &SilentProgress).unwrap();

        let err = prepare_conversations(&config, &SilentProgress).unwrap_err();
        assert!(err.to_string().contains("chatwoot_contacts_prepared_20240115.json"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_source_list_is_rejected() {
        let tmp = temp_dir();
        let err = run_all(&config(&tmp, &[]), &SilentProgress).unwrap_err();
        assert!(matches!(err, SupportBridgeError::Validation { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
