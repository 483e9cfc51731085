//! Shared types, error model, and configuration for SupportBridge.
//!
//! This crate is the foundation depended on by all other SupportBridge crates.
//! It provides:
//! - [`SupportBridgeError`], the unified error type
//! - Primitive types ([`Source`], [`Entity`], [`RecordId`], [`SourceTimestamp`])
//! - Entity records ([`NormalizedContact`], [`CanonicalContact`], [`Conversation`], ...)
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod model;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, MigrationConfig, RunConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, today_stamp, validate_run_date,
};
pub use error::{Result, SupportBridgeError};
pub use model::{
    AttachmentRef, Attributes, CanonicalContact, CanonicalConversation, CanonicalMessage,
    Conversation, Location, MacroAction, Message, MessageAuthor, MessageBody, MessageType,
    NormalizedArticle, NormalizedContact, NormalizedConversation, NormalizedMacro,
    TransformedConversation,
};
pub use types::{DEFAULT_TITLE, Entity, RecordId, Source, SourceTimestamp, TARGET_EMAIL_DOMAIN};
