//! Core pipeline orchestration and domain logic for SupportBridge.
//!
//! This crate ties together normalization, markdown rendering, contact
//! merging and conversation association into the staged migration run
//! (e.g., `run_all`).

pub mod associate;
pub mod layout;
pub mod merge;
pub mod pipeline;
pub mod store;
pub mod transform;

pub use associate::{AssociateOptions, AssociateStats, associate_conversations};
pub use layout::Layout;
pub use merge::{ContactIndex, MergeOptions, MergeStats, mangle_email, merge_contacts};
pub use pipeline::{
    ProgressReporter, RunSummary, SilentProgress, Stage, StageReport, clean, prepare_contacts,
    prepare_conversations, run_all, run_stage, transform,
};
pub use store::{OutputFile, read_collection, write_collection, write_json};
pub use transform::{format_date_header, transform_conversation, transform_conversations};
