//! SupportBridge CLI: help-desk migration pipeline.
//!
//! Turns Zendesk and Intercom exports into contacts and conversations
//! ready for import into Chatwoot.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
