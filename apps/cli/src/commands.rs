//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use supportbridge_core::{
    OutputFile, ProgressReporter, RunSummary, SilentProgress, Stage, StageReport,
};
use supportbridge_shared::{
    AppConfig, RunConfig, Source, config_file_path, init_config, load_config, load_config_from,
    today_stamp,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SupportBridge: migrate Zendesk and Intercom data to Chatwoot.
#[derive(Parser)]
#[command(
    name = "supportbridge",
    version,
    about = "Clean, transform and prepare Zendesk and Intercom exports for Chatwoot.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.supportbridge/supportbridge.toml).
    #[arg(long, global = true, env = "SUPPORTBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory holding the exports and stage outputs.
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Run date stamp (YYYYMMDD). Defaults to today.
    #[arg(long, global = true)]
    pub date: Option<String>,

    /// Restrict the run to one source.
    #[arg(long, global = true)]
    pub source: Option<SourceArg>,

    /// Hide the progress spinner.
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Source selection flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum SourceArg {
    Zendesk,
    Intercom,
    All,
}

impl SourceArg {
    fn sources(self) -> Vec<Source> {
        match self {
            Self::Zendesk => vec![Source::Zendesk],
            Self::Intercom => vec![Source::Intercom],
            Self::All => Source::ALL.to_vec(),
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Normalize raw exports into clean records.
    Clean,

    /// Render cleaned conversations to markdown with date headers.
    Transform,

    /// Merge both sources' contacts into the prepared contacts document.
    PrepareContacts,

    /// Attach conversations to prepared contacts.
    PrepareConversations,

    /// Run every stage in order and write the run manifest.
    Run,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "supportbridge=info",
        1 => "supportbridge=debug",
        _ => "supportbridge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

fn load_app_config(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// CLI flags override the config file, which overrides built-in defaults.
fn resolve_run_config(cli: &Cli, app: &AppConfig) -> Result<RunConfig> {
    let date = cli.date.clone().unwrap_or_else(today_stamp);
    let mut run = RunConfig::from_app(app, date)?;

    if let Some(dir) = &cli.output_dir {
        run.output_root = dir.clone();
    }
    if let Some(source) = cli.source {
        run.sources = source.sources();
    }
    Ok(run)
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let stage = match &cli.command {
        Command::Config { action } => {
            return match action {
                ConfigAction::Init => cmd_config_init(),
                ConfigAction::Show => cmd_config_show(&cli),
            };
        }
        Command::Clean => Stage::Clean,
        Command::Transform => Stage::Transform,
        Command::PrepareContacts => Stage::PrepareContacts,
        Command::PrepareConversations => Stage::PrepareConversations,
        Command::Run => return cmd_run(&cli),
    };
    cmd_stage(&cli, stage)
}

/// Run `f` with a spinner (or silently with `--quiet`), clearing the
/// spinner line before returning.
fn with_progress<T>(
    cli: &Cli,
    f: impl FnOnce(&dyn ProgressReporter) -> supportbridge_shared::Result<T>,
) -> Result<T> {
    if cli.quiet {
        return Ok(f(&SilentProgress)?);
    }
    let progress = CliProgress::new();
    let result = f(&progress);
    progress.spinner.finish_and_clear();
    Ok(result?)
}

fn cmd_stage(cli: &Cli, stage: Stage) -> Result<()> {
    let app = load_app_config(cli)?;
    let config = resolve_run_config(cli, &app)?;

    info!(%stage, date = %config.date, root = %config.output_root.display(), "running stage");

    let report = with_progress(cli, |progress| {
        supportbridge_core::run_stage(stage, &config, progress)
    })?;

    println!();
    print_report(&report);
    println!();

    Ok(())
}

fn cmd_run(cli: &Cli) -> Result<()> {
    let app = load_app_config(cli)?;
    let config = resolve_run_config(cli, &app)?;

    let summary = with_progress(cli, |progress| supportbridge_core::run_all(&config, progress))?;

    println!();
    println!("  Migration run complete!");
    println!("  Run ID:  {}", summary.run_id);
    println!("  Date:    {}", summary.date);
    println!();
    for report in &summary.stages {
        print_report(report);
    }
    println!();

    Ok(())
}

fn print_report(report: &StageReport) {
    println!("  [{}] {:.1}s", report.stage, report.elapsed_ms as f64 / 1000.0);
    for output in &report.outputs {
        println!("    {:>6}  {}", output.count, output.path.display());
    }
    if let Some(stats) = &report.merge_stats {
        println!(
            "    zendesk={} intercom={} merged={} no_email={}",
            stats.zendesk, stats.intercom, stats.merged, stats.no_email
        );
    }
    if let Some(stats) = &report.associate_stats {
        println!(
            "    zendesk={} intercom={} orphans={}",
            stats.zendesk, stats.intercom, stats.orphans
        );
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    if cli.config.is_none() {
        let path = config_file_path()?;
        if !path.exists() {
            println!("# {} not found, showing defaults", path.display());
        }
    }
    let config = load_app_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        self.spinner.set_message(format!("Running {stage}"));
    }

    fn file_written(&self, output: &OutputFile) {
        self.spinner
            .set_message(format!("Wrote {} ({} records)", output.path.display(), output.count));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
