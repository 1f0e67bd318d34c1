//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use contribmerge_core::describe::{ModelsClient, ModelsOptions};
use contribmerge_core::entries::load_entries;
use contribmerge_core::pipeline::{
    MergeFileConfig, MergeFileResult, ProgressReporter, SyncConfig, merge_file, sync,
};
use contribmerge_github::{GithubClient, GithubOptions};
use contribmerge_shared::{
    AppConfig, ContribMergeError, DecisionKind, MergeDecision, config_file_path, init_config,
    init_config_at, load_config, load_config_from, resolve_credentials,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// contribmerge: merge recent open-source contributions into a projects page.
#[derive(Parser)]
#[command(
    name = "contribmerge",
    version,
    about = "Merge recently merged pull requests into a curated markdown projects page.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.contribmerge/contribmerge.toml).
    #[arg(long, global = true, env = "CONTRIBMERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch merged pull requests, describe them, and merge them into the document.
    Sync {
        /// Target markdown document (defaults to document.path from config).
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Look-back window in days (defaults to github.window_days).
        #[arg(short, long)]
        days: Option<u32>,

        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Merge a pre-built entry set (JSON array of category batches).
    Merge {
        /// Entries JSON file.
        #[arg(short, long)]
        entries: PathBuf,

        /// Target markdown document (defaults to document.path from config).
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },

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
        0 => "contribmerge=info",
        1 => "contribmerge=debug",
        _ => "contribmerge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Sync {
            file,
            days,
            dry_run,
        } => cmd_sync(config_path.as_deref(), file, days, dry_run).await,
        Command::Merge {
            entries,
            file,
            dry_run,
        } => cmd_merge(config_path.as_deref(), &entries, file, dry_run),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path.as_deref()),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_sync(
    config_path: Option<&Path>,
    file: Option<PathBuf>,
    days: Option<u32>,
    dry_run: bool,
) -> Result<()> {
    let mut config = load(config_path)?;
    if let Some(days) = days {
        config.github.window_days = days;
    }

    // Credentials first: a missing token stops the run before any I/O
    let creds = resolve_credentials(&config)?;

    let today = chrono::Local::now().date_naive();
    let mut sync_config = SyncConfig::from_config(&config, creds.username.clone(), today);
    if let Some(file) = file {
        sync_config.merge.path = file;
    }
    sync_config.merge.dry_run = dry_run;

    let source = GithubClient::new(GithubOptions::from_config(&config.github, creds.token.clone()))?;
    let describer = ModelsClient::new(ModelsOptions::from_config(
        &config.models,
        creds.token,
        config.github.timeout_secs,
    ))?;

    info!(
        user = %sync_config.username,
        since = %sync_config.since,
        path = %sync_config.merge.path.display(),
        dry_run,
        "starting sync"
    );
    println!("Fetching contributions for {}...", sync_config.username);

    let reporter = CliProgress::new();
    let result = match sync(&sync_config, &source, &describer, &reporter).await {
        Ok(result) => result,
        Err(e @ ContribMergeError::Io { .. }) => {
            reporter.finish();
            println!("❌ Error updating file: {e}");
            return Ok(());
        }
        Err(e) => {
            reporter.finish();
            return Err(e.into());
        }
    };
    reporter.finish();

    println!("Found {} recent merged PRs", result.pull_requests);
    match &result.merge {
        Some(merge) => {
            println!("Contributions to {} repositories", result.repositories);
            print_summary(merge, dry_run);
            println!("✅ Contribution update complete! ({:.1}s)", result.elapsed.as_secs_f64());
        }
        None if result.pull_requests == 0 => {
            println!(
                "No new contributions found in the last {} days",
                config.github.window_days
            );
        }
        None => println!("No new contributions to add"),
    }

    Ok(())
}

fn cmd_merge(
    config_path: Option<&Path>,
    entries: &Path,
    file: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let config = load(config_path)?;
    let batches = load_entries(entries)?;

    let mut merge_config = MergeFileConfig::from_config(&config);
    if let Some(file) = file {
        merge_config.path = file;
    }
    merge_config.dry_run = dry_run;

    info!(
        entries = %entries.display(),
        path = %merge_config.path.display(),
        categories = batches.len(),
        "merging entry set"
    );

    let reporter = CliProgress::new();
    let result = merge_file(&merge_config, &batches, &reporter);
    reporter.finish();

    match result {
        Ok(merge) => print_summary(&merge, dry_run),
        Err(e @ ContribMergeError::Io { .. }) => println!("❌ Error updating file: {e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let source = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", source.display());
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Status line for one merge decision.
fn status_line(decision: &MergeDecision) -> String {
    let MergeDecision {
        identifier,
        category,
        kind,
        reason,
    } = decision;
    match kind {
        DecisionKind::CreatedSection => {
            format!("✅ Added new category: {category} (with {identifier})")
        }
        DecisionKind::Appended => format!("✅ Added {identifier} to {category}"),
        DecisionKind::SkippedDuplicate => {
            format!("⏭️  Skipping {identifier} - already documented ({reason})")
        }
        DecisionKind::SkippedNoAnchor => format!("⚠️  Skipping {identifier} - {reason}"),
    }
}

fn print_summary(merge: &MergeFileResult, dry_run: bool) {
    println!();
    if merge.written {
        println!("✅ Updated {}", merge.path.display());
    } else if merge.modified && dry_run {
        println!(
            "Dry run: {} would gain {} entr{}",
            merge.path.display(),
            merge.added(),
            if merge.added() == 1 { "y" } else { "ies" }
        );
    } else {
        println!("⏭️  No changes needed - all contributions already documented");
    }
    println!("  Added:   {}", merge.added());
    println!("  Skipped: {}", merge.skipped());
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
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn repository(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Generating description [{current}/{total}] {name}"));
    }

    fn decision(&self, decision: &MergeDecision) {
        let line = status_line(decision);
        self.spinner.suspend(|| println!("{line}"));
    }

    fn done(&self, _result: &MergeFileResult) {
        self.spinner.set_message("Done");
    }
}
