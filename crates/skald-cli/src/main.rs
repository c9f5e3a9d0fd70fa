mod cmd_export;
mod cmd_scan;
mod cmd_search;
mod cmd_show;
mod cmd_warnings;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skald_core::config::EngineConfig;

#[derive(Parser)]
#[command(
    name = "skald",
    version,
    about = "Timeline reconstruction for agent session traces"
)]
struct Cli {
    /// Engine tuning file (YAML); built-in defaults apply when omitted
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List trace files under a directory, newest first
    Scan {
        /// Directory to scan (default: the agent log root, else the cwd)
        root: Option<PathBuf>,
        /// Glob over paths or file names, e.g. "session-*.jsonl"
        #[arg(long)]
        glob: Option<String>,
        /// Output as JSON lines (one file per line)
        #[arg(long)]
        json: bool,
    },
    /// Load a trace and print its span tree
    Show {
        /// Trace file (JSON lines)
        file: PathBuf,
        /// Also print each span's events
        #[arg(long)]
        events: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Query spans by token, kind, status, agent, and time window
    Search {
        /// Trace file (JSON lines)
        file: PathBuf,
        /// Tokens that must all appear in a span's events
        tokens: Vec<String>,
        /// Require an event of this kind (request, tool_call, error, ...)
        #[arg(long)]
        kind: Option<String>,
        /// Require this span status (complete, unterminated, malformed)
        #[arg(long)]
        status: Option<String>,
        /// Require this agent name (case-insensitive)
        #[arg(long)]
        agent: Option<String>,
        /// Only spans overlapping this time or later (RFC 3339, bare date ok)
        #[arg(long)]
        after: Option<String>,
        /// Only spans overlapping this time or earlier
        #[arg(long)]
        before: Option<String>,
        /// Maximum matches to show (0 = unlimited)
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write selected spans back out as a loadable trace
    Export {
        /// Trace file (JSON lines)
        file: PathBuf,
        /// Output path ("-" for stdout)
        #[arg(long, default_value = "-")]
        out: String,
        /// Span id to include (repeatable); combined with any query filters
        #[arg(long = "span")]
        spans: Vec<u32>,
        /// Tokens that must all appear in a selected span's events
        tokens: Vec<String>,
        /// Select spans with an event of this kind
        #[arg(long)]
        kind: Option<String>,
        /// Select spans with this status
        #[arg(long)]
        status: Option<String>,
        /// Select spans run by this agent (case-insensitive)
        #[arg(long)]
        agent: Option<String>,
        /// Select spans overlapping this time or later
        #[arg(long)]
        after: Option<String>,
        /// Select spans overlapping this time or earlier
        #[arg(long)]
        before: Option<String>,
    },
    /// Print the warnings a load produced
    Warnings {
        /// Trace file (JSON lines)
        file: PathBuf,
        /// Output as JSON lines (one warning per line)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.cmd {
        Command::Scan { root, glob, json } => {
            cmd_scan::execute(root.as_deref(), glob.as_deref(), json, &config)
        }
        Command::Show { file, events, json } => cmd_show::execute(&file, events, json, &config),
        Command::Search {
            file,
            tokens,
            kind,
            status,
            agent,
            after,
            before,
            limit,
            json,
        } => cmd_search::execute(&cmd_search::SearchParams {
            file: &file,
            tokens: &tokens,
            kind: kind.as_deref(),
            status: status.as_deref(),
            agent: agent.as_deref(),
            after: after.as_deref(),
            before: before.as_deref(),
            limit,
            json,
            config: &config,
        }),
        Command::Export {
            file,
            out,
            spans,
            tokens,
            kind,
            status,
            agent,
            after,
            before,
        } => cmd_export::execute(&cmd_export::ExportParams {
            file: &file,
            out: &out,
            spans: &spans,
            tokens: &tokens,
            kind: kind.as_deref(),
            status: status.as_deref(),
            agent: agent.as_deref(),
            after: after.as_deref(),
            before: before.as_deref(),
            config: &config,
        }),
        Command::Warnings { file, json } => cmd_warnings::execute(&file, json, &config),
    }
}

// Logs go to stderr so command output stays pipeable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
