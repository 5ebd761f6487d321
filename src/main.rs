//! # docwiki CLI
//!
//! ## Usage
//!
//! ```bash
//! docwiki --config ./docwiki.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docwiki build <DOCS...>` | Extract articles from the given documents |
//! | `docwiki build --dir <DIR>` | List documents in a directory and choose which to process |
//! | `docwiki status` | Show the knowledge base and stored source timestamps |
//! | `docwiki ping` | Send one short request to check the endpoint and key |
//!
//! ## Examples
//!
//! ```bash
//! # Process every document under ./docs without prompting
//! docwiki build --dir ./docs --recursive --yes
//!
//! # Regenerate one document's articles even if they are current
//! docwiki build ./docs/spec.docx --force
//!
//! # Machine-readable progress on stderr
//! docwiki build --dir ./docs --yes --progress json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docwiki::build_cmd::{self, BuildOptions};
use docwiki::config;
use docwiki::progress::ProgressMode;

/// docwiki: turn Word documents into a markdown knowledge base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. The file is optional; environment variables and `.env` fill in the
/// API key and company context.
#[derive(Parser)]
#[command(
    name = "docwiki",
    about = "docwiki: turn Word documents into a markdown knowledge base",
    version,
    long_about = "docwiki reads .docx files, extracts document guides, product knowledge and \
    client information with an OpenAI-compatible chat model, and writes them as markdown \
    articles with front matter. Unchanged documents are skipped, and answers without \
    substance are never written."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./docwiki.toml`; defaults are used when it does not exist.
    #[arg(long, global = true, default_value = "./docwiki.toml")]
    config: PathBuf,

    /// More log output on stderr (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Extract articles from Word documents.
    ///
    /// Each document is read, its products and client are discovered, and
    /// one article per document guide, product and client is requested.
    /// Articles whose stored source timestamp is not older than the
    /// document's are skipped without a request.
    Build {
        /// Documents to process.
        documents: Vec<PathBuf>,

        /// Directory to search for `.docx` files.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Search `--dir` recursively.
        #[arg(short, long)]
        recursive: bool,

        /// Knowledge-base root (overrides `output.dir`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model for every request (overrides `llm.model_fast` and `llm.model_smart`).
        #[arg(long)]
        model: Option<String>,

        /// Process all documents found in `--dir` without asking.
        #[arg(short, long)]
        yes: bool,

        /// Regenerate articles even when they are up to date.
        #[arg(long)]
        force: bool,

        /// Process only document number N of the `--dir` listing.
        #[arg(long, value_name = "N")]
        select: Option<usize>,

        /// Progress output on stderr: `human`, `json` or `off`.
        ///
        /// Defaults to `human`.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Show the knowledge-base layout and each article's stored source timestamp.
    Status {
        /// Knowledge-base root (overrides `output.dir`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check connectivity, API key and model with one short request.
    Ping {
        /// Model to ping (overrides `llm.model_fast`).
        #[arg(long)]
        model: Option<String>,
    },
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("invalid progress mode '{}': use human, json or off", s))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build {
            documents,
            dir,
            recursive,
            output,
            model,
            yes,
            force,
            select,
            progress,
        } => {
            let opts = BuildOptions {
                documents,
                dir,
                recursive,
                output,
                model,
                yes,
                force,
                select,
                progress,
            };
            build_cmd::run_build(&cfg, opts).await?;
        }
        Commands::Status { output } => {
            build_cmd::run_status(&cfg, output)?;
        }
        Commands::Ping { model } => {
            build_cmd::run_ping(&cfg, model.as_deref()).await?;
        }
    }

    Ok(())
}
