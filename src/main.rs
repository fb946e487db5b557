//! # Docent CLI
//!
//! The `docent` binary fronts the document-grounded assistant core: point
//! it at a directory of PDFs and ask questions grounded in them.
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./config/docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent scan` | List the PDFs the archive directory currently holds |
//! | `docent ingest` | Extract, chunk, and index the archive; report warnings |
//! | `docent ask "<question>"` | Answer one question, optionally with an image |
//! | `docent chat` | Interactive multi-turn session with bounded history |
//!
//! ## Examples
//!
//! ```bash
//! # See what would be ingested
//! docent scan
//!
//! # Build the index up front (otherwise it happens lazily on first ask)
//! docent ingest
//!
//! # One-shot question with the retrieved sources shown
//! docent ask "What is the escalation procedure?" --show-sources
//!
//! # Question about an image, grounded in the archive
//! docent ask "Is this chart within guideline limits?" --image chart.jpg
//!
//! # Multi-turn conversation
//! docent chat --persona clinical
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docent::engine::{Engine, Outcome, QueryRequest};
use docent::invoke::user_facing_error;
use docent::models::ChatSession;
use docent::{load_config_or_default, scan};

/// Docent — answer questions grounded in a local PDF archive.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file is not an error: built-in defaults give a working
/// mock-mode setup over `./data`. See `config/docent.example.toml`.
#[derive(Parser)]
#[command(
    name = "docent",
    about = "Document-grounded conversational assistant over a local PDF archive",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the PDFs in the archive directory.
    ///
    /// Creates the directory if it does not exist. Non-recursive; only
    /// `*.pdf` files count.
    Scan,

    /// Extract, chunk, and index the archive now.
    ///
    /// The same work happens lazily on the first `ask`; running it up front
    /// surfaces per-file warnings before any question is asked.
    Ingest {
        /// Drop the ingestion and index caches and rebuild from scratch.
        #[arg(long)]
        force: bool,
    },

    /// Ask a single question.
    Ask {
        /// The question text.
        question: String,

        /// Attach an image file to this question.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Persona name from the `[personas]` config table.
        #[arg(long)]
        persona: Option<String>,

        /// Print the retrieved sources after the answer.
        #[arg(long)]
        show_sources: bool,
    },

    /// Interactive multi-turn session. Type `exit` or `quit` to leave.
    Chat {
        /// Persona name from the `[personas]` config table.
        #[arg(long)]
        persona: Option<String>,

        /// Print the retrieved sources after each answer.
        #[arg(long)]
        show_sources: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Scan => {
            let docs = scan::scan_archive(&config.archive.dir);
            if docs.is_empty() {
                println!(
                    "No PDFs found in {} — drop files there and re-run.",
                    config.archive.dir.display()
                );
            } else {
                for doc in &docs {
                    println!("{}", doc.name);
                }
                println!("{} document(s).", docs.len());
            }
        }

        Commands::Ingest { force } => {
            let engine = Engine::new(config)?;
            let report = engine.ingest(force).await;
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            println!(
                "{} document(s) found, {} loaded, {} chunk(s), index: {}",
                report.documents,
                report.documents_loaded,
                report.chunks,
                if report.indexed { "built" } else { "none" }
            );
        }

        Commands::Ask {
            question,
            image,
            persona,
            show_sources,
        } => {
            let engine = Engine::new(config)?;
            let image = match image {
                Some(path) => Some(
                    std::fs::read(&path)
                        .with_context(|| format!("Failed to read image: {}", path.display()))?,
                ),
                None => None,
            };

            let request = QueryRequest {
                query: question,
                persona,
                history: Vec::new(),
                image,
            };

            match engine.answer(request).await {
                Ok(outcome) => print_outcome(&outcome, show_sources),
                Err(e) => {
                    eprintln!("{}", user_facing_error(&e));
                    std::process::exit(1);
                }
            }
        }

        Commands::Chat {
            persona,
            show_sources,
        } => {
            let engine = Engine::new(config)?;
            chat_loop(&engine, persona, show_sources).await?;
        }
    }

    Ok(())
}

async fn chat_loop(engine: &Engine, persona: Option<String>, show_sources: bool) -> Result<()> {
    let stdin = std::io::stdin();
    let mut session = ChatSession::new();

    println!("docent chat — type 'exit' to leave.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" || query == "quit" {
            break;
        }

        // The question goes on record before the answer is requested; a
        // mid-invocation failure still leaves a consistent transcript.
        let history = session.begin_turn(query);
        let request = QueryRequest {
            query: query.to_string(),
            persona: persona.clone(),
            history,
            image: None,
        };

        match engine.answer(request).await {
            Ok(outcome) => {
                print_outcome(&outcome, show_sources);
                session.record_answer(outcome.answer);
            }
            Err(e) => {
                eprintln!("{}", user_facing_error(&e));
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &Outcome, show_sources: bool) {
    println!("{}", outcome.answer);
    if outcome.via_backup {
        println!("(answered by backup model: {})", outcome.model);
    }
    if show_sources {
        println!("\nSources:\n{}", outcome.trace.trim_end());
    }
}
