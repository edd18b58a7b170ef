//! # docdex CLI
//!
//! The `docdex` binary is the primary interface for docdex. It provides
//! commands for indexing a documentation corpus, semantic search, direct
//! lookup, module listing, cache maintenance, and starting the tool server.
//!
//! ## Usage
//!
//! ```bash
//! docdex <command>
//! ```
//!
//! Configuration comes from the environment (or a `.env` file):
//! `OPENAI_API_KEY`, `PINECONE_API_KEY`, `PINECONE_INDEX_NAME`, and
//! `PINECONE_INDEX_HOST` are required.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docdex index <dir>` | Extract, embed, and upsert a documentation corpus |
//! | `docdex search "<query>"` | Semantic search over the indexed corpus |
//! | `docdex get <path>` | Full detail for one API element |
//! | `docdex modules [parent]` | List child modules from the index summary |
//! | `docdex cache stats` | Show cache counters |
//! | `docdex cache sweep` | Delete expired cache rows |
//! | `docdex cache clear` | Delete all cache rows |
//! | `docdex serve` | Start the HTTP tool server |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docdex::cache::QueryCache;
use docdex::config::Config;
use docdex::embedding::OpenAiEmbedder;
use docdex::ingest;
use docdex::modules;
use docdex::progress::ProgressMode;
use docdex::query::{self, QueryService};
use docdex::server;
use docdex::stats;
use docdex::summary::{self, SUMMARY_FILE};
use docdex::vector_store::PineconeIndex;

/// docdex — semantic search index and lookup tools for API reference
/// documentation.
#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Semantic search index and lookup tools for API reference documentation",
    version,
    long_about = "docdex extracts structured entries from API reference HTML, embeds them \
    through a remote embedding service, upserts them into a vector index, and serves \
    semantic search and direct lookup with a local TTL cache in front."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Index a documentation corpus.
    ///
    /// Walks the directory for HTML pages, extracts entries, embeds them in
    /// batches, and replaces the remote index contents. Writes the index
    /// summary artifact on success.
    Index {
        /// Directory containing the documentation HTML pages.
        docs_dir: PathBuf,

        /// Parse and report counts without calling any remote service.
        #[arg(long)]
        dry_run: bool,

        /// Override the embedding batch size.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Progress output: `off`, `human`, or `json`. Defaults to `human`
        /// when stderr is a TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Search the indexed documentation.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (1-20, default 5).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show full detail for one API element by dotted path.
    Get {
        /// Fully-qualified dotted path (e.g. `pkg.ops.mesh.subdivide`).
        function_path: String,
    },

    /// List child modules of an optional parent, from the index summary.
    Modules {
        /// Parent module path; omit for top-level modules.
        parent: Option<String>,
    },

    /// Cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start the HTTP tool server.
    Serve,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache counters and storage state.
    Stats,
    /// Delete expired cache rows.
    Sweep,
    /// Delete all cache rows.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Index {
            docs_dir,
            dry_run,
            batch_size,
            progress,
        } => {
            let mut config = config;
            if let Some(batch_size) = batch_size {
                if batch_size == 0 {
                    bail!("--batch-size must be > 0");
                }
                config.embedding.batch_size = batch_size;
            }

            let mode = match progress.as_deref() {
                None => ProgressMode::default_for_tty(),
                Some("off") => ProgressMode::Off,
                Some("human") => ProgressMode::Human,
                Some("json") => ProgressMode::Json,
                Some(other) => bail!("Unknown progress mode: {}. Use off, human, or json.", other),
            };

            let embedder = OpenAiEmbedder::new(&config, config.embedding.index_max_retries)?;
            let store = PineconeIndex::new(&config, config.embedding.index_max_retries)?;
            ingest::run_index(
                &config,
                &embedder,
                &store,
                &docs_dir,
                dry_run,
                mode.reporter().as_ref(),
            )
            .await
        }

        Commands::Search { query, limit } => {
            let service = build_service(&config).await?;
            let hits = service.search(&query, limit).await?;
            println!("{}", query::format_search_hits(query.trim(), &hits));
            Ok(())
        }

        Commands::Get { function_path } => {
            let service = build_service(&config).await?;
            match service.get_function(&function_path).await? {
                Some(detail) => {
                    println!("{}", query::format_function_detail(&detail));
                    Ok(())
                }
                None => {
                    println!(
                        "Function '{}' not found in documentation",
                        function_path.trim()
                    );
                    std::process::exit(1);
                }
            }
        }

        Commands::Modules { parent } => {
            let summary_path = config.cache.dir.join(SUMMARY_FILE);
            let index_summary = summary::read_summary(&summary_path)?;
            let children = modules::list_modules(&index_summary, parent.as_deref());
            if children.is_empty() {
                match parent {
                    Some(parent) => println!("No submodules found for '{}'", parent),
                    None => println!("No modules indexed"),
                }
            } else {
                for child in children {
                    println!("{}", child);
                }
            }
            Ok(())
        }

        Commands::Cache { action } => match action {
            CacheAction::Stats => stats::run_stats(&config).await,
            CacheAction::Sweep => stats::run_sweep(&config).await,
            CacheAction::Clear => stats::run_clear(&config).await,
        },

        Commands::Serve => {
            let service = Arc::new(build_service(&config).await?);
            server::run_server(&config, service).await
        }
    }
}

/// Assemble the serving stack: clients with the single-retry serving policy
/// and the cache (degraded to a pass-through if its storage is unusable).
async fn build_service(config: &Config) -> Result<QueryService> {
    let embedder = OpenAiEmbedder::new(config, config.embedding.serve_max_retries)?;
    let store = PineconeIndex::new(config, config.embedding.serve_max_retries)?;
    let cache = QueryCache::open(&config.cache).await;
    cache.sweep_expired().await;
    Ok(QueryService::new(
        Arc::new(embedder),
        Arc::new(store),
        cache,
    ))
}
