//! research-clerk: command-line front end for catalog batch operations.
//!
//! Applies categorization and reorganization batches produced by the
//! assistant, and exposes read-only listings plus duplicate-path cleanup.

use clap::{Parser, Subcommand};
use clerk_core::{
    default_log_level, find_duplicate_paths, init_logging, merge_duplicate_collections,
    with_read_session, with_write_session, BatchApplier, BatchReport, BatchStatus, CatalogKey,
    CatalogReader, ClerkConfig, EntryOutcome, LinkOutcome,
};
use log::info;
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "research-clerk")]
#[command(author, version, about = "Safe batch filing for a shared reference catalog")]
#[command(propagate_version = true)]
struct Cli {
    /// Catalog database file (default: discovered from ZOTERO_DATA_DIR or home)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for rotated log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a categorization batch ({"items": [...]})
    ApplySuggestions {
        /// Batch JSON file
        file: PathBuf,
    },

    /// Apply a reorganization batch ({"moves": [...]})
    ApplyReorganization {
        /// Batch JSON file
        file: PathBuf,
    },

    /// List active collections with their paths
    ListCollections,

    /// List items that belong to no collection
    ListUnfiled,

    /// Show fields, tags and collection paths of one item
    ShowItem {
        /// 8-character item key
        key: String,
    },

    /// Merge collections that share one path into the oldest one
    DedupeCollections {
        /// Only report duplicate groups
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<ExitCode> {
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("research-clerk"));
    init_logging(level, &log_dir)?;

    let config = match cli.db {
        Some(path) => ClerkConfig::new(path),
        None => ClerkConfig::discover()?,
    };
    info!("event=cli_start module=cli status=ok version={}", clerk_core::core_version());

    match cli.command {
        Commands::ApplySuggestions { file } => {
            let report = BatchApplier::new(config).apply_categorization_file(&file)?;
            Ok(print_batch_report(&report))
        }
        Commands::ApplyReorganization { file } => {
            let report = BatchApplier::new(config).apply_reorganization_file(&file)?;
            Ok(print_batch_report(&report))
        }
        Commands::ListCollections => {
            let snapshot = with_read_session(&config, |session| -> CliResult<_> {
                Ok(session.list_collections()?)
            })?;
            let nodes: Vec<_> = snapshot.iter().collect();
            println!("{}", serde_json::to_string_pretty(&nodes)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::ListUnfiled => {
            let items = with_read_session(&config, |session| -> CliResult<_> {
                Ok(session.list_unfiled_items()?)
            })?;
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::ShowItem { key } => {
            let key = CatalogKey::parse(&key)?;
            let (detail, paths) = with_read_session(&config, |session| -> CliResult<_> {
                Ok((
                    session.get_item_detail(&key)?,
                    session.get_item_collection_paths(&key)?,
                ))
            })?;
            let output = json!({ "item": detail, "collections": paths });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::DedupeCollections { dry_run: true } => {
            let groups = with_read_session(&config, |session| -> CliResult<_> {
                Ok(find_duplicate_paths(&session.list_collections()?))
            })?;
            println!("{}", serde_json::to_string_pretty(&groups)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::DedupeCollections { dry_run: false } => {
            let report = with_write_session(&config, |session| -> CliResult<_> {
                Ok(merge_duplicate_collections(session)?)
            })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Prints one line per entry and returns 2 when any entry was skipped.
fn print_batch_report(report: &BatchReport) -> ExitCode {
    if report.status == BatchStatus::Empty {
        println!("Batch is empty; nothing to apply.");
        return ExitCode::SUCCESS;
    }

    if let Some(backup) = &report.backup_path {
        println!("Backup: {}", backup.display());
    }
    for (path, key) in &report.created_collections {
        println!("Created collection {key}: {path}");
    }
    for entry in &report.entries {
        let detail = match &entry.outcome {
            EntryOutcome::Filed {
                collection_key,
                link,
                tags,
            } => format!(
                "filed into {collection_key} ({}), {} tag(s) added",
                link_label(link),
                tags.added.len()
            ),
            EntryOutcome::Moved { from, to, link, .. } => {
                format!("moved {from} -> {to} ({})", link_label(link))
            }
            EntryOutcome::Unchanged { collection_key } => {
                format!("unchanged, already in {collection_key}")
            }
            EntryOutcome::Skipped(err) => format!("skipped: {err}"),
        };
        println!("{} [{}]: {}", entry.entry, entry.item_key, detail);
    }
    println!(
        "Applied {} of {} entries.",
        report.applied_count(),
        report.entries.len()
    );

    if report.skipped_count() > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn link_label(link: &LinkOutcome) -> &'static str {
    match link {
        LinkOutcome::Linked { .. } => "linked",
        LinkOutcome::AlreadyLinked => "already linked",
    }
}
