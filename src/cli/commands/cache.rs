//! Cache command - inspect cached working trees

use crate::cache::{CacheEntry, CacheStore, FsCacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{ShipyardError, ShipyardResult};
use serde::Serialize;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ShipyardResult<()> {
    let root = args.cache_root.unwrap_or_else(|| config.cache.root.clone());
    let store = FsCacheStore::new(root);

    match args.action {
        CacheAction::List { format } => list_entries(&store, format),
        CacheAction::Path { push_location } => {
            println!("{}", store.path_for(&push_location).display());
            Ok(())
        }
    }
}

fn list_entries(store: &FsCacheStore, format: OutputFormat) -> ShipyardResult<()> {
    let entries = store.entries()?;

    match format {
        OutputFormat::Table => print_table(store, &entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
    }
    Ok(())
}

fn print_table(store: &FsCacheStore, entries: &[CacheEntry]) {
    if entries.is_empty() {
        println!("No cached working trees in {}", store.root().display());
        return;
    }

    println!("{:<48} {}", "PUSH LOCATION", "PATH");
    println!("{}", "-".repeat(80));
    for entry in entries {
        println!("{:<48} {}", entry.key, entry.path.display());
    }
    println!();
    println!("Total: {} working tree(s)", entries.len());
}

fn print_json(entries: &[CacheEntry]) -> ShipyardResult<()> {
    #[derive(Serialize)]
    struct EntryJson<'a> {
        push_location: &'a str,
        path: String,
    }

    let json: Vec<EntryJson<'_>> = entries
        .iter()
        .map(|e| EntryJson {
            push_location: &e.key,
            path: e.path.display().to_string(),
        })
        .collect();

    let rendered = serde_json::to_string_pretty(&json)
        .map_err(|e| ShipyardError::Internal(format!("serializing cache list: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
