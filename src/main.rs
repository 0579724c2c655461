//! CacheIndex command line
//!
//! ```text
//! cacheindex validate --config storage.yaml   load and validate a configuration
//! cacheindex demo [--config storage.yaml]     save → query → filtered delete → delete all
//! ```
//!
//! The demo runs the engine against in-memory relay stores and prints each
//! result as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cacheindex::codec::DataType;
use cacheindex::filter::{Condition, Filter, Operation};
use cacheindex::query::{
    CacheIndexUpdate, Command, FilteredIndexDeleteCommand, GetRangeQuery, IndexDataItem,
    MultiIndexIdQuery, PagedIndexQuery, TagMap,
};
use cacheindex::{
    CacheIndex, InMemoryRelayStore, IndexQuery, IndexStore, IndexStoreContext, MessageContext,
    StorageConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// CacheIndex - sorted, filterable secondary indexes for a relay cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Storage configuration (.yaml, .yml or .json)
    #[arg(long, env = "CACHEINDEX_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Load and validate a configuration
    Validate,
    /// Drive a save, query, filtered delete and delete-all cycle in memory
    Demo,
}

/// Configuration used by the demo when none is given
const DEMO_CONFIG: &str = r#"
type_settings:
  - { type_id: 1, type_name: FeedIndex, related_index_type_id: 2 }
  - { type_id: 2, type_name: FeedItem, compress: true }
index_type_mappings:
  - type_id: 1
    mode: databound
    full_data_id_fields:
      - { part_name: ItemId }
    indexes:
      - index_name: byTime
        extended_id_suffix: 0
        primary_sort_info:
          is_tag: true
          field_name: time
          sort_order_list:
            - { data_type: Int64, sort_by: DESC }
        tags:
          - { name: time, data_type: Int64 }
          - { name: kind, data_type: Byte }
"#;

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    match args.command {
        Cmd::Validate => {
            let Some(path) = args.config else {
                bail!("validate needs --config");
            };
            let config = tokio::task::spawn_blocking(move || StorageConfig::load(&path))
                .await
                .context("config loader panicked")?
                .context("invalid storage configuration")?;
            info!(
                types = config.type_settings.len(),
                mappings = config.index_type_mappings.len(),
                "Configuration is valid"
            );
        }
        Cmd::Demo => {
            let config = match args.config {
                Some(path) => StorageConfig::load(&path).context("invalid storage configuration")?,
                None => StorageConfig::from_yaml_str(DEMO_CONFIG).context("invalid demo configuration")?,
            };
            tokio::task::spawn_blocking(move || run_demo(config))
                .await
                .context("demo panicked")??;
        }
    }
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Demo
// =============================================================================

fn run_demo(config: StorageConfig) -> anyhow::Result<()> {
    let mapping = config
        .index_type_mappings
        .first()
        .context("configuration has no index type mapping")?;
    let type_id = mapping.type_id;
    let index = mapping
        .indexes
        .first()
        .context("index type mapping has no index")?;
    let index_name = index.index_name.clone();
    let sort_tag = index.primary_sort_info.field_name.clone();

    let storage = Arc::new(InMemoryRelayStore::new("index"));
    let data = Arc::new(InMemoryRelayStore::new("data"));
    let ctx = Arc::new(IndexStoreContext::new(config, storage.clone(), data.clone()));
    let store = IndexStore::new(ctx);

    let feeds: [&[u8]; 2] = [b"feed-a", b"feed-b"];
    for (n, index_id) in feeds.iter().enumerate() {
        let mut cache_index = CacheIndex::new(index_id.to_vec(), index_name.clone());
        cache_index.add_list = (0u8..4)
            .map(|i| {
                let item_id = vec![n as u8, i];
                IndexDataItem::new(item_id, TagMap::new())
                    .with_tag(sort_tag.clone(), (i64::from(i) * 10 + n as i64).to_le_bytes())
                    .with_tag("kind", vec![i % 2])
                    .with_data(format!("payload {}/{}", n, i).into_bytes())
            })
            .collect();
        store.handle_save(&MessageContext::new(type_id, index_id), &cache_index)?;
    }
    info!(
        index_records = storage.type_len(type_id),
        last_updated = ?storage.stats().last_updated,
        "Saved {} indexes",
        feeds.len()
    );

    let msg = MessageContext::new(type_id, feeds[0]);
    let range = IndexQuery::GetRange(GetRangeQuery {
        index_id: feeds[0].to_vec(),
        target_index_name: index_name.clone(),
        offset: 1,
        item_num: 3,
        ..Default::default()
    });
    print_json("GetRange", &store.handle_query(&msg, &range)?)?;

    let paged = IndexQuery::Paged(PagedIndexQuery {
        page_size: 3,
        page_num: 1,
        base: MultiIndexIdQuery::new(index_name.clone(), feeds.iter().map(|id| id.to_vec()).collect()),
    });
    print_json("Paged", &store.handle_query(&msg, &paged)?)?;

    let update = CacheIndexUpdate::new(Command::FilteredIndexDelete(FilteredIndexDeleteCommand {
        index_id: feeds[0].to_vec(),
        target_index_name: index_name,
        delete_filter: Filter::Condition(Condition::tag("kind", Operation::Equals, vec![1], DataType::Byte)),
    }));
    store.handle_update(&msg, &update)?;
    print_json("GetRange after FilteredIndexDelete", &store.handle_query(&msg, &range)?)?;

    store.handle_delete_all_in_type(&msg)?;
    info!(
        index_records = storage.type_len(type_id),
        payloads = data.stats().object_count,
        "Deleted all in type"
    );
    store.shutdown();
    Ok(())
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> anyhow::Result<()> {
    println!("== {}", label);
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
