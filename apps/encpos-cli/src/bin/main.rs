use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::path::Path;

use encpos_backend::dts::fetch_metadata_file;
use encpos_backend::index_conf::load_index_conf;
use encpos_backend::{DtsClient, ElasticClient};
use encpos_cli::{init_tracing, split_indexes};
use encpos_core::config::{Config, Settings};
use encpos_core::ingest::{bulk_body, entries_for_year, parse_metadata_tsv, DocumentProcessor, IndexedDocument, YearSpan};

#[derive(Parser)]
#[command(name = "encpos", about = "Administration of the encpos search indexes", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against one or more indexes and print the raw answer
    Search {
        /// JSON request body, or a query string with --term
        query: String,

        /// Comma-separated index names (default: document and collection indexes)
        #[arg(long)]
        indexes: Option<String>,

        /// Treat QUERY as a query string instead of a JSON body
        #[arg(short, long)]
        term: bool,
    },

    /// Push settings and mappings from the configuration directory
    UpdateConf {
        #[arg(long)]
        indexes: Option<String>,

        /// Delete each index before recreating it
        #[arg(long)]
        rebuild: bool,
    },

    /// Delete indexes
    Delete {
        #[arg(long)]
        indexes: String,
    },

    /// Rebuild the document index from the metadata file and the DTS
    Index {
        /// `start-end` (inclusive) or `all`
        #[arg(long, default_value = "all")]
        years: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let client = ElasticClient::new(&settings.backend)?;

    match cli.command {
        Commands::Search { query, indexes, term } => {
            let indexes = indexes.unwrap_or_else(|| settings.backend.all_indexes());
            let body = if term {
                json!({"query": {"bool": {"must": [{"query_string": {"query": query}}]}}})
            } else {
                serde_json::from_str::<Value>(&query).context("QUERY is not a JSON body (use --term for a query string)")?
            };
            let result = client.search(&indexes, &body).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::UpdateConf { indexes, rebuild } => {
            let indexes = indexes.unwrap_or_else(|| settings.backend.all_indexes());
            update_conf(&client, Path::new(&settings.backend.config_dir), &split_indexes(&indexes), rebuild).await?;
        }
        Commands::Delete { indexes } => {
            for index in split_indexes(&indexes) {
                client.delete_index(&index).await?;
                tracing::info!("deleted {}", index);
            }
        }
        Commands::Index { years } => index_documents(&client, &settings, &years).await?,
    }
    Ok(())
}

async fn update_conf(client: &ElasticClient, config_dir: &Path, indexes: &[String], rebuild: bool) -> Result<()> {
    for index in indexes {
        let Some(payload) = load_index_conf(config_dir, index)? else {
            tracing::warn!("skipping {}: configuration incomplete in {}", index, config_dir.display());
            continue;
        };
        if rebuild {
            client.delete_index(index).await?;
        }
        client.put_index(index, &payload).await.with_context(|| format!("updating {}", index))?;
    }
    Ok(())
}

async fn index_documents(client: &ElasticClient, settings: &Settings, years: &str) -> Result<()> {
    let span = YearSpan::parse(years, &settings.metadata.all_years)?;
    let metadata = fetch_metadata_file(&settings.metadata.file_url).await?;
    let entries = parse_metadata_tsv(&metadata)?;
    let selected: Vec<_> = span.years().flat_map(|year| entries_for_year(&entries, year)).collect();
    tracing::info!("{} documents selected for {}-{}", selected.len(), span.start, span.end);

    let dts = DtsClient::new(settings)?;
    let processor = DocumentProcessor::new()?;
    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut docs = Vec::with_capacity(selected.len());
    for entry in selected {
        pb.set_message(entry.id.clone());
        match dts.fetch_document(&entry.id).await {
            Ok(markup) => docs.push(IndexedDocument {
                id: entry.id.clone(),
                content: processor.document_text(&markup),
                metadata: entry.record.clone(),
            }),
            Err(e) => tracing::warn!("ERROR while indexing {}, {}", entry.id, e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if docs.is_empty() {
        tracing::warn!("nothing to index");
        return Ok(());
    }
    let body = bulk_body(&settings.backend.document_index, &docs)?;
    client.bulk(body).await?;
    tracing::info!("indexed {} documents into {}", docs.len(), settings.backend.document_index);
    Ok(())
}
