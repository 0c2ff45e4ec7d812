use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use odata4_bridge::{
    AdapterConfig, MetadataNormalizer, ODataV4Adapter, ReqwestTransport, translate_query_url,
};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "odata4-tool")]
#[command(about = "Developer tooling for the OData v4 dialect bridge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite older-dialect count tokens in a query URL
    TranslateUrl { url: String },
    /// Normalize a saved `$metadata` JSON document and print the result
    NormalizeMetadata {
        #[arg(long)]
        input: PathBuf,
        /// Label used in error messages
        #[arg(long)]
        url: Option<String>,
    },
    /// Run a query against a live service
    Query {
        #[arg(long)]
        service: String,
        resource: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("odata4_bridge=info,warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::TranslateUrl { url } => {
            println!("{}", translate_query_url(&url));
            Ok(())
        }
        Command::NormalizeMetadata { input, url } => normalize_metadata(&input, url.as_deref()),
        Command::Query { service, resource } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(run_query(&service, &resource))
        }
    }
}

fn normalize_metadata(input: &Path, url: Option<&str>) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read metadata from '{}'", input.display()))?;
    let raw: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not valid JSON", input.display()))?;

    let label = url.map(str::to_string).unwrap_or_else(|| input.display().to_string());
    let metadata = MetadataNormalizer::new().normalize(raw, &label)?;
    let schema = metadata
        .schema()
        .ok_or_else(|| anyhow!("Metadata in '{}' holds no schema", input.display()))?;
    eprintln!(
        "Normalized '{}': {} entity types, {} associations",
        schema.namespace,
        schema.entity_types().len(),
        schema.associations().len()
    );

    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

async fn run_query(service: &str, resource: &str) -> Result<()> {
    let config = AdapterConfig::new(service);
    let transport = ReqwestTransport::new(&config)?;
    let adapter = ODataV4Adapter::new(config, transport);

    let url = adapter.config().qualify_url(resource);
    let page = adapter
        .execute_query(&url)
        .await
        .with_context(|| format!("Query '{}' failed", url))?;

    for row in &page.results {
        println!("{}", serde_json::to_string(row)?);
    }
    match page.inline_count {
        Some(count) => eprintln!("{} rows (inline count {})", page.results.len(), count),
        None => eprintln!("{} rows", page.results.len()),
    }
    Ok(())
}
