use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_qa_core::{
    list_sources, LopdfExtractor, OpenAiConfig, OpenAiEmbedder, OpenAiGenerator, QaService,
    RemoteParseConfig, RemoteParseExtractor, RetryPolicy, ServiceConfig, TextExtractor,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Service configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// OpenAI-compatible API base URL.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// API key for the embedding/generation service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Embedding model identifier.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Dimensionality of the embedding model's vectors.
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value = "1536")]
    embedding_dimensions: usize,

    /// Generation model identifier.
    #[arg(long, env = "GENERATOR_MODEL", default_value = "gpt-4o-mini")]
    generator_model: String,

    /// Remote parse service endpoint; local extraction is used when unset.
    #[arg(long, env = "PARSE_ENDPOINT")]
    parse_endpoint: Option<String>,

    /// API key for the remote parse service.
    #[arg(long, env = "PARSE_API_KEY", hide_env_values = true)]
    parse_api_key: Option<String>,

    /// Timeout in seconds for each capability request.
    #[arg(long, default_value = "60")]
    request_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the vector index from the configured data folder.
    Rebuild,
    /// Answer a question against the persisted index.
    Ask {
        /// Question text.
        question: String,
    },
    /// List the source documents the next rebuild would ingest.
    Sources,
}

fn build_service(cli: &Cli, config: ServiceConfig) -> anyhow::Result<QaService> {
    let api_key = cli
        .api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required"))?;

    let timeout = Duration::from_secs(cli.request_timeout_secs);
    let openai = OpenAiConfig {
        api_base: cli.api_base.clone(),
        api_key,
        embedding_model: cli.embedding_model.clone(),
        generation_model: cli.generator_model.clone(),
        embedding_dimensions: cli.embedding_dimensions,
        timeout,
        ..OpenAiConfig::default()
    };

    let extractor: Arc<dyn TextExtractor> = match &cli.parse_endpoint {
        Some(endpoint) => Arc::new(
            RemoteParseExtractor::new(RemoteParseConfig {
                endpoint: endpoint.clone(),
                api_key: cli.parse_api_key.clone(),
                timeout,
                retry: RetryPolicy::default(),
            })
            .map_err(|error| anyhow::anyhow!(error.to_string()))?,
        ),
        None => Arc::new(LopdfExtractor),
    };

    let embedder = OpenAiEmbedder::new(openai.clone())
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let generator =
        OpenAiGenerator::new(openai).map_err(|error| anyhow::anyhow!(error.to_string()))?;

    Ok(QaService::new(
        config,
        extractor,
        Arc::new(embedder),
        Arc::new(generator),
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::from_file(&cli.config)?;

    info!(
        version = app_version,
        collection = %config.collection_name,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    match &cli.command {
        Command::Sources => {
            let sources = list_sources(&config.data_dir, &config.source_extension)?;
            for path in &sources {
                println!("{}", path.display());
            }
            println!("{} source file(s)", sources.len());
        }
        Command::Rebuild => {
            let service = build_service(&cli, config)?;
            let index = service.rebuild().await?;
            println!(
                "{} chunks from {} documents indexed into collection '{}' at {}",
                index.len(),
                index.document_count(),
                service.config().collection_name,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question } => {
            let service = build_service(&cli, config)?;
            service.start().await?;
            let answer = service.answer(question).await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
    }

    Ok(())
}
