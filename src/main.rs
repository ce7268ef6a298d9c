//! Command-line search and indexing tool
//!
//! Runs the retrieval pipeline against a JSON corpus file: `--embed` indexes
//! a document into the local LanceDB store, `--query` searches it.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use docrag::config::RagConfig;
use docrag::corpus::{CorpusKeywordSearch, JsonCorpus};
use docrag::embedding::EmbeddingClient;
use docrag::error::{RagError, Result};
use docrag::hybrid::HybridSearchEngine;
use docrag::pipeline::{EmbeddingPipeline, GenerateOutcome};
use docrag::search::VectorSearchEngine;
use docrag::store::LanceEmbeddingStore;
use docrag::types::{SearchMode, SearchRequest};

#[derive(Parser, Debug)]
#[command(name = "docrag", version, about = "Hybrid document retrieval over a JSON corpus")]
struct Cli {
    /// Search query
    #[arg(short, long)]
    query: Option<String>,

    /// Generate embeddings for a document id
    #[arg(short, long, value_name = "DOCUMENT_ID")]
    embed: Option<String>,

    /// User id to search as (required with --query)
    #[arg(short, long)]
    user: Option<String>,

    /// Search mode: vector or hybrid
    #[arg(short, long, default_value = "hybrid")]
    mode: String,

    /// Maximum number of results
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// Path to the corpus JSON file
    #[arg(short, long, default_value = "corpus.json")]
    corpus: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::load()?;
    let corpus = Arc::new(JsonCorpus::load(&cli.corpus)?);
    let store = Arc::new(
        LanceEmbeddingStore::connect(&config.lancedb_path(), config.embedding.dimension).await?,
    );
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);

    if let Some(ref document_id) = cli.embed {
        let pipeline = EmbeddingPipeline::new(
            config.clone(),
            corpus.clone(),
            embedder.clone(),
            store.clone(),
        );
        match pipeline.generate(document_id, true).await? {
            GenerateOutcome::Regenerated { chunks } => {
                println!("indexed {document_id}: {chunks} chunks");
            }
            GenerateOutcome::Disabled => {
                eprintln!("embedding generation is disabled; set RAG_ENABLED=true");
                process::exit(1);
            }
            GenerateOutcome::DocumentMissing => {
                return Err(RagError::NotFound(format!(
                    "document {document_id} not in corpus"
                )));
            }
            GenerateOutcome::Cleared => {
                println!("cleared {document_id}: document is not searchable or too short");
            }
            GenerateOutcome::UpToDate => {
                println!("{document_id} is already up to date");
            }
        }
    }

    if let Some(ref query) = cli.query {
        let user_id = cli.user.as_deref().ok_or_else(|| {
            RagError::Validation("--user is required with --query".to_string())
        })?;
        let user = corpus
            .user_context(user_id)
            .ok_or_else(|| RagError::NotFound(format!("user {user_id} not in corpus")))?;

        let mode = match cli.mode.as_str() {
            "vector" => SearchMode::Vector,
            "hybrid" => SearchMode::Hybrid,
            other => {
                return Err(RagError::Validation(format!(
                    "unknown mode '{other}', expected vector or hybrid"
                )))
            }
        };

        let vector = VectorSearchEngine::new(config, corpus.clone(), embedder, store);
        let engine = HybridSearchEngine::new(vector, Arc::new(CorpusKeywordSearch::new(corpus)));

        let mut request = SearchRequest::new(query.clone());
        request.limit = cli.limit;
        request.mode = mode;

        let response = engine.search(&user, &request).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    if cli.embed.is_none() && cli.query.is_none() {
        eprintln!("nothing to do: pass --embed <document-id> and/or --query <text>");
        process::exit(1);
    }

    Ok(())
}
