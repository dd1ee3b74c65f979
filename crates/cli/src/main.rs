use clap::{Args, Parser, Subcommand, ValueEnum};
use ragrank_cli::{load_inputs, HttpEmbedder, HttpEmbedderConfig, Snapshot};
use ragrank_core::embedding::{self, Embedder, EmbeddingError, RetryPolicy};
use ragrank_core::{
    config, AllowList, Bm25Params, Bm25Scorer, DocumentStore, Embedding, HybridRetriever,
    RetrievalError, RetrievalParams, ScoredDocument, SimilarityMetric, Tokenizer,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ragrank", about = "Hybrid BM25 + embedding document retrieval")]
struct Cli {
    #[command(flatten)]
    embedder: EmbedderArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct EmbedderArgs {
    /// OpenAI-compatible embeddings endpoint
    #[arg(
        long,
        env = "RAGRANK_EMBEDDING_ENDPOINT",
        default_value = "https://api.openai.com/v1/embeddings"
    )]
    endpoint: String,

    /// Embedding model name
    #[arg(long, env = "RAGRANK_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    model: String,

    /// Bearer token (falls back to OPENAI_API_KEY)
    #[arg(long, env = "RAGRANK_EMBEDDING_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Embedding dimension returned by the model
    #[arg(long, env = "RAGRANK_EMBEDDING_DIMENSIONS", default_value_t = 1536)]
    dimensions: usize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Attempts per embedding request, including the first
    #[arg(long, default_value_t = config::DEFAULT_EMBED_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Delay between embedding attempts in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_EMBED_RETRY_DELAY_MS)]
    retry_delay_ms: u64,
}

impl EmbedderArgs {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    fn http_config(&self) -> HttpEmbedderConfig {
        HttpEmbedderConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            timeout_secs: self.timeout,
            ..HttpEmbedderConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Rank the documents of a snapshot against a query
    Query(QueryArgs),
    /// Embed a JSON list of documents and write a snapshot
    EmbedCorpus(EmbedCorpusArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Snapshot file produced by `embed-corpus`
    #[arg(long)]
    corpus: PathBuf,

    /// Natural-language query
    #[arg(short, long)]
    query: String,

    /// Lexical weight in [0, 1]
    #[arg(long, default_value_t = config::DEFAULT_ALPHA)]
    alpha: f32,

    /// Number of documents to return
    #[arg(short = 'k', long, default_value_t = config::DEFAULT_TOP_K)]
    top_k: usize,

    /// Only rank documents owned by this user
    #[arg(long)]
    owner: Option<Uuid>,

    /// Restrict results to these document ids (repeatable)
    #[arg(long)]
    allow: Vec<Uuid>,

    /// JSON file with a precomputed query embedding (skips the embedder)
    #[arg(long)]
    query_embedding: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = TokenizerArg::Whitespace)]
    tokenizer: TokenizerArg,

    #[arg(long, value_enum, default_value_t = MetricArg::Cosine)]
    metric: MetricArg,
}

#[derive(Args)]
struct EmbedCorpusArgs {
    /// JSON array of documents ({owner_id, title, content, location?, id?})
    #[arg(long)]
    input: PathBuf,

    /// Snapshot file to write
    #[arg(long)]
    output: PathBuf,

    /// Documents per embedding request
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum TokenizerArg {
    Whitespace,
    Alphanumeric,
}

impl From<TokenizerArg> for Tokenizer {
    fn from(arg: TokenizerArg) -> Self {
        match arg {
            TokenizerArg::Whitespace => Tokenizer::Whitespace,
            TokenizerArg::Alphanumeric => Tokenizer::Alphanumeric,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Cosine,
    Dot,
}

impl From<MetricArg> for SimilarityMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Cosine => SimilarityMetric::Cosine,
            MetricArg::Dot => SimilarityMetric::DotProduct,
        }
    }
}

#[derive(Serialize)]
struct Hit<'a> {
    rank: usize,
    id: Uuid,
    title: &'a str,
    location: &'a str,
    score: f32,
    lexical_score: f32,
    similarity_score: f32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ragrank_cli=info".parse()?)
                .add_directive("ragrank_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Query(args) => run_query(&cli.embedder, args),
        Command::EmbedCorpus(args) => run_embed_corpus(&cli.embedder, args),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

/// The process-wide embedder, built from the command line on first use.
fn shared_embedder(args: &EmbedderArgs) -> Result<Arc<dyn Embedder>, Box<dyn std::error::Error>> {
    if let Some(existing) = embedding::global() {
        return Ok(existing);
    }
    let http: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(args.http_config())?);
    // A concurrent installer wins; use whichever embedder ended up global.
    let _ = embedding::install_global(http);
    embedding::global().ok_or_else(|| "embedder not installed".into())
}

fn run_query(
    embedder_args: &EmbedderArgs,
    args: &QueryArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = RetrievalParams::new(args.alpha, args.top_k);
    params.validate()?;

    let store = Snapshot::load(&args.corpus)?.into_store()?;
    let bm25 = Bm25Params {
        tokenizer: args.tokenizer.into(),
        ..Bm25Params::default()
    };
    let retriever = HybridRetriever::new(
        Box::new(Bm25Scorer::new(bm25)),
        Box::new(SimilarityMetric::from(args.metric)),
    )
    .with_retry_policy(embedder_args.retry_policy());
    let allow = (!args.allow.is_empty()).then(|| AllowList::new(args.allow.iter().copied()));

    let t0 = Instant::now();
    let hits: Vec<ScoredDocument> = match &args.query_embedding {
        Some(path) => {
            let raw = std::fs::read(path)?;
            let query_embedding: Vec<f32> = serde_json::from_slice(&raw)?;
            let corpus = store.snapshot(args.owner)?;
            let ranked = retriever.retrieve(&corpus, &args.query, &query_embedding, &params)?;
            match &allow {
                Some(allow) => allow.apply(ranked)?,
                None => ranked,
            }
        }
        None => {
            let embedder = shared_embedder(embedder_args)?;
            retriever.search(
                &store,
                args.owner,
                &args.query,
                embedder.as_ref(),
                &params,
                allow.as_ref(),
            )?
        }
    };
    tracing::info!(
        results = hits.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Query completed"
    );

    let output: Vec<Hit> = hits
        .iter()
        .enumerate()
        .map(|(i, h)| Hit {
            rank: i + 1,
            id: h.document.id,
            title: &h.document.title,
            location: &h.document.location,
            score: h.score,
            lexical_score: h.lexical_score,
            similarity_score: h.similarity_score,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_embed_corpus(
    embedder_args: &EmbedderArgs,
    args: &EmbedCorpusArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.batch_size == 0 {
        return Err("batch_size must be > 0".into());
    }
    let documents = load_inputs(&args.input)?;
    let embedder = shared_embedder(embedder_args)?;
    let retry = embedder_args.retry_policy();

    let t0 = Instant::now();
    let mut embeddings = Vec::with_capacity(documents.len());
    for batch in documents.chunks(args.batch_size) {
        let texts: Vec<&str> = batch.iter().map(|d| d.content.as_str()).collect();
        let vectors = retry
            .run_with_hint(
                |_| embedder.embed_batch(&texts),
                EmbeddingError::retry_after,
            )
            .into_result(|attempts, last_error| RetrievalError::EmbeddingGenerationExhausted {
                attempts,
                last_error,
            })?;
        embeddings.extend(
            batch
                .iter()
                .zip(vectors)
                .map(|(d, v)| Embedding::new(d.id, v)),
        );
        tracing::info!(embedded = embeddings.len(), total = documents.len(), "Embedded batch");
    }

    let snapshot = Snapshot {
        documents,
        embeddings,
    };
    snapshot.save(&args.output)?;
    tracing::info!(
        documents = snapshot.documents.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Corpus embedded"
    );
    Ok(())
}
