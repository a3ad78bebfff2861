//! orthopub - Orthopedic literature search over PubMed
//!
//! Searches recent orthopedic journal articles page by page and summarizes
//! abstracts in Korean.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! orthopub search --journal arthroplasty --start 2024-01 --end 2024-06 --pages 2
//! orthopub search --all-journals --keywords "hip fracture" --summarize --output hits.csv
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! orthopub serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use orthopub::article::ArticleRecord;
use orthopub::credentials::{mask_credential, CredentialStore};
use orthopub::export::{rows_with_summaries, write_csv, ArticleRow};
use orthopub::journals::{self, Category};
use orthopub::pubmed::{order_by_ids, PubMedClient, PubMedConfig, SearchPage, EUTILS_BASE_URL};
use orthopub::query::{default_period, SearchQuery, DEFAULT_PAGE_SIZE};
use orthopub::session::{PaginationState, SearchSession};
use orthopub::summary::{SummaryClient, SummaryConfig, SummaryOutcome, OPENAI_BASE_URL};
use orthopub::OrthoError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Orthopedic literature search over PubMed with Korean abstract summaries
#[derive(Parser)]
#[command(name = "orthopub")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search PubMed, loading results page by page
    Search(SearchArgs),

    /// Summarize articles by PMID
    Summarize {
        /// PubMed ids
        #[arg(long = "pmid", required = true, num_args = 1..)]
        pmids: Vec<String>,

        /// OpenAI API key (falls back to the stored key)
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Write articles and summaries to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// List the built-in journal catalogue
    Journals,

    /// Manage the stored OpenAI API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Start month (YYYY-MM), defaults to the same month last year
    #[arg(long)]
    start: Option<String>,

    /// End month (YYYY-MM), defaults to the current month
    #[arg(long)]
    end: Option<String>,

    /// Journal id, category id or PubMed journal name (repeatable)
    #[arg(short, long = "journal")]
    journals: Vec<String>,

    /// Search every journal in the catalogue
    #[arg(long, conflicts_with = "journals")]
    all_journals: bool,

    /// Extra PubMed expression, e.g. "hip fracture"
    #[arg(short, long)]
    keywords: Option<String>,

    /// Results per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,

    /// Keep loading until every result is fetched
    #[arg(long, conflicts_with = "pages")]
    all: bool,

    /// Summarize each abstract after loading
    #[arg(long)]
    summarize: bool,

    /// OpenAI API key (falls back to the stored key)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Write results to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    remote: RemoteArgs,
}

/// Remote service settings shared by every networked command
#[derive(Args, Clone)]
struct RemoteArgs {
    /// NCBI API key (raises the E-utilities rate limit)
    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    ncbi_api_key: Option<String>,

    /// E-utilities base URL
    #[arg(long, env = "PUBMED_BASE_URL", default_value = EUTILS_BASE_URL)]
    pubmed_base_url: String,

    /// Chat-completion API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Summary model name
    #[arg(long, default_value = "gpt-4o")]
    model: String,
}

impl RemoteArgs {
    fn pubmed_client(&self) -> Result<PubMedClient> {
        let config = PubMedConfig {
            base_url: self.pubmed_base_url.clone(),
            api_key: self.ncbi_api_key.clone(),
            ..Default::default()
        };
        PubMedClient::new(config).context("Failed to create PubMed client")
    }

    fn summary_client(&self) -> Result<SummaryClient> {
        let config = SummaryConfig {
            base_url: self.openai_base_url.clone(),
            model: self.model.clone(),
            ..Default::default()
        };
        SummaryClient::new(config).context("Failed to create summary client")
    }
}

#[derive(Subcommand)]
enum KeyAction {
    /// Validate and store a key
    Set {
        /// OpenAI API key (starts with "sk-")
        key: String,
    },
    /// Remove the stored key
    Clear,
    /// Show the stored key, masked
    Show,
    /// Show the settings file path
    Path,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.log_json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Search(args) => run_search(args).await?,
        Commands::Summarize {
            pmids,
            api_key,
            output,
            remote,
        } => run_summarize(pmids, api_key, output, remote).await?,
        Commands::Journals => print_catalogue(),
        Commands::Key { action } => handle_key(action)?,
        Commands::Serve { port, host, remote } => run_server(host, port, remote).await?,
    }

    Ok(())
}

// ============================================================================
// Search
// ============================================================================

async fn run_search(args: SearchArgs) -> Result<()> {
    let (default_start, default_end) = default_period(Local::now().date_naive());
    let start = args.start.unwrap_or_else(|| default_start.to_string());
    let end = args.end.unwrap_or_else(|| default_end.to_string());

    let journal_names: Vec<String> = if args.all_journals {
        journals::all_journals().iter().map(|j| j.name.to_string()).collect()
    } else {
        journals::resolve(&args.journals)
    };

    let query = SearchQuery::new(start, end, journal_names, args.keywords.unwrap_or_default());

    // Resolve the key up front so a missing key fails before any search traffic
    let credential = if args.summarize {
        Some(resolve_credential(args.api_key.as_deref())?)
    } else {
        None
    };

    println!("\n=== PubMed Search ===");
    println!("Period: {} ~ {}", query.start, query.end);
    println!("Journals: {}", query.journals.len());
    println!("Term: {}", query.term());

    let client = args.remote.pubmed_client()?;
    let mut session = SearchSession::new(client, args.page_size);

    let first = session.search(query).await.context("Search failed")?;
    if first.articles.is_empty() {
        println!("\nNo articles found.");
        return Ok(());
    }
    println!("\nFound {} articles.", first.total);

    let mut articles: Vec<ArticleRecord> = Vec::new();
    print_page(&first, articles.len());
    articles.extend(first.articles);

    let mut loaded_pages = 1;
    while args.all || loaded_pages < args.pages {
        match session.load_more().await.context("Loading next page failed")? {
            Some(page) => {
                print_page(&page, articles.len());
                articles.extend(page.articles);
                loaded_pages += 1;
            }
            None => break,
        }
    }

    let state = session.pagination();
    if state.exhausted {
        println!("\nAll {} articles loaded.", articles.len());
    } else {
        println!(
            "\nLoaded {} of {} articles (next offset {}).",
            articles.len(),
            state.total_available,
            state.offset
        );
    }

    let summaries = match credential {
        Some(credential) => {
            let summarizer = args.remote.summary_client()?;
            let outcomes = summarizer.summarize_batch(&articles, &credential).await;
            print_summaries(&outcomes);
            outcomes
        }
        None => Vec::new(),
    };

    if let Some(path) = args.output {
        save_rows(&path, &rows_with_summaries(&articles, &summaries))?;
    }

    Ok(())
}

async fn run_summarize(
    pmids: Vec<String>,
    api_key: Option<String>,
    output: Option<PathBuf>,
    remote: RemoteArgs,
) -> Result<()> {
    let credential = resolve_credential(api_key.as_deref())?;

    let client = remote.pubmed_client()?;
    let articles = client
        .fetch_details(&pmids)
        .await
        .context("Failed to fetch article details")?;
    let articles = order_by_ids(articles, &pmids);

    if articles.is_empty() {
        println!("No articles found for the given PMIDs.");
        return Ok(());
    }

    let summarizer = remote.summary_client()?;
    let outcomes = summarizer.summarize_batch(&articles, &credential).await;
    print_summaries(&outcomes);

    if let Some(path) = output {
        save_rows(&path, &rows_with_summaries(&articles, &outcomes))?;
    }

    Ok(())
}

/// Explicit key (flag or environment) first, then the stored key.
fn resolve_credential(explicit: Option<&str>) -> Result<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    let store = CredentialStore::new()?;
    store.api_key().ok_or_else(|| {
        anyhow::anyhow!("No OpenAI API key. Pass --api-key, set OPENAI_API_KEY, or run `orthopub key set <KEY>`.")
    })
}

fn print_page(page: &SearchPage, already_shown: usize) {
    for (i, article) in page.articles.iter().enumerate() {
        println!("\n[{}] {}", already_shown + i + 1, article.title);
        println!("    {}", article.author_line());
        if article.publication_date.is_empty() {
            println!("    {}", article.journal);
        } else {
            println!("    {} · {}", article.journal, article.publication_date);
        }
        println!("    PMID: {}  https://pubmed.ncbi.nlm.nih.gov/{}/", article.pmid, article.pmid);
    }
}

fn print_summaries(outcomes: &[SummaryOutcome]) {
    println!("\n=== Summaries ===");
    for outcome in outcomes {
        println!("\n[PMID {}] {}", outcome.pmid, outcome.title);
        println!("{}", outcome.text);
    }

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    println!("\n{} of {} summaries generated.", succeeded, outcomes.len());
}

fn save_rows(path: &Path, rows: &[ArticleRow]) -> Result<()> {
    let written = write_csv(path, rows).with_context(|| format!("Failed to write {:?}", path))?;
    if written == 0 {
        println!("No data to save to {:?}", path);
    } else {
        println!("Saved {} rows: {:?}", written, path);
    }
    Ok(())
}

// ============================================================================
// Catalogue & Key Management
// ============================================================================

fn print_catalogue() {
    fn print_category(category: &Category, depth: usize) {
        let indent = "  ".repeat(depth);
        println!("{}{} [{}]", indent, category.name, category.id);
        for journal in category.journals {
            println!("{}  - {:<14} {}", indent, journal.id, journal.name);
        }
        for sub in category.sub_categories {
            print_category(sub, depth + 1);
        }
    }

    for category in journals::categories() {
        print_category(category, 0);
    }
    println!("\n{} journals in total.", journals::all_journals().len());
}

fn handle_key(action: KeyAction) -> Result<()> {
    let store = CredentialStore::new()?;

    match action {
        KeyAction::Set { key } => {
            store.save_api_key(&key).context("Key not saved")?;
            println!("API key saved.");
        }
        KeyAction::Clear => {
            store.clear_api_key()?;
            println!("API key cleared.");
        }
        KeyAction::Show => match store.api_key() {
            Some(key) => println!("{}", mask_credential(&key)),
            None => println!("No API key stored."),
        },
        KeyAction::Path => {
            println!("Settings file: {:?}", store.path());
        }
    }

    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(host: String, port: u16, remote: RemoteArgs) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app_state = Arc::new(AppState {
        pubmed: remote.pubmed_client()?,
        summarizer: remote.summary_client()?,
        credentials: CredentialStore::new()?,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/journals", get(journals_handler))
        .route("/search", post(search_handler))
        .route("/summarize", post(summarize_handler))
        .route("/summarize/batch", post(summarize_batch_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

struct AppState {
    pubmed: PubMedClient,
    summarizer: SummaryClient,
    credentials: CredentialStore,
}

impl AppState {
    /// Key from the request body, else the stored key.
    fn credential(&self, explicit: Option<String>) -> Result<String, ApiError> {
        explicit
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.credentials.api_key())
            .ok_or_else(|| ApiError(OrthoError::InvalidCredential("No API key configured.".to_string())))
    }
}

/// Library error carried to an HTTP response
struct ApiError(OrthoError);

impl From<OrthoError> for ApiError {
    fn from(e: OrthoError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrthoError::Validation(_) | OrthoError::InvalidCredential(_) => StatusCode::BAD_REQUEST,
            OrthoError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            OrthoError::Forbidden(_) => StatusCode::FORBIDDEN,
            OrthoError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            OrthoError::Connectivity(_) => StatusCode::BAD_GATEWAY,
            e if e.is_remote() => StatusCode::BAD_GATEWAY,
            OrthoError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(status = status.as_u16(), error = %self.0, "Request failed");

        let body = ErrorResponse {
            error: self.0.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Journal catalogue endpoint
async fn journals_handler() -> Json<&'static [Category]> {
    Json(journals::categories())
}

/// Search request body
#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(flatten)]
    query: SearchQuery,
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Search response
#[derive(Debug, Serialize)]
struct SearchResponse {
    articles: Vec<ArticleRecord>,
    total: u64,
    next_offset: u64,
    exhausted: bool,
}

/// One page of a search. The client carries the offset between calls.
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let SearchRequest {
        query,
        offset,
        page_size,
    } = req;

    // Journal selectors may be catalogue ids
    let query = SearchQuery::new(
        query.start,
        query.end,
        journals::resolve(&query.journals),
        query.keywords,
    );
    query.validate()?;

    let page_size = page_size.max(1);
    info!(offset = offset, page_size = page_size, "Search request");

    let page = state.pubmed.search(&query, offset, page_size).await?;

    let mut cursor = PaginationState {
        offset,
        ..Default::default()
    };
    cursor.advance(page.articles.len(), page.total, page_size);

    Ok(Json(SearchResponse {
        articles: page.articles,
        total: page.total,
        next_offset: cursor.offset,
        exhausted: cursor.exhausted,
    }))
}

/// Summary request body
#[derive(Debug, Deserialize)]
struct SummarizeRequest {
    abstract_text: String,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    summary: String,
}

async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, ApiError> {
    let credential = state.credential(req.api_key)?;
    let summary = state.summarizer.summarize(&req.abstract_text, &credential).await?;
    Ok(Json(SummarizeResponse { summary }))
}

/// Batch summary request body
#[derive(Debug, Deserialize)]
struct SummarizeBatchRequest {
    articles: Vec<ArticleRecord>,
    #[serde(default)]
    api_key: Option<String>,
}

async fn summarize_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeBatchRequest>,
) -> Result<Json<Vec<SummaryOutcome>>, ApiError> {
    let credential = state.credential(req.api_key)?;
    info!(count = req.articles.len(), "Batch summary request");
    Ok(Json(state.summarizer.summarize_batch(&req.articles, &credential).await))
}
