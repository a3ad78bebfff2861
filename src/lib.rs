//! # orthopub
//!
//! Orthopedic literature search over PubMed with Korean abstract summaries.
//!
//! ## Modules
//!
//! - [`query`] - Month range, journal and keyword filters into a PubMed term
//! - [`pubmed`] - NCBI E-utilities client (ESearch + EFetch)
//! - [`article`] - PubMed XML records into [`article::ArticleRecord`]s
//! - [`pubdate`] - Best-effort publication dates
//! - [`session`] - Incremental pagination over one search
//! - [`summary`] - Abstract summarization through a chat-completion API
//! - [`journals`] - Built-in orthopedic journal catalogue
//! - [`credentials`] - Persisted API key
//! - [`export`] - CSV export
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orthopub::pubmed::{PubMedClient, PubMedConfig};
//! use orthopub::query::SearchQuery;
//! use orthopub::session::SearchSession;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PubMedClient::new(PubMedConfig::default())?;
//!     let mut session = SearchSession::with_default_page_size(client);
//!     let query = SearchQuery::new("2024-01", "2024-06", ["J Arthroplasty"], "");
//!     let page = session.search(query).await?;
//!     println!("{} of {} articles", page.articles.len(), page.total);
//!     Ok(())
//! }
//! ```

pub mod article;
pub mod credentials;
pub mod error;
pub mod export;
pub mod journals;
pub mod prompts;
pub mod pubdate;
pub mod pubmed;
pub mod query;
pub mod session;
pub mod summary;

pub use error::{OrthoError, Result};
