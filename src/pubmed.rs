//! NCBI E-utilities client.
//!
//! A search is two requests: ESearch for one page of PMIDs (sorted by
//! publication date, newest first) and EFetch for the matching records. Either
//! stage failing aborts the whole search; no partial page is returned.
//!
//! API Details:
//! - ESearch returns JSON (`retmode=json`), EFetch returns PubMed XML
//! - 3 req/s without an API key, 10 req/s with one

use crate::article::{parse_article_set, ArticleRecord};
use crate::error::{OrthoError, Result};
use crate::query::SearchQuery;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// E-utilities base URL
pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// ESearch sort order: publication date, newest first
const SORT_ORDER: &str = "pub_date";

/// PubMed client configuration
#[derive(Debug, Clone)]
pub struct PubMedConfig {
    pub base_url: String,
    /// NCBI API key (raises the rate limit)
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: EUTILS_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub articles: Vec<ArticleRecord>,
    /// Total matches reported by ESearch for the whole query
    pub total: u64,
}

/// Anything that can serve pages of articles for a query.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_page(&self, query: &SearchQuery, offset: u64, page_size: u32) -> Result<SearchPage>;
}

/// ESearch JSON envelope
#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// E-utilities client
#[derive(Debug, Clone)]
pub struct PubMedClient {
    client: Client,
    esearch_url: Url,
    efetch_url: Url,
    api_key: Option<String>,
}

impl PubMedClient {
    /// Create a new PubMedClient
    pub fn new(config: PubMedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OrthoError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))
            .map_err(|e| OrthoError::Config(format!("Invalid E-utilities URL '{}': {}", config.base_url, e)))?;
        let join = |endpoint: &str| {
            base.join(endpoint)
                .map_err(|e| OrthoError::Config(format!("Invalid E-utilities endpoint: {}", e)))
        };

        Ok(Self {
            client,
            esearch_url: join("esearch.fcgi")?,
            efetch_url: join("efetch.fcgi")?,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Run one page of a search: ESearch for ids, then EFetch for details.
    ///
    /// An empty id page skips EFetch and returns just the reported total.
    pub async fn search(&self, query: &SearchQuery, offset: u64, page_size: u32) -> Result<SearchPage> {
        let term = query.term();
        info!(term = %term, offset = offset, page_size = page_size, "Searching PubMed");

        let (ids, total) = self.esearch(&term, offset, page_size).await?;
        if ids.is_empty() {
            info!(total = total, "No ids on this page");
            return Ok(SearchPage {
                articles: Vec::new(),
                total,
            });
        }

        let articles = self.fetch_details(&ids).await?;
        let articles = order_by_ids(articles, &ids);

        info!(
            returned = articles.len(),
            total = total,
            "PubMed page loaded"
        );

        Ok(SearchPage { articles, total })
    }

    /// ESearch: one page of PMIDs and the total match count.
    pub async fn esearch(&self, term: &str, offset: u64, page_size: u32) -> Result<(Vec<String>, u64)> {
        let offset = offset.to_string();
        let page_size = page_size.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("db", "pubmed"),
            ("term", term),
            ("retstart", offset.as_str()),
            ("retmax", page_size.as_str()),
            ("sort", SORT_ORDER),
            ("retmode", "json"),
        ];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("api_key", key));
        }

        debug!(url = %self.esearch_url, "Sending ESearch request");

        let response = self
            .client
            .get(self.esearch_url.clone())
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "ESearch failed");
            return Err(OrthoError::from_status(status.as_u16(), &body, "NCBI ESearch"));
        }
        let body = response.text().await?;

        parse_esearch(&body)
    }

    /// EFetch: full records for the given PMIDs, in response order.
    pub async fn fetch_details(&self, ids: &[String]) -> Result<Vec<ArticleRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids.join(",");
        let mut params: Vec<(&str, &str)> = vec![("db", "pubmed"), ("id", id_list.as_str()), ("retmode", "xml")];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("api_key", key));
        }

        debug!(count = ids.len(), "Sending EFetch request");

        let response = self
            .client
            .get(self.efetch_url.clone())
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "EFetch failed");
            return Err(OrthoError::from_status(status.as_u16(), &body, "NCBI EFetch"));
        }
        let body = response.text().await?;

        parse_article_set(&body)
    }
}

#[async_trait]
impl ArticleSource for PubMedClient {
    async fn fetch_page(&self, query: &SearchQuery, offset: u64, page_size: u32) -> Result<SearchPage> {
        self.search(query, offset, page_size).await
    }
}

/// Parse an ESearch JSON body into (ids, total).
fn parse_esearch(body: &str) -> Result<(Vec<String>, u64)> {
    let data: ESearchResponse = serde_json::from_str(body)
        .map_err(|e| OrthoError::MalformedResponse(format!("Failed to parse ESearch response: {}", e)))?;
    let result = data.esearchresult;

    if let Some(error) = result.error.filter(|e| !e.trim().is_empty()) {
        return Err(OrthoError::RemoteRejected {
            status: 200,
            message: format!("NCBI ESearch reported: {}", error),
        });
    }

    let total = result
        .count
        .as_deref()
        .ok_or_else(|| OrthoError::MalformedResponse("ESearch response has no count".to_string()))?
        .trim()
        .parse::<u64>()
        .map_err(|e| OrthoError::MalformedResponse(format!("Invalid ESearch count: {}", e)))?;

    Ok((result.idlist, total))
}

/// Re-order EFetch records to follow the ESearch id order.
///
/// Records whose PMID is not in `ids` keep their response order at the end.
pub fn order_by_ids(articles: Vec<ArticleRecord>, ids: &[String]) -> Vec<ArticleRecord> {
    let rank: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut indexed: Vec<(usize, usize, ArticleRecord)> = articles
        .into_iter()
        .enumerate()
        .map(|(pos, a)| {
            let r = rank.get(a.pmid.as_str()).copied().unwrap_or(usize::MAX);
            (r, pos, a)
        })
        .collect();
    indexed.sort_by_key(|(r, pos, _)| (*r, *pos));
    indexed.into_iter().map(|(_, _, a)| a).collect()
}
