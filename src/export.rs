//! CSV export of search results.

use crate::article::ArticleRecord;
use crate::error::Result;
use crate::summary::SummaryOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// One exported row. Column order follows field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRow {
    pub pmid: String,
    pub title: String,
    pub authors: String,
    pub journal: String,
    pub publication_date: String,
    pub abstract_text: String,
    #[serde(default)]
    pub summary: String,
}

impl From<&ArticleRecord> for ArticleRow {
    fn from(article: &ArticleRecord) -> Self {
        Self {
            pmid: article.pmid.clone(),
            title: article.title.clone(),
            authors: article.authors.join("; "),
            journal: article.journal.clone(),
            publication_date: article.publication_date.clone(),
            abstract_text: article.abstract_text.clone(),
            summary: String::new(),
        }
    }
}

/// Build rows for `articles`, attaching each summary by PMID.
pub fn rows_with_summaries(articles: &[ArticleRecord], summaries: &[SummaryOutcome]) -> Vec<ArticleRow> {
    let by_pmid: HashMap<&str, &SummaryOutcome> = summaries.iter().map(|s| (s.pmid.as_str(), s)).collect();

    articles
        .iter()
        .map(|article| {
            let mut row = ArticleRow::from(article);
            if let Some(outcome) = by_pmid.get(article.pmid.as_str()) {
                row.summary = outcome.text.clone();
            }
            row
        })
        .collect()
}

/// Write rows with a header line. Returns the number of rows written.
///
/// Empty input leaves the filesystem untouched.
pub fn write_csv(path: &Path, rows: &[ArticleRow]) -> Result<usize> {
    if rows.is_empty() {
        info!(path = %path.display(), "No rows to export");
        return Ok(0);
    }

    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Exported CSV");
    Ok(rows.len())
}
