//! Article records and EFetch XML parsing.
//!
//! EFetch returns a `<PubmedArticleSet>` with one `<PubmedArticle>` per id.
//! Parsing walks the document with a quick-xml event reader and tracks the
//! element path so that nested look-alikes (e.g. PMIDs inside
//! `CommentsCorrections`) are not picked up.

use crate::error::{OrthoError, Result};
use crate::pubdate::{DateCandidates, DateFields};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Abstract placeholder when a record has no abstract text
pub const NO_ABSTRACT: &str = "No abstract information.";

/// Title placeholder when a record has no title
pub const NO_TITLE: &str = "No title information";

/// Journal placeholder when neither title nor ISO abbreviation is present
pub const NO_JOURNAL: &str = "No journal information";

/// One PubMed article, as shown in result lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// PubMed id
    pub pmid: String,
    pub title: String,
    /// Authors in record order, formatted "LastName Initials"
    pub authors: Vec<String>,
    pub journal: String,
    /// Abstract sections; labelled sections are rendered "LABEL: text"
    pub abstract_text: String,
    /// `YYYY-MM-DD`, `YYYY-MM`, `YYYY`, or empty
    pub publication_date: String,
}

impl ArticleRecord {
    /// Authors joined for display.
    pub fn author_line(&self) -> String {
        if self.authors.is_empty() {
            "No author information".to_string()
        } else {
            self.authors.join(", ")
        }
    }

    pub fn has_abstract(&self) -> bool {
        !self.abstract_text.trim().is_empty() && self.abstract_text != NO_ABSTRACT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateSlot {
    History,
    Electronic,
    JournalIssue,
    Completed,
    Revised,
}

#[derive(Debug, Default)]
struct AuthorParts {
    last_name: String,
    initials: String,
    collective: String,
}

#[derive(Debug, Default)]
struct ArticleBuilder {
    pmid: String,
    title: String,
    authors: Vec<String>,
    journal_title: String,
    iso_abbreviation: String,
    sections: Vec<(Option<String>, String)>,
    dates: DateCandidates,

    title_depth: Option<usize>,
    abstract_depth: Option<usize>,
    current_section: Option<(Option<String>, String)>,
    current_author: Option<AuthorParts>,
    current_date: Option<(DateSlot, usize, DateFields)>,
}

impl ArticleBuilder {
    fn slot_taken(&self, slot: DateSlot) -> bool {
        let taken = match slot {
            DateSlot::History => &self.dates.pubmed_history,
            DateSlot::Electronic => &self.dates.electronic,
            DateSlot::JournalIssue => &self.dates.journal_issue,
            DateSlot::Completed => &self.dates.completed,
            DateSlot::Revised => &self.dates.revised,
        };
        taken.is_some()
    }

    fn store_date(&mut self, slot: DateSlot, fields: DateFields) {
        let target = match slot {
            DateSlot::History => &mut self.dates.pubmed_history,
            DateSlot::Electronic => &mut self.dates.electronic,
            DateSlot::JournalIssue => &mut self.dates.journal_issue,
            DateSlot::Completed => &mut self.dates.completed,
            DateSlot::Revised => &mut self.dates.revised,
        };
        if target.is_none() {
            *target = Some(fields);
        }
    }

    fn start(&mut self, path: &[String], e: &BytesStart<'_>) {
        let depth = path.len();
        let name = path[depth - 1].as_str();
        let parent = parent_of(path);

        match (name, parent) {
            ("ArticleTitle", Some("Article")) if self.title_depth.is_none() => {
                self.title_depth = Some(depth);
            }
            ("AbstractText", Some("Abstract")) => {
                let label = attribute(e, "Label").filter(|l| !l.trim().is_empty());
                self.abstract_depth = Some(depth);
                self.current_section = Some((label, String::new()));
            }
            ("Author", Some("AuthorList")) => {
                self.current_author = Some(AuthorParts::default());
            }
            _ => {}
        }

        let slot = match (name, parent) {
            ("PubMedPubDate", Some("History"))
                if attribute(e, "PubStatus").as_deref() == Some("pubmed") =>
            {
                Some(DateSlot::History)
            }
            ("ArticleDate", Some("Article"))
                if attribute(e, "DateType").as_deref() == Some("Electronic") =>
            {
                Some(DateSlot::Electronic)
            }
            ("PubDate", Some("JournalIssue")) => Some(DateSlot::JournalIssue),
            ("DateCompleted", Some("MedlineCitation")) => Some(DateSlot::Completed),
            ("DateRevised", Some("MedlineCitation")) => Some(DateSlot::Revised),
            _ => None,
        };
        if let Some(slot) = slot {
            if self.current_date.is_none() && !self.slot_taken(slot) {
                self.current_date = Some((slot, depth, DateFields::default()));
            }
        }
    }

    fn text(&mut self, path: &[String], text: &str) {
        let depth = path.len();
        if depth == 0 {
            return;
        }

        if let Some(title_depth) = self.title_depth {
            if depth >= title_depth {
                self.title.push_str(text);
                return;
            }
        }

        if let Some(abstract_depth) = self.abstract_depth {
            if depth >= abstract_depth {
                if let Some((_, buf)) = self.current_section.as_mut() {
                    buf.push_str(text);
                }
                return;
            }
        }

        let name = path[depth - 1].as_str();
        let parent = parent_of(path);

        if let Some((_, date_depth, fields)) = self.current_date.as_mut() {
            if depth == *date_depth + 1 {
                let target = match name {
                    "Year" => Some(&mut fields.year),
                    "Month" => Some(&mut fields.month),
                    "Day" => Some(&mut fields.day),
                    "MedlineDate" => Some(&mut fields.medline_date),
                    _ => None,
                };
                if let Some(target) = target {
                    target.get_or_insert_with(String::new).push_str(text);
                }
                return;
            }
        }

        if let Some(author) = self.current_author.as_mut() {
            match name {
                "LastName" => author.last_name.push_str(text),
                "Initials" => author.initials.push_str(text),
                "CollectiveName" => author.collective.push_str(text),
                _ => {}
            }
            return;
        }

        match (name, parent) {
            ("PMID", Some("MedlineCitation")) => self.pmid.push_str(text),
            ("Title", Some("Journal")) => self.journal_title.push_str(text),
            ("ISOAbbreviation", Some("Journal")) => self.iso_abbreviation.push_str(text),
            _ => {}
        }
    }

    fn end(&mut self, path: &[String]) {
        let depth = path.len();
        let name = path[depth - 1].as_str();

        if self.title_depth == Some(depth) && name == "ArticleTitle" {
            self.title_depth = None;
        }

        if self.abstract_depth == Some(depth) && name == "AbstractText" {
            self.abstract_depth = None;
            if let Some(section) = self.current_section.take() {
                self.sections.push(section);
            }
        }

        if name == "Author" && parent_of(path) == Some("AuthorList") {
            if let Some(parts) = self.current_author.take() {
                let formatted = format_author(&parts);
                if !formatted.is_empty() {
                    self.authors.push(formatted);
                }
            }
        }

        let closes_date = matches!(&self.current_date, Some((_, d, _)) if *d == depth);
        if closes_date {
            if let Some((slot, _, fields)) = self.current_date.take() {
                self.store_date(slot, fields);
            }
        }
    }

    fn finish(self) -> ArticleRecord {
        let pmid = collapse_whitespace(&self.pmid);
        let title = collapse_whitespace(&self.title);
        let journal_title = collapse_whitespace(&self.journal_title);
        let iso = collapse_whitespace(&self.iso_abbreviation);

        let abstract_text = self
            .sections
            .iter()
            .filter_map(|(label, text)| {
                let text = collapse_whitespace(text);
                match label {
                    Some(label) => Some(format!("{}: {}", label.trim(), text)),
                    None if text.is_empty() => None,
                    None => Some(text),
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        ArticleRecord {
            pmid: if pmid.is_empty() { "N/A".to_string() } else { pmid },
            title: if title.is_empty() { NO_TITLE.to_string() } else { title },
            authors: self.authors,
            journal: if !journal_title.is_empty() {
                journal_title
            } else if !iso.is_empty() {
                iso
            } else {
                NO_JOURNAL.to_string()
            },
            abstract_text: if abstract_text.is_empty() {
                NO_ABSTRACT.to_string()
            } else {
                abstract_text
            },
            publication_date: self.dates.format(),
        }
    }
}

fn parent_of(path: &[String]) -> Option<&str> {
    path.len()
        .checked_sub(2)
        .and_then(|i| path.get(i))
        .map(String::as_str)
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn format_author(parts: &AuthorParts) -> String {
    let named = format!(
        "{} {}",
        collapse_whitespace(&parts.last_name),
        collapse_whitespace(&parts.initials)
    )
    .trim()
    .to_string();
    if named.is_empty() {
        collapse_whitespace(&parts.collective)
    } else {
        named
    }
}

/// Collapse runs of whitespace to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an EFetch `PubmedArticleSet` document.
///
/// Records come back in document order.
pub fn parse_article_set(xml: &str) -> Result<Vec<ArticleRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut articles = Vec::new();
    let mut remote_error: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                path.push(name);
                let name = path[path.len() - 1].as_str();

                if name == "PubmedArticle" {
                    current = Some(ArticleBuilder::default());
                } else if name == "ERROR" {
                    remote_error = Some(String::new());
                } else if let Some(builder) = current.as_mut() {
                    builder.start(&path, &e);
                }
            }
            Ok(Event::End(_)) => {
                if path.last().map(String::as_str) == Some("PubmedArticle") {
                    if let Some(builder) = current.take() {
                        articles.push(builder.finish());
                    }
                } else if let Some(builder) = current.as_mut() {
                    if !path.is_empty() {
                        builder.end(&path);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(e)) => {
                let text = match e.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(err) => {
                        debug!(error = %err, "Keeping raw text for unescapable entity");
                        String::from_utf8_lossy(&e).into_owned()
                    }
                };
                if path.last().map(String::as_str) == Some("ERROR") {
                    if let Some(msg) = remote_error.as_mut() {
                        msg.push_str(&text);
                    }
                } else if let Some(builder) = current.as_mut() {
                    builder.text(&path, &text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                if let Some(builder) = current.as_mut() {
                    builder.text(&path, &text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(OrthoError::MalformedResponse(format!(
                    "Invalid EFetch XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
    }

    if let Some(msg) = remote_error {
        if articles.is_empty() {
            return Err(OrthoError::MalformedResponse(format!(
                "EFetch reported an error: {}",
                collapse_whitespace(&msg)
            )));
        }
    }

    debug!(count = articles.len(), "Parsed EFetch articles");
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">38000001</PMID>
      <DateCompleted><Year>2024</Year><Month>02</Month><Day>10</Day></DateCompleted>
      <Article PubModel="Print-Electronic">
        <Journal>
          <Title>The Journal of arthroplasty</Title>
          <ISOAbbreviation>J Arthroplasty</ISOAbbreviation>
          <JournalIssue CitedMedium="Internet">
            <Volume>39</Volume>
            <PubDate><Year>2024</Year><Month>Mar</Month></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>Outcomes of <i>cementless</i> total knee arthroplasty &amp; revision.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Cementless fixation is increasingly used.</AbstractText>
          <AbstractText Label="RESULTS">Survivorship was
            98% at 5 years.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y"><LastName>Kim</LastName><ForeName>Jin</ForeName><Initials>J</Initials></Author>
          <Author ValidYN="Y"><LastName>Park</LastName><Initials>SH</Initials></Author>
          <Author ValidYN="Y"><CollectiveName>Knee Study Group</CollectiveName></Author>
        </AuthorList>
        <ArticleDate DateType="Electronic"><Year>2023</Year><Month>11</Month><Day>28</Day></ArticleDate>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="CommentIn"><PMID Version="1">39999999</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <History>
        <PubMedPubDate PubStatus="received"><Year>2023</Year><Month>6</Month><Day>1</Day></PubMedPubDate>
        <PubMedPubDate PubStatus="pubmed"><Year>2023</Year><Month>11</Month><Day>29</Day></PubMedPubDate>
      </History>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">38000002</PMID>
      <Article>
        <Journal>
          <ISOAbbreviation>Injury</ISOAbbreviation>
          <JournalIssue><PubDate><MedlineDate>2022 Nov-Dec</MedlineDate></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>Hip fracture care.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_full_record() {
        let articles = parse_article_set(SAMPLE).unwrap();
        assert_eq!(articles.len(), 2);

        let a = &articles[0];
        assert_eq!(a.pmid, "38000001");
        assert_eq!(a.title, "Outcomes of cementless total knee arthroplasty & revision.");
        assert_eq!(a.authors, vec!["Kim J", "Park SH", "Knee Study Group"]);
        assert_eq!(a.journal, "The Journal of arthroplasty");
        assert_eq!(
            a.abstract_text,
            "BACKGROUND: Cementless fixation is increasingly used.\n\nRESULTS: Survivorship was 98% at 5 years."
        );
        // History date with PubStatus="pubmed" wins over every other sub-record
        assert_eq!(a.publication_date, "2023-11-29");
    }

    #[test]
    fn test_parse_sparse_record() {
        let articles = parse_article_set(SAMPLE).unwrap();
        let b = &articles[1];
        assert_eq!(b.pmid, "38000002");
        assert_eq!(b.journal, "Injury");
        assert!(b.authors.is_empty());
        assert_eq!(b.author_line(), "No author information");
        assert_eq!(b.abstract_text, NO_ABSTRACT);
        assert!(!b.has_abstract());
        assert_eq!(b.publication_date, "2022-11");
    }

    #[test]
    fn test_empty_set() {
        let articles = parse_article_set("<PubmedArticleSet></PubmedArticleSet>").unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn test_remote_error_document() {
        let xml = "<eFetchResult><ERROR>Empty id list - nothing todo</ERROR></eFetchResult>";
        assert!(matches!(
            parse_article_set(xml),
            Err(OrthoError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_broken_xml() {
        let xml = "<PubmedArticleSet><PubmedArticle></MedlineCitation></PubmedArticleSet>";
        assert!(parse_article_set(xml).is_err());
    }
}
