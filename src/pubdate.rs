//! Best-effort publication dates for PubMed records.
//!
//! A PubMed record can carry up to five date sub-records. They are tried in
//! priority order and the first one with a usable year wins; month and day come
//! from that same sub-record only.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d{4}").ok());

static MONTH_NAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\b").ok()
});

/// Raw fields of one date sub-record (`<Year>`, `<Month>`, `<Day>`, `<MedlineDate>`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateFields {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    /// Free-text date such as "2021 Spring" or "2020 Nov-Dec"
    pub medline_date: Option<String>,
}

impl DateFields {
    pub fn ymd(year: &str, month: &str, day: &str) -> Self {
        Self {
            year: Some(year.to_string()),
            month: Some(month.to_string()),
            day: Some(day.to_string()),
            medline_date: None,
        }
    }

    /// Parse this sub-record. `None` when no usable year is present.
    pub fn parse(&self) -> Option<PublicationDate> {
        if let Some(year) = self.year.as_deref().and_then(parse_year) {
            let month = self.month.as_deref().and_then(month_number);
            let day = self.day.as_deref().and_then(parse_day);
            return Some(PublicationDate { year, month, day });
        }

        let text = self.medline_date.as_deref()?;
        let year = YEAR_RE
            .as_ref()?
            .find(text)
            .map(|m| m.as_str().to_string())?;
        let month = MONTH_NAME_RE
            .as_ref()
            .and_then(|re| re.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| month_number(m.as_str()));

        Some(PublicationDate {
            year,
            month,
            day: None,
        })
    }
}

/// Date sub-records of one article, named by where they live in the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateCandidates {
    /// `PubmedData/History/PubMedPubDate[@PubStatus="pubmed"]`
    pub pubmed_history: Option<DateFields>,
    /// `Article/ArticleDate[@DateType="Electronic"]`
    pub electronic: Option<DateFields>,
    /// `Article/Journal/JournalIssue/PubDate`
    pub journal_issue: Option<DateFields>,
    /// `MedlineCitation/DateCompleted`
    pub completed: Option<DateFields>,
    /// `MedlineCitation/DateRevised`
    pub revised: Option<DateFields>,
}

impl DateCandidates {
    /// First sub-record, in priority order, that yields a year.
    pub fn best(&self) -> Option<PublicationDate> {
        [
            &self.pubmed_history,
            &self.electronic,
            &self.journal_issue,
            &self.completed,
            &self.revised,
        ]
        .into_iter()
        .flatten()
        .find_map(DateFields::parse)
    }

    /// `YYYY-MM-DD`, `YYYY-MM`, `YYYY`, or an empty string.
    pub fn format(&self) -> String {
        self.best().map(|d| d.to_string()).unwrap_or_default()
    }
}

/// A possibly partial date. Month and day are zero-padded two-digit strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationDate {
    pub year: String,
    pub month: Option<String>,
    pub day: Option<String>,
}

impl fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.month, &self.day) {
            (Some(month), Some(day)) => write!(f, "{}-{}-{}", self.year, month, day),
            (Some(month), None) => write!(f, "{}-{}", self.year, month),
            _ => write!(f, "{}", self.year),
        }
    }
}

fn parse_year(text: &str) -> Option<String> {
    let text = text.trim();
    (text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit())).then(|| text.to_string())
}

fn parse_day(text: &str) -> Option<String> {
    let day: u32 = text.trim().parse().ok()?;
    (1..=31).contains(&day).then(|| format!("{:02}", day))
}

/// Map a numeric month or an English month name (short or full) to `01`..`12`.
pub fn month_number(text: &str) -> Option<String> {
    let text = text.trim();
    if let Ok(n) = text.parse::<u32>() {
        return (1..=12).contains(&n).then(|| format!("{:02}", n));
    }

    let lower = text.to_ascii_lowercase();
    let n = match lower.as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(format!("{:02}", n))
}
