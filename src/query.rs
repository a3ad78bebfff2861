//! PubMed query construction.
//!
//! Turns the user's filter state (month range, journals, keywords) into an
//! E-utilities `term`. The builder itself is lenient: an unparsable month just
//! drops the date clause. [`SearchQuery::validate`] is the strict check callers
//! run before issuing a search.

use crate::error::{OrthoError, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topical filter used when no other clause is present
pub const DEFAULT_TERM: &str = "orthopedics[MeSH Terms]";

/// Results per page for incremental loading
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// A calendar month (`YYYY-MM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        // Reject anything chrono can't place on a calendar
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day: the day before the first of the following month.
    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(first)
    }
}

impl FromStr for YearMonth {
    type Err = OrthoError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || OrthoError::Validation(format!("Invalid month '{}', expected YYYY-MM", s));

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || month.is_empty() || month.len() > 2 || !digits(year) || !digits(month) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Default search window: same month last year through the current month.
pub fn default_period(today: NaiveDate) -> (YearMonth, YearMonth) {
    let end = YearMonth::of(today);
    let start = YearMonth::new(end.year - 1, end.month).unwrap_or(end);
    (start, end)
}

/// User-selected filters for one search.
///
/// Months are kept as entered so that [`SearchQuery::term`] can silently skip
/// a date clause it cannot parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Start month (`YYYY-MM`)
    #[serde(default)]
    pub start: String,
    /// End month (`YYYY-MM`)
    #[serde(default)]
    pub end: String,
    /// PubMed journal names
    #[serde(default)]
    pub journals: Vec<String>,
    /// Free-text keywords, passed through as a PubMed expression
    #[serde(default)]
    pub keywords: String,
}

impl SearchQuery {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        journals: impl IntoIterator<Item = impl Into<String>>,
        keywords: impl Into<String>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for journal in journals {
            let journal: String = journal.into();
            let journal = journal.trim();
            if !journal.is_empty() && !unique.iter().any(|j| j == journal) {
                unique.push(journal.to_string());
            }
        }

        Self {
            start: start.into().trim().to_string(),
            end: end.into().trim().to_string(),
            journals: unique,
            keywords: keywords.into().trim().to_string(),
        }
    }

    /// `("A"[Journal] OR "B"[Journal])`, or `None` with no journals.
    pub fn journal_clause(&self) -> Option<String> {
        if self.journals.is_empty() {
            return None;
        }
        let joined = self
            .journals
            .iter()
            .map(|j| format!("\"{}\"[Journal]", j))
            .collect::<Vec<_>>()
            .join(" OR ");
        Some(format!("({})", joined))
    }

    /// Inclusive publication-date clause, or `None` if either month is missing or malformed.
    pub fn date_clause(&self) -> Option<String> {
        let start: YearMonth = self.start.parse().ok()?;
        let end: YearMonth = self.end.parse().ok()?;
        Some(format!(
            "(\"{}\"[Date - Publication] : \"{}\"[Date - Publication])",
            start.first_day().format("%Y/%m/%d"),
            end.last_day().format("%Y/%m/%d")
        ))
    }

    pub fn keyword_clause(&self) -> Option<String> {
        let keywords = self.keywords.trim();
        if keywords.is_empty() {
            None
        } else {
            Some(format!("({})", keywords))
        }
    }

    /// Full E-utilities `term`: present clauses joined with AND, or [`DEFAULT_TERM`].
    pub fn term(&self) -> String {
        let clauses: Vec<String> = [self.journal_clause(), self.date_clause(), self.keyword_clause()]
            .into_iter()
            .flatten()
            .collect();

        if clauses.is_empty() {
            DEFAULT_TERM.to_string()
        } else {
            clauses.join(" AND ")
        }
    }

    /// Reject incomplete filter state before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.start.is_empty() || self.end.is_empty() {
            return Err(OrthoError::Validation(
                "Both a start month and an end month are required.".to_string(),
            ));
        }
        let start: YearMonth = self.start.parse()?;
        let end: YearMonth = self.end.parse()?;
        if start > end {
            return Err(OrthoError::Validation(format!(
                "Start month {} is after end month {}.",
                start, end
            )));
        }
        if self.journals.is_empty() {
            return Err(OrthoError::Validation(
                "Select at least one journal.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_year_month() {
        let ym: YearMonth = "2024-02".parse().unwrap();
        assert_eq!((ym.year(), ym.month()), (2024, 2));
        assert_eq!(ym.to_string(), "2024-02");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024".parse::<YearMonth>().is_err());
        assert!("24-01".parse::<YearMonth>().is_err());
        assert!("abcd-ef".parse::<YearMonth>().is_err());
        assert!("+024-03".parse::<YearMonth>().is_err());
        assert!("2024-+3".parse::<YearMonth>().is_err());
        assert!("2024--3".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_signed_months_are_not_dates() {
        let q = SearchQuery::new("+024-01", "2024-03", ["Injury"], "");
        assert_eq!(q.date_clause(), None);
        assert_eq!(q.term(), "(\"Injury\"[Journal])");
        assert!(matches!(q.validate(), Err(OrthoError::Validation(_))));
    }

    #[test]
    fn test_last_day_of_month() {
        let cases = [
            ("2024-02", ymd(2024, 2, 29)),
            ("2023-02", ymd(2023, 2, 28)),
            ("1900-02", ymd(1900, 2, 28)),
            ("2000-02", ymd(2000, 2, 29)),
            ("2024-04", ymd(2024, 4, 30)),
            ("2024-12", ymd(2024, 12, 31)),
        ];
        for (input, expected) in cases {
            let ym: YearMonth = input.parse().unwrap();
            assert_eq!(ym.last_day(), expected, "{}", input);
            assert_eq!(ym.first_day().day(), 1);
        }
    }

    #[test]
    fn test_date_clause_spans_whole_months() {
        let q = SearchQuery::new("2023-11", "2024-02", Vec::<String>::new(), "");
        assert_eq!(
            q.date_clause().unwrap(),
            "(\"2023/11/01\"[Date - Publication] : \"2024/02/29\"[Date - Publication])"
        );
    }

    #[test]
    fn test_full_term() {
        let q = SearchQuery::new(
            "2024-01",
            "2024-03",
            ["J Arthroplasty", "Injury"],
            "  hip fracture ",
        );
        assert_eq!(
            q.term(),
            "(\"J Arthroplasty\"[Journal] OR \"Injury\"[Journal]) AND \
             (\"2024/01/01\"[Date - Publication] : \"2024/03/31\"[Date - Publication]) AND \
             (hip fracture)"
        );
    }

    #[test]
    fn test_default_term_when_empty() {
        let q = SearchQuery::new("", "", Vec::<String>::new(), "   ");
        assert_eq!(q.term(), DEFAULT_TERM);
    }

    #[test]
    fn test_unparsable_dates_are_omitted() {
        let q = SearchQuery::new("2024/01", "2024-03", ["Injury"], "");
        assert_eq!(q.term(), "(\"Injury\"[Journal])");
    }

    #[test]
    fn test_journals_deduplicated() {
        let q = SearchQuery::new("2024-01", "2024-01", ["Injury", " Injury ", ""], "");
        assert_eq!(q.journals, vec!["Injury".to_string()]);
    }

    #[test]
    fn test_validate() {
        assert!(SearchQuery::new("2024-01", "2024-03", ["Injury"], "").validate().is_ok());
        assert!(SearchQuery::new("2024-01", "2024-01", ["Injury"], "").validate().is_ok());

        for q in [
            SearchQuery::new("", "2024-03", ["Injury"], ""),
            SearchQuery::new("2024-05", "2024-03", ["Injury"], ""),
            SearchQuery::new("2024-01", "2024-03", Vec::<String>::new(), ""),
            SearchQuery::new("2024-1x", "2024-03", ["Injury"], ""),
        ] {
            assert!(matches!(q.validate(), Err(OrthoError::Validation(_))), "{:?}", q);
        }
    }

    #[test]
    fn test_default_period() {
        let (start, end) = default_period(ymd(2026, 10, 18));
        assert_eq!(start.to_string(), "2025-10");
        assert_eq!(end.to_string(), "2026-10");
    }
}
