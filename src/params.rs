//! Article search parameters and their validation.
//!
//! [`SearchOptions`] is what a caller asks for; [`SearchQuery`] is what is
//! actually sent. Building the query clamps out-of-range pages, fills in
//! date defaults and rejects inconsistent input before any request is made.

use crate::error::ValidationError;
use chrono::{Local, NaiveDate};
use std::fmt;
use std::ops::Range;
use tracing::{instrument, warn};

/// First day of the comment archive, used as `begin_date` when sorting
/// oldest-first without an explicit range.
const ARCHIVE_START: &str = "20081031";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sort {
    #[default]
    Newest,
    Oldest,
}

impl Sort {
    pub fn as_str(self) -> &'static str {
        match self {
            Sort::Newest => "newest",
            Sort::Oldest => "oldest",
        }
    }

    /// Parse a sort order, falling back to [`Sort::Newest`] on anything unknown.
    pub fn parse_lenient(s: &str) -> Sort {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "latest" => Sort::Newest,
            "oldest" => Sort::Oldest,
            other => {
                warn!(sort = other, "Invalid value passed for sort; using newest");
                Sort::Newest
            }
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing search options, as loose as the command line that feeds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub page_lower: i32,
    pub page_upper: i32,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: String,
    pub query: Option<String>,
    pub filter_query: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page_lower: 0,
            page_upper: 30,
            begin_date: None,
            end_date: None,
            sort: Sort::Newest.as_str().to_string(),
            query: None,
            filter_query: None,
        }
    }
}

/// A validated article search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub api_key: String,
    pub page_lower: i32,
    pub page_upper: i32,
    pub begin_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort: Sort,
    pub query: Option<String>,
    pub filter_query: Option<String>,
}

impl SearchQuery {
    /// Validate `opts` against today's date.
    ///
    /// # Errors
    ///
    /// See [`SearchQuery::build_at`].
    pub fn build(
        api_key: &str,
        opts: &SearchOptions,
        max_page: i32,
    ) -> Result<Self, ValidationError> {
        Self::build_at(api_key, opts, max_page, Local::now().date_naive())
    }

    /// Validate `opts`, treating `today` as the current date.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::PageBounds`] if `page_lower > page_upper`
    /// - [`ValidationError::UnparseableDate`] if a date is in no known format
    /// - [`ValidationError::DateOrder`] if `begin_date` falls after `end_date`
    #[instrument(level = "debug", skip(api_key))]
    pub fn build_at(
        api_key: &str,
        opts: &SearchOptions,
        max_page: i32,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if opts.page_lower > opts.page_upper {
            return Err(ValidationError::PageBounds {
                lower: opts.page_lower,
                upper: opts.page_upper,
            });
        }

        let mut page_lower = opts.page_lower;
        if page_lower < 0 {
            warn!(page_lower, "Out of range value passed for page_lower; using 0");
            page_lower = 0;
        }
        let mut page_upper = opts.page_upper;
        if page_upper > max_page {
            warn!(page_upper, max_page, "Out of range value passed for page_upper; clamping");
            page_upper = max_page;
        }

        let sort = Sort::parse_lenient(&opts.sort);

        let mut begin_date = parse_date("begin_date", opts.begin_date.as_deref())?;
        let mut end_date = parse_date("end_date", opts.end_date.as_deref())?;

        if begin_date.is_none() && end_date.is_none() {
            match sort {
                Sort::Newest => end_date = Some(today),
                Sort::Oldest => begin_date = parse_date("begin_date", Some(ARCHIVE_START))?,
            }
        }

        if let (Some(begin), Some(end)) = (begin_date, end_date) {
            if begin > end {
                return Err(ValidationError::DateOrder {
                    begin: format_date(begin),
                    end: format_date(end),
                });
            }
        }

        Ok(Self {
            api_key: api_key.to_string(),
            page_lower,
            page_upper,
            begin_date,
            end_date,
            sort,
            query: opts.query.clone().filter(|q| !q.is_empty()),
            filter_query: opts.filter_query.clone().filter(|q| !q.is_empty()),
        })
    }

    /// Pages to request, upper bound exclusive.
    pub fn pages(&self) -> Range<i32> {
        self.page_lower..self.page_upper
    }

    /// Query-string pairs for one search page.
    pub fn to_params(&self, page: i32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api-key", self.api_key.clone()),
            ("sort", self.sort.as_str().to_string()),
        ];
        if let Some(d) = self.begin_date {
            params.push(("begin_date", format_date(d)));
        }
        if let Some(d) = self.end_date {
            params.push(("end_date", format_date(d)));
        }
        if let Some(q) = &self.query {
            params.push(("q", q.clone()));
        }
        if let Some(fq) = &self.filter_query {
            params.push(("fq", fq.clone()));
        }
        params.push(("page", page.to_string()));
        params
    }
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y%m%d").to_string()
}

fn parse_date(field: &'static str, value: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    ["%Y%m%d", "%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(Some)
        .ok_or_else(|| ValidationError::UnparseableDate {
            field,
            value: raw.to_string(),
        })
}
