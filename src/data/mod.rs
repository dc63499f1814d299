//! Upstream dividend data for franking refreshes
//!
//! This module contains the HTTP source for dividend pages, the HTML table
//! parser that turns a page into dividend records, and the trailing-12-month
//! franking calculation applied to those records.

pub mod franking;
pub mod parse;
pub mod source;

pub use franking::{weighted_franking, FrankingSummary};
pub use parse::{parse_dividends, DividendTable, ParseError};
pub use source::{DividendSource, FetchError, DEFAULT_SOURCE_URL};

use chrono::NaiveDate;

/// Longest ASX code accepted after normalisation
const MAX_CODE_LEN: usize = 6;

/// One row of an upstream dividends table
#[derive(Debug, Clone, PartialEq)]
pub struct DividendRecord {
    /// Ex-dividend date
    pub ex_date: NaiveDate,
    /// Cash amount per share
    pub amount: f64,
    /// Franking percentage (0-100)
    pub franking_pct: f64,
}

/// Normalises a user-supplied ticker into a cache key.
///
/// `vhy`, ` VHY ` and `vhy.ax` all become `VHY`. Returns `None` for empty
/// input or anything that isn't a plain alphanumeric ASX code.
pub fn normalise_code(raw: &str) -> Option<String> {
    let upper = raw.trim().to_ascii_uppercase();
    let code = upper.strip_suffix(".AX").unwrap_or(&upper);

    let valid = !code.is_empty()
        && code.len() <= MAX_CODE_LEN
        && code.chars().all(|c| c.is_ascii_alphanumeric());

    valid.then(|| code.to_string())
}
