//! Dividends table parser
//!
//! Locates the dividends table in a page by its headers and turns each body row
//! into a [`DividendRecord`]. A page without a usable table is an error for the
//! whole page; a single malformed row is logged, counted and skipped.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use super::DividendRecord;

/// Date layouts seen in upstream ex-date cells
const EX_DATE_FORMATS: [&str; 4] = ["%d-%b-%Y", "%d %b %Y", "%d %B %Y", "%d/%m/%Y"];

/// Errors that can occur when parsing a dividends page
#[derive(Debug, Error)]
pub enum ParseError {
    /// No table on the page has both Amount and Franking columns
    #[error("No dividends table with Amount and Franking columns found")]
    MissingTable,

    /// The dividends table has no recognisable ex-date column
    #[error("Dividends table has no ex-date column")]
    MissingExDateColumn,

    /// A row has fewer cells than the columns we read
    #[error("Row has {found} cells, expected at least {expected}")]
    ShortRow { found: usize, expected: usize },

    /// The ex-date cell matched none of the known layouts
    #[error("Unrecognised ex-date: '{0}'")]
    InvalidDate(String),

    /// The amount cell holds no number
    #[error("Unrecognised amount: '{0}'")]
    InvalidAmount(String),

    /// A built-in selector or pattern failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

/// Records extracted from a single page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DividendTable {
    /// Rows that parsed cleanly
    pub records: Vec<DividendRecord>,
    /// Number of rows skipped as malformed
    pub skipped: usize,
}

/// Column positions within the dividends table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    ex_date: usize,
    amount: usize,
    franking: usize,
}

impl Columns {
    /// Finds the columns we need from lower-cased header texts
    fn from_headers(headers: &[String]) -> Result<Self, ParseError> {
        let position = |name: &str| headers.iter().position(|h| header_is(h, name));

        let amount = position("amount").ok_or(ParseError::MissingTable)?;
        let franking = position("franking").ok_or(ParseError::MissingTable)?;
        let ex_date = headers
            .iter()
            .position(|h| h.contains("ex") && (h.contains("date") || h.contains("dividend")))
            .ok_or(ParseError::MissingExDateColumn)?;

        Ok(Self {
            ex_date,
            amount,
            franking,
        })
    }

    /// Minimum number of cells a row needs
    fn width(&self) -> usize {
        self.ex_date.max(self.amount).max(self.franking) + 1
    }
}

/// Compiled selectors and the numeric cleaning pattern
struct TableParser {
    table: Selector,
    header: Selector,
    row: Selector,
    cell: Selector,
    non_numeric: Regex,
}

impl TableParser {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            table: selector("table")?,
            header: selector("th")?,
            row: selector("tbody tr")?,
            cell: selector("td")?,
            non_numeric: Regex::new(r"[^0-9.]").map_err(|e| ParseError::Pattern {
                pattern: r"[^0-9.]".to_string(),
                message: e.to_string(),
            })?,
        })
    }

    /// Returns the first table carrying Amount and Franking headers
    fn dividends_table<'a>(&self, document: &'a Html) -> Option<(ElementRef<'a>, Vec<String>)> {
        document.select(&self.table).find_map(|table| {
            let headers: Vec<String> = table
                .select(&self.header)
                .map(|th| cell_text(th).to_lowercase())
                .collect();
            let has = |name: &str| headers.iter().any(|h| header_is(h, name));

            (has("amount") && has("franking")).then_some((table, headers))
        })
    }

    /// Parses one body row
    fn record(&self, cells: &[String], columns: Columns) -> Result<DividendRecord, ParseError> {
        if cells.len() < columns.width() {
            return Err(ParseError::ShortRow {
                found: cells.len(),
                expected: columns.width(),
            });
        }

        let ex_text = &cells[columns.ex_date];
        let ex_date =
            parse_ex_date(ex_text).ok_or_else(|| ParseError::InvalidDate(ex_text.clone()))?;

        let amount_text = &cells[columns.amount];
        let amount = self
            .number(amount_text)
            .ok_or_else(|| ParseError::InvalidAmount(amount_text.clone()))?;

        // Blank or "-" franking cells mean unfranked
        let franking_pct = self.number(&cells[columns.franking]).unwrap_or(0.0);

        Ok(DividendRecord {
            ex_date,
            amount,
            franking_pct,
        })
    }

    /// Strips currency symbols, percent signs and separators, then parses
    fn number(&self, text: &str) -> Option<f64> {
        let cleaned = self.non_numeric.replace_all(text, "");
        cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// Parses a dividends page into records
///
/// # Returns
/// * `Ok(DividendTable)` - Parsed records plus a count of skipped rows
/// * `Err(ParseError)` - If the page has no usable dividends table
pub fn parse_dividends(html: &str) -> Result<DividendTable, ParseError> {
    let parser = TableParser::new()?;
    let document = Html::parse_document(html);

    let (table, headers) = parser
        .dividends_table(&document)
        .ok_or(ParseError::MissingTable)?;
    let columns = Columns::from_headers(&headers)?;
    debug!(?columns, "located dividends table");

    let mut parsed = DividendTable::default();
    for (index, row) in table.select(&parser.row).enumerate() {
        let cells: Vec<String> = row.select(&parser.cell).map(cell_text).collect();

        // Header-only rows inside tbody carry no td cells
        if cells.is_empty() {
            continue;
        }

        match parser.record(&cells, columns) {
            Ok(record) => parsed.records.push(record),
            Err(error) => {
                warn!(row = index + 1, %error, "skipping malformed dividend row");
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

/// Parses an ex-date cell using any of the known layouts
pub fn parse_ex_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    EX_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Matches `amount`, `amount ($)`, `franking %` and similar decorated headers
fn header_is(header: &str, name: &str) -> bool {
    match header.strip_prefix(name) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

/// Cell text with whitespace collapsed
fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Pattern {
        pattern: css.to_string(),
        message: e.to_string(),
    })
}
