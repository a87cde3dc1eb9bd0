//! Price CSV parser
//!
//! # File Format
//!
//! ```text
//! # lines starting with '#' are comments
//! name,category,price,date            <- header, never validated
//! Widget,Tools,9.99,2024-01-15
//! Gadget,Tools,19.50,2024-02-01,extra <- trailing columns are ignored
//! ```
//!
//! Columns are positional. Any invalid row fails the whole parse; callers
//! never see a partial batch.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use prices_common::types::{IngestBatch, PriceRecord, DATE_FORMAT};
use prices_common::RecordError;
use thiserror::Error;
use tracing::debug;

/// Lines starting with this byte are skipped before field splitting.
pub const COMMENT_MARKER: u8 = b'#';

const NAME_COLUMN: usize = 0;
const CATEGORY_COLUMN: usize = 1;
const PRICE_COLUMN: usize = 2;
const DATE_COLUMN: usize = 3;
const REQUIRED_COLUMNS: usize = 4;

/// PostgreSQL NUMERIC limits: digits before and after the decimal point.
const MAX_PRICE_INTEGER_DIGITS: i64 = 131_072;
const MAX_PRICE_SCALE: i64 = 16_383;

/// Row-level parse failures. Line numbers are 1-based.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("CSV input has no header row")]
    MissingHeader,

    #[error("line {line}: expected at least 4 columns, found {found}")]
    MissingField { line: u64, found: usize },

    #[error("line {line}: invalid price '{value}'")]
    InvalidPrice { line: u64, value: String },

    #[error("line {line}: invalid manufacture date '{value}', expected YYYY-MM-DD")]
    InvalidDate { line: u64, value: String },

    #[error("line {line}: {source}")]
    InvalidRecord { line: u64, source: RecordError },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to open CSV payload: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Line of the offending row, when the failure is tied to one.
    pub fn line(&self) -> Option<u64> {
        match self {
            ParseError::MissingField { line, .. }
            | ParseError::InvalidPrice { line, .. }
            | ParseError::InvalidDate { line, .. }
            | ParseError::InvalidRecord { line, .. } => Some(*line),
            ParseError::Csv(e) => e.position().map(|p| p.line()),
            ParseError::MissingHeader | ParseError::Io(_) => None,
        }
    }
}

/// Lazily parsed records. Can only be consumed once.
pub struct RecordStream<R> {
    rows: StringRecordsIntoIter<R>,
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<PriceRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.map_err(ParseError::from).and_then(|row| parse_row(&row)))
    }
}

/// Consume the header row and return a stream over the data rows.
pub fn parse<R: Read>(source: R) -> Result<RecordStream<R>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(COMMENT_MARKER))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let header = reader.headers()?;
    if header.is_empty() {
        return Err(ParseError::MissingHeader);
    }
    debug!(columns = header.len(), "Skipped CSV header");

    Ok(RecordStream {
        rows: reader.into_records(),
    })
}

/// Parse everything or nothing.
pub fn parse_batch<R: Read>(source: R) -> Result<IngestBatch, ParseError> {
    parse(source)?.collect()
}

pub fn parse_file(path: &Path) -> Result<IngestBatch, ParseError> {
    let file = File::open(path)?;
    let batch = parse_batch(file)?;
    debug!(path = %path.display(), rows = batch.len(), "Parsed CSV payload");
    Ok(batch)
}

fn parse_row(row: &StringRecord) -> Result<PriceRecord, ParseError> {
    let line = row.position().map(|p| p.line()).unwrap_or_default();

    if row.len() < REQUIRED_COLUMNS {
        return Err(ParseError::MissingField {
            line,
            found: row.len(),
        });
    }

    let price_field = &row[PRICE_COLUMN];
    let price = BigDecimal::from_str(price_field)
        .ok()
        .filter(price_fits_numeric)
        .ok_or_else(|| ParseError::InvalidPrice {
            line,
            value: price_field.to_string(),
        })?;

    let date_field = &row[DATE_COLUMN];
    let manufacture_date = parse_date(date_field).ok_or_else(|| ParseError::InvalidDate {
        line,
        value: date_field.to_string(),
    })?;

    PriceRecord::new(
        &row[NAME_COLUMN],
        &row[CATEGORY_COLUMN],
        price,
        manufacture_date,
    )
    .map_err(|source| ParseError::InvalidRecord { line, source })
}

// Exponent notation can describe values with millions of digits.
fn price_fits_numeric(price: &BigDecimal) -> bool {
    let scale = price.fractional_digit_count();
    let integer_digits = (price.digits() as i64).saturating_sub(scale);
    scale <= MAX_PRICE_SCALE && integer_digits <= MAX_PRICE_INTEGER_DIGITS
}

// chrono accepts unpadded fields for %m/%d, so the shape is checked first.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_valid_batch() {
        let input = "name,category,price,date\n\
                     Widget,Tools,9.99,2024-01-15\n\
                     Gadget,Tools,19.50,2024-02-01\n";

        let batch = parse_batch(input.as_bytes()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].name, "Widget");
        assert_eq!(batch[0].category, "Tools");
        assert_eq!(batch[0].price, dec("9.99"));
        assert_eq!(
            batch[1].manufacture_date,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_header_is_not_validated() {
        let input = "whatever,goes,here\nWidget,Tools,1.00,2024-01-15\n";
        let batch = parse_batch(input.as_bytes()).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_comments_and_extra_columns() {
        let input = "# exported by the warehouse\n\
                     name,category,price,date\n\
                     # discontinued items below\n\
                     Widget,Tools,9.99,2024-01-15,in stock,aisle 4\n";

        let batch = parse_batch(input.as_bytes()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].name, "Widget");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let input = "name,category,price,date\n Widget , Tools , 9.99 , 2024-01-15 \n";
        let batch = parse_batch(input.as_bytes()).unwrap();
        assert_eq!(batch[0].name, "Widget");
        assert_eq!(batch[0].price, dec("9.99"));
    }

    #[test]
    fn test_header_only_gives_empty_batch() {
        let batch = parse_batch("name,category,price,date\n".as_bytes()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(matches!(
            parse_batch("".as_bytes()),
            Err(ParseError::MissingHeader)
        ));
    }

    #[test]
    fn test_bad_price_fails_whole_batch() {
        let input = "name,category,price,date\n\
                     Widget,Tools,9.99,2024-01-15\n\
                     Freebie,Promo,free,2024-01-16\n\
                     Gadget,Tools,19.50,2024-02-01\n";

        let err = parse_batch(input.as_bytes()).unwrap_err();
        match &err {
            ParseError::InvalidPrice { line, value } => {
                assert_eq!(*line, 3);
                assert_eq!(value, "free");
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_oversized_exponents_are_rejected() {
        for huge in ["1e20000000", "1e-20000000", "5E131073"] {
            let input = format!("h\nWidget,Tools,9.99,2024-01-15\nHuge,Tools,{huge},2024-01-15\n");
            match parse_batch(input.as_bytes()) {
                Err(ParseError::InvalidPrice { line, value }) => {
                    assert_eq!(line, 3);
                    assert_eq!(value, huge);
                },
                other => panic!("{huge} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_small_exponents_are_accepted() {
        let input = "h\nWidget,Tools,1.5e2,2024-01-15\nBolt,Hardware,25E-2,2024-01-15\n";
        let batch = parse_batch(input.as_bytes()).unwrap();
        assert_eq!(batch[0].price, dec("150"));
        assert_eq!(batch[1].price, dec("0.25"));
    }

    #[test]
    fn test_bad_dates() {
        for bad in ["2024/01/15", "15-01-2024", "2024-1-5", "2024-02-30", "yesterday"] {
            let input = format!("h\nWidget,Tools,1.00,{bad}\n");
            assert!(
                matches!(parse_batch(input.as_bytes()), Err(ParseError::InvalidDate { line: 2, .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_short_row() {
        let input = "h\nWidget,Tools,1.00\n";
        assert!(matches!(
            parse_batch(input.as_bytes()),
            Err(ParseError::MissingField { line: 2, found: 3 })
        ));
    }

    #[test]
    fn test_record_invariants_are_enforced() {
        let negative = "h\nWidget,Tools,-1.00,2024-01-15\n";
        assert!(matches!(
            parse_batch(negative.as_bytes()),
            Err(ParseError::InvalidRecord {
                source: RecordError::NegativePrice(_),
                ..
            })
        ));

        let unnamed = "h\n,Tools,1.00,2024-01-15\n";
        assert!(matches!(
            parse_batch(unnamed.as_bytes()),
            Err(ParseError::InvalidRecord {
                source: RecordError::EmptyName,
                ..
            })
        ));
    }

    #[test]
    fn test_stream_is_lazy() {
        let input = "h\nWidget,Tools,1.00,2024-01-15\nBroken,Tools,x,2024-01-15\n";
        let mut stream = parse(input.as_bytes()).unwrap();
        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }
}
