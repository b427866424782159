//! CSV ingestion of daily price files into a [`PriceSeries`].
//!
//! Expected header (Yahoo Finance download format):
//! `Date,Open,High,Low,Close,Adj Close,Volume`

use crate::domain::{DateKey, PriceRow, PriceSeries};
use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("malformed CSV record at line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("bad date '{value}' at line {line}")]
    Date { line: u64, value: String },
}

/// One CSV line. Provider placeholders such as `null` become `None`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(rename = "High", deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(rename = "Low", deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(rename = "Close", deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(rename = "Adj Close", deserialize_with = "csv::invalid_option")]
    adj_close: Option<f64>,
    #[serde(rename = "Volume", deserialize_with = "csv::invalid_option")]
    volume: Option<i64>,
}

impl CsvRow {
    fn into_row(self) -> Option<PriceRow> {
        Some(PriceRow {
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
            adj_close: self.adj_close?,
            volume: self.volume?,
        })
    }
}

/// Parsed series plus the number of lines dropped for missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub series: PriceSeries,
    pub skipped: usize,
}

pub fn read_series_csv(path: &Path) -> Result<ImportReport, ImportError> {
    let reader = csv::Reader::from_path(path).map_err(|e| ImportError::Open {
        path: path.display().to_string(),
        source: e,
    })?;
    read_records(reader)
}

pub fn read_series<R: Read>(input: R) -> Result<ImportReport, ImportError> {
    read_records(csv::Reader::from_reader(input))
}

fn read_records<R: Read>(mut reader: csv::Reader<R>) -> Result<ImportReport, ImportError> {
    let mut series = PriceSeries::new();
    let mut skipped = 0;

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Record { line: 1, source: e })?
        .clone();

    // Quoted fields may span lines, so line numbers come from the reader.
    let mut raw = csv::StringRecord::new();
    while reader.read_record(&mut raw).map_err(|e| ImportError::Record {
        line: error_line(&e),
        source: e,
    })? {
        let line = raw.position().map_or(0, |p| p.line());
        let record: CsvRow = raw
            .deserialize(Some(&headers))
            .map_err(|e| ImportError::Record { line, source: e })?;

        let date = NaiveDate::parse_from_str(record.date.trim(), "%Y-%m-%d").map_err(|_| {
            ImportError::Date {
                line,
                value: record.date.clone(),
            }
        })?;
        let key = DateKey::from_date(date);

        match record.into_row() {
            Some(row) => {
                if series.insert(key, row).is_some() {
                    warn!(%key, "duplicate date in CSV, keeping the later line");
                }
            }
            None => skipped += 1,
        }
    }

    Ok(ImportReport { series, skipped })
}

fn error_line(err: &csv::Error) -> u64 {
    err.position().map_or(0, |p| p.line())
}
