//! Price row CSV format
//!
//! Header-driven, so column order may vary. Dates may carry a time part,
//! only the `YYYY-MM-DD` prefix is used.

use chrono::NaiveDate;
use switchyard_common::collaborators::PriceRow;
use switchyard_common::errors::{AppError, Result};

/// Columns written for every dataset, in file order
pub const COLUMNS: [&str; 6] = ["date", "open", "close", "high", "low", "volume"];

struct ColumnIndex {
    date: usize,
    open: usize,
    close: usize,
    high: usize,
    low: usize,
    volume: usize,
}

impl ColumnIndex {
    fn from_header(header: &[String]) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| invalid(format!("missing column '{}'", name)))
        };

        Ok(Self {
            date: find("date")?,
            open: find("open")?,
            close: find("close")?,
            high: find("high")?,
            low: find("low")?,
            volume: find("volume")?,
        })
    }
}

fn invalid(message: String) -> AppError {
    AppError::InvalidFormat {
        message: format!("csv: {}", message),
    }
}

fn split_line(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').to_string())
        .collect()
}

/// Header names of a CSV document, lowercased
pub fn header(text: &str) -> Vec<String> {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| split_line(l).into_iter().map(|h| h.to_lowercase()).collect())
        .unwrap_or_default()
}

fn field<'a>(fields: &'a [String], index: usize, line_no: usize) -> Result<&'a str> {
    fields
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| invalid(format!("line {}: too few fields", line_no)))
}

fn number(fields: &[String], index: usize, line_no: usize) -> Result<f64> {
    let raw = field(fields, index, line_no)?;
    raw.parse::<f64>()
        .map_err(|_| invalid(format!("line {}: bad number '{}'", line_no, raw)))
}

fn volume(fields: &[String], index: usize, line_no: usize) -> Result<u64> {
    let raw = field(fields, index, line_no)?;
    if let Ok(value) = raw.parse::<u64>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.is_finite() => Ok(value.round() as u64),
        _ => Err(invalid(format!("line {}: bad volume '{}'", line_no, raw))),
    }
}

fn date(fields: &[String], index: usize, line_no: usize) -> Result<NaiveDate> {
    let raw = field(fields, index, line_no)?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| invalid(format!("line {}: bad date '{}'", line_no, raw)))
}

/// Parse a CSV document into rows sorted by date
pub fn parse_rows(text: &str) -> Result<Vec<PriceRow>> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = split_line(header_line)
        .into_iter()
        .map(|h| h.to_lowercase())
        .collect();
    let index = ColumnIndex::from_header(&columns)?;

    let mut rows = Vec::new();
    for (i, line) in lines {
        let line_no = i + 1;
        let fields = split_line(line);
        rows.push(PriceRow {
            date: date(&fields, index.date, line_no)?,
            open: number(&fields, index.open, line_no)?,
            close: number(&fields, index.close, line_no)?,
            high: number(&fields, index.high, line_no)?,
            low: number(&fields, index.low, line_no)?,
            volume: volume(&fields, index.volume, line_no)?,
        });
    }

    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

/// Render rows with the standard header
pub fn write_rows(rows: &[PriceRow]) -> String {
    let mut out = COLUMNS.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            row.date.format("%Y-%m-%d"),
            row.open,
            row.close,
            row.high,
            row.low,
            row.volume
        ));
    }
    out
}
