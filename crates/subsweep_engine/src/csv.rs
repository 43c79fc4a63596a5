//! The subscriptions table: a header row plus one row per channel.
//!
//! Every field is written quoted with embedded quotes doubled, so commas,
//! quotes and line breaks inside a description survive a round trip.

use std::collections::HashSet;

use subsweep_core::{normalize_channel_url, ChannelRecord, ChannelTarget};
use thiserror::Error;

pub const CSV_HEADERS: [&str; 6] = [
    "channel_name",
    "channel_url",
    "subscriber_count",
    "description",
    "unsubscribe",
    "date_collected",
];

const REQUIRED_HEADERS: [&str; 3] = ["channel_name", "channel_url", "unsubscribe"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvError {
    #[error("the file has no header row")]
    Empty,
    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("quoted field opened on line {line} is never closed")]
    UnterminatedQuote { line: usize },
}

pub fn write_records(records: &[ChannelRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADERS.join(","));
    for record in records {
        let fields = [
            &record.channel_name,
            &record.channel_url,
            &record.subscriber_count,
            &record.description,
            &record.unsubscribe,
            &record.date_collected,
        ];
        let row: Vec<String> = fields.iter().map(|field| quote(field)).collect();
        lines.push(row.join(","));
    }
    lines.join("\n")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Parses a table written by [`write_records`] or edited in a spreadsheet.
///
/// Columns are matched by header name, so reordered or extra columns are fine.
/// Fields are kept verbatim; blank lines are skipped.
pub fn parse_records(text: &str) -> Result<Vec<ChannelRecord>, CsvError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = parse_rows(text)?.into_iter();
    let header = rows.next().ok_or(CsvError::Empty)?;
    let columns = ColumnMap::new(&header)?;
    Ok(rows.map(|row| columns.record(&row)).collect())
}

/// Rows marked for unsubscription, as job targets.
///
/// Rows without a URL are skipped and later duplicates of the same channel
/// (compared by normalized URL) are dropped, keeping file order.
pub fn select_targets(records: &[ChannelRecord]) -> Vec<ChannelTarget> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| record.wants_unsubscribe())
        .filter(|record| !record.channel_url.trim().is_empty())
        .filter(|record| seen.insert(normalize_channel_url(&record.channel_url)))
        .map(ChannelRecord::to_target)
        .collect()
}

struct ColumnMap {
    indices: [Option<usize>; 6],
}

impl ColumnMap {
    fn new(header: &[String]) -> Result<Self, CsvError> {
        let position = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };
        for required in REQUIRED_HEADERS {
            if position(required).is_none() {
                return Err(CsvError::MissingColumn(required));
            }
        }
        Ok(Self {
            indices: CSV_HEADERS.map(position),
        })
    }

    fn record(&self, row: &[String]) -> ChannelRecord {
        let field = |slot: usize| {
            self.indices[slot]
                .and_then(|index| row.get(index))
                .cloned()
                .unwrap_or_default()
        };
        ChannelRecord {
            channel_name: field(0),
            channel_url: field(1),
            subscriber_count: field(2),
            description: field(3),
            unsubscribe: field(4),
            date_collected: field(5),
        }
    }
}

fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0;
    let mut line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(ch);
                }
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                line += 1;
                row.push(std::mem::take(&mut field));
                push_row(&mut rows, std::mem::take(&mut row));
            }
            _ => field.push(ch),
        }
    }
    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        push_row(&mut rows, row);
    }
    Ok(rows)
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    let blank = row.len() == 1 && row[0].trim().is_empty();
    if !blank {
        rows.push(row);
    }
}
