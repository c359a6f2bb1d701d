//! Tabular (CSV) decoding for imports.
//!
//! Comma-delimited, double-quote quoting with `""` escapes, quoted fields may span
//! lines, LF or CRLF endings, optional UTF-8 BOM. The first non-blank record is the
//! header; blank lines are skipped everywhere.

use crate::core::error::KipsError;
use std::collections::BTreeMap;

/// One decoded data row, keyed by normalized (trimmed, lower-cased) header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    /// 1-based line number the record starts on
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl TableRow {
    /// Field value by normalized column name, empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .get(&normalize_header(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

struct Record {
    line: usize,
    fields: Vec<String>,
}

impl Record {
    fn is_blank(&self) -> bool {
        self.fields.len() == 1 && self.fields[0].trim().is_empty()
    }
}

/// Split raw text into records of raw field values.
fn split_records(input: &str) -> Result<Vec<Record>, KipsError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut records = Vec::new();
    let mut chars = input.chars().peekable();

    let mut line = 1;
    let mut record_line = 1;
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0;
    let mut after_quote = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => {
                    in_quotes = false;
                    after_quote = true;
                }
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut field));
                after_quote = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(std::mem::take(&mut field));
                records.push(Record {
                    line: record_line,
                    fields: std::mem::take(&mut fields),
                });
                after_quote = false;
                line += 1;
                record_line = line;
            }
            ' ' | '\t' if after_quote => {}
            _ if after_quote => {
                return Err(KipsError::parse(
                    line,
                    format!("unexpected character '{}' after closing quote", c),
                ));
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quote_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(KipsError::parse(quote_line, "unterminated quoted field"));
    }
    if !field.is_empty() || !fields.is_empty() || after_quote {
        fields.push(field);
        records.push(Record {
            line: record_line,
            fields,
        });
    }
    Ok(records)
}

/// Decode CSV text into a header and normalized rows.
///
/// Rows shorter than the header are padded with empty strings; longer rows are an error.
pub fn parse_table(input: &str) -> Result<Table, KipsError> {
    let mut records = split_records(input)?
        .into_iter()
        .filter(|r| !r.is_blank());

    let header = records
        .next()
        .ok_or_else(|| KipsError::parse(1, "missing header row"))?;
    let headers: Vec<String> = header.fields.iter().map(|h| normalize_header(h)).collect();
    for (i, name) in headers.iter().enumerate() {
        if headers[..i].contains(name) && !name.is_empty() {
            return Err(KipsError::parse(
                header.line,
                format!("duplicate column '{}'", name),
            ));
        }
    }

    let mut rows = Vec::new();
    for record in records {
        if record.fields.len() > headers.len() {
            return Err(KipsError::parse(
                record.line,
                format!(
                    "row has {} fields but the header has {}",
                    record.fields.len(),
                    headers.len()
                ),
            ));
        }
        let mut fields = BTreeMap::new();
        for (i, name) in headers.iter().enumerate() {
            let value = record.fields.get(i).cloned().unwrap_or_default();
            fields.insert(name.clone(), value);
        }
        rows.push(TableRow {
            line: record.line,
            fields,
        });
    }

    Ok(Table { headers, rows })
}
