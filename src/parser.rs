use csv::ReaderBuilder;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::ParseError, record::RawRecord};

/// How the delimited text is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub has_headers: bool,
    pub skip_empty_lines: bool,
    pub delimiter: char,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            has_headers: true,
            skip_empty_lines: true,
            delimiter: ',',
        }
    }
}

/// Turns delimited text into `RawRecord`s.
///
/// Cells are kept as raw text, whether they hold a valid number is decided when encoding. Rows
/// shorter than the header simply lack the trailing fields. Without a header row the fields are
/// named after their zero-based column index.
#[derive(Debug, Clone)]
pub struct RecordParser {
    options: ParseOptions,
    delimiter: u8,
}

impl RecordParser {
    /// Creates a new `RecordParser`.
    ///
    /// # Returns
    /// An error if the delimiter isn't a single ASCII character.
    pub fn new(options: ParseOptions) -> Result<Self, ParseError> {
        let delimiter = options.delimiter;
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
            return Err(ParseError::InvalidDelimiter(delimiter));
        }

        Ok(Self {
            options,
            delimiter: delimiter as u8,
        })
    }

    /// Parses UTF-8 encoded bytes.
    pub fn parse_bytes(&self, raw: &[u8]) -> Result<Vec<RawRecord>, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|e| ParseError::Encoding {
            offset: e.valid_up_to(),
        })?;

        self.parse(text)
    }

    /// Parses the whole text.
    ///
    /// # Returns
    /// The records in input order, or an error if the text is structurally malformed.
    pub fn parse(&self, raw: &str) -> Result<Vec<RawRecord>, ParseError> {
        check_quotes(raw, self.delimiter)?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(raw.as_bytes());

        let mut rows = reader.records();
        let headers: Option<Vec<String>> = if self.options.has_headers {
            match rows.next() {
                Some(row) => Some(row?.iter().map(|h| h.to_string()).collect()),
                None => return Ok(Vec::new()),
            }
        } else {
            None
        };

        let mut records = Vec::new();

        for row in rows {
            let row = row?;

            if self.options.skip_empty_lines && row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let mut record = RawRecord::new();

            for (i, cell) in row.iter().enumerate() {
                match &headers {
                    Some(headers) => match headers.get(i) {
                        Some(name) => record.insert(name.as_str(), cell),
                        None => debug!(
                            "ignoring cell {i} of line {:?}, past the header",
                            row.position().map(|p| p.line())
                        ),
                    },
                    None => record.insert(i.to_string(), cell),
                }
            }

            records.push(record);
        }

        Ok(records)
    }
}

/// Parses `raw` with a one-off parser.
pub fn parse(raw: &str, options: ParseOptions) -> Result<Vec<RawRecord>, ParseError> {
    RecordParser::new(options)?.parse(raw)
}

/// Looks for a quoted field that never gets closed. A quote only opens a field when it's the
/// field's first character, a doubled quote inside a quoted field is an escaped one.
fn check_quotes(raw: &str, delimiter: u8) -> Result<(), ParseError> {
    let mut line = 1;
    let mut opened_at = 0;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut bytes = raw.bytes().peekable();

    while let Some(b) = bytes.next() {
        if in_quotes {
            match b {
                b'"' if bytes.peek() == Some(&b'"') => {
                    bytes.next();
                }
                b'"' => in_quotes = false,
                b'\n' => line += 1,
                _ => {}
            }

            continue;
        }

        match b {
            b'"' if field_start => {
                in_quotes = true;
                opened_at = line;
            }
            b'\n' => {
                line += 1;
                field_start = true;
            }
            b'\r' => field_start = true,
            _ if b == delimiter => field_start = true,
            _ => field_start = false,
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote { line: opened_at });
    }

    Ok(())
}
