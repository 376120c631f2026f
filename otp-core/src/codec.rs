// File:    codec.rs
// Author:  apezoo
// Date:    2026-10-19
//
// Description: Delimited record format for messages: field escaping, quote-aware splitting and receipt stamping.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Encoding and decoding of message records.
//!
//! A record is a comma-delimited line. A field containing the delimiter, a
//! quote or a newline is wrapped in quotes with its inner quotes doubled;
//! every other field is written as-is. [`decode`] inverts [`encode`] exactly.

use chrono::NaiveDateTime;

/// Field separator.
pub const DELIMITER: char = ',';
/// Quote character used to wrap fields that need escaping.
pub const QUOTE: char = '"';
/// Number of fields a sender writes.
pub const RECORD_FIELDS: usize = 4;
/// Index of the latitude field.
pub const LATITUDE: usize = 1;
/// Index of the longitude field.
pub const LONGITUDE: usize = 2;
/// Format of the receipt timestamp appended by the receiver.
pub const RECEIPT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// The four logical fields of a message as sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// Message category, e.g. `Alert`.
    pub category: String,
    /// Latitude as decimal text.
    pub latitude: String,
    /// Longitude as decimal text.
    pub longitude: String,
    /// Free-form text.
    pub info: String,
}

impl Record {
    /// Builds a record from its four fields.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        info: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            info: info.into(),
        }
    }

    /// Encodes the record as one delimited line.
    #[must_use]
    pub fn encode(&self) -> String {
        encode(&self.category, &self.latitude, &self.longitude, &self.info)
    }

    /// Reads the first four fields of a decoded line back into a record.
    ///
    /// Returns `None` if the line has fewer than four fields.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let mut fields = decode(line).into_iter();
        Some(Self {
            category: fields.next()?,
            latitude: fields.next()?,
            longitude: fields.next()?,
            info: fields.next()?,
        })
    }
}

/// Escapes a single field for the delimited format.
#[must_use]
pub fn escape_field(field: &str) -> String {
    if field.contains([DELIMITER, QUOTE, '\n']) {
        let doubled = field.replace(QUOTE, "\"\"");
        format!("{QUOTE}{doubled}{QUOTE}")
    } else {
        field.to_owned()
    }
}

/// Escapes every field and joins them with the delimiter.
#[must_use]
pub fn encode_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        line.push_str(&escape_field(field.as_ref()));
    }
    line
}

/// Encodes the four message fields as one delimited line.
#[must_use]
pub fn encode(category: &str, latitude: &str, longitude: &str, info: &str) -> String {
    encode_fields([category, latitude, longitude, info])
}

/// Splits a delimited line into its unescaped fields.
///
/// Delimiters inside quotes are literal, and a doubled quote inside a quoted
/// field yields one literal quote. Always returns at least one field.
#[must_use]
pub fn decode(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            QUOTE if in_quotes => {
                if chars.peek() == Some(&QUOTE) {
                    current.push(QUOTE);
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            QUOTE => in_quotes = true,
            DELIMITER if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Appends a receipt timestamp as a new trailing field.
///
/// The line is decoded and re-encoded, so fields that needed escaping stay
/// escaped.
#[must_use]
pub fn append_receipt(line: &str, received_at: NaiveDateTime) -> String {
    let mut fields = decode(line);
    fields.push(received_at.format(RECEIPT_FORMAT).to_string());
    encode_fields(&fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(
            encode("Alert", "40.7128", "-74.0060", "Target secure"),
            "Alert,40.7128,-74.0060,Target secure"
        );
    }

    #[test]
    fn special_fields_are_quoted_and_doubled() {
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_field(""), "");
    }

    #[test]
    fn decode_handles_quotes_and_delimiters() {
        let fields = decode("Info,1.0,2.0,\"hello, \"\"world\"\"\"");
        assert_eq!(fields, vec!["Info", "1.0", "2.0", "hello, \"world\""]);
    }

    #[test]
    fn lone_quote_survives() {
        let line = encode("\"", "1", "2", "");
        assert_eq!(decode(&line), vec!["\"", "1", "2", ""]);
    }

    #[test]
    fn empty_line_is_one_empty_field() {
        assert_eq!(decode(""), vec![String::new()]);
        assert_eq!(decode(",,,"), vec!["", "", "", ""]);
    }

    #[test]
    fn receipt_is_appended_and_escaping_kept() {
        let at = NaiveDate::from_ymd_opt(2025, 7, 17)
            .unwrap()
            .and_hms_milli_opt(9, 30, 5, 42)
            .unwrap();
        let stamped = append_receipt("\"a,b\",1,2,x", at);
        assert_eq!(stamped, "\"a,b\",1,2,x,2025-07-17 09:30:05.042");
        assert_eq!(decode(&stamped)[0], "a,b");
    }

    #[test]
    fn record_from_line_needs_four_fields() {
        let record = Record::from_line("Alert,1,2,hi,extra").unwrap();
        assert_eq!(record, Record::new("Alert", "1", "2", "hi"));
        assert!(Record::from_line("Alert,1,2").is_none());
    }
}
