//! Utility functions shared by the CSV supplier/sink and the config layer.
//!
//! The CSV helpers implement the subset of RFC 4180 the result tables need:
//! comma separators, double-quoted fields with `""` escapes, quoted line
//! breaks, and CRLF or LF record endings.

use crate::config::MAX_TIMEOUT_SECS;
use std::borrow::Cow;

/// Split CSV text into records.
///
/// A leading UTF-8 byte order mark is ignored. Blank lines produce no record.
///
/// # Arguments
///
/// * `content` - Whole file contents
///
/// # Returns
///
/// One `Vec<String>` per record, fields unquoted.
pub fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => finish_record(&mut records, &mut record, &mut field),
            _ => field.push(c),
        }
    }
    finish_record(&mut records, &mut record, &mut field);

    records
}

fn finish_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
    if record.is_empty() && field.is_empty() {
        return;
    }
    record.push(std::mem::take(field));
    records.push(std::mem::take(record));
}

/// Quote a field if it contains a separator, quote or line break.
pub fn escape_csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Join fields into one CSV line (without the line ending).
pub fn format_csv_record<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| escape_csv_field(f.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse timeout string like "5s", "30s", "2m" into seconds.
///
/// A bare number is taken as seconds. Zero, overflowing values and anything
/// above `MAX_TIMEOUT_SECS` are rejected.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let secs = if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.trim().parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.trim().parse::<u64>().ok()?.checked_mul(60)
    } else {
        timeout_str.parse::<u64>().ok()
    }?;

    (1..=MAX_TIMEOUT_SECS).contains(&secs).then_some(secs)
}
