//! Metric line tokenization.
//!
//! One line of check output carries three tokens: a dot-delimited bucket
//! path, a value, and a timestamp. Single- or double-quoted spans count as
//! one token with the quotes stripped. Lines that do not yield three tokens,
//! or whose timestamp is not numeric, are skipped by the caller.

use thiserror::Error;

/// Errors that cause a metric line to be skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("expected 3 tokens, found {found}")]
    TooFewTokens { found: usize },

    #[error("timestamp is not numeric: {token}")]
    InvalidTimestamp { token: String },
}

/// One tokenized metric line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Dot-delimited metric name.
    pub bucket_path: String,
    /// Value token, quotes stripped.
    pub value: String,
    /// Timestamp token, passed through to the wire verbatim.
    pub timestamp: String,
}

/// Parse one line of check output into its three tokens.
///
/// Tokens beyond the third are ignored.
pub fn parse_line(line: &str) -> Result<RawLine, LineError> {
    let mut tokens = tokenize(line);
    if tokens.len() < 3 {
        return Err(LineError::TooFewTokens {
            found: tokens.len(),
        });
    }
    tokens.truncate(3);

    let timestamp = tokens.pop().unwrap_or_default();
    let value = tokens.pop().unwrap_or_default();
    let bucket_path = tokens.pop().unwrap_or_default();

    if timestamp.parse::<f64>().is_err() {
        return Err(LineError::InvalidTimestamp { token: timestamp });
    }

    Ok(RawLine {
        bucket_path,
        value,
        timestamp,
    })
}

/// Render a value token for the wire: bare when numeric, double-quoted
/// otherwise.
///
/// A value is forced into string form when any configured `string_fields`
/// entry occurs as a substring of the line's bucket path.
pub fn render_value(token: &str, bucket_path: &str, string_fields: &[String]) -> String {
    let forced_string = string_fields
        .iter()
        .any(|field| bucket_path.contains(field.as_str()));

    if !forced_string && token.parse::<f64>().is_ok() {
        token.to_string()
    } else {
        format!("\"{token}\"")
    }
}

/// Split a line into tokens, treating quoted spans as single tokens.
///
/// An unterminated quote falls back to plain whitespace splitting, quote
/// character included.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = line.trim_start();

    while !rest.is_empty() {
        let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"');

        if let Some(quote) = quote {
            if let Some(end) = rest[quote.len_utf8()..].find(quote) {
                let start = quote.len_utf8();
                tokens.push(rest[start..start + end].to_string());
                rest = rest[start + end + quote.len_utf8()..].trim_start();
                continue;
            }
        }

        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        tokens.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }

    tokens
}
