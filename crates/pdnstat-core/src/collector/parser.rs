//! Parser for the reply to `show *`.
//!
//! Format: `key=value` pairs separated by `,`, with a mandatory trailing `,`.
//! Servers usually end the reply with `,\n`.
//! Example: `corrupt-packets=0,latency=26,uptime=86317,\n`

use std::str::Utf8Error;

use thiserror::Error;

use crate::metric::FieldSet;

/// Separates `key=value` pairs.
pub const PAIR_DELIMITER: char = ',';

/// Separates a key from its value. Only the first occurrence counts.
pub const VALUE_DELIMITER: char = '=';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("segment {segment:?} has no '=' delimiter")]
    MissingDelimiter { segment: String },

    #[error("segment {segment:?} has an empty field name")]
    EmptyKey { segment: String },

    #[error("field {key:?} has non-integer value {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("field {key:?} appears more than once")]
    DuplicateField { key: String },

    #[error("response is not terminated by ',' (trailing {trailing:?})")]
    MissingTerminator { trailing: String },

    #[error("response is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),
}

/// Decodes raw response bytes and parses them.
pub fn parse_bytes(raw: &[u8]) -> Result<FieldSet, ParseError> {
    let text = std::str::from_utf8(raw)?;
    parse_response(text)
}

/// Parses a `show *` reply into a field set.
///
/// Walks the text one `,`-terminated segment at a time. Whatever follows the
/// last `,` must be blank and is discarded. An empty reply, or one made of
/// the terminator alone, yields an empty field set.
///
/// The result is all-or-nothing: the first malformed segment fails the whole
/// parse.
pub fn parse_response(text: &str) -> Result<FieldSet, ParseError> {
    let mut fields = FieldSet::new();

    let body = text.trim_end();
    if body.is_empty() || body == "," {
        return Ok(fields);
    }

    let mut rest = text;
    while let Some(end) = rest.find(PAIR_DELIMITER) {
        let (key, value) = parse_segment(&rest[..end])?;
        if fields.contains_key(key) {
            return Err(ParseError::DuplicateField {
                key: key.to_string(),
            });
        }
        fields.insert(key.to_string(), value);
        rest = &rest[end + PAIR_DELIMITER.len_utf8()..];
    }

    if !rest.trim().is_empty() {
        return Err(ParseError::MissingTerminator {
            trailing: rest.to_string(),
        });
    }

    Ok(fields)
}

/// Splits one segment on the first `=` and parses the value as `i64`.
fn parse_segment(segment: &str) -> Result<(&str, i64), ParseError> {
    let Some((key, value)) = segment.split_once(VALUE_DELIMITER) else {
        return Err(ParseError::MissingDelimiter {
            segment: segment.to_string(),
        });
    };
    if key.is_empty() {
        return Err(ParseError::EmptyKey {
            segment: segment.to_string(),
        });
    }

    let value = value
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;

    Ok((key, value))
}
