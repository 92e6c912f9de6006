//! Request body decoding.
//!
//! The server accumulates the whole body before anything downstream runs,
//! then hands the bytes here once. Decoding is picked by a case-insensitive
//! substring check on the declared media type:
//!
//! | Content-Type contains | Result |
//! |---|---|
//! | `application/json` | the parsed JSON value |
//! | `application/x-www-form-urlencoded` | flat mapping of decoded pairs |
//! | `multipart/form-data` | text fields in `body`, file parts in `files` |
//! | anything else / absent | empty mapping |
//!
//! Decoding never fails the request. A malformed body is logged at `debug`
//! and degrades to empty `body`/`files`.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::multipart;

/// Why a body could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("multipart content type has no boundary")]
    MissingBoundary,

    #[error("unusable multipart boundary: {0}")]
    Boundary(#[from] regex::Error),
}

/// A file part of a `multipart/form-data` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// The form field the file was sent under.
    pub field: String,
    /// The client-supplied file name.
    pub filename: String,
    /// Raw bytes, exactly as sent.
    pub content: Bytes,
    /// The part's own `Content-Type`, or `application/octet-stream`.
    pub mimetype: String,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Uploaded files keyed by form field name.
pub type Files = HashMap<String, UploadedFile>;

/// The decoded form of a request body.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedBody {
    pub fields: Value,
    pub files: Files,
}

impl Default for ParsedBody {
    fn default() -> Self {
        Self { fields: Value::Object(Map::new()), files: Files::new() }
    }
}

/// Decodes `raw` according to `content_type`, degrading to an empty body on
/// any decode error.
pub fn parse(content_type: &str, raw: &Bytes) -> ParsedBody {
    match decode(content_type, raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(content_type, error = %e, "request body degraded to empty");
            ParsedBody::default()
        }
    }
}

/// Like [`parse`], but reports why decoding failed.
pub fn decode(content_type: &str, raw: &Bytes) -> Result<ParsedBody, DecodeError> {
    let media = content_type.to_ascii_lowercase();

    if media.contains("application/json") {
        let fields = serde_json::from_slice(raw)?;
        Ok(ParsedBody { fields, files: Files::new() })
    } else if media.contains("application/x-www-form-urlencoded") {
        Ok(ParsedBody { fields: Value::Object(decode_form(raw)), files: Files::new() })
    } else if media.contains("multipart/form-data") {
        multipart::parse(content_type, raw)
    } else {
        Ok(ParsedBody::default())
    }
}

/// Decodes `application/x-www-form-urlencoded` pairs (`+` is a space).
///
/// A key that appears more than once maps to an array of its values in
/// order of appearance; otherwise values are plain strings.
pub fn decode_form(input: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        match map.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}
