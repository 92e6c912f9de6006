//! `multipart/form-data` sub-parser.
//!
//! The body is split on `--{boundary}`. Every part that carries a
//! `Content-Disposition` header with a `name` parameter becomes either a
//! text field (no `filename`) or an [`UploadedFile`]. Content starts after
//! the first blank line (`\r\n\r\n`) and ends before the CRLF that precedes
//! the next delimiter. Parts without a `name` are skipped.
//!
//! Everything operates on raw bytes; file contents are zero-copy slices of
//! the request body.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use serde_json::{Map, Value};

use crate::body::{DecodeError, Files, ParsedBody, UploadedFile};

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(?:^|[;\s])name="([^"]+)""#).unwrap());
static FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename="([^"]+)""#).unwrap());
static CONTENT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^content-type:[ \t]*([^\r\n]+)").unwrap());

const HEADER_END: &[u8] = b"\r\n\r\n";
const DEFAULT_MIMETYPE: &str = "application/octet-stream";

/// Parses a multipart body. `content_type` must carry the `boundary=`
/// parameter.
pub fn parse(content_type: &str, raw: &Bytes) -> Result<ParsedBody, DecodeError> {
    let boundary = boundary(content_type).ok_or(DecodeError::MissingBoundary)?;
    let delimiter = regex::bytes::Regex::new(&regex::escape(&format!("--{boundary}")))?;

    let mut fields = Map::new();
    let mut files = Files::new();

    for part in delimiter.split(raw) {
        let Some(header_len) = find(part, HEADER_END) else {
            continue;
        };
        let head = String::from_utf8_lossy(&part[..header_len]);
        if !head.to_ascii_lowercase().contains("content-disposition") {
            continue;
        }
        let Some(name) = NAME.captures(&head).map(|c| c[1].to_owned()) else {
            continue;
        };

        let body = &part[header_len + HEADER_END.len()..];
        let body = body.strip_suffix(b"\r\n").unwrap_or(body);

        match FILENAME.captures(&head) {
            Some(filename) => {
                let mimetype = CONTENT_TYPE
                    .captures(&head)
                    .map_or(DEFAULT_MIMETYPE.to_owned(), |c| c[1].trim().to_owned());
                let file = UploadedFile {
                    field: name.clone(),
                    filename: filename[1].to_owned(),
                    content: raw.slice_ref(body),
                    mimetype,
                };
                files.insert(name, file);
            }
            None => {
                fields.insert(name, Value::String(String::from_utf8_lossy(body).into_owned()));
            }
        }
    }

    Ok(ParsedBody { fields: Value::Object(fields), files })
}

/// Extracts the `boundary=` parameter, unquoted.
fn boundary(content_type: &str) -> Option<&str> {
    let at = content_type.to_ascii_lowercase().find("boundary=")?;
    let value = content_type[at + "boundary=".len()..]
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"');
    (!value.is_empty()).then_some(value)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
