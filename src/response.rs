//! Outgoing HTTP response and the [`IntoResponse`] conversion trait.
//!
//! A [`Response`] is built by chaining: setters (`status`, `header`,
//! cookies, sessions) first, then one terminal that writes the body (`json`,
//! `send`, `redirect`, `render`, `bytes`, `end`). Calling a second terminal
//! replaces the body of the first.

use std::borrow::Cow;
use std::path::Path;

use bytes::Bytes;
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::cookie::{self, CookieOptions, SESSION_PREFIX};
use crate::status::Status;
use crate::template::TemplateEngine;

const CONTENT_TYPE: &str = "content-type";

/// Common content-type values for use with [`Response::bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,         // text/css; charset=utf-8
    Csv,         // text/csv
    Gif,         // image/gif
    Html,        // text/html; charset=utf-8
    Icon,        // image/x-icon
    JavaScript,  // text/javascript; charset=utf-8
    Jpeg,        // image/jpeg
    Json,        // application/json
    OctetStream, // application/octet-stream
    Png,         // image/png
    Svg,         // image/svg+xml
    Text,        // text/plain; charset=utf-8
    Xml,         // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css => "text/css; charset=utf-8",
            Self::Csv => "text/csv",
            Self::Gif => "image/gif",
            Self::Html => "text/html; charset=utf-8",
            Self::Icon => "image/x-icon",
            Self::JavaScript => "text/javascript; charset=utf-8",
            Self::Jpeg => "image/jpeg",
            Self::Json => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Text => "text/plain; charset=utf-8",
            Self::Xml => "application/xml",
        }
    }

    /// Picks the content type for a file extension (without the dot,
    /// case-insensitive). Unknown extensions are `application/octet-stream`.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "css" => Self::Css,
            "csv" => Self::Csv,
            "gif" => Self::Gif,
            "htm" | "html" => Self::Html,
            "ico" => Self::Icon,
            "js" | "mjs" => Self::JavaScript,
            "jpeg" | "jpg" => Self::Jpeg,
            "json" => Self::Json,
            "png" => Self::Png,
            "svg" => Self::Svg,
            "txt" => Self::Text,
            "xml" => Self::Xml,
            _ => Self::OctetStream,
        }
    }

    /// [`from_extension`](Self::from_extension) applied to `path`.
    pub fn for_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::OctetStream, Self::from_extension)
    }
}

/// What [`Response::send`] writes: structured data goes out as JSON,
/// everything else as text.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            structured => Self::Json(structured),
        }
    }
}

macro_rules! text_payload {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Payload {
            fn from(v: $ty) -> Self {
                Self::Text(v.to_string())
            }
        }
    )*};
}

text_payload!(bool, i32, i64, u32, u64, f64);

/// An outgoing HTTP response.
///
/// ```rust
/// use nanoweb::{CookieOptions, Response, Status};
/// use serde_json::json;
///
/// Response::new().json(&json!({ "id": 1 }));
/// Response::new().status(Status::Created).send("created");
/// Response::new().status(418_u16).send("short and stout");
/// Response::new().redirect("/login");
/// Response::new()
///     .set_cookie("theme", "dark mode", &CookieOptions::default())
///     .send("saved");
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Response {
    /// `200 OK`, no headers, empty body.
    pub fn new() -> Self {
        Self { status: Status::Ok.into(), headers: Vec::new(), body: Bytes::new() }
    }

    pub fn status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    /// Sets `name`, replacing any existing values (case-insensitive).
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Adds another value for `name`, keeping existing ones.
    pub fn append_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Appends a `Set-Cookie` header.
    pub fn set_cookie(self, name: &str, value: &str, options: &CookieOptions) -> Self {
        self.append_header("set-cookie", &cookie::serialize(name, value, options))
    }

    /// Tells the client to drop cookie `name` (`Max-Age=0`).
    pub fn remove_cookie(self, name: &str) -> Self {
        self.set_cookie(name, "", &CookieOptions::expired())
    }

    /// Stores `value` in the signed cookie `session_{name}`.
    ///
    /// The payload is readable by the client; the HMAC only proves it was
    /// issued with `secret`. Read it back with
    /// [`Request::session`](crate::Request::session).
    pub fn set_session(self, name: &str, value: &Value, secret: &str) -> Self {
        let signed = cookie::sign_session(value, secret);
        self.set_cookie(&format!("{SESSION_PREFIX}{name}"), &signed, &CookieOptions::default())
    }

    pub fn clear_session(self, name: &str) -> Self {
        self.remove_cookie(&format!("{SESSION_PREFIX}{name}"))
    }

    /// Terminal: serializes `data` as `application/json`.
    ///
    /// A value that fails to serialize answers `500`.
    pub fn json<T: Serialize + ?Sized>(self, data: &T) -> Self {
        match serde_json::to_vec(data) {
            Ok(bytes) => self.bytes(ContentType::Json, bytes),
            Err(e) => {
                error!(error = %e, "response body failed to serialize");
                self.status(Status::InternalServerError).bytes(ContentType::Text, "Internal error")
            }
        }
    }

    /// Terminal: JSON for structured values, text otherwise.
    ///
    /// Text keeps a content-type set earlier with [`header`](Self::header),
    /// and defaults to `text/html; charset=utf-8`.
    pub fn send(self, payload: impl Into<Payload>) -> Self {
        match payload.into() {
            Payload::Json(value) => self.json(&value),
            Payload::Text(text) => {
                let mut response = self;
                if response.header_value(CONTENT_TYPE).is_none() {
                    response = response.header(CONTENT_TYPE, ContentType::Html.as_str());
                }
                response.body = Bytes::from(text);
                response
            }
        }
    }

    /// Terminal: `302 Found` to `location`, empty body.
    pub fn redirect(self, location: &str) -> Self {
        self.status(Status::Found).header("location", location).end()
    }

    /// Terminal: renders view `name` with `engine`.
    ///
    /// A view that does not exist answers `404 View {name} not found`.
    pub fn render(self, engine: &TemplateEngine, name: &str, context: &Value) -> Self {
        match engine.render_view(name, context) {
            Some(html) => self.bytes(ContentType::Html, html),
            None => self.status(Status::NotFound).send(format!("View {name} not found")),
        }
    }

    /// Terminal: raw body with an explicit content type.
    pub fn bytes(mut self, content_type: ContentType, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.header(CONTENT_TYPE, content_type.as_str())
    }

    /// Terminal: empty body.
    pub fn end(mut self) -> Self {
        self.body = Bytes::new();
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// First value of header `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of header `name`, in the order they were added.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text (lossy UTF-8).
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Converts into the `http` type hyper writes to the connection.
    ///
    /// A status or header that is not valid HTTP turns the whole response
    /// into an empty `500`.
    pub fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Full::new(self.body)).unwrap_or_else(|e| {
            error!(status = self.status, error = %e, "response is not valid HTTP");
            let mut fallback = http::Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Conversion into an HTTP [`Response`].
///
/// ```rust,ignore
/// use nanoweb::{IntoResponse, Response};
/// use serde::Serialize;
///
/// struct Json<T: Serialize>(T);
///
/// impl<T: Serialize> IntoResponse for Json<T> {
///     fn into_response(self) -> Response {
///         Response::new().json(&self.0)
///     }
/// }
/// ```
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::new().send(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::new().send(self)
    }
}

/// `return Status::NoContent` from a handler: that status, empty body.
impl IntoResponse for Status {
    fn into_response(self) -> Response {
        Response::new().status(self)
    }
}
