//! Incoming HTTP request type.

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::body::{self, Files, UploadedFile};
use crate::cookie::{self, SESSION_PREFIX};
use crate::method::Method;
use crate::pattern::Params;
use crate::template::TemplateEngine;

static DEFAULT_VIEWS: LazyLock<Arc<TemplateEngine>> =
    LazyLock::new(|| Arc::new(TemplateEngine::default()));

/// An incoming HTTP request.
///
/// By the time any middleware sees a request its body has been read in full
/// and decoded; `body()` and `files()` never change afterwards. Path
/// parameters are filled in when the pipeline reaches route handling.
pub struct Request {
    method: Method,
    path: String,
    query: Map<String, Value>,
    headers: Vec<(String, String)>,
    raw_body: Bytes,
    body: Value,
    files: Files,
    params: Params,
    extensions: http::Extensions,
    views: Arc<TemplateEngine>,
}

impl Request {
    /// A request for `target` (path plus optional `?query`), with no
    /// headers and an empty body.
    ///
    /// ```
    /// use nanoweb::{Method, Request};
    ///
    /// let req = Request::new(Method::Get, "/search?q=rust+web&page=2");
    /// assert_eq!(req.path(), "/search");
    /// assert_eq!(req.query()["q"], "rust web");
    /// ```
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method,
            path: path.to_owned(),
            query: body::decode_form(query.as_bytes()),
            headers: Vec::new(),
            raw_body: Bytes::new(),
            body: Value::Object(Map::new()),
            files: Files::new(),
            params: Params::new(),
            extensions: http::Extensions::new(),
            views: Arc::clone(&DEFAULT_VIEWS),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Attaches the complete body and decodes it by `Content-Type`.
    ///
    /// Only `POST`, `PUT` and `PATCH` requests keep a body; for every other
    /// method this is a no-op. Set headers first.
    pub fn with_body(mut self, raw: impl Into<Bytes>) -> Self {
        if !self.method.carries_body() {
            return self;
        }
        let raw = raw.into();
        let parsed = body::parse(self.header("content-type").unwrap_or_default(), &raw);
        self.body = parsed.fields;
        self.files = parsed.files;
        self.raw_body = raw;
        self
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub(crate) fn set_views(&mut self, views: Arc<TemplateEngine>) {
        self.views = views;
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded query string. Repeated keys map to arrays.
    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The decoded body: a JSON value, or a mapping of form fields.
    /// An empty mapping when the body was absent or could not be decoded.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The body exactly as received.
    pub fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Value of cookie `name` from the `Cookie` header, percent-decoded.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .find_map(|(_, header)| cookie::find(header, name))
    }

    /// Payload of the signed session `name`, if present and signed with
    /// `secret`.
    pub fn session(&self, name: &str, secret: &str) -> Option<Value> {
        let value = self.cookie(&format!("{SESSION_PREFIX}{name}"))?;
        cookie::verify_session(&value, secret)
    }

    /// The template engine configured with [`App::views`](crate::App::views).
    pub fn views(&self) -> &TemplateEngine {
        &self.views
    }

    /// Typed per-request data shared between middleware and handlers.
    pub fn extensions(&self) -> &http::Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.extensions
    }
}
