//! Cookie and signed-session wire formats.
//!
//! ```text
//! name=urlencoded(value); Max-Age=seconds; HttpOnly; Secure; Path=path; SameSite=value
//! ```
//!
//! Each attribute is present only when configured. A signed session is a
//! cookie named `session_{name}` whose value is
//! `base64("{json}.{hex hmac-sha256(json)}")`.

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Name prefix of every signed session cookie.
pub const SESSION_PREFIX: &str = "session_";

/// The `SameSite` cookie attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        })
    }
}

/// Attributes attached to a `Set-Cookie` header.
///
/// The default is a one-day, `HttpOnly` cookie scoped to `/`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CookieOptions {
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub secure: bool,
    pub path: Option<String>,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age: Some(Duration::from_secs(24 * 60 * 60)),
            http_only: true,
            secure: false,
            path: Some("/".to_owned()),
            same_site: None,
        }
    }
}

impl CookieOptions {
    /// Options that make a browser drop the cookie immediately.
    pub fn expired() -> Self {
        Self { max_age: Some(Duration::ZERO), ..Self::default() }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// A session cookie: no `Max-Age`, dropped when the browser closes.
    pub fn session_only(mut self) -> Self {
        self.max_age = None;
        self
    }

    pub fn http_only(mut self, on: bool) -> Self {
        self.http_only = on;
        self
    }

    pub fn secure(mut self, on: bool) -> Self {
        self.secure = on;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Assembles a `Set-Cookie` header value.
pub fn serialize(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{name}={}", utf8_percent_encode(value, COMPONENT));
    if let Some(max_age) = options.max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age.as_secs()));
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if let Some(path) = &options.path {
        cookie.push_str(&format!("; Path={path}"));
    }
    if let Some(same_site) = options.same_site {
        cookie.push_str(&format!("; SameSite={same_site}"));
    }
    cookie
}

/// Finds `name` in a `Cookie` request header and percent-decodes its value.
pub fn find(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
}

/// Signs `payload` and wraps it as a session cookie value.
pub fn sign_session(payload: &Value, secret: &str) -> String {
    let data = payload.to_string();
    let signature = hex::encode(mac(secret, data.as_bytes()).finalize().into_bytes());
    BASE64.encode(format!("{data}.{signature}"))
}

/// Verifies a session cookie value produced by [`sign_session`].
///
/// Returns the payload only when the signature matches; the comparison is
/// constant-time.
pub fn verify_session(cookie_value: &str, secret: &str) -> Option<Value> {
    let decoded = BASE64.decode(cookie_value).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (data, signature) = decoded.rsplit_once('.')?;
    let signature = hex::decode(signature).ok()?;
    mac(secret, data.as_bytes()).verify_slice(&signature).ok()?;
    serde_json::from_str(data).ok()
}

fn mac(secret: &str, data: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data);
    mac
}
