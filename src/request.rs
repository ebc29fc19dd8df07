use crate::headers::{canonical_name, HeaderList};
use crate::http_error::HttpError;
use std::collections::HashMap;
use std::fmt::Debug;
use url::Url;

/// Everything the gateway application sees about one request.
///
/// One instance lives per connection. The per-message fields are rebuilt
/// from scratch at every message-begin event; the identity fields (remote
/// and server address, scheme) are fixed for the connection's lifetime.
pub struct RequestContext {
    pub method: String,
    /// The request target exactly as it appeared on the wire.
    pub raw_target: String,
    /// The percent-decoded path portion of the target.
    pub path: String,
    /// The query string, without the leading `?`, not decoded.
    pub query: String,
    /// Every header in wire order, names in canonical form.
    /// Duplicate names are preserved.
    pub headers: HeaderList,
    /// The request body, complete by the time the application runs.
    pub body: Vec<u8>,
    pub remote_addr: String,
    pub remote_port: String,
    pub server_name: String,
    pub server_port: String,
    pub scheme: &'static str,
    vars: HashMap<String, String>,
}
impl RequestContext {
    #[must_use]
    pub fn new(
        (remote_addr, remote_port): (String, String),
        (server_name, server_port): (String, String),
    ) -> Self {
        Self {
            method: String::new(),
            raw_target: String::new(),
            path: String::new(),
            query: String::new(),
            headers: HeaderList::new(),
            body: Vec::new(),
            remote_addr,
            remote_port,
            server_name,
            server_port,
            scheme: "http",
            vars: HashMap::new(),
        }
    }

    /// Clears the per-message fields. Called at message-begin so a
    /// keep-alive connection starts every request from scratch.
    pub fn reset(&mut self) {
        self.method.clear();
        self.raw_target.clear();
        self.path.clear();
        self.query.clear();
        self.headers = HeaderList::new();
        self.body = Vec::new();
        self.vars.clear();
    }

    /// Splits and decodes the raw request target into path and query.
    ///
    /// # Errors
    /// Returns an error when the target is not an origin-form path or `*`.
    pub fn set_target(&mut self, raw_target: &str) -> Result<(), HttpError> {
        self.raw_target = raw_target.to_string();
        if raw_target == "*" {
            self.path = "*".to_string();
            self.query = String::new();
            return Ok(());
        }
        if !raw_target.starts_with('/') {
            return Err(HttpError::MalformedPath);
        }
        Url::options()
            .base_url(Some(&Url::parse("http://unknown/").unwrap()))
            .parse(raw_target)
            .map_err(|_| HttpError::MalformedPath)?;
        let (path, query) = match raw_target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (raw_target, ""),
        };
        self.path = percent_decode(path);
        self.query = query.to_string();
        Ok(())
    }

    /// Records one header: appends it to the ordered collection under its
    /// canonical name, and makes it the last-seen value in the flattened
    /// lookup map.
    pub fn add_header(&mut self, wire_name: &str, value: &str) {
        let name = canonical_name(wire_name);
        self.vars.insert(name.clone(), value.to_string());
        self.headers.add(name, value);
    }

    /// Looks up the last-seen value for a canonical variable name,
    /// for example `HTTP_X_TEST` or `CONTENT_LENGTH`.
    #[must_use]
    pub fn var(&self, canonical: impl AsRef<str>) -> Option<&str> {
        self.vars.get(canonical.as_ref()).map(String::as_str)
    }

    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.var("CONTENT_LENGTH").and_then(|s| s.trim().parse().ok())
    }

    #[must_use]
    pub fn expects_continue(&self) -> bool {
        self.var("HTTP_EXPECT")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    }

    #[must_use]
    pub fn asks_to_close(&self) -> bool {
        self.var("HTTP_CONNECTION")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }
}
impl Debug for RequestContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(
            f,
            "RequestContext{{{}:{}, {} {:?}, query={:?}, headers={:?}, body_len={}}}",
            self.remote_addr,
            self.remote_port,
            self.method,
            self.path,
            self.query,
            self.headers,
            self.body.len()
        )
    }
}

/// Decodes `%xx` escapes. Malformed escapes pass through unchanged.
/// Escapes that decode to valid UTF-8 stay UTF-8; lone high bytes are read
/// as ISO-8859-1, so no byte is ever lost.
fn percent_decode(input: &str) -> String {
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    let mut iter = input.bytes();
    while let Some(b) = iter.next() {
        if b == b'%' {
            let mut rest = iter.clone();
            if let (Some(hi), Some(lo)) = (rest.next(), rest.next()) {
                if let (Some(hi), Some(lo)) = (hex_value(hi), hex_value(lo)) {
                    bytes.push(hi * 16 + lo);
                    iter = rest;
                    continue;
                }
            }
        }
        bytes.push(b);
    }
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.as_bytes().iter().map(|&b| b as char).collect(),
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{percent_decode, RequestContext};
    use crate::http_error::HttpError;

    fn context() -> RequestContext {
        RequestContext::new(
            ("127.0.0.1".to_string(), "50000".to_string()),
            ("127.0.0.1".to_string(), "8000".to_string()),
        )
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!("/path", percent_decode("/path"));
        assert_eq!("/a b", percent_decode("/a%20b"));
        assert_eq!("/50%", percent_decode("/50%"));
        assert_eq!("/%zz", percent_decode("/%zz"));
        assert_eq!("/é", percent_decode("/%C3%A9"));
    }

    #[test]
    fn target_with_query() {
        let mut ctx = context();
        ctx.set_target("/path?x=1").unwrap();
        assert_eq!("/path", ctx.path);
        assert_eq!("x=1", ctx.query);
        assert_eq!("/path?x=1", ctx.raw_target);
    }

    #[test]
    fn target_asterisk_form() {
        let mut ctx = context();
        ctx.set_target("*").unwrap();
        assert_eq!("*", ctx.path);
        assert_eq!("", ctx.query);
    }

    #[test]
    fn target_must_be_origin_form() {
        let mut ctx = context();
        assert_eq!(
            Err(HttpError::MalformedPath),
            ctx.set_target("http://example.com/path")
        );
    }

    #[test]
    fn header_lookup_is_last_seen() {
        let mut ctx = context();
        ctx.add_header("X-Test", "v");
        ctx.add_header("x-test", "w");
        assert_eq!(Some("w"), ctx.var("HTTP_X_TEST"));
        assert_eq!(2, ctx.headers.len());
    }

    #[test]
    fn reset_keeps_identity_fields() {
        let mut ctx = context();
        ctx.method = "GET".to_string();
        ctx.add_header("X-Test", "v");
        ctx.body.extend_from_slice(b"data");
        ctx.reset();
        assert_eq!("", ctx.method);
        assert!(ctx.headers.is_empty());
        assert!(ctx.body.is_empty());
        assert_eq!(None, ctx.var("HTTP_X_TEST"));
        assert_eq!("127.0.0.1", ctx.remote_addr);
        assert_eq!("8000", ctx.server_port);
    }
}
