use crate::ascii_string::AsciiString;
use crate::http_error::HttpError;
use crate::time::FormatTime;
use std::fmt::Debug;
use std::io::Write;
use std::time::SystemTime;

/// The status line text and ordered header list captured by the
/// response-start call.
#[derive(Clone, Eq, PartialEq)]
pub struct ResponseHead {
    /// Status line text after the protocol version, like `200 OK`.
    pub status: AsciiString,
    pub headers: Vec<(AsciiString, AsciiString)>,
}
impl ResponseHead {
    /// Makes a head with the standard reason phrase for `code` and no
    /// headers.
    #[must_use]
    pub fn new(code: u16) -> Self {
        Self {
            status: AsciiString::try_from(format!("{} {}", code, reason_phrase(code))).unwrap(),
            headers: Vec::new(),
        }
    }

    /// # Errors
    /// Returns an error when `status` is not US-ASCII.
    pub fn with_status(status: impl AsRef<str>) -> Result<Self, HttpError> {
        Ok(Self {
            status: AsciiString::try_from(status.as_ref())
                .map_err(|_| HttpError::AppFailed)?,
            headers: Vec::new(),
        })
    }

    /// Adds a header.
    /// You can call this multiple times to add multiple headers with the same name.
    ///
    /// # Panics
    /// Panics when `name` or `value` is not US-ASCII.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers.push((
            name.as_ref().try_into().unwrap(),
            value.as_ref().try_into().unwrap(),
        ));
        self
    }

    #[must_use]
    pub fn has_header(&self, name: impl AsRef<str>) -> bool {
        self.headers
            .iter()
            .any(|(n, _v)| n.eq_ignore_ascii_case(name.as_ref()))
    }

    /// The numeric status code, parsed from the front of the status text.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        self.status
            .split(' ')
            .next()
            .and_then(|digits| digits.parse().ok())
    }
}
impl Debug for ResponseHead {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        let headers: Vec<String> = self
            .headers
            .iter()
            .map(|(n, v)| format!("{}: {:?}", n, v.as_str()))
            .collect();
        write!(
            f,
            "ResponseHead({}, headers={{{}}})",
            self.status,
            headers.join(", ")
        )
    }
}

#[must_use]
pub fn reason_phrase(code: u16) -> &'static str {
    // https://developer.mozilla.org/en-US/docs/Web/HTTP/Status
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        417 => "Expectation Failed",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Response",
    }
}

/// Writes the interim line a client waiting on `Expect: 100-continue` needs
/// before it sends the request body.
///
/// # Errors
/// Returns an error when the connection is closed.
pub fn write_continue(mut writer: impl Write) -> Result<(), HttpError> {
    writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n")?;
    writer.flush()?;
    Ok(())
}

/// Serializes the status line, the application's headers, a `Date` header
/// (unless the application supplied one), the `Server` identity header, and
/// the blank line.
///
/// # Errors
/// Returns an error when the connection is closed.
pub fn write_head(
    mut writer: impl Write,
    head: &ResponseHead,
    server_ident: &str,
) -> Result<(), HttpError> {
    // https://datatracker.ietf.org/doc/html/rfc7230#section-3.1.2
    //     status-line = HTTP-version SP status-code SP reason-phrase CRLF
    let mut head_bytes: Vec<u8> = format!("HTTP/1.1 {}\r\n", head.status).into_bytes();
    for (name, value) in &head.headers {
        write!(head_bytes, "{name}: {value}\r\n").unwrap();
    }
    if !head.has_header("date") {
        write!(head_bytes, "Date: {}\r\n", SystemTime::now().rfc7231_date()).unwrap();
    }
    write!(head_bytes, "Server: {server_ident}\r\n").unwrap();
    head_bytes.extend(b"\r\n");
    writer.write_all(head_bytes.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{reason_phrase, write_head, ResponseHead};

    #[test]
    fn head_code() {
        assert_eq!(Some(200), ResponseHead::new(200).code());
        assert_eq!(
            Some(404),
            ResponseHead::with_status("404 Nope").unwrap().code()
        );
        assert_eq!(None, ResponseHead::with_status("abc").unwrap().code());
    }

    #[test]
    fn reason_phrases() {
        assert_eq!("OK", reason_phrase(200));
        assert_eq!("Internal Server Error", reason_phrase(500));
        assert_eq!("Response", reason_phrase(299));
    }

    #[test]
    fn write_head_appends_date_and_server() {
        let head = ResponseHead::new(200).with_header("Content-Length", "0");
        let mut buf: Vec<u8> = Vec::new();
        write_head(&mut buf, &head, "prefork/0.1.0").unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nDate: "));
        assert!(text.contains(" GMT\r\nServer: prefork/0.1.0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn write_head_keeps_application_date() {
        let head = ResponseHead::new(200).with_header("Date", "Thu, 01 Jan 1970 00:00:00 GMT");
        let mut buf: Vec<u8> = Vec::new();
        write_head(&mut buf, &head, "prefork/0.1.0").unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(1, text.matches("Date: ").count());
    }
}
