use crate::http_error::HttpError;
use crate::util::find_slice;
use fixed_buffer::FixedBuf;
use safe_regex::{regex, Matcher2, Matcher3};

/// What the sink wants after a completed message: parse the next message on
/// this connection, or stop because the connection is closing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageFlow {
    Continue,
    Close,
}

/// Receives parse events for one connection, in order:
/// `on_message_begin`, `on_url`, `on_header` (repeated), `on_headers_complete`,
/// `on_body_chunk` (repeated), `on_message_complete`.
pub trait EventSink {
    fn on_message_begin(&mut self);
    /// Receives the raw request target, exactly as it appeared on the wire.
    fn on_url(&mut self, raw_target: &str) -> Result<(), HttpError>;
    /// Receives every header line in wire order, name not yet normalized.
    fn on_header(&mut self, name: &str, value: &str);
    fn on_headers_complete(&mut self, method: &str) -> Result<(), HttpError>;
    fn on_body_chunk(&mut self, chunk: &[u8]);
    fn on_message_complete(&mut self) -> Result<MessageFlow, HttpError>;
}

fn trim_trailing_cr(bytes: &[u8]) -> &[u8] {
    if let Some(&b'\r') = bytes.last() {
        bytes.split_last().unwrap().1
    } else {
        bytes
    }
}

fn trim_whitespace(mut bytes: &[u8]) -> &[u8] {
    loop {
        if let Some(&byte) = bytes.first() {
            if byte == b' ' || byte == b'\t' || byte == b'\r' || byte == b'\n' {
                bytes = bytes.split_first().unwrap().1;
                continue;
            }
        }
        if let Some(&byte) = bytes.last() {
            if byte == b' ' || byte == b'\t' || byte == b'\r' || byte == b'\n' {
                bytes = bytes.split_last().unwrap().1;
                continue;
            }
        }
        break;
    }
    bytes
}

fn latin1_bytes_to_utf8(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ParseState {
    Head,
    Body { remaining: u64 },
}

/// An incremental HTTP/1.x request parser driven by byte chunks.
///
/// Head bytes accumulate in an internal buffer until the blank line arrives,
/// then the whole event sequence for the head is delivered at once. Body
/// bytes pass through without buffering. The parser restarts automatically
/// after each message, so one instance serves a whole keep-alive connection.
pub struct RequestParser {
    buf: FixedBuf<8192>,
    state: ParseState,
    method: String,
}
impl RequestParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: FixedBuf::new(),
            state: ParseState::Head,
            method: String::new(),
        }
    }

    /// The method of the message currently being parsed.
    /// Valid from the `on_headers_complete` event onward.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Feeds one chunk read from the socket, delivering any events it
    /// completes to `sink`. Pass an empty chunk to drain buffered bytes.
    ///
    /// # Errors
    /// Returns an error when the bytes are not valid HTTP/1.x, the head
    /// exceeds the buffer, or the sink fails. The connection handler closes
    /// the connection on any error; the parser is not restartable after one.
    pub fn feed(&mut self, chunk: &[u8], sink: &mut dyn EventSink) -> Result<(), HttpError> {
        let mut chunk = chunk;
        loop {
            match self.state {
                ParseState::Head => {
                    self.buf.shift();
                    let writable = self.buf.writable();
                    let n = writable.len().min(chunk.len());
                    writable[..n].copy_from_slice(&chunk[..n]);
                    self.buf.wrote(n);
                    chunk = &chunk[n..];
                    match find_slice(b"\r\n\r\n", self.buf.readable()) {
                        Some(head_len) => {
                            let head: Vec<u8> =
                                self.buf.try_read_exact(head_len + 4).unwrap()[..head_len].to_vec();
                            let content_length = self.parse_head(&head, sink)?;
                            if content_length == 0 {
                                if sink.on_message_complete()? == MessageFlow::Close {
                                    return Ok(());
                                }
                            } else {
                                self.state = ParseState::Body {
                                    remaining: content_length,
                                };
                            }
                        }
                        None if chunk.is_empty() => return Ok(()),
                        None => {
                            if self.buf.writable().is_empty() {
                                return Err(HttpError::HeadTooLong);
                            }
                        }
                    }
                }
                ParseState::Body { remaining } => {
                    let buffered_len = self.buf.readable().len();
                    let remaining = if buffered_len > 0 {
                        let n = usize::try_from(remaining)
                            .unwrap_or(usize::MAX)
                            .min(buffered_len);
                        let bytes: Vec<u8> = self.buf.try_read_exact(n).unwrap().to_vec();
                        sink.on_body_chunk(&bytes);
                        remaining - n as u64
                    } else if !chunk.is_empty() {
                        let n = usize::try_from(remaining)
                            .unwrap_or(usize::MAX)
                            .min(chunk.len());
                        sink.on_body_chunk(&chunk[..n]);
                        chunk = &chunk[n..];
                        remaining - n as u64
                    } else {
                        return Ok(());
                    };
                    if remaining == 0 {
                        self.state = ParseState::Head;
                        if sink.on_message_complete()? == MessageFlow::Close {
                            return Ok(());
                        }
                    } else {
                        self.state = ParseState::Body { remaining };
                    }
                }
            }
            if chunk.is_empty() && self.buf.readable().is_empty() {
                return Ok(());
            }
        }
    }

    /// Parses the complete head bytes (request line and header lines, without
    /// the final blank line) and delivers their events.
    /// Returns the declared content length.
    fn parse_head(&mut self, head: &[u8], sink: &mut dyn EventSink) -> Result<u64, HttpError> {
        let mut lines = head.split(|b| *b == b'\n').map(trim_trailing_cr);
        let request_line = lines.next().ok_or(HttpError::MissingRequestLine)?;
        if request_line.is_empty() {
            return Err(HttpError::MissingRequestLine);
        }
        let (method, raw_target) = parse_request_line(request_line)?;
        self.method = method;
        sink.on_message_begin();
        sink.on_url(&raw_target)?;
        let mut content_length: u64 = 0;
        for line in lines {
            let (name, value) = parse_header_line(line)?;
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| HttpError::InvalidContentLength)?;
            } else if name.eq_ignore_ascii_case("transfer-encoding")
                && !value.trim().eq_ignore_ascii_case("identity")
            {
                return Err(HttpError::UnsupportedTransferEncoding);
            }
            sink.on_header(&name, &value);
        }
        let method = self.method.clone();
        sink.on_headers_complete(&method)?;
        Ok(content_length)
    }
}
impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_request_line(line: &[u8]) -> Result<(String, String), HttpError> {
    // https://datatracker.ietf.org/doc/html/rfc7230#section-3.1.1
    // https://datatracker.ietf.org/doc/html/rfc7230#section-5.3
    //     request-line   = method SP request-target SP HTTP-version CRLF
    //     method         = token
    //     request-target = origin-form
    //                    / absolute-form
    //                    / authority-form
    //                    / asterisk-form
    #[allow(clippy::assign_op_pattern)]
    #[allow(clippy::range_plus_one)]
    let matcher: Matcher3<_> = regex!(br"([-!#$%&'*+.^_`|~0-9A-Za-z]+) ([^ \t\r\n]+) ([^ \t\r\n]+)");
    let (method_bytes, target_bytes, proto_bytes) = matcher
        .match_slices(line)
        .ok_or(HttpError::MalformedRequestLine)?;
    let method = std::str::from_utf8(method_bytes).unwrap().to_string();
    let raw_target =
        std::str::from_utf8(target_bytes).map_err(|_| HttpError::MalformedPath)?;
    if proto_bytes != b"HTTP/1.1" && proto_bytes != b"HTTP/1.0" {
        return Err(HttpError::UnsupportedProtocol);
    }
    Ok((method, raw_target.to_string()))
}

fn parse_header_line(line: &[u8]) -> Result<(String, String), HttpError> {
    // https://datatracker.ietf.org/doc/html/rfc7230#section-3.2
    //     header-field   = field-name ":" OWS field-value OWS
    //     field-name     = token
    //
    // Header values are historically ISO-8859-1; decode them byte-for-byte.
    #[allow(clippy::assign_op_pattern)]
    #[allow(clippy::range_plus_one)]
    let matcher: Matcher2<_> = regex!(br"([-!#$%&'*+.^_`|~0-9A-Za-z]+):[ \t]*(.*)[ \t]*");
    let (name_bytes, value_bytes) = matcher
        .match_slices(line)
        .ok_or(HttpError::MalformedHeaderLine)?;
    let name = String::from_utf8(name_bytes.to_vec()).unwrap();
    let value = latin1_bytes_to_utf8(trim_whitespace(value_bytes));
    Ok((name, value))
}
