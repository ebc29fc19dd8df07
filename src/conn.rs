use crate::config::ServerConfig;
use crate::endpoint::Stream;
use crate::gateway::{dispatch, Application};
use crate::http_error::HttpError;
use crate::log::tag;
use crate::parse::{EventSink, MessageFlow, RequestParser};
use crate::request::RequestContext;
use crate::response::write_continue;
use std::io::Read;

/// Bytes read from the client socket per `read` call.
const READ_CHUNK_LEN: usize = 64 * 1024;

/// Applies one connection's parse events: builds the request context,
/// answers `Expect: 100-continue`, and hands each complete message to the
/// gateway bridge.
struct Exchange<'a> {
    stream: Stream,
    ctx: RequestContext,
    app: &'a dyn Application,
    config: &'a ServerConfig,
    close: bool,
}
impl EventSink for Exchange<'_> {
    fn on_message_begin(&mut self) {
        self.ctx.reset();
    }

    fn on_url(&mut self, raw_target: &str) -> Result<(), HttpError> {
        self.ctx.set_target(raw_target)
    }

    fn on_header(&mut self, name: &str, value: &str) {
        self.ctx.add_header(name, value);
    }

    fn on_headers_complete(&mut self, method: &str) -> Result<(), HttpError> {
        self.ctx.method = method.to_string();
        // The interim line must go out before any application code runs,
        // so a waiting client starts sending the body.
        if self.ctx.expects_continue() {
            write_continue(&mut self.stream)?;
        }
        Ok(())
    }

    fn on_body_chunk(&mut self, chunk: &[u8]) {
        self.ctx.body.extend_from_slice(chunk);
    }

    fn on_message_complete(&mut self) -> Result<MessageFlow, HttpError> {
        let served = dispatch(
            &mut self.stream,
            &self.ctx,
            self.app,
            &self.config.server_ident,
        )?;
        if !served.framed || self.ctx.asks_to_close() || self.config.disable_keepalive {
            self.close = true;
            return Ok(MessageFlow::Close);
        }
        Ok(MessageFlow::Continue)
    }
}

/// Serves one client connection to completion: reads fixed-size chunks,
/// feeds the parser, and keeps the socket for follow-up requests until the
/// peer closes it, an error occurs, or keep-alive is off.
pub(crate) fn handle_connection(
    stream: Stream,
    server_identity: (String, String),
    app: &dyn Application,
    config: &ServerConfig,
) {
    let remote_identity = stream.remote_identity();
    let mut parser = RequestParser::new();
    let mut exchange = Exchange {
        stream,
        ctx: RequestContext::new(remote_identity, server_identity),
        app,
        config,
        close: false,
    };
    let mut buf = vec![0_u8; READ_CHUNK_LEN];
    loop {
        let n = match exchange.stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if HttpError::from(e) != HttpError::Disconnected {
                    crate::log::info("socket error", tag("op", "read"));
                }
                break;
            }
        };
        match parser.feed(&buf[..n], &mut exchange) {
            Ok(()) => {}
            Err(HttpError::Disconnected) => break,
            Err(e) => {
                if e.is_server_error() {
                    crate::log::error("closing connection", tag("err", e.description()));
                } else {
                    crate::log::info("parse error", tag("err", e.description()));
                }
                break;
            }
        }
        if exchange.close {
            break;
        }
    }
    exchange.stream.shutdown();
}
