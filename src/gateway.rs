use crate::http_error::HttpError;
use crate::log::{tag, Tag};
use crate::request::RequestContext;
use crate::response::{write_head, ResponseHead};
use crate::util::WriteCounter;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The response body: a finite, lazily-produced sequence of byte chunks.
/// Dropping it releases whatever the application holds open, on every exit
/// path.
pub type Body = Box<dyn Iterator<Item = Vec<u8>>>;

/// Makes a body from one in-memory chunk.
#[must_use]
pub fn body_from(bytes: impl Into<Vec<u8>>) -> Body {
    Box::new(std::iter::once(bytes.into()))
}

/// Makes an empty body.
#[must_use]
pub fn empty_body() -> Body {
    Box::new(std::iter::empty())
}

/// An error the application gives up with. The bridge turns it into a
/// `500 Internal Server Error` and logs the message with its tags.
#[derive(Debug)]
pub struct AppError {
    pub msg: String,
    pub tags: Vec<Tag>,
}
impl AppError {
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, name: &'static str, value: impl Into<crate::log::TagValue>) -> Self {
        self.tags.push(Tag::new(name, value));
        self
    }
}
impl From<&'_ str> for AppError {
    fn from(value: &'_ str) -> Self {
        Self::new(value)
    }
}
impl From<String> for AppError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::new(value.to_string())
    }
}
impl From<HttpError> for AppError {
    fn from(value: HttpError) -> Self {
        Self::new(value.description())
    }
}

/// The synchronous application entry point.
///
/// The application must call [`StartResponse::start`] exactly once before
/// returning, then return the body chunks. Implemented for plain closures.
pub trait Application: Send + Sync + 'static {
    /// # Errors
    /// Returns an error to make the server answer `500 Internal Server
    /// Error`. The error is logged with the request's method and path.
    fn handle(&self, req: &RequestContext, response: &mut StartResponse)
        -> Result<Body, AppError>;
}
impl<F> Application for F
where
    F: Fn(&RequestContext, &mut StartResponse) -> Result<Body, AppError> + Send + Sync + 'static,
{
    fn handle(
        &self,
        req: &RequestContext,
        response: &mut StartResponse,
    ) -> Result<Body, AppError> {
        self(req, response)
    }
}

/// The one-shot response-start operation handed to the application.
///
/// `start` captures the status line and headers. Calling it a second time is
/// an error unless the call is an explicit error-recovery [`replace`].
///
/// [`replace`]: StartResponse::replace
pub struct StartResponse {
    head: Option<ResponseHead>,
    bytes_on_wire: bool,
}
impl StartResponse {
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: None,
            bytes_on_wire: false,
        }
    }

    /// Captures the status line and ordered header list.
    ///
    /// # Errors
    /// Returns an error when the response was already started.
    pub fn start(&mut self, head: ResponseHead) -> Result<(), HttpError> {
        if self.head.is_some() {
            return Err(HttpError::ResponseAlreadyStarted);
        }
        self.head = Some(head);
        Ok(())
    }

    /// Replaces a previously captured status and headers. This is the
    /// error-recovery path: an application that fails while producing a
    /// response may swap in an error response, as long as no body bytes have
    /// reached the wire.
    ///
    /// # Errors
    /// Returns an error when body bytes were already written.
    pub fn replace(&mut self, head: ResponseHead) -> Result<(), HttpError> {
        if self.bytes_on_wire {
            return Err(HttpError::ResponseAlreadySent);
        }
        self.head = Some(head);
        Ok(())
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.head.is_some()
    }

    /// Hands the captured head to the serializer. After this, the head is
    /// on the wire and no replacement is possible.
    fn take_head(&mut self) -> Option<ResponseHead> {
        self.bytes_on_wire = true;
        self.head.take()
    }
}
impl Default for StartResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// What the bridge tells the connection handler after one request.
pub(crate) struct Served {
    /// True when the response carried a `Content-Length`, so the connection
    /// framing is intact and the socket can serve another request.
    pub framed: bool,
}

fn log_request(ctx: &RequestContext, code: Option<u16>, body_len: u64) {
    crate::log::info(
        "request",
        vec![
            tag("method", ctx.method.clone()),
            tag("path", ctx.path.clone()),
            tag("status", code),
            tag("body_len", body_len),
        ],
    );
}

fn log_app_failure(ctx: &RequestContext, msg: String, mut tags: Vec<Tag>) {
    tags.insert(0, tag("msg", msg));
    tags.push(tag("method", ctx.method.clone()));
    tags.push(tag("path", ctx.path.clone()));
    crate::log::error("application error", tags);
}

/// Runs the application for one complete request and writes the response.
///
/// On application failure before anything reached the wire, writes a
/// synthesized `500` with an empty body. On failure after bytes reached the
/// wire, returns an error so the caller closes the connection without
/// emitting any further protocol output.
pub(crate) fn dispatch(
    mut stream: impl Write,
    ctx: &RequestContext,
    app: &dyn Application,
    server_ident: &str,
) -> Result<Served, HttpError> {
    let mut start = StartResponse::new();
    let result = catch_unwind(AssertUnwindSafe(|| app.handle(ctx, &mut start)));
    let (head, body) = match result {
        Ok(Ok(body)) => match start.take_head() {
            Some(head) => (head, body),
            None => {
                log_app_failure(ctx, "application returned without starting".to_string(), vec![]);
                (error_head(), empty_body())
            }
        },
        Ok(Err(e)) => {
            log_app_failure(ctx, e.msg, e.tags);
            (error_head(), empty_body())
        }
        Err(panic) => {
            log_app_failure(ctx, panic_message(panic.as_ref()), vec![]);
            (error_head(), empty_body())
        }
    };
    let framed = head.has_header("content-length");
    let code = head.code();
    let mut counter = WriteCounter::new(&mut stream);
    write_head(&mut counter, &head, server_ident)?;
    let mut body_len: u64 = 0;
    let mut body = body;
    let streamed = catch_unwind(AssertUnwindSafe(|| -> Result<(), HttpError> {
        for chunk in &mut body {
            if !chunk.is_empty() {
                counter.write_all(&chunk)?;
                body_len += chunk.len() as u64;
            }
        }
        counter.flush()?;
        Ok(())
    }));
    drop(body);
    match streamed {
        Ok(Ok(())) => {
            log_request(ctx, code, body_len);
            Ok(Served { framed })
        }
        Ok(Err(e)) => Err(e),
        Err(panic) => {
            // The head and possibly part of the body are on the wire; there
            // is no protocol-correct way to signal the failure.
            log_app_failure(ctx, panic_message(panic.as_ref()), vec![]);
            Err(HttpError::AppFailed)
        }
    }
}

fn error_head() -> ResponseHead {
    ResponseHead::new(500).with_header("Content-Length", "0")
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{body_from, dispatch, empty_body, AppError, Application, Body, StartResponse};
    use crate::http_error::HttpError;
    use crate::request::RequestContext;
    use crate::response::ResponseHead;

    fn context() -> RequestContext {
        let mut ctx = RequestContext::new(
            ("127.0.0.1".to_string(), "50000".to_string()),
            ("127.0.0.1".to_string(), "8000".to_string()),
        );
        ctx.method = "GET".to_string();
        ctx.set_target("/t").unwrap();
        ctx
    }

    fn run(app: impl Application) -> (String, Result<bool, HttpError>) {
        let mut wire: Vec<u8> = Vec::new();
        let result = dispatch(&mut wire, &context(), &app, "prefork/test");
        (
            String::from_utf8_lossy(&wire).to_string(),
            result.map(|served| served.framed),
        )
    }

    #[test]
    fn normal_response() {
        let (wire, result) = run(|_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
            response.start(ResponseHead::new(200).with_header("Content-Length", "2"))?;
            Ok(body_from("hi"))
        });
        assert_eq!(Ok(true), result);
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n"));
        assert!(wire.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn unframed_response_cannot_keep_alive() {
        let (wire, result) = run(|_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
            response.start(ResponseHead::new(200))?;
            Ok(body_from("streamed"))
        });
        assert_eq!(Ok(false), result);
        assert!(wire.ends_with("streamed"));
    }

    #[test]
    fn app_error_becomes_500_with_empty_body() {
        let (wire, result) = run(|_req: &RequestContext, _response: &mut StartResponse| -> Result<Body, AppError> {
            Err("boom".into())
        });
        assert_eq!(Ok(true), result);
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn app_panic_becomes_500_with_empty_body() {
        let (wire, result) = run(|_req: &RequestContext, _response: &mut StartResponse| -> Result<Body, AppError> {
            panic!("kaboom");
        });
        assert_eq!(Ok(true), result);
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[test]
    fn app_that_never_starts_becomes_500() {
        let (wire, result) = run(|_req: &RequestContext, _response: &mut StartResponse| -> Result<Body, AppError> {
            Ok(empty_body())
        });
        assert_eq!(Ok(true), result);
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[test]
    fn double_start_is_rejected_and_first_head_wins() {
        let (wire, result) = run(|_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
            response.start(ResponseHead::new(200).with_header("Content-Length", "0"))?;
            assert_eq!(
                Err(HttpError::ResponseAlreadyStarted),
                response.start(ResponseHead::new(404))
            );
            Ok(empty_body())
        });
        assert_eq!(Ok(true), result);
        assert_eq!(1, wire.matches("HTTP/1.1").count());
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn replace_swaps_head_before_anything_is_written() {
        let (wire, _result) = run(|_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
            response.start(ResponseHead::new(200).with_header("Content-Length", "0"))?;
            response.replace(ResponseHead::new(503).with_header("Content-Length", "0"))?;
            Ok(empty_body())
        });
        assert_eq!(1, wire.matches("HTTP/1.1").count());
        assert!(wire.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
    }

    #[test]
    fn replace_after_serialization_is_rejected() {
        let mut start = StartResponse::new();
        start
            .start(ResponseHead::new(200).with_header("Content-Length", "0"))
            .unwrap();
        let _head = start.take_head();
        assert_eq!(
            Err(HttpError::ResponseAlreadySent),
            start.replace(ResponseHead::new(500))
        );
    }

    #[test]
    fn panic_mid_body_drops_connection() {
        let (wire, result) = run(|_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
            response.start(ResponseHead::new(200).with_header("Content-Length", "100"))?;
            Ok(Box::new(
                std::iter::once(b"partial".to_vec()).chain(std::iter::once_with(
                    || -> Vec<u8> { panic!("body source failed") },
                )),
            ) as Body)
        });
        assert_eq!(Err(HttpError::AppFailed), result);
        assert!(wire.ends_with("partial"));
    }
}
