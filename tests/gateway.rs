mod test_util;

use prefork::{
    body_from, empty_body, AppError, Body, RequestContext, ResponseHead, ServerConfig,
    StartResponse,
};
use test_util::TestWorker;

#[test]
fn app_error_yields_500_with_empty_body_on_the_wire() {
    let app = |_req: &RequestContext, _response: &mut StartResponse| -> Result<Body, AppError> {
        Err(AppError::new("backend unavailable").with_tag("backend", "primary"))
    };
    let server = TestWorker::start(app, ServerConfig::new());
    let response = server.exchange("GET / HTTP/1.1\r\n\r\n");
    assert!(
        response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"),
        "{response}"
    );
    assert!(response.contains("\r\nContent-Length: 0\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\n"), "{response}");
}

#[test]
fn app_panic_yields_500_and_worker_survives() {
    let app = |req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
        if req.path == "/panic" {
            panic!("handler exploded");
        }
        response.start(ResponseHead::new(200).with_header("Content-Length", "2"))?;
        Ok(body_from("ok"))
    };
    let server = TestWorker::start(app, ServerConfig::new());
    let response = server.exchange("GET /panic HTTP/1.1\r\n\r\n");
    assert!(
        response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"),
        "{response}"
    );
    let response = server.exchange("GET /fine HTTP/1.1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
}

#[test]
fn double_start_produces_a_single_status_line() {
    let app = |_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
        response.start(ResponseHead::new(200).with_header("Content-Length", "0"))?;
        // The second start without error-recovery intent must be rejected.
        assert!(response.start(ResponseHead::new(404)).is_err());
        Ok(empty_body())
    };
    let server = TestWorker::start(app, ServerConfig::new());
    let response = server.exchange("GET / HTTP/1.1\r\n\r\n");
    assert_eq!(1, response.matches("HTTP/1.1").count(), "{response}");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
}

#[test]
fn replace_swaps_in_the_error_response() {
    let app = |_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
        response.start(ResponseHead::new(200).with_header("Content-Length", "0"))?;
        // Something went wrong mid-handler; swap in an error response.
        response.replace(ResponseHead::new(503).with_header("Content-Length", "0"))?;
        Ok(empty_body())
    };
    let server = TestWorker::start(app, ServerConfig::new());
    let response = server.exchange("GET / HTTP/1.1\r\n\r\n");
    assert_eq!(1, response.matches("HTTP/1.1").count(), "{response}");
    assert!(
        response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"),
        "{response}"
    );
}

#[test]
fn lazy_body_chunks_stream_in_order() {
    let app = |_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
        response.start(ResponseHead::new(200).with_header("Content-Length", "6"))?;
        Ok(Box::new(
            vec![b"ab".to_vec(), Vec::new(), b"cd".to_vec(), b"ef".to_vec()].into_iter(),
        ))
    };
    let server = TestWorker::start(app, ServerConfig::new());
    let response = server.exchange("GET / HTTP/1.1\r\n\r\n");
    assert!(response.ends_with("\r\n\r\nabcdef"), "{response}");
}
