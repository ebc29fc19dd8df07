//! Prefork
//! =======
//! A preforking HTTP application server library in Rust.
//!
//! A master process binds one or more listening sockets (TCP or UNIX), forks
//! a pool of worker processes that all inherit the same sockets, and
//! supervises the pool for the server's lifetime. Each worker is a
//! single-threaded blocking loop: accept a connection, parse HTTP/1.x
//! incrementally, hand the request to the application through a synchronous
//! gateway contract, write the response, repeat. The kernel's shared accept
//! queue distributes connections across workers with no coordination.
//!
//! # Features
//! - Process-level parallelism, no shared mutable memory between workers
//! - Signal-driven supervision: SIGHUP replaces every worker without
//!   closing the listening sockets, SIGTTIN/SIGTTOU grow and shrink the
//!   pool, SIGTERM/SIGINT/SIGQUIT stop the server
//! - Per-worker request quota: a worker exits cleanly after `max_requests`
//!   connections and the master replaces it, bounding resource growth
//! - WSGI-shaped application contract: one response-start call, then a lazy
//!   body
//! - Sends 100-Continue
//! - Socket handoff from an external supervisor via `SERVER_STARTER_PORT`
//! - Privilege drop, PID file, daemonization, process titles
//!
//! # Limitations
//! - No TLS
//! - No request or response `chunked` transfer encoding
//! - No per-request timeouts: a stalled client or application blocks its
//!   worker until the connection ends
//! - Workers accept from the first configured endpoint only
//!
//! # Example
//! ```no_run
//! use prefork::{body_from, RequestContext, ResponseHead, Server, ServerConfig, StartResponse};
//!
//! fn app(
//!     req: &RequestContext,
//!     response: &mut StartResponse,
//! ) -> Result<prefork::Body, prefork::AppError> {
//!     let body = format!("hello from {}\n", req.path);
//!     response.start(
//!         ResponseHead::new(200)
//!             .with_header("Content-Type", "text/plain")
//!             .with_header("Content-Length", body.len().to_string()),
//!     )?;
//!     Ok(body_from(body))
//! }
//!
//! let config = ServerConfig::new().with_listen("127.0.0.1:8000").with_workers(4);
//! if let Err(e) = Server::new(config, app).run() {
//!     eprintln!("{e}");
//!     std::process::exit(1);
//! }
//! ```
mod ascii_string;
mod config;
mod conn;
mod endpoint;
mod gateway;
mod headers;
mod http_error;
mod master;
mod parse;
mod request;
mod response;
mod time;
mod unix;
mod util;
mod worker;

pub mod log;

pub use crate::ascii_string::AsciiString;
pub use crate::config::ServerConfig;
pub use crate::endpoint::{
    inherited_listener, Endpoint, Listener, Stream, SERVER_STARTER_ENV,
};
pub use crate::gateway::{body_from, empty_body, AppError, Application, Body, StartResponse};
pub use crate::headers::{canonical_name, Header, HeaderList};
pub use crate::http_error::{HttpError, StartupError};
pub use crate::master::{Server, SignalFlags};
pub use crate::request::RequestContext;
pub use crate::response::{reason_phrase, ResponseHead};
pub use crate::worker::Worker;

/// This part of the library is not covered by the semver guarantees.
/// If you use these in your program, a minor version upgrade could break your build.
pub mod internal {
    pub use crate::parse::*;
    pub use crate::response::*;
    pub use crate::time::*;
    pub use crate::unix::*;
    pub use crate::util::*;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
