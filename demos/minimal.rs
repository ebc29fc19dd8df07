//! Minimal Server Example
//! =================
//!
//! Start the server:
//! ```
//! $ cargo run --package prefork --example minimal
//!     Finished dev [unoptimized + debuginfo] target(s) in 0.04s
//!      Running `target/debug/examples/minimal`
//! ^C
//! ```
//!
//! Make a request to it:
//! ```
//! $ curl http://127.0.0.1:8000/
//! not found
//! ```
use prefork::{
    body_from, AppError, Body, RequestContext, ResponseHead, Server, ServerConfig, StartResponse,
};

pub fn main() {
    let app = |_req: &RequestContext, response: &mut StartResponse| -> Result<Body, AppError> {
        let body = "not found\n";
        response.start(
            ResponseHead::new(404)
                .with_header("Content-Type", "text/plain")
                .with_header("Content-Length", body.len().to_string()),
        )?;
        Ok(body_from(body))
    };
    let config = ServerConfig::new().with_listen("127.0.0.1:8000");
    if let Err(e) = Server::new(config, app).run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
