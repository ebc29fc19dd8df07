//! Hello World Example
//! =================
//!
//! Start the server:
//! ```
//! $ cargo run --package prefork --example hello_world
//!     Finished dev [unoptimized + debuginfo] target(s) in 0.04s
//!      Running `target/debug/examples/hello_world`
//! ^C
//! ```
//!
//! Make a request to it:
//! ```
//! $ curl -v http://127.0.0.1:3000/
//! > GET / HTTP/1.1
//! > Host: 127.0.0.1:3000
//! >
//! < HTTP/1.1 200 OK
//! < Content-Type: text/plain
//! < Content-Length: 13
//! < Date: Wed, 30 Mar 2022 07:29:33 GMT
//! < Server: prefork/0.1.0
//! <
//! Hello, World!
//! ```
use prefork::{
    body_from, AppError, Body, RequestContext, ResponseHead, Server, ServerConfig, StartResponse,
};

fn hello(_req: &RequestContext, response: &mut StartResponse) -> Result<Body, AppError> {
    let body = "Hello, World!";
    response.start(
        ResponseHead::new(200)
            .with_header("Content-Type", "text/plain")
            .with_header("Content-Length", body.len().to_string()),
    )?;
    Ok(body_from(body))
}

pub fn main() {
    let config = ServerConfig::new()
        .with_listen("127.0.0.1:3000")
        .with_workers(2);
    if let Err(e) = Server::new(config, hello).run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
