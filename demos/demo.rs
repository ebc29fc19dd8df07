//! Demo Server
//! ===========
//! The full configuration surface on the command line, serving a small
//! demo application.
//!
//! ```
//! $ cargo run --package prefork --example demo -- \
//!     --listen 127.0.0.1:8000 --workers 4 --max-requests 500
//! 2024-01-01T00:00:00Z info listening "endpoint":"127.0.0.1:8000" "pid":12345
//! ^C
//! $ curl http://127.0.0.1:8000/greet/world
//! hello, world
//! ```
use clap::Parser;
use prefork::{
    body_from, AppError, Body, RequestContext, ResponseHead, Server, ServerConfig, StartResponse,
};

/// A preforking HTTP server serving a demo application.
#[derive(Parser)]
#[command(version = prefork::VERSION)]
struct Args {
    /// Listen on a TCP host:port or a UNIX socket path.
    /// Can be specified multiple times. Defaults to 0.0.0.0:5000.
    #[arg(short, long)]
    listen: Vec<String>,

    /// Number of worker processes.
    #[arg(short, long, default_value_t = 5)]
    workers: usize,

    /// Max requests a worker will process before restarting.
    #[arg(long, default_value_t = 1000)]
    max_requests: u64,

    /// Worker timeout in seconds. Accepted but not enforced.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Keep-alive connection timeout. Accepted but not enforced.
    #[arg(long, default_value_t = 5)]
    keepalive_timeout: u64,

    /// Timeout for reading a request from a new connection.
    /// Accepted but not enforced.
    #[arg(long, default_value_t = 5)]
    read_timeout: u64,

    /// Disable keep-alive connections.
    #[arg(long)]
    disable_keepalive: bool,

    /// Listen backlog size.
    #[arg(long, default_value_t = 1024)]
    backlog: u32,

    /// Switch to user after binding port.
    #[arg(long)]
    user: Option<String>,

    /// Switch to group after binding port.
    #[arg(long)]
    group: Option<String>,

    /// Path to PID file.
    #[arg(long)]
    pid: Option<std::path::PathBuf>,

    /// Path to error log file.
    #[arg(long)]
    error_log: Option<std::path::PathBuf>,

    /// Daemonize the server process.
    #[arg(long)]
    daemonize: bool,

    /// Disable setting process titles.
    #[arg(long)]
    disable_proctitle: bool,
}

fn app(req: &RequestContext, response: &mut StartResponse) -> Result<Body, AppError> {
    let (code, body) = match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/ping") => (200, "ok\n".to_string()),
        ("GET", path) if path.starts_with("/greet/") => {
            (200, format!("hello, {}\n", &path["/greet/".len()..]))
        }
        ("POST", "/echo") => (200, String::from_utf8_lossy(&req.body).to_string()),
        _ => (404, "not found\n".to_string()),
    };
    response.start(
        ResponseHead::new(code)
            .with_header("Content-Type", "text/plain")
            .with_header("Content-Length", body.len().to_string()),
    )?;
    Ok(body_from(body))
}

pub fn main() {
    let args = Args::parse();
    let mut config = ServerConfig::new()
        .with_workers(args.workers)
        .with_max_requests(args.max_requests)
        .with_backlog(args.backlog)
        .with_timeouts(args.timeout, args.keepalive_timeout, args.read_timeout);
    for spec in args.listen {
        config = config.with_listen(spec);
    }
    if args.disable_keepalive {
        config = config.with_keepalive_disabled();
    }
    if let Some(user) = args.user {
        config = config.with_user(user);
    }
    if let Some(group) = args.group {
        config = config.with_group(group);
    }
    if let Some(path) = args.pid {
        config = config.with_pid_file(path);
    }
    if let Some(path) = args.error_log {
        config = config.with_error_log(path);
    }
    if args.daemonize {
        config = config.with_daemonize();
    }
    if args.disable_proctitle {
        config = config.without_proctitle();
    }
    if let Err(e) = Server::new(config, app).run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
