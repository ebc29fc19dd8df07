use std::path::PathBuf;

/// Server configuration, built with chained `with_` calls.
///
/// ```rust
/// use prefork::ServerConfig;
///
/// let config = ServerConfig::new()
///     .with_listen("127.0.0.1:8000")
///     .with_workers(4)
///     .with_max_requests(500);
/// ```
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen specs: TCP `host:port` or a UNIX socket path.
    /// When empty, the server listens on `0.0.0.0:5000`.
    pub listen: Vec<String>,
    pub workers: usize,
    /// Connections a worker serves before it exits and gets replaced.
    pub max_requests: u64,
    /// Accepted for compatibility; the core loop does not enforce any of
    /// the three timeouts. A stalled client or application blocks its
    /// worker until the connection ends.
    pub timeout_secs: u64,
    pub keepalive_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// When set, every connection serves exactly one request.
    pub disable_keepalive: bool,
    pub backlog: u32,
    pub user: Option<String>,
    pub group: Option<String>,
    pub pid_file: Option<PathBuf>,
    pub error_log: Option<PathBuf>,
    pub daemonize: bool,
    pub set_proctitle: bool,
    /// Value of the `Server` response header.
    pub server_ident: String,
}
impl ServerConfig {
    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            listen: Vec::new(),
            workers: 5,
            max_requests: 1000,
            timeout_secs: 30,
            keepalive_timeout_secs: 5,
            read_timeout_secs: 5,
            disable_keepalive: false,
            backlog: 1024,
            user: None,
            group: None,
            pid_file: None,
            error_log: None,
            daemonize: false,
            set_proctitle: true,
            server_ident: format!("prefork/{}", crate::VERSION),
        }
    }

    /// Adds a listen endpoint. Call multiple times to listen on several.
    #[must_use]
    pub fn with_listen(mut self, spec: impl Into<String>) -> Self {
        self.listen.push(spec.into());
        self
    }

    #[must_use]
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    #[must_use]
    pub fn with_max_requests(mut self, n: u64) -> Self {
        self.max_requests = n;
        self
    }

    #[must_use]
    pub fn with_backlog(mut self, n: u32) -> Self {
        self.backlog = n;
        self
    }

    #[must_use]
    pub fn with_keepalive_disabled(mut self) -> Self {
        self.disable_keepalive = true;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_daemonize(mut self) -> Self {
        self.daemonize = true;
        self
    }

    #[must_use]
    pub fn without_proctitle(mut self) -> Self {
        self.set_proctitle = false;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeout: u64, keepalive: u64, read: u64) -> Self {
        self.timeout_secs = timeout;
        self.keepalive_timeout_secs = keepalive;
        self.read_timeout_secs = read;
        self
    }
}
