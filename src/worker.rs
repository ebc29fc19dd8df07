use crate::config::ServerConfig;
use crate::conn::handle_connection;
use crate::endpoint::Listener;
use crate::gateway::Application;
use crate::log::tag;
use nix::sys::signal::{signal, SigHandler, Signal};
use std::time::Duration;

/// One worker process: accepts connections from the shared listening
/// sockets and serves each to completion, until its request quota is spent.
///
/// The worker never closes the listening sockets and never restarts itself;
/// replacement is the master's job. Exiting at the quota bounds per-process
/// resource growth by forcing periodic renewal.
pub struct Worker<'a> {
    app: &'a dyn Application,
    config: &'a ServerConfig,
    listeners: &'a [Listener],
    requests_processed: u64,
}
impl<'a> Worker<'a> {
    #[must_use]
    pub fn new(
        app: &'a dyn Application,
        config: &'a ServerConfig,
        listeners: &'a [Listener],
    ) -> Self {
        Self {
            app,
            config,
            listeners,
            requests_processed: 0,
        }
    }

    /// Restores default dispositions for the termination signals the master
    /// handles itself. A worker must die immediately and simply on these,
    /// not run the master's graceful-reload logic.
    pub fn reset_signal_dispositions() {
        for sig in [Signal::SIGTERM, Signal::SIGINT, Signal::SIGQUIT] {
            let _ignored = unsafe { signal(sig, SigHandler::SigDfl) };
        }
    }

    /// Runs the accept loop until `max_requests` connections are served,
    /// then returns for a clean exit.
    // TODO: Poll all listeners instead of accepting from the first one only.
    pub fn run(&mut self) {
        crate::log::info("worker started", ());
        let Some(listener) = self.listeners.first() else {
            crate::log::error("worker has no listening socket", ());
            return;
        };
        while self.requests_processed < self.config.max_requests {
            match listener.accept() {
                Ok(stream) => {
                    self.requests_processed += 1;
                    handle_connection(stream, listener.local_identity(), self.app, self.config);
                }
                // On Unix, std translates errno EMFILE (Too many open files) into
                // ErrorKind::Other (stable) or ErrorKind::Uncategorized (unstable).
                // The docs say that we shouldn't use either of these.
                // So we check for the POSIX errno EMFILE value: 24.
                Err(e) if e.raw_os_error() == Some(24) => {
                    std::thread::sleep(Duration::from_millis(500));
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock
                            | std::io::ErrorKind::ConnectionAborted
                            | std::io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    crate::log::error("error accepting connection", tag("err", e.to_string()));
                    return;
                }
            }
        }
        crate::log::info(
            "worker exiting, request quota reached",
            tag("requests", self.requests_processed),
        );
    }
}
