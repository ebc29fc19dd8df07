use crate::config::ServerConfig;
use crate::endpoint::{inherited_listener, Endpoint, Listener};
use crate::gateway::Application;
use crate::http_error::StartupError;
use crate::log::{add_thread_local_log_tag, clear_thread_local_log_tags, tag};
use crate::unix;
use crate::worker::Worker;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGTTIN, SIGTTOU};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);
const DEFAULT_LISTEN: &str = "0.0.0.0:5000";

/// Pending-signal flags. Handler bodies only set a flag; every state
/// transition happens synchronously inside the next control-loop tick, so
/// nothing signal-handler-unsafe ever runs in handler context.
pub struct SignalFlags {
    reload: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    scale_up: Arc<AtomicBool>,
    scale_down: Arc<AtomicBool>,
}
impl SignalFlags {
    /// Installs the master's handlers:
    /// SIGHUP reload, SIGTERM/SIGINT/SIGQUIT stop, SIGTTIN up, SIGTTOU down.
    ///
    /// # Errors
    /// Returns an error when a handler cannot be installed.
    pub fn register() -> Result<Self, std::io::Error> {
        let flags = Self {
            reload: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            scale_up: Arc::new(AtomicBool::new(false)),
            scale_down: Arc::new(AtomicBool::new(false)),
        };
        signal_hook::flag::register(SIGHUP, flags.reload.clone())?;
        for sig in [SIGTERM, SIGINT, SIGQUIT] {
            signal_hook::flag::register(sig, flags.stop.clone())?;
        }
        signal_hook::flag::register(SIGTTIN, flags.scale_up.clone())?;
        signal_hook::flag::register(SIGTTOU, flags.scale_down.clone())?;
        Ok(flags)
    }

    fn take(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }

    #[must_use]
    pub fn take_reload(&self) -> bool {
        Self::take(&self.reload)
    }

    #[must_use]
    pub fn take_stop(&self) -> bool {
        Self::take(&self.stop)
    }

    #[must_use]
    pub fn take_scale_up(&self) -> bool {
        Self::take(&self.scale_up)
    }

    #[must_use]
    pub fn take_scale_down(&self) -> bool {
        Self::take(&self.scale_down)
    }
}

/// Picks the `excess` oldest workers by spawn timestamp.
/// Scale-down retires the longest-running processes first.
fn retire_candidates(workers: &HashMap<Pid, Instant>, excess: usize) -> Vec<Pid> {
    let mut by_age: Vec<(Instant, Pid)> = workers
        .iter()
        .map(|(pid, spawned)| (*spawned, *pid))
        .collect();
    by_age.sort();
    by_age.into_iter().take(excess).map(|(_t, pid)| pid).collect()
}

/// The master process: binds the listening sockets, forks the worker pool,
/// and supervises it for the server's lifetime.
///
/// One instance per server invocation. The supervision loop runs a
/// one-second tick: drain pending signals, reap exited workers, then
/// reconcile the live pool against the desired count.
pub struct Server {
    config: ServerConfig,
    app: Arc<dyn Application>,
    desired_workers: usize,
    workers: HashMap<Pid, Instant>,
    listeners: Vec<Listener>,
    unix_paths: Vec<PathBuf>,
    signals: Option<SignalFlags>,
    running: bool,
}
impl Server {
    #[must_use]
    pub fn new(config: ServerConfig, app: impl Application) -> Self {
        let desired_workers = config.workers.max(1);
        Self {
            config,
            app: Arc::new(app),
            desired_workers,
            workers: HashMap::new(),
            listeners: Vec::new(),
            unix_paths: Vec::new(),
            signals: None,
            running: true,
        }
    }

    /// Runs the server until a stop signal arrives.
    ///
    /// # Errors
    /// Returns an error when startup fails; nothing was served yet and the
    /// caller should exit with a non-zero status.
    pub fn run(mut self) -> Result<(), StartupError> {
        self.bind()?;
        self.serve();
        Ok(())
    }

    /// Prepares the process for serving: daemonize, PID file, listening
    /// sockets, privilege drop, signal handlers.
    ///
    /// Order matters: daemonize first (it changes the pid), then the PID
    /// file, then bind sockets, then drop privileges, so a root-started
    /// server binds privileged ports before giving up the right to.
    ///
    /// # Errors
    /// Returns an error when any step fails. All of these are fatal.
    pub fn bind(&mut self) -> Result<(), StartupError> {
        if self.config.daemonize {
            unix::daemonize(self.config.error_log.as_deref())?;
        }
        if let Some(path) = &self.config.pid_file {
            unix::write_pid_file(path)?;
        }
        if self.config.set_proctitle {
            unix::set_proc_title("master");
        }
        clear_thread_local_log_tags();
        add_thread_local_log_tag("pid", std::process::id());
        self.setup_listeners()?;
        unix::drop_privileges(self.config.user.as_deref(), self.config.group.as_deref())?;
        self.signals = Some(SignalFlags::register().map_err(StartupError::Signals)?);
        Ok(())
    }

    /// The local identities of the bound sockets, `(name, port)` per
    /// endpoint. Useful after binding port 0.
    #[must_use]
    pub fn listen_identities(&self) -> Vec<(String, String)> {
        self.listeners.iter().map(Listener::local_identity).collect()
    }

    /// Spawns the initial worker pool and runs the supervision loop until a
    /// stop signal arrives. Call [`bind`](Server::bind) first.
    ///
    /// # Panics
    /// Panics when called without a successful `bind`.
    pub fn serve(mut self) {
        let signals = self.signals.take().expect("serve called before bind");
        self.spawn_missing_workers();
        while self.running {
            self.check_signals(&signals);
            if !self.running {
                break;
            }
            self.reap_workers(false);
            self.maintain_worker_count();
            std::thread::sleep(TICK);
        }
        crate::log::info("master exiting", ());
        self.shutdown_cleanup();
    }

    /// Adopts a supervisor-inherited socket when one is offered, otherwise
    /// binds every configured endpoint.
    fn setup_listeners(&mut self) -> Result<(), StartupError> {
        if let Some(listener) = inherited_listener(self.config.backlog)? {
            crate::log::info("adopted socket from supervisor", ());
            self.listeners.push(listener);
            return Ok(());
        }
        let specs = if self.config.listen.is_empty() {
            vec![DEFAULT_LISTEN.to_string()]
        } else {
            self.config.listen.clone()
        };
        for spec in specs {
            let endpoint = Endpoint::parse(&spec)?;
            let listener = endpoint.bind(self.config.backlog)?;
            crate::log::info("listening", tag("endpoint", endpoint.to_string()));
            if let Endpoint::Unix(path) = &endpoint {
                self.unix_paths.push(path.clone());
            }
            self.listeners.push(listener);
        }
        Ok(())
    }

    /// Consumes the pending-signal flags, performing at most one
    /// reload/stop/scale transition per flag set.
    fn check_signals(&mut self, signals: &SignalFlags) {
        if signals.take_reload() {
            crate::log::info(
                "reload, replacing all workers",
                tag("count", self.workers.len()),
            );
            self.kill_workers(Signal::SIGTERM);
            self.reap_workers(true);
            self.spawn_missing_workers();
        }
        if signals.take_stop() {
            crate::log::info("stop requested", ());
            self.kill_workers(Signal::SIGTERM);
            self.reap_workers(false);
            self.running = false;
        }
        if signals.take_scale_up() {
            self.desired_workers += 1;
            crate::log::info("increasing worker count", tag("desired", self.desired_workers));
        }
        if signals.take_scale_down() && self.desired_workers > 1 {
            self.desired_workers -= 1;
            crate::log::info("decreasing worker count", tag("desired", self.desired_workers));
        }
    }

    /// Removes exited workers from the map. With `block` set, waits until
    /// every tracked worker has been reaped; the reload path uses this
    /// between killing the old pool and spawning the new one.
    fn reap_workers(&mut self, block: bool) {
        if block && self.workers.is_empty() {
            return;
        }
        loop {
            let flag = if block {
                None
            } else {
                Some(WaitPidFlag::WNOHANG)
            };
            match waitpid(None, flag) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status) => {
                    if let Some(pid) = status.pid() {
                        if self.workers.remove(&pid).is_some() {
                            crate::log::info("reaped worker", tag("worker", pid.as_raw()));
                        }
                    }
                    if block && self.workers.is_empty() {
                        break;
                    }
                }
                Err(Errno::ECHILD) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    crate::log::error("waitpid failed", tag("err", e.to_string()));
                    break;
                }
            }
        }
    }

    /// Reconciles the live pool against the desired count: spawns the
    /// deficit, or requests termination of the oldest excess workers.
    /// Termination is requested, not awaited; the next tick reaps.
    fn maintain_worker_count(&mut self) {
        let live = self.workers.len();
        if live < self.desired_workers {
            self.spawn_missing_workers();
        } else if live > self.desired_workers {
            for pid in retire_candidates(&self.workers, live - self.desired_workers) {
                crate::log::info("retiring worker", tag("worker", pid.as_raw()));
                self.kill_worker(pid, Signal::SIGTERM);
            }
        }
    }

    fn spawn_missing_workers(&mut self) {
        let deficit = self.desired_workers.saturating_sub(self.workers.len());
        for _ in 0..deficit {
            self.spawn_worker();
        }
    }

    /// Forks one worker. The child serves until its quota and always exits
    /// with status 0; it must never return into the master's code.
    fn spawn_worker(&mut self) {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                if self.config.set_proctitle {
                    unix::set_proc_title("worker");
                }
                Worker::reset_signal_dispositions();
                clear_thread_local_log_tags();
                add_thread_local_log_tag("pid", std::process::id());
                Worker::new(self.app.as_ref(), &self.config, &self.listeners).run();
                std::process::exit(0);
            }
            Ok(ForkResult::Parent { child }) => {
                self.workers.insert(child, Instant::now());
                crate::log::info("spawned worker", tag("worker", child.as_raw()));
            }
            Err(e) => {
                // Retried on the next reconciliation tick.
                crate::log::error("fork failed", tag("err", e.to_string()));
            }
        }
    }

    fn kill_worker(&mut self, pid: Pid, sig: Signal) {
        match kill(pid, sig) {
            Ok(()) => {}
            Err(Errno::ESRCH) => {
                self.workers.remove(&pid);
            }
            Err(e) => {
                crate::log::error(
                    "error signaling worker",
                    vec![tag("worker", pid.as_raw()), tag("err", e.to_string())],
                );
            }
        }
    }

    fn kill_workers(&mut self, sig: Signal) {
        for pid in self.workers.keys().copied().collect::<Vec<Pid>>() {
            self.kill_worker(pid, sig);
        }
    }

    /// Closes the listening sockets and removes the files the server
    /// created. Only the master ever closes the shared sockets.
    fn shutdown_cleanup(&mut self) {
        self.listeners.clear();
        for path in &self.unix_paths {
            let _ignored = std::fs::remove_file(path);
        }
        if let Some(path) = &self.config.pid_file {
            let _ignored = std::fs::remove_file(path);
        }
    }
}
