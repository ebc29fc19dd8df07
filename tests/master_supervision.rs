//! Supervision tests that fork real worker processes.
//! Everything lives in one test function: signal handlers and the global
//! logger are process-wide, so parallel tests would interfere.
use prefork::log::internal::LogEvent;
use prefork::log::{set_global_logger, Logger};
use prefork::{
    body_from, AppError, Body, RequestContext, ResponseHead, Server, ServerConfig, StartResponse,
};
use signal_hook::consts::{SIGHUP, SIGTERM};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
}
impl Logger for RecordingLogger {
    fn add(&self, event: LogEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn tag_value(event: &LogEvent, name: &str) -> Option<String> {
    event
        .tags
        .iter()
        .find(|tag| tag.name == name)
        .map(|tag| tag.value.to_string())
}

fn events_with_msg(events: &[LogEvent], msg: &str) -> Vec<LogEvent> {
    events
        .iter()
        .filter(|event| tag_value(event, "msg") == Some(format!("{msg:?}")))
        .cloned()
        .collect()
}

fn worker_pids(events: &[LogEvent], msg: &str) -> HashSet<String> {
    events_with_msg(events, msg)
        .iter()
        .filter_map(|event| tag_value(event, "worker"))
        .collect()
}

fn app(_req: &RequestContext, response: &mut StartResponse) -> Result<Body, AppError> {
    response.start(
        ResponseHead::new(200)
            .with_header("Content-Type", "text/plain")
            .with_header("Content-Length", "2"),
    )?;
    Ok(body_from("ok"))
}

fn try_exchange(addr: &str) -> Option<String> {
    let mut stream = TcpStream::connect(addr).ok()?;
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .ok()?;
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").ok()?;
    stream.shutdown(std::net::Shutdown::Write).ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).ok()?;
    Some(response)
}

fn exchange_ok(addr: &str) {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        if let Some(response) = try_exchange(addr) {
            if response.starts_with("HTTP/1.1 200 OK\r\n") {
                return;
            }
        }
        assert!(
            Instant::now() < deadline,
            "no 200 response from {addr} in time"
        );
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn wait_until(deadline_secs: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(deadline_secs);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    false
}

#[test]
fn master_supervises_forked_workers() {
    let events: Arc<Mutex<Vec<LogEvent>>> = Arc::new(Mutex::new(Vec::new()));
    set_global_logger(RecordingLogger {
        events: events.clone(),
    })
    .unwrap();
    let snapshot = || events.lock().unwrap().clone();

    let config = ServerConfig::new()
        .with_listen("127.0.0.1:0")
        .with_workers(2)
        .with_max_requests(2)
        .without_proctitle();
    let mut server = Server::new(config, app);
    server.bind().unwrap();
    let (host, port) = server.listen_identities().remove(0);
    let addr = format!("{host}:{port}");
    let handle = std::thread::spawn(move || server.serve());

    // The initial pool serves requests.
    exchange_ok(&addr);
    assert!(wait_until(10, || {
        worker_pids(&snapshot(), "spawned worker").len() >= 2
    }));

    // Each worker exits after 2 connections; the master replaces it within
    // a tick and service continues.
    for _ in 0..6 {
        exchange_ok(&addr);
    }
    assert!(
        wait_until(15, || {
            let events = snapshot();
            worker_pids(&events, "spawned worker").len() >= 4
                && !worker_pids(&events, "reaped worker").is_empty()
        }),
        "expected exhausted workers to be reaped and replaced"
    );

    // Reload fully replaces the pool: every pre-reload worker is reaped and
    // the same number of fresh pids appear.
    let before = snapshot();
    let live_before: HashSet<String> = worker_pids(&before, "spawned worker")
        .difference(&worker_pids(&before, "reaped worker"))
        .cloned()
        .collect();
    let spawned_before = worker_pids(&before, "spawned worker").len();
    signal_hook::low_level::raise(SIGHUP).unwrap();
    assert!(
        wait_until(15, || {
            let events = snapshot();
            let reaped = worker_pids(&events, "reaped worker");
            live_before.is_subset(&reaped)
                && worker_pids(&events, "spawned worker").len() >= spawned_before + 2
        }),
        "expected reload to replace every live worker"
    );
    exchange_ok(&addr);

    // Stop: workers are signaled, the loop exits, the socket closes.
    signal_hook::low_level::raise(SIGTERM).unwrap();
    assert!(
        wait_until(15, || handle.is_finished()),
        "master did not stop"
    );
    handle.join().unwrap();
    assert!(!events_with_msg(&snapshot(), "master exiting").is_empty());
    std::thread::sleep(Duration::from_millis(100));
    assert!(
        try_exchange(&addr).map_or(true, |response| response.is_empty()),
        "socket still serving after stop"
    );
}
