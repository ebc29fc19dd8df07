#![allow(dead_code)]

use prefork::{Application, Endpoint, ServerConfig, Worker};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Runs one worker loop in a thread, serving a freshly bound localhost
/// socket. The worker logic is the same code a forked worker runs; only the
/// process boundary is missing.
pub struct TestWorker {
    pub addr: String,
    handle: Option<JoinHandle<()>>,
}
impl TestWorker {
    pub fn start(app: impl Application, config: ServerConfig) -> Self {
        let listener = Endpoint::parse("127.0.0.1:0").unwrap().bind(16).unwrap();
        let (host, port) = listener.local_identity();
        let addr = format!("{host}:{port}");
        let handle = std::thread::spawn(move || {
            let listeners = vec![listener];
            Worker::new(&app, &config, &listeners).run();
        });
        Self {
            addr,
            handle: Some(handle),
        }
    }

    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(&self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        stream
    }

    /// Sends bytes, half-closes, and reads everything the server answers.
    pub fn exchange(&self, send: impl AsRef<[u8]>) -> String {
        let mut stream = self.connect();
        stream.write_all(send.as_ref()).unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut string = String::new();
        let _ignored = stream.read_to_string(&mut string);
        string
    }

    /// Waits for the worker thread to finish, failing the test if it is
    /// still accepting after `timeout`.
    pub fn join(mut self, timeout: Duration) {
        let handle = self.handle.take().unwrap();
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            assert!(Instant::now() < deadline, "worker did not exit in time");
            std::thread::sleep(Duration::from_millis(10));
        }
        handle.join().unwrap();
    }
}
impl Drop for TestWorker {
    fn drop(&mut self) {
        // The worker thread may still be blocked in accept; the process
        // exiting cleans it up.
        self.handle.take();
    }
}

/// Reads one complete response: the head, then `Content-Length` body bytes.
pub fn read_response(stream: &mut TcpStream) -> Result<String, std::io::Error> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut bytes = Vec::new();
    loop {
        let now = Instant::now();
        if deadline < now {
            return Err(std::io::Error::new(ErrorKind::TimedOut, "timed out"));
        }
        stream.set_read_timeout(Some(deadline.duration_since(now)))?;
        let mut buf = [0_u8; 1];
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(..) => bytes.push(buf[0]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(std::io::Error::new(ErrorKind::TimedOut, "timed out"))
            }
            Err(e) => return Err(e),
        }
        if bytes.len() >= 4 && &bytes[(bytes.len() - 4)..] == b"\r\n\r\n" {
            break;
        }
    }
    let head = String::from_utf8_lossy(&bytes).to_string();
    let content_length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);
    if content_length > 0 {
        let mut body = vec![0_u8; content_length];
        stream.read_exact(&mut body)?;
        bytes.extend_from_slice(&body);
    }
    String::from_utf8(bytes)
        .map_err(|_| std::io::Error::new(ErrorKind::InvalidData, "bytes are not UTF-8"))
}

/// Reads whatever arrives within `duration`, without expecting a close.
pub fn read_for(stream: &mut TcpStream, duration: Duration) -> String {
    let deadline = Instant::now() + duration;
    let mut bytes = Vec::new();
    loop {
        let now = Instant::now();
        if deadline < now {
            break;
        }
        stream
            .set_read_timeout(Some(deadline.duration_since(now)))
            .unwrap();
        let mut buf = [0_u8; 1024];
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => bytes.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(..) => break,
        }
    }
    String::from_utf8_lossy(&bytes).to_string()
}
