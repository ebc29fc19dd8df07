use crate::http_error::StartupError;
use nix::sys::socket::{
    bind, listen, setsockopt, socket, sockopt::ReuseAddr, AddressFamily, Backlog, SockFlag,
    SockType, SockaddrIn, SockaddrIn6, UnixAddr,
};
use std::fmt::{Display, Formatter};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

/// Name of the environment variable an external process manager uses to hand
/// the server an already-bound listening socket: `host=port=fd`.
pub const SERVER_STARTER_ENV: &str = "SERVER_STARTER_PORT";

/// A configured listen address: a TCP `host:port` pair or a filesystem path
/// designating a UNIX-domain socket.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}
impl Endpoint {
    /// Parses a listen spec: `host:port` when the spec contains a colon,
    /// otherwise a UNIX socket path.
    ///
    /// # Errors
    /// Returns an error when the port is not a number.
    pub fn parse(spec: &str) -> Result<Self, StartupError> {
        if let Some((host, port)) = spec.rsplit_once(':') {
            let port: u16 = port
                .parse()
                .map_err(|_| StartupError::InvalidEndpoint(spec.to_string()))?;
            Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            })
        } else {
            Ok(Endpoint::Unix(PathBuf::from(spec)))
        }
    }

    /// Creates the listening socket: `SO_REUSEADDR`, bind, listen.
    /// A stale UNIX socket file is removed before binding.
    ///
    /// # Errors
    /// Returns an error when the address is already bound, permission is
    /// denied, or the host does not resolve. All of these are fatal.
    pub fn bind(&self, backlog: u32) -> Result<Listener, StartupError> {
        let bind_err = |e: nix::errno::Errno| {
            StartupError::Bind(self.to_string(), std::io::Error::from_raw_os_error(e as i32))
        };
        match self {
            Endpoint::Tcp { host, port } => {
                let addr = (host.as_str(), *port)
                    .to_socket_addrs()
                    .map_err(|e| StartupError::Bind(self.to_string(), e))?
                    .next()
                    .ok_or_else(|| StartupError::InvalidEndpoint(self.to_string()))?;
                let family = match addr {
                    SocketAddr::V4(..) => AddressFamily::Inet,
                    SocketAddr::V6(..) => AddressFamily::Inet6,
                };
                let fd = socket(family, SockType::Stream, SockFlag::empty(), None)
                    .map_err(bind_err)?;
                setsockopt(&fd, ReuseAddr, &true).map_err(bind_err)?;
                match addr {
                    SocketAddr::V4(v4) => {
                        bind(fd.as_raw_fd(), &SockaddrIn::from(v4)).map_err(bind_err)?;
                    }
                    SocketAddr::V6(v6) => {
                        bind(fd.as_raw_fd(), &SockaddrIn6::from(v6)).map_err(bind_err)?;
                    }
                }
                listen(&fd, listen_backlog(backlog)).map_err(bind_err)?;
                Ok(Listener::Tcp(unsafe {
                    TcpListener::from_raw_fd(fd.into_raw_fd())
                }))
            }
            Endpoint::Unix(path) => {
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(StartupError::Bind(self.to_string(), e)),
                }
                let fd = socket(
                    AddressFamily::Unix,
                    SockType::Stream,
                    SockFlag::empty(),
                    None,
                )
                .map_err(bind_err)?;
                let addr = UnixAddr::new(path).map_err(bind_err)?;
                bind(fd.as_raw_fd(), &addr).map_err(bind_err)?;
                listen(&fd, listen_backlog(backlog)).map_err(bind_err)?;
                Ok(Listener::Unix(unsafe {
                    UnixListener::from_raw_fd(fd.into_raw_fd())
                }))
            }
        }
    }
}
impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{host}:{port}"),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

fn listen_backlog(backlog: u32) -> Backlog {
    Backlog::new(i32::try_from(backlog).unwrap_or(i32::MAX)).unwrap_or(Backlog::MAXCONN)
}

/// Adopts the pre-bound listening socket described by `SERVER_STARTER_PORT`,
/// if the variable is set. The descriptor is already bound by the external
/// supervisor; only `listen` is re-applied with the configured backlog.
///
/// # Errors
/// Returns an error when the variable is malformed or `listen` fails.
pub fn inherited_listener(backlog: u32) -> Result<Option<Listener>, StartupError> {
    let Ok(value) = std::env::var(SERVER_STARTER_ENV) else {
        return Ok(None);
    };
    let mut parts = value.split('=');
    let (Some(_host), Some(_port), Some(fd_str)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(StartupError::InheritedSocket(format!(
            "expected host=port=fd, got {value:?}"
        )));
    };
    let fd: RawFd = fd_str
        .parse()
        .map_err(|_| StartupError::InheritedSocket(format!("bad fd {fd_str:?}")))?;
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    listen(&borrowed, listen_backlog(backlog))
        .map_err(|e| StartupError::InheritedSocket(format!("listen on fd {fd}: {e}")))?;
    Ok(Some(Listener::Tcp(unsafe { TcpListener::from_raw_fd(fd) })))
}

/// A bound listening socket. The master creates these and every forked
/// worker inherits them; workers never close them.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}
impl Listener {
    /// Blocks until a client connects.
    ///
    /// # Errors
    /// Returns an error when the accept call fails.
    pub fn accept(&self) -> Result<Stream, std::io::Error> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _addr) = listener.accept()?;
                Ok(Stream::Tcp(stream))
            }
            Listener::Unix(listener) => {
                let (stream, _addr) = listener.accept()?;
                Ok(Stream::Unix(stream))
            }
        }
    }

    /// The local identity of the socket, as `(name, port)` strings for the
    /// request context. UNIX sockets report their path and an empty port.
    #[must_use]
    pub fn local_identity(&self) -> (String, String) {
        match self {
            Listener::Tcp(listener) => match listener.local_addr() {
                Ok(addr) => (addr.ip().to_string(), addr.port().to_string()),
                Err(..) => (String::new(), String::new()),
            },
            Listener::Unix(listener) => {
                let name = listener
                    .local_addr()
                    .ok()
                    .and_then(|addr| addr.as_pathname().map(|p| p.display().to_string()))
                    .unwrap_or_default();
                (name, String::new())
            }
        }
    }
}

/// One accepted client connection.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}
impl Stream {
    /// The peer identity, as `(address, port)` strings for the request
    /// context. UNIX peers have neither.
    #[must_use]
    pub fn remote_identity(&self) -> (String, String) {
        match self {
            Stream::Tcp(stream) => match stream.peer_addr() {
                Ok(addr) => (addr.ip().to_string(), addr.port().to_string()),
                Err(..) => (String::new(), String::new()),
            },
            Stream::Unix(..) => (String::new(), String::new()),
        }
    }

    pub fn shutdown(&self) {
        let _ignored = match self {
            Stream::Tcp(stream) => stream.shutdown(std::net::Shutdown::Both),
            Stream::Unix(stream) => stream.shutdown(std::net::Shutdown::Both),
        };
    }
}
impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        match self {
            Stream::Tcp(stream) => stream.read(buf),
            Stream::Unix(stream) => stream.read(buf),
        }
    }
}
impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, std::io::Error> {
        match self {
            Stream::Tcp(stream) => stream.write(buf),
            Stream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> Result<(), std::io::Error> {
        match self {
            Stream::Tcp(stream) => stream.flush(),
            Stream::Unix(stream) => stream.flush(),
        }
    }
}
