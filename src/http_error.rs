use std::fmt::{Display, Formatter};
use std::io::ErrorKind;

/// Errors raised while reading, parsing, or answering a single connection.
/// None of these terminate the worker; the connection handler closes the
/// socket and the worker keeps accepting.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq)]
pub enum HttpError {
    AppFailed,
    Disconnected,
    HeadTooLong,
    InvalidContentLength,
    Io(ErrorKind),
    MalformedHeaderLine,
    MalformedPath,
    MalformedRequestLine,
    MissingRequestLine,
    ResponseAlreadySent,
    ResponseAlreadyStarted,
    UnsupportedProtocol,
    UnsupportedTransferEncoding,
}
impl HttpError {
    /// Returns true when the error is the server's fault rather than the
    /// client's. Server-fault errors get logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        match self {
            HttpError::AppFailed
            | HttpError::ResponseAlreadySent
            | HttpError::ResponseAlreadyStarted => true,
            HttpError::Disconnected
            | HttpError::HeadTooLong
            | HttpError::InvalidContentLength
            | HttpError::Io(..)
            | HttpError::MalformedHeaderLine
            | HttpError::MalformedPath
            | HttpError::MalformedRequestLine
            | HttpError::MissingRequestLine
            | HttpError::UnsupportedProtocol
            | HttpError::UnsupportedTransferEncoding => false,
        }
    }

    #[must_use]
    pub fn description(&self) -> String {
        match self {
            HttpError::Io(kind) => format!("HttpError::Io({kind:?})"),
            other => format!("HttpError::{other:?}"),
        }
    }
}
impl From<std::io::Error> for HttpError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::UnexpectedEof => HttpError::Disconnected,
            kind => HttpError::Io(kind),
        }
    }
}
impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.description())
    }
}

/// Errors that abort startup before the server accepts any traffic.
/// The process must exit with a non-zero status on any of these.
#[derive(Debug)]
pub enum StartupError {
    Bind(String, std::io::Error),
    Daemonize(String),
    InheritedSocket(String),
    InvalidEndpoint(String),
    PidFile(std::io::Error),
    PrivilegeDrop(String),
    Signals(std::io::Error),
}
impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            StartupError::Bind(endpoint, e) => write!(f, "error binding {endpoint}: {e}"),
            StartupError::Daemonize(msg) => write!(f, "error daemonizing: {msg}"),
            StartupError::InheritedSocket(msg) => {
                write!(f, "error adopting inherited socket: {msg}")
            }
            StartupError::InvalidEndpoint(spec) => write!(f, "invalid listen endpoint {spec:?}"),
            StartupError::PidFile(e) => write!(f, "error writing pid file: {e}"),
            StartupError::PrivilegeDrop(msg) => write!(f, "error dropping privileges: {msg}"),
            StartupError::Signals(e) => write!(f, "error installing signal handlers: {e}"),
        }
    }
}
impl std::error::Error for StartupError {}
