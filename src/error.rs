//! Error types for the mmdb-reader library
use std::fmt;

/// Result type alias for mmdb-reader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for MMDB read operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad argument: unknown mode, malformed address, IPv6 address looked up in an
    /// IPv4-only database, wrong argument type.
    InvalidArgument(String),

    /// The database path does not exist or could not be read.
    FileNotFound(String),

    /// The file is not a well-formed MMDB: missing sentinel, truncated records,
    /// unknown type tag, out-of-bounds data pointer, bad `record_size`, etc.
    InvalidDatabase(String),

    /// A string or map key was not valid UTF-8.
    InvalidUtf8(String),

    /// The Reader has been closed; any further use (besides another `close`) is an error.
    ClosedDatabase,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::FileNotFound(msg) => write!(f, "file not found: {}", msg),
            Error::InvalidDatabase(msg) => write!(f, "invalid database: {}", msg),
            Error::InvalidUtf8(msg) => write!(f, "invalid UTF-8: {}", msg),
            Error::ClosedDatabase => write!(f, "database has been closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(err.to_string()),
            _ => Error::InvalidDatabase(err.to_string()),
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::InvalidDatabase(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::InvalidDatabase(msg.to_string())
    }
}
