//! Error types for backup reading.

use std::{fmt, io};

/// The error type returned from every fallible `Backup` operation.
///
/// All failures are fatal to the operation that produced them; callers may
/// retry by re-opening the backup. The most recent error message is also
/// kept on the context (see [`crate::Backup::last_error`]).
#[derive(Debug)]
pub enum Error {
    /// File or sink I/O failed.
    Io(io::Error),
    /// Malformed outer framing or protobuf.
    Format(String),
    /// HMAC mismatch: corrupted record or wrong passphrase.
    Auth(String),
    /// A cryptographic primitive failed to initialize or finalize.
    Crypto(String),
    /// SQL failure while replaying or querying the database.
    Db(rusqlite::Error),
    /// A recipient or attachment payload that should exist does not.
    Lookup(String),
    /// Internally inconsistent backup contents (length mismatches,
    /// leftover mention placeholders, truncation).
    Corruption(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Format(s) => write!(f, "format error: {s}"),
            Self::Auth(s) => write!(f, "authentication error: {s}"),
            Self::Crypto(s) => write!(f, "crypto error: {s}"),
            Self::Db(e) => write!(f, "database error: {e}"),
            Self::Lookup(s) => write!(f, "lookup error: {s}"),
            Self::Corruption(s) => write!(f, "corruption: {s}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(e)
    }
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub(crate) fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }
}

/// Specialized `Result` for backup operations.
pub type Result<T> = std::result::Result<T, Error>;
