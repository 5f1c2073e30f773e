use std::io;

use thiserror::Error;

/// Canonical result for stagebuf.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not be allocated.
    #[error("anonymous file: {0}")]
    Allocation(#[source] io::Error),

    /// Seeding the backing store from the initial content failed partway.
    #[error("copy: {0}")]
    Copy(#[source] io::Error),

    // Post-construction store failures that surface through this type rather
    // than as a bare `io::Error` (e.g. the size query behind `stat`).
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse category of an [`Error`], for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Allocation,
    Copy,
    Io,
    Config,
}

impl Error {
    pub fn io(context: &'static str, source: io::Error) -> Self {
        Error::Io { context, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Allocation(_) => ErrorKind::Allocation,
            Error::Copy(_) => ErrorKind::Copy,
            Error::Io { .. } => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// The underlying I/O error, if this error came from the backing store.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Error::Allocation(e) | Error::Copy(e) => Some(e),
            Error::Io { source, .. } => Some(source),
            Error::Config(_) => None,
        }
    }
}
