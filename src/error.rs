use std::error;
use std::fmt;
use std::io;

/// Result alias using an [`Error`] as the error type by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised by the [`ConnectionManager`].
///
/// Failures to reach or authenticate with a bus are not reported through this
/// type; they are attached to the returned [`Connection`] instead and can be
/// inspected through [`Connection::last_error`].
///
/// [`ConnectionManager`]: crate::ConnectionManager
/// [`Connection`]: crate::Connection
/// [`Connection::last_error`]: crate::Connection::last_error
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Self { kind }
    }

    /// Test if the error was caused by requesting a connection without a
    /// name.
    #[inline]
    pub fn is_empty_name(&self) -> bool {
        matches!(self.kind, ErrorKind::EmptyName)
    }

    /// Test if the error was caused by the dispatch thread no longer running.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        matches!(self.kind, ErrorKind::Shutdown)
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::EmptyName => write!(f, "Connection name must not be empty"),
            ErrorKind::Shutdown => write!(f, "Dispatch thread is not running"),
            ErrorKind::Spawn(..) => write!(f, "Failed to spawn dispatch thread"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Spawn(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ErrorKind {
    EmptyName,
    Shutdown,
    Spawn(io::Error),
}
