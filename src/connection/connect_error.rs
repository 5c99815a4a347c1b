use std::error;
use std::fmt;
use std::io;

/// The kind of a [`ConnectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConnectErrorKind {
    /// The bus or peer could not be reached.
    Unreachable,
    /// The address was malformed, unsupported or missing.
    InvalidAddress,
    /// The remote end rejected authentication.
    AuthenticationRejected,
    /// The bus rejected registration of the connection.
    RegistrationRejected,
    /// The transport does not support the operation.
    Unsupported,
    /// Some other I/O error.
    Io,
}

impl fmt::Display for ConnectErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectErrorKind::Unreachable => write!(f, "Unreachable"),
            ConnectErrorKind::InvalidAddress => write!(f, "Invalid address"),
            ConnectErrorKind::AuthenticationRejected => write!(f, "Authentication rejected"),
            ConnectErrorKind::RegistrationRejected => write!(f, "Registration rejected"),
            ConnectErrorKind::Unsupported => write!(f, "Unsupported"),
            ConnectErrorKind::Io => write!(f, "I/O error"),
        }
    }
}

/// The error state of a connection which could not be established.
///
/// This is produced by a [`Transport`] and attached to the resulting
/// [`Connection`].
///
/// [`Transport`]: crate::Transport
/// [`Connection`]: crate::Connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectError {
    kind: ConnectErrorKind,
    message: Box<str>,
}

impl ConnectError {
    /// Construct a new connect error.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_manager::{ConnectError, ConnectErrorKind};
    ///
    /// let error = ConnectError::new(ConnectErrorKind::Unreachable, "bus is down");
    /// assert_eq!(error.kind(), ConnectErrorKind::Unreachable);
    /// assert_eq!(error.message(), "bus is down");
    /// ```
    pub fn new(kind: ConnectErrorKind, message: impl fmt::Display) -> Self {
        Self {
            kind,
            message: message.to_string().into(),
        }
    }

    /// The kind of the error.
    #[inline]
    pub fn kind(&self) -> ConnectErrorKind {
        self.kind
    }

    /// A human readable description of the error.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for ConnectError {
    fn from(error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::NotFound
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::PermissionDenied => ConnectErrorKind::Unreachable,
            _ => ConnectErrorKind::Io,
        };

        Self::new(kind, error)
    }
}

impl fmt::Display for ConnectError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl error::Error for ConnectError {}
