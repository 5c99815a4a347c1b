use std::env;
use std::fs;
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

use crate::sasl::{self, Auth, Guid};
use crate::{BusType, ConnectError, ConnectErrorKind};

use super::{bus_address, escape, Address, RawConnection, RawServer, Transport};

#[derive(Debug, Clone, Copy)]
enum AuthKind {
    /// No authentication.
    None,
    /// Authenticate using the current UID.
    ///
    /// This is only supported if the `libc` feature is enabled.
    #[cfg_attr(not(feature = "libc"), allow(unused))]
    Uid,
}

impl AuthKind {
    #[cfg(not(feature = "libc"))]
    const DEFAULT: Self = Self::None;
    #[cfg(feature = "libc")]
    const DEFAULT: Self = Self::Uid;
}

/// A [`Transport`] over Unix domain sockets.
///
/// This opens the socket and performs the SASL exchange. Registering on a bus
/// requires sending messages, which this transport does not do, so only peer
/// connections can be fully established through it. It can also listen for
/// peers on a socket path.
#[derive(Debug, Clone)]
pub struct UnixTransport {
    auth: AuthKind,
}

impl UnixTransport {
    /// Construct a new transport with the default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_manager::UnixTransport;
    ///
    /// let transport = UnixTransport::new();
    /// ```
    pub fn new() -> Self {
        Self {
            auth: AuthKind::DEFAULT,
        }
    }

    /// Explicitly disable authentication for connections opened by this
    /// transport.
    pub fn no_auth(&mut self) -> &mut Self {
        self.auth = AuthKind::None;
        self
    }

    fn open(&self, address: &str) -> Result<UnixConnection, ConnectError> {
        let mut last_error = None;

        for address in Address::parse_all(address)? {
            let Address::Unix(path) = address;

            let mut stream = match UnixStream::connect(&path) {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::debug!(path = %path.display(), %error, "Failed to connect");
                    last_error = Some(error);
                    continue;
                }
            };

            let guid = sasl::authenticate(&mut stream, self.sasl_auth()?)?;

            if let Some(guid) = guid {
                tracing::debug!(path = %path.display(), %guid, "Authenticated");
            }

            return Ok(UnixConnection {
                stream: Some(stream),
            });
        }

        match last_error {
            Some(error) => Err(error.into()),
            None => Err(ConnectError::new(
                ConnectErrorKind::InvalidAddress,
                format_args!("no usable address in `{address}`"),
            )),
        }
    }

    fn sasl_auth(&self) -> Result<Auth, ConnectError> {
        match self.auth {
            AuthKind::None => Ok(Auth::None),
            #[cfg(feature = "libc")]
            AuthKind::Uid => Ok(Auth::current_uid()),
            #[cfg(not(feature = "libc"))]
            AuthKind::Uid => Err(ConnectError::new(
                ConnectErrorKind::AuthenticationRejected,
                "Authentication using the current UID requires the `libc` feature to be enabled",
            )),
        }
    }
}

impl Default for UnixTransport {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UnixTransport {
    fn connect_standard_bus(
        &mut self,
        bus: BusType,
    ) -> Result<Box<dyn RawConnection>, ConnectError> {
        let address = bus_address(bus, |key| env::var(key).ok())?;
        let mut raw = self.open_address(&address)?;

        if let Err(error) = self.register_on_bus(&mut *raw) {
            raw.close();
            return Err(error);
        }

        Ok(raw)
    }

    fn open_address(&mut self, address: &str) -> Result<Box<dyn RawConnection>, ConnectError> {
        Ok(Box::new(self.open(address)?))
    }

    fn register_on_bus(&mut self, _: &mut dyn RawConnection) -> Result<(), ConnectError> {
        Err(ConnectError::new(
            ConnectErrorKind::RegistrationRejected,
            "registering on a bus requires a message layer",
        ))
    }

    fn open_peer(&mut self, address: &str) -> Result<Box<dyn RawConnection>, ConnectError> {
        Ok(Box::new(self.open(address)?))
    }

    fn listen(&mut self, address: &str) -> Result<Box<dyn RawServer>, ConnectError> {
        let mut last_error = None;

        for candidate in Address::parse_all(address)? {
            let Address::Unix(path) = candidate;

            match UnixListener::bind(&path) {
                Ok(listener) => {
                    let guid = Guid::generate();
                    let address = format!(
                        "unix:path={},guid={guid}",
                        escape(&path.to_string_lossy())
                    );

                    tracing::debug!(%address, "Listening");

                    return Ok(Box::new(UnixServer {
                        address,
                        path,
                        listener: Some(listener),
                        guid,
                    }));
                }
                Err(error) => {
                    tracing::debug!(path = %path.display(), %error, "Failed to listen");
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) => Err(error.into()),
            None => Err(ConnectError::new(
                ConnectErrorKind::InvalidAddress,
                format_args!("no usable address in `{address}`"),
            )),
        }
    }
}

struct UnixConnection {
    stream: Option<UnixStream>,
}

impl RawConnection for UnixConnection {
    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone, which is fine.
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

struct UnixServer {
    address: String,
    path: PathBuf,
    listener: Option<UnixListener>,
    guid: Guid,
}

impl RawServer for UnixServer {
    fn address(&self) -> &str {
        &self.address
    }

    fn accept(&mut self) -> Result<Box<dyn RawConnection>, ConnectError> {
        let Some(listener) = &self.listener else {
            return Err(ConnectError::new(
                ConnectErrorKind::Unreachable,
                "server is closed",
            ));
        };

        let (mut stream, _) = listener.accept()?;
        sasl::serve(&mut stream, &self.guid)?;

        Ok(Box::new(UnixConnection {
            stream: Some(stream),
        }))
    }

    fn close(&mut self) {
        if self.listener.take().is_some() {
            if let Err(error) = fs::remove_file(&self.path) {
                tracing::debug!(path = %self.path.display(), %error, "Failed to remove socket");
            }
        }
    }
}
