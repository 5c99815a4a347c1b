//! The boundary between the connection manager and the code which actually
//! talks to a bus.
//!
//! Every method of a [`Transport`] is called on the dispatch thread, one at a
//! time, so implementations do not need to be thread safe beyond being
//! [`Send`].


pub(crate) use self::address::{bus_address, escape, Address};
mod address;

pub use self::unix::UnixTransport;
mod unix;

use crate::{BusType, ConnectError, ConnectErrorKind};

/// Establishes raw connections on behalf of the [`ConnectionManager`].
///
/// [`ConnectionManager`]: crate::ConnectionManager
pub trait Transport: Send + 'static {
    /// Connect to one of the standard buses, including registering on it.
    fn connect_standard_bus(&mut self, bus: BusType)
        -> Result<Box<dyn RawConnection>, ConnectError>;

    /// Open a connection to the given bus address without registering on it.
    fn open_address(&mut self, address: &str) -> Result<Box<dyn RawConnection>, ConnectError>;

    /// Register a connection previously opened through
    /// [`Transport::open_address`] on its bus.
    fn register_on_bus(&mut self, raw: &mut dyn RawConnection) -> Result<(), ConnectError>;

    /// Open a direct connection to a peer.
    fn open_peer(&mut self, address: &str) -> Result<Box<dyn RawConnection>, ConnectError>;

    /// Start listening for peer connections on the given address.
    ///
    /// Transports which cannot accept connections keep the default, which
    /// reports [`ConnectErrorKind::Unsupported`].
    fn listen(&mut self, address: &str) -> Result<Box<dyn RawServer>, ConnectError> {
        Err(ConnectError::new(
            ConnectErrorKind::Unsupported,
            format_args!("cannot listen on `{address}`"),
        ))
    }
}

/// A connection established by a [`Transport`].
pub trait RawConnection: Send + 'static {
    /// The unique name assigned by the bus during registration.
    fn unique_name(&self) -> Option<&str> {
        None
    }

    /// Close the connection.
    ///
    /// This is called exactly once, on the dispatch thread while it is
    /// running.
    fn close(&mut self);
}

/// A listening server established by a [`Transport`].
pub trait RawServer: Send + 'static {
    /// The address peers connect to, which may carry more detail than the
    /// address the server was requested on.
    fn address(&self) -> &str;

    /// Block until the next peer has connected and authenticated.
    fn accept(&mut self) -> Result<Box<dyn RawConnection>, ConnectError>;

    /// Stop listening.
    ///
    /// This is called exactly once, on the dispatch thread while it is
    /// running.
    fn close(&mut self);
}
