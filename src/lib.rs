//! Manages named, shared connections to D-Bus message buses and peers.
//!
//! A [`ConnectionManager`] owns a dedicated dispatch thread on which every
//! connection is established and closed. Callers acquire connections by
//! name, concurrent requests for the same name are served by a single
//! connection attempt, and a connection lives for as long as it is acquired
//! or referenced by a [`Connection`] handle.
//!
//! How connections are physically established is decided by a [`Transport`].
//! The bundled [`UnixTransport`] connects over Unix domain sockets.
//!
//! Introspection data can be parsed with the [`introspection`] module.
//!
//! ```no_run
//! use dbus_manager::{ConnectionManager, UnixTransport};
//!
//! let manager = ConnectionManager::builder()
//!     .transport(UnixTransport::new())
//!     .build()?;
//!
//! let peer = manager.connect_to_peer("unix:path=/tmp/peer.sock", "peer")?;
//!
//! if peer.is_connected() {
//!     println!("Connected to peer");
//! }
//!
//! manager.release("peer");
//! # Ok::<_, dbus_manager::Error>(())
//! ```

#![allow(clippy::module_inception)]

#[doc(inline)]
pub use self::bus::{BusType, ConnectionKind, RequestKind, SESSION_BUS_NAME, SYSTEM_BUS_NAME};
mod bus;

#[doc(inline)]
pub use self::connection::{ConnectError, ConnectErrorKind, Connection, Server};
mod connection;

#[doc(inline)]
pub use self::error::{Error, Result};
mod error;

#[doc(inline)]
pub use self::manager::{ConnectionManager, ManagerBuilder};
mod manager;

mod sasl;

#[doc(inline)]
pub use self::transport::{RawConnection, RawServer, Transport, UnixTransport};
mod transport;

#[doc(inline)]
pub use dbus_manager_xml as introspection;
