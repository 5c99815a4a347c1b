use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use crate::bus::{BusType, RequestKind, SESSION_BUS_NAME, SYSTEM_BUS_NAME};
use crate::error::{ErrorKind, Result};
use crate::{Connection, Server};

use super::dispatch::{ConnectionRequest, ListenRequest, Message};
use super::registry::Registry;
use super::ManagerBuilder;

/// Owns named connections and the thread they are established and closed
/// on.
///
/// Connections are acquired by name. The first acquisition of a name
/// establishes the connection on the dispatch thread, and every further
/// acquisition of the same name returns a handle to that same connection
/// until it has been released as many times as it was acquired.
///
/// Dropping the manager stops the dispatch thread, see
/// [`ConnectionManager::shutdown`].
///
/// # Examples
///
/// ```no_run
/// use dbus_manager::ConnectionManager;
///
/// let manager = ConnectionManager::new()?;
/// let bus = manager.session_bus()?;
///
/// if let Some(error) = bus.last_error() {
///     println!("Could not connect to the session bus: {error}");
/// }
/// # Ok::<_, dbus_manager::Error>(())
/// ```
pub struct ConnectionManager {
    registry: Arc<Registry>,
    sender: UnboundedSender<Message>,
    thread: Option<JoinHandle<()>>,
    main_thread: Option<ThreadId>,
}

impl ConnectionManager {
    pub(super) fn from_parts(
        registry: Arc<Registry>,
        sender: UnboundedSender<Message>,
        thread: JoinHandle<()>,
        main_thread: Option<ThreadId>,
    ) -> Self {
        Self {
            registry,
            sender,
            thread: Some(thread),
            main_thread,
        }
    }

    /// Construct a manager with the default configuration.
    ///
    /// See [`ManagerBuilder`] to customize it.
    pub fn new() -> Result<Self> {
        ManagerBuilder::new().build()
    }

    /// Construct a builder for a manager.
    #[inline]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Acquire the connection registered under `name`, establishing it as
    /// described by `kind` if no such connection exists.
    ///
    /// Concurrent requests for the same name are served by a single
    /// connection attempt. A connection which failed to be established is
    /// registered all the same, so later requests observe the same failure
    /// until it is [removed].
    ///
    /// Each successful call must be paired with a call to
    /// [`ConnectionManager::release`].
    ///
    /// # Errors
    ///
    /// Errors if `name` is empty or if the dispatch thread is no longer
    /// running.
    ///
    /// # Panics
    ///
    /// This blocks the current thread and panics if called from within an
    /// asynchronous execution context, use
    /// [`ConnectionManager::acquire_async`] there instead.
    ///
    /// [removed]: ConnectionManager::remove
    pub fn acquire(&self, name: &str, kind: RequestKind) -> Result<Connection> {
        self.request(name, kind, false)
    }

    /// Acquire a connection without blocking the current thread.
    ///
    /// This behaves like [`ConnectionManager::acquire`].
    pub async fn acquire_async(&self, name: &str, kind: RequestKind) -> Result<Connection> {
        if let Some(connection) = self.fast_path(name)? {
            return Ok(connection);
        }

        let receiver = self.send(name, kind, false)?;
        receiver.await.map_err(|_| ErrorKind::Shutdown.into())
    }

    /// Acquire the default connection to the session bus.
    ///
    /// # Panics
    ///
    /// This blocks like [`ConnectionManager::acquire`] and panics if called
    /// from within an asynchronous execution context.
    pub fn session_bus(&self) -> Result<Connection> {
        self.standard_bus(SESSION_BUS_NAME, BusType::Session)
    }

    /// Acquire the default connection to the system bus.
    ///
    /// # Panics
    ///
    /// This blocks like [`ConnectionManager::acquire`] and panics if called
    /// from within an asynchronous execution context.
    pub fn system_bus(&self) -> Result<Connection> {
        self.standard_bus(SYSTEM_BUS_NAME, BusType::System)
    }

    /// Acquire a connection to one of the standard buses under a custom
    /// name.
    ///
    /// # Panics
    ///
    /// This blocks like [`ConnectionManager::acquire`] and panics if called
    /// from within an asynchronous execution context.
    pub fn connect_to_bus(&self, bus: BusType, name: &str) -> Result<Connection> {
        self.acquire(name, RequestKind::StandardBus(bus))
    }

    /// Acquire a connection to the bus at `address` under `name`.
    ///
    /// # Panics
    ///
    /// This blocks like [`ConnectionManager::acquire`] and panics if called
    /// from within an asynchronous execution context.
    pub fn connect_to_address(&self, address: &str, name: &str) -> Result<Connection> {
        self.acquire(name, RequestKind::BusAddress(address.to_owned()))
    }

    /// Acquire a direct connection to the peer at `address` under `name`.
    ///
    /// # Panics
    ///
    /// This blocks like [`ConnectionManager::acquire`] and panics if called
    /// from within an asynchronous execution context.
    pub fn connect_to_peer(&self, address: &str, name: &str) -> Result<Connection> {
        self.acquire(name, RequestKind::PeerAddress(address.to_owned()))
    }

    /// Start a server listening for peer connections on `address`.
    ///
    /// The server is created on the dispatch thread. Failing to listen is
    /// reported through [`Server::last_error`] on the returned handle.
    ///
    /// # Errors
    ///
    /// Errors if the dispatch thread is no longer running.
    ///
    /// # Panics
    ///
    /// This blocks the current thread and panics if called from within an
    /// asynchronous execution context, use
    /// [`ConnectionManager::listen_async`] there instead.
    pub fn listen(&self, address: &str) -> Result<Server> {
        self.send_listen(address)?
            .blocking_recv()
            .map_err(|_| ErrorKind::Shutdown.into())
    }

    /// Start a server without blocking the current thread.
    ///
    /// This behaves like [`ConnectionManager::listen`].
    pub async fn listen_async(&self, address: &str) -> Result<Server> {
        self.send_listen(address)?
            .await
            .map_err(|_| ErrorKind::Shutdown.into())
    }

    /// Look up a registered connection without acquiring it.
    pub fn connection(&self, name: &str) -> Option<Connection> {
        self.registry.get(name)
    }

    /// The number of outstanding acquisitions of the named connection, zero
    /// if it is not registered.
    pub fn acquired(&self, name: &str) -> usize {
        self.registry.acquired(name)
    }

    /// Release one acquisition of the named connection.
    ///
    /// Once released as many times as it was acquired the connection is
    /// removed from the manager. It is closed once every handle to it has
    /// been dropped. Releasing a name which is not registered does nothing.
    pub fn release(&self, name: &str) {
        if let Some(connection) = self.registry.release(name) {
            tracing::debug!(name, "Released last acquisition");
            drop(connection);
        }
    }

    /// Remove the named connection regardless of how often it was acquired.
    ///
    /// Existing handles stay valid, but the next acquisition of the name
    /// establishes a new connection. This is how a failed connection is
    /// retried.
    pub fn remove(&self, name: &str) {
        if let Some(connection) = self.registry.remove(name) {
            tracing::debug!(name, "Removed connection");
            drop(connection);
        }
    }

    /// Stop the dispatch thread and wait for it to exit.
    ///
    /// Connections no longer referenced outside of the manager are closed on
    /// the dispatch thread. Connections which are still referenced are closed
    /// but their handles stay valid, reporting that they are disconnected.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        // Fails only if the thread already exited.
        let _ = self.sender.send(Message::Quit);

        if thread.join().is_err() {
            tracing::warn!("Dispatch thread panicked");
        }
    }

    fn standard_bus(&self, name: &str, bus: BusType) -> Result<Connection> {
        let suspended = self.main_thread == Some(thread::current().id());
        self.request(name, RequestKind::StandardBus(bus), suspended)
    }

    fn request(&self, name: &str, kind: RequestKind, suspended: bool) -> Result<Connection> {
        if let Some(connection) = self.fast_path(name)? {
            return Ok(connection);
        }

        let receiver = self.send(name, kind, suspended)?;
        receiver
            .blocking_recv()
            .map_err(|_| ErrorKind::Shutdown.into())
    }

    fn fast_path(&self, name: &str) -> Result<Option<Connection>> {
        if name.is_empty() {
            return Err(ErrorKind::EmptyName.into());
        }

        Ok(self.registry.acquire_existing(name))
    }

    fn send_listen(&self, address: &str) -> Result<oneshot::Receiver<Server>> {
        let (reply, receiver) = oneshot::channel();

        let request = ListenRequest {
            address: Box::from(address),
            reply,
        };

        if self.sender.send(Message::Listen(request)).is_err() {
            return Err(ErrorKind::Shutdown.into());
        }

        Ok(receiver)
    }

    fn send(
        &self,
        name: &str,
        kind: RequestKind,
        suspended_delivery: bool,
    ) -> Result<oneshot::Receiver<Connection>> {
        let (reply, receiver) = oneshot::channel();

        let request = ConnectionRequest {
            kind,
            name: Box::from(name),
            suspended_delivery,
            reply,
        };

        if self.sender.send(Message::Connect(request)).is_err() {
            return Err(ErrorKind::Shutdown.into());
        }

        Ok(receiver)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("running", &self.thread.is_some())
            .field("main_thread", &self.main_thread)
            .finish_non_exhaustive()
    }
}
