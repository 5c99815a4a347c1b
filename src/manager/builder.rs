use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;

use crate::error::{ErrorKind, Result};
use crate::transport::{Transport, UnixTransport};

use super::dispatch::Dispatcher;
use super::registry::Registry;
use super::ConnectionManager;

const DEFAULT_THREAD_NAME: &str = "dbus-manager";

/// Builder of a [`ConnectionManager`].
pub struct ManagerBuilder {
    transport: Option<Box<dyn Transport>>,
    main_thread: Option<ThreadId>,
    thread_name: String,
}

impl ManagerBuilder {
    /// Construct a new manager builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_manager::ManagerBuilder;
    ///
    /// let manager = ManagerBuilder::new().build()?;
    /// # Ok::<_, dbus_manager::Error>(())
    /// ```
    pub fn new() -> Self {
        Self {
            transport: None,
            main_thread: None,
            thread_name: String::from(DEFAULT_THREAD_NAME),
        }
    }

    /// Use the given transport to establish connections.
    ///
    /// By default connections are established through a [`UnixTransport`].
    pub fn transport<T>(&mut self, transport: T) -> &mut Self
    where
        T: Transport,
    {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Designate the thread running the application's main loop.
    ///
    /// Well-known bus connections requested from this thread are returned
    /// with dispatch held off until [`Connection::resume_dispatch`] is
    /// called, so that no messages are delivered before the caller has had a
    /// chance to set up its handlers.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::thread;
    ///
    /// use dbus_manager::ManagerBuilder;
    ///
    /// let manager = ManagerBuilder::new()
    ///     .main_thread(thread::current().id())
    ///     .build()?;
    /// # Ok::<_, dbus_manager::Error>(())
    /// ```
    ///
    /// [`Connection::resume_dispatch`]: crate::Connection::resume_dispatch
    pub fn main_thread(&mut self, id: ThreadId) -> &mut Self {
        self.main_thread = Some(id);
        self
    }

    /// Set the name of the dispatch thread.
    pub fn thread_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.thread_name = name.into();
        self
    }

    /// Spawn the dispatch thread and construct the manager.
    ///
    /// The transport is moved into the dispatch thread, so a builder that
    /// was given one falls back to the default transport when built again.
    pub fn build(&mut self) -> Result<ConnectionManager> {
        let transport = self
            .transport
            .take()
            .unwrap_or_else(|| Box::new(UnixTransport::new()));

        let registry = Arc::new(Registry::default());
        let (sender, receiver) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher {
            transport,
            registry: registry.clone(),
            sender: sender.clone(),
            receiver,
        };

        let thread = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || dispatcher.run())
            .map_err(ErrorKind::Spawn)?;

        Ok(ConnectionManager::from_parts(
            registry,
            sender,
            thread,
            self.main_thread,
        ))
    }
}

impl Default for ManagerBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
