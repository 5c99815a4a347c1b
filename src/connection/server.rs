use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::UnboundedSender;

use crate::bus::ConnectionKind;
use crate::manager::{Message, Registry};
use crate::transport::RawServer;

use super::{ConnectError, ConnectErrorKind, Connection};

/// A shared handle to a server listening for peer connections.
///
/// Servers are created on the dispatch thread through
/// [`ConnectionManager::listen`]. Like a [`Connection`], a handle is produced
/// even if listening failed, in which case [`Server::last_error`] reports why.
///
/// When the last handle is dropped the server stops listening. This happens
/// on the dispatch thread, or on the dropping thread if the dispatch thread
/// is no longer running.
///
/// [`ConnectionManager::listen`]: crate::ConnectionManager::listen
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    address: Box<str>,
    raw: Mutex<Option<Box<dyn RawServer>>>,
    error: Option<ConnectError>,
    accepted: AtomicUsize,
    registry: Arc<Registry>,
    sender: UnboundedSender<Message>,
}

impl Server {
    pub(crate) fn new(
        address: Box<str>,
        outcome: Result<Box<dyn RawServer>, ConnectError>,
        registry: Arc<Registry>,
        sender: UnboundedSender<Message>,
    ) -> Self {
        let (address, raw, error) = match outcome {
            Ok(raw) => (Box::from(raw.address()), Some(raw), None),
            Err(error) => (address, None, Some(error)),
        };

        Self {
            inner: Arc::new(Inner {
                address,
                raw: Mutex::new(raw),
                error,
                accepted: AtomicUsize::new(0),
                registry,
                sender,
            }),
        }
    }

    /// The address peers connect to.
    ///
    /// If listening failed this is the address which was requested.
    #[inline]
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// The error which prevented the server from listening.
    #[inline]
    pub fn last_error(&self) -> Option<&ConnectError> {
        self.inner.error.as_ref()
    }

    /// Wait for the next peer to connect and authenticate.
    ///
    /// This blocks the calling thread, and only one thread accepts on a
    /// server at a time. The new connection is registered with the manager
    /// under a name derived from the server address and counts as acquired
    /// once, so it should be paired with a call to
    /// [`ConnectionManager::release`] using [`Connection::name`].
    ///
    /// [`ConnectionManager::release`]: crate::ConnectionManager::release
    pub fn accept(&self) -> Result<Connection, ConnectError> {
        let raw = {
            let mut raw = self.inner.raw();

            let Some(server) = raw.as_mut() else {
                return Err(self.inner.error.clone().unwrap_or_else(|| {
                    ConnectError::new(ConnectErrorKind::Unreachable, "server is not listening")
                }));
            };

            server.accept()?
        };

        let n = self.inner.accepted.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}#{n}", self.inner.address);
        tracing::debug!(%name, "Accepted peer connection");

        let connection = Connection::new(
            name.into(),
            ConnectionKind::Peer,
            Ok(raw),
            self.inner.sender.clone(),
        );

        let (connection, lost) = self.inner.registry.insert_acquired(connection);
        drop(lost);
        Ok(connection)
    }

    /// Test if two handles refer to the same server.
    #[inline]
    pub fn ptr_eq(&self, other: &Server) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Inner {
    fn raw(&self) -> MutexGuard<'_, Option<Box<dyn RawServer>>> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let raw = self
            .raw
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(raw) = raw else {
            return;
        };

        let address = self.address.clone();

        if let Err(SendError(Message::CloseServer { address, mut raw })) =
            self.sender.send(Message::CloseServer { address, raw })
        {
            tracing::trace!(%address, "Closing server after dispatch thread stopped");
            raw.close();
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.inner.address)
            .field("error", &self.inner.error)
            .finish_non_exhaustive()
    }
}
