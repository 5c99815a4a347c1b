use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::UnboundedSender;

use crate::bus::ConnectionKind;
use crate::manager::Message;
use crate::transport::RawConnection;

use super::ConnectError;

/// A shared handle to a connection owned by a [`ConnectionManager`].
///
/// Handles are cheap to clone and every clone refers to the same underlying
/// connection. A handle is produced even if connecting failed, in which case
/// [`Connection::last_error`] reports why.
///
/// When the last handle is dropped the underlying connection is closed on the
/// dispatch thread, or on the dropping thread if the dispatch thread is no
/// longer running.
///
/// [`ConnectionManager`]: crate::ConnectionManager
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    name: Box<str>,
    kind: ConnectionKind,
    unique_name: Option<Box<str>>,
    raw: Mutex<Option<Box<dyn RawConnection>>>,
    error: Option<ConnectError>,
    dispatch_enabled: AtomicBool,
    sender: UnboundedSender<Message>,
}

impl Connection {
    pub(crate) fn new(
        name: Box<str>,
        kind: ConnectionKind,
        outcome: Result<Box<dyn RawConnection>, ConnectError>,
        sender: UnboundedSender<Message>,
    ) -> Self {
        let (raw, error) = match outcome {
            Ok(raw) => (Some(raw), None),
            Err(error) => (None, Some(error)),
        };

        Self {
            inner: Arc::new(Inner {
                name,
                kind,
                unique_name: raw.as_ref().and_then(|raw| raw.unique_name().map(Box::from)),
                raw: Mutex::new(raw),
                error,
                dispatch_enabled: AtomicBool::new(true),
                sender,
            }),
        }
    }

    /// The name the connection is registered under.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether this is a bus or a peer connection.
    #[inline]
    pub fn kind(&self) -> ConnectionKind {
        self.inner.kind
    }

    /// The unique name assigned by the bus, if the connection registered on
    /// one.
    #[inline]
    pub fn unique_name(&self) -> Option<&str> {
        self.inner.unique_name.as_deref()
    }

    /// Test if the connection is established and has not been closed.
    pub fn is_connected(&self) -> bool {
        self.inner.raw().is_some()
    }

    /// The error which prevented the connection from being established.
    #[inline]
    pub fn last_error(&self) -> Option<&ConnectError> {
        self.inner.error.as_ref()
    }

    /// Test if inbound messages are being dispatched.
    ///
    /// Dispatch is held off for well-known bus connections established from
    /// the main-loop thread until [`Connection::resume_dispatch`] is called.
    #[inline]
    pub fn is_dispatch_enabled(&self) -> bool {
        self.inner.dispatch_enabled.load(Ordering::Acquire)
    }

    /// Resume dispatching of inbound messages.
    ///
    /// This is intended to be called from the next iteration of the
    /// application's main loop.
    #[inline]
    pub fn resume_dispatch(&self) {
        self.set_dispatch_enabled(true);
    }

    /// Enable or disable dispatching of inbound messages.
    #[inline]
    pub fn set_dispatch_enabled(&self, enabled: bool) {
        self.inner.dispatch_enabled.store(enabled, Ordering::Release);
    }

    /// Test if two handles refer to the same connection.
    #[inline]
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Close the underlying connection immediately on the current thread.
    pub(crate) fn close(&self) {
        let raw = self.inner.raw().take();

        if let Some(mut raw) = raw {
            tracing::trace!(name = %self.inner.name, "Closing connection");
            raw.close();
        }
    }

    /// Release this handle during shutdown of the dispatch thread.
    ///
    /// If it is the last handle the connection is deleted here, otherwise it
    /// is closed and left to be deleted by whichever thread drops the last
    /// handle.
    pub(crate) fn shutdown(self) {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => {
                tracing::trace!(name = %inner.name, "Deleting unreferenced connection");
                drop(inner);
            }
            Err(inner) => {
                tracing::debug!(name = %inner.name, "Detaching connection which is still referenced");
                Connection { inner }.close();
            }
        }
    }
}

impl Inner {
    fn raw(&self) -> MutexGuard<'_, Option<Box<dyn RawConnection>>> {
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

        let name = self.name.clone();

        if let Err(SendError(message)) = self.sender.send(Message::Close { name, raw }) {
            if let Message::Close { name, mut raw } = message {
                tracing::trace!(%name, "Closing connection after dispatch thread stopped");
                raw.close();
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("connected", &self.is_connected())
            .field("error", &self.inner.error)
            .finish()
    }
}
