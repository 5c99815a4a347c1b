use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::bus::RequestKind;
use crate::transport::{RawConnection, RawServer, Transport};
use crate::{ConnectError, Connection, Server};

use super::registry::Registry;

/// Messages processed by the dispatch thread.
pub(crate) enum Message {
    /// Establish a connection unless one is already registered.
    Connect(ConnectionRequest),
    /// Start listening for peer connections.
    Listen(ListenRequest),
    /// Close a connection whose last handle was dropped.
    Close {
        name: Box<str>,
        raw: Box<dyn RawConnection>,
    },
    /// Stop a server whose last handle was dropped.
    CloseServer {
        address: Box<str>,
        raw: Box<dyn RawServer>,
    },
    /// Stop the dispatch thread.
    Quit,
}

/// A request for a connection, answered through `reply`.
pub(crate) struct ConnectionRequest {
    pub(crate) kind: RequestKind,
    pub(crate) name: Box<str>,
    pub(crate) suspended_delivery: bool,
    pub(crate) reply: oneshot::Sender<Connection>,
}

/// A request for a listening server, answered through `reply`.
pub(crate) struct ListenRequest {
    pub(crate) address: Box<str>,
    pub(crate) reply: oneshot::Sender<Server>,
}

/// State owned by the dispatch thread.
pub(crate) struct Dispatcher {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) sender: UnboundedSender<Message>,
    pub(crate) receiver: UnboundedReceiver<Message>,
}

impl Dispatcher {
    pub(crate) fn run(mut self) {
        tracing::debug!("Dispatch thread started");

        while let Some(message) = self.receiver.blocking_recv() {
            match message {
                Message::Connect(request) => {
                    self.connect(request);
                }
                Message::Listen(request) => {
                    self.listen(request);
                }
                Message::Close { name, mut raw } => {
                    tracing::trace!(%name, "Closing released connection");
                    raw.close();
                }
                Message::CloseServer { address, mut raw } => {
                    tracing::trace!(%address, "Closing released server");
                    raw.close();
                }
                Message::Quit => {
                    break;
                }
            }
        }

        self.shutdown();
        tracing::debug!("Dispatch thread stopped");
    }

    fn connect(&mut self, request: ConnectionRequest) {
        let ConnectionRequest {
            kind,
            name,
            suspended_delivery,
            reply,
        } = request;

        // Another request for the same name may have been served while this
        // one was queued.
        let connection = match self.registry.acquire_existing(&name) {
            Some(connection) => {
                tracing::trace!(%name, "Coalesced with existing connection");
                connection
            }
            None => {
                let outcome = self.establish(&name, &kind);
                let connection =
                    Connection::new(name, kind.connection_kind(), outcome, self.sender.clone());

                if suspended_delivery && connection.is_connected() {
                    connection.set_dispatch_enabled(false);
                }

                let (connection, lost) = self.registry.insert_acquired(connection);
                drop(lost);
                connection
            }
        };

        if let Err(connection) = reply.send(connection) {
            // The caller went away, so the acquisition it would have owned is
            // given back.
            tracing::trace!(name = %connection.name(), "Requester gone before reply");
            let removed = self.registry.release(connection.name());
            drop(connection);
            drop(removed);
        }
    }

    fn listen(&mut self, request: ListenRequest) {
        let ListenRequest { address, reply } = request;

        let outcome = self.transport.listen(&address);

        if let Err(error) = &outcome {
            tracing::warn!(%address, %error, "Failed to listen");
        }

        let server = Server::new(address, outcome, self.registry.clone(), self.sender.clone());

        if reply.send(server).is_err() {
            tracing::trace!("Requester gone before reply");
        }
    }

    fn establish(
        &mut self,
        name: &str,
        kind: &RequestKind,
    ) -> Result<Box<dyn RawConnection>, ConnectError> {
        tracing::debug!(name, %kind, "Connecting");

        let outcome = match kind {
            RequestKind::StandardBus(bus) => self.transport.connect_standard_bus(*bus),
            RequestKind::BusAddress(address) => self.open_bus(address),
            RequestKind::PeerAddress(address) => self.transport.open_peer(address),
        };

        match &outcome {
            Ok(raw) => {
                tracing::debug!(name, unique_name = raw.unique_name(), "Connected");
            }
            Err(error) => {
                tracing::warn!(name, %kind, %error, "Failed to connect");
            }
        }

        outcome
    }

    fn open_bus(&mut self, address: &str) -> Result<Box<dyn RawConnection>, ConnectError> {
        let mut raw = self.transport.open_address(address)?;

        if let Err(error) = self.transport.register_on_bus(&mut *raw) {
            raw.close();
            return Err(error);
        }

        Ok(raw)
    }

    /// Close the request queue and release every registered connection.
    fn shutdown(&mut self) {
        self.receiver.close();

        for connection in self.registry.drain() {
            connection.shutdown();
        }

        // Drain what was queued before the channel closed. Dropping a pending
        // request's reply sender tells its caller the thread is gone.
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                Message::Connect(request) => {
                    tracing::trace!(name = %request.name, "Dropping request during shutdown");
                }
                Message::Listen(request) => {
                    tracing::trace!(address = %request.address, "Dropping request during shutdown");
                }
                Message::Close { name, mut raw } => {
                    tracing::trace!(%name, "Closing released connection");
                    raw.close();
                }
                Message::CloseServer { address, mut raw } => {
                    tracing::trace!(%address, "Closing released server");
                    raw.close();
                }
                Message::Quit => {}
            }
        }
    }
}
