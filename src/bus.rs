use std::fmt;

/// Registry name of the default session bus connection.
pub const SESSION_BUS_NAME: &str = "default-session-bus";

/// Registry name of the default system bus connection.
pub const SYSTEM_BUS_NAME: &str = "default-system-bus";

/// One of the standard message buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusType {
    /// The per-login-session bus.
    Session,
    /// The system-wide bus.
    System,
    /// The bus which started the current process through activation.
    Starter,
}

impl BusType {
    /// The reserved registry name of the bus, if it has one.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_manager::BusType;
    ///
    /// assert_eq!(BusType::Session.default_name(), Some("default-session-bus"));
    /// assert_eq!(BusType::Starter.default_name(), None);
    /// ```
    pub fn default_name(self) -> Option<&'static str> {
        match self {
            BusType::Session => Some(SESSION_BUS_NAME),
            BusType::System => Some(SYSTEM_BUS_NAME),
            BusType::Starter => None,
        }
    }
}

impl fmt::Display for BusType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusType::Session => write!(f, "session bus"),
            BusType::System => write!(f, "system bus"),
            BusType::Starter => write!(f, "starter bus"),
        }
    }
}

/// What a connection request should connect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Connect to one of the standard buses.
    StandardBus(BusType),
    /// Connect to the bus at the given address and register on it.
    BusAddress(String),
    /// Connect directly to a peer at the given address.
    PeerAddress(String),
}

impl RequestKind {
    pub(crate) fn connection_kind(&self) -> ConnectionKind {
        match self {
            RequestKind::StandardBus(..) | RequestKind::BusAddress(..) => ConnectionKind::Bus,
            RequestKind::PeerAddress(..) => ConnectionKind::Peer,
        }
    }
}

impl fmt::Display for RequestKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::StandardBus(bus) => bus.fmt(f),
            RequestKind::BusAddress(address) => write!(f, "bus at {address}"),
            RequestKind::PeerAddress(address) => write!(f, "peer at {address}"),
        }
    }
}

/// The kind of an established connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// A connection to a message bus.
    Bus,
    /// A direct connection to a peer.
    Peer,
}
