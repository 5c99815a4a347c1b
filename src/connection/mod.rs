pub use self::connect_error::{ConnectError, ConnectErrorKind};
mod connect_error;

pub use self::connection::Connection;
mod connection;

pub use self::server::Server;
mod server;
