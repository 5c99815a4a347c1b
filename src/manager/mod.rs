//! The connection manager and the dispatch thread backing it.


pub use self::builder::ManagerBuilder;
mod builder;

pub(crate) use self::dispatch::Message;
mod dispatch;

pub use self::manager::ConnectionManager;
mod manager;

pub(crate) use self::registry::Registry;
mod registry;
