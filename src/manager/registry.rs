use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::Connection;

struct Entry {
    connection: Connection,
    acquired: usize,
}

/// The table of named connections shared between callers and the dispatch
/// thread.
///
/// Every operation completes under a single lock acquisition, so the table is
/// consistent even if a holder panicked. Connections which leave the table
/// are handed back to the caller to be dropped after the lock is released,
/// since dropping the last handle may close it inline.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Mutex<HashMap<Box<str>, Entry>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<Box<str>, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count another acquisition of an existing connection and return it.
    pub(crate) fn acquire_existing(&self, name: &str) -> Option<Connection> {
        let mut entries = self.lock();
        let entry = entries.get_mut(name)?;
        entry.acquired += 1;
        Some(entry.connection.clone())
    }

    /// Insert a newly established connection, counting one acquisition of
    /// it.
    ///
    /// If an entry with the same name appeared in the meantime, that entry
    /// wins and is returned instead together with the connection which lost.
    pub(crate) fn insert_acquired(&self, connection: Connection) -> (Connection, Option<Connection>) {
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(connection.name()) {
            entry.acquired += 1;
            return (entry.connection.clone(), Some(connection));
        }

        let name = Box::from(connection.name());

        entries.insert(
            name,
            Entry {
                connection: connection.clone(),
                acquired: 1,
            },
        );

        (connection, None)
    }

    /// Look up a connection without counting it as acquired.
    pub(crate) fn get(&self, name: &str) -> Option<Connection> {
        Some(self.lock().get(name)?.connection.clone())
    }

    /// The number of outstanding acquisitions of the named connection.
    pub(crate) fn acquired(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, |entry| entry.acquired)
    }

    /// Release one acquisition, returning the connection if this removed it
    /// from the table.
    pub(crate) fn release(&self, name: &str) -> Option<Connection> {
        let mut entries = self.lock();
        let entry = entries.get_mut(name)?;
        entry.acquired = entry.acquired.saturating_sub(1);

        if entry.acquired > 0 {
            return None;
        }

        Some(entries.remove(name)?.connection)
    }

    /// Remove the named connection regardless of how often it was acquired.
    pub(crate) fn remove(&self, name: &str) -> Option<Connection> {
        Some(self.lock().remove(name)?.connection)
    }

    /// Take every connection out of the table.
    pub(crate) fn drain(&self) -> Vec<Connection> {
        self.lock()
            .drain()
            .map(|(_, entry)| entry.connection)
            .collect()
    }
}
