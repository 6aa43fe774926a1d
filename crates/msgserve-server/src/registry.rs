use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connection::Connection;
use crate::error::{Result, ServerError};
use crate::id::{ConnectionId, IdAllocator};

/// Lock a mutex, recovering the guard if a panicking thread poisoned it.
///
/// Every map and slot guarded this way is valid after any single operation,
/// so a poisoned lock carries no torn state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe map of live connections, plus the id source for new ones.
///
/// An id is present exactly while its connection is live for sending;
/// removal is the single authoritative signal that the connection has ended.
/// All operations take one global lock, so they are linearizable: once
/// `remove(id)` returns on any thread, `get(id)` returns `None` on every
/// thread.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    ids: IdAllocator,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry drawing ids from an explicit allocator.
    pub fn with_ids(ids: IdAllocator) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            ids,
        }
    }

    /// Reserve a fresh connection id.
    pub fn allocate_id(&self) -> Result<ConnectionId> {
        self.ids.allocate()
    }

    pub(crate) fn insert(&self, connection: Arc<Connection>) {
        lock(&self.connections).insert(connection.id(), connection);
    }

    /// Remove and return the handle, if the id was live.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        lock(&self.connections).remove(&id)
    }

    /// Remove the handle and, only if it was still live, record `err` as the
    /// connection's fault. Both happen under the registry lock, so among any
    /// number of concurrent callers for one id exactly one gets `Some`.
    pub(crate) fn remove_faulted(
        &self,
        id: ConnectionId,
        err: ServerError,
    ) -> Option<Arc<Connection>> {
        let mut connections = lock(&self.connections);
        let connection = connections.remove(&id)?;
        connection.record_fault(err);
        Some(connection)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        lock(&self.connections).get(&id).cloned()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        lock(&self.connections).contains_key(&id)
    }

    /// Run `f` over a consistent snapshot of the live connections. The lock
    /// is released before `f` runs.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Connection>)) {
        let snapshot: Vec<_> = lock(&self.connections).values().cloned().collect();
        snapshot.iter().for_each(|connection| f(connection));
    }

    /// Remove every connection at once and return the handles.
    pub(crate) fn drain(&self) -> Vec<Arc<Connection>> {
        lock(&self.connections).drain().map(|(_, c)| c).collect()
    }

    pub fn count(&self) -> usize {
        lock(&self.connections).len()
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = lock(&self.connections).keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
