use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, ServerError};

/// Process-unique identifier of one accepted connection.
///
/// Ids handed out by an [`IdAllocator`] are strictly positive. The value `0`
/// is reserved for [`ConnectionId::SERVER`], which tags events that belong to
/// the listener rather than a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Tag for listener-level events (bind/accept faults, double start).
    pub const SERVER: ConnectionId = ConnectionId(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric identifier.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_server(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ConnectionId> for u64 {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

/// Monotonic connection id source.
///
/// Each server owns one allocator, so ids restart at 1 per server instance
/// and are never reused for the lifetime of that instance, including across
/// stop/start cycles. Once the counter reaches `u64::MAX` every further
/// allocation fails with [`ServerError::IdSpaceExhausted`].
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Allocator whose first id is `first` (clamped to at least 1).
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }

    /// Reserve the next id.
    pub fn allocate(&self) -> Result<ConnectionId> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map(ConnectionId)
            .map_err(|_| ServerError::IdSpaceExhausted)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
