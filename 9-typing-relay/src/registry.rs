//! Hub-side bookkeeping of live connections.
//!
//! Each accepted stream gets a [`Connection`] record keyed by a stable
//! [`ConnectionId`]. Register and unregister take the write lock; fan-out
//! traversal holds the read lock for the whole pass, so no record can
//! disappear halfway through a broadcast.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::future::join_all;
use tokio::sync::{
    RwLock,
    mpsc::{self, error::TrySendError},
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One registered stream plus the slot other handlers use to tell its owner
/// that sending to it failed.
pub struct Connection<S> {
    id: ConnectionId,
    sink: S,
    failure_tx: mpsc::Sender<io::Error>,
}

impl<S> Connection<S> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Never waits. Returns `false` when the report was dropped.
    pub fn report_failure(&self, error: io::Error) -> bool {
        match self.failure_tx.try_send(error) {
            Ok(()) => true,
            Err(TrySendError::Full(error)) => {
                debug!(conn = %self.id, ?error, "failure slot already occupied");
                false
            }
            Err(TrySendError::Closed(error)) => {
                debug!(conn = %self.id, ?error, "connection owner already gone");
                false
            }
        }
    }
}

pub struct FailureSlot {
    rx: mpsc::Receiver<io::Error>,
}

impl FailureSlot {
    pub async fn recv(&mut self) -> Option<io::Error> {
        self.rx.recv().await
    }

    pub fn try_take(&mut self) -> Option<io::Error> {
        self.rx.try_recv().ok()
    }
}

pub struct Registry<S> {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection<S>>>>,
    next_id: AtomicU64,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Registry<S> {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // Ids are never reused, so a late unregister cannot remove a newer record.
    pub async fn register(&self, sink: S) -> (Arc<Connection<S>>, FailureSlot) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (failure_tx, rx) = mpsc::channel(1);
        let connection = Arc::new(Connection {
            id,
            sink,
            failure_tx,
        });

        self.connections
            .write()
            .await
            .insert(id, Arc::clone(&connection));
        (connection, FailureSlot { rx })
    }

    pub async fn unregister(&self, id: ConnectionId) -> bool {
        self.connections.write().await.remove(&id).is_some()
    }

    /// Runs `visit` for every registered connection other than `except`,
    /// concurrently, while holding the read lock. Returns how many were visited.
    pub async fn for_each_except<F, Fut>(&self, except: ConnectionId, mut visit: F) -> usize
    where
        F: FnMut(Arc<Connection<S>>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let connections = self.connections.read().await;
        let visits: Vec<Fut> = connections
            .iter()
            .filter(|(id, _)| **id != except)
            .map(|(_, connection)| visit(Arc::clone(connection)))
            .collect();
        let visited = visits.len();
        join_all(visits).await;
        visited
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
