//! Process-wide map of open chat sockets.
//!
//! Each socket owns an unbounded channel whose receiving half is drained by
//! that socket's writer task. The lock is only ever held for map operations,
//! never across an `.await`.

use super::ServerFrame;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

pub type ConnectionId = u64;

#[derive(Debug)]
struct Connection {
    id: ConnectionId,
    outbox: UnboundedSender<ServerFrame>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Vec<Connection>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Connection>>> {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Connection>>> {
        self.connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new socket for `user_id` and returns the receiving end of its outbox.
    pub fn connect(&self, user_id: &str) -> (ConnectionId, UnboundedReceiver<ServerFrame>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.write()
            .entry(user_id.to_string())
            .or_default()
            .push(Connection { id, outbox });
        debug!(user_id, connection_id = id, "Socket registered");
        (id, inbox)
    }

    pub fn disconnect(&self, user_id: &str, connection_id: ConnectionId) {
        let mut connections = self.write();
        if let Some(list) = connections.get_mut(user_id) {
            list.retain(|c| c.id != connection_id);
            if list.is_empty() {
                connections.remove(user_id);
            }
        }
        debug!(user_id, connection_id, "Socket removed");
    }

    /// Delivers `frame` to every socket of `user_id` and returns how many took it.
    ///
    /// Sockets whose writer has gone away are pruned.
    pub fn send_to(&self, user_id: &str, frame: &ServerFrame) -> usize {
        let (delivered, dead) = {
            let connections = self.read();
            let Some(list) = connections.get(user_id) else {
                return 0;
            };
            let mut delivered = 0;
            let mut dead = Vec::new();
            for connection in list {
                if connection.outbox.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(connection.id);
                }
            }
            (delivered, dead)
        };
        for id in dead {
            self.disconnect(user_id, id);
        }
        delivered
    }

    /// Delivers `frame` to one particular socket.
    pub fn send_to_connection(
        &self,
        user_id: &str,
        connection_id: ConnectionId,
        frame: ServerFrame,
    ) -> bool {
        self.read()
            .get(user_id)
            .and_then(|list| list.iter().find(|c| c.id == connection_id))
            .is_some_and(|c| c.outbox.send(frame).is_ok())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.read().contains_key(user_id)
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.read().get(user_id).map_or(0, Vec::len)
    }
}
