//! Connection bookkeeping for the host
//!
//! Each accepted TCP connection gets an id and an outgoing frame queue. The
//! writer task that drains the queue owns the socket's write half; this module
//! only knows the queue.

use log::{debug, info};
use shared::ConnectionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// One accepted connection
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    /// Newline-terminated frames waiting for the writer task
    sender: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> Self {
        Self { id, addr, sender }
    }

    /// Queues a frame; false once the writer task has gone away
    pub fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
    next_connection_id: ConnectionId,
    max_connections: usize,
}

impl ConnectionManager {
    /// Ids start at 1 and are never reused
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a connection; `None` when the host is full
    pub fn add(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = self.next_connection_id;
        self.next_connection_id += 1;

        info!("Connection {} opened from {}", id, addr);
        self.connections.insert(id, Connection::new(id, addr, sender));
        Some(id)
    }

    /// Forgets a connection, dropping its frame queue
    ///
    /// The writer task ends once the queue is gone, which closes the socket's
    /// write half. Returns false for an unknown id.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        if let Some(connection) = self.connections.remove(id) {
            info!("Connection {} from {} closed", connection.id, connection.addr);
            true
        } else {
            false
        }
    }

    /// Queues a frame for one connection; false if it is unknown or closing
    pub fn send_to(&self, id: ConnectionId, frame: &str) -> bool {
        match self.connections.get(&id) {
            Some(connection) => connection.send(frame),
            None => {
                debug!("No connection {} to send to", id);
                false
            }
        }
    }

    /// Queues a frame on every connection except `exclude`; returns how many took it
    pub fn broadcast(&self, frame: &str, exclude: Option<ConnectionId>) -> usize {
        self.connections
            .values()
            .filter(|connection| Some(connection.id) != exclude)
            .filter(|connection| connection.send(frame))
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
