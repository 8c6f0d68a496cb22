//! Connection Hub
//!
//! Tracks the outbound queue of every open connection. Output broadcasts
//! never wait on a slow client: a full queue drops that client's copy.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;

use super::protocol::ServerMessage;

pub struct ConnectionHub {
    connections: RwLock<HashMap<String, mpsc::Sender<ServerMessage>>>,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionHub {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    pub async fn register(&self, connection_id: String, tx: mpsc::Sender<ServerMessage>) {
        debug!(conn_id = %connection_id, "Registered connection");
        self.connections.write().await.insert(connection_id, tx);
    }

    /// Remove a connection. Returns false if it was not registered.
    pub async fn unregister(&self, connection_id: &str) -> bool {
        let removed = self.connections.write().await.remove(connection_id).is_some();
        if removed {
            debug!(conn_id = %connection_id, "Unregistered connection");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Queue `msg` for every open connection. Returns how many accepted it.
    ///
    /// `OUTPUT` frames are dropped for a connection whose queue is full; the
    /// next tick replaces them anyway. Every other frame carries state that
    /// is never resent, so it waits for room instead.
    pub async fn broadcast(&self, msg: ServerMessage) -> usize {
        if matches!(msg, ServerMessage::Output(_)) {
            self.broadcast_lossy(msg).await
        } else {
            self.broadcast_reliable(msg).await
        }
    }

    async fn broadcast_lossy(&self, msg: ServerMessage) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (connection_id, tx) in connections.iter() {
            match tx.try_send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.frame_sent();
                }
                Err(TrySendError::Full(_)) => {
                    self.metrics.frame_dropped();
                    debug!(conn_id = %connection_id, "Outbound queue full, dropping output frame");
                }
                // Closed: the connection is on its way out and will unregister itself
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    async fn broadcast_reliable(&self, msg: ServerMessage) -> usize {
        // Snapshot the senders so a slow client never holds the map lock.
        let targets: Vec<(String, mpsc::Sender<ServerMessage>)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();

        let mut delivered = 0;
        for (connection_id, tx) in targets {
            if tx.capacity() == 0 {
                warn!(conn_id = %connection_id, "Outbound queue full, waiting to deliver state frame");
            }
            if tx.send(msg.clone()).await.is_ok() {
                delivered += 1;
                self.metrics.frame_sent();
            }
        }
        delivered
    }

    /// Queue `msg` for one connection, waiting for room. Returns false if the
    /// connection is unknown or closed.
    pub async fn unicast(&self, connection_id: &str, msg: ServerMessage) -> bool {
        let tx = match self.connections.read().await.get(connection_id) {
            Some(tx) => tx.clone(),
            None => return false,
        };
        if tx.send(msg).await.is_ok() {
            self.metrics.frame_sent();
            true
        } else {
            false
        }
    }
}
