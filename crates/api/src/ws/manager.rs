use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

/// Outbound half of a connection's message channel.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Outbound channels of the live sockets, keyed by connection id.
pub struct WsManager {
    senders: RwLock<HashMap<String, WsSender>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and return the receiver its writer drains.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (sender, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(conn_id, sender);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.senders.write().await.remove(conn_id);
    }

    /// Queue `message` for every connection. Closed channels are skipped;
    /// their owners remove themselves on disconnect.
    pub async fn broadcast(&self, message: Message) {
        for sender in self.senders.read().await.values() {
            let _ = sender.send(message.clone());
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }

    pub async fn ping_all(&self) {
        self.broadcast(Message::Ping(Bytes::new())).await;
    }

    /// Send Close to every connection and forget them all.
    pub async fn shutdown_all(&self) {
        let mut senders = self.senders.write().await;
        for sender in senders.values() {
            let _ = sender.send(Message::Close(None));
        }
        tracing::info!(count = senders.len(), "Closed all socket connections");
        senders.clear();
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
