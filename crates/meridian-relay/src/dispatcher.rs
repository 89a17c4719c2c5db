use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use meridian_types::events::RelayEvent;

/// Live sockets of the self-hosted relay, keyed by the user whose private
/// channel they subscribed to.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Public channel; every socket receives it, forwarding is gated per socket
    broadcast_tx: broadcast::Sender<RelayEvent>,

    /// user_id -> (socket_id -> sender)
    user_sockets: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<RelayEvent>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_sockets: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe_public(&self) -> broadcast::Receiver<RelayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish on the public channel. Returns how many sockets were listening.
    pub fn broadcast(&self, event: RelayEvent) -> usize {
        self.inner.broadcast_tx.send(event).unwrap_or(0)
    }

    /// Route `user_id`'s private channel to a socket.
    pub async fn register(
        &self,
        user_id: Uuid,
        socket_id: Uuid,
        tx: mpsc::UnboundedSender<RelayEvent>,
    ) {
        self.inner
            .user_sockets
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(socket_id, tx);
    }

    pub async fn unregister(&self, user_id: Uuid, socket_id: Uuid) {
        let mut sockets = self.inner.user_sockets.write().await;
        if let Some(per_user) = sockets.get_mut(&user_id) {
            per_user.remove(&socket_id);
            if per_user.is_empty() {
                sockets.remove(&user_id);
            }
        }
    }

    /// Drop every route held by a socket. Called when it disconnects.
    pub async fn unregister_socket(&self, socket_id: Uuid) {
        let mut sockets = self.inner.user_sockets.write().await;
        sockets.retain(|_, per_user| {
            per_user.remove(&socket_id);
            !per_user.is_empty()
        });
    }

    /// Deliver to every socket subscribed to `user_id`'s private channel.
    /// Returns the number of sockets that accepted the event.
    pub async fn send_to_user(&self, user_id: Uuid, event: RelayEvent) -> usize {
        let sockets = self.inner.user_sockets.read().await;
        let Some(per_user) = sockets.get(&user_id) else {
            debug!("No live socket for user {}, dropping {}", user_id, event.name());
            return 0;
        };
        per_user
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    #[cfg(test)]
    async fn socket_count(&self, user_id: Uuid) -> usize {
        self.inner
            .user_sockets
            .read()
            .await
            .get(&user_id)
            .map_or(0, |per_user| per_user.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_update() -> RelayEvent {
        RelayEvent::ProfileUpdate {
            user_id: Uuid::new_v4(),
            image: None,
        }
    }

    #[tokio::test]
    async fn delivers_to_every_socket_of_the_user_only() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        dispatcher.register(alice, Uuid::new_v4(), tx1).await;
        dispatcher.register(alice, Uuid::new_v4(), tx2).await;
        dispatcher.register(bob, Uuid::new_v4(), tx3).await;

        assert_eq!(dispatcher.send_to_user(alice, profile_update()).await, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn absent_user_drops_the_event() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.send_to_user(Uuid::new_v4(), profile_update()).await, 0);
        assert_eq!(dispatcher.broadcast(profile_update()), 0);
    }

    #[tokio::test]
    async fn disconnect_removes_all_routes_of_the_socket() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let socket = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        dispatcher.register(alice, socket, tx.clone()).await;
        let (other_tx, _other_rx) = mpsc::unbounded_channel();
        dispatcher.register(alice, Uuid::new_v4(), other_tx).await;

        dispatcher.unregister_socket(socket).await;
        assert_eq!(dispatcher.socket_count(alice).await, 1);
    }

    #[tokio::test]
    async fn closed_receiver_is_not_counted() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        dispatcher.register(alice, Uuid::new_v4(), tx).await;
        drop(rx);

        assert_eq!(dispatcher.send_to_user(alice, profile_update()).await, 0);
    }
}
