//! Real-time push: per-user private channels plus one public channel,
//! served either by the in-process WebSocket relay or a hosted service.

pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod hosted;

use tracing::{debug, warn};
use uuid::Uuid;

use meridian_types::channel::Channel;
use meridian_types::events::RelayEvent;

pub use auth::{ChannelAuthError, ChannelSigner};
pub use dispatcher::Dispatcher;
pub use hosted::{HostedConfig, HostedRelay};

#[derive(Clone)]
pub enum Backend {
    Local(Dispatcher),
    Hosted(HostedRelay),
}

/// Publishing handle shared by the request handlers.
///
/// Delivery is best effort and at most once: a publish that fails, or finds
/// nobody listening, is logged and dropped. Everything published is also
/// persisted and reachable over REST.
#[derive(Clone)]
pub struct Relay {
    signer: ChannelSigner,
    backend: Backend,
}

impl Relay {
    pub fn local(signer: ChannelSigner) -> Self {
        Self {
            signer,
            backend: Backend::Local(Dispatcher::new()),
        }
    }

    /// The hosted service verifies subscriptions with its own app key, so
    /// the signer is derived from the hosted credentials.
    pub fn hosted(relay: HostedRelay) -> Self {
        let signer = ChannelSigner::new(&relay.config().key, &relay.config().secret);
        Self {
            signer,
            backend: Backend::Hosted(relay),
        }
    }

    pub fn signer(&self) -> &ChannelSigner {
        &self.signer
    }

    /// The live socket map, when this process serves sockets itself.
    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        match &self.backend {
            Backend::Local(dispatcher) => Some(dispatcher),
            Backend::Hosted(_) => None,
        }
    }

    pub async fn publish_to_user(&self, user_id: Uuid, event: RelayEvent) {
        match &self.backend {
            Backend::Local(dispatcher) => {
                let delivered = dispatcher.send_to_user(user_id, event).await;
                debug!("Delivered to {} socket(s) of user {}", delivered, user_id);
            }
            Backend::Hosted(hosted) => {
                let channel = Channel::User(user_id).to_string();
                if let Err(e) = hosted.trigger(&channel, event.name(), &event.payload()).await {
                    warn!("Relay publish to {} failed: {:#}", channel, e);
                }
            }
        }
    }

    pub async fn publish_public(&self, event: RelayEvent) {
        match &self.backend {
            Backend::Local(dispatcher) => {
                let listeners = dispatcher.broadcast(event);
                debug!("Public event reached {} socket(s)", listeners);
            }
            Backend::Hosted(hosted) => {
                let channel = Channel::Public.to_string();
                if let Err(e) = hosted.trigger(&channel, event.name(), &event.payload()).await {
                    warn!("Relay publish to {} failed: {:#}", channel, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn local_publish_reaches_registered_socket() {
        let relay = Relay::local(ChannelSigner::new("k", "s"));
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        relay
            .dispatcher()
            .unwrap()
            .register(user, Uuid::new_v4(), tx)
            .await;

        let event = RelayEvent::ProfileUpdate { user_id: user, image: None };
        relay.publish_to_user(user, event.clone()).await;
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn hosted_failure_is_swallowed() {
        let config = HostedConfig {
            app_id: "1".into(),
            key: "k".into(),
            secret: "s".into(),
            cluster: "mt1".into(),
        };
        // Nothing listens on port 9; the publish must return normally
        let relay = Relay::hosted(HostedRelay::with_base_url(config, "http://127.0.0.1:9"));
        assert!(relay.dispatcher().is_none());
        assert_eq!(relay.signer().key(), "k");
        relay
            .publish_public(RelayEvent::ProfileUpdate { user_id: Uuid::new_v4(), image: None })
            .await;
    }
}
