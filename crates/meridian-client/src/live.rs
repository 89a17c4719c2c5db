use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use meridian_types::events::RelayEvent;
use meridian_types::models::Message;

use crate::cache::OptimisticList;
use crate::inbox::Inbox;

/// Client state kept current by relay events.
#[derive(Debug, Default)]
pub struct LiveCache {
    /// Incoming and sent messages across conversations, newest first.
    pub messages: OptimisticList<Message>,
    pub inbox: Inbox,
    /// Latest known profile image per user, from the public channel.
    pub avatars: HashMap<Uuid, Option<String>>,
    socket_id: Option<Uuid>,
}

impl LiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Socket id announced by the self-hosted relay, needed for channel auth.
    pub fn socket_id(&self) -> Option<Uuid> {
        self.socket_id
    }

    /// Apply one event. Returns `true` when cached state changed.
    pub fn apply(&mut self, event: RelayEvent) -> bool {
        match event {
            RelayEvent::Connected { socket_id } => {
                self.socket_id = Some(socket_id);
                true
            }
            RelayEvent::NewMessage(message) => self.messages.merge_live(message),
            RelayEvent::Notification(notification) => self.inbox.push_live(notification),
            RelayEvent::ProfileUpdate { user_id, image } => {
                self.avatars.insert(user_id, image.clone()) != Some(image)
            }
            RelayEvent::Subscribed { channel } => {
                debug!("Subscribed to {}", channel);
                false
            }
            RelayEvent::SubscriptionError { channel, reason } => {
                debug!("Subscription to {} refused: {}", channel, reason);
                false
            }
        }
    }
}
