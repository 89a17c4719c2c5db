use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Notification};

/// Events sent from the server to relay subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RelayEvent {
    /// Handshake on the self-hosted socket; `socket_id` is what channel
    /// authorization signs.
    Connected { socket_id: Uuid },

    /// A subscription request was accepted
    Subscribed { channel: String },

    /// A subscription request was refused
    SubscriptionError { channel: String, reason: String },

    /// A direct message addressed to the subscriber
    NewMessage(Message),

    /// A persisted notification for the subscriber
    Notification(Notification),

    /// A user changed their profile image (public channel)
    ProfileUpdate {
        user_id: Uuid,
        image: Option<String>,
    },
}

impl RelayEvent {
    /// Event name used on the hosted pub/sub service.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "relay:connected",
            Self::Subscribed { .. } => "relay:subscribed",
            Self::SubscriptionError { .. } => "relay:subscription_error",
            Self::NewMessage(_) => "new-message",
            Self::Notification(_) => "notification",
            Self::ProfileUpdate { .. } => "profile-update",
        }
    }

    /// The bare payload, without the `type`/`data` envelope.
    pub fn payload(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => map.remove("data").unwrap_or_default(),
            _ => serde_json::Value::Null,
        }
    }
}

/// Commands sent FROM client TO server over the self-hosted socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RelayCommand {
    /// Subscribe to a channel. Private channels need the signature returned
    /// by the channel authorization endpoint for this socket.
    Subscribe {
        channel: String,
        auth: Option<String>,
    },

    Unsubscribe { channel: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_is_tagged() {
        let user_id = Uuid::new_v4();
        let event = RelayEvent::ProfileUpdate {
            user_id,
            image: Some("/uploads/a.png".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ProfileUpdate");
        assert_eq!(json["data"]["image"], "/uploads/a.png");
        assert_eq!(event.payload()["user_id"], user_id.to_string());
        assert_eq!(event.name(), "profile-update");
    }

    #[test]
    fn subscribe_command_parses() {
        let raw = r#"{"type":"Subscribe","data":{"channel":"user-updates","auth":null}}"#;
        let cmd: RelayCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(
            cmd,
            RelayCommand::Subscribe {
                channel: "user-updates".into(),
                auth: None
            }
        );
    }
}
