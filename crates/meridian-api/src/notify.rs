use tracing::error;
use uuid::Uuid;

use meridian_types::events::RelayEvent;
use meridian_types::models::NotificationKind;

use crate::auth::{AppState, blocking};

/// Persist a notification for `user_id`, then push it live.
///
/// Runs after the triggering write has committed, so a failure here is
/// logged and does not fail the request.
pub async fn notify(state: &AppState, user_id: Uuid, kind: NotificationKind, message: String) {
    match blocking(state, move |db| db.create_notification(user_id, kind, &message)).await {
        Ok(notification) => {
            state
                .relay
                .publish_to_user(user_id, RelayEvent::Notification(notification))
                .await;
        }
        Err(e) => error!("Failed to store {} notification for {}: {}", kind, user_id, e),
    }
}
