use axum::{
    Router, middleware,
    routing::{delete, get, patch, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{comments, connections, messages, notifications, posts, relay, users};

/// The full REST + relay surface. CORS and tracing layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}/comments", get(comments::list_comments))
        .route("/users/{id}/profile", get(users::get_profile))
        .route("/users/{id}/posts", get(posts::list_user_posts))
        .route("/relay", get(relay::ws_upgrade))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/posts/{id}/upvote", post(posts::toggle_upvote))
        .route("/posts/{id}/comments", post(comments::create_comment))
        .route("/users/{id}/profile", patch(users::update_profile))
        .route("/users/{id}/profile/image", put(users::update_profile_image))
        .route(
            "/users/{id}/connection",
            get(connections::get_status)
                .post(connections::request)
                .patch(connections::respond),
        )
        .route("/users/{id}/connections", get(connections::list))
        .route("/connections/{id}", delete(connections::delete))
        .route("/messages", get(messages::get_messages).post(messages::send_message))
        .route("/messages/mark-read", post(messages::mark_read))
        .route("/messages/unread-count", get(messages::unread_count))
        .route("/notifications", get(notifications::list))
        .route("/notifications/{id}", patch(notifications::mark_read))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/relay/auth", post(relay::channel_auth))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
