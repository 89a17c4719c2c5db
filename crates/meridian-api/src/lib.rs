pub mod auth;
pub mod comments;
pub mod connections;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod notify;
pub mod posts;
pub mod relay;
pub mod routes;
pub mod users;
pub mod validate;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
