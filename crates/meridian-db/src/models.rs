//! Row and input types local to the data layer.
//! Query results are returned as `meridian_types::models` values; the types
//! here cover what never leaves the server or only describes a write.

use meridian_types::connection::TransitionError;
use meridian_types::models::{Connection, PostCategory, Role};
use uuid::Uuid;

/// Credentials row, only used by login.
pub struct UserRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Role,
}

pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub summary: Option<String>,
    pub featured_image: Option<String>,
    pub video_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub tags: Vec<String>,
}

/// `None` leaves a column untouched, `Some(None)` clears it.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub name: Option<Option<String>>,
    pub business_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub occupation: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub facebook: Option<Option<String>>,
    pub twitter: Option<Option<String>>,
    pub linkedin: Option<Option<String>>,
    pub instagram: Option<Option<String>>,
}

/// Result of a connection state transition attempt.
#[derive(Debug)]
pub enum ConnectionOutcome {
    Applied(Connection),
    Refused(TransitionError),
}

/// Result of a write restricted to the row's owner(s).
#[derive(Debug, PartialEq)]
pub enum Guarded<T> {
    Done(T),
    NotFound,
    Forbidden,
}
