use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connection::ConnectionAction;
use crate::models::{Connection, Post, PostCategory, Role, UserProfile};

// -- JWT Claims --

/// Session claims shared by the REST middleware and the relay socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub token: String,
}

// -- Profiles --

/// Absent fields are left unchanged; an empty string clears the field.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub website: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileImageRequest {
    pub image: String,
}

// -- Posts --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub summary: Option<String>,
    pub featured_image: Option<String>,
    pub video_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostPage {
    pub items: Vec<Post>,
    pub next_cursor: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpvoteResponse {
    pub upvoted: bool,
    pub upvote_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
}

// -- Connections --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondConnectionRequest {
    pub action: ConnectionAction,
}

/// Listing shape: pending requests are split by direction.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectionList {
    Pending {
        sent: Vec<Connection>,
        received: Vec<Connection>,
    },
    All {
        connections: Vec<Connection>,
    },
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub message_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedCount {
    pub updated: usize,
}

// -- Relay --

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelAuthRequest {
    pub socket_id: Option<String>,
    pub channel_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelAuthResponse {
    pub auth: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
