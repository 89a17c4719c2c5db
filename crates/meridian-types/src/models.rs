use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a stored enum value does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Enums persisted as SCREAMING_SNAKE_CASE text columns.
macro_rules! stored_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Founder,
    Vendor,
    User,
}

stored_enum!(Role, "role", {
    Admin => "ADMIN",
    Founder => "FOUNDER",
    Vendor => "VENDOR",
    User => "USER",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostCategory {
    ThoughtLeadership,
    Courses,
    CaseStudies,
    Events,
    Whitepapers,
    News,
    BlogPosts,
    Books,
    Podcasts,
    Presentations,
    PressReleases,
    Templates,
    Videos,
    Webinars,
}

stored_enum!(PostCategory, "post category", {
    ThoughtLeadership => "THOUGHT_LEADERSHIP",
    Courses => "COURSES",
    CaseStudies => "CASE_STUDIES",
    Events => "EVENTS",
    Whitepapers => "WHITEPAPERS",
    News => "NEWS",
    BlogPosts => "BLOG_POSTS",
    Books => "BOOKS",
    Podcasts => "PODCASTS",
    Presentations => "PRESENTATIONS",
    PressReleases => "PRESS_RELEASES",
    Templates => "TEMPLATES",
    Videos => "VIDEOS",
    Webinars => "WEBINARS",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

stored_enum!(ConnectionStatus, "connection status", {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ConnectionRequest,
    ConnectionAccepted,
    ConnectionRejected,
    NewMessage,
}

stored_enum!(NotificationKind, "notification kind", {
    ConnectionRequest => "CONNECTION_REQUEST",
    ConnectionAccepted => "CONNECTION_ACCEPTED",
    ConnectionRejected => "CONNECTION_REJECTED",
    NewMessage => "NEW_MESSAGE",
});

/// Public view of a user, embedded in posts, comments, connections and messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Role,
    pub business_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
}

impl SocialLinks {
    pub fn is_empty(&self) -> bool {
        self.facebook.is_none()
            && self.twitter.is_none()
            && self.linkedin.is_none()
            && self.instagram.is_none()
    }
}

/// A user merged with their profile. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub image: Option<String>,
    pub business_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub website: Option<String>,
    pub social_links: Option<SocialLinks>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub category: PostCategory,
    pub featured_image: Option<String>,
    pub video_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub upvote_count: i64,
    pub comment_count: i64,
    pub author: UserSummary,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub author: UserSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: ConnectionStatus,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read: bool,
    pub sender: UserSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A conversation as seen by one participant: `participants` excludes the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<MessagePreview>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_text_matches_serde_names() {
        let json = serde_json::to_string(&PostCategory::ThoughtLeadership).unwrap();
        assert_eq!(json, format!("\"{}\"", PostCategory::ThoughtLeadership.as_str()));

        let json = serde_json::to_string(&NotificationKind::ConnectionAccepted).unwrap();
        assert_eq!(json, "\"CONNECTION_ACCEPTED\"");
    }

    #[test]
    fn unknown_stored_value_is_an_error() {
        let err = "FRIEND".parse::<ConnectionStatus>().unwrap_err();
        assert_eq!(err.kind, "connection status");
        assert_eq!("REJECTED".parse::<ConnectionStatus>(), Ok(ConnectionStatus::Rejected));
    }
}
