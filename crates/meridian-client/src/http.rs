use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use meridian_types::api::{
    ChannelAuthResponse, ConnectionList, CreateCommentRequest, CreatePostRequest, ErrorBody,
    LoginRequest, LoginResponse, MarkReadRequest, PostPage, RegisterRequest, RegisterResponse,
    RespondConnectionRequest, SendMessageRequest, UnreadCount, UpdateProfileImageRequest,
    UpdateProfileRequest, UpdatedCount, UpvoteResponse,
};
use meridian_types::connection::ConnectionAction;
use meridian_types::models::{
    Comment, Connection, ConnectionStatus, ConversationSummary, Message, Notification, Post,
    UserProfile, UserSummary,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {}", .body.error)]
    Api { status: StatusCode, body: ErrorBody },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(e) => e.status(),
            Self::Api { status, .. } => Some(*status),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Typed client for the Meridian REST API.
///
/// `register` and `login` store the returned token; every later call sends
/// it as a bearer header.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    // -- Auth --

    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> Result<RegisterResponse> {
        let body = RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        };
        let resp: RegisterResponse = self.send_json(Method::POST, "/auth/register", &body).await?;
        self.token = Some(resp.token.clone());
        Ok(resp)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        let resp: LoginResponse = self.send_json(Method::POST, "/auth/login", &body).await?;
        self.token = Some(resp.token.clone());
        Ok(resp)
    }

    // -- Posts --

    pub async fn feed(&self, cursor: Option<Uuid>, limit: Option<u32>) -> Result<PostPage> {
        self.page("/posts".into(), cursor, limit).await
    }

    pub async fn user_posts(&self, user_id: Uuid, cursor: Option<Uuid>, limit: Option<u32>) -> Result<PostPage> {
        self.page(format!("/users/{}/posts", user_id), cursor, limit).await
    }

    pub async fn create_post(&self, req: &CreatePostRequest) -> Result<Post> {
        self.send_json(Method::POST, "/posts", req).await
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/posts/{}", post_id)))
            .await
    }

    pub async fn toggle_upvote(&self, post_id: Uuid) -> Result<UpvoteResponse> {
        self.fetch(self.request(Method::POST, &format!("/posts/{}/upvote", post_id)))
            .await
    }

    pub async fn comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        self.get(&format!("/posts/{}/comments", post_id)).await
    }

    pub async fn create_comment(&self, post_id: Uuid, content: &str) -> Result<Comment> {
        let body = CreateCommentRequest {
            content: content.into(),
        };
        self.send_json(Method::POST, &format!("/posts/{}/comments", post_id), &body)
            .await
    }

    // -- Profiles --

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile> {
        self.get(&format!("/users/{}/profile", user_id)).await
    }

    pub async fn update_profile(&self, user_id: Uuid, req: &UpdateProfileRequest) -> Result<UserProfile> {
        self.send_json(Method::PATCH, &format!("/users/{}/profile", user_id), req)
            .await
    }

    pub async fn set_profile_image(&self, user_id: Uuid, image: &str) -> Result<UserSummary> {
        let body = UpdateProfileImageRequest { image: image.into() };
        self.send_json(Method::PUT, &format!("/users/{}/profile/image", user_id), &body)
            .await
    }

    // -- Connections --

    pub async fn connection_status(&self, user_id: Uuid) -> Result<Option<Connection>> {
        self.get(&format!("/users/{}/connection", user_id)).await
    }

    pub async fn request_connection(&self, user_id: Uuid) -> Result<Connection> {
        self.fetch(self.request(Method::POST, &format!("/users/{}/connection", user_id)))
            .await
    }

    pub async fn respond_connection(&self, user_id: Uuid, action: ConnectionAction) -> Result<Connection> {
        let body = RespondConnectionRequest { action };
        self.send_json(Method::PATCH, &format!("/users/{}/connection", user_id), &body)
            .await
    }

    pub async fn connections(&self, user_id: Uuid, status: Option<ConnectionStatus>) -> Result<ConnectionList> {
        let mut req = self.request(Method::GET, &format!("/users/{}/connections", user_id));
        if let Some(status) = status {
            req = req.query(&[("status", status.as_str())]);
        }
        self.fetch(req).await
    }

    pub async fn delete_connection(&self, connection_id: Uuid) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/connections/{}", connection_id)))
            .await
    }

    // -- Messages --

    pub async fn send_message(&self, receiver_id: Uuid, content: &str) -> Result<Message> {
        let body = SendMessageRequest {
            receiver_id,
            content: content.into(),
        };
        self.send_json(Method::POST, "/messages", &body).await
    }

    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.get("/messages").await
    }

    /// Latest messages of a conversation, newest first. Opening marks the
    /// caller's received messages read.
    pub async fn open_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let req = self
            .request(Method::GET, "/messages")
            .query(&[("conversation_id", conversation_id.to_string())]);
        self.fetch(req).await
    }

    pub async fn mark_messages_read(&self, message_ids: Vec<Uuid>) -> Result<UpdatedCount> {
        let body = MarkReadRequest { message_ids };
        self.send_json(Method::POST, "/messages/mark-read", &body).await
    }

    pub async fn unread_messages(&self) -> Result<UnreadCount> {
        self.get("/messages/unread-count").await
    }

    // -- Notifications --

    pub async fn notifications(&self, unread_only: bool) -> Result<Vec<Notification>> {
        let req = self
            .request(Method::GET, "/notifications")
            .query(&[("unread_only", unread_only)]);
        self.fetch(req).await
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> Result<Notification> {
        self.fetch(self.request(Method::PATCH, &format!("/notifications/{}", id)))
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<UpdatedCount> {
        self.fetch(self.request(Method::POST, "/notifications/mark-all-read"))
            .await
    }

    // -- Relay --

    /// Sign a subscription for `channel_name` on the given relay socket.
    pub async fn authorize_channel(&self, socket_id: &str, channel_name: &str) -> Result<ChannelAuthResponse> {
        let req = self
            .request(Method::POST, "/relay/auth")
            .form(&[("socket_id", socket_id), ("channel_name", channel_name)]);
        self.fetch(req).await
    }

    // -- Plumbing --

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(self.request(Method::GET, path)).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.fetch(self.request(method, path).json(body)).await
    }

    async fn page(&self, path: String, cursor: Option<Uuid>, limit: Option<u32>) -> Result<PostPage> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.fetch(self.request(Method::GET, &path).query(&query)).await
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<()> {
        check(req.send().await?).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into [`ClientError::Api`], keeping the server's
/// error body when it is JSON.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    debug!("{} {}", status, text);
    let body = serde_json::from_str(&text).unwrap_or(ErrorBody {
        error: if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text
        },
        field: None,
    });
    Err(ClientError::Api { status, body })
}
