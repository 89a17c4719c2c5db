use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use meridian_db::Guarded;
use meridian_relay::ChannelAuthError;
use meridian_types::api::ErrorBody;
use meridian_types::connection::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                ErrorBody {
                    error: "internal server error".into(),
                    field: None,
                }
            }
            Self::Validation { field, message } => ErrorBody {
                error: message.clone(),
                field: field.map(str::to_string),
            },
            other => ErrorBody {
                error: other.to_string(),
                field: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::SelfConnection => Self::validation(e.to_string()),
            TransitionError::AlreadyExists | TransitionError::AlreadyAnswered => {
                Self::Conflict(e.to_string())
            }
            TransitionError::NoConnection | TransitionError::NoPendingRequest => {
                Self::NotFound(e.to_string())
            }
        }
    }
}

impl From<ChannelAuthError> for ApiError {
    fn from(e: ChannelAuthError) -> Self {
        Self::Forbidden(e.to_string())
    }
}

/// Unwrap an owner-restricted write, naming the row for the 404 message.
pub fn guarded<T>(outcome: Guarded<T>, what: &str) -> Result<T, ApiError> {
    match outcome {
        Guarded::Done(value) => Ok(value),
        Guarded::NotFound => Err(ApiError::NotFound(format!("{} not found", what))),
        Guarded::Forbidden => Err(ApiError::Forbidden(format!("not allowed to modify this {}", what))),
    }
}
