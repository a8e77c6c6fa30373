use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::access::DenyReason;

pub type AppResult<T> = Result<T, AppError>;

/// Coarse classification used by the transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    NotFound,
    Auth,
    Forbidden,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),
    #[error("This email is already registered")]
    DuplicateEmail,
    #[error("This user does not exist")]
    UserNotFound,
    #[error("This lobby does not exist")]
    RoomNotFound,
    #[error("This message does not exist")]
    MessageNotFound,
    #[error("User does not exist in lobby")]
    NotMember,
    #[error("Wrong password")]
    BadCredentials,
    #[error("Unauthorized")]
    MissingToken,
    #[error("Invalid token")]
    MalformedToken,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Forbidden: {0}")]
    Forbidden(DenyReason),
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidInput(what.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        use AppError::*;
        match self {
            InvalidInput(_) => ErrorKind::Input,
            DuplicateEmail => ErrorKind::Conflict,
            UserNotFound | RoomNotFound | MessageNotFound | NotMember => ErrorKind::NotFound,
            BadCredentials | MissingToken | MalformedToken | ExpiredToken | BadSignature => {
                ErrorKind::Auth
            }
            Forbidden(_) => ErrorKind::Forbidden,
            Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Input | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(err) = &self {
            // the enclosing request span carries the operation and resource ids
            tracing::error!(error = ?err, "request failed");
        }

        (self.status(), axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(sqlx::Error);
apperr_impl!(tokio::task::JoinError);
apperr_impl!(bcrypt::BcryptError);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::RoomNotFound => AppError::RoomNotFound,
            DenyReason::MessageNotFound => AppError::MessageNotFound,
            other => AppError::Forbidden(other),
        }
    }
}
