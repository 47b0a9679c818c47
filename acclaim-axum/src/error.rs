use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use acclaim::{AccessError, AuthError, Error};

/// Errors returned by the HTTP surface.
///
/// Anything outside the public error taxonomy becomes
/// [`ApiError::Internal`], whose response never carries the underlying text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid email or password")]
    InvalidCredentials { attempts_remaining: Option<u32> },

    #[error("Too many failed login attempts. Try again in {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(AuthError::InvalidCredentials { attempts_remaining }) => {
                ApiError::InvalidCredentials { attempts_remaining }
            }
            Error::Auth(AuthError::RateLimited {
                retry_after_seconds,
            }) => ApiError::RateLimited {
                retry_after_seconds,
            },
            Error::Auth(AuthError::Unauthenticated) | Error::Session(_) => ApiError::Unauthorized,
            Error::Access(e @ (AccessError::NotOwner | AccessError::AdminRequired)) => {
                ApiError::Forbidden(e.to_string())
            }
            Error::Access(e @ AccessError::NotFound(_)) => ApiError::NotFound(e.to_string()),
            Error::Validation(e) => ApiError::BadRequest(e.to_string()),
            other => {
                tracing::error!(error = %other, "Request failed with an internal error");
                ApiError::Internal
            }
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials { .. } | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "code": status.as_u16()
        });

        match &self {
            ApiError::InvalidCredentials {
                attempts_remaining: Some(remaining),
            } => {
                body["attempts_remaining"] = json!(remaining);
            }
            ApiError::RateLimited {
                retry_after_seconds,
            } => {
                body["retry_after_seconds"] = json!(retry_after_seconds);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited {
            retry_after_seconds,
        } = self
        {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_seconds),
            );
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
