use std::sync::Arc;

use acclaim::{Acclaim, AccessError, Error, RateLimitStore, RepositoryProvider};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    error::ApiError,
    extractors::{CurrentSession, bearer_token, cookie_name, cookie_token},
    types::CookieConfig,
};

pub struct AuthState<R: RepositoryProvider, S: RateLimitStore> {
    pub acclaim: Arc<Acclaim<R, S>>,
}

impl<R: RepositoryProvider, S: RateLimitStore> Clone for AuthState<R, S> {
    fn clone(&self) -> Self {
        Self {
            acclaim: self.acclaim.clone(),
        }
    }
}

/// Resolve the request's session, if any, into a [`CurrentSession`] extension.
///
/// Never rejects; pair with [`require_auth`] on routes that need a session.
pub async fn auth_middleware<R, S>(
    State(state): State<AuthState<R, S>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    // Try Bearer token first, then fall back to cookie
    let session_token = bearer_token(request.headers()).or_else(|| {
        let name = cookie_name(request.extensions().get::<CookieConfig>());
        cookie_token(&jar, &name)
    });

    if let Some(session_token) = session_token {
        match state.acclaim.authenticate_session(&session_token).await {
            Ok((session, user)) => {
                request
                    .extensions_mut()
                    .insert(CurrentSession { session, user });
            }
            Err(e) if e.is_session_error() => {
                tracing::debug!(error = %e, "Invalid session");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve session");
            }
        }
    }

    next.run(request).await
}

/// Reject requests without a resolved session.
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<CurrentSession>().is_none() {
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Reject requests unless the session belongs to a platform administrator.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let current = request
        .extensions()
        .get::<CurrentSession>()
        .ok_or(ApiError::Unauthorized)?;

    if !current.user.is_admin {
        tracing::warn!(user_id = %current.user.id, "Non-administrator denied admin endpoint");
        return Err(Error::from(AccessError::AdminRequired).into());
    }

    Ok(next.run(request).await)
}
