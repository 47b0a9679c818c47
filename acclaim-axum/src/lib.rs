//! # Acclaim Axum Integration
//!
//! Axum routes and middleware exposing the Acclaim portal core over HTTP:
//!
//! - **Sessions**: password login (sets a session cookie), logout, session and
//!   identity lookup
//! - **Case access**: restriction toggles, bulk restriction, the owner matrix
//!   view and the request-only membership workflows
//! - **Administration**: login rate-limit statistics and force-unlock, for
//!   platform administrators only
//!
//! Core errors map to HTTP statuses: invalid credentials and missing
//! sessions are 401, lockouts are 429 with `Retry-After`, non-owners and
//! non-administrators get 403, unknown organisations, members and cases
//! 404, validation failures 400. Anything else is a bare 500.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//! use acclaim::AcclaimBuilder;
//! use acclaim_axum::CookieConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let acclaim = AcclaimBuilder::new()
//!         .with_sqlite("sqlite://acclaim.db")
//!         .await?
//!         .with_sqlite_rate_limits()
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let app = acclaim_axum::routes(Arc::new(acclaim))
//!         .with_cookie_config(CookieConfig::development())
//!         .build();
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use extractors::{CurrentSession, OptionalCurrentSession, SessionTokenFromRequest};
pub use middleware::{AuthState, auth_middleware, require_admin, require_auth};
pub use routes::create_router;
pub use types::{
    AuthResponse, BulkRestrictionRequest, BulkRestrictionResponse, ConnectionInfo, CookieConfig,
    CookieSameSite, HealthResponse, LoginRequest, MatrixResponse, MessageResponse,
    OrganisationRequestBody, ProxyConfig, RateLimitRecordsResponse, RateLimitStatsResponse,
    RequestAcceptedResponse, RestrictionsResponse, SessionResponse, ToggleRestrictionRequest,
    ToggleRestrictionResponse, UnlockResponse, UserResponse,
};

use acclaim::{Acclaim, RateLimitStore, RepositoryProvider};
use axum::Router;
use std::sync::Arc;

/// Create the Acclaim routes for your Axum application.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`. The
/// peer address keys the login rate limiter; without it every client shares
/// the `"unknown"` identifier. Behind a reverse proxy, list the proxy with
/// [`AcclaimRouterBuilder::with_proxy_config`].
pub fn routes<R, S>(acclaim: Arc<Acclaim<R, S>>) -> AcclaimRouterBuilder<R, S>
where
    R: RepositoryProvider + 'static,
    S: RateLimitStore + 'static,
{
    AcclaimRouterBuilder {
        acclaim,
        cookie_config: CookieConfig::default(),
        proxy_config: ProxyConfig::default(),
    }
}

/// Builder for configuring the routes
pub struct AcclaimRouterBuilder<R: RepositoryProvider, S: RateLimitStore> {
    acclaim: Arc<Acclaim<R, S>>,
    cookie_config: CookieConfig,
    proxy_config: ProxyConfig,
}

impl<R: RepositoryProvider + 'static, S: RateLimitStore + 'static> AcclaimRouterBuilder<R, S> {
    /// Set custom cookie configuration
    pub fn with_cookie_config(mut self, config: CookieConfig) -> Self {
        self.cookie_config = config;
        self
    }

    /// Trust `X-Forwarded-For` from these reverse proxies
    pub fn with_proxy_config(mut self, config: ProxyConfig) -> Self {
        self.proxy_config = config;
        self
    }

    /// Build the router with the configured options
    pub fn build(self) -> Router {
        create_router(self.acclaim, self.cookie_config, self.proxy_config)
    }
}

impl<R: RepositoryProvider + 'static, S: RateLimitStore + 'static> From<AcclaimRouterBuilder<R, S>>
    for Router
{
    fn from(builder: AcclaimRouterBuilder<R, S>) -> Self {
        builder.build()
    }
}
