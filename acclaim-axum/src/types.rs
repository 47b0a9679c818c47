use acclaim::{
    AuthenticatedUser, LoginAttemptRecord, LoginContext, OrganisationRequest, RateLimitStats,
    RestrictionAction, RestrictionEntry, RestrictionMatrix, RestrictionState, Session, UserId,
    CaseId,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleRestrictionRequest {
    pub user_id: UserId,
    pub case_id: CaseId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRestrictionRequest {
    pub action: RestrictionAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganisationRequestBody {
    pub target_user_id: UserId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub user: AuthenticatedUser,
    pub session: Session,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user: AuthenticatedUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestrictionsResponse {
    pub restrictions: Vec<RestrictionEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixResponse {
    pub matrix: RestrictionMatrix,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleRestrictionResponse {
    pub restricted: bool,
    pub state: RestrictionState,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkRestrictionResponse {
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestAcceptedResponse {
    pub message: String,
    pub request: OrganisationRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatsResponse {
    pub stats: RateLimitStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitRecordsResponse {
    pub records: Vec<LoginAttemptRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnlockResponse {
    pub identifier: String,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Where a request came from.
///
/// `ip` is the socket peer address. When the peer is one of the trusted
/// proxies in [`ProxyConfig`], it is the right-most `X-Forwarded-For` hop
/// that is not itself a trusted proxy. Without a peer address it is
/// `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ConnectionInfo {
    pub fn login_context(&self) -> LoginContext {
        LoginContext::new(self.ip.clone(), self.user_agent.clone())
    }
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: CookieSameSite,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self::new("acclaim_session")
    }
}

#[derive(Debug, Clone, Default)]
pub enum CookieSameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl CookieConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http_only: true,
            secure: true,
            same_site: CookieSameSite::Lax,
            path: "/".to_string(),
        }
    }

    /// Same as the default but without `Secure`, for plain-HTTP local setups.
    pub fn development() -> Self {
        Self {
            secure: false,
            ..Self::default()
        }
    }
}

/// Reverse proxies whose `X-Forwarded-For` header is believed.
///
/// Empty by default, so the header is ignored and the socket peer address
/// keys the login rate limiter.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub trusted_proxies: Vec<IpAddr>,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trusted_proxy(mut self, proxy: IpAddr) -> Self {
        self.trusted_proxies.push(proxy);
        self
    }

    pub fn with_trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.trusted_proxies.extend(proxies);
        self
    }

    pub fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.contains(ip)
    }
}
