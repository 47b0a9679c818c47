use std::net::{IpAddr, SocketAddr};

use acclaim::{AuthenticatedUser, Session, SessionToken};
use axum::{
    RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, StatusCode, request::Parts},
};
use axum_extra::{TypedHeader, extract::CookieJar, headers::UserAgent};

use crate::{
    error::ApiError,
    types::{ConnectionInfo, CookieConfig, ProxyConfig},
};

const UNKNOWN: &str = "unknown";

impl<S> FromRequestParts<S> for ConnectionInfo
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .extract::<Option<TypedHeader<UserAgent>>>()
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid user agent header"))?
            .map(|ua| ua.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let peer = parts
            .extract::<ConnectInfo<SocketAddr>>()
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = match (peer, parts.extensions.get::<ProxyConfig>()) {
            (Some(peer), Some(proxies)) => client_ip(peer, &parts.headers, proxies).to_string(),
            (Some(peer), None) => peer.to_string(),
            (None, _) => UNKNOWN.to_string(),
        };

        Ok(ConnectionInfo { ip, user_agent })
    }
}

/// Client address for a request received from `peer`.
///
/// `X-Forwarded-For` is only read when `peer` is a trusted proxy. Hops are
/// walked right to left and the first one that is not a trusted proxy wins,
/// since everything to its left was written by the client. A hop that does
/// not parse stops the walk at the last trusted address.
fn client_ip(peer: IpAddr, headers: &HeaderMap, proxies: &ProxyConfig) -> IpAddr {
    if !proxies.is_trusted(&peer) {
        return peer;
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    let mut client = peer;
    for hop in hops.into_iter().rev() {
        let Some(ip) = parse_hop(hop) else {
            break;
        };
        client = ip;
        if !proxies.is_trusted(&ip) {
            break;
        }
    }
    client
}

fn parse_hop(hop: &str) -> Option<IpAddr> {
    hop.parse::<IpAddr>()
        .ok()
        .or_else(|| hop.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// The session and identity resolved by [`auth_middleware`](crate::auth_middleware).
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session: Session,
    pub user: AuthenticatedUser,
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

pub struct OptionalCurrentSession(pub Option<CurrentSession>);

impl<S> FromRequestParts<S> for OptionalCurrentSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalCurrentSession(
            parts.extensions.get::<CurrentSession>().cloned(),
        ))
    }
}

/// Session token from a `Bearer` authorization header, else the session cookie.
pub struct SessionTokenFromRequest(pub Option<SessionToken>);

impl<S> FromRequestParts<S> for SessionTokenFromRequest
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            return Ok(SessionTokenFromRequest(Some(token)));
        }

        let jar = parts
            .extract::<CookieJar>()
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid cookie header"))?;

        Ok(SessionTokenFromRequest(cookie_token(
            &jar,
            &cookie_name(parts.extensions.get::<CookieConfig>()),
        )))
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(SessionToken::new)
}

pub(crate) fn cookie_token(jar: &CookieJar, name: &str) -> Option<SessionToken> {
    jar.get(name)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .map(SessionToken::new)
}

pub(crate) fn cookie_name(config: Option<&CookieConfig>) -> String {
    config
        .map(|config| config.name.clone())
        .unwrap_or_else(|| CookieConfig::default().name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(value: &str) -> IpAddr {
        value.parse().unwrap()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_for() {
        let proxies = ProxyConfig::default();
        let headers = forwarded("203.0.113.5");
        assert_eq!(
            client_ip(ip("198.51.100.20"), &headers, &proxies),
            ip("198.51.100.20")
        );
    }

    #[test]
    fn test_trusted_proxy_yields_right_most_untrusted_hop() {
        let proxies = ProxyConfig::new()
            .with_trusted_proxies([ip("10.0.0.254"), ip("10.0.0.253")]);

        // the left-most entry is whatever the client sent
        let headers = forwarded(" 1.2.3.4 , 203.0.113.5, 10.0.0.253");
        assert_eq!(
            client_ip(ip("10.0.0.254"), &headers, &proxies),
            ip("203.0.113.5")
        );

        let headers = forwarded("203.0.113.5:51234");
        assert_eq!(
            client_ip(ip("10.0.0.254"), &headers, &proxies),
            ip("203.0.113.5")
        );
    }

    #[test]
    fn test_trusted_proxy_without_usable_header() {
        let proxies = ProxyConfig::new().with_trusted_proxy(ip("10.0.0.254"));
        assert_eq!(
            client_ip(ip("10.0.0.254"), &HeaderMap::new(), &proxies),
            ip("10.0.0.254")
        );
        assert_eq!(
            client_ip(ip("10.0.0.254"), &forwarded(""), &proxies),
            ip("10.0.0.254")
        );
        // garbage stops the walk at the last trusted hop
        assert_eq!(
            client_ip(ip("10.0.0.254"), &forwarded("203.0.113.5, not-an-ip"), &proxies),
            ip("10.0.0.254")
        );
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some(SessionToken::new("abc123")));

        headers.insert("Authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }
}
