use std::sync::Arc;

use acclaim::{
    Acclaim, CaseId, OrganisationId, RateLimitStore, RepositoryProvider, RequestKind, UserId,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};

use crate::{
    error::{ApiError, Result},
    extractors::{CurrentSession, OptionalCurrentSession, SessionTokenFromRequest},
    middleware::{AuthState, auth_middleware, require_admin, require_auth},
    types::*,
};

pub fn create_router<R, S>(
    acclaim: Arc<Acclaim<R, S>>,
    cookie_config: CookieConfig,
    proxy_config: ProxyConfig,
) -> Router
where
    R: RepositoryProvider + 'static,
    S: RateLimitStore + 'static,
{
    let state = AuthState { acclaim };

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/session", get(get_session_handler).delete(logout_handler))
        .route("/user", get(get_user_handler));

    let organisation_routes = Router::new()
        .route(
            "/organisations/{org}/restrictions",
            get(get_restrictions_handler),
        )
        .route(
            "/organisations/{org}/restrictions/matrix",
            get(restriction_matrix_handler),
        )
        .route(
            "/organisations/{org}/restrictions/toggle",
            post(toggle_restriction_handler),
        )
        .route(
            "/organisations/{org}/members/{user}/restrictions",
            post(bulk_member_restriction_handler),
        )
        .route(
            "/organisations/{org}/cases/{case}/restrictions",
            post(bulk_case_restriction_handler),
        )
        .route(
            "/organisations/{org}/requests/member-removal",
            post(member_removal_handler),
        )
        .route(
            "/organisations/{org}/requests/owner-delegation",
            post(owner_delegation_handler),
        )
        .route(
            "/organisations/{org}/requests/ownership-removal",
            post(ownership_removal_handler),
        )
        .route_layer(axum::middleware::from_fn(require_auth));

    let admin_routes = Router::new()
        .route("/admin/rate-limits", get(rate_limit_stats_handler))
        .route("/admin/rate-limits/locked", get(locked_identifiers_handler))
        .route("/admin/rate-limits/tracked", get(tracked_identifiers_handler))
        .route("/admin/rate-limits/{identifier}", delete(unlock_handler))
        .route_layer(axum::middleware::from_fn(require_admin));

    Router::new()
        .merge(public_routes)
        .merge(organisation_routes)
        .merge(admin_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<R, S>,
        ))
        .with_state(state)
        .layer(Extension(cookie_config))
        .layer(Extension(proxy_config))
}

async fn health_handler<R, S>(State(state): State<AuthState<R, S>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    state.acclaim.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn login_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    Extension(cookie_config): Extension<CookieConfig>,
    connection_info: ConnectionInfo,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let outcome = state
        .acclaim
        .login_with_password(
            &payload.email,
            &payload.password,
            &connection_info.login_context(),
        )
        .await?;

    let same_site = match cookie_config.same_site {
        CookieSameSite::Strict => SameSite::Strict,
        CookieSameSite::Lax => SameSite::Lax,
        CookieSameSite::None => SameSite::None,
    };

    let cookie = Cookie::build((cookie_config.name, outcome.session.token.to_string()))
        .path(cookie_config.path)
        .http_only(cookie_config.http_only)
        .secure(cookie_config.secure)
        .same_site(same_site);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(AuthResponse {
            user: outcome.user,
            session: outcome.session,
        }),
    ))
}

async fn logout_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    Extension(cookie_config): Extension<CookieConfig>,
    jar: CookieJar,
    SessionTokenFromRequest(session_token): SessionTokenFromRequest,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    if let Some(session_token) = session_token {
        state.acclaim.logout(&session_token).await?;
    }

    let jar = jar.remove(Cookie::build((cookie_config.name, "")).path(cookie_config.path));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Successfully logged out".to_string(),
        }),
    ))
}

async fn get_session_handler(current: CurrentSession) -> Result<impl IntoResponse> {
    Ok(Json(SessionResponse {
        session: current.session,
    }))
}

async fn get_user_handler(
    OptionalCurrentSession(current): OptionalCurrentSession,
) -> Result<impl IntoResponse> {
    match current {
        Some(current) => Ok(Json(UserResponse { user: current.user })),
        None => Err(ApiError::Unauthorized),
    }
}

async fn get_restrictions_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path(organisation_id): Path<OrganisationId>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let restrictions = state
        .acclaim
        .access()
        .get_restrictions(&current.user.id, &organisation_id)
        .await?;
    Ok(Json(RestrictionsResponse { restrictions }))
}

async fn restriction_matrix_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path(organisation_id): Path<OrganisationId>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let matrix = state
        .acclaim
        .access()
        .restriction_matrix(&current.user.id, &organisation_id)
        .await?;
    Ok(Json(MatrixResponse { matrix }))
}

async fn toggle_restriction_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path(organisation_id): Path<OrganisationId>,
    Json(payload): Json<ToggleRestrictionRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let restriction = state
        .acclaim
        .access()
        .toggle_restriction(
            &current.user.id,
            &organisation_id,
            &payload.user_id,
            &payload.case_id,
        )
        .await?;

    Ok(Json(ToggleRestrictionResponse {
        restricted: restriction.is_restricted(),
        state: restriction,
    }))
}

async fn bulk_member_restriction_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path((organisation_id, user_id)): Path<(OrganisationId, UserId)>,
    Json(payload): Json<BulkRestrictionRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let updated = state
        .acclaim
        .access()
        .bulk_member_restriction(&current.user.id, &organisation_id, &user_id, payload.action)
        .await?;
    Ok(Json(BulkRestrictionResponse { updated }))
}

async fn bulk_case_restriction_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path((organisation_id, case_id)): Path<(OrganisationId, CaseId)>,
    Json(payload): Json<BulkRestrictionRequest>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let updated = state
        .acclaim
        .access()
        .bulk_case_restriction(&current.user.id, &organisation_id, &case_id, payload.action)
        .await?;
    Ok(Json(BulkRestrictionResponse { updated }))
}

async fn submit_request<R, S>(
    state: &AuthState<R, S>,
    kind: RequestKind,
    current: &CurrentSession,
    organisation_id: &OrganisationId,
    payload: &OrganisationRequestBody,
) -> Result<(StatusCode, Json<RequestAcceptedResponse>)>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let request = state
        .acclaim
        .access()
        .submit_request(
            kind,
            &current.user.id,
            organisation_id,
            &payload.target_user_id,
            payload.reason.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RequestAcceptedResponse {
            message: "Request sent to the administrator".to_string(),
            request,
        }),
    ))
}

async fn member_removal_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path(organisation_id): Path<OrganisationId>,
    Json(payload): Json<OrganisationRequestBody>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    submit_request(
        &state,
        RequestKind::MemberRemoval,
        &current,
        &organisation_id,
        &payload,
    )
    .await
}

async fn owner_delegation_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path(organisation_id): Path<OrganisationId>,
    Json(payload): Json<OrganisationRequestBody>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    submit_request(
        &state,
        RequestKind::OwnerDelegation,
        &current,
        &organisation_id,
        &payload,
    )
    .await
}

async fn ownership_removal_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path(organisation_id): Path<OrganisationId>,
    Json(payload): Json<OrganisationRequestBody>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    submit_request(
        &state,
        RequestKind::OwnershipRemoval,
        &current,
        &organisation_id,
        &payload,
    )
    .await
}

async fn rate_limit_stats_handler<R, S>(
    State(state): State<AuthState<R, S>>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let stats = state.acclaim.rate_limiter().stats().await?;
    Ok(Json(RateLimitStatsResponse { stats }))
}

async fn locked_identifiers_handler<R, S>(
    State(state): State<AuthState<R, S>>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let records = state.acclaim.rate_limiter().locked_identifiers().await?;
    Ok(Json(RateLimitRecordsResponse { records }))
}

async fn tracked_identifiers_handler<R, S>(
    State(state): State<AuthState<R, S>>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let records = state.acclaim.rate_limiter().tracked_identifiers().await?;
    Ok(Json(RateLimitRecordsResponse { records }))
}

async fn unlock_handler<R, S>(
    State(state): State<AuthState<R, S>>,
    current: CurrentSession,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    let unlocked = state.acclaim.rate_limiter().unlock(&identifier).await?;
    tracing::info!(
        identifier = %identifier,
        admin_id = %current.user.id,
        unlocked = unlocked,
        "Administrator cleared login rate limit"
    );

    Ok(Json(UnlockResponse {
        identifier,
        unlocked,
    }))
}
