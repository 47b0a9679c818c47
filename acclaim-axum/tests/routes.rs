use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use acclaim::{
    Acclaim, AcclaimBuilder, MembershipRole, NewUser, Organisation, SqliteRepositoryProvider, User,
};
use acclaim_core::repositories::{OrganisationRepository, OrganisationRepositoryProvider};
use acclaim_axum::ProxyConfig;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, RETRY_AFTER, SET_COOKIE},
    },
    response::Response,
};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

type SqliteAcclaim = Acclaim<SqliteRepositoryProvider>;

const PASSWORD: &str = "Recovery2024";

struct TestApp {
    acclaim: Arc<SqliteAcclaim>,
    router: Router,
}

async fn test_app() -> TestApp {
    let _ = tracing_subscriber::fmt().try_init();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let acclaim = Arc::new(
        AcclaimBuilder::new()
            .with_sqlite_pool(pool)
            .apply_migrations(true)
            .build()
            .await
            .unwrap(),
    );
    let router = acclaim_axum::routes(acclaim.clone()).build();
    TestApp { acclaim, router }
}

impl TestApp {
    async fn user(&self, email: &str, name: &str) -> User {
        self.insert_user(NewUser::new(email, name)).await
    }

    async fn admin(&self, email: &str) -> User {
        let new_user = NewUser::builder()
            .email(email)
            .name("Platform Admin")
            .is_admin(true)
            .build()
            .unwrap();
        self.insert_user(new_user).await
    }

    async fn insert_user(&self, new_user: NewUser) -> User {
        let user = self.acclaim.create_user(new_user).await.unwrap();
        self.acclaim.set_password(&user.id, PASSWORD).await.unwrap();
        user
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Log in over a connection from `ip`.
    async fn login(&self, email: &str, password: &str, ip: &str) -> Response {
        self.login_via(email, password, ip, None).await
    }

    async fn login_via(
        &self,
        email: &str,
        password: &str,
        peer: &str,
        forwarded_for: Option<&str>,
    ) -> Response {
        let mut request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(CONTENT_TYPE, "application/json");
        if let Some(forwarded_for) = forwarded_for {
            request = request.header("x-forwarded-for", forwarded_for);
        }
        let mut request = request
            .body(Body::from(
                json!({ "email": email, "password": password }).to_string(),
            ))
            .unwrap();
        let peer: IpAddr = peer.parse().unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::new(peer, 51000)));
        self.send(request).await
    }

    /// Log in and return the session token.
    async fn token(&self, email: &str) -> String {
        let response = self.login(email, PASSWORD, "10.0.0.1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        body["session"]["token"].as_str().unwrap().to_string()
    }

    async fn post(&self, uri: &str, token: &str, payload: Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn organisation(&self, owner: &User, member: &User) -> Organisation {
        let organisations = self.acclaim.repositories().organisation();
        let org = organisations
            .create_organisation("Northwind Recoveries")
            .await
            .unwrap();
        organisations
            .upsert_member(&org.id, &owner.id, MembershipRole::Owner)
            .await
            .unwrap();
        organisations
            .upsert_member(&org.id, &member.id, MembershipRole::Member)
            .await
            .unwrap();
        org
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = test_app().await;
    let user = app.user("agent@example.com", "Agent").await;

    let response = app.login("agent@example.com", PASSWORD, "10.0.0.2").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("acclaim_session="));
    assert!(cookie.contains("HttpOnly"));

    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], user.id.as_str());
    assert!(body["user"].get("password_hash").is_none());

    // the cookie alone authenticates follow-up requests
    let session_cookie = cookie.split(';').next().unwrap().to_string();
    let response = app
        .send(
            Request::builder()
                .uri("/user")
                .header(COOKIE, session_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["email"], "agent@example.com");
}

#[tokio::test]
async fn test_failed_login_reports_remaining_attempts_then_locks() {
    let app = test_app().await;
    app.user("target@example.com", "Target").await;

    let response = app.login("target@example.com", "wrong", "192.0.2.50").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["attempts_remaining"], 4);
    assert_eq!(body["code"], 401);

    for _ in 0..3 {
        let response = app.login("target@example.com", "wrong", "192.0.2.50").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.login("target@example.com", "wrong", "192.0.2.50").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 15 * 60);

    // the correct password does not get past an active lock
    let response = app.login("target@example.com", PASSWORD, "192.0.2.50").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // other clients are unaffected
    let response = app.login("target@example.com", PASSWORD, "192.0.2.51").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_escape_a_lock() {
    let app = test_app().await;
    app.user("rotated@example.com", "Rotated").await;

    for i in 0..5 {
        let forged = format!("10.9.9.{i}");
        let response = app
            .login_via("rotated@example.com", "wrong", "192.0.2.70", Some(forged.as_str()))
            .await;
        assert_ne!(response.status(), StatusCode::OK);
    }

    let response = app
        .login_via(
            "rotated@example.com",
            PASSWORD,
            "192.0.2.70",
            Some("10.9.9.200"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_trusted_proxy_keys_the_lock_on_the_forwarding_client() {
    let mut app = test_app().await;
    app.router = acclaim_axum::routes(app.acclaim.clone())
        .with_proxy_config(ProxyConfig::new().with_trusted_proxy("10.0.0.254".parse().unwrap()))
        .build();
    app.user("proxied@example.com", "Proxied").await;

    // the client controls everything left of what the proxy appended
    for i in 0..5 {
        let header = format!("172.16.0.{i}, 198.51.100.7");
        app.login_via("proxied@example.com", "wrong", "10.0.0.254", Some(header.as_str()))
            .await;
    }

    let response = app
        .login_via(
            "proxied@example.com",
            PASSWORD,
            "10.0.0.254",
            Some("172.16.0.99, 198.51.100.7"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // another client behind the same proxy is unaffected
    let response = app
        .login_via(
            "proxied@example.com",
            PASSWORD,
            "10.0.0.254",
            Some("198.51.100.8"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // a client talking to the router directly cannot claim an address
    let response = app
        .login_via(
            "proxied@example.com",
            PASSWORD,
            "192.0.2.80",
            Some("198.51.100.7"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_email_is_indistinguishable_from_wrong_password() {
    let app = test_app().await;
    app.user("known@example.com", "Known").await;

    let unknown = app.login("nobody@example.com", "whatever", "198.51.100.1").await;
    let wrong = app.login("known@example.com", "whatever", "198.51.100.2").await;
    assert_eq!(unknown.status(), wrong.status());
    assert_eq!(json_body(unknown).await, json_body(wrong).await);
}

#[tokio::test]
async fn test_session_requires_authentication() {
    let app = test_app().await;
    assert_eq!(
        app.get("/session", None).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/session", Some("not-a-token")).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = test_app().await;
    app.user("leaving@example.com", "Leaving").await;
    let token = app.token("leaving@example.com").await;

    assert_eq!(
        app.get("/session", Some(&token)).await.status(),
        StatusCode::OK
    );

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .header(COOKIE, format!("acclaim_session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cleared.starts_with("acclaim_session="));

    assert_eq!(
        app.get("/session", Some(&token)).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_owner_toggles_restriction() {
    let app = test_app().await;
    let owner = app.user("owner@example.com", "Owner").await;
    let member = app.user("member@example.com", "Member").await;
    let org = app.organisation(&owner, &member).await;
    let case = app
        .acclaim
        .repositories()
        .organisation()
        .create_case(&org.id, "CASE-100")
        .await
        .unwrap();
    let token = app.token("owner@example.com").await;

    let uri = format!("/organisations/{}/restrictions/toggle", org.id);
    let payload = json!({ "user_id": member.id, "case_id": case.id });

    let response = app.post(&uri, &token, payload.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["restricted"], true);
    assert_eq!(body["state"], "restricted");

    let restrictions = json_body(
        app.get(&format!("/organisations/{}/restrictions", org.id), Some(&token))
            .await,
    )
    .await;
    assert_eq!(restrictions["restrictions"].as_array().unwrap().len(), 1);

    let response = app.post(&uri, &token, payload).await;
    assert_eq!(json_body(response).await["restricted"], false);
}

#[tokio::test]
async fn test_restrictions_are_hidden_from_other_tenants() {
    let app = test_app().await;
    let owner = app.user("owner@tenant-a.example", "Owner A").await;
    let member = app.user("member@tenant-a.example", "Member A").await;
    let org = app.organisation(&owner, &member).await;
    let case = app
        .acclaim
        .repositories()
        .organisation()
        .create_case(&org.id, "CASE-150")
        .await
        .unwrap();

    let outsider = app.user("owner@tenant-b.example", "Owner B").await;
    let rival_member = app.user("member@tenant-b.example", "Member B").await;
    app.organisation(&outsider, &rival_member).await;

    let owner_token = app.token("owner@tenant-a.example").await;
    let response = app
        .post(
            &format!("/organisations/{}/restrictions/toggle", org.id),
            &owner_token,
            json!({ "user_id": member.id, "case_id": case.id }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let uri = format!("/organisations/{}/restrictions", org.id);
    let outsider_token = app.token("owner@tenant-b.example").await;
    let response = app.get(&uri, Some(&outsider_token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body.get("restrictions").is_none());

    // members of the organisation still read the list
    let member_token = app.token("member@tenant-a.example").await;
    let response = app.get(&uri, Some(&member_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["restrictions"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_member_cannot_mutate_restrictions() {
    let app = test_app().await;
    let owner = app.user("boss@example.com", "Boss").await;
    let member = app.user("staff@example.com", "Staff").await;
    let org = app.organisation(&owner, &member).await;
    let case = app
        .acclaim
        .repositories()
        .organisation()
        .create_case(&org.id, "CASE-200")
        .await
        .unwrap();
    let token = app.token("staff@example.com").await;

    let response = app
        .post(
            &format!("/organisations/{}/restrictions/toggle", org.id),
            &token,
            json!({ "user_id": member.id, "case_id": case.id }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post(
            &format!("/organisations/{}/members/{}/restrictions", org.id, member.id),
            &token,
            json!({ "action": "restrict-all" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .get(
            &format!("/organisations/{}/restrictions/matrix", org.id),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bulk_case_restriction_and_matrix() {
    let app = test_app().await;
    let owner = app.user("lead@example.com", "Lead").await;
    let member = app.user("clerk@example.com", "Clerk").await;
    let org = app.organisation(&owner, &member).await;
    let case = app
        .acclaim
        .repositories()
        .organisation()
        .create_case(&org.id, "CASE-300")
        .await
        .unwrap();
    let token = app.token("lead@example.com").await;

    let response = app
        .post(
            &format!("/organisations/{}/cases/{}/restrictions", org.id, case.id),
            &token,
            json!({ "action": "restrict-all" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["updated"], 1);

    let response = app
        .get(
            &format!("/organisations/{}/restrictions/matrix", org.id),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let members = body["matrix"]["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["user_id"], member.id.as_str());
}

#[tokio::test]
async fn test_unknown_organisation_is_not_found() {
    let app = test_app().await;
    let owner = app.user("someone@example.com", "Someone").await;
    let token = app.token("someone@example.com").await;

    let response = app
        .post(
            "/organisations/org_missing/restrictions/toggle",
            &token,
            json!({ "user_id": owner.id, "case_id": "case_missing" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_organisation_routes_require_a_session() {
    let app = test_app().await;
    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/organisations/org_any/restrictions/toggle")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "user_id": "usr_a", "case_id": "case_b" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_requests_are_accepted_for_the_administrator() {
    let app = test_app().await;
    let owner = app.user("requester@example.com", "Requester").await;
    let member = app.user("departing@example.com", "Departing").await;
    let org = app.organisation(&owner, &member).await;
    let token = app.token("requester@example.com").await;

    let response = app
        .post(
            &format!("/organisations/{}/requests/member-removal", org.id),
            &token,
            json!({ "target_user_id": member.id, "reason": "Contract ended" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["request"]["target_email"], "departing@example.com");
    assert_eq!(body["request"]["reason"], "Contract ended");

    let response = app
        .post(
            &format!("/organisations/{}/requests/owner-delegation", org.id),
            &token,
            json!({ "target_user_id": member.id }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // the membership itself is untouched
    let still_member = app
        .acclaim
        .repositories()
        .organisation()
        .find_member(&org.id, &member.id)
        .await
        .unwrap();
    assert!(still_member.is_some());
}

#[tokio::test]
async fn test_request_validation_errors() {
    let app = test_app().await;
    let owner = app.user("strict@example.com", "Strict").await;
    let member = app.user("other@example.com", "Other").await;
    let org = app.organisation(&owner, &member).await;
    let token = app.token("strict@example.com").await;

    let response = app
        .post(
            &format!("/organisations/{}/requests/member-removal", org.id),
            &token,
            json!({ "target_user_id": member.id, "reason": "x".repeat(2001) }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post(
            &format!("/organisations/{}/requests/ownership-removal", org.id),
            &token,
            json!({ "target_user_id": member.id }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_rate_limit_endpoints() {
    let app = test_app().await;
    app.admin("root@example.com").await;
    app.user("plain@example.com", "Plain").await;

    for _ in 0..5 {
        app.login("plain@example.com", "wrong", "203.0.113.77").await;
    }

    let admin_token = app.token("root@example.com").await;
    let user_token = app.token("plain@example.com").await;

    assert_eq!(
        app.get("/admin/rate-limits", None).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/admin/rate-limits", Some(&user_token))
            .await
            .status(),
        StatusCode::FORBIDDEN
    );

    let response = app.get("/admin/rate-limits", Some(&admin_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["stats"]["currently_locked"], 1);
    assert_eq!(body["stats"]["max_attempts"], 5);

    let locked = json_body(
        app.get("/admin/rate-limits/locked", Some(&admin_token))
            .await,
    )
    .await;
    assert_eq!(locked["records"][0]["identifier"], "203.0.113.77");

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/admin/rate-limits/203.0.113.77")
                .header(AUTHORIZATION, format!("Bearer {admin_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["unlocked"], true);

    let response = app.login("plain@example.com", PASSWORD, "203.0.113.77").await;
    assert_eq!(response.status(), StatusCode::OK);
}
