use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use shepherd_api::app::{build_app_with, services::AppServices};
use shepherd_api::config::Config;
use shepherd_approvals::{EntityStatus, Requisition};
use shepherd_auth::{HasherParams, OrgScope, Role};
use shepherd_core::{AgencyId, UserId};
use shepherd_infra::{EntityStore, ProvisionInput};

const STRONG: &str = "Shepherd#2024";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        let mut config = Config::for_secret(jwt_secret);
        config.hasher_params = HasherParams::fast();

        // Same router as prod, over services the test can seed.
        let services = Arc::new(AppServices::in_memory(&config));
        let app = build_app_with(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn provision(&self, email: &str, role: Role, scope: OrgScope) -> UserId {
        self.services
            .auth
            .provision_user(
                ProvisionInput {
                    email: email.to_string(),
                    password: STRONG.to_string(),
                    full_name: email.to_string(),
                    role,
                    scope,
                },
                Utc::now(),
            )
            .expect("provision user")
            .id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn signup(client: &reqwest::Client, srv: &TestServer, email: &str) -> Value {
    let res = client
        .post(srv.url("/auth/signup"))
        .json(&json!({
            "email": email,
            "password": STRONG,
            "fullName": "Grace Member",
            "role": "MEMBER",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn login(client: &reqwest::Client, srv: &TestServer, email: &str, password: &str) -> reqwest::Response {
    client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn access_token(client: &reqwest::Client, srv: &TestServer, email: &str) -> String {
    let res = login(client, srv, email, STRONG).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["tokens"]["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn("test-secret").await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    for path in ["/auth/me", "/approvals/pending"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_token");
    }
}

#[tokio::test]
async fn signup_login_refresh_flow() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let created = signup(&client, &srv, "grace@example.org").await;
    assert_eq!(created["user"]["email"], "grace@example.org");
    assert_eq!(created["user"]["role"], "MEMBER");
    assert!(created["user"].get("passwordHash").is_none());

    let res = login(&client, &srv, "Grace@Example.org", STRONG).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let access = body["tokens"]["accessToken"].as_str().unwrap().to_string();
    let refresh = body["tokens"]["refreshToken"].as_str().unwrap().to_string();
    assert!(body["tokens"]["expiresIn"].as_i64().unwrap() > 0);

    let me: Value = client
        .get(srv.url("/auth/me"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["user"]["email"], "grace@example.org");

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rotated: Value = res.json().await.unwrap();
    let new_refresh = rotated["tokens"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, refresh);

    // The consumed token is single use; presenting it again revokes the family.
    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": new_refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_and_weak_signups_are_rejected() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    signup(&client, &srv, "dup@example.org").await;

    let res = client
        .post(srv.url("/auth/signup"))
        .json(&json!({ "email": "DUP@example.org", "password": STRONG, "fullName": "Dup" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(srv.url("/auth/signup"))
        .json(&json!({ "email": "weak@example.org", "password": "password", "fullName": "Weak" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "weak_password");
    assert_eq!(body["checks"]["uppercase"], false);

    let res = client
        .post(srv.url("/auth/signup"))
        .json(&json!({ "email": "lead@example.org", "password": STRONG, "fullName": "Lead", "role": "GCC" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sixth_failed_login_is_rate_limited() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    signup(&client, &srv, "target@example.org").await;

    for attempt in 1..=5 {
        let res = login(&client, &srv, "target@example.org", "Wrong#Pass1").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
    }

    let res = login(&client, &srv, "target@example.org", "Wrong#Pass1").await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=900).contains(&retry_after));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");

    // The correct password does not get past an active limit.
    let res = login(&client, &srv, "target@example.org", STRONG).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn wrong_kind_and_tampered_tokens_are_rejected() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let created = signup(&client, &srv, "tokens@example.org").await;

    let refresh = created["tokens"]["refreshToken"].as_str().unwrap();
    let res = client
        .get(srv.url("/auth/me"))
        .bearer_auth(refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let now = Utc::now();
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": created["user"]["id"],
            "role": "ADMIN",
            "iss": "shepherd",
            "iat": now.timestamp(),
            "exp": (now + ChronoDuration::minutes(10)).timestamp(),
            "kind": "access",
        }),
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .expect("failed to encode jwt");
    let res = client
        .get(srv.url("/auth/me"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_revokes_sessions() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let created = signup(&client, &srv, "change@example.org").await;
    let user_id = created["user"]["id"].as_str().unwrap().to_string();
    let access = created["tokens"]["accessToken"].as_str().unwrap().to_string();
    let old_refresh = created["tokens"]["refreshToken"].as_str().unwrap().to_string();

    // Token timestamps have one-second resolution.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let res = client
        .post(srv.url("/auth/change-password"))
        .bearer_auth(&access)
        .json(&json!({
            "userId": user_id,
            "currentPassword": STRONG,
            "newPassword": "Pastoral$Care99",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let changed: Value = res.json().await.unwrap();
    let old_access = access;
    let access = changed["tokens"]["accessToken"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url("/auth/me"))
        .bearer_auth(&old_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": old_refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        login(&client, &srv, "change@example.org", STRONG).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&client, &srv, "change@example.org", "Pastoral$Care99").await.status(),
        StatusCode::OK
    );

    // Another user's id is refused even with a valid token.
    let res = client
        .post(srv.url("/auth/change-password"))
        .bearer_auth(&access)
        .json(&json!({
            "userId": UserId::new(),
            "currentPassword": "Pastoral$Care99",
            "newPassword": "Another#Pass42",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn agency_leader_approves_in_scope_requisition() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let a1 = AgencyId::new("A1").unwrap();
    let a2 = AgencyId::new("A2").unwrap();
    srv.provision("leader1@example.org", Role::AgencyLeader, OrgScope::agency(a1));
    srv.provision("leader2@example.org", Role::AgencyLeader, OrgScope::agency(a2));

    let created = signup(&client, &srv, "requester@example.org").await;
    let requester = created["tokens"]["accessToken"].as_str().unwrap().to_string();
    let requester_id: UserId = created["user"]["id"].as_str().unwrap().parse().unwrap();

    let requisition = Requisition::new("Hymnals", 12_000, requester_id, Utc::now());
    let entity_id = requisition.id;
    srv.services.entities.put_requisition(requisition).unwrap();

    let res = client
        .post(srv.url("/approvals"))
        .bearer_auth(&requester)
        .json(&json!({
            "type": "REQUISITION",
            "entityId": entity_id,
            "amount": 12_000,
            "agencyId": "A1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let approval_id = body["approval"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["approval"]["status"], "PENDING");

    let leader1 = access_token(&client, &srv, "leader1@example.org").await;
    let leader2 = access_token(&client, &srv, "leader2@example.org").await;

    let pending: Value = client
        .get(srv.url("/approvals/pending"))
        .bearer_auth(&leader2)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(pending["approvals"].as_array().unwrap().is_empty());

    let res = client
        .post(srv.url(&format!("/approvals/{approval_id}/approve")))
        .bearer_auth(&leader2)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let pending: Value = client
        .get(srv.url("/approvals/pending"))
        .bearer_auth(&leader1)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending["approvals"].as_array().unwrap().len(), 1);

    let res = client
        .post(srv.url(&format!("/approvals/{approval_id}/approve")))
        .bearer_auth(&leader1)
        .header("content-type", "application/json")
        .body(r#"{"comments": "#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let res = client
        .post(srv.url(&format!("/approvals/{approval_id}/approve")))
        .bearer_auth(&leader1)
        .json(&json!({ "comments": "within budget" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["approval"]["status"], "APPROVED");
    assert_eq!(body["approval"]["comments"], "within budget");

    let stored = srv.services.entities.get_requisition(entity_id).unwrap().unwrap();
    assert_eq!(stored.status, EntityStatus::Approved);

    let res = client
        .post(srv.url(&format!("/approvals/{approval_id}/approve")))
        .bearer_auth(&leader1)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    let res = client
        .get(srv.url(&format!("/approvals/{approval_id}")))
        .bearer_auth(&requester)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/approvals/{}", UserId::new())))
        .bearer_auth(&leader1)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_admin_provisions_users() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    srv.provision("admin@example.org", Role::Admin, OrgScope::national());
    let member = signup(&client, &srv, "member@example.org").await;
    let member_token = member["tokens"]["accessToken"].as_str().unwrap().to_string();

    let body = json!({
        "email": "dcc@example.org",
        "password": STRONG,
        "fullName": "District Committee",
        "role": "DCC",
        "districtId": "D7",
    });

    let res = client
        .post(srv.url("/admin/users"))
        .bearer_auth(&member_token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let admin = access_token(&client, &srv, "admin@example.org").await;
    let res = client
        .post(srv.url("/admin/users"))
        .bearer_auth(&admin)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["user"]["role"], "DCC");
}

#[tokio::test]
async fn admin_suspends_and_reactivates_accounts() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let admin_id = srv.provision("admin@example.org", Role::Admin, OrgScope::national());
    let member = signup(&client, &srv, "member@example.org").await;
    let member_access = member["tokens"]["accessToken"].as_str().unwrap().to_string();
    let member_refresh = member["tokens"]["refreshToken"].as_str().unwrap().to_string();
    let member_id = member["user"]["id"].as_str().unwrap().to_string();
    let admin = access_token(&client, &srv, "admin@example.org").await;

    let res = client
        .post(srv.url(&format!("/admin/users/{admin_id}/suspend")))
        .bearer_auth(&member_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url(&format!("/admin/users/{admin_id}/suspend")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url(&format!("/admin/users/{}/suspend", UserId::new())))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url(&format!("/admin/users/{member_id}/suspend")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["id"], member_id.as_str());

    let res = client
        .get(srv.url("/auth/me"))
        .bearer_auth(&member_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": member_refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = login(&client, &srv, "member@example.org", STRONG).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url(&format!("/admin/users/{member_id}/activate")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["id"], member_id.as_str());
    let res = login(&client, &srv, "member@example.org", STRONG).await;
    assert_eq!(res.status(), StatusCode::OK);
}
