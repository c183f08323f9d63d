use super::*;
use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{Filter, UserId, UserRole, UserStatus},
    protocol::{PendingAdvertiser, PendingInfluencer},
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    approvals::{Decision, PendingApplicants, PendingKind},
    controller::{ControllerOptions, FetchStatus, ListQueryController},
    feed::CursorFeed,
    query::ListQuery,
    users::UserDirectory,
};

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    cookie: Option<String>,
}

type Canned = (StatusCode, Option<Value>);

#[derive(Clone, Default)]
struct FakeApi {
    routes: Arc<HashMap<(Method, String), Canned>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl FakeApi {
    async fn seen(&self) -> Vec<Seen> {
        self.seen.lock().await.clone()
    }
}

async fn answer(State(api): State<FakeApi>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let query = uri
        .query()
        .map(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let cookie = headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    api.seen.lock().await.push(Seen {
        method: method.clone(),
        path: uri.path().to_string(),
        query,
        cookie,
    });

    match api.routes.get(&(method, uri.path().to_string())) {
        Some((status, Some(body))) => (*status, Json(body.clone())).into_response(),
        Some((status, None)) => (*status).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serves canned answers below `/api/v1` and returns the client base url.
async fn spawn_api(routes: Vec<(Method, &str, StatusCode, Option<Value>)>) -> (String, FakeApi) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let api = FakeApi {
        routes: Arc::new(
            routes
                .into_iter()
                .map(|(method, path, status, body)| {
                    ((method, format!("/api/v1{path}")), (status, body))
                })
                .collect(),
        ),
        seen: Arc::default(),
    };
    let app = Router::new().fallback(answer).with_state(api.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/api/v1"), api)
}

fn user_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "email": format!("{id}@example.com"),
        "displayName": name,
        "role": "INFLUENCER",
        "status": "ACTIVE",
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-02T00:00:00Z",
    })
}

fn users_page() -> Value {
    json!({
        "data": [user_json("u1", "Ari"), user_json("u2", "Bora")],
        "meta": {"page": 1, "limit": 12, "total": 2, "totalPages": 1, "hasNext": false}
    })
}

#[tokio::test]
async fn users_request_omits_unset_filters() {
    let (base, api) = spawn_api(vec![(Method::GET, "/users", StatusCode::OK, Some(users_page()))]).await;
    let client = ApiClient::new(base).expect("client");

    let page = client
        .fetch_users(&ListQuery::default().with_search("   ").params())
        .await
        .expect("users");

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.meta.total, 2);
    let seen = api.seen().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/api/v1/users");
    let expected: HashMap<String, String> =
        [("page", "1"), ("limit", "12")].map(|(k, v)| (k.to_string(), v.to_string())).into();
    assert_eq!(seen[0].query, expected);
}

#[tokio::test]
async fn users_request_carries_filters_and_unwraps_envelope() {
    let body = json!({"success": true, "data": users_page()});
    let (base, api) = spawn_api(vec![(Method::GET, "/users", StatusCode::OK, Some(body))]).await;
    let client = ApiClient::new(format!("{base}/")).expect("client");

    let params = ListQuery::new(5)
        .with_role(Filter::Only(UserRole::Admin))
        .with_status(Filter::Only(UserStatus::Suspended))
        .with_search("  kim ")
        .with_page(3)
        .params();
    let page = client.fetch_users(&params).await.expect("users");

    assert_eq!(page.items[0].display_name.as_deref(), Some("Ari"));
    let seen = api.seen().await;
    let query = &seen[0].query;
    assert_eq!(query.get("page").map(String::as_str), Some("3"));
    assert_eq!(query.get("limit").map(String::as_str), Some("5"));
    assert_eq!(query.get("role").map(String::as_str), Some("ADMIN"));
    assert_eq!(query.get("status").map(String::as_str), Some("SUSPENDED"));
    assert_eq!(query.get("search").map(String::as_str), Some("kim"));
}

#[tokio::test]
async fn failed_request_reports_server_message() {
    let (base, _api) = spawn_api(vec![(
        Method::GET,
        "/users",
        StatusCode::INTERNAL_SERVER_ERROR,
        Some(json!({"message": "directory unavailable"})),
    )])
    .await;
    let client = ApiClient::new(base).expect("client");

    let err = client
        .fetch_users(&ListQuery::default().params())
        .await
        .expect_err("server error");

    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(err.to_string(), "directory unavailable");
}

#[tokio::test]
async fn anonymous_directory_lists_empty_without_error() {
    let (base, _api) = spawn_api(vec![(Method::GET, "/users", StatusCode::UNAUTHORIZED, None)]).await;
    let client = ApiClient::new(base).expect("client");
    let controller = ListQueryController::new(
        Arc::new(UserDirectory::new(client)),
        ControllerOptions::default(),
    );

    controller.start().await;
    let view = controller.wait_settled().await;

    assert_eq!(view.status, FetchStatus::Success);
    assert!(view.items.is_empty());
    assert_eq!(view.meta.map(|meta| meta.total), Some(0));
    assert_eq!(view.error, None);
}

#[tokio::test]
async fn pending_list_sends_cursor_and_limit() {
    let body = json!({
        "items": [{
            "userId": "adv-1",
            "companyName": "Blue Harbor",
            "businessNumber": "220-81-12345",
            "submittedAt": "2024-05-01T00:00:00Z"
        }],
        "hasMore": true,
        "nextCursor": "c2"
    });
    let (base, api) = spawn_api(vec![(
        Method::GET,
        "/admin/advertisers/pending",
        StatusCode::OK,
        Some(body),
    )])
    .await;
    let client = ApiClient::new(base).expect("client");

    let page = client
        .list_pending::<PendingAdvertiser>(Some("c1"), 30)
        .await
        .expect("pending");

    assert!(page.has_more);
    assert_eq!(page.next_cursor.as_deref(), Some("c2"));
    assert_eq!(
        page.items[0].business_registration_number.as_deref(),
        Some("220-81-12345")
    );
    let seen = api.seen().await;
    let query = &seen[0].query;
    assert_eq!(query.get("cursor").map(String::as_str), Some("c1"));
    assert_eq!(query.get("limit").map(String::as_str), Some("30"));
}

#[tokio::test]
async fn first_pending_page_sends_no_cursor() {
    let (base, api) = spawn_api(vec![(
        Method::GET,
        "/admin/influencers/pending",
        StatusCode::OK,
        Some(json!({"items": [], "hasMore": false, "nextCursor": null})),
    )])
    .await;
    let client = ApiClient::new(base).expect("client");

    let page = client
        .list_pending::<PendingInfluencer>(None, 30)
        .await
        .expect("pending");

    assert!(page.items.is_empty());
    assert!(!api.seen().await[0].query.contains_key("cursor"));
}

#[tokio::test]
async fn decision_patches_encoded_user_path() {
    let (base, api) = spawn_api(vec![(
        Method::PATCH,
        "/admin/influencers/a%20b%2Fc/approve",
        StatusCode::NO_CONTENT,
        None,
    )])
    .await;
    let client = ApiClient::new(base).expect("client");

    client
        .decide_applicant(PendingKind::Influencers, &UserId::from("a b/c"), Decision::Approve)
        .await
        .expect("approve");

    let seen = api.seen().await;
    assert_eq!(seen[0].method, Method::PATCH);
    assert_eq!(seen[0].path, "/api/v1/admin/influencers/a%20b%2Fc/approve");
}

#[tokio::test]
async fn advertiser_decisions_use_verify_and_reject() {
    let (base, api) = spawn_api(vec![
        (Method::PATCH, "/admin/advertisers/adv-1/verify", StatusCode::NO_CONTENT, None),
        (Method::PATCH, "/admin/advertisers/adv-2/reject", StatusCode::NO_CONTENT, None),
    ])
    .await;
    let client = ApiClient::new(base).expect("client");

    client
        .decide_applicant(PendingKind::Advertisers, &UserId::from("adv-1"), Decision::Approve)
        .await
        .expect("verify");
    client
        .decide_applicant(PendingKind::Advertisers, &UserId::from("adv-2"), Decision::Reject)
        .await
        .expect("reject");

    let paths: Vec<String> = api.seen().await.into_iter().map(|seen| seen.path).collect();
    assert_eq!(
        paths,
        vec![
            "/api/v1/admin/advertisers/adv-1/verify",
            "/api/v1/admin/advertisers/adv-2/reject",
        ]
    );
}

#[tokio::test]
async fn advertiser_feed_verifies_then_reloads_first_page() {
    let first_page = json!({
        "items": [
            {"userId": "adv-1", "companyName": "Blue Harbor", "industry": "Food", "submittedAt": "2024-05-01T00:00:00Z"},
            {"userId": "adv-2", "companyName": "Red Peak", "industry": "Outdoor", "submittedAt": "2024-05-02T00:00:00Z"}
        ],
        "hasMore": false,
        "nextCursor": null
    });
    let (base, api) = spawn_api(vec![
        (Method::GET, "/admin/advertisers/pending", StatusCode::OK, Some(first_page)),
        (Method::PATCH, "/admin/advertisers/adv-2/verify", StatusCode::NO_CONTENT, None),
    ])
    .await;
    let client = ApiClient::new(base).expect("client");
    let mut feed = CursorFeed::new(Arc::new(PendingApplicants::<PendingAdvertiser>::new(client)));

    feed.reload().await;
    feed.set_search("outdoor");
    assert_eq!(feed.filtered().len(), 1);

    let target = UserId::from("adv-2");
    feed.approve(&target).await.expect("verify");

    let seen = api.seen().await;
    let methods_and_paths: Vec<(Method, &str)> = seen
        .iter()
        .map(|seen| (seen.method.clone(), seen.path.as_str()))
        .collect();
    assert_eq!(
        methods_and_paths,
        vec![
            (Method::GET, "/api/v1/admin/advertisers/pending"),
            (Method::PATCH, "/api/v1/admin/advertisers/adv-2/verify"),
            (Method::GET, "/api/v1/admin/advertisers/pending"),
        ]
    );
    assert!(!seen[2].query.contains_key("cursor"));
    assert_eq!(feed.error(), None);
}

#[tokio::test]
async fn pending_count_reads_count_field() {
    let (base, _api) = spawn_api(vec![(
        Method::GET,
        "/admin/advertisers/pending/count",
        StatusCode::OK,
        Some(json!({"count": 7})),
    )])
    .await;
    let client = ApiClient::new(base).expect("client");

    let count = client
        .pending_count(PendingKind::Advertisers)
        .await
        .expect("count");
    assert_eq!(count, 7);
}

#[tokio::test]
async fn current_user_unwraps_envelope() {
    let body = json!({
        "success": true,
        "data": {"user": {"id": "admin-1", "role": "ADMIN", "displayName": "Root"}}
    });
    let (base, _api) = spawn_api(vec![(Method::GET, "/auth/me", StatusCode::OK, Some(body))]).await;
    let client = ApiClient::new(base).expect("client");

    let current = client.fetch_current_user().await;

    assert!(!current.unauthorized);
    assert_eq!(current.role(), Some(UserRole::Admin));
}

#[tokio::test]
async fn current_user_distinguishes_missing_session_from_failure() {
    let (base, _api) = spawn_api(vec![(Method::GET, "/auth/me", StatusCode::UNAUTHORIZED, None)]).await;
    let anonymous = ApiClient::new(base).expect("client").fetch_current_user().await;
    assert!(anonymous.unauthorized);
    assert_eq!(anonymous.user, None);

    let (base, _api) = spawn_api(vec![(Method::GET, "/auth/me", StatusCode::BAD_GATEWAY, None)]).await;
    let failed = ApiClient::new(base).expect("client").fetch_current_user().await;
    assert!(!failed.unauthorized);
    assert_eq!(failed.user, None);
}

#[tokio::test]
async fn logout_posts_and_sends_session_cookie() {
    let (base, api) = spawn_api(vec![(Method::POST, "/auth/logout", StatusCode::NO_CONTENT, None)]).await;
    let client = ApiClient::builder(base)
        .session_cookie("session=abc123")
        .build()
        .expect("client");

    client.logout().await.expect("logout");

    let seen = api.seen().await;
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(seen[0].cookie.as_deref(), Some("session=abc123"));
}

/// `/auth/me` sets a cookie; `/auth/logout` records the cookie it receives.
async fn spawn_cookie_api() -> (String, Arc<Mutex<Vec<Option<String>>>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let app = Router::new()
        .route(
            "/api/v1/auth/me",
            axum::routing::get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    [(axum::http::header::SET_COOKIE, "issued=1; Path=/")],
                )
            }),
        )
        .route(
            "/api/v1/auth/logout",
            axum::routing::post(
                |State(seen): State<Arc<Mutex<Vec<Option<String>>>>>, headers: HeaderMap| async move {
                    let cookie = headers
                        .get("cookie")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    seen.lock().await.push(cookie);
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .with_state(Arc::clone(&seen));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/api/v1"), seen)
}

#[tokio::test]
async fn server_cookies_replay_unless_a_fixed_cookie_is_set() {
    let (base, seen) = spawn_cookie_api().await;
    let client = ApiClient::new(base).expect("client");
    client.fetch_current_user().await;
    client.logout().await.expect("logout");
    assert_eq!(seen.lock().await.clone(), vec![Some("issued=1".to_string())]);

    let (base, seen) = spawn_cookie_api().await;
    let client = ApiClient::builder(base)
        .session_cookie("session=abc123")
        .build()
        .expect("client");
    client.fetch_current_user().await;
    client.logout().await.expect("logout");
    assert_eq!(seen.lock().await.clone(), vec![Some("session=abc123".to_string())]);
}

#[test]
fn endpoint_keeps_base_path_prefix() {
    let client = ApiClient::new("http://localhost:8080/api/v1").expect("client");
    let url = client.endpoint(&["admin", "influencers", "pending"]).expect("url");
    assert_eq!(url.as_str(), "http://localhost:8080/api/v1/admin/influencers/pending");
}

#[test]
fn rejects_unusable_base_url() {
    let err = ApiClient::new("not a url").expect_err("invalid");
    assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));

    let err = ApiClient::builder("http://localhost")
        .session_cookie("bad\nvalue")
        .build()
        .expect_err("invalid cookie");
    assert!(matches!(err, ClientError::InvalidSessionCookie));
}
