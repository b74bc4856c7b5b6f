//! End-to-end checks of `HttpApi` and `SessionStore` against an in-process
//! axum stub of the Bussy API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use bussy::config::{ClientConfig, Timeouts};
use bussy::directory::{ImageUpload, NewBusiness, NewReview, SearchQuery};
use bussy::net::{ApiError, HttpApi, IdentityApi};
use bussy::session::credential::{BearerToken, CookieSession, Credential, CredentialKind};
use bussy::session::token_store::{FileTokenStore, TokenStore};
use bussy::session::{SessionStatus, SessionStore};

const GOOD_TOKEN: &str = "good-token";
const GOOD_COOKIE: &str = "sid=good";

#[derive(Clone, Default)]
struct Stub {
    logouts: Arc<AtomicUsize>,
    identity_calls: Arc<AtomicUsize>,
}

type Reply = (StatusCode, Json<Value>);

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {GOOD_TOKEN}"));
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split("; ").any(|c| c == GOOD_COOKIE));
    bearer || cookie
}

fn unauthorized() -> Reply {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Not authenticated" })))
}

fn business_json(id: &str, name: &str, category: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "category": category,
        "formattedAddress": "1 Main St, Springfield",
        "averageRating": 4.5,
        "reviews": [],
    })
}

async fn auth_user(State(stub): State<Stub>, headers: HeaderMap) -> Reply {
    stub.identity_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({ "id": 42, "name": "Ana", "email": "ana@example.com", "role": "owner" })))
}

async fn auth_logout(State(stub): State<Stub>) -> &'static str {
    stub.logouts.fetch_add(1, Ordering::SeqCst);
    "logged out"
}

async fn list_businesses(Query(params): Query<Vec<(String, String)>>) -> Reply {
    let category = params.iter().find(|(k, _)| k == "category").map_or("any", |(_, v)| v.as_str());
    (
        StatusCode::OK,
        Json(json!([business_json("b1", "Joe's Diner", category), business_json("b2", "Corner Books", "Books")])),
    )
}

async fn get_business(Path(id): Path<String>) -> Reply {
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Business not found" })));
    }
    (StatusCode::OK, Json(business_json(&id, "Joe's Diner", "Restaurant")))
}

async fn business_reviews(Path(id): Path<String>) -> Reply {
    (
        StatusCode::OK,
        Json(json!([{ "id": "r1", "rating": 5, "comment": "Great", "businessId": id, "user": { "name": "Ana" } }])),
    )
}

async fn post_review(headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut review = body;
    review["id"] = json!("r-new");
    (StatusCode::CREATED, Json(review))
}

async fn create_business(headers: HeaderMap, body: Bytes) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    let multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    let text = String::from_utf8_lossy(&body);
    if !multipart || !text.contains("Taco Stand") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Name is required" })));
    }
    let mut created = business_json("b-new", "Taco Stand", "Restaurant");
    if text.contains("name=\"image\"") {
        created["imageUrl"] = json!("/uploads/b-new.png");
    }
    (StatusCode::CREATED, Json(created))
}

async fn my_reviews(headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!([{ "id": "r1", "rating": 4, "comment": "Solid", "business": { "name": "Joe's Diner" } }])),
    )
}

async fn slow_user() -> Reply {
    tokio::time::sleep(Duration::from_secs(5)).await;
    (StatusCode::OK, Json(json!({ "id": "1", "name": "Too Late" })))
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_stub() -> (String, Stub) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/api/auth/user", get(auth_user))
        .route("/api/auth/logout", get(auth_logout))
        .route("/api/businesses", get(list_businesses).post(create_business))
        .route("/api/businesses/{id}", get(get_business))
        .route("/api/reviews", post(post_review))
        .route("/api/reviews/business/{id}", get(business_reviews))
        .route("/api/reviews/user", get(my_reviews))
        .with_state(stub.clone());
    (spawn(app).await, stub)
}

fn config(base_url: &str, dir: &std::path::Path, credential: CredentialKind, cookie: Option<&str>) -> ClientConfig {
    ClientConfig {
        api_url: base_url.to_owned(),
        credential,
        token_path: dir.join("authToken"),
        session_cookie: cookie.map(str::to_owned),
        timeouts: Timeouts { connect_secs: 2, request_secs: Some(1) },
        my_reviews_path: "/api/reviews/user".to_owned(),
    }
}

fn bearer(token: &str) -> Credential {
    Credential::Bearer(token.to_owned())
}

// =========================================================================
// session over HTTP
// =========================================================================

#[tokio::test]
async fn token_session_round_trip() {
    let (base_url, stub) = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&base_url, dir.path(), CredentialKind::BearerToken, None);
    let store = SessionStore::new(HttpApi::new(&cfg).unwrap(), BearerToken::new(FileTokenStore::new(&cfg.token_path)));

    let session = store.initialize().await;
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(stub.identity_calls.load(Ordering::SeqCst), 0);

    let outcome = store
        .complete_redirect(&format!("/auth-callback?token={GOOD_TOKEN}"))
        .await
        .unwrap();
    assert_eq!(outcome.clean_url, "/auth-callback");
    let identity = outcome.session.identity().unwrap();
    assert_eq!(identity.id, "42");
    assert_eq!(identity.name, "Ana");
    assert_eq!(identity.extra.get("role"), Some(&json!("owner")));
    assert_eq!(std::fs::read_to_string(&cfg.token_path).unwrap().trim(), GOOD_TOKEN);

    let session = store.logout().await;
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.last_error().is_none());
    assert_eq!(stub.logouts.load(Ordering::SeqCst), 1);
    assert!(!cfg.token_path.exists());
}

#[tokio::test]
async fn rejected_token_is_discarded() {
    let (base_url, _stub) = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let tokens = FileTokenStore::in_dir(dir.path());
    tokens.save("expired").unwrap();
    let store = SessionStore::new(HttpApi::with_base_url(&base_url).unwrap(), BearerToken::new(tokens));

    let session = store.initialize().await;
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.last_error().is_none());
    assert_eq!(FileTokenStore::in_dir(dir.path()).load().unwrap(), None);
}

#[tokio::test]
async fn cookie_session_uses_seeded_jar() {
    let (base_url, stub) = spawn_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&base_url, dir.path(), CredentialKind::CookieSession, Some(GOOD_COOKIE));
    let store = SessionStore::new(HttpApi::new(&cfg).unwrap(), CookieSession);

    let session = store.initialize().await;
    assert!(session.is_authenticated());

    let session = store.logout().await;
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert_eq!(stub.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_server_records_error_and_keeps_token() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let tokens = FileTokenStore::in_dir(dir.path());
    tokens.save(GOOD_TOKEN).unwrap();
    let store = SessionStore::new(HttpApi::with_base_url(&base_url).unwrap(), BearerToken::new(tokens));

    let session = store.verify().await;
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.last_error().is_some());
    assert_eq!(FileTokenStore::in_dir(dir.path()).load().unwrap().as_deref(), Some(GOOD_TOKEN));
}

#[tokio::test]
async fn request_timeout_settles_unauthenticated() {
    let base_url = spawn(Router::new().route("/api/auth/user", get(slow_user))).await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&base_url, dir.path(), CredentialKind::BearerToken, None);
    let tokens = FileTokenStore::new(&cfg.token_path);
    tokens.save(GOOD_TOKEN).unwrap();
    let store = SessionStore::new(HttpApi::new(&cfg).unwrap(), BearerToken::new(tokens));

    let session = store.verify().await;
    assert_eq!(session.status(), SessionStatus::Unauthenticated);
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn login_url_points_at_provider_entry() {
    let api = HttpApi::with_base_url("http://localhost:3000/").unwrap();
    assert_eq!(api.login_url(), "http://localhost:3000/api/auth/google");
}

// =========================================================================
// directory endpoints
// =========================================================================

#[tokio::test]
async fn list_and_show_businesses() {
    let (base_url, _stub) = spawn_stub().await;
    let api = HttpApi::with_base_url(&base_url).unwrap();

    let listed = api.list_businesses(&SearchQuery::new("Restaurant", "")).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].category, "Restaurant");

    let business = api.get_business("b1").await.unwrap();
    assert_eq!(business.id, "b1");
    assert_eq!(business.formatted_address, "1 Main St, Springfield");

    let reviews = api.business_reviews("b1").await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].user.as_ref().unwrap().name, "Ana");
}

#[tokio::test]
async fn missing_business_surfaces_server_message() {
    let (base_url, _stub) = spawn_stub().await;
    let api = HttpApi::with_base_url(&base_url).unwrap();

    let err = api.get_business("missing").await.unwrap_err();
    assert_eq!(err, ApiError::Rejected { status: 404, message: "Business not found".to_owned() });
}

#[tokio::test]
async fn authenticated_writes_carry_the_token() {
    let (base_url, _stub) = spawn_stub().await;
    let api = HttpApi::with_base_url(&base_url).unwrap();

    let review = NewReview::new("b1", 5, "Best tacos in town").unwrap();
    let stored = api.post_review(&bearer(GOOD_TOKEN), &review).await.unwrap();
    assert_eq!(stored.rating, 5);
    assert_eq!(stored.business_id.as_deref(), Some("b1"));

    let err = api.post_review(&bearer("nope"), &review).await.unwrap_err();
    assert!(err.is_unauthorized());

    let mine = api.my_reviews(&bearer(GOOD_TOKEN)).await.unwrap();
    assert_eq!(mine[0].business.as_ref().unwrap().name, "Joe's Diner");
}

#[tokio::test]
async fn create_business_sends_multipart_with_image() {
    let (base_url, _stub) = spawn_stub().await;
    let api = HttpApi::with_base_url(&base_url).unwrap();

    let business = NewBusiness {
        name: "Taco Stand".to_owned(),
        category: "Restaurant".to_owned(),
        formatted_address: "2 Elm St".to_owned(),
        image: Some(ImageUpload::new("stand.png", "image/png", vec![0x89, b'P', b'N', b'G']).unwrap()),
        ..NewBusiness::default()
    };
    business.validate().unwrap();

    let created = api.create_business(&bearer(GOOD_TOKEN), &business).await.unwrap();
    assert_eq!(created.id, "b-new");
    assert_eq!(created.image_url.as_deref(), Some("/uploads/b-new.png"));
}

#[tokio::test]
async fn my_reviews_follows_configured_path() {
    let base_url = spawn(Router::new().route("/reviews/user", get(my_reviews))).await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = ClientConfig {
        my_reviews_path: "/reviews/user".to_owned(),
        ..config(&base_url, dir.path(), CredentialKind::BearerToken, None)
    };
    let api = HttpApi::new(&cfg).unwrap();
    assert_eq!(api.my_reviews_path(), "/reviews/user");

    let mine = api.my_reviews(&bearer(GOOD_TOKEN)).await.unwrap();
    assert_eq!(mine.len(), 1);

    let default_api = HttpApi::with_base_url(&base_url).unwrap();
    let err = default_api.my_reviews(&bearer(GOOD_TOKEN)).await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected { status: 404, .. }), "{err:?}");
}
