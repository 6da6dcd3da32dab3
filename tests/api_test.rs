use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use gains::auth::token::Claims;
use gains::config::Config;
use gains::db;
use gains::routes;
use gains::state::AppState;

const SECRET: &str = "integration-secret";

fn app_with(secret: Option<&str>) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = Some(dir.path().join("test.db"));
    config.storage.path = Some(dir.path().join("uploads"));
    config.auth.jwt_secret = secret.map(str::to_string);

    let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    let state = AppState::new(config, pool).unwrap();
    (dir, routes::app(state))
}

fn live_app() -> (TempDir, Router) {
    app_with(Some(SECRET))
}

fn token_for(subject: &str, username: &str) -> String {
    let mut claims = Claims::new(subject, Duration::hours(1));
    claims.user_metadata.username = Some(username.to_string());
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_invite_lifecycle() {
    let (_dir, app) = live_app();
    let alice = token_for("sub-alice", "alice");
    let bob = token_for("sub-bob", "bob");

    let (status, body) = send(&app, post_json("/api/invite/generate", Some(&alice), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    let validate_uri = format!("/api/invite/validate?code={}", code);
    let (status, body) = send(&app, get(&validate_uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "valid": true }));

    // Codes are matched case-insensitively
    let (status, body) = send(
        &app,
        post_json("/api/invite/use", Some(&bob), json!({ "code": code.to_lowercase() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = send(
        &app,
        post_json("/api/invite/use", Some(&bob), json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or already-used invite");

    let (_, body) = send(&app, get(&validate_uri, None)).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["error"], "This invite has already been used.");

    let (status, body) = send(&app, get("/api/invite/list", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invites"][0]["code"], Value::String(code));
    assert_eq!(body["invites"][0]["usedBy"]["username"], "bob");
    assert!(body["nextCursor"].is_null());
}

#[tokio::test]
async fn test_invite_use_requires_code() {
    let (_dir, app) = live_app();
    let alice = token_for("sub-alice", "alice");

    let (status, body) = send(&app, post_json("/api/invite/use", Some(&alice), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "code is required");

    let (status, _) = send(&app, get("/api/invite/validate", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_endpoints_reject_missing_or_bad_tokens() {
    let (_dir, app) = live_app();

    let (status, body) = send(&app, post_json("/api/invite/generate", None, json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let forged = {
        let claims = Claims::new("sub-mallory", Duration::hours(1));
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"wrong")).unwrap()
    };
    let (status, _) = send(&app, post_json("/api/auth/ensure-profile", Some(&forged), json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ensure_profile_provisions_once_and_accepts_cookie() {
    let (_dir, app) = live_app();
    let token = token_for("sub-dana", "dana");

    let (status, first) = send(&app, post_json("/api/auth/ensure-profile", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["user"]["username"], "dana");
    assert_eq!(first["user"]["externalId"], "sub-dana");

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/ensure-profile")
        .header(header::COOKIE, format!("theme=dark; gains_access_token={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, second) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["user"]["id"], first["user"]["id"]);
}

#[tokio::test]
async fn test_graphql_over_http_with_bearer_token() {
    let (_dir, app) = live_app();
    let token = token_for("sub-erin", "erin");

    let (status, body) = send(
        &app,
        post_json(
            "/api/graphql",
            Some(&token),
            json!({
                "query": r#"mutation { post { create(input: { type: story, caption: "week one",
                    metadata: { title: "Start", content: "Day one of the plan", tags: ["cut"] } }) {
                    id user { username } } } }"#
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["post"]["create"]["user"]["username"], "erin");

    let (_, body) = send(
        &app,
        post_json(
            "/api/graphql",
            None,
            json!({ "query": "{ post { feed { posts { caption isLiked } nextCursor } } }" }),
        ),
    )
    .await;
    assert_eq!(body["data"]["post"]["feed"]["posts"][0]["caption"], "week one");
    assert_eq!(body["data"]["post"]["feed"]["posts"][0]["isLiked"], false);

    let (_, body) = send(
        &app,
        post_json(
            "/api/graphql",
            None,
            json!({ "query": "{ user { me { id } } }" }),
        ),
    )
    .await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_demo_mode_answers_503_outside_the_feed() {
    let (_dir, app) = app_with(None);

    let (status, body) = send(&app, post_json("/api/invite/generate", None, json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Backend not configured. Running in demo mode.");

    let (status, _) = send(&app, get("/api/invite/validate?code=ABCDEFGH", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(
        &app,
        post_json(
            "/api/graphql",
            None,
            json!({ "query": "{ post { trending(limit: 1) { id } } }" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["post"]["trending"][0]["id"], "post-1");
}

fn multipart_upload(token: &str, bucket: &str, file_name: &str, mime: &str, data: &[u8]) -> Request<Body> {
    let boundary = "gains-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"bucket\"\r\n\r\n{bucket}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {mime}\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_stores_and_serves_files() {
    let (_dir, app) = live_app();
    let token = token_for("sub-finn", "finn");
    let png = b"\x89PNG\r\n\x1a\nnot-really-a-png";

    let (status, body) = send(&app, multipart_upload(&token, "avatars", "me.PNG", "image/png", png)).await;
    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:3000/uploads/avatars/"));
    assert!(url.ends_with(".png"));

    let path = url.trim_start_matches("http://localhost:3000");
    let response = app.clone().oneshot(get(path, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let served = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&served[..], &png[..]);

    let (status, _) = send(&app, multipart_upload(&token, "avatars", "clip.mp4", "video/mp4", b"....")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, multipart_upload(&token, "posts", "clip.mp4", "video/mp4", b"....")).await;
    assert_eq!(status, StatusCode::OK);
}
