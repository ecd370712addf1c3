//! Browser form flows: redirects, flash cookies and the session cookie.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use quill_api::auth::AppStateInner;
use quill_api::router;
use quill_db::Database;

const TTL_HOURS: i64 = 1;

fn app() -> Router {
    router(Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        session_ttl: chrono::Duration::hours(TTL_HOURS),
    }))
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    cookies: &[String],
    form: Option<&str>,
) -> Response<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if !cookies.is_empty() {
        req = req.header(header::COOKIE, cookies.join("; "));
    }
    let req = match form {
        Some(form) => req
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Full Set-Cookie line for a cookie, attributes included.
fn set_cookie_line(resp: &Response<Body>, name: &str) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// `name=value` of a cookie set by the response, if any.
fn set_cookie(resp: &Response<Body>, name: &str) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

async fn json_body(resp: Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register_and_login(app: &Router, name: &str) -> String {
    let form = format!("username={name}&email={name}%40example.com&password=pw");
    let resp = request(app, "POST", "/register", &[], Some(&form)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = request(app, "POST", "/login", &[], Some(&format!("username={name}&password=pw"))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    set_cookie(&resp, "quill_session").expect("session cookie")
}

#[tokio::test]
async fn index_lists_endpoints() {
    let app = app();
    let resp = request(&app, "GET", "/", &[], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["endpoints"]["posts"], "/api/posts");
    assert!(body["flash"].is_null());
}

#[tokio::test]
async fn registration_flashes_and_redirects() {
    let app = app();
    let form = "username=alice&email=a%40x.com&password=pw1";

    let resp = request(&app, "POST", "/register", &[], Some(form)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = request(&app, "POST", "/register", &[], Some(form)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/register");
    let flash = set_cookie(&resp, "quill_flash").expect("flash cookie");

    let resp = request(&app, "GET", "/register", &[flash], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["flash"]["category"], "danger");
}

#[tokio::test]
async fn login_required_redirects_to_login() {
    let app = app();
    let resp = request(&app, "GET", "/create_post", &[], None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=/create_post");

    let resp = request(&app, "GET", "/logout", &[], None).await;
    assert_eq!(location(&resp), "/login?next=/logout");
}

#[tokio::test]
async fn failed_login_keeps_next() {
    let app = app();
    register_and_login(&app, "alice").await;

    let resp = request(
        &app,
        "POST",
        "/login?next=/create_post",
        &[],
        Some("username=alice&password=wrong"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=%2Fcreate_post");
    assert!(set_cookie(&resp, "quill_session").is_none());

    let resp = request(
        &app,
        "POST",
        "/login?next=/create_post",
        &[],
        Some("username=alice&password=pw"),
    )
    .await;
    assert_eq!(location(&resp), "/create_post");
}

#[tokio::test]
async fn session_cookie_drives_form_routes() {
    let app = app();
    let session = register_and_login(&app, "alice").await;
    let cookies = [session.clone()];

    // Already logged in: the login page bounces home.
    let resp = request(&app, "GET", "/login", &cookies, None).await;
    assert_eq!(location(&resp), "/");

    let resp = request(&app, "GET", "/create_post", &cookies, None).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = request(&app, "POST", "/create_post", &cookies, Some("title=Hello&content=World")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let resp = request(&app, "GET", "/api/posts", &[], None).await;
    let posts = json_body(resp).await;
    let post_id = posts[0]["id"].as_i64().unwrap();
    assert_eq!(posts[0]["title"], "Hello");

    let edit = format!("/post/{post_id}/edit");
    let resp = request(&app, "POST", &edit, &cookies, Some("title=Hi&content=There")).await;
    assert_eq!(location(&resp), format!("/post/{post_id}"));

    let resp = request(&app, "GET", &format!("/post/{post_id}"), &[], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["post"]["title"], "Hi");
    assert_eq!(body["comments"], json!([]));

    let resp = request(&app, "GET", "/logout", &cookies, None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    // The old cookie no longer authenticates.
    let resp = request(&app, "GET", "/create_post", &cookies, None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=/create_post");
}

#[tokio::test]
async fn editing_someone_elses_post_is_refused() {
    let app = app();
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    request(&app, "POST", "/create_post", &[alice], Some("title=Mine&content=Body")).await;
    let posts = json_body(request(&app, "GET", "/api/posts", &[], None).await).await;
    let post_id = posts[0]["id"].as_i64().unwrap();
    let edit = format!("/post/{post_id}/edit");

    for method in ["GET", "POST"] {
        let resp = request(&app, method, &edit, &[bob.clone()], Some("title=Theirs&content=Body")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), format!("/post/{post_id}"));
        assert!(set_cookie(&resp, "quill_flash").is_some());
    }

    let resp = request(&app, "GET", "/post/999/edit", &[bob], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = json_body(request(&app, "GET", &format!("/api/posts/{post_id}"), &[], None).await).await;
    assert_eq!(body["title"], "Mine");
}

#[tokio::test]
async fn next_is_reencoded_or_dropped_on_failed_login() {
    let app = app();
    register_and_login(&app, "alice").await;
    let bad = Some("username=alice&password=wrong");

    let resp = request(&app, "POST", "/login?next=/a%26b%3D1", &[], bad).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=%2Fa%26b%3D1");

    let resp = request(&app, "POST", "/login?next=/%0Ax", &[], bad).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = request(&app, "POST", "/login?next=/%5Cevil.example", &[], bad).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn backslash_next_does_not_leave_the_site() {
    let app = app();
    register_and_login(&app, "alice").await;

    let resp = request(
        &app,
        "POST",
        "/login?next=/%5Cevil.example",
        &[],
        Some("username=alice&password=pw"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn remember_me_makes_the_session_cookie_persistent() {
    let app = app();
    register_and_login(&app, "alice").await;
    let max_age = format!("Max-Age={}", TTL_HOURS * 3600);

    let resp = request(&app, "POST", "/login", &[], Some("username=alice&password=pw&remember=on")).await;
    let line = set_cookie_line(&resp, "quill_session").expect("session cookie");
    assert!(line.contains(&max_age), "{line}");

    let resp = request(&app, "POST", "/login", &[], Some("username=alice&password=pw")).await;
    let line = set_cookie_line(&resp, "quill_session").expect("session cookie");
    assert!(!line.contains("Max-Age"), "{line}");
    assert!(!line.contains("Expires"), "{line}");
}
