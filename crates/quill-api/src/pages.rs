//! Browser-facing routes: the same operations as the JSON API, answered with
//! redirects and flash messages instead of status codes.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;

use quill_types::api::{
    CreatePostRequest, LoginRequest, MessageResponse, NextQuery, RegisterRequest, UpdatePostRequest,
};
use quill_types::models::PostWithComments;

use crate::auth::{AppState, end_session, register_user, start_session, verify_credentials};
use crate::comments::comments_for_post;
use crate::convert::post_from_row;
use crate::error::{ApiError, Result};
use crate::extract::{ApiForm, required};
use crate::flash;
use crate::middleware::{CurrentUser, SESSION_COOKIE, current_user};
use crate::posts::{EDIT_FORBIDDEN, create_post_as, find_owned_post, find_post, update_post_as};

const LOGIN_FAILED: &str = "Login failed. Check username and password.";

fn redirect(jar: CookieJar, to: &str) -> Response {
    (jar, Redirect::to(to)).into_response()
}

fn hint(jar: CookieJar, status: StatusCode, message: String) -> Response {
    let (jar, flash) = flash::take(jar);
    (jar, (status, Json(MessageResponse { message, flash }))).into_response()
}

/// `next` if it names a path on this site. Browsers read `/\` like `//`,
/// so a backslash after the leading slash is refused as well.
fn local_path(next: Option<&str>) -> Option<&str> {
    let path = next?;
    let mut chars = path.chars();
    if chars.next() != Some('/') || matches!(chars.next(), Some('/' | '\\')) {
        return None;
    }
    if path.chars().any(char::is_control) {
        return None;
    }
    Some(path)
}

/// Only local paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    local_path(next).unwrap_or("/")
}

pub async fn index(jar: CookieJar) -> impl IntoResponse {
    let (jar, flash) = flash::take(jar);
    let body = json!({
        "message": "Welcome to the Quill blog API!",
        "endpoints": {
            "posts": "/api/posts",
            "users": "/api/users/<user_id>",
            "comments": "/api/posts/<post_id>/comments",
            "auth": "/register, /login, /logout (forms) or /api/register, /api/login, /api/logout (JSON)"
        },
        "flash": flash,
    });
    (jar, Json(body))
}

pub async fn view_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostWithComments>> {
    let post = post_from_row(find_post(&state, post_id).await?);
    let comments = comments_for_post(&state, post_id).await?;
    Ok(Json(PostWithComments { post, comments }))
}

// -- Auth forms --

pub async fn register_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response> {
    if current_user(&state, &headers).await?.is_some() {
        return Ok(redirect(jar, "/"));
    }
    Ok(hint(jar, StatusCode::OK, "Submit username, email and password to register.".to_string()))
}

pub async fn register_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ApiForm(req): ApiForm<RegisterRequest>,
) -> Result<Response> {
    if current_user(&state, &headers).await?.is_some() {
        return Ok(redirect(jar, "/"));
    }

    match register_user(&state, req).await {
        Ok(_) => {
            let jar = flash::set(jar, flash::SUCCESS, "Your account has been created! You can now log in.");
            Ok(redirect(jar, "/login"))
        }
        Err(ApiError::Conflict(msg) | ApiError::Validation(msg)) => {
            let jar = flash::set(jar, flash::DANGER, &msg);
            Ok(redirect(jar, "/register"))
        }
        Err(e) => Err(e),
    }
}

pub async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response> {
    if current_user(&state, &headers).await?.is_some() {
        return Ok(redirect(jar, "/"));
    }
    Ok(hint(jar, StatusCode::OK, "Submit username and password to log in.".to_string()))
}

pub async fn login_submit(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    headers: HeaderMap,
    jar: CookieJar,
    ApiForm(req): ApiForm<LoginRequest>,
) -> Result<Response> {
    if current_user(&state, &headers).await?.is_some() {
        return Ok(redirect(jar, "/"));
    }

    let retry = match local_path(query.next.as_deref()) {
        Some(next) => format!("/login?next={}", urlencoding::encode(next)),
        None => "/login".to_string(),
    };

    let (Some(username), Some(password)) = (
        req.username.filter(|u| !u.trim().is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Ok(redirect(flash::set(jar, flash::DANGER, LOGIN_FAILED), &retry));
    };

    let user = match verify_credentials(&state, &username, password).await {
        Ok(user) => user,
        Err(ApiError::InvalidCredentials) => {
            return Ok(redirect(flash::set(jar, flash::DANGER, LOGIN_FAILED), &retry));
        }
        Err(e) => return Err(e),
    };

    let token = start_session(&state, user.id, &user.username).await?;
    let remember = req.remember.is_some_and(|v| !v.is_empty());

    let mut cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if remember {
        cookie = cookie.max_age(time::Duration::seconds(state.session_ttl.num_seconds()));
    }

    let jar = flash::set(jar.add(cookie), flash::SUCCESS, "Login successful!");
    Ok(redirect(jar, safe_next(query.next.as_deref())))
}

pub async fn logout_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<Response> {
    end_session(&state, &user).await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    let jar = flash::set(jar, flash::INFO, "You have been logged out.");
    Ok(redirect(jar, "/"))
}

// -- Post forms --

pub async fn create_post_page(jar: CookieJar) -> Response {
    hint(
        jar,
        StatusCode::METHOD_NOT_ALLOWED,
        "Form route for creating a post (login required). Use POST /api/posts to create one via JSON."
            .to_string(),
    )
}

pub async fn create_post_submit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    ApiForm(req): ApiForm<CreatePostRequest>,
) -> Result<Response> {
    create_post_as(&state, &user, req).await?;
    let jar = flash::set(jar, flash::SUCCESS, "Post created successfully!");
    Ok(redirect(jar, "/"))
}

pub async fn edit_post_page(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<Response> {
    match find_owned_post(&state, &user, post_id, EDIT_FORBIDDEN).await {
        Ok(_) => Ok(hint(
            jar,
            StatusCode::METHOD_NOT_ALLOWED,
            format!(
                "Form route for editing post {post_id} (login and authorship required). \
                 Use PUT /api/posts/{post_id} to edit via JSON."
            ),
        )),
        Err(ApiError::Forbidden(msg)) => {
            let jar = flash::set(jar, flash::DANGER, &msg);
            Ok(redirect(jar, &format!("/post/{post_id}")))
        }
        Err(e) => Err(e),
    }
}

pub async fn edit_post_submit(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    ApiForm(req): ApiForm<CreatePostRequest>,
) -> Result<Response> {
    let back = format!("/post/{post_id}");

    // Ownership is reported before form problems.
    if let Err(e) = find_owned_post(&state, &user, post_id, EDIT_FORBIDDEN).await {
        return match e {
            ApiError::Forbidden(msg) => Ok(redirect(flash::set(jar, flash::DANGER, &msg), &back)),
            other => Err(other),
        };
    }

    let missing = "Post title and content are required.";
    let update = UpdatePostRequest {
        title: Some(required(req.title, missing)?),
        content: Some(required(req.content, missing)?),
    };
    update_post_as(&state, &user, post_id, update).await?;

    let jar = flash::set(jar, flash::SUCCESS, "Post updated successfully!");
    Ok(redirect(jar, &back))
}
