use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use quill_db::format_timestamp;
use quill_types::api::Claims;

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, Result};
use crate::flash;

pub const SESSION_COOKIE: &str = "quill_session";

/// The authenticated caller, placed in request extensions by the auth layers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub session_id: Uuid,
}

/// Bearer token from the Authorization header, falling back to the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// Resolves the caller from a session token. Tokens that fail to decode,
/// or whose session row is gone or expired, yield `None`.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<CurrentUser>> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };

    let claims = match decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(_) => return Ok(None),
    };

    let sid = claims.sid.to_string();
    let Some(session) = run_db(state, move |db| db.get_session(&sid)).await? else {
        return Ok(None);
    };
    if session.user_id != claims.sub || session.expires_at <= format_timestamp(Utc::now()) {
        return Ok(None);
    }

    Ok(Some(CurrentUser {
        id: claims.sub,
        username: claims.username,
        session_id: claims.sid,
    }))
}

/// API guard: unauthenticated requests get a 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let user = current_user(&state, req.headers())
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Form guard: unauthenticated requests are sent to the login page.
pub async fn require_login(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    match current_user(&state, req.headers()).await? {
        Some(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        None => {
            let jar = flash::set(
                CookieJar::from_headers(req.headers()),
                flash::INFO,
                "Please log in to access this page.",
            );
            let target = format!("/login?next={}", req.uri().path());
            Ok((jar, Redirect::to(&target)).into_response())
        }
    }
}
