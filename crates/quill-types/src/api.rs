use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Session claims --

/// Claims carried by the session token handed out at login. The token is
/// only honored while the session row named by `sid` is still active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub sid: Uuid,
    pub exp: usize,
}

// -- Auth --

/// Fields are optional so that a missing field surfaces as a 400 from the
/// handler rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Only read by the form login; a remembered session gets a persistent cookie.
    pub remember: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user_id: i64,
    pub token: String,
}

// -- Posts --

#[derive(Debug, Default, Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

// -- Comments --

#[derive(Debug, Default, Deserialize)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
}

// -- Pages --

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
}
