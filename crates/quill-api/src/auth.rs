use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use quill_db::{Database, format_timestamp, models::UserRow};
use quill_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, required};
use crate::middleware::CurrentUser;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub session_ttl: Duration,
}

/// Runs blocking DB work off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let out = tokio::task::spawn_blocking(move || f(&state.db)).await??;
    Ok(out)
}

pub struct NewUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Validates and stores a new account. Shared by the JSON and form flows.
pub async fn register_user(state: &AppState, req: RegisterRequest) -> Result<NewUser> {
    let missing = "Required fields missing (username, email, password).";
    let username = required(req.username, missing)?;
    let email = required(req.email, missing)?;
    let password = required(req.password, missing)?;

    let taken = "Username or email already in use.";
    let (u, e) = (username.clone(), email.clone());
    if run_db(state, move |db| db.user_exists(&u, &e)).await? {
        return Err(ApiError::Conflict(taken.to_string()));
    }

    // Hash password with Argon2id
    let password_hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
    })
    .await??;

    let (u, e) = (username.clone(), email.clone());
    let created_at = format_timestamp(Utc::now());
    let id = run_db(state, move |db| db.create_user(&u, &e, &password_hash, &created_at))
        .await?
        // Lost a race with a concurrent registration.
        .ok_or_else(|| ApiError::Conflict(taken.to_string()))?;

    info!("Registered user {} ({})", username, id);
    Ok(NewUser { id, username, email })
}

/// Checks a username/password pair. Unknown users and wrong passwords
/// produce the same error.
pub async fn verify_credentials(state: &AppState, username: &str, password: String) -> Result<UserRow> {
    let name = username.to_string();
    let user = run_db(state, move |db| db.get_user_by_username(&name)).await?;
    let Some(user) = user else {
        warn!("Login failed for unknown user {}", username);
        return Err(ApiError::InvalidCredentials);
    };

    let stored = user.password.clone();
    let verified = tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&stored)
            .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await??;

    if !verified {
        warn!("Login failed for user {}: wrong password", username);
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user)
}

/// Records a session row and returns the signed token naming it.
pub async fn start_session(state: &AppState, user_id: i64, username: &str) -> Result<String> {
    let sid = Uuid::new_v4();
    let now = Utc::now();
    let expires = now + state.session_ttl;

    let id = sid.to_string();
    let (created_at, expires_at) = (format_timestamp(now), format_timestamp(expires));
    run_db(state, move |db| db.create_session(&id, user_id, &created_at, &expires_at)).await?;

    let token = create_token(&state.jwt_secret, user_id, username, sid, expires.timestamp() as usize)?;
    info!("Session {} started for user {}", sid, user_id);
    Ok(token)
}

pub async fn end_session(state: &AppState, user: &CurrentUser) -> Result<()> {
    let sid = user.session_id.to_string();
    run_db(state, move |db| db.delete_session(&sid)).await?;
    info!("Session {} ended for user {}", user.session_id, user.id);
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = register_user(&state, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully.".to_string(),
            user_id: user.id,
            username: user.username,
            email: user.email,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let missing = "Username and password are required.";
    let username = required(req.username, missing)?;
    let password = required(req.password, missing)?;

    let user = verify_credentials(&state, &username, password).await?;
    let token = start_session(&state, user.id, &user.username).await?;

    Ok(Json(LoginResponse {
        message: "Login successful.".to_string(),
        user_id: user.id,
        token,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<StatusCode> {
    end_session(&state, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn create_token(secret: &str, user_id: i64, username: &str, sid: Uuid, exp: usize) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        sid,
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
