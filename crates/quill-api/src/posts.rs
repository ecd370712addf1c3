use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use quill_db::{format_timestamp, models::PostRow};
use quill_types::api::{CreatePostRequest, UpdatePostRequest};
use quill_types::models::Post;

use crate::auth::{AppState, run_db};
use crate::convert::post_from_row;
use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, non_blank, required};
use crate::middleware::CurrentUser;

pub const POST_NOT_FOUND: &str = "Post not found.";
pub const EDIT_FORBIDDEN: &str = "You do not have permission to edit this post.";
pub const DELETE_FORBIDDEN: &str = "You do not have permission to delete this post.";

pub async fn find_post(state: &AppState, post_id: i64) -> Result<PostRow> {
    run_db(state, move |db| db.get_post(post_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(POST_NOT_FOUND.to_string()))
}

/// Loads a post and checks that `user` owns it. Absence wins over ownership.
pub async fn find_owned_post(
    state: &AppState,
    user: &CurrentUser,
    post_id: i64,
    forbidden: &str,
) -> Result<PostRow> {
    let post = find_post(state, post_id).await?;
    if post.user_id != user.id {
        return Err(ApiError::Forbidden(forbidden.to_string()));
    }
    Ok(post)
}

pub async fn create_post_as(
    state: &AppState,
    user: &CurrentUser,
    req: CreatePostRequest,
) -> Result<Post> {
    let missing = "Post title and content are required.";
    let title = required(req.title, missing)?;
    let content = required(req.content, missing)?;

    let user_id = user.id;
    let published = format_timestamp(Utc::now());
    let row = run_db(state, move |db| db.insert_post(&title, &content, &published, user_id)).await?;

    info!("User {} created post {}", user_id, row.id);
    Ok(post_from_row(row))
}

pub async fn update_post_as(
    state: &AppState,
    user: &CurrentUser,
    post_id: i64,
    req: UpdatePostRequest,
) -> Result<Post> {
    find_owned_post(state, user, post_id, EDIT_FORBIDDEN).await?;

    let title = non_blank(req.title, "Post title cannot be empty.")?;
    let content = non_blank(req.content, "Post content cannot be empty.")?;

    let row = run_db(state, move |db| {
        db.update_post(post_id, title.as_deref(), content.as_deref())
    })
    .await?
    // Deleted between the ownership check and the update.
    .ok_or_else(|| ApiError::NotFound(POST_NOT_FOUND.to_string()))?;

    info!("User {} updated post {}", user.id, post_id);
    Ok(post_from_row(row))
}

pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>> {
    let rows = run_db(&state, |db| db.list_posts()).await?;
    Ok(Json(rows.into_iter().map(post_from_row).collect()))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>> {
    let row = find_post(&state, post_id).await?;
    Ok(Json(post_from_row(row)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<impl IntoResponse> {
    let post = create_post_as(&state, &user, req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> Result<Json<Post>> {
    let post = update_post_as(&state, &user, post_id, req).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<StatusCode> {
    find_owned_post(&state, &user, post_id, DELETE_FORBIDDEN).await?;

    if !run_db(&state, move |db| db.delete_post(post_id)).await? {
        return Err(ApiError::NotFound(POST_NOT_FOUND.to_string()));
    }

    info!("User {} deleted post {}", user.id, post_id);
    Ok(StatusCode::NO_CONTENT)
}
