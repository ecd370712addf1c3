use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use quill_db::format_timestamp;
use quill_types::api::CreateCommentRequest;
use quill_types::models::Comment;

use crate::auth::{AppState, run_db};
use crate::convert::comment_from_row;
use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, required};
use crate::middleware::CurrentUser;
use crate::posts::find_post;

const COMMENT_NOT_FOUND: &str = "Comment not found.";

/// Comments on a post, oldest first. The post must exist.
pub async fn comments_for_post(state: &AppState, post_id: i64) -> Result<Vec<Comment>> {
    find_post(state, post_id).await?;
    let rows = run_db(state, move |db| db.list_comments_for_post(post_id)).await?;
    Ok(rows.into_iter().map(comment_from_row).collect())
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> Result<impl IntoResponse> {
    let post = find_post(&state, post_id).await?;
    let content = required(req.content, "Comment content is required.")?;

    let user_id = user.id;
    let commented = format_timestamp(Utc::now());
    let row = run_db(&state, move |db| {
        db.insert_comment(&content, &commented, user_id, post.id)
    })
    .await?;

    info!("User {} commented on post {} ({})", user_id, post_id, row.id);
    Ok((StatusCode::CREATED, Json(comment_from_row(row))))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Comment>>> {
    Ok(Json(comments_for_post(&state, post_id).await?))
}

/// Allowed for the comment's author and for the author of the post it is on.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> Result<StatusCode> {
    let comment = run_db(&state, move |db| db.get_comment(comment_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(COMMENT_NOT_FOUND.to_string()))?;

    let post_id = comment.post_id;
    let post_owner = run_db(&state, move |db| db.get_post(post_id))
        .await?
        .map(|p| p.user_id);

    if comment.user_id != user.id && post_owner != Some(user.id) {
        return Err(ApiError::Forbidden(
            "You do not have permission to delete this comment.".to_string(),
        ));
    }

    if !run_db(&state, move |db| db.delete_comment(comment_id)).await? {
        return Err(ApiError::NotFound(COMMENT_NOT_FOUND.to_string()));
    }

    info!("User {} deleted comment {} on post {}", user.id, comment_id, post_id);
    Ok(StatusCode::NO_CONTENT)
}
