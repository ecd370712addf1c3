use axum::{
    Json,
    extract::{Path, State},
};

use quill_types::models::UserProfile;

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, Result};

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserProfile>> {
    let found = run_db(&state, move |db| {
        let Some(user) = db.get_user_by_id(user_id)? else {
            return Ok(None);
        };
        let (post_count, comment_count) = db.count_user_activity(user_id)?;
        Ok(Some(UserProfile {
            id: user.id,
            username: user.username,
            email: user.email,
            post_count,
            comment_count,
        }))
    })
    .await?;

    found
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))
}
