pub mod auth;
pub mod comments;
pub mod convert;
pub mod error;
pub mod extract;
pub mod flash;
pub mod middleware;
pub mod pages;
pub mod posts;
pub mod users;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};

use crate::auth::AppState;
use crate::middleware::{require_auth, require_login};

/// Builds every route of the service. HTTP-level layers (CORS, tracing)
/// are left to the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(pages::index))
        .route("/index", get(pages::index))
        .route("/post/{post_id}", get(pages::view_post))
        .route("/register", get(pages::register_page).post(pages::register_submit))
        .route("/login", get(pages::login_page).post(pages::login_submit))
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/posts", get(posts::list_posts))
        .route("/api/posts/{post_id}", get(posts::get_post))
        .route("/api/posts/{post_id}/comments", get(comments::list_comments))
        .route("/api/users/{user_id}", get(users::get_user));

    let protected_api = Router::new()
        .route("/api/logout", post(auth::logout))
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/{post_id}", put(posts::update_post).delete(posts::delete_post))
        .route("/api/posts/{post_id}/comments", post(comments::create_comment))
        .route("/api/comments/{comment_id}", delete(comments::delete_comment))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let protected_pages = Router::new()
        .route("/logout", get(pages::logout_page))
        .route("/create_post", get(pages::create_post_page).post(pages::create_post_submit))
        .route("/post/{post_id}/edit", get(pages::edit_post_page).post(pages::edit_post_submit))
        .route_layer(from_fn_with_state(state.clone(), require_login));

    Router::new()
        .merge(public_routes)
        .merge(protected_api)
        .merge(protected_pages)
        .with_state(state)
}
