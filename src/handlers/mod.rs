// HTTP surface: router wiring plus the JSON view payloads handed to the
// rendering layer. Static segments (/new/, /follow/, /group/) take priority
// over the {username} capture in the route matcher.

pub mod follow;
pub mod posts;

use axum::{
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::DateTime;
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    feed::Page,
    models::{CommentRecord, PostRecord},
    principal::resolve_principal,
};

/// Login flow lives in the external auth collaborator; protected routes
/// send unauthenticated callers here.
pub const LOGIN_URL: &str = "/auth/login/";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(posts::index))
        .route("/new/", get(posts::new_post).post(posts::create_post))
        .route("/follow/", get(follow::follow_index))
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/{username}/", get(posts::profile))
        .route("/{username}/follow/", get(follow::profile_follow))
        .route("/{username}/unfollow/", get(follow::profile_unfollow))
        .route("/{username}/{post_id}/", get(posts::post_detail))
        .route("/{username}/{post_id}/edit/", post(posts::edit_post))
        .route("/{username}/{post_id}/comment/", post(posts::add_comment))
        .fallback(page_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_principal,
        ))
        .with_state(state)
}

async fn page_not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Page not found",
            "path": uri.path(),
            "status": 404
        })),
    )
        .into_response()
}

fn rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

pub(crate) fn post_json(post: &PostRecord) -> Value {
    json!({
        "id": post.id,
        "text": post.text,
        "image": post.image,
        "author": post.author_username,
        "group": post.group_slug,
        "pub_date": rfc3339(post.pub_date),
    })
}

pub(crate) fn comment_json(comment: &CommentRecord) -> Value {
    json!({
        "id": comment.id,
        "text": comment.text,
        "author": comment.author_username,
        "created": rfc3339(comment.created),
    })
}

pub(crate) fn page_json(page: &Page<PostRecord>) -> Value {
    json!({
        "number": page.number,
        "total_pages": page.total_pages,
        "total_items": page.total_items,
        "has_previous": page.has_previous,
        "has_next": page.has_next,
        "items": page.items.iter().map(post_json).collect::<Vec<_>>(),
    })
}
