// Follow feed and follow/unfollow edge mutations. All three routes are
// login-required; anonymous callers are sent to the external login flow.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde_json::json;

use super::{page_json, LOGIN_URL};
use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    feed::PageQuery,
    principal::Principal,
};

/// GET /follow/ - aggregated feed of the authors the caller follows.
pub async fn follow_index(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let Some(viewer_id) = principal.id() else {
        return Ok(Redirect::to(LOGIN_URL).into_response());
    };

    let page = state.feed.following(viewer_id, query.requested()).await?;
    Ok(Json(json!({ "page": page_json(&page) })).into_response())
}

/// GET /{username}/follow/ - create a follow edge. Self-follow and
/// duplicate follows are no-ops.
pub async fn profile_follow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let Some(follower_id) = principal.id() else {
        return Ok(Redirect::to(LOGIN_URL).into_response());
    };

    let author = state
        .store
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;

    if follower_id != author.id && !state.store.is_following(follower_id, author.id).await? {
        state.store.create_follow(follower_id, author.id).await?;
        tracing::debug!(follower_id, author_id = author.id, "follow edge created");
    }

    Ok(Redirect::to(&format!("/{}/", username)).into_response())
}

/// GET /{username}/unfollow/ - delete any matching edges. Idempotent.
pub async fn profile_unfollow(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let Some(follower_id) = principal.id() else {
        return Ok(Redirect::to(LOGIN_URL).into_response());
    };

    let author = state
        .store
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;

    let removed = state.store.delete_follow(follower_id, author.id).await?;
    if removed > 0 {
        tracing::debug!(follower_id, author_id = author.id, "follow edge removed");
    }

    Ok(Redirect::to(&format!("/{}/", username)).into_response())
}
