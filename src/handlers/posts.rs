// Read handlers for the post feeds and detail view, plus the create/edit
// and comment mutation handlers. Behavior mirrors the error taxonomy:
// validation failures redisplay the form with field errors (200),
// missing lookup keys 404, and a non-author edit is an explicit 403.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde_json::json;

use super::{comment_json, page_json, post_json, LOGIN_URL};
use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    feed::PageQuery,
    forms::{CommentForm, FieldErrors, PostForm},
    models::PostRecord,
    principal::Principal,
};

/// GET / - global feed.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let page = state.feed.global(query.requested()).await?;
    Ok(Json(json!({ "page": page_json(&page) })).into_response())
}

/// GET /group/{slug}/ - posts of one group.
pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let group = state
        .store
        .get_group_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group '{}' not found", slug)))?;

    let page = state.feed.group(group.id, query.requested()).await?;
    Ok(Json(json!({
        "group": {
            "title": group.title,
            "slug": group.slug,
            "description": group.description,
        },
        "page": page_json(&page),
    }))
    .into_response())
}

/// GET /new/ - blank post form. Anonymous callers go back to the feed.
pub async fn new_post(Extension(principal): Extension<Principal>) -> Response {
    if !principal.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    blank_post_form().into_response()
}

/// POST /new/ - create a post attributed to the caller.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let Some(author_id) = principal.id() else {
        // Anonymous submissions are dropped, not errored.
        return Ok(Redirect::to("/").into_response());
    };

    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => return Ok(post_form_with_errors(&form, &errors).into_response()),
    };

    let group_id = match resolve_group(&state, fields.group_slug.as_deref()).await? {
        Ok(group_id) => group_id,
        Err(errors) => return Ok(post_form_with_errors(&form, &errors).into_response()),
    };

    let post = state
        .store
        .create_post(author_id, &fields.text, group_id, fields.image.as_deref())
        .await?;
    tracing::debug!(post_id = post.id, author_id, "post created");

    Ok(Redirect::to("/").into_response())
}

/// GET /{username}/ - profile feed with aggregate counts.
pub async fn profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let author = state
        .store
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;

    let page = state.feed.author(author.id, query.requested()).await?;
    let followers = state.store.follower_count(author.id).await?;
    let following_count = state.store.following_count(author.id).await?;

    let viewer_follows = match principal.id() {
        Some(viewer_id) => state.store.is_following(viewer_id, author.id).await?,
        None => false,
    };

    Ok(Json(json!({
        "author": author.username,
        "post_count": page.total_items,
        "followers": followers,
        "following_count": following_count,
        "viewer_follows": viewer_follows,
        "page": page_json(&page),
    }))
    .into_response())
}

/// GET /{username}/{post_id}/ - post detail with comments and comment form.
/// The id must belong to the named author, otherwise 404.
pub async fn post_detail(
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, i64)>,
) -> AppResult<Response> {
    let author = state
        .store
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;

    let post = state
        .store
        .get_post(post_id)
        .await?
        .filter(|post| post.author_id == author.id)
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

    let comments = state.store.list_comments(post.id).await?;
    let post_count = state
        .store
        .count_posts(&crate::store::PostFilter::Author(author.id))
        .await?;
    let followers = state.store.follower_count(author.id).await?;
    let following_count = state.store.following_count(author.id).await?;

    let group_slug = match post.group_id {
        Some(group_id) => state
            .store
            .get_group(group_id)
            .await?
            .map(|group| group.slug),
        None => None,
    };

    let record = PostRecord {
        id: post.id,
        text: post.text,
        image: post.image,
        author_id: author.id,
        author_username: author.username.clone(),
        group_id: post.group_id,
        group_slug,
        pub_date: post.pub_date,
    };

    Ok(Json(json!({
        "author": author.username,
        "post": post_json(&record),
        "comments": comments.iter().map(comment_json).collect::<Vec<_>>(),
        "post_count": post_count,
        "followers": followers,
        "following_count": following_count,
        "form": { "values": { "text": "" }, "errors": {} },
    }))
    .into_response())
}

/// POST /{username}/{post_id}/edit/ - author-only edit of text/group/image.
pub async fn edit_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((username, post_id)): Path<(String, i64)>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let post = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

    if principal.id() != Some(post.author_id) {
        return Err(AppError::Forbidden(
            "Only the author may edit this post".to_string(),
        ));
    }

    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => return Ok(post_form_with_errors(&form, &errors).into_response()),
    };

    let group_id = match resolve_group(&state, fields.group_slug.as_deref()).await? {
        Ok(group_id) => group_id,
        Err(errors) => return Ok(post_form_with_errors(&form, &errors).into_response()),
    };

    state
        .store
        .update_post(post.id, &fields.text, group_id, fields.image.as_deref())
        .await?;
    tracing::debug!(post_id = post.id, "post edited");

    Ok(Redirect::to(&format!("/{}/{}/", username, post_id)).into_response())
}

/// POST /{username}/{post_id}/comment/ - add a comment as the caller.
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((_username, post_id)): Path<(String, i64)>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let Some(author_id) = principal.id() else {
        return Ok(Redirect::to(LOGIN_URL).into_response());
    };

    let post = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => {
            return Ok(Json(json!({
                "post_id": post.id,
                "form": { "values": { "text": form.text }, "errors": errors },
            }))
            .into_response())
        }
    };

    state.store.create_comment(post.id, author_id, &text).await?;
    tracing::debug!(post_id = post.id, author_id, "comment added");

    let post_author = state
        .store
        .get_user(post.author_id)
        .await?
        .ok_or_else(|| AppError::Internal("post author row missing".to_string()))?;

    Ok(Redirect::to(&format!("/{}/{}/", post_author.username, post.id)).into_response())
}

fn blank_post_form() -> Json<serde_json::Value> {
    Json(json!({
        "form": {
            "values": { "text": "", "group": "", "image": "" },
            "errors": {},
        }
    }))
}

fn post_form_with_errors(form: &PostForm, errors: &FieldErrors) -> Json<serde_json::Value> {
    Json(json!({
        "form": {
            "values": {
                "text": form.text,
                "group": form.group,
                "image": form.image,
            },
            "errors": errors,
        }
    }))
}

/// Resolves an optional group slug to its id; an unknown slug becomes a
/// field error on the form rather than a 404.
async fn resolve_group(
    state: &AppState,
    slug: Option<&str>,
) -> AppResult<Result<Option<i64>, FieldErrors>> {
    let Some(slug) = slug else {
        return Ok(Ok(None));
    };

    match state.store.get_group_by_slug(slug).await? {
        Some(group) => Ok(Ok(Some(group.id))),
        None => {
            let mut errors = FieldErrors::new();
            errors.insert("group", "Select a valid group.".to_string());
            Ok(Err(errors))
        }
    }
}
