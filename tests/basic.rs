// End-to-end tests driving the router the way the rendering layer would:
// oneshot requests against a temp-file sqlite store, with the upstream
// auth layer simulated through the x-user-id header.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use microblog::config::{Config, DatabaseConfig, FeedConfig, ServerConfig};
use microblog::store::PostFilter;
use microblog::{app_state::AppState, data_seeder, handlers::create_router};

struct TestApp {
    app: Router,
    state: AppState,
    _dir: tempfile::TempDir,
}

async fn spawn() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("blog.db").display());
    let config = Config {
        database: DatabaseConfig { url },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        feed: FeedConfig { page_size: 10 },
        seed_demo_data: false,
    };
    let state = AppState::new(config).await.expect("app state");
    TestApp {
        app: create_router(state.clone()),
        state,
        _dir: dir,
    }
}

async fn get(app: &Router, path: &str, user: Option<i64>) -> Response<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(id) = user {
        builder = builder.header("x-user-id", id.to_string());
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_form(app: &Router, path: &str, body: &str, user: Option<i64>) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(id) = user {
        builder = builder.header("x-user-id", id.to_string());
    }
    app.clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_global_feed_pagination_and_ordering() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    for i in 0..25 {
        t.state
            .store
            .create_post(sarah.id, &format!("post {}", i), None, None)
            .await
            .unwrap();
    }

    let page1 = body_json(get(&t.app, "/", None).await).await;
    assert_eq!(page1["page"]["number"], 1);
    assert_eq!(page1["page"]["total_pages"], 3);
    assert_eq!(page1["page"]["total_items"], 25);
    assert_eq!(page1["page"]["items"].as_array().unwrap().len(), 10);
    assert_eq!(page1["page"]["has_next"], true);
    assert_eq!(page1["page"]["has_previous"], false);

    let page2 = body_json(get(&t.app, "/?page=2", None).await).await;
    assert_eq!(page2["page"]["items"].as_array().unwrap().len(), 10);

    // Newest first, strictly ordered across the page boundary. Same-second
    // posts break ties by id, so ids decrease monotonically.
    let last_of_p1 = page1["page"]["items"][9]["id"].as_i64().unwrap();
    let first_of_p2 = page2["page"]["items"][0]["id"].as_i64().unwrap();
    assert!(last_of_p1 > first_of_p2);
    let ids: Vec<i64> = page1["page"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] > w[1]));

    let page3 = body_json(get(&t.app, "/?page=3", None).await).await;
    assert_eq!(page3["page"]["items"].as_array().unwrap().len(), 5);
    assert_eq!(page3["page"]["has_next"], false);
}

#[tokio::test]
async fn test_page_number_clamps_instead_of_erroring() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    for i in 0..25 {
        t.state
            .store
            .create_post(sarah.id, &format!("post {}", i), None, None)
            .await
            .unwrap();
    }

    let overshoot = get(&t.app, "/?page=9999", None).await;
    assert_eq!(overshoot.status(), StatusCode::OK);
    assert_eq!(body_json(overshoot).await["page"]["number"], 3);

    let junk = get(&t.app, "/?page=abc", None).await;
    assert_eq!(junk.status(), StatusCode::OK);
    assert_eq!(body_json(junk).await["page"]["number"], 1);

    let zero = get(&t.app, "/?page=0", None).await;
    assert_eq!(body_json(zero).await["page"]["number"], 1);
}

#[tokio::test]
async fn test_empty_feed_is_a_single_empty_page() {
    let t = spawn().await;
    let page = body_json(get(&t.app, "/", None).await).await;
    assert_eq!(page["page"]["number"], 1);
    assert_eq!(page["page"]["total_pages"], 1);
    assert_eq!(page["page"]["total_items"], 0);
    assert_eq!(page["page"]["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unauthenticated_create_redirects_without_persisting() {
    let t = spawn().await;

    let response = post_form(&t.app, "/new/", "text=Nope", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let form = get(&t.app, "/new/", None).await;
    assert_eq!(form.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&form), "/");

    let count = t.state.store.count_posts(&PostFilter::All).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_create_and_edit_flow_updates_all_views() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();

    let created = post_form(&t.app, "/new/", "text=FirstPost", Some(sarah.id)).await;
    assert_eq!(created.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&created), "/");

    let posts = t
        .state
        .store
        .list_posts(&PostFilter::All, 10, 0)
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    let post_id = posts[0].id;
    let detail_path = format!("/sarah/{}/", post_id);

    for path in ["/", "/sarah/", detail_path.as_str()] {
        let response = get(&t.app, path, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("FirstPost"));
    }

    let edited = post_form(
        &t.app,
        &format!("/sarah/{}/edit/", post_id),
        "text=EditPost",
        Some(sarah.id),
    )
    .await;
    assert_eq!(edited.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&edited), format!("/sarah/{}/", post_id));

    for path in ["/", "/sarah/", detail_path.as_str()] {
        let body = body_string(get(&t.app, path, None).await).await;
        assert!(body.contains("EditPost"));
        assert!(!body.contains("FirstPost"));
    }
}

#[tokio::test]
async fn test_non_author_edit_is_forbidden_and_mutates_nothing() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let volkov = t
        .state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();
    let post = t
        .state
        .store
        .create_post(sarah.id, "FirstPost", None, None)
        .await
        .unwrap();

    let response = post_form(
        &t.app,
        &format!("/sarah/{}/edit/", post.id),
        "text=Hijacked",
        Some(volkov.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let unchanged = t.state.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(unchanged.text, "FirstPost");
    assert_eq!(unchanged.pub_date, post.pub_date);
    assert_eq!(unchanged.author_id, sarah.id);
}

#[tokio::test]
async fn test_validation_failure_redisplays_form_without_persisting() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();

    let response = post_form(&t.app, "/new/", "text=", Some(sarah.id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["form"]["errors"]["text"].is_string());

    let count = t.state.store.count_posts(&PostFilter::All).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_unknown_group_slug_becomes_field_error() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();

    let response = post_form(&t.app, "/new/", "text=hello&group=missing", Some(sarah.id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["form"]["errors"]["group"].is_string());
    assert_eq!(
        t.state.store.count_posts(&PostFilter::All).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_group_feed_and_deletion_clears_reference() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let group = t
        .state
        .store
        .create_group("Rust", "rust", "Posts about Rust")
        .await
        .unwrap();

    let created = post_form(&t.app, "/new/", "text=GroupPost&group=rust", Some(sarah.id)).await;
    assert_eq!(created.status(), StatusCode::SEE_OTHER);

    let feed = get(&t.app, "/group/rust/", None).await;
    assert_eq!(feed.status(), StatusCode::OK);
    let body = body_json(feed).await;
    assert_eq!(body["page"]["total_items"], 1);
    assert!(body["page"]["items"][0]["text"]
        .as_str()
        .unwrap()
        .contains("GroupPost"));

    t.state.store.delete_group(group.id).await.unwrap();

    // Post survives with an emptied group reference; the feed 404s.
    let posts = t
        .state
        .store
        .list_posts(&PostFilter::All, 10, 0)
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].group_id, None);
    assert_eq!(posts[0].group_slug, None);

    let gone = get(&t.app, "/group/rust/", None).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_follow_feed_tracks_follow_and_unfollow() {
    let t = spawn().await;
    let b = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let c = t
        .state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();

    let followed = get(&t.app, "/volkov/follow/", Some(b.id)).await;
    assert_eq!(followed.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&followed), "/volkov/");

    post_form(&t.app, "/new/", "text=Текст+поста", Some(c.id)).await;

    let feed = body_string(get(&t.app, "/follow/", Some(b.id)).await).await;
    assert!(feed.contains("Текст поста"));

    let unfollowed = get(&t.app, "/volkov/unfollow/", Some(b.id)).await;
    assert_eq!(unfollowed.status(), StatusCode::SEE_OTHER);

    post_form(&t.app, "/new/", "text=AfterUnfollow", Some(c.id)).await;

    let after = body_json(get(&t.app, "/follow/", Some(b.id)).await).await;
    assert_eq!(after["page"]["total_items"], 0);
}

#[tokio::test]
async fn test_double_follow_keeps_a_single_edge() {
    let t = spawn().await;
    let b = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let c = t
        .state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();
    for i in 0..3 {
        t.state
            .store
            .create_post(c.id, &format!("post {}", i), None, None)
            .await
            .unwrap();
    }

    get(&t.app, "/volkov/follow/", Some(b.id)).await;
    get(&t.app, "/volkov/follow/", Some(b.id)).await;

    assert_eq!(t.state.store.follower_count(c.id).await.unwrap(), 1);

    // Feed entries are not duplicated by repeated follows.
    let feed = body_json(get(&t.app, "/follow/", Some(b.id)).await).await;
    assert_eq!(feed["page"]["total_items"], 3);
}

#[tokio::test]
async fn test_self_follow_is_a_noop() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();

    let response = get(&t.app, "/sarah/follow/", Some(sarah.id)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(t.state.store.follower_count(sarah.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unfollow_without_edge_succeeds() {
    let t = spawn().await;
    let b = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    t.state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();

    let response = get(&t.app, "/volkov/unfollow/", Some(b.id)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/volkov/");
}

#[tokio::test]
async fn test_follow_routes_require_authentication() {
    let t = spawn().await;
    t.state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();

    for path in ["/follow/", "/volkov/follow/", "/volkov/unfollow/"] {
        let response = get(&t.app, path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/");
    }
}

#[tokio::test]
async fn test_anonymous_comment_is_rejected() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let post = t
        .state
        .store
        .create_post(sarah.id, "FirstPost", None, None)
        .await
        .unwrap();

    let response = post_form(
        &t.app,
        &format!("/sarah/{}/comment/", post.id),
        "text=sneaky",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/");

    assert!(t.state.store.list_comments(post.id).await.unwrap().is_empty());

    let detail = body_string(get(&t.app, &format!("/sarah/{}/", post.id), None).await).await;
    assert!(!detail.contains("sneaky"));
}

#[tokio::test]
async fn test_comment_flow_and_ordering() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let volkov = t
        .state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();
    let post = t
        .state
        .store
        .create_post(sarah.id, "FirstPost", None, None)
        .await
        .unwrap();

    let first = post_form(
        &t.app,
        &format!("/sarah/{}/comment/", post.id),
        "text=first+comment",
        Some(volkov.id),
    )
    .await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&first), format!("/sarah/{}/", post.id));

    post_form(
        &t.app,
        &format!("/sarah/{}/comment/", post.id),
        "text=second+comment",
        Some(sarah.id),
    )
    .await;

    let detail = body_json(get(&t.app, &format!("/sarah/{}/", post.id), None).await).await;
    let comments = detail["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["text"], "first comment");
    assert_eq!(comments[0]["author"], "volkov");
    assert_eq!(comments[1]["text"], "second comment");
}

#[tokio::test]
async fn test_empty_comment_redisplays_form() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let post = t
        .state
        .store
        .create_post(sarah.id, "FirstPost", None, None)
        .await
        .unwrap();

    let response = post_form(
        &t.app,
        &format!("/sarah/{}/comment/", post.id),
        "text=",
        Some(sarah.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["form"]["errors"]["text"].is_string());
    assert!(t.state.store.list_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_profile_reports_aggregate_counts() {
    let t = spawn().await;
    let b = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let c = t
        .state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();
    for i in 0..2 {
        t.state
            .store
            .create_post(c.id, &format!("post {}", i), None, None)
            .await
            .unwrap();
    }
    get(&t.app, "/volkov/follow/", Some(b.id)).await;

    let profile = body_json(get(&t.app, "/volkov/", Some(b.id)).await).await;
    assert_eq!(profile["author"], "volkov");
    assert_eq!(profile["post_count"], 2);
    assert_eq!(profile["followers"], 1);
    assert_eq!(profile["following_count"], 0);
    assert_eq!(profile["viewer_follows"], true);

    let anonymous = body_json(get(&t.app, "/volkov/", None).await).await;
    assert_eq!(anonymous["viewer_follows"], false);
}

#[tokio::test]
async fn test_not_found_surfaces() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    t.state
        .store
        .create_user("volkov", "volkov@skynet.com", "x")
        .await
        .unwrap();
    let post = t
        .state
        .store
        .create_post(sarah.id, "FirstPost", None, None)
        .await
        .unwrap();

    // Unknown username resolves through the profile route.
    let profile = get(&t.app, "/not_found/", None).await;
    assert_eq!(profile.status(), StatusCode::NOT_FOUND);

    let group = get(&t.app, "/group/nope/", None).await;
    assert_eq!(group.status(), StatusCode::NOT_FOUND);

    // A real post id under the wrong author 404s.
    let wrong_author = get(&t.app, &format!("/volkov/{}/", post.id), None).await;
    assert_eq!(wrong_author.status(), StatusCode::NOT_FOUND);

    let missing_post = get(&t.app, "/sarah/999/", None).await;
    assert_eq!(missing_post.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_a_post_cascades_its_comments() {
    let t = spawn().await;
    let sarah = t
        .state
        .store
        .create_user("sarah", "connor.s@skynet.com", "x")
        .await
        .unwrap();
    let post = t
        .state
        .store
        .create_post(sarah.id, "FirstPost", None, None)
        .await
        .unwrap();
    t.state
        .store
        .create_comment(post.id, sarah.id, "a comment")
        .await
        .unwrap();

    t.state.store.delete_post(post.id).await.unwrap();

    assert!(t.state.store.get_post(post.id).await.unwrap().is_none());
    assert!(t.state.store.list_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_seeder_is_idempotent() {
    let t = spawn().await;
    data_seeder::seed(&t.state.store).await.unwrap();
    data_seeder::seed(&t.state.store).await.unwrap();

    assert!(t
        .state
        .store
        .get_user_by_username("sarah")
        .await
        .unwrap()
        .is_some());
    assert_eq!(
        t.state.store.count_posts(&PostFilter::All).await.unwrap(),
        2
    );
}
