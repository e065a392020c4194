//! Integration Tests: HTTP API
//!
//! Drives the full route table over the in-memory store: API-key identity,
//! error bodies, comment trees, votes, cascade deletes, communities and search.

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::{api_key, at, forum, Forum};
use forum_service::handlers::configure_routes;
use forum_service::middleware::API_KEY_HEADER;
use serde_json::{json, Value};

macro_rules! app {
    ($forum:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($forum.state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

async fn seeded() -> (Forum, String, String) {
    let forum = forum();
    forum.user("alice").await;
    forum.user("bob").await;
    (forum, api_key("alice"), api_key("bob"))
}

#[actix_web::test]
async fn test_post_comment_vote_roundtrip() {
    let (forum, alice, bob) = seeded().await;
    let app = app!(forum);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({
            "title": "  Hello forum  ",
            "content": "First post",
            "url": "https://example.com/story"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let post: Value = test::read_body_json(resp).await;
    assert_eq!(post["title"], "Hello forum");
    assert_eq!(post["author"], "alice");
    let post_id = post["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/comments", post_id))
        .insert_header((API_KEY_HEADER, bob.as_str()))
        .set_json(json!({ "content": "Nice post" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comment: Value = test::read_body_json(resp).await;
    assert_eq!(comment["url"], "https://example.com/story");
    let comment_id = comment["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/comments", post_id))
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "content": "Thanks!", "parent_id": comment_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/comments/{}/upvote", comment_id))
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let vote: Value = test::read_body_json(resp).await;
    assert_eq!(
        vote,
        json!({ "target": "comment", "id": comment_id, "votes": 1, "user_vote": 1 })
    );

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}/comments/tree?order=bogus", post_id))
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let tree: Value = test::read_body_json(resp).await;
    assert_eq!(tree.as_array().unwrap().len(), 1);
    assert_eq!(tree[0]["author"], "bob");
    assert_eq!(tree[0]["user_vote"], 1);
    assert_eq!(tree[0]["votes"], 1);
    assert_eq!(tree[0]["replies"][0]["content"], "Thanks!");
    assert_eq!(tree[0]["replies"][0]["replies"], json!([]));
    assert!(tree[0]["published_date"].is_string());

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}/comments/tree", post_id))
        .to_request();
    let anonymous: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(anonymous[0]["user_vote"], 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}/comments/root", post_id))
        .to_request();
    let roots: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(roots[0]["replies"], json!([]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}/comments", post_id))
        .to_request();
    let flat: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(flat.as_array().unwrap().len(), 2);
    assert_eq!(flat[0]["content"], "Nice post");
}

#[actix_web::test]
async fn test_identity_errors() {
    let (forum, _alice, _bob) = seeded().await;
    let owner = forum.user("carol").await;
    let post = forum.post(&owner).await;
    let app = app!(forum);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/upvote", post.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "auth_required");
    assert_eq!(body["status"], 401);

    let req = test::TestRequest::get()
        .uri("/api/v1/posts")
        .insert_header((API_KEY_HEADER, "not-a-real-key"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/api/v1/posts").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_comment_delete_permissions_and_not_found() {
    let (forum, alice, bob) = seeded().await;
    let author = forum.user("dora").await;
    let post = forum.post(&author).await;
    let root = forum.comment(&author, &post, None, "root").await;
    forum.comment(&author, &post, Some(&root), "reply").await;
    let app = app!(forum);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/comments/{}", root.id))
        .insert_header((API_KEY_HEADER, bob.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let dora = api_key("dora");
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/comments/{}", root.id))
        .insert_header((API_KEY_HEADER, dora.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["deleted"], 2);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/comments/{}", root.id))
        .insert_header((API_KEY_HEADER, dora.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "not_found");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/comments", post.id))
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "content": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_reply_to_parent_from_other_post_is_rejected() {
    let (forum, alice, _bob) = seeded().await;
    let owner = forum.user("erin").await;
    let post = forum.post(&owner).await;
    let other = forum.post(&owner).await;
    let foreign = forum.comment(&owner, &other, None, "elsewhere").await;
    let app = app!(forum);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/comments", post.id))
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "content": "hi", "parent_id": foreign.id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(forum.store.comment_count().await, 1);
}

#[actix_web::test]
async fn test_post_edit_and_delete_are_author_only() {
    let (forum, alice, bob) = seeded().await;
    let app = app!(forum);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "title": "Draft", "content": "Body" }))
        .to_request();
    let post: Value = test::call_and_read_body_json(&app, req).await;
    let uri = format!("/api/v1/posts/{}", post["id"].as_str().unwrap());

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((API_KEY_HEADER, bob.as_str()))
        .set_json(json!({ "title": "Hijacked" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "title": "Final" }))
        .to_request();
    let edited: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(edited["title"], "Final");
    assert_eq!(edited["content"], "Body");

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "url": "not a url" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "url": "https://example.com/linked" }))
        .to_request();
    let linked: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(linked["url"], "https://example.com/linked");

    // omitting the url keeps it
    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "content": "Edited body" }))
        .to_request();
    let kept: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(kept["url"], "https://example.com/linked");

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({ "url": "" }))
        .to_request();
    let cleared: Value = test::call_and_read_body_json(&app, req).await;
    assert!(cleared["url"].is_null());
    assert_eq!(cleared["content"], "Edited body");

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&uri).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_post_listing_orders_and_overlays() {
    let (forum, alice, bob) = seeded().await;
    let app = app!(forum);

    let mut ids = Vec::new();
    for title in ["first", "second", "third"] {
        let req = test::TestRequest::post()
            .uri("/api/v1/posts")
            .insert_header((API_KEY_HEADER, alice.as_str()))
            .set_json(json!({ "title": title, "content": "body" }))
            .to_request();
        let post: Value = test::call_and_read_body_json(&app, req).await;
        ids.push(post["id"].as_str().unwrap().to_string());
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/upvote", ids[0]))
        .insert_header((API_KEY_HEADER, bob.as_str()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/v1/posts?order=top")
        .insert_header((API_KEY_HEADER, bob.as_str()))
        .to_request();
    let top: Value = test::call_and_read_body_json(&app, req).await;
    let titles: Vec<&str> = top
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["first", "third", "second"]);
    assert_eq!(top[0]["user_vote"], 1);
    assert_eq!(top[1]["user_vote"], 0);

    let req = test::TestRequest::get()
        .uri("/api/v1/posts?order=old&limit=2")
        .to_request();
    let old: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(old.as_array().unwrap().len(), 2);
    assert_eq!(old[0]["title"], "first");
    assert_eq!(old[1]["title"], "second");
}

#[actix_web::test]
async fn test_communities_and_subscriptions() {
    let (forum, alice, bob) = seeded().await;
    let rust = forum.store.add_community("rust").await;
    let go = forum.store.add_community("go").await;
    let app = app!(forum);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({
            "title": "Ownership",
            "content": "Borrowing explained",
            "community_ids": [rust.id, go.id, rust.id]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let post: Value = test::read_body_json(resp).await;
    assert_eq!(post["communities"].as_array().unwrap().len(), 2);
    let post_id = post["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/comments", post_id))
        .insert_header((API_KEY_HEADER, bob.as_str()))
        .set_json(json!({ "content": "Great read" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/communities/{}/subscription", rust.id))
            .insert_header((API_KEY_HEADER, bob.as_str()))
            .to_request();
        let sub: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(sub["subscribed"], true);
        assert_eq!(sub["subs_count"], 1);
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/communities/{}", rust.id))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["name"], "rust");
    assert_eq!(detail["subs_count"], 1);
    assert_eq!(detail["posts_count"], 1);
    assert_eq!(detail["comments_count"], 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/communities/{}/posts", go.id))
        .to_request();
    let posts: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(posts[0]["id"], post_id.as_str());
    assert_eq!(posts[0]["communities"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/communities/{}/subscription", rust.id))
        .insert_header((API_KEY_HEADER, bob.as_str()))
        .to_request();
    let sub: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(sub["subscribed"], false);
    assert_eq!(sub["subs_count"], 0);

    let req = test::TestRequest::get().uri("/api/v1/communities").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["go", "rust"]);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header((API_KEY_HEADER, alice.as_str()))
        .set_json(json!({
            "title": "Orphan",
            "content": "Nowhere",
            "community_ids": [uuid::Uuid::new_v4()]
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_search() {
    let (forum, alice, bob) = seeded().await;
    let app = app!(forum);

    for title in ["Rust tips", "Gardening", "More RUST"] {
        let req = test::TestRequest::post()
            .uri("/api/v1/posts")
            .insert_header((API_KEY_HEADER, alice.as_str()))
            .set_json(json!({ "title": title, "content": "body" }))
            .to_request();
        let post: Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/posts/{}/comments", post["id"].as_str().unwrap()))
            .insert_header((API_KEY_HEADER, bob.as_str()))
            .set_json(json!({ "content": format!("about {}", title) }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get().uri("/api/v1/search?q=rust").to_request();
    let both: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(both["type"], "both");
    assert_eq!(both["query"], "rust");
    assert_eq!(both["posts"][0]["title"], "More RUST");
    assert_eq!(both["posts"][1]["title"], "Rust tips");
    assert_eq!(both["comments"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/v1/search?q=garden&type=posts")
        .to_request();
    let posts: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(posts["posts"].as_array().unwrap().len(), 1);
    assert!(posts.get("comments").is_none());

    let req = test::TestRequest::get()
        .uri("/api/v1/search?q=rust&type=users")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/v1/search?q=%20").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[::core::prelude::v1::test]
fn test_deep_comment_tree_is_served_on_a_worker_sized_stack() {
    const DEPTH: usize = 100_000;

    // actix workers run on 2 MiB stacks
    let worker = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            actix_web::rt::System::new().block_on(async {
                let forum = forum();
                let alice = forum.user("alice").await;
                let post = forum.post(&alice).await;

                let mut parent = forum.seeded_comment(&alice, &post, None, 0, at(0, 0)).await;
                let root_id = parent.id;
                for _ in 1..DEPTH {
                    parent = forum
                        .seeded_comment(&alice, &post, Some(&parent), 0, at(1, 0))
                        .await;
                }

                let app = app!(forum);

                let req = test::TestRequest::get()
                    .uri(&format!("/api/v1/posts/{}/comments/tree", post.id))
                    .to_request();
                let resp = test::call_service(&app, req).await;
                assert_eq!(resp.status(), StatusCode::OK);
                let body = test::read_body(resp).await;

                let marker = b"\"replies\":[";
                let opened = body.windows(marker.len()).filter(|w| *w == marker).count();
                assert_eq!(opened, DEPTH);
                assert!(body.starts_with(format!("[{{\"id\":\"{}\"", root_id).as_bytes()));
                assert!(body.ends_with(b"[]}]}]"));

                let req = test::TestRequest::get()
                    .uri(&format!("/api/v1/posts/{}/comments/root", post.id))
                    .to_request();
                let resp = test::call_service(&app, req).await;
                assert_eq!(resp.status(), StatusCode::OK);
                let roots: Value = test::read_body_json(resp).await;
                assert_eq!(roots.as_array().unwrap().len(), 1);
                assert_eq!(roots[0]["id"], root_id.to_string());
                assert_eq!(roots[0]["replies"], json!([]));
            })
        })
        .unwrap();

    worker.join().unwrap();
}
