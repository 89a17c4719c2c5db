mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use meridian_types::models::Role;

fn post_body(title: &str) -> Value {
    json!({
        "title": title,
        "content": "Body text",
        "category": "CASE_STUDIES",
        "tags": ["growth", " growth ", "", "saas"],
        "metadata": {"readingMinutes": 4}
    })
}

#[tokio::test]
async fn create_and_page_through_the_feed() {
    let app = common::app();
    let author = app.user("Ann");

    let mut created = Vec::new();
    for i in 0..7 {
        let (status, body) = app.post("/posts", &author.token, post_body(&format!("Post {}", i))).await;
        assert_eq!(status, StatusCode::CREATED);
        created.push(body["id"].as_str().unwrap().to_string());
    }

    let (status, first) = app.get("/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["items"].as_array().unwrap().len(), 5);
    assert_eq!(first["items"][0]["tags"], json!(["growth", "saas"]));
    let cursor = first["next_cursor"].as_str().unwrap();

    let (_, second) = app.get(&format!("/posts?cursor={}&limit=5", cursor), None).await;
    assert_eq!(second["items"].as_array().unwrap().len(), 2);
    assert!(second["next_cursor"].is_null());

    let mut seen: Vec<String> = first["items"]
        .as_array()
        .unwrap()
        .iter()
        .chain(second["items"].as_array().unwrap())
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    created.sort();
    assert_eq!(seen, created);

    let (_, by_author) = app.get(&format!("/users/{}/posts?limit=50", author.id), None).await;
    assert_eq!(by_author["items"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn post_validation() {
    let app = common::app();
    let author = app.user("Ann");

    let (status, body) = app.post("/posts", &author.token, post_body("   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "title");

    let mut bad_video = post_body("Video");
    bad_video["video_url"] = json!("not a url");
    let (status, body) = app.post("/posts", &author.token, bad_video).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "video_url");
}

#[tokio::test]
async fn upvote_twice_restores_count() {
    let app = common::app();
    let author = app.user("Ann");
    let reader = app.user("Ben");
    let (_, post) = app.post("/posts", &author.token, post_body("Upvotable")).await;
    let uri = format!("/posts/{}/upvote", post["id"].as_str().unwrap());

    let (status, first) = app.post(&uri, &reader.token, json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, json!({"upvoted": true, "upvote_count": 1}));

    let (_, second) = app.post(&uri, &reader.token, json!(null)).await;
    assert_eq!(second, json!({"upvoted": false, "upvote_count": 0}));

    let (status, _) = app
        .post(&format!("/posts/{}/upvote", uuid::Uuid::new_v4()), &reader.token, json!(null))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_and_deletion_rules() {
    let app = common::app();
    let author = app.user("Ann");
    let reader = app.user("Ben");
    let admin = app.user_with_role("Root", Role::Admin);
    let (_, post) = app.post("/posts", &author.token, post_body("Discussed")).await;
    let id = post["id"].as_str().unwrap();

    let (status, _) = app
        .post(&format!("/posts/{}/comments", id), &reader.token, json!({"content": "   "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, comment) = app
        .post(&format!("/posts/{}/comments", id), &reader.token, json!({"content": " Nice "}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["content"], "Nice");

    let (_, comments) = app.get(&format!("/posts/{}/comments", id), None).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(Method::DELETE, &format!("/posts/{}", id), Some(&reader.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::DELETE, &format!("/posts/{}", id), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/posts/{}/comments", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
