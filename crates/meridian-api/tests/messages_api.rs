mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn conversation_lifecycle() {
    let app = common::app();
    let ann = app.user("Ann");
    let ben = app.user("Ben");

    let (status, sent) = app
        .post("/messages", &ann.token, json!({"receiver_id": ben.id, "content": " Hello Ben "}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["content"], "Hello Ben");
    assert_eq!(sent["read"], false);

    let (_, unread) = app.get("/messages/unread-count", Some(&ben.token)).await;
    assert_eq!(unread["count"], 1);

    let (_, conversations) = app.get("/messages", Some(&ben.token)).await;
    assert_eq!(conversations[0]["participants"][0]["id"], json!(ann.id));
    assert_eq!(conversations[0]["last_message"]["content"], "Hello Ben");

    let conversation = sent["conversation_id"].as_str().unwrap();
    let (status, opened) = app
        .get(&format!("/messages?conversation_id={}", conversation), Some(&ben.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened[0]["read"], true);

    let (_, unread) = app.get("/messages/unread-count", Some(&ben.token)).await;
    assert_eq!(unread["count"], 0);

    let cat = app.user("Cat");
    let (status, _) = app
        .get(&format!("/messages?conversation_id={}", conversation), Some(&cat.token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mark_read_is_idempotent_and_quiet() {
    let app = common::app();
    let ann = app.user("Ann");
    let ben = app.user("Ben");
    let (_, sent) = app
        .post("/messages", &ann.token, json!({"receiver_id": ben.id, "content": "ping"}))
        .await;

    let ids = json!({"message_ids": [sent["id"]]});
    let (_, first) = app.post("/messages/mark-read", &ben.token, ids.clone()).await;
    let (_, second) = app.post("/messages/mark-read", &ben.token, ids.clone()).await;
    assert_eq!(first["updated"], 1);
    assert_eq!(second["updated"], 0);

    // The sender cannot mark the receiver's copy
    let (_, by_sender) = app.post("/messages/mark-read", &ann.token, ids).await;
    assert_eq!(by_sender["updated"], 0);

    for user in [&ann, &ben] {
        let (_, notes) = app.get("/notifications", Some(&user.token)).await;
        assert_eq!(notes, json!([]));
    }
}

#[tokio::test]
async fn opening_a_conversation_leaves_nothing_unread() {
    let app = common::app();
    let ann = app.user("Ann");
    let ben = app.user("Ben");
    let mut conversation = String::new();
    for text in ["one", "two", "three"] {
        let (_, sent) = app
            .post("/messages", &ann.token, json!({"receiver_id": ben.id, "content": text}))
            .await;
        conversation = sent["conversation_id"].as_str().unwrap().to_string();
    }

    let (_, unread) = app.get("/messages/unread-count", Some(&ben.token)).await;
    assert_eq!(unread["count"], 3);

    let (status, opened) = app
        .get(&format!("/messages?conversation_id={}", conversation), Some(&ben.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened.as_array().unwrap().len(), 3);

    let (_, unread) = app.get("/messages/unread-count", Some(&ben.token)).await;
    assert_eq!(unread["count"], 0);
    let (_, notes) = app.get("/notifications?unread_only=true", Some(&ben.token)).await;
    assert_eq!(notes, json!([]));
}

#[tokio::test]
async fn invalid_messages_are_rejected() {
    let app = common::app();
    let ann = app.user("Ann");

    let (status, body) = app
        .post("/messages", &ann.token, json!({"receiver_id": ann.id, "content": "me"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "receiver_id");

    let (status, _) = app
        .post("/messages", &ann.token, json!({"receiver_id": uuid::Uuid::new_v4(), "content": "hi"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let ben = app.user("Ben");
    let (status, body) = app
        .post("/messages", &ann.token, json!({"receiver_id": ben.id, "content": "  "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "content");
}

#[tokio::test]
async fn notifications_are_owner_only_and_mark_all() {
    let app = common::app();
    let ann = app.user("Ann");
    let ben = app.user("Ben");
    let cat = app.user("Cat");
    for sender in [&ann, &cat] {
        let (status, _) = app
            .post(&format!("/users/{}/connection", ben.id), &sender.token, json!(null))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, notes) = app.get("/notifications", Some(&ben.token)).await;
    let id = notes[0]["id"].as_str().unwrap();
    let uri = format!("/notifications/{}", id);

    let (status, _) = app.send(axum::http::Method::PATCH, &uri, Some(&ann.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, marked) = app.send(axum::http::Method::PATCH, &uri, Some(&ben.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["read"], true);

    let (_, all) = app.post("/notifications/mark-all-read", &ben.token, json!(null)).await;
    assert_eq!(all["updated"], 1);
    let (_, unread) = app.get("/notifications?unread_only=true", Some(&ben.token)).await;
    assert_eq!(unread, json!([]));
}
