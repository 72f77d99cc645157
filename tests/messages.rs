//! Private messaging: sending, conversation summaries, threads.

mod common;

use axum::http::StatusCode;
use common::{app, TestApp, TestUser};
use serde_json::{json, Value};
use uuid::Uuid;

async fn send(app: &TestApp, from: &TestUser, to: &TestUser, content: &str) -> Value {
    let resp = app
        .post_json(
            "/messages",
            json!({ "receiver_id": to.id, "content": content }),
            Some(&from.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.error_message());
    resp.json()
}

#[tokio::test]
async fn conversations_keep_latest_message_per_counterpart() {
    let app = app().await;
    let u = app.create_user("conv_u").await;
    let v = app.create_user("conv_v").await;
    let w = app.create_user("conv_w").await;

    send(app, &u, &v, "hi v").await;
    let reply = send(app, &v, &u, "hi u").await;
    let latest = send(app, &u, &w, "hi w").await;

    let resp = app.get("/messages/conversations", Some(&u.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);

    assert_eq!(items[0]["counterpart_id"], w.id.to_string().as_str());
    assert_eq!(items[0]["counterpart_username"], w.username.as_str());
    assert_eq!(items[0]["last_message"]["id"], latest["id"]);

    assert_eq!(items[1]["counterpart_id"], v.id.to_string().as_str());
    assert_eq!(items[1]["last_message"]["id"], reply["id"]);
    assert_eq!(items[1]["last_message"]["content"], "hi u");
}

#[tokio::test]
async fn thread_contains_both_directions_oldest_first() {
    let app = app().await;
    let u = app.create_user("thread_u").await;
    let v = app.create_user("thread_v").await;
    let w = app.create_user("thread_w").await;

    let first = send(app, &u, &v, "one").await;
    let second = send(app, &v, &u, "two").await;
    send(app, &u, &w, "unrelated").await;
    let third = send(app, &u, &v, "three").await;

    let resp = app
        .get(&format!("/messages/{}", v.id), Some(&u.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let ids: Vec<Value> = resp
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|message| message["id"].clone())
        .collect();
    assert_eq!(ids, vec![first["id"].clone(), second["id"].clone(), third["id"].clone()]);

    let from_other_side = app
        .get(&format!("/messages/{}", u.id), Some(&v.token))
        .await;
    assert_eq!(from_other_side.json().as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn thread_with_unknown_user_is_not_found() {
    let app = app().await;
    let u = app.create_user("thread_missing").await;

    let resp = app
        .get(&format!("/messages/{}", Uuid::new_v4()), Some(&u.token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_validates_content_and_receiver() {
    let app = app().await;
    let u = app.create_user("send_u").await;
    let v = app.create_user("send_v").await;

    let cases = [
        (json!({ "receiver_id": v.id, "content": "   " }), StatusCode::BAD_REQUEST),
        (
            json!({ "receiver_id": v.id, "content": "x".repeat(2001) }),
            StatusCode::BAD_REQUEST,
        ),
        (json!({ "receiver_id": u.id, "content": "me" }), StatusCode::BAD_REQUEST),
        (
            json!({ "receiver_id": Uuid::new_v4(), "content": "hello?" }),
            StatusCode::NOT_FOUND,
        ),
        (json!({ "receiver_id": "nope", "content": "hello" }), StatusCode::BAD_REQUEST),
    ];

    for (body, expected) in cases {
        let resp = app.post_json("/messages", body, Some(&u.token)).await;
        assert_eq!(resp.status, expected, "{}", resp.error_message());
    }

    let resp = app
        .post_json(
            "/messages",
            json!({ "receiver_id": v.id, "content": "x".repeat(2000) }),
            Some(&u.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn messaging_requires_auth() {
    let app = app().await;

    let resp = app.get("/messages/conversations", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn equal_timestamps_fall_back_to_id_order() {
    let app = app().await;
    let u = app.create_user("tie_u").await;
    let v = app.create_user("tie_v").await;
    let w = app.create_user("tie_w").await;

    let mut ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    ids.sort();
    let [low, mid, high] = ids;

    // now() is fixed for the statement, so all three share one sent_at.
    sqlx::query(
        "INSERT INTO messages (id, sender_id, receiver_id, content, sent_at) VALUES \
         ($1, $4, $6, 'to w', now()), \
         ($2, $4, $5, 'to v', now()), \
         ($3, $5, $4, 'from v', now())",
    )
    .bind(low)
    .bind(mid)
    .bind(high)
    .bind(u.id)
    .bind(v.id)
    .bind(w.id)
    .execute(app.pool())
    .await
    .unwrap();

    let items = app
        .get("/messages/conversations", Some(&u.token))
        .await
        .json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["counterpart_id"], v.id.to_string().as_str());
    assert_eq!(items[0]["last_message"]["id"], high.to_string().as_str());
    assert_eq!(items[1]["counterpart_id"], w.id.to_string().as_str());
    assert_eq!(items[1]["last_message"]["id"], low.to_string().as_str());

    let thread = app
        .get(&format!("/messages/{}", v.id), Some(&u.token))
        .await
        .json();
    let ids: Vec<&str> = thread
        .as_array()
        .unwrap()
        .iter()
        .map(|message| message["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![mid.to_string(), high.to_string()]);
}
