//! Admin surface: moderation, categories, users, audit trail.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

async fn audit_count(app: &common::TestApp, action: &str, target_id: Uuid) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE action = $1 AND target_id = $2",
    )
    .bind(action)
    .bind(target_id)
    .fetch_one(app.pool())
    .await
    .unwrap()
}

// ===========================================================================
// Moderation
// ===========================================================================

#[tokio::test]
async fn approve_pending_announcement_once() {
    let app = app().await;
    let admin = app.create_admin("mod_admin").await;
    let owner = app.create_user("mod_owner").await;
    let category = app.create_category("moderation").await;
    let id = app.create_announcement(&owner, &category).await;
    let path = format!("/admin/announcements/{}/status", id);

    let resp = app
        .put_json(&path, json!({ "status": "approved" }), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "approved");
    assert_eq!(audit_count(app, "approve", id).await, 1);

    let resp = app
        .put_json(&path, json!({ "status": "rejected" }), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "announcement is already approved");
    assert_eq!(audit_count(app, "reject", id).await, 0);

    let public = app.get(&format!("/announcements/{}", id), None).await;
    assert_eq!(public.status, StatusCode::OK);
}

#[tokio::test]
async fn reject_and_invalid_status_values() {
    let app = app().await;
    let admin = app.create_admin("rej_admin").await;
    let owner = app.create_user("rej_owner").await;
    let category = app.create_category("reject").await;
    let id = app.create_announcement(&owner, &category).await;
    let path = format!("/admin/announcements/{}/status", id);

    for status in ["pending", "archived"] {
        let resp = app
            .put_json(&path, json!({ "status": status }), Some(&admin.token))
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    let resp = app
        .put_json(&path, json!({ "status": "rejected" }), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "rejected");
    assert_eq!(audit_count(app, "reject", id).await, 1);

    let resp = app
        .put_json(
            &format!("/admin/announcements/{}/status", Uuid::new_v4()),
            json!({ "status": "approved" }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn regular_users_cannot_moderate() {
    let app = app().await;
    let owner = app.create_user("selfmod").await;
    let category = app.create_category("selfmod").await;
    let id = app.create_announcement(&owner, &category).await;

    let resp = app
        .put_json(
            &format!("/admin/announcements/{}/status", id),
            json!({ "status": "approved" }),
            Some(&owner.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_announcement_listing_filters_by_status() {
    let app = app().await;
    let admin = app.create_admin("adm_list").await;
    let owner = app.create_user("adm_list_owner").await;
    let category = app.create_category("admlist").await;
    let id = app.create_announcement(&owner, &category).await;

    let resp = app
        .get("/admin/announcements?status=pending", Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let entry = items
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["id"] == id.to_string().as_str())
        .cloned()
        .expect("pending announcement listed");
    assert_eq!(entry["author_username"], owner.username.as_str());
    assert_eq!(entry["author_email"], owner.email.as_str());

    let resp = app
        .get("/admin/announcements?status=approved", Some(&admin.token))
        .await;
    assert!(resp
        .json()
        .as_array()
        .unwrap()
        .iter()
        .all(|item| item["status"] == "approved"));

    let resp = app
        .get("/admin/announcements?status=bogus", Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_comment_delete_is_audited() {
    let app = app().await;
    let admin = app.create_admin("cm_mod").await;
    let owner = app.create_user("cm_mod_owner").await;
    let category = app.create_category("cmmod").await;
    let id = app.create_announcement(&owner, &category).await;
    let comment = app.create_comment(&owner, id).await;

    let listed = app.get("/admin/comments", Some(&admin.token)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert!(listed
        .json()
        .as_array()
        .unwrap()
        .iter()
        .any(|item| item["id"] == comment.to_string().as_str()
            && item["announcement_title"] == "Mountain bike"));

    let resp = app
        .delete(&format!("/admin/comments/{}", comment), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(audit_count(app, "delete", comment).await, 1);

    let resp = app
        .delete(&format!("/admin/comments/{}", comment), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Categories
// ===========================================================================

#[tokio::test]
async fn category_crud_with_conflicts() {
    let app = app().await;
    let admin = app.create_admin("cat_admin").await;
    let owner = app.create_user("cat_owner").await;
    let name = format!("furniture-{}", &Uuid::new_v4().simple().to_string()[..8]);

    let resp = app
        .post_json("/admin/categories", json!({ "name": name }), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let id = Uuid::parse_str(resp.json()["id"].as_str().unwrap()).unwrap();
    assert_eq!(audit_count(app, "create", id).await, 1);

    let resp = app
        .post_json("/admin/categories", json!({ "name": name }), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let renamed = format!("{}-home", name);
    let resp = app
        .put_json(
            &format!("/admin/categories/{}", id),
            json!({ "name": renamed }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["name"], renamed.as_str());

    let public = app.get("/categories", None).await;
    assert!(public
        .json()
        .as_array()
        .unwrap()
        .iter()
        .any(|item| item["name"] == renamed.as_str()));

    let announcement = app.create_announcement(&owner, &renamed).await;
    let resp = app
        .delete(&format!("/admin/categories/{}", id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .delete(&format!("/announcements/{}", announcement), Some(&owner.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .delete(&format!("/admin/categories/{}", id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(audit_count(app, "delete", id).await, 1);
}

// ===========================================================================
// Users
// ===========================================================================

#[tokio::test]
async fn role_changes_are_audited_and_not_self_service() {
    let app = app().await;
    let admin = app.create_admin("role_admin").await;
    let user = app.create_user("role_user").await;

    let resp = app
        .put_json(
            &format!("/admin/users/{}/role", user.id),
            json!({ "role": "admin" }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["role"], "admin");
    assert_eq!(audit_count(app, "update-role", user.id).await, 1);

    let resp = app
        .put_json(
            &format!("/admin/users/{}/role", admin.id),
            json!({ "role": "user" }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .put_json(
            &format!("/admin/users/{}/role", user.id),
            json!({ "role": "superuser" }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let listed = app.get("/admin/users", Some(&admin.token)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert!(listed
        .json()
        .as_array()
        .unwrap()
        .iter()
        .any(|item| item["id"] == user.id.to_string().as_str()));
}

#[tokio::test]
async fn deleting_user_removes_everything_they_own() {
    let app = app().await;
    let admin = app.create_admin("cascade_admin").await;
    let doomed = app.create_user("cascade_doomed").await;
    let friend = app.create_user("cascade_friend").await;
    let category = app.create_category("cascade-user").await;

    let announcement = app.create_announcement(&doomed, &category).await;
    let friends_announcement = app.create_announcement(&friend, &category).await;
    app.set_status(friends_announcement, "approved").await;
    app.create_comment(&doomed, friends_announcement).await;
    let resp = app
        .post_json(
            &format!("/announcements/{}/reactions", friends_announcement),
            json!({ "type": "like" }),
            Some(&doomed.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let resp = app
        .post_json(
            "/messages",
            json!({ "receiver_id": friend.id, "content": "bye" }),
            Some(&doomed.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .delete(&format!("/admin/users/{}", doomed.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(audit_count(app, "delete-user", doomed.id).await, 1);

    let leftovers: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM announcements WHERE user_id = $1) \
              + (SELECT COUNT(*) FROM comments WHERE user_id = $1) \
              + (SELECT COUNT(*) FROM reactions WHERE user_id = $1) \
              + (SELECT COUNT(*) FROM messages WHERE sender_id = $1 OR receiver_id = $1)",
    )
    .bind(doomed.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(leftovers, 0);

    let gone = app
        .get(&format!("/announcements/{}", announcement), Some(&admin.token))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let resp = app
        .delete(&format!("/admin/users/{}", doomed.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .delete(&format!("/admin/users/{}", admin.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Dashboard & audit log
// ===========================================================================

#[tokio::test]
async fn dashboard_counts_content() {
    let app = app().await;
    let admin = app.create_admin("dash").await;
    let owner = app.create_user("dash_owner").await;
    let category = app.create_category("dash").await;
    app.create_announcement(&owner, &category).await;

    let resp = app.get("/admin/dashboard", Some(&admin.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let stats = resp.json();
    assert!(stats["users"].as_i64().unwrap() >= 2);
    assert!(stats["announcements"].as_i64().unwrap() >= 1);
    assert!(stats["pending"].as_i64().unwrap() >= 1);
    assert!(stats["comments"].is_i64());
    assert!(stats["messages"].is_i64());
}

#[tokio::test]
async fn audit_log_pages_newest_first() {
    let app = app().await;
    let admin = app.create_admin("audit_pages").await;
    let owner = app.create_user("audit_owner").await;
    let category = app.create_category("audit").await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let id = app.create_announcement(&owner, &category).await;
        let resp = app
            .put_json(
                &format!("/admin/announcements/{}/status", id),
                json!({ "status": "approved" }),
                Some(&admin.token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        ids.push(id);
    }

    let first = app.get("/admin/audit?limit=2", Some(&admin.token)).await;
    assert_eq!(first.status, StatusCode::OK);
    let body = first.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let cursor = body["next_cursor"].as_str().expect("more pages").to_string();

    let second = app
        .get(
            &format!("/admin/audit?limit=2&cursor={}", cursor.replace('+', "%2B")),
            Some(&admin.token),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    let second_body = second.json();
    let second_items = second_body["items"].as_array().unwrap();
    assert!(!second_items.is_empty());
    assert!(second_items
        .iter()
        .all(|item| items.iter().all(|seen| seen["id"] != item["id"])));

    let resp = app.get("/admin/audit?limit=0", Some(&admin.token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .get("/admin/audit?cursor=garbage", Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}
