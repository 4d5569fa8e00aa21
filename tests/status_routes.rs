//! Status endpoint tests, driven in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use healthmate::profile::{FieldValue, ProfileField, ProfileUpdate};
use healthmate::routes::{StatusState, status_routes};
use healthmate::store::{LibSqlBackend, ProfileStore, Sender};

async fn store() -> Arc<LibSqlBackend> {
    Arc::new(LibSqlBackend::new_memory().await.unwrap())
}

async fn get(store: Arc<LibSqlBackend>, uri: &str) -> (StatusCode, Value) {
    let app = status_routes(StatusState { store });
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = get(store().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn unknown_profile_is_404() {
    let (status, body) = get(store().await, "/api/profiles/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn profile_is_returned_as_json() {
    let store = store().await;
    store
        .upsert_profile(
            "42",
            &ProfileUpdate::new(Some(ProfileField::Gender))
                .with_value(ProfileField::Name, FieldValue::Text("Alex".into()))
                .with_value(ProfileField::Age, FieldValue::Integer(30)),
        )
        .await
        .unwrap();

    let (status, body) = get(store, "/api/profiles/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_id"], "42");
    assert_eq!(body["name"], "Alex");
    assert_eq!(body["age"], 30);
    assert_eq!(body["next_field"], "gender");
    assert!(body["last_plan"].is_null());
}

#[tokio::test]
async fn messages_newest_first_with_limit() {
    let store = store().await;
    store.log_message("42", Sender::User, "hi").await.unwrap();
    store.log_message("42", Sender::Bot, "What's your name?").await.unwrap();
    store.log_message("42", Sender::User, "Alex").await.unwrap();

    let (status, body) = get(store, "/api/profiles/42/messages?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["sender"], "user");
    assert_eq!(messages[0]["message"], "Alex");
    assert_eq!(messages[1]["sender"], "bot");
}
