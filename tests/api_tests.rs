mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt; // for collecting body
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

use common::setup;
use topup_engine::create_router;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check() {
    let h = setup().await;
    let app = create_router().with_state(h.state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn create_deposit_returns_payment_details() {
    let h = setup().await;
    let app = create_router().with_state(h.state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/deposits")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "user_id": 42, "amount": 10000 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let fee = body["fee"].as_i64().unwrap();
    assert!((1..=300).contains(&fee));
    assert_eq!(body["total"].as_i64().unwrap(), 10000 + fee);
    assert_eq!(body["expires_in_secs"], 300);
    assert!(body["unique_code"].as_str().unwrap().starts_with("user-42-"));

    // The prompt went out and the deposit is pending; nothing credited.
    assert_eq!(h.notifier.prompts.lock().unwrap().len(), 1);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/users/42/balance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["balance"], 0);
}

#[tokio::test]
async fn create_deposit_below_minimum_is_bad_request() {
    let h = setup().await;
    let app = create_router().with_state(h.state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/deposits")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "user_id": 42, "amount": 4999 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("minimum"));
}

#[tokio::test]
async fn credit_requires_an_existing_user() {
    let h = setup().await;
    let app = create_router().with_state(h.state.clone());

    let request = |user_id: i64| {
        Request::builder()
            .method("POST")
            .uri(format!("/users/{user_id}/credit"))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "amount": 2500 }).to_string()))
            .unwrap()
    };

    let response = app.clone().oneshot(request(5)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    topup_engine::db::ensure_user(&h.state.pool, 5).await.unwrap();
    let response = app.clone().oneshot(request(5)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["balance"], 2500);

    // The credit is paired with an account ledger row.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/users/5/transactions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["type"], "account");
    assert_eq!(body[0]["amount"], 2500);
}
