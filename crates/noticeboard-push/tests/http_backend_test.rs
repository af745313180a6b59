/// Integration tests: `HttpBackend` against a local axum server speaking the
/// `/api/push` protocol.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::Mutex;
use serde_json::json;

use noticeboard_push::{BackendError, HttpBackend, ItemRef, PushBackend, PushSubscription};
use noticeboard_types::PushKeys;
use noticeboard_types::api::{
    CheckSubscriptionQuery, CheckSubscriptionResponse, SubscribeItemRequest, SubscribeRequest,
    UnsubscribeItemRequest, UnsubscribeRequest, VapidPublicKeyResponse,
};

const PUBLIC_KEY: &str = "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

#[derive(Default)]
struct Store {
    devices: HashSet<String>,
    items: HashSet<(String, String, String)>,
}

type Shared = Arc<Mutex<Store>>;

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
}

async fn vapid_public_key() -> Json<VapidPublicKeyResponse> {
    Json(VapidPublicKeyResponse {
        public_key: PUBLIC_KEY.to_string(),
    })
}

async fn subscribe(State(store): State<Shared>, Json(body): Json<SubscribeRequest>) -> Response {
    if body.subscription.keys.auth.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid subscription object" })))
            .into_response();
    }
    store.lock().devices.insert(body.subscription.endpoint);
    (StatusCode::CREATED, Json(json!({ "message": "Subscribed" }))).into_response()
}

async fn unsubscribe(State(store): State<Shared>, Json(body): Json<UnsubscribeRequest>) -> StatusCode {
    let mut store = store.lock();
    store.devices.remove(&body.endpoint);
    store.items.retain(|(e, _, _)| *e != body.endpoint);
    StatusCode::OK
}

async fn subscribe_item(State(store): State<Shared>, Json(body): Json<SubscribeItemRequest>) -> Response {
    if body.item_id == "missing" {
        return not_found("Event not found");
    }
    store.lock().items.insert((
        body.subscription.endpoint,
        body.item_type.to_string(),
        body.item_id,
    ));
    StatusCode::CREATED.into_response()
}

async fn unsubscribe_item(State(store): State<Shared>, Json(body): Json<UnsubscribeItemRequest>) -> StatusCode {
    store
        .lock()
        .items
        .remove(&(body.endpoint, body.item_type.to_string(), body.item_id));
    StatusCode::OK
}

async fn check_subscription(
    State(store): State<Shared>,
    Path((item_type, item_id)): Path<(String, String)>,
    Query(query): Query<CheckSubscriptionQuery>,
) -> Json<CheckSubscriptionResponse> {
    let is_subscribed = store
        .lock()
        .items
        .contains(&(query.endpoint, item_type, item_id));
    Json(CheckSubscriptionResponse { is_subscribed })
}

async fn serve() -> (SocketAddr, Shared) {
    let store = Shared::default();
    let push = Router::new()
        .route("/vapid-public-key", get(vapid_public_key))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/subscribe-item", post(subscribe_item))
        .route("/unsubscribe-item", post(unsubscribe_item))
        .route("/check-subscription/{item_type}/{item_id}", get(check_subscription))
        .with_state(store.clone());
    let app = Router::new()
        .nest("/api/push", push)
        .route("/broken/api/push/vapid-public-key", get(|| async { "<html>oops</html>" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, store)
}

fn subscription(endpoint: &str) -> PushSubscription {
    PushSubscription {
        endpoint: endpoint.to_string(),
        expiration_time: None,
        keys: PushKeys {
            p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".into(),
            auth: "tBHItJI5svbpez7KI4CCXg".into(),
        },
    }
}

#[tokio::test]
async fn fetches_vapid_public_key() {
    let (addr, _) = serve().await;
    let backend = HttpBackend::new(&format!("http://{}", addr)).unwrap();

    assert_eq!(backend.vapid_public_key().await.unwrap(), PUBLIC_KEY);
}

#[tokio::test]
async fn device_and_item_round_trip() {
    let (addr, store) = serve().await;
    let backend = HttpBackend::new(&format!("http://{}", addr)).unwrap();
    let endpoint = "https://fcm.googleapis.com/fcm/send/abc:DEF?x=1&y=2";
    let sub = subscription(endpoint);
    let item = ItemRef::event("E1");

    backend.subscribe(&sub).await.unwrap();
    assert!(store.lock().devices.contains(endpoint));

    assert!(!backend.check_item_subscription(endpoint, &item).await.unwrap());
    backend.subscribe_item(&sub, &item).await.unwrap();
    assert!(backend.check_item_subscription(endpoint, &item).await.unwrap());
    assert!(!backend.check_item_subscription(endpoint, &ItemRef::notice("E1")).await.unwrap());

    backend.unsubscribe_item(endpoint, &item).await.unwrap();
    assert!(!backend.check_item_subscription(endpoint, &item).await.unwrap());

    backend.subscribe_item(&sub, &item).await.unwrap();
    backend.unsubscribe(endpoint).await.unwrap();
    let store = store.lock();
    assert!(store.devices.is_empty());
    assert!(store.items.is_empty());
}

#[tokio::test]
async fn server_error_message_is_kept() {
    let (addr, _) = serve().await;
    let backend = HttpBackend::new(&format!("http://{}", addr)).unwrap();
    let sub = subscription("https://push.example.net/send/1");

    let err = backend
        .subscribe_item(&sub, &ItemRef::event("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 404, .. }));
    assert_eq!(err.server_message(), Some("Event not found"));

    let mut bad = sub.clone();
    bad.keys.auth.clear();
    let err = backend.subscribe(&bad).await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 400, .. }));
    assert_eq!(err.server_message(), Some("Invalid subscription object"));
}

#[tokio::test]
async fn unknown_route_and_bad_body_are_errors() {
    let (addr, _) = serve().await;

    let backend = HttpBackend::new(&format!("http://{}/nowhere", addr)).unwrap();
    let err = backend.unsubscribe("https://push.example.net/send/1").await.unwrap_err();
    assert!(matches!(err, BackendError::Status { status: 404, message: None }));

    let backend = HttpBackend::new(&format!("http://{}/broken", addr)).unwrap();
    let err = backend.vapid_public_key().await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{}", addr)).unwrap();
    let err = backend.vapid_public_key().await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
}
