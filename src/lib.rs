pub mod appresult;
pub mod config;
pub mod db;
pub mod error;
pub mod relay;
pub mod rooms;

use std::sync::Arc;

use axum::{debug_handler, extract::FromRef, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use error::{RelayError, RelayResult};

use relay::{BroadcastEngine, Registry};
use rooms::{MessageStore, RoomStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub rooms: RoomStore,
    pub messages: MessageStore,
    pub registry: Arc<Registry>,
    pub engine: BroadcastEngine,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: &Config) -> Self {
        let rooms = RoomStore::new(db_pool.clone());
        let messages = MessageStore::new(db_pool);
        let registry = Arc::new(Registry::new(config.idle_threshold, config.send_queue));
        let engine = BroadcastEngine::new(Arc::clone(&registry), rooms.clone(), messages.clone());

        Self { rooms, messages, registry, engine }
    }
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/chatrooms", rooms::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[debug_handler]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::{Request, StatusCode}, response::Response};
    use tower::ServiceExt;

    use super::*;

    async fn state() -> AppState {
        AppState::new(db::memory().await, &Config::default())
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_room(state: &AppState, name: &str) -> Value {
        let resp = app(state.clone())
            .oneshot(request("POST", "/chatrooms", Some(json!({ "name": name }))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        json_body(resp).await
    }

    #[tokio::test]
    async fn health_is_ok() {
        let resp = app(state().await).oneshot(request("GET", "/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn room_crud() {
        let state = state().await;
        let room = create_room(&state, "lobby").await;
        let id = room["id"].as_str().unwrap();

        let resp = app(state.clone()).oneshot(request("GET", &format!("/chatrooms/{id}"), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched = json_body(resp).await;
        assert_eq!(fetched["name"], "lobby");
        assert_eq!(fetched["active"], false);

        let resp = app(state.clone())
            .oneshot(request("PUT", &format!("/chatrooms/{id}"), Some(json!({ "name": "hall", "description": "big" }))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["name"], "hall");

        let resp = app(state.clone()).oneshot(request("GET", "/chatrooms", None)).await.unwrap();
        assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

        let resp = app(state.clone()).oneshot(request("DELETE", &format!("/chatrooms/{id}"), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app(state).oneshot(request("GET", &format!("/chatrooms/{id}"), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_room_is_404_everywhere() {
        let state = state().await;
        for (method, uri, body) in [
            ("GET", "/chatrooms/ghost", None),
            ("PUT", "/chatrooms/ghost", Some(json!({ "name": "x" }))),
            ("DELETE", "/chatrooms/ghost", None),
            ("GET", "/chatrooms/ghost/messages", None),
            ("POST", "/chatrooms/ghost/messages", Some(json!({ "nickname": "bob", "content": "hi" }))),
        ] {
            let resp = app(state.clone()).oneshot(request(method, uri, body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
            assert!(json_body(resp).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn bad_bodies_are_400_with_json_error() {
        let state = state().await;
        let room = create_room(&state, "lobby").await;
        let id = room["id"].as_str().unwrap();

        let malformed = Request::builder()
            .method("POST")
            .uri("/chatrooms")
            .header("content-type", "application/json")
            .body(Body::from("{"))
            .unwrap();
        let resp = app(state.clone()).oneshot(malformed).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(resp).await["error"].is_string());

        for (method, uri) in [("POST", "/chatrooms".to_owned()), ("PUT", format!("/chatrooms/{id}"))] {
            let resp = app(state.clone()).oneshot(request(method, &uri, Some(json!({})))).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{method} {uri}");
            assert!(json_body(resp).await["error"].is_string());
        }

        let resp = app(state).oneshot(request("POST", &format!("/chatrooms/{id}/messages"), Some(json!([1])))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reposting_a_seen_message_id_gets_a_fresh_one() {
        let state = state().await;
        let lobby = create_room(&state, "lobby").await;
        let hall = create_room(&state, "hall").await;

        let mut ids = Vec::new();
        for room in [&lobby, &lobby, &hall] {
            let uri = format!("/chatrooms/{}/messages", room["id"].as_str().unwrap());
            let resp = app(state.clone())
                .oneshot(request("POST", &uri, Some(json!({ "id": "dup", "nickname": "bob", "content": "hi" }))))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
            ids.push(json_body(resp).await["id"].as_str().unwrap().to_owned());
        }

        assert!(ids.iter().all(|id| id != "dup"));
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[tokio::test]
    async fn posted_message_is_persisted_and_fanned_out() {
        let state = state().await;
        let room = create_room(&state, "lobby").await;
        let id = room["id"].as_str().unwrap();

        let (handle, mut rx) = state.registry.connection();
        state.registry.join(id, handle);

        let resp = app(state.clone())
            .oneshot(request("POST", &format!("/chatrooms/{id}/messages"), Some(json!({ "nickname": "bob", "content": "hi" }))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let msg = json_body(resp).await;
        assert_eq!(msg["chatroom_id"], id);
        assert!(!msg["id"].as_str().unwrap().is_empty());

        let frame: Value = serde_json::from_str(rx.try_recv().unwrap().as_str()).unwrap();
        assert_eq!(frame["id"], msg["id"]);

        let resp = app(state.clone()).oneshot(request("GET", &format!("/chatrooms/{id}/messages"), None)).await.unwrap();
        let backlog = json_body(resp).await;
        assert_eq!(backlog.as_array().unwrap().len(), 1);
        assert_eq!(backlog[0]["content"], "hi");

        let resp = app(state).oneshot(request("GET", &format!("/chatrooms/{id}/active"), None)).await.unwrap();
        assert_eq!(json_body(resp).await["active"], true);
    }
}
