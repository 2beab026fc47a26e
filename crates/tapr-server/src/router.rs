use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tapr_protocol::endpoints;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all tapr endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .route(endpoints::PUSH_PREPARE, post(handler::push_prepare_handler))
        .route(
            endpoints::PUSH,
            post(handler::push_handler).layer(DefaultBodyLimit::disable()),
        )
        .route(endpoints::PUSH_LOG, get(handler::push_log_handler))
        .route(endpoints::CHANGER_STATUS, get(handler::changer_status_handler))
        .route(endpoints::CHANGER_TRANSFER, post(handler::changer_transfer_handler))
        .route(endpoints::CHANGER_LOAD, post(handler::changer_load_handler))
        .route(endpoints::CHANGER_UNLOAD, post(handler::changer_unload_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use tapr_changer::{ChangerConfig, SimulatedChanger};
    use tapr_protocol::{PushBodyEncoder, PushPrepareResponse, PushResponse, WireError};
    use tapr_store::MemoryStore;
    use tapr_types::{PathName, Tx};
    use tower::util::ServiceExt;

    use crate::config::PushConfig;
    use crate::push::IoServer;

    fn app(store: &MemoryStore) -> (Router, IoServer) {
        let io = IoServer::new(Arc::new(store.clone()), PushConfig::default());
        (build_router(AppState::new(io.clone())), io)
    }

    async fn json_body<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = app(&MemoryStore::default());
        let response = app
            .oneshot(Request::builder().uri(endpoints::HEALTH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn info_reports_store() {
        let (app, _) = app(&MemoryStore::new("archive"));
        let response = app
            .oneshot(Request::builder().uri(endpoints::INFO).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let info: serde_json::Value = json_body(response).await;
        assert_eq!(info["store"]["name"], "archive");
        assert_eq!(info["store"]["backend"], "memory");
        assert_eq!(info["changer"], false);
    }

    #[tokio::test]
    async fn prepare_then_push_over_http() {
        let store = MemoryStore::default();
        let (app, io) = app(&store);

        let response = app
            .clone()
            .oneshot(post_json(endpoints::PUSH_PREPARE, serde_json::json!({"name": "vol1.tar"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let PushPrepareResponse { tx } = json_body(response).await;

        let body = PushBodyEncoder::new(tx).chunk(b"hello").chunk(b" world").finish();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(endpoints::PUSH)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let push: PushResponse = json_body(response).await;
        assert!(push.is_ok());
        assert_eq!(push.bytes_written, 11);

        assert_eq!(store.contents(&PathName::new("vol1.tar").unwrap()).unwrap(), b"hello world");
        assert!(io.table().is_empty());
    }

    #[tokio::test]
    async fn prepare_with_bad_name_is_400() {
        let (app, io) = app(&MemoryStore::default());
        let response = app
            .oneshot(post_json(endpoints::PUSH_PREPARE, serde_json::json!({"name": "a/../b"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let err: WireError = json_body(response).await;
        assert_eq!(err.kind, tapr_protocol::ErrorKind::Invalid);
        assert!(io.table().is_empty());
    }

    #[tokio::test]
    async fn push_with_truncated_tx_is_400() {
        let (app, _) = app(&MemoryStore::default());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(endpoints::PUSH)
                    .body(Body::from(vec![1u8, 2, 3]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn push_log_streams_ndjson() {
        let (app, _) = app(&MemoryStore::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(endpoints::push_log(&Tx::generate()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/x-ndjson");

        let mut frames = response.into_body().into_data_stream();
        let first = frames.next().await.unwrap().unwrap();
        let second = frames.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"{\"seq\":0}\n");
        assert_eq!(&second[..], b"{\"seq\":1}\n");
    }

    #[tokio::test]
    async fn push_log_rejects_bad_tx() {
        let (app, _) = app(&MemoryStore::default());
        let response = app
            .oneshot(Request::builder().uri("/v1/push/log/nothex").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn changer_status_without_changer_is_404() {
        let (app, _) = app(&MemoryStore::default());
        let response = app
            .oneshot(Request::builder().uri(endpoints::CHANGER_STATUS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn changer_load_and_status() {
        let io = IoServer::new(Arc::new(MemoryStore::default()), PushConfig::default());
        let cfg = ChangerConfig {
            volumes: vec!["A00001".into()],
            ..Default::default()
        };
        let changer = Arc::new(SimulatedChanger::from_config(&cfg).unwrap());
        let app = build_router(AppState::new(io).with_changer(changer));

        let response = app
            .clone()
            .oneshot(post_json(
                endpoints::CHANGER_LOAD,
                serde_json::json!({"src": {"category": "storage", "addr": 0}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(post_json(
                endpoints::CHANGER_LOAD,
                serde_json::json!({"src": {"category": "storage", "addr": 0}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(Request::builder().uri(endpoints::CHANGER_STATUS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status: serde_json::Value = json_body(response).await;
        assert_eq!(status["data-transfer"][0]["volume"]["serial"], "A00001");
    }

    #[tokio::test]
    async fn transfer_requires_destination() {
        let io = IoServer::new(Arc::new(MemoryStore::default()), PushConfig::default());
        let changer = Arc::new(SimulatedChanger::from_config(&ChangerConfig::default()).unwrap());
        let app = build_router(AppState::new(io).with_changer(changer));
        let response = app
            .oneshot(post_json(
                endpoints::CHANGER_TRANSFER,
                serde_json::json!({"src": {"category": "storage", "addr": 0}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
