use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::signal;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::handlers::{bucket, object, root};
use crate::storage::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ObjectStore>,
    pub config: Arc<ServerConfig>,
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let store = Arc::new(ObjectStore::new(config.directory.clone()));
    store.get_buckets().await?; // ensures the root directory exists

    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };

    let app = build_app(state);
    let addr = SocketAddr::new(
        config
            .hostname
            .parse()
            .unwrap_or_else(|_| [127, 0, 0, 1].into()),
        config.port,
    );

    info!("rustbucket listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root::list_buckets))
        .route(
            "/:bucket",
            get(bucket::get_bucket)
                .put(bucket::create_bucket)
                .delete(bucket::delete_bucket)
                .post(bucket::batch_delete),
        )
        .route(
            "/:bucket/",
            get(bucket::get_bucket)
                .put(bucket::create_bucket)
                .delete(bucket::delete_bucket),
        )
        .route(
            "/:bucket/*key",
            get(object::get_object)
                .head(object::head_object)
                .put(object::put_object)
                .post(object::post_object)
                .delete(object::delete_object),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    use crate::config::RoutingRule;

    fn state_with(build: impl FnOnce(ServerConfig) -> ServerConfig) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let config = build(ServerConfig::new(dir.path()));
        let store = Arc::new(ObjectStore::new(dir.path()));
        (
            dir,
            AppState {
                store,
                config: Arc::new(config),
            },
        )
    }

    fn test_state() -> (tempfile::TempDir, AppState) {
        state_with(|config| config)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_bucket_round_trips_through_the_router() {
        let (_dir, state) = test_state();
        let app = build_app(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/photos")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn object_get_on_missing_bucket_is_not_found_even_with_a_routing_rule() {
        let (_dir, state) = state_with(|config| {
            config.routing_rule(RoutingRule {
                protocol: "https".to_string(),
                host_name: Some("example.com".to_string()),
                replace_key_prefix_with: "new/".to_string(),
                http_redirect_code: 301,
            })
        });
        let app = build_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/missing-bucket/old")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("NoSuchBucket"));
    }

    #[tokio::test]
    async fn object_head_on_missing_bucket_is_not_found_rather_than_redirected() {
        let (_dir, state) = state_with(|config| {
            config.routing_rule(RoutingRule {
                protocol: "https".to_string(),
                host_name: Some("example.com".to_string()),
                replace_key_prefix_with: "new/".to_string(),
                http_redirect_code: 301,
            })
        });
        let app = build_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("HEAD")
                    .uri("/missing-bucket/old")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bucket_get_on_missing_bucket_is_not_found_even_with_an_index_document() {
        let (_dir, state) = state_with(|config| config.index_document("index.html"));
        let app = build_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/missing-bucket")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("NoSuchBucket"));
    }

    #[tokio::test]
    async fn object_acl_query_on_missing_bucket_is_not_found() {
        let (_dir, state) = test_state();
        let app = build_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/missing-bucket/key?acl")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("NoSuchBucket"));
    }

    #[tokio::test]
    async fn static_site_fallback_still_serves_error_document_for_a_missing_key() {
        let (_dir, state) = state_with(|config| config.error_document("404.html"));
        state.store.put_bucket("site").await.unwrap();
        state
            .store
            .put_object(
                "site",
                "404.html",
                &mut &b"not found here"[..],
                crate::storage::PutOptions::default(),
            )
            .await
            .unwrap();
        let app = build_app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/site/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "not found here");
    }
}
