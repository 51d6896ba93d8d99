use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::server::AppState;
use crate::xml;

/// `GET /` — list every bucket under the configured root.
pub async fn list_buckets(State(state): State<AppState>) -> impl IntoResponse {
    debug!("listing buckets");
    match state.store.get_buckets().await {
        Ok(buckets) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/xml")
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::from(xml::build_buckets(&buckets)))
            .unwrap(),
        Err(err) => err.into_response(),
    }
}
