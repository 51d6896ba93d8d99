use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::server::AppState;
use crate::storage::ListOptions;
use crate::xml;

use super::{is_valid_bucket_name, object_response};

#[derive(Deserialize, Debug, Default)]
pub struct ListQueryParams {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<usize>,
    pub delimiter: Option<String>,
}

/// `PUT /<bucket>` — create a bucket.
pub async fn create_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> impl IntoResponse {
    if !is_valid_bucket_name(&bucket) {
        return Error::InvalidBucketName(bucket).into_response();
    }
    match state.store.put_bucket(&bucket).await {
        Ok(()) => {
            info!(bucket = %bucket, "bucket created");
            Response::builder()
                .status(StatusCode::OK)
                .header("Location", format!("/{bucket}"))
                .header("Access-Control-Allow-Origin", "*")
                .body(Body::empty())
                .unwrap()
        }
        Err(err) => err.into_response(),
    }
}

/// `DELETE /<bucket>` — remove an empty bucket.
pub async fn delete_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_bucket(&bucket).await {
        Ok(()) => {
            info!(bucket = %bucket, "bucket deleted");
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header("Access-Control-Allow-Origin", "*")
                .body(Body::empty())
                .unwrap()
        }
        Err(err) => err.into_response(),
    }
}

/// `GET /<bucket>` — serve the static-site index document if configured,
/// otherwise list the bucket's contents.
pub async fn get_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(params): Query<ListQueryParams>,
) -> impl IntoResponse {
    if let Some(index) = state.config.index_document.clone() {
        return match state.store.get_object(&bucket, &index, None).await {
            Ok((meta, reader, len)) => {
                let stream = tokio_util::io::ReaderStream::new(reader);
                debug!(bucket = %bucket, key = %index, len, "serving index document");
                object_response(&meta, None, Some(Body::from_stream(stream)))
            }
            Err(Error::NoSuchKey(_)) => super::object::static_site_fallback(&state, &bucket).await,
            Err(err) => err.into_response(),
        };
    }

    let opts = ListOptions {
        prefix: params.prefix.clone(),
        marker: params.marker.clone(),
        max_keys: params.max_keys.unwrap_or(1000),
        delimiter: params.delimiter.clone(),
    };

    match state.store.get_objects(&bucket, &opts).await {
        Ok(result) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/xml")
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::from(xml::build_bucket_query(&bucket, &opts, &result)))
            .unwrap(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteObjectEntry {
    #[serde(rename = "Key")]
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Delete")]
struct DeleteRequest {
    #[serde(rename = "Object", default)]
    object: Vec<DeleteObjectEntry>,
}

/// `POST /<bucket>?delete` — batch delete. Checks every key exists
/// before deleting any of them; a single missing key aborts the whole
/// request with no deletes performed.
pub async fn batch_delete(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let request: DeleteRequest = match serde_xml_rs::from_reader(body.as_ref()) {
        Ok(req) => req,
        Err(e) => {
            return Error::InternalError(e.to_string()).into_response();
        }
    };
    let keys: Vec<String> = request.object.into_iter().map(|o| o.key).collect();

    for key in &keys {
        if !state.store.object_exists(&bucket, key).await {
            return Error::NoSuchKey(key.clone()).into_response();
        }
    }

    for key in &keys {
        if let Err(err) = state.store.delete_object(&bucket, key).await {
            warn!(bucket = %bucket, key = %key, "batch delete failed mid-way");
            return err.into_response();
        }
    }

    info!(bucket = %bucket, count = keys.len(), "batch delete completed");
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml")
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::from(xml::build_objects_deleted(&keys)))
        .unwrap()
}
