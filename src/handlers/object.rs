use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::server::AppState;
use crate::storage::PutOptions;
use crate::xml;

use super::{is_not_modified, not_modified_response, object_response, parse_range};

fn custom_meta_from_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (name, value) in headers {
        if let Some(meta_name) = name.as_str().strip_prefix("x-amz-meta-") {
            if let Ok(value) = value.to_str() {
                out.push((meta_name.to_string(), value.to_string()));
            }
        }
    }
    out
}

fn put_options_from_headers(headers: &HeaderMap) -> PutOptions {
    PutOptions {
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        content_encoding: headers
            .get("content-encoding")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        content_disposition: headers
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        custom_meta: custom_meta_from_headers(headers),
    }
}

/// Serves the configured `errorDocument` with a `404`, or a fixed HTML
/// fallback if none is configured or it too is missing.
pub(super) async fn static_site_fallback(state: &AppState, bucket: &str) -> Response {
    if let Some(error_doc) = state.config.error_document.clone() {
        if let Ok((meta, reader, _len)) = state.store.get_object(bucket, &error_doc, None).await {
            let stream = tokio_util::io::ReaderStream::new(reader);
            let mut response = object_response(&meta, None, Some(Body::from_stream(stream)));
            *response.status_mut() = StatusCode::NOT_FOUND;
            return response;
        }
    }
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/html")
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::from("<html><body><h1>404 - Resource Not Found</h1></body></html>"))
        .unwrap()
}

fn redirect_response(state: &AppState, headers: &HeaderMap, key: &str) -> Option<Response> {
    let rule = state.config.routing_rule.as_ref()?;
    let host = rule.host_name.clone().unwrap_or_else(|| {
        headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:{}", state.config.hostname, state.config.port))
    });
    let location = format!(
        "{}://{}/{}{}",
        rule.protocol, host, rule.replace_key_prefix_with, key
    );
    let status = StatusCode::from_u16(rule.http_redirect_code).unwrap_or(StatusCode::MOVED_PERMANENTLY);
    Some(
        Response::builder()
            .status(status)
            .header("Location", location)
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::empty())
            .unwrap(),
    )
}

async fn get_miss_response(state: &AppState, bucket: &str, key: &str, headers: &HeaderMap) -> Response {
    if let Some(response) = redirect_response(state, headers, key) {
        return response;
    }
    if let Some(index) = state.config.index_document.clone() {
        let retry_key = format!("{}/{}", key.trim_end_matches('/'), index);
        if let Ok((meta, reader, _len)) = state.store.get_object(bucket, &retry_key, None).await {
            let stream = tokio_util::io::ReaderStream::new(reader);
            return object_response(&meta, None, Some(Body::from_stream(stream)));
        }
    }
    static_site_fallback(state, bucket).await
}

async fn fetch_and_respond(
    state: &AppState,
    bucket: &str,
    key: &str,
    headers: &HeaderMap,
    include_body: bool,
) -> Response {
    let meta = match state.store.head_object(bucket, key).await {
        Ok(meta) => meta,
        Err(Error::NoSuchKey(_)) => return get_miss_response(state, bucket, key, headers).await,
        Err(err) => return err.into_response(),
    };

    if is_not_modified(headers, &meta) {
        return not_modified_response();
    }

    let range = headers
        .get("range")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, meta.size));

    if !include_body {
        return object_response(&meta, range, None);
    }

    match state.store.get_object(bucket, key, range).await {
        Ok((meta, reader, _len)) => {
            let stream = tokio_util::io::ReaderStream::new(reader);
            object_response(&meta, range, Some(Body::from_stream(stream)))
        }
        Err(err) => err.into_response(),
    }
}

/// `GET /<bucket>/<key>`.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    debug!(bucket = %bucket, key = %key, "GET object");
    if params.contains_key("acl") {
        if let Err(err) = state.store.head_object(&bucket, &key).await {
            return err.into_response();
        }
        return Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/xml")
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::from(xml::build_acl()))
            .unwrap();
    }
    fetch_and_respond(&state, &bucket, &key, &headers, true).await
}

/// `HEAD /<bucket>/<key>` — identical to GET without the body.
pub async fn head_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    fetch_and_respond(&state, &bucket, &key, &headers, false).await
}

fn parse_copy_source(header: &str) -> Option<(String, String)> {
    let trimmed = header.trim_start_matches('/');
    let (bucket, key) = trimmed.split_once('/')?;
    Some((bucket.to_string(), key.to_string()))
}

/// `PUT /<bucket>/<key>` — upload, or copy when `x-amz-copy-source` is
/// present.
pub async fn put_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    if let Some(copy_source) = headers.get("x-amz-copy-source").and_then(|v| v.to_str().ok()) {
        let Some((src_bucket, src_key)) = parse_copy_source(copy_source) else {
            return Error::InternalError("malformed x-amz-copy-source".to_string()).into_response();
        };
        if state.store.get_bucket(&src_bucket).await.is_err() {
            return Error::NoSuchBucket(src_bucket).into_response();
        }
        if !state.store.object_exists(&src_bucket, &src_key).await {
            return Error::NoSuchKey(src_key).into_response();
        }

        let replace_metadata = headers
            .get("x-amz-metadata-directive")
            .and_then(|v| v.to_str().ok())
            == Some("REPLACE");
        let opts = replace_metadata.then(|| put_options_from_headers(&headers));

        return match state
            .store
            .copy_object(&src_bucket, &src_key, &bucket, &key, opts)
            .await
        {
            Ok(meta) => {
                info!(bucket = %bucket, key = %key, src = %src_key, "object copied");
                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", "application/xml")
                    .header("Access-Control-Allow-Origin", "*")
                    .body(Body::from(xml::build_copy_object(&meta.md5, meta.modified)))
                    .unwrap()
            }
            Err(err) => err.into_response(),
        };
    }

    let opts = put_options_from_headers(&headers);
    let stream = body.into_data_stream();
    let mut reader = tokio_util::io::StreamReader::new(
        futures_util::TryStreamExt::map_err(stream, |e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    );

    match state.store.put_object(&bucket, &key, &mut reader, opts).await {
        Ok(meta) => {
            info!(bucket = %bucket, key = %key, size = meta.size, "object stored");
            Response::builder()
                .status(StatusCode::OK)
                .header("ETag", format!("\"{}\"", meta.md5))
                .header("Access-Control-Allow-Origin", "*")
                .body(Body::empty())
                .unwrap()
        }
        Err(err) => {
            warn!(bucket = %bucket, key = %key, "put_object failed");
            err.into_response()
        }
    }
}

/// `POST /<bucket>/<key>` — form-style upload, same semantics as PUT
/// without copy support.
pub async fn post_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    let opts = put_options_from_headers(&headers);
    let stream = body.into_data_stream();
    let mut reader = tokio_util::io::StreamReader::new(
        futures_util::TryStreamExt::map_err(stream, |e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    );

    match state.store.put_object(&bucket, &key, &mut reader, opts).await {
        Ok(meta) => Response::builder()
            .status(StatusCode::OK)
            .header("ETag", format!("\"{}\"", meta.md5))
            .header("Access-Control-Allow-Origin", "*")
            .body(Body::empty())
            .unwrap(),
        Err(err) => err.into_response(),
    }
}

/// `DELETE /<bucket>/<key>`.
pub async fn delete_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.delete_object(&bucket, &key).await {
        Ok(()) => {
            info!(bucket = %bucket, key = %key, "object deleted");
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header("Access-Control-Allow-Origin", "*")
                .body(Body::empty())
                .unwrap()
        }
        Err(err) => err.into_response(),
    }
}
