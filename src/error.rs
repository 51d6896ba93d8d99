use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("The specified bucket name is not valid: {0}")]
    InvalidBucketName(String),

    #[error("The specified bucket does not exist: {0}")]
    NoSuchBucket(String),

    #[error("The specified bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("The bucket you tried to delete is not empty: {0}")]
    BucketNotEmpty(String),

    #[error("The specified key does not exist: {0}")]
    NoSuchKey(String),

    #[error("We encountered an internal error, please try again: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidBucketName(_) => StatusCode::BAD_REQUEST,
            Error::NoSuchBucket(_) => StatusCode::NOT_FOUND,
            Error::BucketAlreadyExists(_) => StatusCode::CONFLICT,
            Error::BucketNotEmpty(_) => StatusCode::CONFLICT,
            Error::NoSuchKey(_) => StatusCode::NOT_FOUND,
            Error::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidBucketName(_) => "InvalidBucketName",
            Error::NoSuchBucket(_) => "NoSuchBucket",
            Error::BucketAlreadyExists(_) => "BucketAlreadyExists",
            Error::BucketNotEmpty(_) => "BucketNotEmpty",
            Error::NoSuchKey(_) => "NoSuchKey",
            Error::InternalError(_) | Error::Io(_) => "InternalError",
        }
    }

    fn resource(&self) -> &str {
        match self {
            Error::InvalidBucketName(name)
            | Error::NoSuchBucket(name)
            | Error::BucketAlreadyExists(name)
            | Error::BucketNotEmpty(name) => name,
            Error::NoSuchKey(key) => key,
            Error::InternalError(_) | Error::Io(_) => "",
        }
    }

    pub fn to_xml(&self) -> String {
        crate::xml::build_error(self.error_code(), &self.to_string(), self.resource())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("request failed: {}", self);
        } else {
            debug!("request rejected: {}", self);
        }

        let body = self.to_xml();
        Response::builder()
            .status(status)
            .header("Content-Type", "application/xml")
            .header("Access-Control-Allow-Origin", "*")
            .body(body.into())
            .unwrap()
    }
}
