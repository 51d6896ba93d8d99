pub mod fs_adapter;
pub mod object_store;

use chrono::{DateTime, Utc};

pub use object_store::ObjectStore;

/// A named container for objects; maps to one directory on disk.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub name: String,
    pub creation_date: DateTime<Utc>,
}

/// Metadata for a stored object. `custom_meta` preserves the order the
/// `x-amz-meta-*` headers arrived in.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub md5: String,
    pub modified: DateTime<Utc>,
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub custom_meta: Vec<(String, String)>,
}

/// Headers carried into a `putObject`/`copyObject` call.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub custom_meta: Vec<(String, String)>,
}

/// Options accepted by `getObjects`.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub max_keys: usize,
    pub delimiter: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            marker: None,
            max_keys: 1000,
            delimiter: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub objects: Vec<ObjectMeta>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
}
