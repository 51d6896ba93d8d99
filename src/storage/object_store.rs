//! Bucket and object operations on top of [`FsAdapter`]. Each bucket is
//! a directory under the configured root; each object is a file at
//! `<root>/<bucket>/<key>`, with a JSON sidecar at
//! `<root>/<bucket>/<key>.metadata.json` written strictly after the
//! body. That ordering is the linearization point readers rely on: if
//! the sidecar exists, the body behind it is complete.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

use super::fs_adapter::FsAdapter;
use super::{Bucket, ListOptions, ListResult, ObjectMeta, PutOptions};

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_disposition: Option<String>,
    #[serde(default)]
    custom_meta: Vec<(String, String)>,
    md5: String,
    size: u64,
    modified: DateTime<Utc>,
}

pub struct ObjectStore {
    root: PathBuf,
    fs: FsAdapter,
}

/// Maps a filesystem error to `not_found` only when it genuinely reflects a
/// missing path; any other `io::Error` (permission denied, disk failure, ...)
/// surfaces as `Error::Io` so it reports as a `500` rather than a `404`.
fn not_found_or_io(e: std::io::Error, not_found: Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        not_found
    } else {
        Error::Io(e)
    }
}

fn validate_key(key: &str) -> Result<()> {
    use std::path::Component;
    if key.is_empty() {
        return Err(Error::NoSuchKey(key.to_string()));
    }
    let escapes = Path::new(key)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(Error::NoSuchKey(key.to_string()));
    }
    Ok(())
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fs: FsAdapter::new(),
        }
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_path(bucket).join(key)
    }

    fn sidecar_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut os = self.object_path(bucket, key).into_os_string();
        os.push(".metadata.json");
        PathBuf::from(os)
    }

    // --- buckets ---------------------------------------------------

    pub async fn get_bucket(&self, name: &str) -> Result<Bucket> {
        let path = self.bucket_path(name);
        let meta = self
            .fs
            .metadata(&path)
            .await
            .map_err(|e| not_found_or_io(e, Error::NoSuchBucket(name.to_string())))?;
        if !meta.is_dir() {
            return Err(Error::NoSuchBucket(name.to_string()));
        }
        let creation_date = meta
            .created()
            .or_else(|_| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Bucket {
            name: name.to_string(),
            creation_date,
        })
    }

    pub async fn bucket_exists(&self, name: &str) -> bool {
        self.get_bucket(name).await.is_ok()
    }

    pub async fn get_buckets(&self) -> Result<Vec<Bucket>> {
        self.fs.create_dir_all(&self.root).await.map_err(Error::Io)?;
        let names = self.fs.read_dir_names(&self.root).await.map_err(Error::Io)?;
        let mut buckets = Vec::new();
        for name in names {
            if let Ok(bucket) = self.get_bucket(&name).await {
                buckets.push(bucket);
            }
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    pub async fn put_bucket(&self, name: &str) -> Result<()> {
        if self.bucket_exists(name).await {
            return Err(Error::BucketAlreadyExists(name.to_string()));
        }
        self.fs
            .create_dir_all(&self.bucket_path(name))
            .await
            .map_err(Error::Io)
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.get_bucket(name).await?;
        let path = self.bucket_path(name);
        let children = self.fs.read_dir_names(&path).await.map_err(Error::Io)?;
        if !children.is_empty() {
            return Err(Error::BucketNotEmpty(name.to_string()));
        }
        self.fs.remove_dir(&path).await.map_err(Error::Io)
    }

    // --- objects -----------------------------------------------------

    async fn load_sidecar(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        let raw = self
            .fs
            .read_to_vec(&self.sidecar_path(bucket, key))
            .await
            .map_err(|e| not_found_or_io(e, Error::NoSuchKey(key.to_string())))?;
        let sidecar: Sidecar =
            serde_json::from_slice(&raw).map_err(|e| Error::InternalError(e.to_string()))?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: sidecar.size,
            md5: sidecar.md5,
            modified: sidecar.modified,
            content_type: sidecar.content_type,
            content_encoding: sidecar.content_encoding,
            content_disposition: sidecar.content_disposition,
            custom_meta: sidecar.custom_meta,
        })
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        validate_key(key)?;
        self.get_bucket(bucket).await?;
        self.load_sidecar(bucket, key).await
    }

    /// Returns the object's metadata and an async reader over its body,
    /// optionally limited to an inclusive byte range.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<(ObjectMeta, tokio::io::Take<tokio::fs::File>, u64)> {
        let meta = self.head_object(bucket, key).await?;
        let (reader, len) = self
            .fs
            .open_read(&self.object_path(bucket, key), range)
            .await
            .map_err(|e| not_found_or_io(e, Error::NoSuchKey(key.to_string())))?;
        Ok((meta, reader, len))
    }

    pub async fn put_object<R: AsyncRead + Unpin>(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut R,
        opts: PutOptions,
    ) -> Result<ObjectMeta> {
        validate_key(key)?;
        self.get_bucket(bucket).await?;

        let (size, md5) = self
            .fs
            .write_atomic(&self.object_path(bucket, key), reader)
            .await
            .map_err(Error::Io)?;
        let modified = Utc::now();
        let content_type = opts
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let sidecar = Sidecar {
            content_type: content_type.clone(),
            content_encoding: opts.content_encoding.clone(),
            content_disposition: opts.content_disposition.clone(),
            custom_meta: opts.custom_meta.clone(),
            md5: md5.clone(),
            size,
            modified,
        };
        let encoded =
            serde_json::to_vec(&sidecar).map_err(|e| Error::InternalError(e.to_string()))?;
        self.fs
            .write_atomic_bytes(&self.sidecar_path(bucket, key), &encoded)
            .await
            .map_err(Error::Io)?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            md5,
            modified,
            content_type,
            content_encoding: opts.content_encoding,
            content_disposition: opts.content_disposition,
            custom_meta: opts.custom_meta,
        })
    }

    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        replace: Option<PutOptions>,
    ) -> Result<ObjectMeta> {
        let src_meta = self.head_object(src_bucket, src_key).await?;
        let (mut reader, _len) = self
            .fs
            .open_read(&self.object_path(src_bucket, src_key), None)
            .await
            .map_err(|e| not_found_or_io(e, Error::NoSuchKey(src_key.to_string())))?;

        let opts = replace.unwrap_or(PutOptions {
            content_type: Some(src_meta.content_type.clone()),
            content_encoding: src_meta.content_encoding.clone(),
            content_disposition: src_meta.content_disposition.clone(),
            custom_meta: src_meta.custom_meta.clone(),
        });

        self.put_object(dst_bucket, dst_key, &mut reader, opts).await
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        validate_key(key)?;
        let object_path = self.object_path(bucket, key);
        self.fs
            .remove_file(&object_path)
            .await
            .map_err(|e| not_found_or_io(e, Error::NoSuchKey(key.to_string())))?;
        let _ = self.fs.remove_file(&self.sidecar_path(bucket, key)).await;
        Ok(())
    }

    pub async fn object_exists(&self, bucket: &str, key: &str) -> bool {
        self.fs.exists(&self.object_path(bucket, key)).await
    }

    fn collect_keys<'a>(
        &'a self,
        bucket_dir: &'a Path,
        rel: PathBuf,
        keys: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
        Box::pin(async move {
            let dir = bucket_dir.join(&rel);
            let names = self.fs.read_dir_names(&dir).await.map_err(Error::Io)?;
            for name in names {
                if name.starts_with('.') || name.ends_with(".metadata.json") {
                    continue;
                }
                let child_rel = rel.join(&name);
                let full = bucket_dir.join(&child_rel);
                let meta = self.fs.metadata(&full).await.map_err(Error::Io)?;
                if meta.is_dir() {
                    self.collect_keys(bucket_dir, child_rel, keys).await?;
                } else {
                    keys.push(child_rel.to_string_lossy().replace('\\', "/"));
                }
            }
            Ok(())
        })
    }

    /// Implements the listing algorithm: walk the bucket, sort keys
    /// lexicographically, then apply marker/prefix/delimiter windowing
    /// with common-prefix de-duplication.
    pub async fn get_objects(&self, bucket: &str, opts: &ListOptions) -> Result<ListResult> {
        self.get_bucket(bucket).await?;
        let bucket_dir = self.bucket_path(bucket);

        let mut keys = Vec::new();
        self.collect_keys(&bucket_dir, PathBuf::new(), &mut keys)
            .await?;
        keys.sort();

        let prefix = opts.prefix.as_deref().unwrap_or("");
        let max_keys = if opts.max_keys == 0 { 1000 } else { opts.max_keys };

        let mut objects = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        let mut is_truncated = false;

        for key in keys {
            if let Some(marker) = &opts.marker {
                if key.as_str() <= marker.as_str() {
                    continue;
                }
            }
            if !key.starts_with(prefix) {
                continue;
            }

            let mut new_common_prefix = None;
            if let Some(delim) = &opts.delimiter {
                if !delim.is_empty() {
                    if let Some(pos) = key[prefix.len()..].find(delim.as_str()) {
                        let end = prefix.len() + pos + delim.len();
                        let common = key[..end].to_string();
                        if seen_prefixes.contains(&common) {
                            continue;
                        }
                        new_common_prefix = Some(common);
                    }
                }
            }

            if objects.len() + common_prefixes.len() >= max_keys {
                is_truncated = true;
                break;
            }

            if let Some(common) = new_common_prefix {
                seen_prefixes.insert(common.clone());
                common_prefixes.push(common);
                continue;
            }

            objects.push(self.load_sidecar(bucket, &key).await?);
        }

        Ok(ListResult {
            objects,
            common_prefixes,
            is_truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_body_and_metadata() {
        let (_dir, store) = store();
        store.put_bucket("photos").await.unwrap();

        let body = b"hello".to_vec();
        let meta = store
            .put_object(
                "photos",
                "a/b.txt",
                &mut body.as_slice(),
                PutOptions {
                    content_type: Some("text/plain".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.md5, format!("{:x}", md5::compute(&body)));

        let (got, mut reader, len) = store.get_object("photos", "a/b.txt", None).await.unwrap();
        assert_eq!(got.content_type, "text/plain");
        assert_eq!(len, 5);
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buf)
            .await
            .unwrap();
        assert_eq!(buf, body);
    }

    #[tokio::test]
    async fn delete_bucket_refuses_when_not_empty() {
        let (_dir, store) = store();
        store.put_bucket("b").await.unwrap();
        store
            .put_object("b", "k", &mut &b""[..], PutOptions::default())
            .await
            .unwrap();

        let err = store.delete_bucket("b").await.unwrap_err();
        assert!(matches!(err, Error::BucketNotEmpty(_)));
    }

    #[tokio::test]
    async fn listing_applies_prefix_marker_and_delimiter() {
        let (_dir, store) = store();
        store.put_bucket("b").await.unwrap();
        for key in ["a/1", "a/2", "b/1", "root"] {
            store
                .put_object("b", key, &mut &b"x"[..], PutOptions::default())
                .await
                .unwrap();
        }

        let result = store
            .get_objects(
                "b",
                &ListOptions {
                    delimiter: Some("/".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.common_prefixes, vec!["a/".to_string(), "b/".to_string()]);
        assert_eq!(result.objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(), vec!["root"]);

        let result = store
            .get_objects(
                "b",
                &ListOptions {
                    prefix: Some("a/".into()),
                    marker: Some("a/1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(), vec!["a/2"]);
    }

    #[tokio::test]
    async fn copy_object_preserves_metadata_by_default() {
        let (_dir, store) = store();
        store.put_bucket("b").await.unwrap();
        store
            .put_object(
                "b",
                "src",
                &mut &b"payload"[..],
                PutOptions {
                    content_type: Some("text/csv".into()),
                    custom_meta: vec![("owner".into(), "alice".into())],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let copied = store.copy_object("b", "src", "b", "dst", None).await.unwrap();
        assert_eq!(copied.content_type, "text/csv");
        assert_eq!(copied.custom_meta, vec![("owner".to_string(), "alice".to_string())]);
        assert_eq!(copied.md5, format!("{:x}", md5::compute(b"payload")));
    }

    #[tokio::test]
    async fn rejects_path_traversal_keys() {
        let (_dir, store) = store();
        store.put_bucket("b").await.unwrap();
        let err = store
            .put_object("b", "../escape", &mut &b"x"[..], PutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchKey(_)));
    }
}
