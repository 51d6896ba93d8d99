//! Thin async wrapper around `tokio::fs`. Every write goes through a
//! temp-file-then-rename so a reader never observes a partially written
//! file; every hash is computed while the bytes stream past rather than
//! after buffering the whole body.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, Take};
use uuid::Uuid;

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".tmp-{}", Uuid::new_v4()));
    PathBuf::from(name)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsAdapter;

impl FsAdapter {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(path).await
    }

    pub async fn remove_dir(&self, path: &Path) -> std::io::Result<()> {
        fs::remove_dir(path).await
    }

    pub async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        fs::remove_file(path).await
    }

    pub async fn metadata(&self, path: &Path) -> std::io::Result<std::fs::Metadata> {
        fs::metadata(path).await
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    pub async fn read_dir_names(&self, path: &Path) -> std::io::Result<Vec<String>> {
        let mut entries = fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Opens `path` for reading, optionally limited to an inclusive byte
    /// range. Returns the limited reader along with the number of bytes
    /// it will yield.
    pub async fn open_read(
        &self,
        path: &Path,
        range: Option<(u64, u64)>,
    ) -> std::io::Result<(Take<fs::File>, u64)> {
        let mut file = fs::File::open(path).await?;
        let total = file.metadata().await?.len();
        let (start, len) = match range {
            Some((start, end)) => (start, end.saturating_sub(start) + 1),
            None => (0, total),
        };
        if start > 0 {
            file.seek(std::io::SeekFrom::Start(start)).await?;
        }
        Ok((file.take(len), len))
    }

    /// Streams `reader` into a temp file beside `path`, hashing as it
    /// goes, then renames into place. Returns `(size, md5_hex)`. Leaves
    /// no temp file behind on error.
    pub async fn write_atomic<R: AsyncRead + Unpin>(
        &self,
        path: &Path,
        reader: &mut R,
    ) -> std::io::Result<(u64, String)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = temp_path_for(path);

        let result: std::io::Result<(u64, String)> = async {
            let mut file = fs::File::create(&tmp).await?;
            let mut ctx = md5::Context::new();
            let mut total: u64 = 0;
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                file.write_all(&buf[..n]).await?;
                ctx.consume(&buf[..n]);
                total += n as u64;
            }
            file.flush().await?;
            Ok((total, format!("{:x}", ctx.compute())))
        }
        .await;

        match result {
            Ok(ok) => {
                fs::rename(&tmp, path).await?;
                Ok(ok)
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                Err(e)
            }
        }
    }

    /// Writes `data` to `path` via the same temp-then-rename sequence,
    /// for small payloads (metadata sidecars) that don't need streaming.
    pub async fn write_atomic_bytes(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = temp_path_for(path);
        if let Err(e) = fs::write(&tmp, data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub async fn read_to_vec(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        fs::read(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;

    #[tokio::test]
    async fn write_atomic_hashes_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("object");
        let adapter = FsAdapter::new();

        let data = b"hello world".to_vec();
        let (size, md5) = adapter
            .write_atomic(&path, &mut data.as_slice())
            .await
            .unwrap();

        assert_eq!(size, data.len() as u64);
        assert_eq!(md5, format!("{:x}", md5::compute(&data)));
        assert!(adapter.exists(&path).await);

        let mut leftovers = 0;
        for name in adapter.read_dir_names(dir.path()).await.unwrap() {
            if name != "object" {
                leftovers += 1;
            }
        }
        assert_eq!(leftovers, 0, "no temp file should survive a successful write");
    }

    #[tokio::test]
    async fn open_read_respects_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("object");
        let mut f = tokio::fs::File::create(&path).await.unwrap();
        f.write_all(b"0123456789").await.unwrap();
        f.flush().await.unwrap();

        let adapter = FsAdapter::new();
        let (mut reader, len) = adapter.open_read(&path, Some((2, 5))).await.unwrap();
        assert_eq!(len, 4);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"2345");
    }
}
