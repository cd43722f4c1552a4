//! Filesystem-backed `ObjectStore` adapter (§6). Stores objects under
//! `{base_path}/{bucket}/{key}`, matching the `FilesystemBackend` pattern
//! used for note attachments, generalized to the `bucket`/`key` shape the
//! job pipeline's CSV import/export handlers expect.

use std::path::PathBuf;

use async_trait::async_trait;
use connectra_core::{Error, ObjectStore, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub struct FilesystemObjectStore {
    base_path: PathBuf,
    signing_key: Vec<u8>,
}

impl FilesystemObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            base_path: base_path.into(),
            signing_key: signing_key.into(),
        }
    }

    fn full_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.base_path.join(bucket).join(key)
    }

    fn sign(&self, bucket: &str, key: &str, expires_at: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|err| Error::ObjectStore(format!("invalid signing key: {err}")))?;
        mac.update(format!("{bucket}/{key}:{expires_at}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn read_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let path = self.full_path(bucket, key);
        debug!(bucket, key, path = %path.display(), "object_store: read_stream");
        let file = fs::File::open(&path).await.map_err(|err| {
            Error::ObjectStore(format!("read_stream {bucket}/{key}: {err}"))
        })?;
        Ok(Box::new(file))
    }

    async fn write_stream(
        &self,
        bucket: &str,
        key: &str,
        mut body: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
    ) -> Result<()> {
        let path = self.full_path(bucket, key);
        debug!(bucket, key, path = %path.display(), "object_store: write_stream");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                Error::ObjectStore(format!("create_dir_all {}: {err}", parent.display()))
            })?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|err| Error::ObjectStore(format!("create {bucket}/{key}: {err}")))?;
        tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|err| Error::ObjectStore(format!("copy {bucket}/{key}: {err}")))?;
        file.flush()
            .await
            .map_err(|err| Error::ObjectStore(format!("flush {bucket}/{key}: {err}")))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|err| Error::ObjectStore(format!("rename {bucket}/{key}: {err}")))?;
        Ok(())
    }

    async fn presigned_url(&self, bucket: &str, key: &str, ttl_secs: u64) -> Result<String> {
        let expires_at = chrono::Utc::now().timestamp() + ttl_secs as i64;
        let signature = self.sign(bucket, key, expires_at)?;
        Ok(format!(
            "/objects/{bucket}/{key}?expires={expires_at}&sig={signature}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_write_then_read_round_trips() {
        let dir = std::env::temp_dir().join(format!("connectra-objstore-test-{}", uuid::Uuid::new_v4()));
        let store = FilesystemObjectStore::new(&dir, b"test-signing-key".to_vec());

        let body: Box<dyn tokio::io::AsyncRead + Send + Unpin> =
            Box::new(std::io::Cursor::new(b"hello world".to_vec()));
        store.write_stream("exports", "job.csv", body).await.unwrap();

        let mut read_back = String::new();
        let mut stream = store.read_stream("exports", "job.csv").await.unwrap();
        stream.read_to_string(&mut read_back).await.unwrap();
        assert_eq!(read_back, "hello world");

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_presigned_url_contains_signature() {
        let store = FilesystemObjectStore::new(std::env::temp_dir(), b"key".to_vec());
        let url = store.presigned_url("bucket", "key.csv", 60).await.unwrap();
        assert!(url.contains("sig="));
    }
}
