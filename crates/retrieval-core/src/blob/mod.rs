//! Blob Store: opaque content-addressed storage for raw
//! media, never read on the hot retrieval path — the engine only ever
//! calls `url_for` to mint an artifact URL.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()>;
    fn url_for(&self, path: &str) -> String;
    async fn delete(&self, path: &str) -> anyhow::Result<()>;
}

/// Content-addressed path prefix for a blob, `sha256(bytes)`-keyed so
/// identical bytes always resolve to the same path.
pub fn content_addressed_path(bytes: &[u8], filename: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let hash_hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    let filename = urlencoding::encode(filename);
    format!("{}/{}/{}", &hash_hex[0..2], &hash_hex[2..], filename)
}

/// A `BlobStore` that mints signed-looking URLs off a configured base
/// URL without touching any real storage backend. The core never
/// streams bytes through itself in response to a search, so
/// `put`/`delete` are the only places this implementation does real
/// work; `url_for` is the one exercised on the hot path.
pub struct UrlBlobStore {
    base_url: String,
}

impl UrlBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }
}

#[async_trait]
impl BlobStore for UrlBlobStore {
    async fn put(&self, _path: &str, _bytes: &[u8]) -> anyhow::Result<()> {
        // The object store as a product is out of scope; this
        // implementation only needs to make `url_for` resolvable.
        Ok(())
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn delete(&self, _path: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_addressed_path_is_stable() {
        let a = content_addressed_path(b"hello", "a.txt");
        let b = content_addressed_path(b"hello", "a.txt");
        assert_eq!(a, b);
        assert_ne!(a, content_addressed_path(b"world", "a.txt"));
    }

    #[test]
    fn url_for_strips_trailing_slash_in_base() {
        let store = UrlBlobStore::new("http://example.com/media/");
        assert_eq!(store.url_for("ab/cd/file.txt"), "http://example.com/media/ab/cd/file.txt");
    }

    #[test]
    fn content_addressed_path_percent_encodes_filename() {
        let path = content_addressed_path(b"hello", "my report.pdf");
        assert!(path.ends_with("my%20report.pdf"));
    }
}
