use crate::cache::X_FROM_CACHE;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// A response as persisted on disk.
///
/// Headers are kept in wire order; values that are not visible ASCII are
/// dropped when the entry is created. `vary` records, for every header the
/// response varied on, the hex SHA-256 of the value the original request
/// carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "base64_body")]
    pub body: Bytes,
    #[serde(default)]
    pub vary: Vec<(String, Option<String>)>,
    pub stored_at: SystemTime,
}

impl CachedResponse {
    /// Snapshot a network response for storage.
    #[must_use]
    pub fn new(
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
        vary: Vec<(String, Option<String>)>,
        stored_at: SystemTime,
    ) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        Self {
            status: status.as_u16(),
            headers,
            body,
            vary,
            stored_at,
        }
    }

    /// First value of the named header, if any.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Rebuild the stored headers as a `HeaderMap`, skipping malformed pairs.
    #[must_use]
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }

    /// Replace stored headers with the ones a `304 Not Modified` carried.
    ///
    /// Body-describing headers are kept from the stored entry.
    pub fn merge_revalidation(&mut self, fresh: &HeaderMap, now: SystemTime) {
        let mut merged = self.header_map();
        for name in fresh.keys() {
            if is_body_header(name) {
                continue;
            }
            merged.remove(name);
            for value in fresh.get_all(name) {
                merged.append(name.clone(), value.clone());
            }
        }
        self.headers = Self::new(StatusCode::OK, &merged, Bytes::new(), Vec::new(), now).headers;
        self.stored_at = now;
    }

    /// Build a response replaying this entry, marked with `X-From-Cache: 1`.
    ///
    /// # Errors
    /// Returns `http::Error` if the stored status code is not valid.
    pub fn to_response(&self) -> Result<Response<ResponseBody>, http::Error> {
        let body: ResponseBody = Full::new(self.body.clone())
            .map_err(|never: Infallible| match never {})
            .boxed();
        let mut response = Response::builder()
            .status(StatusCode::from_u16(self.status)?)
            .body(body)?;
        *response.headers_mut() = self.header_map();
        response
            .headers_mut()
            .insert(X_FROM_CACHE, HeaderValue::from_static("1"));
        Ok(response)
    }
}

fn is_body_header(name: &HeaderName) -> bool {
    name == http::header::CONTENT_LENGTH
        || name == http::header::CONTENT_ENCODING
        || name == http::header::CONTENT_TYPE
        || name == http::header::TRANSFER_ENCODING
}

mod base64_body {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// A directory of cached responses, one file per cache key.
///
/// File names are the hex SHA-256 of the key. Writes go to a temporary
/// sibling file that is renamed into place, so concurrent readers in this
/// or another process see either the old entry or the new one. Clones share
/// the same directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: Arc<Path>,
}

impl DiskCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    ///
    /// On Unix the directory is restricted to its owner (`0700`), including
    /// one left behind with wider permissions.
    ///
    /// # Errors
    /// Returns the I/O error if the directory cannot be created or
    /// restricted, e.g. when `dir` exists as a regular file or belongs to
    /// another user.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        create_private_dir(&dir)?;
        tracing::debug!(dir = %dir.display(), "opened HTTP disk cache");
        Ok(Self { dir: dir.into() })
    }

    /// Root directory of the cache.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(Sha256::digest(key.as_bytes())))
    }

    /// Load the entry for `key`.
    ///
    /// Missing, unreadable and corrupt entries are all reported as a miss.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let path = self.entry_path(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unreadable cache entry");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "discarding corrupt cache entry");
                None
            }
        }
    }

    /// Store `entry` under `key`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns the I/O or serialization error; a failed write leaves the
    /// previous entry intact.
    pub async fn put(&self, key: &str, entry: &CachedResponse) -> io::Result<()> {
        let path = self.entry_path(key);
        let data = serde_json::to_vec(entry)?;

        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            hex::encode(&Sha256::digest(key.as_bytes())[..8]),
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let written = match write_private(&tmp, &data).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                tracing::debug!(path = %tmp.display(), error = %cleanup, "failed to remove temp cache file");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Delete the entry for `key`; a missing entry is not an error.
    ///
    /// # Errors
    /// Returns the I/O error if an existing entry cannot be removed.
    pub async fn remove(&self, key: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
        std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    std::fs::create_dir_all(dir)?;
    Ok(())
}

async fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.flush().await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn entry(body: &'static str) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("etag", HeaderValue::from_static("\"v1\""));
        CachedResponse::new(
            StatusCode::OK,
            &headers,
            Bytes::from_static(body.as_bytes()),
            vec![("accept".to_owned(), None)],
            UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        )
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("srclib-cache");

        let cache = DiskCache::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(cache.dir(), dir.as_path());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_and_entries_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("srclib-cache");
        std::fs::create_dir(&dir).unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cache = DiskCache::open(&dir).unwrap();
        cache.put("key", &entry("x")).await.unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dir), 0o700);
        assert_eq!(mode(&cache.entry_path("key")), 0o600);
    }

    #[test]
    fn test_open_fails_when_path_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(DiskCache::open(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        let stored = entry(r#"{"ok":true}"#);

        cache.put("https://sourcegraph.com/api/repos", &stored).await.unwrap();

        let loaded = cache.get("https://sourcegraph.com/api/repos").await.unwrap();
        assert_eq!(loaded, stored);
        assert!(cache.get("https://sourcegraph.com/api/other").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_file_named_by_key_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        cache.put("key", &entry("x")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![hex::encode(Sha256::digest(b"key"))]);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        std::fs::write(cache.entry_path("key"), b"not json").unwrap();

        assert!(cache.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        cache.put("key", &entry("x")).await.unwrap();

        cache.remove("key").await.unwrap();
        cache.remove("key").await.unwrap();
        assert!(cache.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_to_response_marks_cache_hit() {
        let resp = entry("hello").to_response().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[X_FROM_CACHE], "1");
        assert_eq!(resp.headers()["etag"], "\"v1\"");

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello");
    }

    #[test]
    fn test_merge_revalidation_keeps_body_headers() {
        let mut stored = entry("x");
        let mut fresh = HeaderMap::new();
        fresh.insert("etag", HeaderValue::from_static("\"v2\""));
        fresh.insert("content-length", HeaderValue::from_static("0"));
        let now = UNIX_EPOCH + Duration::from_secs(1_800_000_000);

        stored.merge_revalidation(&fresh, now);

        assert_eq!(stored.header("ETag"), Some("\"v2\""));
        assert_eq!(stored.header("content-type"), Some("application/json"));
        assert_eq!(stored.header("content-length"), None);
        assert_eq!(stored.stored_at, now);
    }
}
