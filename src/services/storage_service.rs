//! src/services/storage_service.rs
//!
//! StorageService — S3-like object operations backed entirely by the local
//! filesystem. There is no metadata database and no cache: a bucket is a
//! directory under `base_path`, an object is a regular file beneath it, and
//! every piece of metadata (size, timestamps) is re-read from the filesystem
//! on each call.

use crate::models::object::{DeletedObject, ObjectSummary, StoredObject, UploadedObject};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use std::{
    borrow::Cow,
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;
use tokio::fs::{self, File};
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("payload is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// StorageService provides the object lifecycle operations:
/// - Put an object (decodes a base64 payload and writes it to disk)
/// - Get an object (reads the file back as a base64 envelope plus metadata)
/// - Open an object for raw streaming (direct content serving)
/// - Delete an object
/// - List the direct-child objects of a bucket
///
/// Buckets are created lazily on first write. The object location is a pure
/// function of (bucket, key): `base_path/{bucket}/{key}`, with `/` separators
/// inside the key materialized as nested directories.
///
/// Concurrent writers to the same key race at the filesystem level with
/// last-writer-wins; concurrent put + delete on one key has no defined order.
#[derive(Clone)]
pub struct StorageService {
    /// Root directory under which all bucket directories live.
    pub base_path: PathBuf,

    /// Public URL prefix used to build object access URLs.
    pub base_url: String,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

impl StorageService {
    /// Create a new StorageService rooted at `base_path`, building access
    /// URLs against `base_url`.
    pub fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            base_url: base_url.into(),
        }
    }

    /// Percent-decode a key as received from the transport layer.
    ///
    /// Keys arrive URL-encoded when they carry spaces or non-ASCII
    /// characters; undecodable input is passed through unchanged.
    fn decode_key(key: &str) -> Cow<'_, str> {
        urlencoding::decode(key).unwrap_or_else(|_| key.into())
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty or oversized keys, keys that begin with `/`, and keys
    /// containing `..`, backslashes, or control bytes. Runs on the decoded
    /// key so percent-encoded traversal attempts are caught too.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StorageError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Validate that a bucket name is usable as a single path segment.
    ///
    /// This is deliberately looser than S3 naming rules: the simulator
    /// accepts any name that cannot escape `base_path` or embed separators.
    fn ensure_bucket_name_safe(&self, name: &str) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidBucketName {
                name: name.to_string(),
                reason: "cannot be empty".into(),
            });
        }
        if name.contains('/') || name.contains('\\') {
            return Err(StorageError::InvalidBucketName {
                name: name.to_string(),
                reason: "cannot contain path separators".into(),
            });
        }
        if name == "." || name == ".." {
            return Err(StorageError::InvalidBucketName {
                name: name.to_string(),
                reason: "cannot be a relative path segment".into(),
            });
        }
        if name.bytes().any(|b| b.is_ascii_control()) {
            return Err(StorageError::InvalidBucketName {
                name: name.to_string(),
                reason: "cannot contain control characters".into(),
            });
        }
        Ok(())
    }

    /// Compute the physical directory path for a bucket.
    ///
    /// This does not check for existence. Used for building object paths.
    fn bucket_root(&self, bucket: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(bucket);
        path
    }

    /// Construct the fully-qualified payload path for (bucket, key).
    ///
    /// Separators inside the key become nested directory segments beneath
    /// the bucket root. Parent directories may not exist yet.
    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.bucket_root(bucket);
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    /// Direct access URL form: `{base_url}/{bucket}/{key}`.
    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, key)
    }

    /// Explicit download URL form: `{base_url}/file/{bucket}/{key}`.
    fn download_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/file/{}/{}",
            self.base_url.trim_end_matches('/'),
            bucket,
            key
        )
    }

    /// Stat an existing object, mapping a missing file (or a directory
    /// sitting where a file was expected) to ObjectNotFound.
    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<FsMetadata> {
        let path = self.object_path(bucket, key);
        let meta = fs::metadata(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;
        if !meta.is_file() {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        FsMetadata::from_std(&meta).map_err(StorageError::Io)
    }

    /// Store an object, overwriting any previous payload at the same key.
    ///
    /// - Creates the bucket directory on demand (idempotent).
    /// - Creates any parent directories implied by `/` separators in the key.
    /// - Decodes the base64 payload; fails with InvalidEncoding on bad input.
    /// - Writes directly to the destination path (last-writer-wins, no
    ///   atomic rename).
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_base64: &str,
    ) -> StorageResult<UploadedObject> {
        self.ensure_bucket_name_safe(bucket)?;
        let key = Self::decode_key(key);
        self.ensure_key_safe(&key)?;

        let payload = general_purpose::STANDARD.decode(content_base64)?;

        let bucket_root = self.bucket_root(bucket);
        fs::create_dir_all(&bucket_root).await?;

        let file_path = self.object_path(bucket, &key);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file_path, &payload).await?;
        debug!("stored {} bytes at {}", payload.len(), file_path.display());

        let meta = self.stat_object(bucket, &key).await?;
        Ok(UploadedObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size_bytes: meta.size_bytes,
            content_type: content_type_for(&key).to_string(),
            last_modified: meta.last_modified,
            created: meta.created,
            url: self.object_url(bucket, &key),
            download_url: self.download_url(bucket, &key),
        })
    }

    /// Fetch an object as a base64 envelope plus derived metadata.
    ///
    /// The file's existence is checked before reading so a missing object
    /// surfaces as ObjectNotFound rather than a raw I/O error.
    pub async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        self.ensure_bucket_name_safe(bucket)?;
        let key = Self::decode_key(key);
        self.ensure_key_safe(&key)?;

        let meta = self.stat_object(bucket, &key).await?;
        let file_path = self.object_path(bucket, &key);
        let bytes = fs::read(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content: general_purpose::STANDARD.encode(&bytes),
            size_bytes: meta.size_bytes,
            content_type: content_type_for(&key).to_string(),
            last_modified: meta.last_modified,
            created: meta.created,
            url: self.object_url(bucket, &key),
        })
    }

    /// Open an object for raw streaming out.
    ///
    /// Returns the derived summary and an opened File handle; the caller
    /// streams the bytes without any base64 round-trip. Same existence
    /// semantics as `get_object`.
    pub async fn get_object_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(ObjectSummary, File)> {
        self.ensure_bucket_name_safe(bucket)?;
        let key = Self::decode_key(key);
        self.ensure_key_safe(&key)?;

        let meta = self.stat_object(bucket, &key).await?;
        let file_path = self.object_path(bucket, &key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        let summary = ObjectSummary {
            name: key.to_string(),
            size_bytes: meta.size_bytes,
            last_modified: meta.last_modified,
            created: meta.created,
            content_type: content_type_for(&key).to_string(),
            url: self.object_url(bucket, &key),
        };
        Ok((summary, file))
    }

    /// Delete an object's payload file.
    ///
    /// Fails with ObjectNotFound when the key has no file, never silently
    /// succeeds. Empty parent directories left behind by nested keys are
    /// not pruned.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<DeletedObject> {
        self.ensure_bucket_name_safe(bucket)?;
        let key = Self::decode_key(key);
        self.ensure_key_safe(&key)?;

        self.stat_object(bucket, &key).await?;
        let file_path = self.object_path(bucket, &key);
        fs::remove_file(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;
        debug!("removed {}", file_path.display());

        Ok(DeletedObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            deleted: true,
            message: "File successfully deleted".into(),
        })
    }

    /// List the direct-child objects of a bucket.
    ///
    /// Fails with BucketNotFound when the bucket directory is absent (an
    /// empty bucket is an empty list, a missing bucket is an error). Only
    /// regular files are returned: pseudo-directories created by nested
    /// keys are excluded, not expanded. Entry order follows the underlying
    /// directory enumeration and is not guaranteed.
    pub async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectSummary>> {
        self.ensure_bucket_name_safe(bucket)?;

        let bucket_root = self.bucket_root(bucket);
        let mut dir = fs::read_dir(&bucket_root).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::BucketNotFound(bucket.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;

        let mut objects = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let std_meta = entry.metadata().await?;
            let meta = FsMetadata::from_std(&std_meta)?;
            objects.push(ObjectSummary {
                url: self.object_url(bucket, &name),
                content_type: content_type_for(&name).to_string(),
                size_bytes: meta.size_bytes,
                last_modified: meta.last_modified,
                created: meta.created,
                name,
            });
        }
        Ok(objects)
    }
}

/// Filesystem-derived object metadata, re-read on every call.
struct FsMetadata {
    size_bytes: u64,
    last_modified: DateTime<Utc>,
    created: DateTime<Utc>,
}

impl FsMetadata {
    /// Derive size and timestamps from a std metadata record. Platforms
    /// that do not expose a birth time fall back to the modification time.
    fn from_std(meta: &std::fs::Metadata) -> io::Result<Self> {
        let last_modified: DateTime<Utc> = meta.modified()?.into();
        let created: DateTime<Utc> = meta.created().map(Into::into).unwrap_or(last_modified);
        Ok(Self {
            size_bytes: meta.len(),
            last_modified,
            created,
        })
    }
}

/// Infer a MIME type from the key's file extension.
///
/// Only the basename matters: any pseudo-directory prefix in the key is
/// ignored. Unknown or missing extensions resolve to the opaque binary
/// type. Pure function, no I/O.
pub fn content_type_for(key: &str) -> &'static str {
    let basename = key.rsplit('/').next().unwrap_or(key);
    let extension = match basename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "application/octet-stream",
    };
    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn service(dir: &tempfile::TempDir) -> StorageService {
        StorageService::new(dir.path(), "http://localhost:3000/s3")
    }

    fn b64(bytes: &[u8]) -> String {
        general_purpose::STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_payload() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let uploaded = svc
            .put_object("photos", "cat.png", &b64(b"not really a png"))
            .await
            .unwrap();
        assert_eq!(uploaded.bucket, "photos");
        assert_eq!(uploaded.key, "cat.png");
        assert_eq!(uploaded.size_bytes, 16);
        assert_eq!(uploaded.content_type, "image/png");
        assert_eq!(uploaded.url, "http://localhost:3000/s3/photos/cat.png");
        assert_eq!(
            uploaded.download_url,
            "http://localhost:3000/s3/file/photos/cat.png"
        );

        let fetched = svc.get_object("photos", "cat.png").await.unwrap();
        let decoded = general_purpose::STANDARD.decode(&fetched.content).unwrap();
        assert_eq!(decoded, b"not really a png");
        assert_eq!(fetched.size_bytes, 16);
        assert_eq!(fetched.content_type, "image/png");
    }

    #[tokio::test]
    async fn put_creates_bucket_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        svc.put_object("newbucket", "k", &b64(b"x")).await.unwrap();

        let listed = svc.list_objects("newbucket").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "k");
    }

    #[tokio::test]
    async fn put_overwrites_previous_payload() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        svc.put_object("b", "k.txt", &b64(b"first")).await.unwrap();
        svc.put_object("b", "k.txt", &b64(b"second")).await.unwrap();

        let fetched = svc.get_object("b", "k.txt").await.unwrap();
        let decoded = general_purpose::STANDARD.decode(&fetched.content).unwrap();
        assert_eq!(decoded, b"second");
    }

    #[tokio::test]
    async fn put_rejects_invalid_base64() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let err = svc.put_object("b", "k", "@@not base64@@").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidEncoding(_)));
    }

    #[tokio::test]
    async fn nested_key_materializes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        svc.put_object("b", "folder/sub/file.jpg", &b64(b"jpeg"))
            .await
            .unwrap();

        assert!(dir.path().join("b/folder/sub/file.jpg").is_file());
        let fetched = svc.get_object("b", "folder/sub/file.jpg").await.unwrap();
        assert_eq!(fetched.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn listing_is_flat_and_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        svc.put_object("b", "a/b.txt", &b64(b"nested")).await.unwrap();
        svc.put_object("b", "c.txt", &b64(b"top")).await.unwrap();

        let listed = svc.list_objects("b").await.unwrap();
        let names: Vec<&str> = listed.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["c.txt"]);
    }

    #[tokio::test]
    async fn listing_missing_bucket_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let err = svc.list_objects("neverexisted").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(name) if name == "neverexisted"));
    }

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        svc.put_object("b", "present", &b64(b"x")).await.unwrap();

        let err = svc.get_object("b", "absent").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn delete_removes_only_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        svc.put_object("b", "a/keep.txt", &b64(b"x")).await.unwrap();
        svc.put_object("b", "a/drop.txt", &b64(b"y")).await.unwrap();

        let confirmation = svc.delete_object("b", "a/drop.txt").await.unwrap();
        assert!(confirmation.deleted);
        assert!(!dir.path().join("b/a/drop.txt").exists());
        assert!(dir.path().join("b/a/keep.txt").is_file());
    }

    #[tokio::test]
    async fn delete_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        let err = svc.delete_object("b", "ghost").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));

        // Deleting twice reports the same failure, never silent success.
        svc.put_object("b", "once", &b64(b"x")).await.unwrap();
        svc.delete_object("b", "once").await.unwrap();
        let err = svc.delete_object("b", "once").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn reader_streams_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        svc.put_object("b", "raw.bin", &b64(b"\x00\x01\x02"))
            .await
            .unwrap();

        let (summary, mut file) = svc.get_object_reader("b", "raw.bin").await.unwrap();
        assert_eq!(summary.size_bytes, 3);
        assert_eq!(summary.content_type, "application/octet-stream");

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"\x00\x01\x02");
    }

    #[tokio::test]
    async fn percent_encoded_keys_are_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        svc.put_object("b", "my%20file.txt", &b64(b"spaced"))
            .await
            .unwrap();
        assert!(dir.path().join("b/my file.txt").is_file());

        let fetched = svc.get_object("b", "my%20file.txt").await.unwrap();
        assert_eq!(fetched.key, "my file.txt");
        svc.delete_object("b", "my%20file.txt").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        for key in ["../escape", "a/../../b", "/absolute", "", "back\\slash"] {
            let err = svc.put_object("b", key, &b64(b"x")).await.unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidObjectKey),
                "key {:?} should be rejected",
                key
            );
        }
        // Encoded traversal is caught after decoding.
        let err = svc
            .put_object("b", "%2e%2e/escape", &b64(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidObjectKey));
    }

    #[tokio::test]
    async fn bucket_names_with_separators_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);

        for bucket in ["", "a/b", "..", "."] {
            let err = svc.put_object(bucket, "k", &b64(b"x")).await.unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidBucketName { .. }),
                "bucket {:?} should be rejected",
                bucket
            );
        }
    }

    #[test]
    fn content_type_table() {
        assert_eq!(content_type_for("image.png"), "image/png");
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a/b/page.html"), "text/html");
        assert_eq!(
            content_type_for("unknownext.xyz123"),
            "application/octet-stream"
        );
        assert_eq!(content_type_for("noextension"), "application/octet-stream");
        assert_eq!(content_type_for(".hidden"), "application/octet-stream");
        // Only the basename's extension counts.
        assert_eq!(content_type_for("dir.png/file"), "application/octet-stream");
    }
}
