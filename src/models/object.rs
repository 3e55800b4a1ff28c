//! Result types for object operations.
//!
//! Objects have no persisted metadata records: every field here is derived
//! from the filesystem at the moment of the call and serialized straight
//! into the JSON response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary returned after a successful upload.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadedObject {
    /// Bucket the object was stored in.
    pub bucket: String,

    /// Decoded object key (may contain `/` for pseudo-directory nesting).
    pub key: String,

    /// Payload size in bytes after base64 decoding.
    pub size_bytes: u64,

    /// MIME type inferred from the key's file extension.
    pub content_type: String,

    /// Modification timestamp read from the stored file.
    pub last_modified: DateTime<Utc>,

    /// Creation timestamp read from the stored file.
    pub created: DateTime<Utc>,

    /// Direct access URL: `{base_url}/{bucket}/{key}`.
    pub url: String,

    /// Explicit download URL: `{base_url}/file/{bucket}/{key}`.
    pub download_url: String,
}

/// A fetched object: base64 payload plus derived metadata.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,

    /// Object payload, base64-encoded.
    pub content: String,

    pub size_bytes: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub url: String,
}

/// One entry of a flat bucket listing (direct-child files only).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ObjectSummary {
    /// File name relative to the bucket root.
    pub name: String,

    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub content_type: String,
    pub url: String,
}

/// Confirmation returned by a successful delete.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeletedObject {
    pub bucket: String,
    pub key: String,
    pub deleted: bool,
    pub message: String,
}
