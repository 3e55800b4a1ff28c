//! Data models for the S3 simulator.
//!
//! Buckets are plain directories with no standalone metadata, so the only
//! modeled entities are the operation results, serialized as JSON via `serde`.

pub mod object;
