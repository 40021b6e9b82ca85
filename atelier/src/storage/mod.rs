//! Object storage for uploaded images.
//!
//! The [`ObjectStorage`] trait is the seam between the rest of the application and the bucket
//! holding image files. Two backends implement it:
//!
//! - [`SupabaseStorage`]: the hosted bucket, spoken to over its HTTP API
//! - [`MemoryStorage`]: an in-process map, used by tests and local development
//!
//! Objects are addressed by key (see [`paths`]); rows in the `works` table only ever store the
//! public URL, which [`paths::object_key_from_public_url`] turns back into a key.

pub mod memory;
pub mod paths;
pub mod supabase;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStorage;
pub use supabase::SupabaseStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The request never produced a response
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The storage service answered with a non-success status
    #[error("storage responded with {status}: {body}")]
    Status { status: u16, body: String },

    /// The configured bucket does not exist
    #[error("bucket '{bucket}' not found")]
    BucketNotFound { bucket: String },

    /// The response body could not be understood
    #[error("unexpected storage response: {0}")]
    Decode(String),

    /// The key cannot be used to address an object
    #[error("invalid object key '{0}'")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// File name relative to the listed directory
    pub name: String,
}

/// Storage backend for image objects
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Name of the bucket this backend writes to
    fn bucket(&self) -> &str;

    /// Public URL under which an object key is served
    fn public_url(&self, key: &str) -> String;

    /// Store `content` under `key` and return its public URL
    async fn upload(&self, key: &str, content: Bytes, content_type: &str, upsert: bool) -> Result<String>;

    /// List objects in `directory` whose name matches `search`
    async fn list(&self, directory: &str, search: &str) -> Result<Vec<ObjectEntry>>;

    /// Remove a single object. Removing an absent object is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Check whether an object exists by listing its directory filtered by its file name
    async fn exists(&self, key: &str) -> Result<bool> {
        let (directory, name) = paths::split_key(key);
        if name.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        let entries = self.list(directory, name).await?;
        Ok(entries.iter().any(|entry| entry.name == name))
    }
}
