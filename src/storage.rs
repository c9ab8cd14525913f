//! Object storage for uploaded images.

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ImageUpload;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("image cannot be empty")]
    EmptyImage,
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Public-URL object store (a cloud bucket in production).
pub trait ImageStorage: Send + Sync {
    /// Store `image` under `folder` and return its public URL.
    fn upload_image(&self, image: &ImageUpload, folder: &str) -> Result<String, StorageError>;
    fn delete_image(&self, url: &str) -> Result<(), StorageError>;
}

struct StoredObject {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Bucket kept in process memory. URLs look like
/// `{base_url}/{bucket}/{folder}/{uuid}-{filename}`.
pub struct MemoryImageStorage {
    base_url: String,
    bucket: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryImageStorage {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.objects.contains_key(url)
    }

    pub fn content_type(&self, url: &str) -> Option<String> {
        self.objects.get(url).and_then(|o| o.content_type.clone())
    }

    pub fn size_of(&self, url: &str) -> Option<usize> {
        self.objects.get(url).map(|o| o.bytes.len())
    }
}

impl ImageStorage for MemoryImageStorage {
    fn upload_image(&self, image: &ImageUpload, folder: &str) -> Result<String, StorageError> {
        if image.is_empty() {
            return Err(StorageError::EmptyImage);
        }
        let filename = image.filename.trim();
        if filename.is_empty() || filename.contains('/') {
            return Err(StorageError::Upload(format!(
                "invalid filename {:?}",
                image.filename
            )));
        }

        let url = format!(
            "{}/{}/{}/{}-{}",
            self.base_url,
            self.bucket,
            folder.trim_matches('/'),
            Uuid::new_v4(),
            filename
        );
        self.objects.insert(
            url.clone(),
            StoredObject {
                content_type: image.content_type.clone(),
                bytes: image.bytes.clone(),
            },
        );
        debug!(%url, size = image.bytes.len(), "image uploaded");
        Ok(url)
    }

    fn delete_image(&self, url: &str) -> Result<(), StorageError> {
        self.objects
            .remove(url)
            .map(|_| debug!(%url, "image deleted"))
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }
}
