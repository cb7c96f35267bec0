mod local;
mod urls;

use async_trait::async_trait;
use bytes::Bytes;

pub use self::local::LocalImageStore;
pub use self::urls::ImageUrlResolver;

pub const DEFAULT_PROFILE_IMAGE: &str = "profile/images/defaultprofile.png";
pub const DEFAULT_REVIEW_IMAGE: &str = "review/images/defaultImage.png";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an uploaded image is attached to; decides its key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Profile,
    Review,
}

impl ImageKind {
    fn prefix(self) -> &'static str {
        match self {
            ImageKind::Profile => "profile/images",
            ImageKind::Review => "review/images",
        }
    }
}

/// Fresh object key for an upload, e.g. `review/images/<uuid>.png`.
pub fn new_image_key(kind: ImageKind) -> String {
    format!("{}/{}.png", kind.prefix(), uuid::Uuid::now_v7())
}

/// Reject keys that could escape the store root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Object storage for user-uploaded images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;
}

/// Upload after the owning row is committed. A failure leaves a dangling key
/// on the row; it is logged and otherwise tolerated.
pub async fn upload_after_commit(store: &dyn ImageStore, key: &str, data: Bytes) {
    if let Err(e) = store.put(key, data).await {
        tracing::error!(key, "Image upload failed after row commit: {}", e);
    }
}
