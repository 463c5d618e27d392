use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use futures_util::future::BoxFuture;
use log::{debug, error};
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::error::AppError;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Avatar,
    Content,
}

impl ImageKind {
    pub fn key(self, file_name: &str) -> String {
        let prefix = match self {
            ImageKind::Avatar => "avatar-images",
            ImageKind::Content => "content-images",
        };
        format!("{}/{}", prefix, file_name)
    }
}

/// Bucket operations the service needs. Implementations bound every call
/// in time and log their own failures.
pub trait ObjectStore: Send + Sync {
    fn put_object(
        &self,
        key: String,
        body: Vec<u8>,
        content_type: &'static str,
    ) -> BoxFuture<'_, Result<(), AppError>>;

    fn presign_get(&self, key: String) -> BoxFuture<'_, Result<String, AppError>>;
}

pub struct S3Store {
    client: S3Client,
    bucket: String,
    url_ttl: Duration,
    timeout: Duration,
}

impl S3Store {
    pub async fn new(config: &AppConfig) -> Self {
        let region_provider =
            RegionProviderChain::first_try(Region::new(config.bucket_region.clone()));
        let creds = Credentials::new(
            config.access_key.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "static",
        );
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .credentials_provider(creds)
            .load()
            .await;

        Self {
            client: S3Client::new(&sdk_config),
            bucket: config.bucket_name.clone(),
            url_ttl: config.signed_url_ttl,
            timeout: config.upstream_timeout,
        }
    }
}

impl ObjectStore for S3Store {
    fn put_object(
        &self,
        key: String,
        body: Vec<u8>,
        content_type: &'static str,
    ) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(async move {
            let send = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(content_type)
                .body(ByteStream::from(body))
                .send();
            match timeout(self.timeout, send).await {
                Ok(Ok(_)) => {
                    debug!("uploaded {}", key);
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!("s3 put_object {} failed: {}", key, DisplayErrorContext(&e));
                    Err(AppError::upstream("Image upload failed"))
                }
                Err(_) => {
                    error!("s3 put_object {} timed out", key);
                    Err(AppError::upstream("Image upload failed"))
                }
            }
        })
    }

    fn presign_get(&self, key: String) -> BoxFuture<'_, Result<String, AppError>> {
        Box::pin(async move {
            let presign = PresigningConfig::expires_in(self.url_ttl).map_err(|e| {
                error!("invalid presigning config: {}", e);
                AppError::system_exception()
            })?;
            let request = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .presigned(presign);
            match timeout(self.timeout, request).await {
                Ok(Ok(presigned)) => Ok(presigned.uri().to_string()),
                Ok(Err(e)) => {
                    error!("s3 presign {} failed: {}", key, DisplayErrorContext(&e));
                    Err(AppError::upstream("Storage unavailable"))
                }
                Err(_) => {
                    error!("s3 presign {} timed out", key);
                    Err(AppError::upstream("Storage unavailable"))
                }
            }
        })
    }
}

/// Sniffs the bytes, not the client-declared content type.
pub fn detect_image(bytes: &[u8]) -> Result<infer::Type, AppError> {
    infer::get(bytes)
        .filter(|kind| ALLOWED_IMAGE_TYPES.contains(&kind.mime_type()))
        .ok_or_else(|| AppError::param_error("Invalid file type"))
}

pub fn generate_file_name(extension: &str) -> String {
    let bytes: [u8; 32] = rand::random();
    let name: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}.{}", name, extension)
}

/// A sniffed image with its generated file name, not yet in the bucket.
pub struct StagedImage {
    pub file_name: String,
    mime_type: &'static str,
    bytes: Vec<u8>,
}

impl StagedImage {
    pub fn new(bytes: Vec<u8>) -> Result<Self, AppError> {
        let detected = detect_image(&bytes)?;
        Ok(Self {
            file_name: generate_file_name(detected.extension()),
            mime_type: detected.mime_type(),
            bytes,
        })
    }

    pub async fn store(self, store: &dyn ObjectStore, kind: ImageKind) -> Result<(), AppError> {
        store
            .put_object(kind.key(&self.file_name), self.bytes, self.mime_type)
            .await
    }
}

/// Stores an image and returns the generated file name (not the full key).
pub async fn upload_image(
    store: &dyn ObjectStore,
    kind: ImageKind,
    bytes: Vec<u8>,
) -> Result<String, AppError> {
    let staged = StagedImage::new(bytes)?;
    let file_name = staged.file_name.clone();
    staged.store(store, kind).await?;
    Ok(file_name)
}

pub async fn signed_url(
    store: &dyn ObjectStore,
    kind: ImageKind,
    file_name: Option<&str>,
) -> Result<Option<String>, AppError> {
    match file_name.filter(|f| !f.is_empty()) {
        Some(file_name) => store.presign_get(kind.key(file_name)).await.map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    pub(crate) const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    /// Records uploads; presigned URLs are `https://signed.test/<key>`.
    /// Keys containing `broken` fail to sign. `fail_uploads` makes every put fail.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        pub(crate) uploads: Mutex<Vec<(String, &'static str)>>,
        pub(crate) fail_uploads: AtomicBool,
    }

    impl FakeStore {
        pub(crate) fn uploaded_keys(&self) -> Vec<String> {
            self.uploads
                .lock()
                .unwrap()
                .iter()
                .map(|(k, _)| k.clone())
                .collect()
        }
    }

    impl ObjectStore for FakeStore {
        fn put_object(
            &self,
            key: String,
            _body: Vec<u8>,
            content_type: &'static str,
        ) -> BoxFuture<'_, Result<(), AppError>> {
            Box::pin(async move {
                if self.fail_uploads.load(Ordering::SeqCst) {
                    return Err(AppError::upstream("Storage unavailable"));
                }
                self.uploads.lock().unwrap().push((key, content_type));
                Ok(())
            })
        }

        fn presign_get(&self, key: String) -> BoxFuture<'_, Result<String, AppError>> {
            Box::pin(async move {
                if key.contains("broken") {
                    return Err(AppError::upstream("Storage unavailable"));
                }
                Ok(format!("https://signed.test/{}", key))
            })
        }
    }
}
