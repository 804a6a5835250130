//! MinIO/S3 client implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Object storage contract for originals and HLS artifacts.
///
/// Production binds to [`S3Client`]; tests bind to in-memory fakes.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create a time-limited URL authorizing one PUT of the given key.
    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Create a time-limited URL authorizing one GET of the given key.
    async fn generate_presigned_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Upload a local file under the given key, streaming end to end.
    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<()>;

    /// Download an object to a local file. Fails with
    /// [`StorageError::ObjectNotFound`] when the key is absent.
    async fn download_to_file(&self, key: &str, path: &Path) -> StorageResult<()>;

    /// Remove an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether an object exists under the given key.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Configuration for the MinIO/S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Server-internal endpoint, `host:port`
    pub endpoint: String,
    /// Externally reachable endpoint used when signing URLs.
    /// Falls back to `endpoint` when unset; the signing secret is shared.
    pub public_endpoint: Option<String>,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
    /// Bucket name
    pub bucket: String,
    /// Whether to speak TLS to the endpoint
    pub use_ssl: bool,
    /// Region (MinIO accepts any value here)
    pub region: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "localhost:9000".to_string(),
            public_endpoint: None,
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            bucket: "videos".to_string(),
            use_ssl: false,
            region: "us-east-1".to_string(),
        }
    }
}

impl S3Config {
    /// Create config from `MINIO_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("MINIO_ENDPOINT").unwrap_or(defaults.endpoint),
            public_endpoint: std::env::var("MINIO_PUBLIC_ENDPOINT").ok(),
            access_key: std::env::var("MINIO_ACCESS_KEY").unwrap_or(defaults.access_key),
            secret_key: std::env::var("MINIO_SECRET_KEY").unwrap_or(defaults.secret_key),
            bucket: std::env::var("MINIO_BUCKET").unwrap_or(defaults.bucket),
            use_ssl: std::env::var("MINIO_USE_SSL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.use_ssl),
            region: defaults.region,
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{endpoint}")
    }
}

/// S3-compatible storage client holding two SDK clients: one for server
/// internal I/O and one whose host is the public endpoint, used only when
/// producing signed URLs.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    presign_client: Client,
    bucket: String,
}

impl S3Client {
    /// Create a new client and verify the configured bucket exists,
    /// failing fast on misconfiguration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let client = Self::build_sdk_client(&config, &config.endpoint);

        let presign_client = match &config.public_endpoint {
            Some(public) => Self::build_sdk_client(&config, public),
            None => client.clone(),
        };

        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {}
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    return Err(StorageError::BucketNotFound(bucket));
                }
                return Err(StorageError::config(format!(
                    "check bucket existence: {service_err}"
                )));
            }
        }

        info!(bucket = %bucket, endpoint = %config.endpoint, "connected to object storage");

        Ok(Self {
            client,
            presign_client,
            bucket,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Self::new(S3Config::from_env()).await
    }

    fn build_sdk_client(config: &S3Config, endpoint: &str) -> Client {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "minio",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url(endpoint))
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Client::from_conf(sdk_config)
    }

    /// Verify the bucket is still reachable.
    pub async fn ping(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Sdk(format!("ping bucket: {e}")))?;
        Ok(())
    }

    /// The configured bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStorage for S3Client {
    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .presign_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn generate_presigned_download_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .presign_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<()> {
        debug!("uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    async fn download_to_file(&self, key: &str, path: &Path) -> StorageResult<()> {
        debug!("downloading {} to {}", key, path.display());

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Err(StorageError::not_found(key));
                }
                return Err(StorageError::download_failed(service_err.to_string()));
            }
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        tokio::io::copy(&mut reader, &mut file).await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Sdk(service_err.to_string()))
                }
            }
        }
    }
}
