//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible storage access. Crop images are
//! stored under timestamped keys in a flat bucket and addressed by a
//! deterministic public URL.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client,
};
use chrono::Utc;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

/// A successfully stored object
#[derive(Debug, Clone)]
pub struct UploadedObject {
    pub key: String,
    pub url: String,
}

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    public_base_url: String,
}

/// Derive the object key for an upload.
///
/// The suggested name only contributes its extension: if the extension maps
/// to a known MIME type it is kept, otherwise `.webp` is used. The key itself
/// is a second-granularity timestamp, which is what makes crop keys unique
/// within the bucket.
pub fn derive_object_key(suggested_name: &str, unix_seconds: i64) -> String {
    let ext = Path::new(suggested_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !mime_guess::from_ext(e).is_empty())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| ".webp".to_string());

    format!("file_{}{}", unix_seconds, ext)
}

impl S3Client {
    /// Create a new S3 client from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "pdf-crop-server",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .endpoint_url(endpoint)
                .force_path_style(true); // Required for MinIO and other S3-compatible services
        }

        let client = Client::from_conf(builder.build());

        let bucket = config.bucket.clone();
        let public_base_url = match &config.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => match &config.endpoint {
                Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
                None => format!("https://{}.s3.amazonaws.com", bucket),
            },
        };

        // Probe the bucket so misconfiguration shows up at startup
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    e
                );
            }
        }

        Ok(Self {
            client,
            bucket,
            public_base_url,
        })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public URL for an object key
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Upload raw bytes under a timestamped key derived from `suggested_name`.
    ///
    /// Any SDK or transport failure surfaces as a storage error; the caller
    /// must treat the whole save as failed, no retry happens here.
    pub async fn upload(&self, data: Vec<u8>, suggested_name: &str) -> Result<UploadedObject> {
        let key = derive_object_key(suggested_name, Utc::now().timestamp());
        let content_type = mime_guess::from_path(&key).first_or_octet_stream();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type.as_ref())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload {}: {}", key, e)))?;

        let url = self.public_url(&key);
        tracing::info!("Uploaded crop to s3://{}/{}", self.bucket, key);

        Ok(UploadedObject { key, url })
    }

    /// Generate a time-limited presigned GET URL for an object
    pub async fn presigned_get_url(&self, key: &str, expires_secs: u64) -> Result<String> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(expires_secs))
            .map_err(|e| AppError::Storage(format!("Invalid presign expiry: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign {}: {}", key, e)))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_keeps_known_image_extension() {
        let key = derive_object_key("diagrams/crop_tables_1700000000.png", 1_700_000_000);
        assert_eq!(key, "file_1700000000.png");
    }

    #[test]
    fn key_falls_back_to_webp_for_unknown_extension() {
        assert_eq!(
            derive_object_key("crop.unknownext", 1_700_000_000),
            "file_1700000000.webp"
        );
        assert_eq!(derive_object_key("no-extension", 42), "file_42.webp");
    }

    #[test]
    fn key_lowercases_extension() {
        assert_eq!(derive_object_key("SHOUTY.PNG", 7), "file_7.png");
    }
}
