#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! S3-compatible object store client for imported order CSV files.
//!
//! Provides upload/download of CSV files and the object-URL bookkeeping
//! `file_tasks.file_path` relies on.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `OBJECT_STORE_ENDPOINT` | Yes | S3-compatible endpoint URL |
//! | `OBJECT_STORE_ACCESS_KEY` | Yes | Access key |
//! | `OBJECT_STORE_SECRET_KEY` | Yes | Secret key |
//! | `OBJECT_STORE_BUCKET` | Yes | Bucket holding imported CSV files |
//! | `OBJECT_STORE_PUBLIC_BASE_URL` | No | Public base URL override for [`ObjectStore::object_url`] |

use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};

/// Errors that can occur during object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// S3 `GetObject` failed.
    #[error("Failed to download s3://{bucket}/{key}: {source}")]
    Download {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Requested object does not exist in the store.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
}

impl From<StorageError> for geo_tax_models::error::OrderError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound(err.to_string()),
            other => Self::Infrastructure(other.to_string()),
        }
    }
}

/// Maximum number of download attempts (initial + retries).
const MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Base delay between download retries (doubles each attempt).
const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

/// Client for an S3-compatible object store holding imported CSV files.
pub struct ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl ObjectStore {
    /// Creates a new client from `OBJECT_STORE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingEnv`] if any required variable is unset.
    pub fn from_env() -> Result<Self, StorageError> {
        let endpoint = require_env("OBJECT_STORE_ENDPOINT")?;
        let access_key = require_env("OBJECT_STORE_ACCESS_KEY")?;
        let secret_key = require_env("OBJECT_STORE_SECRET_KEY")?;
        let bucket = require_env("OBJECT_STORE_BUCKET")?;
        let public_base_url = std::env::var("OBJECT_STORE_PUBLIC_BASE_URL").ok();

        let creds = Credentials::new(&access_key, &secret_key, None, None, "object-store-env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket,
            public_base_url,
        })
    }

    /// The configured bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads `content` under `object_name`, returning the object name
    /// unchanged (mirrors `MinioStorage.upload_bytes`).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Upload`] on failure.
    pub async fn upload_bytes(
        &self,
        object_name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = content.len();
        let body = aws_sdk_s3::primitives::ByteStream::from(content);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_name)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                bucket: self.bucket.clone(),
                key: object_name.to_string(),
                source: Box::new(e),
            })?;

        log::info!(
            "uploaded s3://{}/{object_name} ({size} bytes)",
            self.bucket
        );
        Ok(object_name.to_string())
    }

    /// Downloads the bytes stored at `object_name`, retrying transient
    /// failures up to [`MAX_DOWNLOAD_ATTEMPTS`] times with exponential
    /// backoff.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the key does not exist, or
    /// [`StorageError::Download`] if all retries are exhausted.
    pub async fn get_object_bytes(&self, object_name: &str) -> Result<Vec<u8>, StorageError> {
        let mut last_err: Option<StorageError> = None;

        for attempt in 1..=MAX_DOWNLOAD_ATTEMPTS {
            match self.get_object_bytes_once(object_name).await {
                Ok(bytes) => return Ok(bytes),
                Err(e @ StorageError::NotFound { .. }) => return Err(e),
                Err(e) if attempt < MAX_DOWNLOAD_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    log::warn!(
                        "download attempt {attempt}/{MAX_DOWNLOAD_ATTEMPTS} failed, \
                         retrying in {delay:.1?}..."
                    );
                    last_err = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| StorageError::Download {
            bucket: self.bucket.clone(),
            key: object_name.to_string(),
            source: "all download attempts exhausted".into(),
        }))
    }

    async fn get_object_bytes_once(&self, object_name: &str) -> Result<Vec<u8>, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_name)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.as_service_error();
                if service_err
                    .is_some_and(aws_sdk_s3::operation::get_object::GetObjectError::is_no_such_key)
                {
                    return Err(StorageError::NotFound {
                        bucket: self.bucket.clone(),
                        key: object_name.to_string(),
                    });
                }
                return Err(StorageError::Download {
                    bucket: self.bucket.clone(),
                    key: object_name.to_string(),
                    source: Box::new(err),
                });
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download {
                bucket: self.bucket.clone(),
                key: object_name.to_string(),
                source: Box::new(e),
            })?;

        Ok(bytes.into_bytes().to_vec())
    }

    /// The public base URL objects are served from: `OBJECT_STORE_PUBLIC_BASE_URL`
    /// if set, else derived from the endpoint.
    fn base_url(&self) -> &str {
        self.public_base_url
            .as_deref()
            .unwrap_or(self.client.config().endpoint_url().unwrap_or_default())
    }

    /// Builds the publicly-reachable URL for `object_name`, percent-encoding
    /// each path segment (mirrors `MinioStorage.object_url`).
    #[must_use]
    pub fn object_url(&self, object_name: &str) -> String {
        let encoded = object_name
            .split('/')
            .map(percent_encode_segment)
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{encoded}",
            self.base_url().trim_end_matches('/'),
            self.bucket
        )
    }
}

/// Percent-encodes one path segment, leaving unreserved characters intact.
fn percent_encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Recovers the object key from a stored `file_path`, which may be a
/// `bucket/key` pair or a full URL (mirrors `_extract_object_name`).
#[must_use]
pub fn extract_object_name(file_path: &str, bucket: &str) -> String {
    let prefix = format!("{bucket}/");
    if let Some(stripped) = file_path.strip_prefix(&prefix) {
        return stripped.to_string();
    }

    if let Some(path) = strip_url_scheme_and_host(file_path) {
        let path = path.trim_start_matches('/');
        if let Some(stripped) = path.strip_prefix(&prefix) {
            return stripped.to_string();
        }
        return path.to_string();
    }

    file_path.to_string()
}

/// Returns the path component of `value` if it parses as an absolute URL
/// with a scheme and host, else `None`.
fn strip_url_scheme_and_host(value: &str) -> Option<&str> {
    let after_scheme = value.split_once("://")?.1;
    let path_start = after_scheme.find('/')?;
    Some(&after_scheme[path_start..])
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, StorageError> {
    std::env::var(name).map_err(|_| StorageError::MissingEnv {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{extract_object_name, percent_encode_segment};

    #[test]
    fn extracts_object_name_from_bucket_prefixed_path() {
        assert_eq!(
            extract_object_name("orders-bucket/imports/2026/march.csv", "orders-bucket"),
            "imports/2026/march.csv"
        );
    }

    #[test]
    fn extracts_object_name_from_full_url() {
        assert_eq!(
            extract_object_name(
                "https://store.example.com/orders-bucket/imports/march.csv",
                "orders-bucket"
            ),
            "imports/march.csv"
        );
    }

    #[test]
    fn falls_back_to_the_raw_value_when_no_prefix_matches() {
        assert_eq!(
            extract_object_name("imports/march.csv", "orders-bucket"),
            "imports/march.csv"
        );
    }

    #[test]
    fn percent_encodes_reserved_characters_in_a_segment() {
        assert_eq!(percent_encode_segment("march 2026.csv"), "march%202026.csv");
    }
}
