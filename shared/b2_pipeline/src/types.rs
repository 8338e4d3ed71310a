//! Data contracts exchanged with the B2 API and with pipeline callers

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Content type used when the caller declares none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Application key and target bucket for a pipeline
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// B2 application key ID
    pub application_key_id: String,
    /// B2 application key (secret)
    pub application_key: String,
    /// Name of the bucket uploads go to
    pub bucket_name: String,
}

impl Credentials {
    /// Creates a new set of credentials
    #[must_use]
    pub fn new(
        application_key_id: impl Into<String>,
        application_key: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            application_key_id: application_key_id.into(),
            application_key: application_key.into(),
            bucket_name: bucket_name.into(),
        }
    }
}

// Keeps the secret out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("application_key_id", &self.application_key_id)
            .field("application_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

/// Authorization context returned by `b2_authorize_account`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    /// Account the key belongs to
    pub account_id: String,
    /// Base URL for all other API calls
    pub api_url: String,
    /// Token for API calls made within this session
    pub authorization_token: String,
    /// Base URL for file downloads
    pub download_url: String,
}

/// A bucket resolved by name within an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRef {
    /// Provider-assigned bucket ID
    pub bucket_id: String,
    /// Bucket name
    pub bucket_name: String,
}

/// One-shot upload slot returned by `b2_get_upload_url`
///
/// Consumed by [`crate::B2UploadPipeline::upload`], so a ticket can only back one transfer.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTicket {
    /// Bucket the ticket is tied to
    pub bucket_id: String,
    /// URL the file bytes are posted to
    pub upload_url: String,
    /// Token authorizing the upload
    pub authorization_token: String,
}

/// File bytes plus the metadata the caller knows about them
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Full file content
    pub bytes: Bytes,
    /// Name the file had on the caller's side; only its extension is kept
    pub original_name: String,
    /// MIME type declared by the caller, if any
    pub declared_mime_type: Option<String>,
}

impl UploadRequest {
    /// Creates an upload request without a declared MIME type
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>, original_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            original_name: original_name.into(),
            declared_mime_type: None,
        }
    }

    /// Sets the declared MIME type; blank values are treated as absent
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        self.declared_mime_type = (!mime_type.trim().is_empty()).then_some(mime_type);
        self
    }

    /// Content type sent to the provider
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.declared_mime_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Number of bytes to transfer
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the request carries no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// File metadata returned by the raw upload endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Provider-assigned file version ID
    pub file_id: String,
    /// Name the file is stored under
    pub file_name: String,
    /// Stored size in bytes
    #[serde(default)]
    pub content_length: u64,
    /// SHA-1 the provider verified
    #[serde(default)]
    pub content_sha1: Option<String>,
    /// Stored content type
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Terminal result of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    /// Whether the file was stored
    pub success: bool,
    /// Name the file was stored under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_file_name: Option<String>,
    /// Public download URL of the stored file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    /// Successful outcome for a stored file
    #[must_use]
    pub const fn stored(stored_file_name: String, public_url: String) -> Self {
        Self {
            success: true,
            stored_file_name: Some(stored_file_name),
            public_url: Some(public_url),
            error: None,
        }
    }

    /// Failed outcome carrying the error text
    #[must_use]
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            stored_file_name: None,
            public_url: None,
            error: Some(error.to_string()),
        }
    }
}

/// Everything a browser needs to upload directly to B2
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectUploadGrant {
    /// URL the file bytes are posted to
    pub upload_url: String,
    /// Token authorizing the upload
    pub authorization_token: String,
    /// Bucket the ticket is tied to
    pub bucket_id: String,
    /// Bucket name, for building the public URL
    pub bucket_name: String,
    /// Download base URL of the session
    pub download_url: String,
}
