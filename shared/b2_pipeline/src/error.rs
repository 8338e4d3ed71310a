//! Error types for B2 pipeline operations

use thiserror::Error;

/// Result type for B2 pipeline operations
pub type B2Result<T> = Result<T, B2Error>;

/// Errors that can occur while talking to the B2 API.
///
/// Every variant is terminal for the current pipeline run; nothing is retried.
#[derive(Error, Debug)]
pub enum B2Error {
    /// Account authorization (or bucket listing) was rejected by the provider
    #[error("B2 authorization failed: {status} {status_text}")]
    Auth {
        /// HTTP status code returned by the provider
        status: u16,
        /// Canonical reason phrase for the status
        status_text: String,
    },

    /// No bucket in the account matches the requested name
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// The provider refused to hand out an upload URL
    #[error("Failed to acquire upload URL: {status} {status_text}")]
    TicketAcquisition {
        /// HTTP status code returned by the provider
        status: u16,
        /// Canonical reason phrase for the status
        status_text: String,
    },

    /// An upload ticket was paired with a bucket it was not issued for
    #[error("Upload ticket for bucket {ticket_bucket_id} used with bucket {bucket_id}")]
    TicketMismatch {
        /// Bucket the ticket was issued for
        ticket_bucket_id: String,
        /// Bucket the caller paired it with
        bucket_id: String,
    },

    /// The upload request carried zero bytes
    #[error("File is empty")]
    EmptyFile,

    /// The raw upload call returned a non-success status
    #[error("{message}")]
    Upload {
        /// HTTP status code returned by the upload endpoint
        status: u16,
        /// Composed error text including provider details when available
        message: String,
    },

    /// Transport-level failure (connection, TLS, body streaming)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A success response whose body could not be decoded
    #[error("Invalid response from B2: {0}")]
    InvalidResponse(String),
}

impl B2Error {
    /// HTTP status carried by the error, if the provider answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::TicketAcquisition { status, .. }
            | Self::Upload { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            Self::BucketNotFound(_)
            | Self::TicketMismatch { .. }
            | Self::EmptyFile
            | Self::InvalidResponse(_) => None,
        }
    }

    /// Whether the failure was caused by the caller's input rather than the provider
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyFile)
    }
}

/// Reason phrase for a status code, empty when the code has none
pub(crate) fn status_text(status: reqwest::StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}
