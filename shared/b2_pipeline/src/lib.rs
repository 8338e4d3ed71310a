//! Backblaze B2 upload pipeline
//!
//! Authenticates against the B2 native API, resolves a bucket by name, obtains
//! a one-shot upload URL and posts file bytes with their SHA-1. Also builds
//! public download URLs and probes whether a stored file exists.
//!
//! ```no_run
//! # async fn example() -> b2_pipeline::B2Result<()> {
//! use b2_pipeline::{B2UploadPipeline, Credentials, UploadRequest};
//!
//! let pipeline = B2UploadPipeline::new(Credentials::new("key-id", "key", "photos"))?;
//! let outcome = pipeline
//!     .run(UploadRequest::new(vec![0xff, 0xd8, 0xff], "cat.jpg"), None)
//!     .await?;
//! println!("{:?}", outcome.public_url);
//! # Ok(())
//! # }
//! ```

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

mod error;
mod file_name;
mod pipeline;
mod progress;
mod request;
mod types;

/// Mock B2 server for tests
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::{B2Error, B2Result};
pub use file_name::{
    content_sha1, encode_file_name_header, extension_of, storage_file_name,
    storage_file_name_now, DEFAULT_EXTENSION,
};
pub use pipeline::{
    B2UploadPipeline, CONTENT_SHA1_HEADER, DEFAULT_AUTH_BASE_URL, FILE_NAME_HEADER, INFO_AUTHOR,
    INFO_AUTHOR_HEADER,
};
pub use progress::{ProgressCallback, UploadProgress, PROGRESS_CHUNK_SIZE};
pub use request::default_http_client;
pub use types::{
    AuthSession, BucketRef, Credentials, DirectUploadGrant, StoredFile, UploadOutcome,
    UploadRequest, UploadTicket, DEFAULT_CONTENT_TYPE,
};
