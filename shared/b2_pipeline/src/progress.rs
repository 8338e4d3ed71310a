//! Advisory progress reporting for the byte-transfer step

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;

/// Size of the slices a progress-reporting upload body is streamed in
pub const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes handed to the transport so far
    pub bytes_sent: u64,
    /// Total bytes of the upload
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Whether every byte has been handed to the transport
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.bytes_sent >= self.total_bytes
    }
}

/// Caller-supplied progress sink
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Splits `bytes` into zero-copy slices of at most [`PROGRESS_CHUNK_SIZE`]
fn chunked(bytes: &Bytes) -> Vec<Bytes> {
    (0..bytes.len())
        .step_by(PROGRESS_CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + PROGRESS_CHUNK_SIZE).min(bytes.len())))
        .collect()
}

/// Request body that reports each slice to `callback` as the transport pulls it
pub(crate) fn reporting_body(bytes: Bytes, callback: ProgressCallback) -> reqwest::Body {
    let total_bytes = bytes.len() as u64;
    let mut bytes_sent = 0_u64;

    let stream = futures::stream::iter(chunked(&bytes)).map(move |chunk| {
        bytes_sent += chunk.len() as u64;
        callback(UploadProgress {
            bytes_sent,
            total_bytes,
        });
        Ok::<_, std::io::Error>(chunk)
    });

    reqwest::Body::wrap_stream(stream)
}
