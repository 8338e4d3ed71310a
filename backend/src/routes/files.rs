use axum::{extract::Path, Extension, Json};
use b2_pipeline::B2UploadPipeline;
use serde::Serialize;
use tracing::instrument;

use crate::types::AppError;

#[derive(Debug, Serialize)]
pub struct FileLookupResponse {
    /// Public download URL of the file
    pub url: String,
    /// Whether the provider currently serves the file
    pub exists: bool,
}

/// Resolves the public URL of a stored file and probes whether it exists
///
/// The probe never fails the request: an unreachable or erroring provider
/// reads as `exists: false`.
///
/// # Errors
///
/// - `500` when authentication fails, since the download host comes from the session
#[instrument(skip_all, fields(file_name = %file_name))]
pub async fn lookup_file(
    Extension(pipeline): Extension<B2UploadPipeline>,
    Path(file_name): Path<String>,
) -> Result<Json<FileLookupResponse>, AppError> {
    let session = pipeline.authenticate().await?;
    let bucket_name = pipeline.bucket_name();

    let url = B2UploadPipeline::build_download_url(&session, bucket_name, &file_name);
    let exists = pipeline
        .check_exists(&session, bucket_name, &file_name)
        .await;

    Ok(Json(FileLookupResponse { url, exists }))
}
