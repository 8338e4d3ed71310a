use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        Extension,
    },
    http::StatusCode,
    Json,
};
use b2_pipeline::{B2Error, B2UploadPipeline, UploadOutcome, UploadRequest};
use tracing::instrument;

use crate::types::pipeline_status;

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

/// Reads the `file` field of the form, skipping any other field
async fn read_file_field(
    multipart: &mut Multipart,
) -> Result<Option<UploadRequest>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(ToString::to_string);
        let bytes = field.bytes().await?;

        let request = UploadRequest::new(bytes, original_name);
        return Ok(Some(match content_type {
            Some(content_type) => request.with_mime_type(content_type),
            None => request,
        }));
    }

    Ok(None)
}

fn rejected(
    status: StatusCode,
    error: impl std::fmt::Display,
) -> (StatusCode, Json<UploadOutcome>) {
    (status, Json(UploadOutcome::failed(error)))
}

/// Uploads a multipart file to B2
///
/// Runs the full authenticate → resolve bucket → upload URL → upload chain
/// for the configured bucket and answers with the resulting `UploadOutcome`.
///
/// # Returns
///
/// - `200` with `success: true`, the stored file name and its public URL
/// - `400` when the form is unreadable, has no `file` field, or the file is empty
/// - `500` when any pipeline step fails
#[instrument(skip_all)]
pub async fn upload_file(
    Extension(pipeline): Extension<B2UploadPipeline>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<UploadOutcome>) {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::warn!("Multipart rejection: {rejection}");
            return rejected(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let request = match read_file_field(&mut multipart).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            tracing::warn!("Upload request without a file field");
            return rejected(StatusCode::BAD_REQUEST, "No file provided");
        }
        Err(err) => {
            tracing::warn!("Unreadable multipart body: {err}");
            return rejected(err.status(), err.body_text());
        }
    };

    if request.is_empty() {
        tracing::warn!("Empty file rejected");
        return rejected(StatusCode::BAD_REQUEST, B2Error::EmptyFile);
    }

    tracing::info!(
        original_name = %request.original_name,
        size = request.len(),
        "Upload requested"
    );

    match pipeline.run(request, None).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(err) => {
            tracing::error!("Upload pipeline failed: {err}");
            rejected(pipeline_status(&err), err)
        }
    }
}
