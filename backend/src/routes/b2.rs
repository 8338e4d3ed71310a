use axum::{extract::rejection::JsonRejection, Extension, Json};
use b2_pipeline::{AuthSession, B2UploadPipeline, DirectUploadGrant};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::types::AppError;

/// Action directive sent by browser-side clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum B2Action {
    /// Open a B2 session
    Authenticate,
    /// Obtain a one-shot upload URL for the configured bucket
    GetUploadUrl,
}

/// Payload answered for a [`B2Action`]
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum B2ActionResponse {
    /// Answer to `authenticate`
    Session(AuthSession),
    /// Answer to `getUploadUrl`
    UploadUrl(DirectUploadGrant),
}

/// Performs a pipeline step on behalf of a client that uploads directly to B2
///
/// - `authenticate` answers with the session: `accountId`, `apiUrl`,
///   `authorizationToken`, `downloadUrl`
/// - `getUploadUrl` answers with `uploadUrl`, `authorizationToken`, `bucketId`,
///   `bucketName`, `downloadUrl`
///
/// # Errors
///
/// - `400` for malformed JSON or an unknown action
/// - `500` when the pipeline step fails
#[instrument(skip_all)]
pub async fn handle_action(
    Extension(pipeline): Extension<B2UploadPipeline>,
    payload: Result<Json<B2Action>, JsonRejection>,
) -> Result<Json<B2ActionResponse>, AppError> {
    let Json(action) = payload?;
    tracing::info!(?action, "B2 action requested");

    let response = match action {
        B2Action::Authenticate => B2ActionResponse::Session(pipeline.authenticate().await?),
        B2Action::GetUploadUrl => {
            B2ActionResponse::UploadUrl(pipeline.start_direct_upload().await?)
        }
    };

    Ok(Json(response))
}
