//! The authenticate → resolve bucket → get upload URL → upload call chain

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
    Client, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{status_text, B2Error, B2Result},
    file_name::{content_sha1, encode_file_name_header, storage_file_name_now},
    progress::{reporting_body, ProgressCallback},
    request::default_http_client,
    types::{
        AuthSession, BucketRef, Credentials, DirectUploadGrant, StoredFile, UploadOutcome,
        UploadRequest, UploadTicket,
    },
};

/// Production account-authorization host
pub const DEFAULT_AUTH_BASE_URL: &str = "https://api.backblazeb2.com";

/// Value sent in the `X-Bz-Info-Author` header
pub const INFO_AUTHOR: &str = concat!("b2-pipeline/", env!("CARGO_PKG_VERSION"));

/// Header carrying the storage file name
pub const FILE_NAME_HEADER: &str = "X-Bz-File-Name";
/// Header carrying the hex SHA-1 of the body
pub const CONTENT_SHA1_HEADER: &str = "X-Bz-Content-Sha1";
/// Header carrying the author file-info entry
pub const INFO_AUTHOR_HEADER: &str = "X-Bz-Info-Author";

/// Longest raw-body excerpt kept in upload error messages
const ERROR_EXCERPT_CHARS: usize = 200;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListBucketsRequest<'a> {
    account_id: &'a str,
}

#[derive(Deserialize)]
struct ListBucketsResponse {
    buckets: Vec<BucketRef>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetUploadUrlRequest<'a> {
    bucket_id: &'a str,
}

/// Error payload B2 returns with non-success statuses
#[derive(Deserialize)]
struct B2ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the B2 upload protocol.
///
/// Holds only immutable configuration: construct one per caller and clone it freely.
/// Every run re-authenticates; sessions, buckets and tickets never outlive the call
/// chain that produced them.
#[derive(Debug, Clone)]
pub struct B2UploadPipeline {
    http: Client,
    credentials: Credentials,
    auth_base_url: String,
}

impl B2UploadPipeline {
    /// Creates a pipeline with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns `B2Error::Network` if the HTTP client cannot be built
    pub fn new(credentials: Credentials) -> B2Result<Self> {
        Ok(Self::with_http_client(default_http_client()?, credentials))
    }

    /// Creates a pipeline on top of an existing HTTP client
    #[must_use]
    pub fn with_http_client(http: Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
        }
    }

    /// Points account authorization at another host (B2-compatible services, tests)
    #[must_use]
    pub fn with_auth_base_url(mut self, auth_base_url: impl Into<String>) -> Self {
        self.auth_base_url = auth_base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Credentials the pipeline was built with
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Bucket uploads go to
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.credentials.bucket_name
    }

    /// `Authorization` value for account authorization
    #[must_use]
    pub fn basic_auth_header(credentials: &Credentials) -> String {
        let pair = format!(
            "{}:{}",
            credentials.application_key_id, credentials.application_key
        );
        format!("Basic {}", STANDARD.encode(pair))
    }

    /// Public download URL of a stored file; pure, no network call
    #[must_use]
    pub fn build_download_url(
        session: &AuthSession,
        bucket_name: &str,
        stored_file_name: &str,
    ) -> String {
        format!(
            "{}/file/{bucket_name}/{stored_file_name}",
            session.download_url
        )
    }

    /// Authorizes the account and opens a session
    ///
    /// # Errors
    ///
    /// Returns `B2Error::Auth` when the provider answers with a non-success status
    /// Returns `B2Error::Network` on transport failure
    /// Returns `B2Error::InvalidResponse` if the session payload cannot be decoded
    #[instrument(skip(self), fields(key_id = %self.credentials.application_key_id))]
    pub async fn authenticate(&self) -> B2Result<AuthSession> {
        let url = format!("{}/b2api/v2/b2_authorize_account", self.auth_base_url);

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, Self::basic_auth_header(&self.credentials))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "B2 authorization rejected");
            return Err(B2Error::Auth {
                status: status.as_u16(),
                status_text: status_text(status),
            });
        }

        let session: AuthSession = decode(response).await?;
        debug!(
            account_id = %session.account_id,
            api_url = %session.api_url,
            "B2 session opened"
        );
        Ok(session)
    }

    /// Finds the bucket named `bucket_name` in the session's account
    ///
    /// # Errors
    ///
    /// Returns `B2Error::BucketNotFound` when no bucket name matches exactly
    /// Returns `B2Error::Auth` when the listing call is rejected
    /// Returns `B2Error::Network` on transport failure
    #[instrument(skip(self, session))]
    pub async fn resolve_bucket(
        &self,
        session: &AuthSession,
        bucket_name: &str,
    ) -> B2Result<BucketRef> {
        let url = format!("{}/b2api/v2/b2_list_buckets", session.api_url);

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &session.authorization_token)
            .json(&ListBucketsRequest {
                account_id: &session.account_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "B2 bucket listing rejected");
            return Err(B2Error::Auth {
                status: status.as_u16(),
                status_text: status_text(status),
            });
        }

        let listing: ListBucketsResponse = decode(response).await?;
        let bucket = listing
            .buckets
            .into_iter()
            .find(|bucket| bucket.bucket_name == bucket_name)
            .ok_or_else(|| B2Error::BucketNotFound(bucket_name.to_string()))?;

        debug!(bucket_id = %bucket.bucket_id, "Bucket resolved");
        Ok(bucket)
    }

    /// Obtains a one-shot upload URL for `bucket`
    ///
    /// # Errors
    ///
    /// Returns `B2Error::TicketAcquisition` when the provider answers with a non-success status
    /// Returns `B2Error::Network` on transport failure
    #[instrument(skip(self, session), fields(bucket_id = %bucket.bucket_id))]
    pub async fn acquire_upload_ticket(
        &self,
        session: &AuthSession,
        bucket: &BucketRef,
    ) -> B2Result<UploadTicket> {
        let url = format!("{}/b2api/v2/b2_get_upload_url", session.api_url);

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &session.authorization_token)
            .json(&GetUploadUrlRequest {
                bucket_id: &bucket.bucket_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "B2 refused upload URL");
            return Err(B2Error::TicketAcquisition {
                status: status.as_u16(),
                status_text: status_text(status),
            });
        }

        let ticket: UploadTicket = decode(response).await?;
        debug!(upload_url = %ticket.upload_url, "Upload URL acquired");
        Ok(ticket)
    }

    /// Transfers `request` through `ticket` in a single POST.
    ///
    /// The stored name is derived from the current time and the extension of
    /// `request.original_name`. When `progress` is set the body is streamed and
    /// each slice is reported as the transport takes it.
    ///
    /// # Errors
    ///
    /// Returns `B2Error::EmptyFile` for a zero-length request, before any network call
    /// Returns `B2Error::TicketMismatch` when `ticket` was issued for another bucket than
    /// `bucket`, before any network call
    /// Returns `B2Error::Upload` when the upload endpoint answers with a non-success status
    /// Returns `B2Error::Network` on transport failure
    /// Returns `B2Error::InvalidResponse` if the upload response cannot be decoded
    #[instrument(
        skip(self, session, ticket, request, progress),
        fields(bucket = %bucket.bucket_name, size = request.len())
    )]
    pub async fn upload(
        &self,
        session: &AuthSession,
        bucket: &BucketRef,
        ticket: UploadTicket,
        request: UploadRequest,
        progress: Option<ProgressCallback>,
    ) -> B2Result<UploadOutcome> {
        if request.is_empty() {
            return Err(B2Error::EmptyFile);
        }
        if ticket.bucket_id != bucket.bucket_id {
            warn!(
                ticket_bucket_id = %ticket.bucket_id,
                "Upload ticket belongs to another bucket"
            );
            return Err(B2Error::TicketMismatch {
                ticket_bucket_id: ticket.bucket_id,
                bucket_id: bucket.bucket_id.clone(),
            });
        }

        let file_name = storage_file_name_now(&request.original_name);
        let sha1 = content_sha1(&request.bytes);
        let content_length = request.len();

        info!(
            file_name = %file_name,
            content_type = request.content_type(),
            "Uploading file to B2"
        );

        let builder = self
            .http
            .post(&ticket.upload_url)
            .header(AUTHORIZATION, &ticket.authorization_token)
            .header(FILE_NAME_HEADER, &*encode_file_name_header(&file_name))
            .header(CONTENT_TYPE, request.content_type())
            .header(CONTENT_LENGTH, content_length)
            .header(CONTENT_SHA1_HEADER, &sha1)
            .header(INFO_AUTHOR_HEADER, INFO_AUTHOR);

        let builder = match progress {
            Some(callback) => builder.body(reporting_body(request.bytes, callback)),
            None => builder.body(request.bytes),
        };

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = compose_upload_error(status, &body);
            warn!(status = status.as_u16(), %message, "B2 upload failed");
            return Err(B2Error::Upload {
                status: status.as_u16(),
                message,
            });
        }

        let stored: StoredFile = decode(response).await?;
        if stored.file_name != file_name {
            warn!(
                expected = %file_name,
                actual = %stored.file_name,
                "B2 stored file under a different name"
            );
        }

        let public_url =
            Self::build_download_url(session, &bucket.bucket_name, &stored.file_name);
        info!(file_id = %stored.file_id, %public_url, "File uploaded to B2");

        Ok(UploadOutcome::stored(stored.file_name, public_url))
    }

    /// Whether a stored file answers a HEAD request on its download URL.
    ///
    /// Any failure, including transport errors, reads as `false`.
    #[instrument(skip(self, session))]
    pub async fn check_exists(
        &self,
        session: &AuthSession,
        bucket_name: &str,
        stored_file_name: &str,
    ) -> bool {
        let url = Self::build_download_url(session, bucket_name, stored_file_name);

        match self
            .http
            .head(&url)
            .header(AUTHORIZATION, &session.authorization_token)
            .send()
            .await
        {
            Ok(response) => {
                let exists = response.status().is_success();
                debug!(
                    status = response.status().as_u16(),
                    exists,
                    "Existence probe answered"
                );
                exists
            }
            Err(err) => {
                debug!(error = %err, "Existence probe failed");
                false
            }
        }
    }

    /// Runs the whole chain for the configured bucket
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that fails; see the individual steps
    pub async fn run(
        &self,
        request: UploadRequest,
        progress: Option<ProgressCallback>,
    ) -> B2Result<UploadOutcome> {
        if request.is_empty() {
            return Err(B2Error::EmptyFile);
        }

        let session = self.authenticate().await?;
        let bucket = self
            .resolve_bucket(&session, &self.credentials.bucket_name)
            .await?;
        let ticket = self.acquire_upload_ticket(&session, &bucket).await?;

        self.upload(&session, &bucket, ticket, request, progress)
            .await
    }

    /// Runs the chain up to the upload URL so a client can send the bytes itself
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that fails; see the individual steps
    pub async fn start_direct_upload(&self) -> B2Result<DirectUploadGrant> {
        let session = self.authenticate().await?;
        let bucket = self
            .resolve_bucket(&session, &self.credentials.bucket_name)
            .await?;
        let ticket = self.acquire_upload_ticket(&session, &bucket).await?;

        Ok(DirectUploadGrant {
            upload_url: ticket.upload_url,
            authorization_token: ticket.authorization_token,
            bucket_id: ticket.bucket_id,
            bucket_name: bucket.bucket_name,
            download_url: session.download_url,
        })
    }
}

/// Decodes a success body, keeping transport and format failures apart
async fn decode<T: DeserializeOwned>(response: Response) -> B2Result<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| B2Error::InvalidResponse(e.to_string()))
}

/// Error text for a failed upload: B2's message and code when the body is
/// structured, otherwise a bounded excerpt of the raw body
fn compose_upload_error(status: StatusCode, body: &str) -> String {
    let mut message = format!("Upload failed with status {}", status.as_u16());

    match serde_json::from_str::<B2ErrorBody>(body) {
        Ok(B2ErrorBody { code, message: text }) if code.is_some() || text.is_some() => {
            if let Some(text) = text {
                message.push_str(": ");
                message.push_str(&text);
            }
            if let Some(code) = code {
                message.push_str(&format!(" ({code})"));
            }
        }
        _ => {
            let excerpt: String = body.trim().chars().take(ERROR_EXCERPT_CHARS).collect();
            if !excerpt.is_empty() {
                message.push_str(": ");
                message.push_str(&excerpt);
            }
        }
    }

    message
}
