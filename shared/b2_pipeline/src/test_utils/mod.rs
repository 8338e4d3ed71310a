//! In-process B2 API double for tests.
//!
//! Serves the authorize, list-buckets, get-upload-URL, upload and download
//! endpoints on an ephemeral local port and records what it receives.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, task::JoinHandle};

use crate::{
    file_name::content_sha1,
    pipeline::{
        B2UploadPipeline, CONTENT_SHA1_HEADER, FILE_NAME_HEADER, INFO_AUTHOR_HEADER,
    },
    types::{BucketRef, Credentials},
};

/// Application key ID the mock accepts by default
pub const MOCK_KEY_ID: &str = "test-key-id";
/// Application key the mock accepts by default
pub const MOCK_APP_KEY: &str = "test-app-key";
/// Account ID the mock reports
pub const MOCK_ACCOUNT_ID: &str = "mock-account";
/// Session token the mock issues
pub const MOCK_SESSION_TOKEN: &str = "mock-session-token";

/// Buckets the mock account owns by default, as `(bucket_id, bucket_name)`
pub const MOCK_BUCKETS: &[(&str, &str)] = &[
    ("bucket-documents", "documents"),
    ("bucket-photos", "photos"),
    ("bucket-photos-upper", "Photos"),
];

/// One upload as the mock received it
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    /// Bucket ID from the upload URL
    pub bucket_id: String,
    /// `Authorization` header value
    pub authorization: String,
    /// Raw `X-Bz-File-Name` header value
    pub file_name_header: String,
    /// Percent-decoded file name
    pub file_name: String,
    /// `Content-Type` header value
    pub content_type: String,
    /// `Content-Length` header value, when sent
    pub content_length: Option<u64>,
    /// `X-Bz-Content-Sha1` header value
    pub content_sha1: String,
    /// `X-Bz-Info-Author` header value, when sent
    pub info_author: Option<String>,
    /// Request body
    pub body: Bytes,
}

/// Number of calls each endpoint received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `b2_authorize_account`
    pub authorize: usize,
    /// `b2_list_buckets`
    pub list_buckets: usize,
    /// `b2_get_upload_url`
    pub get_upload_url: usize,
    /// raw uploads
    pub upload: usize,
    /// downloads and HEAD probes
    pub download: usize,
}

impl CallCounts {
    /// Sum over every endpoint
    #[must_use]
    pub const fn total(&self) -> usize {
        self.authorize + self.list_buckets + self.get_upload_url + self.upload + self.download
    }
}

#[derive(Default)]
struct Counters {
    authorize: AtomicUsize,
    list_buckets: AtomicUsize,
    get_upload_url: AtomicUsize,
    upload: AtomicUsize,
    download: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    authorize: Option<u16>,
    list_buckets: Option<u16>,
    get_upload_url: Option<u16>,
    upload: Option<(u16, String)>,
}

struct MockState {
    base_url: String,
    key_id: String,
    key: String,
    buckets: Vec<BucketRef>,
    counters: Counters,
    next_ticket: AtomicUsize,
    faults: Mutex<Faults>,
    tickets: Mutex<HashMap<String, String>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    files: Mutex<HashSet<(String, String)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Running mock B2 server; stops when dropped
pub struct MockB2Server {
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockB2Server {
    /// Starts a mock with [`MOCK_KEY_ID`], [`MOCK_APP_KEY`] and [`MOCK_BUCKETS`]
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound
    pub async fn start() -> Self {
        Self::start_with(MOCK_KEY_ID, MOCK_APP_KEY, MOCK_BUCKETS).await
    }

    /// Starts a mock accepting the given key and owning the given `(id, name)` buckets
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound
    pub async fn start_with(key_id: &str, key: &str, buckets: &[(&str, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock B2 listener");
        let addr = listener
            .local_addr()
            .expect("Mock B2 listener has no local address");

        let state = Arc::new(MockState {
            base_url: format!("http://{addr}"),
            key_id: key_id.to_string(),
            key: key.to_string(),
            buckets: buckets
                .iter()
                .map(|(id, name)| BucketRef {
                    bucket_id: (*id).to_string(),
                    bucket_name: (*name).to_string(),
                })
                .collect(),
            counters: Counters::default(),
            next_ticket: AtomicUsize::new(1),
            faults: Mutex::new(Faults::default()),
            tickets: Mutex::new(HashMap::new()),
            uploads: Mutex::new(Vec::new()),
            files: Mutex::new(HashSet::new()),
        });

        let router = Router::new()
            .route("/b2api/v2/b2_authorize_account", get(authorize_account))
            .route("/b2api/v2/b2_list_buckets", post(list_buckets))
            .route("/b2api/v2/b2_get_upload_url", post(get_upload_url))
            .route("/upload/{bucket_id}", post(upload_file))
            .route("/file/{bucket_name}/{*file_name}", get(download_file))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Mock B2 server crashed");
        });

        Self { state, handle }
    }

    /// Base URL serving every endpoint
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.state.base_url
    }

    /// Credentials the mock accepts, targeting `bucket_name`
    #[must_use]
    pub fn credentials(&self, bucket_name: &str) -> Credentials {
        Credentials::new(&self.state.key_id, &self.state.key, bucket_name)
    }

    /// Pipeline wired to this mock
    #[must_use]
    pub fn pipeline(&self, credentials: Credentials) -> B2UploadPipeline {
        B2UploadPipeline::with_http_client(reqwest::Client::new(), credentials)
            .with_auth_base_url(self.base_url())
    }

    /// Makes account authorization answer with `status`
    pub fn fail_authorization(&self, status: u16) {
        lock(&self.state.faults).authorize = Some(status);
    }

    /// Makes bucket listing answer with `status`
    pub fn fail_bucket_listing(&self, status: u16) {
        lock(&self.state.faults).list_buckets = Some(status);
    }

    /// Makes upload URL requests answer with `status`
    pub fn fail_upload_url(&self, status: u16) {
        lock(&self.state.faults).get_upload_url = Some(status);
    }

    /// Makes raw uploads answer with `status` and a verbatim `body`
    pub fn fail_upload(&self, status: u16, body: impl Into<String>) {
        lock(&self.state.faults).upload = Some((status, body.into()));
    }

    /// Marks a file as stored without uploading it
    pub fn insert_file(&self, bucket_name: &str, file_name: &str) {
        lock(&self.state.files).insert((bucket_name.to_string(), file_name.to_string()));
    }

    /// Uploads received so far
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        lock(&self.state.uploads).clone()
    }

    /// Calls received so far, per endpoint
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        let counters = &self.state.counters;
        CallCounts {
            authorize: counters.authorize.load(Ordering::SeqCst),
            list_buckets: counters.list_buckets.load(Ordering::SeqCst),
            get_upload_url: counters.get_upload_url.load(Ordering::SeqCst),
            upload: counters.upload.load(Ordering::SeqCst),
            download: counters.download.load(Ordering::SeqCst),
        }
    }
}

impl Drop for MockB2Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn b2_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "code": code,
            "message": message,
        })),
    )
        .into_response()
}

fn forced(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    b2_error(status, "forced_failure", "Failure injected by test")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn has_session_token(headers: &HeaderMap) -> bool {
    header_str(headers, header::AUTHORIZATION.as_str()) == Some(MOCK_SESSION_TOKEN)
}

async fn authorize_account(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.counters.authorize.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = lock(&state.faults).authorize {
        return forced(status);
    }

    let expected = B2UploadPipeline::basic_auth_header(&Credentials::new(
        &state.key_id,
        &state.key,
        "",
    ));
    if header_str(&headers, header::AUTHORIZATION.as_str()) != Some(expected.as_str()) {
        return b2_error(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid application key");
    }

    Json(json!({
        "accountId": MOCK_ACCOUNT_ID,
        "apiUrl": state.base_url,
        "authorizationToken": MOCK_SESSION_TOKEN,
        "downloadUrl": state.base_url,
        "recommendedPartSize": 100_000_000,
        "absoluteMinimumPartSize": 5_000_000,
    }))
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBucketsBody {
    account_id: String,
}

async fn list_buckets(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<ListBucketsBody>,
) -> Response {
    state.counters.list_buckets.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = lock(&state.faults).list_buckets {
        return forced(status);
    }
    if !has_session_token(&headers) {
        return b2_error(StatusCode::UNAUTHORIZED, "bad_auth_token", "Invalid session token");
    }
    if body.account_id != MOCK_ACCOUNT_ID {
        return b2_error(StatusCode::BAD_REQUEST, "bad_request", "Unknown account");
    }

    let buckets: Vec<_> = state
        .buckets
        .iter()
        .map(|bucket| {
            json!({
                "accountId": MOCK_ACCOUNT_ID,
                "bucketId": bucket.bucket_id,
                "bucketName": bucket.bucket_name,
                "bucketType": "allPublic",
            })
        })
        .collect();

    Json(json!({ "buckets": buckets })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetUploadUrlBody {
    bucket_id: String,
}

async fn get_upload_url(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<GetUploadUrlBody>,
) -> Response {
    state.counters.get_upload_url.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = lock(&state.faults).get_upload_url {
        return forced(status);
    }
    if !has_session_token(&headers) {
        return b2_error(StatusCode::UNAUTHORIZED, "bad_auth_token", "Invalid session token");
    }
    if !state.buckets.iter().any(|b| b.bucket_id == body.bucket_id) {
        return b2_error(StatusCode::BAD_REQUEST, "bad_bucket_id", "Unknown bucket");
    }

    let ticket = state.next_ticket.fetch_add(1, Ordering::SeqCst);
    let token = format!("upload-token-{ticket}");
    lock(&state.tickets).insert(token.clone(), body.bucket_id.clone());

    Json(json!({
        "bucketId": body.bucket_id,
        "uploadUrl": format!("{}/upload/{}", state.base_url, body.bucket_id),
        "authorizationToken": token,
    }))
    .into_response()
}

async fn upload_file(
    State(state): State<Arc<MockState>>,
    Path(bucket_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.counters.upload.fetch_add(1, Ordering::SeqCst);

    let authorization = header_str(&headers, header::AUTHORIZATION.as_str())
        .unwrap_or_default()
        .to_string();
    let file_name_header = header_str(&headers, FILE_NAME_HEADER)
        .unwrap_or_default()
        .to_string();
    let file_name = urlencoding::decode(&file_name_header)
        .map(|name| name.into_owned())
        .unwrap_or_else(|_| file_name_header.clone());

    let recorded = RecordedUpload {
        bucket_id: bucket_id.clone(),
        authorization: authorization.clone(),
        file_name_header,
        file_name: file_name.clone(),
        content_type: header_str(&headers, header::CONTENT_TYPE.as_str())
            .unwrap_or_default()
            .to_string(),
        content_length: header_str(&headers, header::CONTENT_LENGTH.as_str())
            .and_then(|value| value.parse().ok()),
        content_sha1: header_str(&headers, CONTENT_SHA1_HEADER)
            .unwrap_or_default()
            .to_string(),
        info_author: header_str(&headers, INFO_AUTHOR_HEADER).map(ToString::to_string),
        body: body.clone(),
    };
    lock(&state.uploads).push(recorded.clone());

    if let Some((status, raw)) = lock(&state.faults).upload.clone() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, raw).into_response();
    }

    // Tickets are single use
    let ticket_bucket = lock(&state.tickets).remove(&authorization);
    if ticket_bucket.as_deref() != Some(bucket_id.as_str()) {
        return b2_error(StatusCode::UNAUTHORIZED, "bad_auth_token", "Invalid upload token");
    }
    if file_name.is_empty() {
        return b2_error(StatusCode::BAD_REQUEST, "bad_request", "Missing file name");
    }
    if recorded.content_sha1 != content_sha1(&body) {
        return b2_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "Sha1 did not match data received",
        );
    }

    let Some(bucket_name) = state
        .buckets
        .iter()
        .find(|b| b.bucket_id == bucket_id)
        .map(|b| b.bucket_name.clone())
    else {
        return b2_error(StatusCode::BAD_REQUEST, "bad_bucket_id", "Unknown bucket");
    };
    lock(&state.files).insert((bucket_name, file_name.clone()));

    Json(json!({
        "accountId": MOCK_ACCOUNT_ID,
        "action": "upload",
        "bucketId": bucket_id,
        "contentLength": body.len(),
        "contentSha1": recorded.content_sha1,
        "contentType": recorded.content_type,
        "fileId": format!("4_z{bucket_id}_{}", body.len()),
        "fileName": file_name,
    }))
    .into_response()
}

async fn download_file(
    State(state): State<Arc<MockState>>,
    Path((bucket_name, file_name)): Path<(String, String)>,
) -> StatusCode {
    state.counters.download.fetch_add(1, Ordering::SeqCst);

    if lock(&state.files).contains(&(bucket_name, file_name)) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
